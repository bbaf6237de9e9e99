//! Program-owned addresses used by the purchase instruction.

use tracing::error;

use crate::error::PresaleError;
use crate::types::Address;

/// Seed of the presale program's mint authority PDA.
pub const MINT_AUTHORITY_SEED: &[u8] = b"mint_authority";

/// Addresses derived per purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedAddresses {
    /// The buyer's associated token account for the sale mint.
    pub holding: Address,
    /// The presale program's mint authority.
    pub authority: Address,
}

/// The presale program's mint authority PDA.
pub fn derive_authority(program_id: &Address) -> Result<Address, PresaleError> {
    chain_sol::find_program_address(&[MINT_AUTHORITY_SEED], program_id.as_bytes())
        .map(|(address, _bump)| Address::new_from_array(address))
        .map_err(|e| {
            error!(program = %program_id, error = %e, "mint authority derivation failed");
            PresaleError::from(e)
        })
}

/// The associated token account of `owner` for `mint`.
///
/// The account may not exist yet; the presale program creates it.
pub fn derive_holding(
    mint: &Address,
    owner: &Address,
    token_program: &Address,
    associated_token_program: &Address,
) -> Result<Address, PresaleError> {
    chain_sol::derive_associated_token_address(
        owner.as_bytes(),
        mint.as_bytes(),
        token_program.as_bytes(),
        associated_token_program.as_bytes(),
    )
    .map(Address::new_from_array)
    .map_err(|e| {
        error!(%owner, %mint, error = %e, "associated token account derivation failed");
        PresaleError::from(e)
    })
}
