//! The `purchase_tokens` instruction.
//!
//! The presale program is an Anchor program. Its instruction data is the
//! 8-byte sighash `sha256("global:purchase_tokens")[..8]` followed by the
//! Borsh `u64` lamport amount, and its account list must match the table
//! below exactly: a mismatch is not detected here, the program rejects the
//! transaction on-chain.

use chain_sol::{SolAccountMeta, SolInstruction};
use sha2::{Digest, Sha256};

use crate::addresses::DerivedAddresses;
use crate::amount::Lamports;
use crate::types::Address;

pub const PURCHASE_IX_NAME: &str = "purchase_tokens";

/// Instruction data length: sighash + u64.
pub const PURCHASE_DATA_LEN: usize = 16;

/// Role of each account slot, in program order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountRole {
    User,
    SolReceiver,
    Mint,
    UserAta,
    MintAuthorityPda,
    TokenProgram,
    AssociatedTokenProgram,
    SystemProgram,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountSlot {
    pub role: AccountRole,
    pub name: &'static str,
    pub is_writable: bool,
    pub is_signer: bool,
}

const fn slot(role: AccountRole, name: &'static str, is_writable: bool, is_signer: bool) -> AccountSlot {
    AccountSlot { role, name, is_writable, is_signer }
}

/// Account layout expected by `purchase_tokens`.
pub const PURCHASE_ACCOUNTS: [AccountSlot; 8] = [
    slot(AccountRole::User, "user", true, true),
    slot(AccountRole::SolReceiver, "solReceiver", true, false),
    slot(AccountRole::Mint, "mint", true, false),
    slot(AccountRole::UserAta, "userAta", true, false),
    slot(AccountRole::MintAuthorityPda, "mintAuthorityPda", false, false),
    slot(AccountRole::TokenProgram, "tokenProgram", false, false),
    slot(AccountRole::AssociatedTokenProgram, "associatedTokenProgram", false, false),
    slot(AccountRole::SystemProgram, "systemProgram", false, false),
];

// Only the user signs, and every program account is read-only.
const _: () = {
    let mut i = 0;
    while i < PURCHASE_ACCOUNTS.len() {
        let s = PURCHASE_ACCOUNTS[i];
        assert!(s.is_signer == (i == 0));
        assert!(s.is_writable == (i < 4));
        i += 1;
    }
};

/// Well-known addresses the instruction references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramAddresses {
    pub program_id: Address,
    pub sol_receiver: Address,
    pub mint: Address,
    pub token_program: Address,
    pub associated_token_program: Address,
    pub system_program: Address,
}

impl From<&crate::config::PresaleConfig> for ProgramAddresses {
    fn from(config: &crate::config::PresaleConfig) -> Self {
        Self {
            program_id: config.program_id,
            sol_receiver: config.sol_receiver,
            mint: config.mint,
            token_program: config.token_program_id,
            associated_token_program: config.associated_token_program_id,
            system_program: config.system_program_id,
        }
    }
}

/// Anchor sighash of a global instruction.
pub fn instruction_selector(name: &str) -> [u8; 8] {
    let hash = Sha256::digest(format!("global:{name}").as_bytes());
    let mut selector = [0u8; 8];
    selector.copy_from_slice(&hash[..8]);
    selector
}

/// Build the single `purchase_tokens` instruction. Never touches the network.
pub fn build_purchase_instruction(
    owner: &Address,
    lamports: Lamports,
    derived: &DerivedAddresses,
    fixed: &ProgramAddresses,
) -> SolInstruction {
    let accounts = PURCHASE_ACCOUNTS
        .iter()
        .map(|slot| {
            let address = match slot.role {
                AccountRole::User => owner,
                AccountRole::SolReceiver => &fixed.sol_receiver,
                AccountRole::Mint => &fixed.mint,
                AccountRole::UserAta => &derived.holding,
                AccountRole::MintAuthorityPda => &derived.authority,
                AccountRole::TokenProgram => &fixed.token_program,
                AccountRole::AssociatedTokenProgram => &fixed.associated_token_program,
                AccountRole::SystemProgram => &fixed.system_program,
            };
            SolAccountMeta {
                pubkey: address.to_bytes(),
                is_signer: slot.is_signer,
                is_writable: slot.is_writable,
            }
        })
        .collect();

    let mut data = Vec::with_capacity(PURCHASE_DATA_LEN);
    data.extend_from_slice(&instruction_selector(PURCHASE_IX_NAME));
    data.extend_from_slice(&lamports.get().to_le_bytes());

    SolInstruction {
        program_id: fixed.program_id.to_bytes(),
        accounts,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addresses::{derive_authority, derive_holding};
    use crate::config::PresaleConfig;

    fn fixture() -> (Address, DerivedAddresses, ProgramAddresses) {
        let config = PresaleConfig::default();
        let owner = Address::new_from_array([0x42; 32]);
        let derived = DerivedAddresses {
            holding: derive_holding(
                &config.mint,
                &owner,
                &config.token_program_id,
                &config.associated_token_program_id,
            )
            .unwrap(),
            authority: derive_authority(&config.program_id).unwrap(),
        };
        (owner, derived, ProgramAddresses::from(&config))
    }

    #[test]
    fn selector_matches_anchor_sighash() {
        assert_eq!(
            instruction_selector(PURCHASE_IX_NAME),
            [142, 1, 16, 160, 115, 120, 55, 254]
        );
    }

    #[test]
    fn data_is_selector_then_le_amount() {
        let (owner, derived, fixed) = fixture();
        let ix = build_purchase_instruction(&owner, Lamports::new(50_000_000), &derived, &fixed);

        assert_eq!(ix.data.len(), PURCHASE_DATA_LEN);
        assert_eq!(&ix.data[..8], &instruction_selector(PURCHASE_IX_NAME));
        assert_eq!(u64::from_le_bytes(ix.data[8..].try_into().unwrap()), 50_000_000);
        assert_eq!(ix.program_id, fixed.program_id.to_bytes());
    }

    #[test]
    fn account_list_matches_layout_for_any_amount() {
        let (owner, derived, fixed) = fixture();
        let expected: [(Address, bool, bool); 8] = [
            (owner, true, true),
            (fixed.sol_receiver, true, false),
            (fixed.mint, true, false),
            (derived.holding, true, false),
            (derived.authority, false, false),
            (fixed.token_program, false, false),
            (fixed.associated_token_program, false, false),
            (fixed.system_program, false, false),
        ];

        for amount in [1_000_000u64, 50_000_000, 10_000_000_000_000, u64::MAX] {
            let ix = build_purchase_instruction(&owner, Lamports::new(amount), &derived, &fixed);
            assert_eq!(ix.accounts.len(), 8);
            for (i, (meta, (addr, writable, signer))) in ix.accounts.iter().zip(expected).enumerate() {
                assert_eq!(meta.pubkey, addr.to_bytes(), "slot {i} address");
                assert_eq!(meta.is_writable, writable, "slot {i} writable");
                assert_eq!(meta.is_signer, signer, "slot {i} signer");
            }
        }
    }

    #[test]
    fn layout_table_names_follow_program_interface() {
        let names: Vec<&str> = PURCHASE_ACCOUNTS.iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            [
                "user",
                "solReceiver",
                "mint",
                "userAta",
                "mintAuthorityPda",
                "tokenProgram",
                "associatedTokenProgram",
                "systemProgram",
            ]
        );
    }

    #[test]
    fn compiles_into_a_single_signer_message() {
        let (owner, derived, fixed) = fixture();
        let ix = build_purchase_instruction(&owner, Lamports::new(1_000_000), &derived, &fixed);
        let tx = chain_sol::compile_transaction(&[ix], owner.as_bytes(), &[7u8; 32]).unwrap();

        assert_eq!(tx.account_keys[0], owner.to_bytes());
        assert_eq!(tx.num_required_signatures, 1);
        // program, authority PDA and the three infrastructure programs
        assert_eq!(tx.num_readonly_unsigned, 5);
        assert_eq!(tx.account_keys.len(), 9);
    }
}
