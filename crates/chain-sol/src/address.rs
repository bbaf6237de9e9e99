//! Base58 addresses and signatures.
//!
//! A Solana address is the Base58 encoding of 32 raw bytes: either an Ed25519
//! public key or a program derived address. Transaction signatures are the
//! Base58 encoding of the 64-byte Ed25519 signature, and the first signature
//! of a transaction doubles as its identifier.

use crate::error::SolError;

/// Decode a Base58 address into its 32-byte form.
pub fn address_to_bytes(address: &str) -> Result<[u8; 32], SolError> {
    let bytes = bs58::decode(address.trim())
        .into_vec()
        .map_err(|e| SolError::InvalidAddress(format!("base58 decode failed: {e}")))?;

    bytes.try_into().map_err(|v: Vec<u8>| {
        SolError::InvalidAddress(format!("expected 32 bytes, got {}", v.len()))
    })
}

/// Encode 32 bytes as a Base58 address.
pub fn bytes_to_address(bytes: &[u8; 32]) -> String {
    bs58::encode(bytes).into_string()
}

/// Encode a 64-byte signature as the Base58 transaction id used by RPC nodes.
pub fn signature_to_string(signature: &[u8; 64]) -> String {
    bs58::encode(signature).into_string()
}

/// Decode a Base58 transaction signature.
pub fn signature_from_str(signature: &str) -> Result<[u8; 64], SolError> {
    let bytes = bs58::decode(signature.trim())
        .into_vec()
        .map_err(|e| SolError::SignatureError(format!("base58 decode failed: {e}")))?;

    bytes.try_into().map_err(|v: Vec<u8>| {
        SolError::SignatureError(format!("expected 64 bytes, got {}", v.len()))
    })
}
