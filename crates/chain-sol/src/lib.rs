//! Solana primitives for the presale client.
//!
//! Address encoding, program derived addresses, and the legacy transaction
//! wire format, implemented by hand on top of `ed25519-dalek`,
//! `curve25519-dalek`, `sha2` and `bs58` instead of `solana-sdk`.
//!
//! No private key material ever passes through this crate: messages are
//! serialized for an external signer, and signed wire bytes are parsed and
//! verified.

pub mod address;
pub mod error;
pub mod pda;
pub mod transaction;

pub use address::{
    address_to_bytes, bytes_to_address, signature_from_str, signature_to_string,
};
pub use error::SolError;
pub use pda::{
    derive_associated_token_address, find_program_address, is_on_curve,
    ASSOCIATED_TOKEN_PROGRAM_ID, SYSTEM_PROGRAM_ID, TOKEN_PROGRAM_ID,
};
pub use transaction::{
    compile_transaction, decode_compact_u16, encode_compact_u16, encode_wire, serialize_message,
    unsigned_wire, verify_signature, CompiledInstruction, SignedTransaction, SolAccountMeta,
    SolInstruction, SolTransaction, PACKET_DATA_SIZE,
};
