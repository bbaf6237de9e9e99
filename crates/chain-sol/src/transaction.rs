//! Legacy Solana transaction wire format.
//!
//! Messages are compiled and serialized by hand. Signing is never done here:
//! the serialized message is handed to an external wallet, and the wallet's
//! signed wire bytes are parsed back and verified.
//!
//! ```text
//! Transaction:
//!   num_signatures          compact-u16
//!   signatures              64 bytes * num_signatures
//!   message:
//!     num_required_sigs     u8
//!     num_readonly_signed   u8
//!     num_readonly_unsigned u8
//!     num_accounts          compact-u16
//!     account_keys          32 bytes * num_accounts
//!     recent_blockhash      32 bytes
//!     num_instructions      compact-u16
//!     instructions[]        (see below)
//!
//! Instruction:
//!   program_id_index        u8
//!   num_accounts            compact-u16
//!   account_indices         u8 * num_accounts
//!   data_len                compact-u16
//!   data                    u8 * data_len
//! ```

use ed25519_dalek::{Signature, VerifyingKey};

use crate::error::SolError;

/// Largest legacy transaction accepted by the network, in bytes.
pub const PACKET_DATA_SIZE: usize = 1232;

// ---------------------------------------------------------------------------
// Compact-u16 encoding
// ---------------------------------------------------------------------------

/// Encode a `u16` value in Solana's compact-u16 format.
///
/// - Values 0..0x7f       -> 1 byte
/// - Values 0x80..0x3fff  -> 2 bytes
/// - Values 0x4000..      -> 3 bytes
pub fn encode_compact_u16(value: u16) -> Vec<u8> {
    let mut val = value as u32;
    let mut out = Vec::with_capacity(3);

    loop {
        let mut byte = (val & 0x7f) as u8;
        val >>= 7;
        if val > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if val == 0 {
            break;
        }
    }

    out
}

/// Decode a compact-u16 value, returning `(value, bytes_consumed)`.
pub fn decode_compact_u16(data: &[u8]) -> Result<(u16, usize), SolError> {
    let mut value: u32 = 0;
    let mut consumed = 0usize;

    loop {
        let byte = *data.get(consumed).ok_or_else(|| {
            SolError::SerializationError("unexpected end of data while decoding compact-u16".into())
        })?;
        value |= ((byte & 0x7f) as u32) << (7 * consumed);
        consumed += 1;

        if byte & 0x80 == 0 || consumed >= 3 {
            break;
        }
    }

    if value > u16::MAX as u32 {
        return Err(SolError::SerializationError("compact-u16 value overflow".into()));
    }

    Ok((value as u16, consumed))
}

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// A single account reference in an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolAccountMeta {
    pub pubkey: [u8; 32],
    pub is_signer: bool,
    pub is_writable: bool,
}

impl SolAccountMeta {
    pub fn writable(pubkey: [u8; 32], is_signer: bool) -> Self {
        Self { pubkey, is_signer, is_writable: true }
    }
}

/// An instruction before it is compiled into a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolInstruction {
    pub program_id: [u8; 32],
    pub accounts: Vec<SolAccountMeta>,
    pub data: Vec<u8>,
}

/// A compiled, unsigned legacy transaction message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolTransaction {
    /// All account keys referenced by this transaction, in canonical order:
    ///   1. writable signers (fee payer first)
    ///   2. read-only signers
    ///   3. writable non-signers
    ///   4. read-only non-signers
    pub account_keys: Vec<[u8; 32]>,

    pub num_required_signatures: u8,
    pub num_readonly_signed: u8,
    pub num_readonly_unsigned: u8,

    pub recent_blockhash: [u8; 32],

    pub compiled_instructions: Vec<CompiledInstruction>,
}

impl SolTransaction {
    pub fn fee_payer(&self) -> Option<&[u8; 32]> {
        self.account_keys.first()
    }
}

/// An instruction whose account references are indices into `account_keys`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub account_indices: Vec<u8>,
    pub data: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------------

/// Compile instructions into a message with a single fee payer at index 0.
pub fn compile_transaction(
    instructions: &[SolInstruction],
    fee_payer: &[u8; 32],
    recent_blockhash: &[u8; 32],
) -> Result<SolTransaction, SolError> {
    struct AccountEntry {
        pubkey: [u8; 32],
        is_signer: bool,
        is_writable: bool,
    }

    // Instruction account lists are tiny, a linear scan beats a map here.
    let mut entries: Vec<AccountEntry> = Vec::new();
    let mut upsert = |pubkey: [u8; 32], signer: bool, writable: bool| {
        if let Some(entry) = entries.iter_mut().find(|e| e.pubkey == pubkey) {
            entry.is_signer |= signer;
            entry.is_writable |= writable;
        } else {
            entries.push(AccountEntry {
                pubkey,
                is_signer: signer,
                is_writable: writable,
            });
        }
    };

    upsert(*fee_payer, true, true);
    for ix in instructions {
        for meta in &ix.accounts {
            upsert(meta.pubkey, meta.is_signer, meta.is_writable);
        }
        upsert(ix.program_id, false, false);
    }

    // Stable sort keeps insertion order inside each class, so the fee payer
    // (first writable signer inserted) stays at index 0.
    entries.sort_by_key(|e| match (e.is_signer, e.is_writable) {
        (true, true) => 0u8,
        (true, false) => 1,
        (false, true) => 2,
        (false, false) => 3,
    });

    if entries.len() > u8::MAX as usize + 1 {
        return Err(SolError::TransactionBuildError(format!(
            "{} account keys exceed the u8 index space",
            entries.len()
        )));
    }

    let count = |f: fn(&AccountEntry) -> bool| entries.iter().filter(|e| f(e)).count() as u8;
    let num_required_signatures = count(|e: &AccountEntry| e.is_signer);
    let num_readonly_signed = count(|e: &AccountEntry| e.is_signer && !e.is_writable);
    let num_readonly_unsigned = count(|e: &AccountEntry| !e.is_signer && !e.is_writable);

    let account_keys: Vec<[u8; 32]> = entries.iter().map(|e| e.pubkey).collect();
    let index_of = |key: &[u8; 32], what: &str| -> Result<u8, SolError> {
        account_keys
            .iter()
            .position(|k| k == key)
            .map(|i| i as u8)
            .ok_or_else(|| SolError::TransactionBuildError(format!("{what} not in account keys")))
    };

    let mut compiled_instructions = Vec::with_capacity(instructions.len());
    for ix in instructions {
        let program_id_index = index_of(&ix.program_id, "program_id")?;
        let account_indices = ix
            .accounts
            .iter()
            .map(|meta| index_of(&meta.pubkey, "account"))
            .collect::<Result<Vec<_>, _>>()?;

        compiled_instructions.push(CompiledInstruction {
            program_id_index,
            account_indices,
            data: ix.data.clone(),
        });
    }

    Ok(SolTransaction {
        account_keys,
        num_required_signatures,
        num_readonly_signed,
        num_readonly_unsigned,
        recent_blockhash: *recent_blockhash,
        compiled_instructions,
    })
}

/// Serialize the message (the bytes every signer signs).
pub fn serialize_message(tx: &SolTransaction) -> Result<Vec<u8>, SolError> {
    let len_u16 = |len: usize, what: &str| -> Result<u16, SolError> {
        u16::try_from(len)
            .map_err(|_| SolError::SerializationError(format!("{what} length {len} overflows u16")))
    };

    let mut buf = Vec::with_capacity(256);
    buf.push(tx.num_required_signatures);
    buf.push(tx.num_readonly_signed);
    buf.push(tx.num_readonly_unsigned);

    buf.extend_from_slice(&encode_compact_u16(len_u16(tx.account_keys.len(), "account keys")?));
    for key in &tx.account_keys {
        buf.extend_from_slice(key);
    }

    buf.extend_from_slice(&tx.recent_blockhash);

    buf.extend_from_slice(&encode_compact_u16(len_u16(
        tx.compiled_instructions.len(),
        "instructions",
    )?));
    for ix in &tx.compiled_instructions {
        buf.push(ix.program_id_index);
        buf.extend_from_slice(&encode_compact_u16(len_u16(ix.account_indices.len(), "indices")?));
        buf.extend_from_slice(&ix.account_indices);
        buf.extend_from_slice(&encode_compact_u16(len_u16(ix.data.len(), "data")?));
        buf.extend_from_slice(&ix.data);
    }

    Ok(buf)
}

/// Wire bytes with every signature slot zeroed, the shape wallets expect to
/// receive for signing.
pub fn unsigned_wire(num_required_signatures: u8, message: &[u8]) -> Vec<u8> {
    let slots = vec![[0u8; 64]; num_required_signatures as usize];
    encode_wire(&slots, message)
}

/// Concatenate signatures and message into wire bytes.
pub fn encode_wire(signatures: &[[u8; 64]], message: &[u8]) -> Vec<u8> {
    let mut wire = Vec::with_capacity(3 + 64 * signatures.len() + message.len());
    wire.extend_from_slice(&encode_compact_u16(signatures.len() as u16));
    for sig in signatures {
        wire.extend_from_slice(sig);
    }
    wire.extend_from_slice(message);
    wire
}

// ---------------------------------------------------------------------------
// Signed transactions
// ---------------------------------------------------------------------------

/// A signed transaction split into its signature slots and message bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub signatures: Vec<[u8; 64]>,
    pub message: Vec<u8>,
    /// The signer keys, i.e. the first `num_required_signatures` account keys.
    pub signers: Vec<[u8; 32]>,
}

impl SignedTransaction {
    /// Parse signed wire bytes.
    pub fn from_wire(wire: &[u8]) -> Result<Self, SolError> {
        if wire.len() > PACKET_DATA_SIZE {
            return Err(SolError::SerializationError(format!(
                "transaction is {} bytes, limit is {PACKET_DATA_SIZE}",
                wire.len()
            )));
        }

        let (num_sigs, prefix) = decode_compact_u16(wire)?;
        if num_sigs == 0 {
            return Err(SolError::SignatureError("transaction has zero signatures".into()));
        }

        let sigs_end = prefix + num_sigs as usize * 64;
        if sigs_end > wire.len() {
            return Err(SolError::SerializationError(
                "transaction too short: signature slots exceed length".into(),
            ));
        }
        let signatures = wire[prefix..sigs_end]
            .chunks_exact(64)
            .map(|chunk| {
                let mut sig = [0u8; 64];
                sig.copy_from_slice(chunk);
                sig
            })
            .collect::<Vec<_>>();

        let message = wire[sigs_end..].to_vec();
        if message.len() < 4 {
            return Err(SolError::SerializationError("transaction message too short".into()));
        }

        let num_required = message[0] as usize;
        if num_required != signatures.len() {
            return Err(SolError::SignatureError(format!(
                "message requires {num_required} signatures, transaction carries {}",
                signatures.len()
            )));
        }

        let (num_accounts, compact_len) = decode_compact_u16(&message[3..])?;
        let keys_start = 3 + compact_len;
        let keys_end = keys_start + num_accounts as usize * 32;
        if keys_end > message.len() || (num_accounts as usize) < num_required {
            return Err(SolError::SerializationError(
                "transaction message too short for account keys".into(),
            ));
        }

        let signers = message[keys_start..keys_start + num_required * 32]
            .chunks_exact(32)
            .map(|chunk| {
                let mut key = [0u8; 32];
                key.copy_from_slice(chunk);
                key
            })
            .collect();

        Ok(Self {
            signatures,
            message,
            signers,
        })
    }

    /// The fee payer's signature, which is also the transaction id.
    pub fn fee_payer_signature(&self) -> &[u8; 64] {
        &self.signatures[0]
    }

    /// Verify every signature slot against its signer key.
    pub fn verify(&self) -> Result<(), SolError> {
        for (i, (sig, key)) in self.signatures.iter().zip(&self.signers).enumerate() {
            verify_signature(key, &self.message, sig)
                .map_err(|e| SolError::SignatureError(format!("signature {i}: {e}")))?;
        }
        Ok(())
    }

    pub fn to_wire(&self) -> Vec<u8> {
        encode_wire(&self.signatures, &self.message)
    }
}

/// Strict Ed25519 verification of `signature` over `message` by `pubkey`.
pub fn verify_signature(pubkey: &[u8; 32], message: &[u8], signature: &[u8; 64]) -> Result<(), SolError> {
    let key = VerifyingKey::from_bytes(pubkey)
        .map_err(|e| SolError::InvalidPublicKey(e.to_string()))?;
    key.verify_strict(message, &Signature::from_bytes(signature))
        .map_err(|_| SolError::SignatureError("verification failed".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pda::SYSTEM_PROGRAM_ID;
    use ed25519_dalek::{Signer, SigningKey};

    fn transfer_ix(from: [u8; 32], to: [u8; 32], lamports: u64) -> SolInstruction {
        let mut data = Vec::with_capacity(12);
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&lamports.to_le_bytes());
        SolInstruction {
            program_id: SYSTEM_PROGRAM_ID,
            accounts: vec![
                SolAccountMeta::writable(from, true),
                SolAccountMeta::writable(to, false),
            ],
            data,
        }
    }

    fn sign_wire(key: &SigningKey, tx: &SolTransaction) -> Vec<u8> {
        let message = serialize_message(tx).unwrap();
        let sig = key.sign(&message).to_bytes();
        encode_wire(&[sig], &message)
    }

    // -- compact-u16 --------------------------------------------------------

    #[test]
    fn compact_u16_encoding_boundaries() {
        assert_eq!(encode_compact_u16(0), vec![0x00]);
        assert_eq!(encode_compact_u16(0x7f), vec![0x7f]);
        assert_eq!(encode_compact_u16(128), vec![0x80, 0x01]);
        assert_eq!(encode_compact_u16(16383), vec![0xff, 0x7f]);
        assert_eq!(encode_compact_u16(16384), vec![0x80, 0x80, 0x01]);
        assert_eq!(encode_compact_u16(u16::MAX), vec![0xff, 0xff, 0x03]);
    }

    #[test]
    fn compact_u16_decoding() {
        assert_eq!(decode_compact_u16(&[0x00]).unwrap(), (0, 1));
        assert_eq!(decode_compact_u16(&[0x80, 0x01]).unwrap(), (128, 2));
        assert_eq!(decode_compact_u16(&[0x80, 0x80, 0x01]).unwrap(), (16384, 3));
        assert_eq!(decode_compact_u16(&[0x05, 0xff]).unwrap(), (5, 1));
    }

    #[test]
    fn compact_u16_truncated_or_overflowing() {
        assert!(decode_compact_u16(&[]).is_err());
        assert!(decode_compact_u16(&[0x80]).is_err());
        assert!(decode_compact_u16(&[0xff, 0xff, 0x7f]).is_err());
    }

    // -- compilation ----------------------------------------------------------

    #[test]
    fn fee_payer_is_first_and_program_is_readonly() {
        let from = [1u8; 32];
        let to = [2u8; 32];
        let tx = compile_transaction(&[transfer_ix(from, to, 1000)], &from, &[0xAA; 32]).unwrap();

        assert_eq!(tx.account_keys, vec![from, to, SYSTEM_PROGRAM_ID]);
        assert_eq!(tx.fee_payer(), Some(&from));
        assert_eq!(tx.num_required_signatures, 1);
        assert_eq!(tx.num_readonly_signed, 0);
        assert_eq!(tx.num_readonly_unsigned, 1);
        assert_eq!(tx.recent_blockhash, [0xAA; 32]);
    }

    #[test]
    fn separate_fee_payer_is_promoted_to_index_zero() {
        let payer = [9u8; 32];
        let from = [1u8; 32];
        let to = [2u8; 32];
        let tx = compile_transaction(&[transfer_ix(from, to, 1)], &payer, &[0; 32]).unwrap();

        assert_eq!(tx.account_keys[0], payer);
        assert_eq!(tx.account_keys[1], from);
        assert_eq!(tx.num_required_signatures, 2);
    }

    #[test]
    fn duplicate_accounts_are_merged_with_widest_permissions() {
        let key = [0xAAu8; 32];
        let tx = compile_transaction(&[transfer_ix(key, key, 100)], &key, &[0; 32]).unwrap();

        assert_eq!(tx.account_keys.len(), 2);
        assert_eq!(tx.compiled_instructions[0].account_indices, vec![0, 0]);
    }

    #[test]
    fn compiled_indices_point_at_keys() {
        let from = [1u8; 32];
        let to = [2u8; 32];
        let tx = compile_transaction(&[transfer_ix(from, to, 100)], &from, &[0; 32]).unwrap();
        let cix = &tx.compiled_instructions[0];

        assert_eq!(tx.account_keys[cix.program_id_index as usize], SYSTEM_PROGRAM_ID);
        assert_eq!(cix.account_indices, vec![0, 1]);
        assert_eq!(cix.data.len(), 12);
    }

    // -- serialization --------------------------------------------------------

    #[test]
    fn message_layout() {
        let from = [1u8; 32];
        let to = [2u8; 32];
        let blockhash = [0xCCu8; 32];
        let tx = compile_transaction(&[transfer_ix(from, to, 500)], &from, &blockhash).unwrap();
        let msg = serialize_message(&tx).unwrap();

        assert_eq!(&msg[..3], &[1, 0, 1]);
        assert_eq!(msg[3], 3);
        let offset = 4 + 32 * 3;
        assert_eq!(&msg[offset..offset + 32], &blockhash);
        assert_eq!(msg[offset + 32], 1);
    }

    #[test]
    fn unsigned_wire_has_zeroed_slots() {
        let from = [1u8; 32];
        let tx = compile_transaction(&[transfer_ix(from, [2; 32], 5)], &from, &[0; 32]).unwrap();
        let message = serialize_message(&tx).unwrap();
        let wire = unsigned_wire(tx.num_required_signatures, &message);

        assert_eq!(wire[0], 1);
        assert!(wire[1..65].iter().all(|b| *b == 0));
        assert_eq!(&wire[65..], message.as_slice());
    }

    // -- signed wire ----------------------------------------------------------

    #[test]
    fn parse_and_verify_signed_wire() {
        let key = SigningKey::from_bytes(&[0x42u8; 32]);
        let from = key.verifying_key().to_bytes();
        let tx = compile_transaction(&[transfer_ix(from, [0xBB; 32], 1_000_000)], &from, &[0xCC; 32])
            .unwrap();
        let wire = sign_wire(&key, &tx);

        let signed = SignedTransaction::from_wire(&wire).unwrap();
        assert_eq!(signed.signers, vec![from]);
        assert_eq!(signed.message, serialize_message(&tx).unwrap());
        assert!(signed.verify().is_ok());
        assert_eq!(signed.to_wire(), wire);
    }

    #[test]
    fn tampered_message_fails_verification() {
        let key = SigningKey::from_bytes(&[0x55u8; 32]);
        let from = key.verifying_key().to_bytes();
        let tx = compile_transaction(&[transfer_ix(from, [0x77; 32], 42)], &from, &[0x99; 32]).unwrap();
        let mut wire = sign_wire(&key, &tx);
        let last = wire.len() - 1;
        wire[last] ^= 0x01;

        let signed = SignedTransaction::from_wire(&wire).unwrap();
        assert!(signed.verify().is_err());
    }

    #[test]
    fn zeroed_signature_fails_verification() {
        let key = SigningKey::from_bytes(&[0x11u8; 32]);
        let from = key.verifying_key().to_bytes();
        let tx = compile_transaction(&[transfer_ix(from, [2; 32], 1)], &from, &[0; 32]).unwrap();
        let message = serialize_message(&tx).unwrap();
        let signed = SignedTransaction::from_wire(&unsigned_wire(1, &message)).unwrap();

        assert!(signed.verify().is_err());
    }

    #[test]
    fn malformed_wire_is_rejected() {
        assert!(SignedTransaction::from_wire(&[]).is_err());
        assert!(SignedTransaction::from_wire(&[0x01]).is_err());

        let err = SignedTransaction::from_wire(&[0x00, 0x01, 0x00, 0x00]).unwrap_err();
        assert!(err.to_string().contains("zero signatures"));

        let oversized = vec![0u8; PACKET_DATA_SIZE + 1];
        assert!(SignedTransaction::from_wire(&oversized).is_err());
    }

    #[test]
    fn signature_count_must_match_header() {
        let from = [1u8; 32];
        let tx = compile_transaction(&[transfer_ix(from, [2; 32], 5)], &from, &[0; 32]).unwrap();
        let message = serialize_message(&tx).unwrap();
        let wire = encode_wire(&[[0u8; 64], [0u8; 64]], &message);

        let err = SignedTransaction::from_wire(&wire).unwrap_err();
        assert!(err.to_string().contains("requires 1 signatures"));
    }

    #[test]
    fn verify_signature_rejects_other_key() {
        let a = SigningKey::from_bytes(&[0x01u8; 32]);
        let b = SigningKey::from_bytes(&[0x02u8; 32]);
        let sig = a.sign(b"payload").to_bytes();

        assert!(verify_signature(&a.verifying_key().to_bytes(), b"payload", &sig).is_ok());
        assert!(verify_signature(&b.verifying_key().to_bytes(), b"payload", &sig).is_err());
    }
}
