use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::PresaleError;

/// A 32-byte Solana account address, Base58 in text form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 32]);

impl Address {
    pub const fn new_from_array(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn to_bytes(self) -> [u8; 32] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for Address {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl FromStr for Address {
    type Err = PresaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        chain_sol::address_to_bytes(s)
            .map(Self)
            .map_err(|e| PresaleError::Config(format!("{s:?}: {e}")))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&chain_sol::bytes_to_address(&self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Network assurance tiers, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }

    /// Whether a status observed at `self` meets the `required` tier.
    pub fn satisfies(&self, required: Commitment) -> bool {
        *self >= required
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Commitment {
    type Err = PresaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "processed" => Ok(Commitment::Processed),
            "confirmed" => Ok(Commitment::Confirmed),
            "finalized" => Ok(Commitment::Finalized),
            other => Err(PresaleError::Config(format!("unknown commitment level {other:?}"))),
        }
    }
}

/// Base58 signature identifying a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn from_signature(signature: &[u8; 64]) -> Self {
        Self(chain_sol::signature_to_string(signature))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TransactionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a confirmed purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmationResult {
    pub signature: TransactionId,
    pub commitment: Commitment,
    pub slot: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_text_roundtrip() {
        let addr: Address = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA".parse().unwrap();
        assert_eq!(addr.to_bytes(), chain_sol::TOKEN_PROGRAM_ID);
        assert_eq!(addr.to_string(), "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");
        assert_eq!(
            format!("{addr:?}"),
            "Address(TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA)"
        );
    }

    #[test]
    fn address_serde_as_string() {
        let addr = Address::new_from_array([0u8; 32]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"11111111111111111111111111111111\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn bad_address_is_config_error() {
        let err = "xyz".parse::<Address>().unwrap_err();
        assert!(matches!(err, PresaleError::Config(_)));
        assert!(serde_json::from_str::<Address>("\"1\"").is_err());
    }

    #[test]
    fn commitment_ordering() {
        assert!(Commitment::Finalized.satisfies(Commitment::Processed));
        assert!(Commitment::Confirmed.satisfies(Commitment::Confirmed));
        assert!(!Commitment::Processed.satisfies(Commitment::Confirmed));
    }

    #[test]
    fn commitment_parsing() {
        assert_eq!("Confirmed".parse::<Commitment>().unwrap(), Commitment::Confirmed);
        assert_eq!(
            serde_json::from_str::<Commitment>("\"finalized\"").unwrap(),
            Commitment::Finalized
        );
        assert!("recent".parse::<Commitment>().is_err());
    }

    #[test]
    fn transaction_id_from_signature() {
        let id = TransactionId::from_signature(&[1u8; 64]);
        assert_eq!(chain_sol::signature_from_str(id.as_str()).unwrap(), [1u8; 64]);
    }
}
