use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::QuestError;

/// Unix timestamp (seconds, UTC). On-chain values are block timestamps.
pub type Timestamp = i64;

/// EVM chain identifier (EIP-155).
pub type ChainId = u64;

/// Experience points. Rewards are non-negative integers.
pub type Xp = u64;

fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s)
}

// ── EvmAddress ───────────────────────────────────────────────────────────────

/// 20-byte EVM account or contract address.
///
/// Parsing is case-insensitive (checksummed input is accepted as-is) and the
/// canonical rendering is lower-case, which is what every storage key uses.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "[u8; 20]", into = "[u8; 20]")]
pub struct EvmAddress(pub Address);

impl EvmAddress {
    pub fn from_bytes(b: [u8; 20]) -> Self {
        Self(Address::new(b))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0 .0 .0
    }

    pub fn address(&self) -> Address {
        self.0
    }

    pub fn parse(s: &str) -> Result<Self, QuestError> {
        let trimmed = s.trim();
        Address::from_str(strip_0x(trimmed))
            .map(Self)
            .map_err(|_| QuestError::InvalidAddress(trimmed.to_string()))
    }

    /// `0x`-prefixed lower-case hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl From<Address> for EvmAddress {
    fn from(a: Address) -> Self {
        Self(a)
    }
}

impl From<[u8; 20]> for EvmAddress {
    fn from(b: [u8; 20]) -> Self {
        Self::from_bytes(b)
    }
}

impl From<EvmAddress> for [u8; 20] {
    fn from(a: EvmAddress) -> Self {
        *a.as_bytes()
    }
}

impl FromStr for EvmAddress {
    type Err = QuestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EvmAddress({})", &self.to_hex()[..10])
    }
}

// ── TxHash ───────────────────────────────────────────────────────────────────

/// 32-byte transaction hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "[u8; 32]", into = "[u8; 32]")]
pub struct TxHash(pub B256);

impl TxHash {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(B256::new(b))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0 .0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(s: &str) -> Result<Self, QuestError> {
        B256::from_str(strip_0x(s.trim()))
            .map(Self)
            .map_err(|_| QuestError::InvalidTxHash(s.to_string()))
    }
}

impl From<B256> for TxHash {
    fn from(h: B256) -> Self {
        Self(h)
    }
}

impl From<[u8; 32]> for TxHash {
    fn from(b: [u8; 32]) -> Self {
        Self::from_bytes(b)
    }
}

impl From<TxHash> for [u8; 32] {
    fn from(h: TxHash) -> Self {
        *h.as_bytes()
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({}…)", &self.to_hex()[..18])
    }
}

/// Comma-join hashes in the order given.
pub fn join_tx_hashes(hashes: &[TxHash]) -> String {
    hashes
        .iter()
        .map(TxHash::to_hex)
        .collect::<Vec<_>>()
        .join(crate::constants::TX_HASH_SEPARATOR)
}

// ── Selector ─────────────────────────────────────────────────────────────────

/// 4-byte function selector: the leading bytes of a call's input data.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Selector(pub [u8; 4]);

impl Selector {
    pub fn from_bytes(b: [u8; 4]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// True when `input` is calldata for this selector.
    pub fn matches(&self, input: &[u8]) -> bool {
        input.len() >= 4 && input[..4] == self.0
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Selector({})", self.to_hex())
    }
}

// ── SubjectKey ───────────────────────────────────────────────────────────────

/// What a completion is recorded against.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    #[default]
    Quest,
    Task,
}

impl SubjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectKind::Quest => "quest",
            SubjectKind::Task => "task",
        }
    }
}

impl FromStr for SubjectKind {
    type Err = QuestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quest" => Ok(SubjectKind::Quest),
            "task" => Ok(SubjectKind::Task),
            other => Err(QuestError::UnknownSubject(format!("subject kind {other:?}"))),
        }
    }
}

/// A quest or campaign task, identified by its authored id.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Debug)]
pub struct SubjectKey {
    pub kind: SubjectKind,
    pub id: String,
}

impl SubjectKey {
    pub fn quest(id: impl Into<String>) -> Self {
        Self { kind: SubjectKind::Quest, id: id.into() }
    }

    pub fn task(id: impl Into<String>) -> Self {
        Self { kind: SubjectKind::Task, id: id.into() }
    }

    /// Byte key for storage: `kind:id`. Ids never contain NUL, which is used
    /// as a separator in composite keys.
    pub fn storage_key(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    pub fn validate(&self) -> Result<(), QuestError> {
        if self.id.trim().is_empty() {
            return Err(QuestError::MissingField("id"));
        }
        if self.id.contains('\0') {
            return Err(QuestError::UnknownSubject(format!("{}:<invalid id>", self.kind.as_str())));
        }
        Ok(())
    }
}

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_parsing_is_case_insensitive() {
        let lower = EvmAddress::parse("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48").unwrap();
        let checksummed = EvmAddress::parse("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48").unwrap();
        assert_eq!(lower, checksummed);
        assert_eq!(checksummed.to_hex(), "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
    }

    #[test]
    fn address_wraps_alloy_primitive() {
        let raw = alloy_primitives::address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
        let parsed = EvmAddress::parse("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48").unwrap();
        assert_eq!(EvmAddress::from(raw), parsed);
        assert_eq!(parsed.address(), raw);
        assert_eq!(parsed.as_bytes()[0], 0xa0);
    }

    #[test]
    fn tx_hash_parsing() {
        let h = TxHash::from_hex(&format!("0x{}", "ab".repeat(32))).unwrap();
        assert_eq!(h, TxHash::from_bytes([0xab; 32]));
        assert!(TxHash::from_hex("0xabcd").is_err());
    }

    #[test]
    fn address_rejects_bad_length_and_chars() {
        assert!(EvmAddress::parse("0x1234").is_err());
        assert!(EvmAddress::parse("0xzz b86991c6218b36c1d19d4a2e9eb0ce3606eb48").is_err());
        assert!(EvmAddress::parse("").is_err());
    }

    #[test]
    fn selector_matches_calldata_prefix() {
        let sel = Selector::from_bytes([0xa9, 0x05, 0x9c, 0xbb]);
        assert!(sel.matches(&[0xa9, 0x05, 0x9c, 0xbb, 0x00, 0x01]));
        assert!(!sel.matches(&[0xa9, 0x05, 0x9c]));
        assert!(!sel.matches(&[0x00, 0x05, 0x9c, 0xbb]));
        assert_eq!(sel.to_hex(), "0xa9059cbb");
    }

    #[test]
    fn joined_hashes_keep_order() {
        let a = TxHash::from_bytes([1u8; 32]);
        let b = TxHash::from_bytes([2u8; 32]);
        let joined = join_tx_hashes(&[b, a]);
        let parts: Vec<_> = joined.split(',').collect();
        assert_eq!(parts, vec![b.to_hex(), a.to_hex()]);
    }

    #[test]
    fn subject_key_renders_kind_prefix() {
        assert_eq!(SubjectKey::quest("q-1").to_string(), "quest:q-1");
        assert_eq!(SubjectKey::task("t-9").storage_key(), b"task:t-9".to_vec());
        assert_eq!("TASK".parse::<SubjectKind>().unwrap(), SubjectKind::Task);
        assert!(SubjectKey::quest("  ").validate().is_err());
    }
}
