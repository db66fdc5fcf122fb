use serde::{Deserialize, Serialize};

use questlink_core::types::{join_tx_hashes, EvmAddress, SubjectKey, Timestamp, TxHash, Xp};

/// What a positive verification hands to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionProof {
    /// In configured order; more than one only for AND plans.
    pub tx_hashes: Vec<TxHash>,
    /// On-chain timestamp that satisfied the window.
    pub verified_at: Timestamp,
}

/// One wallet's completion of one quest or task. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub subject: SubjectKey,
    pub wallet: EvmAddress,
    /// Comma-joined `0x` hashes.
    pub tx_hashes: String,
    pub xp_awarded: Xp,
    /// Server wall clock at insert.
    pub completed_at: Timestamp,
    pub verified_at: Timestamp,
}

impl CompletionRecord {
    pub fn new(subject: SubjectKey, wallet: EvmAddress, proof: &CompletionProof, reward: Xp, now: Timestamp) -> Self {
        Self {
            subject,
            wallet,
            tx_hashes: join_tx_hashes(&proof.tx_hashes),
            xp_awarded: reward,
            completed_at: now,
            verified_at: proof.verified_at,
        }
    }

    /// First hash of the proof, as reported to callers.
    pub fn primary_tx_hash(&self) -> Option<&str> {
        self.tx_hashes.split(questlink_core::TX_HASH_SEPARATOR).next().filter(|h| !h.is_empty())
    }
}

/// Result of an insert-if-absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionResult {
    /// This call created the record and credited the reward.
    Recorded(CompletionRecord),
    /// A record already existed; nothing was written.
    AlreadyCompleted(CompletionRecord),
}

impl CompletionResult {
    pub fn record(&self) -> &CompletionRecord {
        match self {
            CompletionResult::Recorded(r) | CompletionResult::AlreadyCompleted(r) => r,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpBalance {
    pub wallet: EvmAddress,
    pub total_xp: Xp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl XpBalance {
    /// The balance of a wallet that has never been credited.
    pub fn zero(wallet: EvmAddress) -> Self {
        Self { wallet, total_xp: 0, created_at: 0, updated_at: 0 }
    }
}

/// Append-only reward log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpTransaction {
    pub id: u64,
    pub wallet: EvmAddress,
    pub amount: Xp,
    pub source: SubjectKey,
    pub verified_at: Timestamp,
    pub created_at: Timestamp,
}
