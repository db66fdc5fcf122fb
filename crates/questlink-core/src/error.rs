use thiserror::Error;

use crate::types::ChainId;

/// How a failure should be surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Client-correctable; no side effects happened.
    Input,
    /// Chain transport failed; outcome unknown, safe to retry.
    Transport,
    /// Storage failed. After a positive verification this means a reward may
    /// not have been recorded.
    Ledger,
}

#[derive(Debug, Error)]
pub enum QuestError {
    // ── Input errors ─────────────────────────────────────────────────────────
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid function signature: {0}")]
    InvalidSignature(String),

    #[error("invalid transaction hash: {0}")]
    InvalidTxHash(String),

    #[error("chain not supported: {0}")]
    ChainNotSupported(ChainId),

    #[error("unknown {0}")]
    UnknownSubject(String),

    #[error("invalid verification config for {subject}: {reason}")]
    InvalidConfig { subject: String, reason: String },

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    // ── Transport errors ─────────────────────────────────────────────────────
    #[error("rpc call failed on chain {chain_id}: {reason}")]
    RpcCallFailed { chain_id: ChainId, reason: String },

    #[error("verification did not finish within {budget_ms} ms")]
    VerificationTimedOut { budget_ms: u64 },

    // ── Serialization / storage ──────────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("xp balance overflow for {0}")]
    BalanceOverflow(String),
}

impl QuestError {
    pub fn class(&self) -> ErrorClass {
        match self {
            QuestError::InvalidAddress(_)
            | QuestError::InvalidSignature(_)
            | QuestError::InvalidTxHash(_)
            | QuestError::ChainNotSupported(_)
            | QuestError::UnknownSubject(_)
            | QuestError::InvalidConfig { .. }
            | QuestError::MissingField(_) => ErrorClass::Input,
            QuestError::RpcCallFailed { .. } | QuestError::VerificationTimedOut { .. } => {
                ErrorClass::Transport
            }
            QuestError::Serialization(_)
            | QuestError::Storage(_)
            | QuestError::BalanceOverflow(_) => ErrorClass::Ledger,
        }
    }

    /// Transport and ledger faults may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self.class(), ErrorClass::Input)
    }

    pub fn rpc(chain_id: ChainId, reason: impl Into<String>) -> Self {
        QuestError::RpcCallFailed { chain_id, reason: reason.into() }
    }
}
