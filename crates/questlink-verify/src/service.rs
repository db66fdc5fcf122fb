use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use questlink_core::error::QuestError;
use questlink_core::quest::QuestConfigDocument;
use questlink_core::types::{EvmAddress, SubjectKey, Timestamp};
use questlink_crypto::compute_function_selector;
use questlink_state::{CompletionProof, CompletionRecord, CompletionResult, LedgerDb};

use crate::engine::{VerificationEngine, VerificationOutcome};

/// Result of one verification request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyReport {
    /// A completion existed before (or was written concurrently with) this
    /// request. No reward was credited by this call.
    AlreadyCompleted(CompletionRecord),
    /// This call verified the action and credited the reward.
    Awarded(CompletionRecord),
    NotVerified(VerificationOutcome),
}

/// Ledger pre-check, chain verification under a time budget, then the
/// idempotent completion write.
pub struct QuestVerifier {
    ledger: Arc<LedgerDb>,
    engine: VerificationEngine,
    timeout: Duration,
}

impl QuestVerifier {
    pub fn new(ledger: Arc<LedgerDb>, engine: VerificationEngine, timeout: Duration) -> Self {
        Self { ledger, engine, timeout }
    }

    pub fn ledger(&self) -> &LedgerDb {
        &self.ledger
    }

    pub fn engine(&self) -> &VerificationEngine {
        &self.engine
    }

    pub async fn verify(
        &self,
        subject: &SubjectKey,
        wallet: &str,
        now: Timestamp,
    ) -> Result<VerifyReport, QuestError> {
        subject.validate()?;
        if wallet.trim().is_empty() {
            return Err(QuestError::MissingField("walletAddress"));
        }
        let wallet = EvmAddress::parse(wallet)?;

        if let Some(record) = self.ledger.get_completion(subject, &wallet)? {
            info!(subject = %subject, wallet = %wallet, "already completed");
            return Ok(VerifyReport::AlreadyCompleted(record));
        }

        let def = self
            .ledger
            .get_quest(subject)?
            .ok_or_else(|| QuestError::UnknownSubject(subject.to_string()))?;

        let outcome = tokio::time::timeout(
            self.timeout,
            self.engine.verify_plan(&wallet, &def.plan, def.duration_secs, now),
        )
        .await
        .map_err(|_| QuestError::VerificationTimedOut { budget_ms: self.timeout.as_millis() as u64 })??;

        let proof = match outcome {
            VerificationOutcome::Verified { tx_hashes, verified_at } => CompletionProof { tx_hashes, verified_at },
            miss => {
                info!(subject = %subject, wallet = %wallet, outcome = ?miss, "not verified");
                return Ok(VerifyReport::NotVerified(miss));
            }
        };

        match self
            .ledger
            .record_completion_if_absent(subject, &wallet, &proof, def.reward_xp, now)
        {
            Ok(CompletionResult::Recorded(record)) => {
                info!(subject = %subject, wallet = %wallet, xp = record.xp_awarded, "quest completed");
                Ok(VerifyReport::Awarded(record))
            }
            Ok(CompletionResult::AlreadyCompleted(record)) => Ok(VerifyReport::AlreadyCompleted(record)),
            Err(e) => {
                error!(subject = %subject, wallet = %wallet, error = %e, "verified on chain but ledger write failed");
                Err(e)
            }
        }
    }
}

/// Resolve authored documents and store them. Every signature must yield a
/// selector; the first bad document aborts the import.
pub fn import_definitions(ledger: &LedgerDb, docs: Vec<QuestConfigDocument>) -> Result<usize, QuestError> {
    let mut imported = 0;
    for doc in docs {
        let def = doc.resolve()?;
        for f in def.plan.functions() {
            compute_function_selector(&f.function_signature).map_err(|e| QuestError::InvalidConfig {
                subject: def.subject.to_string(),
                reason: e.to_string(),
            })?;
        }
        ledger.put_quest(&def)?;
        imported += 1;
    }
    Ok(imported)
}
