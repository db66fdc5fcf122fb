use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use questlink_chain::{ActivityQuery, ActivitySource, ChainCatalog};
use questlink_core::error::QuestError;
use questlink_core::quest::{VerificationFunction, VerificationLogic, VerificationPlan};
use questlink_core::types::{ChainId, EvmAddress, Selector, Timestamp, TxHash};
use questlink_core::window::{check_window, clamp, WindowCheck};
use questlink_crypto::compute_function_selector;

/// One function-match check with its selector already computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionCheck {
    pub contract: EvmAddress,
    pub selector: Selector,
    pub chain_id: ChainId,
}

impl FunctionCheck {
    pub fn from_function(f: &VerificationFunction) -> Result<Self, QuestError> {
        Ok(Self {
            contract: f.contract_address,
            selector: compute_function_selector(&f.function_signature)?,
            chain_id: f.chain_id,
        })
    }
}

/// What the chain says. None of these is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Verified {
        /// Configured order. One entry for single and OR checks.
        tx_hashes: Vec<TxHash>,
        /// Earliest block timestamp among the matched transactions.
        verified_at: Timestamp,
    },
    NoActivityFound,
    DurationExceeded { observed: Timestamp, window_secs: u64 },
}

impl VerificationOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, VerificationOutcome::Verified { .. })
    }
}

pub struct VerificationEngine {
    catalog: Arc<dyn ChainCatalog>,
    source: Arc<dyn ActivitySource>,
}

impl VerificationEngine {
    pub fn new(catalog: Arc<dyn ChainCatalog>, source: Arc<dyn ActivitySource>) -> Self {
        Self { catalog, source }
    }

    pub fn catalog(&self) -> &dyn ChainCatalog {
        self.catalog.as_ref()
    }

    /// Run whichever checks `plan` describes.
    pub async fn verify_plan(
        &self,
        wallet: &EvmAddress,
        plan: &VerificationPlan,
        duration_secs: u64,
        now: Timestamp,
    ) -> Result<VerificationOutcome, QuestError> {
        match plan {
            VerificationPlan::Single(f) => {
                let check = FunctionCheck::from_function(f)?;
                self.verify_user_transaction(wallet, &check.contract, check.selector, check.chain_id, duration_secs, now)
                    .await
            }
            VerificationPlan::Multi { functions, logic } => {
                let checks = functions
                    .iter()
                    .map(FunctionCheck::from_function)
                    .collect::<Result<Vec<_>, _>>()?;
                self.verify_multiple_functions(wallet, &checks, *logic, duration_secs, now).await
            }
        }
    }

    /// Did `wallet` successfully call `selector` on `contract` within the
    /// (clamped) window ending at `now`?
    pub async fn verify_user_transaction(
        &self,
        wallet: &EvmAddress,
        contract: &EvmAddress,
        selector: Selector,
        chain_id: ChainId,
        duration_secs: u64,
        now: Timestamp,
    ) -> Result<VerificationOutcome, QuestError> {
        let window_secs = clamp(duration_secs);
        let chain = self.catalog.resolve(chain_id)?;
        let query = ActivityQuery {
            chain_id,
            wallet: *wallet,
            contract: *contract,
            selector,
            window_secs,
            now,
        };

        let outcome = match self.source.latest_activity(&chain, &query).await? {
            None => VerificationOutcome::NoActivityFound,
            Some(activity) => match check_window(now, activity.timestamp, window_secs) {
                WindowCheck::Within => VerificationOutcome::Verified {
                    tx_hashes: vec![activity.tx_hash],
                    verified_at: activity.timestamp,
                },
                WindowCheck::NoActivity => VerificationOutcome::NoActivityFound,
                WindowCheck::Exceeded { observed, window_secs } => {
                    VerificationOutcome::DurationExceeded { observed, window_secs }
                }
            },
        };

        debug!(
            chain_id,
            wallet = %wallet,
            contract = %contract,
            selector = %selector,
            window_secs,
            verified = outcome.is_verified(),
            "function check"
        );
        Ok(outcome)
    }

    /// Combine several checks.
    ///
    /// `Or` walks the list in order and stops at the first verified check. A
    /// failed check does not stop the walk, but if nothing verifies the first
    /// failure is returned since it may have hidden a match.
    ///
    /// `And` runs every check concurrently. Any failure fails the whole call.
    pub async fn verify_multiple_functions(
        &self,
        wallet: &EvmAddress,
        checks: &[FunctionCheck],
        logic: VerificationLogic,
        duration_secs: u64,
        now: Timestamp,
    ) -> Result<VerificationOutcome, QuestError> {
        if checks.is_empty() {
            return Err(QuestError::MissingField("verificationFunctions"));
        }

        match logic {
            VerificationLogic::Or => {
                let mut first_err = None;
                let mut miss = VerificationOutcome::NoActivityFound;
                for check in checks {
                    match self
                        .verify_user_transaction(wallet, &check.contract, check.selector, check.chain_id, duration_secs, now)
                        .await
                    {
                        Ok(verified @ VerificationOutcome::Verified { .. }) => return Ok(verified),
                        Ok(exceeded @ VerificationOutcome::DurationExceeded { .. }) => {
                            if miss == VerificationOutcome::NoActivityFound {
                                miss = exceeded;
                            }
                        }
                        Ok(VerificationOutcome::NoActivityFound) => {}
                        Err(e) => {
                            warn!(chain_id = check.chain_id, error = %e, "OR branch failed");
                            first_err.get_or_insert(e);
                        }
                    }
                }
                match first_err {
                    Some(e) => Err(e),
                    None => Ok(miss),
                }
            }
            VerificationLogic::And => {
                let results = join_all(checks.iter().map(|check| {
                    self.verify_user_transaction(wallet, &check.contract, check.selector, check.chain_id, duration_secs, now)
                }))
                .await
                .into_iter()
                .collect::<Result<Vec<_>, _>>()?;

                let mut tx_hashes = Vec::with_capacity(checks.len());
                let mut earliest = Timestamp::MAX;
                for outcome in results {
                    match outcome {
                        VerificationOutcome::Verified { tx_hashes: hashes, verified_at } => {
                            tx_hashes.extend(hashes);
                            earliest = earliest.min(verified_at);
                        }
                        miss => return Ok(miss),
                    }
                }
                Ok(VerificationOutcome::Verified { tx_hashes, verified_at: earliest })
            }
        }
    }
}
