use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use questlink_core::error::QuestError;
use questlink_core::types::{ChainId, EvmAddress, Selector, Timestamp, TxHash};
use questlink_crypto::compute_function_selector;

use crate::catalog::ChainDescriptor;
use crate::source::{Activity, ActivityQuery, ActivitySource};

type ActivityKey = (ChainId, EvmAddress, EvmAddress, Selector);

/// In-memory activity source with a call counter.
///
/// Backs offline runs of the node (`--offline-activity`) and the test suites.
#[derive(Default)]
pub struct StaticActivitySource {
    activity: Mutex<HashMap<ActivityKey, Vec<Activity>>>,
    failing_chains: Mutex<Vec<ChainId>>,
    calls: AtomicUsize,
}

/// One recorded call, as written in an offline fixture file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityFixture {
    pub chain_id: ChainId,
    pub wallet: String,
    pub contract: String,
    pub function_signature: String,
    pub tx_hash: String,
    #[serde(default)]
    pub block_number: u64,
    pub timestamp: Timestamp,
}

impl StaticActivitySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixtures(fixtures: &[ActivityFixture]) -> Result<Self, QuestError> {
        let source = Self::new();
        for f in fixtures {
            source.record(
                f.chain_id,
                EvmAddress::parse(&f.wallet)?,
                EvmAddress::parse(&f.contract)?,
                compute_function_selector(&f.function_signature)?,
                Activity {
                    tx_hash: TxHash::from_hex(&f.tx_hash)?,
                    block_number: f.block_number,
                    timestamp: f.timestamp,
                },
            );
        }
        Ok(source)
    }

    pub fn record(
        &self,
        chain_id: ChainId,
        wallet: EvmAddress,
        contract: EvmAddress,
        selector: Selector,
        activity: Activity,
    ) {
        let mut map = self.activity.lock().unwrap_or_else(|p| p.into_inner());
        map.entry((chain_id, wallet, contract, selector)).or_default().push(activity);
    }

    /// Make every query against `chain_id` fail as a transport error.
    pub fn fail_chain(&self, chain_id: ChainId) {
        self.failing_chains.lock().unwrap_or_else(|p| p.into_inner()).push(chain_id);
    }

    /// Number of `latest_activity` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActivitySource for StaticActivitySource {
    async fn latest_activity(
        &self,
        chain: &ChainDescriptor,
        query: &ActivityQuery,
    ) -> Result<Option<Activity>, QuestError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self
            .failing_chains
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains(&chain.chain_id)
        {
            return Err(QuestError::rpc(chain.chain_id, "simulated transport failure"));
        }

        let map = self.activity.lock().unwrap_or_else(|p| p.into_inner());
        Ok(map
            .get(&(query.chain_id, query.wallet, query.contract, query.selector))
            .and_then(|entries| entries.iter().max_by_key(|a| a.timestamp).copied()))
    }
}
