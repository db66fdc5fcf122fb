use std::fmt::Display;
use std::future::IntoFuture;
use std::time::Duration;

use alloy::consensus::Transaction as _;
use alloy::eips::BlockNumberOrTag;
use alloy::network::TransactionResponse;
use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{Block, BlockTransactionsKind};
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::{debug, trace, warn};

use questlink_core::constants::{
    DEFAULT_LOOKBACK_SECONDS, DEFAULT_MAX_SCAN_BLOCKS, DEFAULT_SCAN_BATCH_SIZE,
    DEFAULT_VERIFY_TIMEOUT_MS,
};
use questlink_core::error::QuestError;
use questlink_core::types::{ChainId, EvmAddress, Selector, Timestamp, TxHash};

use crate::catalog::ChainDescriptor;

type HttpProvider = RootProvider<Http<Client>>;

/// A qualifying call observed on chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activity {
    pub tx_hash: TxHash,
    pub block_number: u64,
    /// Block timestamp. Zero means "nothing observed" and never verifies.
    pub timestamp: Timestamp,
}

/// "Did `wallet` call `selector` on `contract` recently?"
#[derive(Debug, Clone)]
pub struct ActivityQuery {
    pub chain_id: ChainId,
    pub wallet: EvmAddress,
    pub contract: EvmAddress,
    pub selector: Selector,
    /// Already clamped by the window guard.
    pub window_secs: u64,
    pub now: Timestamp,
}

impl ActivityQuery {
    pub fn matches(&self, from: Address, to: Option<Address>, input: &[u8]) -> bool {
        EvmAddress::from(from) == self.wallet
            && to.map(EvmAddress::from) == Some(self.contract)
            && self.selector.matches(input)
    }

    /// Oldest timestamp that still counts as recent.
    pub fn window_start(&self) -> Timestamp {
        self.now.saturating_sub(self.window_secs as i64)
    }
}

/// Where the verification engine gets chain activity from.
#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// The most recent successful call matching `query`, or `None`.
    ///
    /// A source may return activity older than the window (so the caller can
    /// explain a near miss); the window decision belongs to the caller.
    /// `None` must mean the whole window was examined.
    async fn latest_activity(
        &self,
        chain: &ChainDescriptor,
        query: &ActivityQuery,
    ) -> Result<Option<Activity>, QuestError>;
}

// ── Block scanner ────────────────────────────────────────────────────────────

/// Tuning for [`RpcActivitySource`].
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Blocks fetched concurrently per step.
    pub batch_size: u64,
    /// Block budget for one check. Raised to cover the whole window when the
    /// chain's block time is known.
    pub max_scan_blocks: u64,
    /// History scanned past the window to report near misses.
    pub lookback_secs: u64,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_SCAN_BATCH_SIZE,
            max_scan_blocks: DEFAULT_MAX_SCAN_BLOCKS,
            lookback_secs: DEFAULT_LOOKBACK_SECONDS,
            request_timeout: Duration::from_millis(DEFAULT_VERIFY_TIMEOUT_MS),
        }
    }
}

impl ScanConfig {
    /// Blocks this scan may read on `chain` for a window of `window_secs`.
    pub fn block_cap(&self, chain: &ChainDescriptor, window_secs: u64) -> u64 {
        match chain.blocks_in(window_secs) {
            Some(blocks) => self.max_scan_blocks.max(blocks.saturating_add(1)),
            None => self.max_scan_blocks,
        }
    }
}

/// Walks back from the chain head over an alloy HTTP provider and returns
/// the newest transaction from the wallet to the contract whose calldata
/// starts with the selector and whose receipt succeeded.
///
/// Running out of block budget before the window start is reported as a
/// transport failure, never as "no activity".
pub struct RpcActivitySource {
    config: ScanConfig,
}

impl RpcActivitySource {
    pub fn new(config: ScanConfig) -> Result<Self, QuestError> {
        if config.max_scan_blocks == 0 {
            return Err(QuestError::InvalidConfig {
                subject: "max_scan_blocks".into(),
                reason: "must be positive".into(),
            });
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    fn provider(&self, chain: &ChainDescriptor) -> Result<HttpProvider, QuestError> {
        let url: reqwest::Url = chain
            .primary_rpc()?
            .parse()
            .map_err(|e| QuestError::rpc(chain.chain_id, format!("invalid rpc url: {e}")))?;
        Ok(ProviderBuilder::new().on_http(url))
    }

    /// Awaits one provider call under the request timeout.
    async fn call<F, T, E>(&self, chain_id: ChainId, what: &str, request: F) -> Result<T, QuestError>
    where
        F: IntoFuture<Output = Result<T, E>>,
        E: Display,
    {
        match tokio::time::timeout(self.config.request_timeout, request).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(QuestError::rpc(chain_id, format!("{what}: {e}"))),
            Err(_) => Err(QuestError::rpc(
                chain_id,
                format!("{what}: no response within {:?}", self.config.request_timeout),
            )),
        }
    }

    async fn block(&self, provider: &HttpProvider, chain_id: ChainId, number: u64) -> Result<Block, QuestError> {
        let block = self
            .call(
                chain_id,
                "eth_getBlockByNumber",
                provider.get_block_by_number(BlockNumberOrTag::Number(number), BlockTransactionsKind::Full),
            )
            .await?;
        block.ok_or_else(|| QuestError::rpc(chain_id, format!("block {number} not found")))
    }

    async fn succeeded(&self, provider: &HttpProvider, chain_id: ChainId, tx_hash: TxHash) -> Result<Option<bool>, QuestError> {
        let receipt = self
            .call(chain_id, "eth_getTransactionReceipt", provider.get_transaction_receipt(tx_hash.0))
            .await?;
        Ok(receipt.map(|r| r.status()))
    }
}

#[async_trait]
impl ActivitySource for RpcActivitySource {
    async fn latest_activity(
        &self,
        chain: &ChainDescriptor,
        query: &ActivityQuery,
    ) -> Result<Option<Activity>, QuestError> {
        let chain_id = chain.chain_id;
        let provider = self.provider(chain)?;

        let window_start = query.window_start();
        let horizon = window_start.saturating_sub(self.config.lookback_secs as i64);
        let cap = self.config.block_cap(chain, query.window_secs);
        let batch = self.config.batch_size.max(1);

        let head = self.call(chain_id, "eth_blockNumber", provider.get_block_number()).await?;
        let mut next = Some(head);
        let mut scanned = 0u64;
        let mut oldest_seen: Option<Timestamp> = None;

        debug!(
            chain_id,
            head,
            horizon,
            cap,
            wallet = %query.wallet,
            contract = %query.contract,
            selector = %query.selector,
            "scanning for activity"
        );

        while let Some(top) = next {
            if scanned >= cap {
                if oldest_seen.map_or(true, |ts| ts > window_start) {
                    warn!(chain_id, scanned, window_start, ?oldest_seen, "scan block cap reached inside window");
                    return Err(QuestError::rpc(
                        chain_id,
                        format!("scanned {scanned} blocks without reaching window start {window_start}"),
                    ));
                }
                debug!(chain_id, scanned, "scan block cap reached past window start");
                return Ok(None);
            }

            let count = batch.min(cap - scanned).min(top + 1);
            let blocks = try_join_all((0..count).map(|i| self.block(&provider, chain_id, top - i))).await?;

            for block in &blocks {
                let number = block.header.number;
                let timestamp = block.header.timestamp as Timestamp;
                if timestamp < horizon {
                    trace!(block = number, "passed scan horizon");
                    return Ok(None);
                }
                oldest_seen = Some(timestamp);

                let txs = block.transactions.as_transactions().unwrap_or_default();
                for tx in txs.iter().rev().filter(|tx| query.matches(tx.from(), (**tx).to(), (**tx).input())) {
                    let tx_hash = TxHash::from(tx.tx_hash());
                    match self.succeeded(&provider, chain_id, tx_hash).await? {
                        Some(true) => {
                            return Ok(Some(Activity { tx_hash, block_number: number, timestamp }));
                        }
                        status => trace!(tx = %tx_hash, ?status, "candidate without successful receipt"),
                    }
                }
            }

            scanned += count;
            next = top.checked_sub(count);
        }

        trace!(chain_id, "reached genesis");
        Ok(None)
    }
}
