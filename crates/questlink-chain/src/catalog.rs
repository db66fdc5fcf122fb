use std::collections::BTreeMap;
use std::path::Path;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::debug;

use questlink_core::error::QuestError;
use questlink_core::types::ChainId;

/// Enough about a chain to build a read client for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDescriptor {
    pub chain_id: ChainId,
    pub name: String,
    /// JSON-RPC endpoints in preference order. Only the first is used; there
    /// is no failover inside a single verification.
    pub rpc_urls: Vec<String>,
    /// Nominal block interval in milliseconds. Sizes the block scan so the
    /// whole verification window is covered.
    #[serde(default)]
    pub block_time_ms: Option<u64>,
}

impl ChainDescriptor {
    pub fn primary_rpc(&self) -> Result<&str, QuestError> {
        self.rpc_urls
            .first()
            .map(String::as_str)
            .ok_or(QuestError::ChainNotSupported(self.chain_id))
    }

    /// Blocks produced in `secs` seconds, rounded up. `None` when the block
    /// time is unknown.
    pub fn blocks_in(&self, secs: u64) -> Option<u64> {
        let ms = self.block_time_ms.filter(|ms| *ms > 0)?;
        Some(secs.saturating_mul(1_000).div_ceil(ms))
    }
}

/// Chain id → descriptor lookup.
///
/// Implementations may be backed by a registry that refreshes in the
/// background; callers must not assume anything beyond this contract.
pub trait ChainCatalog: Send + Sync {
    fn resolve(&self, chain_id: ChainId) -> Result<ChainDescriptor, QuestError>;

    fn chains(&self) -> Vec<ChainDescriptor>;
}

// ── Built-in catalog ─────────────────────────────────────────────────────────

fn builtin(chain_id: ChainId, name: &str, rpc: &str, block_time_ms: u64) -> ChainDescriptor {
    ChainDescriptor {
        chain_id,
        name: name.to_string(),
        rpc_urls: vec![rpc.to_string()],
        block_time_ms: Some(block_time_ms),
    }
}

static BUILTIN_CHAINS: Lazy<Vec<ChainDescriptor>> = Lazy::new(|| {
    vec![
        builtin(1, "Ethereum Mainnet", "https://eth.llamarpc.com", 12_000),
        builtin(10, "OP Mainnet", "https://mainnet.optimism.io", 2_000),
        builtin(56, "BNB Smart Chain", "https://bsc-dataseed.bnbchain.org", 750),
        builtin(137, "Polygon", "https://polygon-rpc.com", 2_000),
        builtin(8453, "Base", "https://mainnet.base.org", 2_000),
        builtin(42161, "Arbitrum One", "https://arb1.arbitrum.io/rpc", 250),
        builtin(11155111, "Sepolia", "https://rpc.sepolia.org", 12_000),
        builtin(84532, "Base Sepolia", "https://sepolia.base.org", 2_000),
    ]
});

/// In-process catalog: built-in public endpoints, optionally overridden or
/// extended from a JSON file (an array of descriptors).
#[derive(Debug, Clone, Default)]
pub struct StaticChainCatalog {
    chains: BTreeMap<ChainId, ChainDescriptor>,
}

impl StaticChainCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_builtin() -> Self {
        let mut catalog = Self::empty();
        for chain in BUILTIN_CHAINS.iter() {
            catalog.chains.insert(chain.chain_id, chain.clone());
        }
        catalog
    }

    /// Insert or replace a descriptor.
    pub fn insert(&mut self, chain: ChainDescriptor) -> Result<(), QuestError> {
        if chain.chain_id == 0 {
            return Err(QuestError::ChainNotSupported(0));
        }
        if chain.rpc_urls.iter().all(|u| u.trim().is_empty()) {
            return Err(QuestError::InvalidConfig {
                subject: format!("chain {}", chain.chain_id),
                reason: "no rpc url".into(),
            });
        }
        debug!(chain_id = chain.chain_id, name = %chain.name, "chain registered");
        self.chains.insert(chain.chain_id, chain);
        Ok(())
    }

    pub fn merge_json(&mut self, json: &str) -> Result<usize, QuestError> {
        let entries: Vec<ChainDescriptor> =
            serde_json::from_str(json).map_err(|e| QuestError::Serialization(e.to_string()))?;
        let n = entries.len();
        for chain in entries {
            self.insert(chain)?;
        }
        Ok(n)
    }

    pub fn merge_file<P: AsRef<Path>>(&mut self, path: P) -> Result<usize, QuestError> {
        let json = std::fs::read_to_string(path.as_ref())
            .map_err(|e| QuestError::Storage(format!("{}: {e}", path.as_ref().display())))?;
        self.merge_json(&json)
    }
}

impl ChainCatalog for StaticChainCatalog {
    fn resolve(&self, chain_id: ChainId) -> Result<ChainDescriptor, QuestError> {
        self.chains
            .get(&chain_id)
            .cloned()
            .ok_or(QuestError::ChainNotSupported(chain_id))
    }

    fn chains(&self) -> Vec<ChainDescriptor> {
        self.chains.values().cloned().collect()
    }
}
