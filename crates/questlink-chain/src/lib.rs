//! questlink-chain
//!
//! Read-only access to EVM chains: the chain catalog (chain id → RPC
//! descriptor) and the activity sources the verification engine queries
//! for a wallet's most recent qualifying call.

pub mod catalog;
pub mod memory;
pub mod source;

pub use catalog::{ChainCatalog, ChainDescriptor, StaticChainCatalog};
pub use memory::{ActivityFixture, StaticActivitySource};
pub use source::{Activity, ActivityQuery, ActivitySource, RpcActivitySource, ScanConfig};
