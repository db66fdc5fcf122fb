//! questlink-rpc
//!
//! JSON-RPC 2.0 server for QuestLink nodes.
//!
//! Namespace: "quest"
//! Methods:
//!   quest_verifyQuest        - verify a quest for a wallet and award XP once
//!   quest_verifyTask         - same for a campaign task
//!   quest_getCompletion      - completion record for (kind, id, wallet)
//!   quest_getXpBalance       - running XP total for a wallet
//!   quest_getXpTransactions  - reward log, newest first
//!   quest_getQuest           - imported quest/task definition
//!   quest_computeSelector    - 4-byte selector for a canonical signature
//!   quest_getChain           - chain catalog entry
//!   quest_getLimits          - verification window limits

pub mod api;
pub mod server;
pub mod types;

pub use server::RpcServer;
pub use server::RpcServerState;
pub use types::{
    RpcChain, RpcCompletion, RpcLimits, RpcQuest, RpcVerificationFunction, RpcXpBalance,
    RpcXpTransaction, VerifyResponse,
};
