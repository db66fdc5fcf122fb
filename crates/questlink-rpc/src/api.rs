use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;

use crate::types::{RpcChain, RpcCompletion, RpcLimits, RpcQuest, RpcXpBalance, RpcXpTransaction, VerifyResponse};

/// QuestLink JSON-RPC 2.0 API definition.
///
/// All method names are prefixed with "quest_" via `namespace = "quest"`.
/// Parameters may be passed by position or by the camelCase names below.
#[rpc(server, namespace = "quest")]
pub trait QuestApi {
    /// Verify a quest for a session-authenticated wallet. Awards XP at most
    /// once per (quest, wallet).
    #[method(name = "verifyQuest")]
    async fn verify_quest(
        &self,
        #[argument(rename = "questId")] quest_id: String,
        #[argument(rename = "walletAddress")] wallet_address: String,
    ) -> RpcResult<VerifyResponse>;

    /// Verify a campaign task.
    #[method(name = "verifyTask")]
    async fn verify_task(
        &self,
        #[argument(rename = "taskId")] task_id: String,
        #[argument(rename = "walletAddress")] wallet_address: String,
    ) -> RpcResult<VerifyResponse>;

    /// `kind` is "quest" or "task".
    #[method(name = "getCompletion")]
    async fn get_completion(
        &self,
        kind: String,
        id: String,
        #[argument(rename = "walletAddress")] wallet_address: String,
    ) -> RpcResult<Option<RpcCompletion>>;

    #[method(name = "getXpBalance")]
    async fn get_xp_balance(
        &self,
        #[argument(rename = "walletAddress")] wallet_address: String,
    ) -> RpcResult<RpcXpBalance>;

    /// Reward log for a wallet, newest first. `limit` defaults to and is
    /// capped at 200.
    #[method(name = "getXpTransactions")]
    async fn get_xp_transactions(
        &self,
        #[argument(rename = "walletAddress")] wallet_address: String,
        limit: Option<u32>,
    ) -> RpcResult<Vec<RpcXpTransaction>>;

    #[method(name = "getQuest")]
    async fn get_quest(&self, kind: String, id: String) -> RpcResult<Option<RpcQuest>>;

    /// `0x`-prefixed 4-byte selector of a canonical signature.
    #[method(name = "computeSelector")]
    async fn compute_selector(&self, signature: String) -> RpcResult<String>;

    #[method(name = "getChain")]
    async fn get_chain(&self, #[argument(rename = "chainId")] chain_id: u64) -> RpcResult<RpcChain>;

    #[method(name = "getLimits")]
    async fn get_limits(&self) -> RpcResult<RpcLimits>;
}
