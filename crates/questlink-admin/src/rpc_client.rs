use anyhow::{bail, Context};
use serde::de::DeserializeOwned;
use tracing::debug;

use questlink_rpc::{RpcChain, RpcCompletion, RpcLimits, RpcQuest, RpcXpBalance, RpcXpTransaction, VerifyResponse};

/// Simple JSON-RPC 2.0 client used by the admin CLI to talk to a running node.
///
/// Uses raw HTTP POST with serde_json rather than the full jsonrpsee client.
pub struct AdminRpcClient {
    url: String,
    client: reqwest::Client,
}

impl AdminRpcClient {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Call a JSON-RPC method and decode the `result` field.
    async fn call<T: DeserializeOwned>(&self, method: &str, params: serde_json::Value) -> anyhow::Result<T> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });
        debug!(method, "rpc call");

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("connecting to node at {}", self.url))?;

        let json: serde_json::Value = resp.json().await.context("parsing RPC response")?;

        if let Some(err) = json.get("error") {
            let retry = if err["data"]["retryable"].as_bool() == Some(true) { " (retryable)" } else { "" };
            bail!("RPC error{retry}: {} {}", err["code"], err["message"]);
        }

        serde_json::from_value(json["result"].clone()).with_context(|| format!("decoding {method} result"))
    }

    pub async fn verify_quest(&self, quest_id: &str, wallet: &str) -> anyhow::Result<VerifyResponse> {
        self.call("quest_verifyQuest", serde_json::json!({ "questId": quest_id, "walletAddress": wallet }))
            .await
    }

    pub async fn verify_task(&self, task_id: &str, wallet: &str) -> anyhow::Result<VerifyResponse> {
        self.call("quest_verifyTask", serde_json::json!({ "taskId": task_id, "walletAddress": wallet }))
            .await
    }

    pub async fn get_completion(&self, kind: &str, id: &str, wallet: &str) -> anyhow::Result<Option<RpcCompletion>> {
        self.call("quest_getCompletion", serde_json::json!([kind, id, wallet])).await
    }

    pub async fn get_balance(&self, wallet: &str) -> anyhow::Result<RpcXpBalance> {
        self.call("quest_getXpBalance", serde_json::json!([wallet])).await
    }

    pub async fn get_transactions(&self, wallet: &str, limit: Option<u32>) -> anyhow::Result<Vec<RpcXpTransaction>> {
        self.call("quest_getXpTransactions", serde_json::json!([wallet, limit])).await
    }

    pub async fn get_quest(&self, kind: &str, id: &str) -> anyhow::Result<Option<RpcQuest>> {
        self.call("quest_getQuest", serde_json::json!([kind, id])).await
    }

    pub async fn get_chain(&self, chain_id: u64) -> anyhow::Result<RpcChain> {
        self.call("quest_getChain", serde_json::json!([chain_id])).await
    }

    pub async fn get_limits(&self) -> anyhow::Result<RpcLimits> {
        self.call("quest_getLimits", serde_json::json!([])).await
    }
}
