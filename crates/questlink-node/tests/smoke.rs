//! End-to-end smoke test for questlink-node.
//!
//! Starts a real node process in offline mode (activity served from a fixture
//! file), verifies a quest over JSON-RPC, restarts the node on the same data
//! directory and checks the completion and balance survived.
//!
//! Run with:
//!   cargo test -p questlink-node --test smoke

use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

const WALLET: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
const CONTRACT: &str = "0x00000000000000000000000000000000000000c1";
const TX_HASH: &str = "0x7777777777777777777777777777777777777777777777777777777777777777";

// ── Node lifecycle ────────────────────────────────────────────────────────────

struct NodeGuard {
    child: Child,
}

impl Drop for NodeGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Find a free TCP port on loopback.
fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn spawn_node(data_dir: &Path, rpc_port: u16, extra: &[&str]) -> NodeGuard {
    let node_bin = env!("CARGO_BIN_EXE_questlink-node");
    let child = Command::new(node_bin)
        .args([
            "--data-dir", data_dir.join("ledger").to_str().unwrap(),
            "--rpc-addr", &format!("127.0.0.1:{rpc_port}"),
        ])
        .args(extra)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn questlink-node");
    NodeGuard { child }
}

// ── RPC helpers ───────────────────────────────────────────────────────────────

async fn rpc_call(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": 1
    });
    let resp = client
        .post(url)
        .json(&body)
        .send()
        .await
        .unwrap_or_else(|e| panic!("RPC call {method} failed: {e}"));
    let json: serde_json::Value = resp.json().await.expect("parse RPC JSON");
    if let Some(err) = json.get("error") {
        panic!("RPC error from {method}: {err}");
    }
    json["result"].clone()
}

/// Poll until the RPC server responds or the timeout elapses.
async fn wait_for_rpc(client: &reqwest::Client, url: &str, timeout: Duration) -> bool {
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "method": "quest_getLimits",
        "params": [],
        "id": 1
    });
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Ok(resp) = client.post(url).json(&body).send().await {
            if resp.status().is_success() {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    false
}

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn write_fixtures(dir: &Path) -> (PathBuf, PathBuf) {
    let quests = serde_json::json!([{
        "id": "first-claim",
        "rewardXp": 40,
        "durationSeconds": 900,
        "functionSignature": "claim(address)",
        "verificationContract": CONTRACT,
        "chainId": 8453
    }]);
    let activity = serde_json::json!([{
        "chainId": 8453,
        "wallet": WALLET,
        "contract": CONTRACT,
        "functionSignature": "claim(address)",
        "txHash": TX_HASH,
        "blockNumber": 1234,
        "timestamp": chrono::Utc::now().timestamp() - 60
    }]);
    let quests_path = dir.join("quests.json");
    let activity_path = dir.join("activity.json");
    std::fs::write(&quests_path, quests.to_string()).unwrap();
    std::fs::write(&activity_path, activity.to_string()).unwrap();
    (quests_path, activity_path)
}

// ── Smoke test ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn smoke_verify_and_restart() {
    // ── 1. Prepare temp dir and fixtures ──────────────────────────────────────
    let data_dir = std::env::temp_dir().join(format!("questlink_e2e_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&data_dir);
    std::fs::create_dir_all(&data_dir).unwrap();
    let (quests_path, activity_path) = write_fixtures(&data_dir);

    let http = reqwest::Client::new();
    let wallet_lower = WALLET.to_lowercase();

    // ── 2. First run: import quests, verify ───────────────────────────────────
    {
        let rpc_port = free_port();
        let rpc_url = format!("http://127.0.0.1:{rpc_port}");
        let _node = spawn_node(
            &data_dir,
            rpc_port,
            &[
                "--quests", quests_path.to_str().unwrap(),
                "--offline-activity", activity_path.to_str().unwrap(),
            ],
        );
        assert!(
            wait_for_rpc(&http, &rpc_url, Duration::from_secs(20)).await,
            "questlink-node did not become ready within 20 seconds"
        );

        let resp = rpc_call(
            &http,
            &rpc_url,
            "quest_verifyQuest",
            serde_json::json!({ "questId": "first-claim", "walletAddress": WALLET }),
        )
        .await;
        assert_eq!(resp["verified"], true, "first verification: {resp}");
        assert_eq!(resp["xpAwarded"], 40);
        assert_eq!(resp["txHash"], TX_HASH);

        let again = rpc_call(&http, &rpc_url, "quest_verifyQuest", serde_json::json!(["first-claim", wallet_lower])).await;
        assert_eq!(again["alreadyCompleted"], true);
    }

    // ── 3. Restart without --quests: state must survive ───────────────────────
    {
        let rpc_port = free_port();
        let rpc_url = format!("http://127.0.0.1:{rpc_port}");
        let _node = spawn_node(&data_dir, rpc_port, &["--offline-activity", activity_path.to_str().unwrap()]);
        assert!(
            wait_for_rpc(&http, &rpc_url, Duration::from_secs(20)).await,
            "questlink-node did not come back within 20 seconds"
        );

        let quest = rpc_call(&http, &rpc_url, "quest_getQuest", serde_json::json!(["quest", "first-claim"])).await;
        assert_eq!(quest["rewardXp"], 40);

        let balance = rpc_call(&http, &rpc_url, "quest_getXpBalance", serde_json::json!([WALLET])).await;
        assert_eq!(balance["totalXp"], 40);

        let again = rpc_call(&http, &rpc_url, "quest_verifyQuest", serde_json::json!(["first-claim", WALLET])).await;
        assert_eq!(again["alreadyCompleted"], true);

        let history = rpc_call(&http, &rpc_url, "quest_getXpTransactions", serde_json::json!([WALLET, null])).await;
        assert_eq!(history.as_array().map(Vec::len), Some(1));
    }

    let _ = std::fs::remove_dir_all(&data_dir);
}
