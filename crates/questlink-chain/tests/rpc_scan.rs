//! Block-scanner tests against an in-process mock EVM JSON-RPC node.
//!
//! Run with:
//!   cargo test -p questlink-chain --test rpc_scan

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::{Server, ServerHandle};
use serde_json::{json, Value};

use questlink_chain::{ActivityQuery, ActivitySource, ChainDescriptor, RpcActivitySource, ScanConfig};
use questlink_core::error::{ErrorClass, QuestError};
use questlink_core::types::{EvmAddress, TxHash};
use questlink_crypto::compute_function_selector;

const BASE_TS: i64 = 1_700_000_000;
const BLOCK_TIME: i64 = 12;
const HEAD: u64 = 400;

// ── Mock node ─────────────────────────────────────────────────────────────────

#[rpc(server, namespace = "eth")]
pub trait MockEth {
    #[method(name = "blockNumber")]
    async fn block_number(&self) -> RpcResult<String>;

    #[method(name = "getBlockByNumber")]
    async fn get_block_by_number(&self, number: String, full: bool) -> RpcResult<Option<Value>>;

    #[method(name = "getTransactionReceipt")]
    async fn get_transaction_receipt(&self, hash: String) -> RpcResult<Option<Value>>;
}

#[derive(Default)]
struct MockChain {
    txs: HashMap<u64, Vec<Value>>,
    receipts: HashMap<String, Value>,
}

fn quantity(n: u64) -> String {
    format!("0x{n:x}")
}

fn word(n: u64) -> String {
    format!("0x{n:064x}")
}

fn empty_bloom() -> String {
    format!("0x{}", "00".repeat(256))
}

fn block_ts(n: u64) -> i64 {
    BASE_TS + n as i64 * BLOCK_TIME
}

impl MockChain {
    fn add_tx(&mut self, block: u64, hash: &TxHash, from: &str, to: &str, input: &str, success: bool) {
        let txs = self.txs.entry(block).or_default();
        let index = txs.len() as u64;
        txs.push(json!({
            "type": "0x0",
            "hash": hash.to_hex(),
            "nonce": quantity(index),
            "gasPrice": "0x3b9aca00",
            "gas": "0x30d40",
            "to": to,
            "value": "0x0",
            "input": input,
            "v": "0x1b",
            "r": word(1),
            "s": word(2),
            "from": from,
            "blockHash": word(block + 1),
            "blockNumber": quantity(block),
            "transactionIndex": quantity(index),
        }));
        self.receipts.insert(
            hash.to_hex(),
            json!({
                "type": "0x0",
                "status": if success { "0x1" } else { "0x0" },
                "cumulativeGasUsed": "0x5208",
                "logs": [],
                "logsBloom": empty_bloom(),
                "transactionHash": hash.to_hex(),
                "transactionIndex": quantity(index),
                "blockHash": word(block + 1),
                "blockNumber": quantity(block),
                "gasUsed": "0x5208",
                "effectiveGasPrice": "0x3b9aca00",
                "from": from,
                "to": to,
                "contractAddress": null,
            }),
        );
    }

    fn block(&self, n: u64) -> Value {
        json!({
            "hash": word(n + 1),
            "parentHash": word(n),
            "sha3Uncles": word(0),
            "miner": format!("0x{}", "00".repeat(20)),
            "stateRoot": word(0),
            "transactionsRoot": word(0),
            "receiptsRoot": word(0),
            "logsBloom": empty_bloom(),
            "difficulty": "0x0",
            "number": quantity(n),
            "gasLimit": "0x1c9c380",
            "gasUsed": "0x0",
            "timestamp": quantity(block_ts(n) as u64),
            "extraData": "0x",
            "mixHash": word(0),
            "nonce": "0x0000000000000000",
            "baseFeePerGas": "0x7",
            "uncles": [],
            "transactions": self.txs.get(&n).cloned().unwrap_or_default(),
        })
    }
}

#[async_trait]
impl MockEthServer for MockChain {
    async fn block_number(&self) -> RpcResult<String> {
        Ok(quantity(HEAD))
    }

    async fn get_block_by_number(&self, number: String, _full: bool) -> RpcResult<Option<Value>> {
        let n = u64::from_str_radix(number.trim_start_matches("0x"), 16).unwrap_or(u64::MAX);
        Ok((n <= HEAD).then(|| self.block(n)))
    }

    async fn get_transaction_receipt(&self, hash: String) -> RpcResult<Option<Value>> {
        Ok(self.receipts.get(&hash).cloned())
    }
}

async fn start_mock(chain: MockChain) -> (SocketAddr, ServerHandle) {
    let server = Server::builder().build("127.0.0.1:0").await.expect("bind mock node");
    let addr = server.local_addr().expect("mock addr");
    let handle = server.start(chain.into_rpc());
    (addr, handle)
}

// ── Fixtures ──────────────────────────────────────────────────────────────────

const WALLET: &str = "0x00000000000000000000000000000000000000aa";
const CONTRACT: &str = "0x00000000000000000000000000000000000000cc";
const OTHER: &str = "0x00000000000000000000000000000000000000bb";

fn hash(b: u8) -> TxHash {
    TxHash::from_bytes([b; 32])
}

fn descriptor(addr: SocketAddr, block_time_ms: Option<u64>) -> ChainDescriptor {
    ChainDescriptor {
        chain_id: 31337,
        name: "mock".into(),
        rpc_urls: vec![format!("http://{addr}")],
        block_time_ms,
    }
}

fn timed(addr: SocketAddr) -> ChainDescriptor {
    descriptor(addr, Some(BLOCK_TIME as u64 * 1_000))
}

fn query(signature: &str, window_secs: u64) -> ActivityQuery {
    ActivityQuery {
        chain_id: 31337,
        wallet: EvmAddress::parse(WALLET).unwrap(),
        contract: EvmAddress::parse(CONTRACT).unwrap(),
        selector: compute_function_selector(signature).unwrap(),
        window_secs,
        now: block_ts(HEAD),
    }
}

fn claim_calldata() -> String {
    let selector = compute_function_selector("claim(address)").unwrap();
    format!("{selector}{}aa", "00".repeat(31))
}

fn source(lookback_secs: u64, max_scan_blocks: u64) -> RpcActivitySource {
    RpcActivitySource::new(ScanConfig {
        batch_size: 16,
        max_scan_blocks,
        lookback_secs,
        request_timeout: Duration::from_secs(5),
    })
    .unwrap()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn finds_newest_successful_call() {
    let claim = &claim_calldata();
    let transfer = format!("{}{}", compute_function_selector("transfer(address,uint256)").unwrap(), "00".repeat(64));

    let mut chain = MockChain::default();
    // Older success, then a newer revert, plus noise around it.
    chain.add_tx(HEAD - 20, &hash(1), WALLET, CONTRACT, claim, true);
    chain.add_tx(HEAD - 5, &hash(2), WALLET, CONTRACT, claim, false);
    chain.add_tx(HEAD - 3, &hash(3), OTHER, CONTRACT, claim, true);
    chain.add_tx(HEAD - 2, &hash(4), WALLET, OTHER, claim, true);
    chain.add_tx(HEAD - 1, &hash(5), WALLET, CONTRACT, &transfer, true);
    let (addr, _handle) = start_mock(chain).await;

    let found = source(0, 1_000)
        .latest_activity(&timed(addr), &query("claim(address)", 3_600))
        .await
        .unwrap()
        .expect("activity");

    assert_eq!(found.tx_hash, hash(1));
    assert_eq!(found.block_number, HEAD - 20);
    assert_eq!(found.timestamp, block_ts(HEAD - 20));
}

#[tokio::test]
async fn stops_at_scan_horizon() {
    let mut chain = MockChain::default();
    // 100 blocks back = 1200 s; window 600 s, no lookback.
    chain.add_tx(HEAD - 100, &hash(7), WALLET, CONTRACT, &claim_calldata(), true);
    let (addr, _handle) = start_mock(chain).await;

    let none = source(0, 1_000)
        .latest_activity(&timed(addr), &query("claim(address)", 600))
        .await
        .unwrap();
    assert!(none.is_none());

    // With lookback the near miss is reported so the caller can explain it.
    let seen = source(3_600, 1_000)
        .latest_activity(&timed(addr), &query("claim(address)", 600))
        .await
        .unwrap()
        .expect("lookback activity");
    assert_eq!(seen.tx_hash, hash(7));
}

#[tokio::test]
async fn block_cap_inside_window_is_retryable_failure() {
    let mut chain = MockChain::default();
    // 480 s old, well inside a one hour window, but 40 blocks back.
    chain.add_tx(HEAD - 40, &hash(8), WALLET, CONTRACT, &claim_calldata(), true);
    let (addr, _handle) = start_mock(chain).await;

    let err = source(3_600, 32)
        .latest_activity(&descriptor(addr, None), &query("claim(address)", 3_600))
        .await
        .unwrap_err();
    assert!(matches!(err, QuestError::RpcCallFailed { chain_id: 31337, .. }));
    assert_eq!(err.class(), ErrorClass::Transport);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn known_block_time_stretches_cap_to_window() {
    let mut chain = MockChain::default();
    chain.add_tx(HEAD - 40, &hash(8), WALLET, CONTRACT, &claim_calldata(), true);
    let (addr, _handle) = start_mock(chain).await;

    let found = source(3_600, 32)
        .latest_activity(&timed(addr), &query("claim(address)", 3_600))
        .await
        .unwrap()
        .expect("activity inside window");
    assert_eq!(found.tx_hash, hash(8));
    assert_eq!(found.timestamp, block_ts(HEAD - 40));
}

#[tokio::test]
async fn block_cap_past_window_start_is_no_activity() {
    let (addr, _handle) = start_mock(MockChain::default()).await;

    // A 60 s window spans 5 blocks; 32 blocks cover it even without lookback.
    let none = source(3_600, 32)
        .latest_activity(&descriptor(addr, None), &query("claim(address)", 60))
        .await
        .unwrap();
    assert!(none.is_none());
}

#[tokio::test]
async fn unreachable_node_is_transport_failure() {
    let dead = "127.0.0.1:9".parse().unwrap();
    let err = source(0, 10)
        .latest_activity(&descriptor(dead, None), &query("claim(address)", 60))
        .await
        .unwrap_err();
    assert!(matches!(err, QuestError::RpcCallFailed { chain_id: 31337, .. }));
}
