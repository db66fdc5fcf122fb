//! questlink-node - the QuestLink verification node.
//!
//! Startup sequence:
//!   1. Open (or initialise) the completion ledger
//!   2. Import quest/task definitions if `--quests` is given
//!   3. Build the chain catalog (built-ins plus `--chains` overrides)
//!   4. Pick the activity source: live JSON-RPC scan, or offline fixtures
//!   5. Start the JSON-RPC 2.0 server and serve until Ctrl-C

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use questlink_chain::{
    ActivityFixture, ActivitySource, ChainCatalog, RpcActivitySource, ScanConfig, StaticActivitySource,
    StaticChainCatalog,
};
use questlink_core::constants::{
    DEFAULT_LOOKBACK_SECONDS, DEFAULT_MAX_SCAN_BLOCKS, DEFAULT_SCAN_BATCH_SIZE, DEFAULT_VERIFY_TIMEOUT_MS,
};
use questlink_core::quest::QuestConfigDocument;
use questlink_rpc::{RpcServer, RpcServerState};
use questlink_state::LedgerDb;
use questlink_verify::{import_definitions, QuestVerifier, VerificationEngine};

#[derive(Parser, Debug)]
#[command(
    name = "questlink-node",
    version,
    about = "QuestLink node - on-chain quest verification and XP ledger"
)]
struct Args {
    /// Directory for the persistent ledger.
    #[arg(long, default_value = "~/.questlink/data")]
    data_dir: PathBuf,

    /// JSON-RPC listen address.
    #[arg(long, default_value = "127.0.0.1:8646")]
    rpc_addr: SocketAddr,

    /// JSON array of chain descriptors overriding or extending the built-ins.
    #[arg(long)]
    chains: Option<PathBuf>,

    /// JSON array of quest/task verification configs to import on start.
    #[arg(long)]
    quests: Option<PathBuf>,

    /// Whole-request verification budget.
    #[arg(long, default_value_t = DEFAULT_VERIFY_TIMEOUT_MS)]
    verify_timeout_ms: u64,

    /// Blocks fetched concurrently per scan step.
    #[arg(long, default_value_t = DEFAULT_SCAN_BATCH_SIZE)]
    scan_batch: u64,

    /// Minimum block budget per function check; raised to span the window
    /// on chains with a known block time.
    #[arg(long, default_value_t = DEFAULT_MAX_SCAN_BLOCKS)]
    max_scan_blocks: u64,

    /// History scanned past the window to report near misses.
    #[arg(long, default_value_t = DEFAULT_LOOKBACK_SECONDS)]
    lookback_secs: u64,

    /// Serve chain activity from a JSON fixture file instead of live RPC.
    #[arg(long, alias = "offline")]
    offline_activity: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,questlink=debug")),
        )
        .init();

    let args = Args::parse();
    info!("QuestLink node starting");

    // ── Ledger ────────────────────────────────────────────────────────────────
    let data_dir = expand_tilde(&args.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;

    let ledger = Arc::new(LedgerDb::open(&data_dir).context("opening ledger")?);

    // ── Quest definitions ─────────────────────────────────────────────────────
    if let Some(path) = &args.quests {
        let docs: Vec<QuestConfigDocument> = read_json(path).context("loading quest definitions")?;
        let n = import_definitions(&ledger, docs)
            .with_context(|| format!("importing quests from {}", path.display()))?;
        ledger.flush().context("flushing ledger")?;
        info!(count = n, "quest definitions imported");
    }
    let known = ledger.list_quests().context("listing quests")?.len();
    if known == 0 {
        warn!("no quest definitions loaded; every verification will report an unknown quest");
    } else {
        info!(count = known, "quest definitions available");
    }

    // ── Chain catalog ─────────────────────────────────────────────────────────
    let mut catalog = StaticChainCatalog::with_builtin();
    if let Some(path) = &args.chains {
        let n = catalog
            .merge_file(expand_tilde(path))
            .with_context(|| format!("loading chain catalog {}", path.display()))?;
        info!(count = n, "chain overrides loaded");
    }
    info!(chains = catalog.chains().len(), "chain catalog ready");

    // ── Activity source ───────────────────────────────────────────────────────
    let source: Arc<dyn ActivitySource> = match &args.offline_activity {
        Some(path) => {
            let fixtures: Vec<ActivityFixture> = read_json(path).context("loading activity fixtures")?;
            warn!(fixtures = fixtures.len(), "offline mode: chain activity served from fixtures");
            Arc::new(StaticActivitySource::from_fixtures(&fixtures).context("parsing activity fixtures")?)
        }
        None => {
            let config = ScanConfig {
                batch_size: args.scan_batch,
                max_scan_blocks: args.max_scan_blocks,
                lookback_secs: args.lookback_secs,
                request_timeout: Duration::from_millis(args.verify_timeout_ms),
            };
            Arc::new(RpcActivitySource::new(config).context("building chain client")?)
        }
    };

    let engine = VerificationEngine::new(Arc::new(catalog), source);
    let verifier = Arc::new(QuestVerifier::new(
        Arc::clone(&ledger),
        engine,
        Duration::from_millis(args.verify_timeout_ms),
    ));

    // ── RPC server ────────────────────────────────────────────────────────────
    let rpc_state = Arc::new(RpcServerState {
        verifier,
        verify_timeout_ms: args.verify_timeout_ms,
    });
    let rpc_handle = RpcServer::new(rpc_state)
        .start(args.rpc_addr)
        .await
        .context("starting RPC server")?;

    info!("node ready");
    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;

    info!("shutting down");
    let _ = rpc_handle.stop();
    ledger.flush().context("flushing ledger")?;
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let path = expand_tilde(path);
    let json = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))
}

/// Expand a leading `~` to the user's home directory (`HOME` or `USERPROFILE`).
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
