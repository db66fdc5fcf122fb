//! questlink-admin
//!
//! Operator CLI for a QuestLink node. Computes selectors locally and queries
//! or drives verification on a running node via JSON-RPC.
//!
//! Usage:
//!   questlink-admin selector     <signature>
//!   questlink-admin verify       --quest <id> --wallet <addr> [--rpc <url>]
//!   questlink-admin verify-task  --task <id> --wallet <addr> [--rpc <url>]
//!   questlink-admin completion   --id <id> --wallet <addr> [--task] [--rpc <url>]
//!   questlink-admin balance      --wallet <addr> [--rpc <url>]
//!   questlink-admin history      --wallet <addr> [--limit <n>] [--rpc <url>]
//!   questlink-admin quest        --id <id> [--task] [--rpc <url>]
//!   questlink-admin chain        --id <chain id> [--rpc <url>]
//!   questlink-admin limits       [--rpc <url>]

use anyhow::Context;
use clap::{Parser, Subcommand};

use questlink_crypto::compute_function_selector;
use questlink_rpc::VerifyResponse;

mod rpc_client;
use rpc_client::AdminRpcClient;

// ── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "questlink-admin",
    version,
    about = "QuestLink admin - inspect quests, balances and verifications"
)]
struct Args {
    /// Node RPC endpoint.
    #[arg(long, global = true, default_value = "http://127.0.0.1:8646")]
    rpc: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the 4-byte selector of a canonical function signature.
    Selector {
        /// e.g. `transfer(address,uint256)`
        signature: String,
    },

    /// Verify a quest for a wallet (awards XP on first success).
    Verify {
        #[arg(long)]
        quest: String,
        #[arg(long)]
        wallet: String,
    },

    /// Verify a campaign task for a wallet.
    VerifyTask {
        #[arg(long)]
        task: String,
        #[arg(long)]
        wallet: String,
    },

    /// Show the completion record of a quest (or task) for a wallet.
    Completion {
        #[arg(long)]
        id: String,
        #[arg(long)]
        wallet: String,
        /// Look up a task instead of a quest.
        #[arg(long)]
        task: bool,
    },

    /// Print a wallet's XP balance.
    Balance {
        #[arg(long)]
        wallet: String,
    },

    /// List a wallet's XP awards, newest first.
    History {
        #[arg(long)]
        wallet: String,
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Show an imported quest or task definition.
    Quest {
        #[arg(long)]
        id: String,
        #[arg(long)]
        task: bool,
    },

    /// Show the catalog entry for a chain.
    Chain {
        #[arg(long)]
        id: u64,
    },

    /// Print the node's verification limits.
    Limits,
}

// ── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("warn,questlink_admin=info")
        .init();

    let args = Args::parse();
    let client = AdminRpcClient::new(&args.rpc);

    match args.command {
        Command::Selector { signature } => {
            let selector = compute_function_selector(&signature)
                .with_context(|| format!("computing selector for {signature:?}"))?;
            println!("{selector}");
            Ok(())
        }

        Command::Verify { quest, wallet } => {
            let resp = client.verify_quest(&quest, &wallet).await?;
            print_verify(&resp);
            Ok(())
        }

        Command::VerifyTask { task, wallet } => {
            let resp = client.verify_task(&task, &wallet).await?;
            print_verify(&resp);
            Ok(())
        }

        Command::Completion { id, wallet, task } => {
            match client.get_completion(kind(task), &id, &wallet).await? {
                Some(c) => {
                    println!("Subject:     {}:{}", c.kind, c.id);
                    println!("Wallet:      {}", c.wallet_address);
                    println!("XP awarded:  {}", c.xp_awarded);
                    println!("Tx hashes:   {}", c.tx_hashes);
                    println!("Verified at: {}", fmt_ts(c.verified_at));
                    println!("Completed:   {}", fmt_ts(c.completed_at));
                }
                None => println!("Not completed."),
            }
            Ok(())
        }

        Command::Balance { wallet } => {
            let bal = client.get_balance(&wallet).await?;
            println!("Wallet:   {}", bal.wallet_address);
            println!("Balance:  {} XP", bal.total_xp);
            if bal.updated_at > 0 {
                println!("Updated:  {}", fmt_ts(bal.updated_at));
            }
            Ok(())
        }

        Command::History { wallet, limit } => {
            let entries = client.get_transactions(&wallet, limit).await?;
            if entries.is_empty() {
                println!("No XP awards.");
            }
            for e in entries {
                println!("{:>8} XP  {}  {}", e.amount, fmt_ts(e.created_at), e.source);
            }
            Ok(())
        }

        Command::Quest { id, task } => {
            match client.get_quest(kind(task), &id).await? {
                Some(q) => {
                    println!("Subject:  {}:{}", q.kind, q.id);
                    println!("Reward:   {} XP", q.reward_xp);
                    println!(
                        "Window:   {} s (authored {} s)",
                        q.effective_window_seconds, q.duration_seconds
                    );
                    println!("Logic:    {}", q.verification_logic);
                    for f in q.verification_functions {
                        println!("  chain {:>9}  {}  {}", f.chain_id, f.contract_address, f.function_signature);
                    }
                }
                None => println!("Unknown {} {id}.", kind(task)),
            }
            Ok(())
        }

        Command::Chain { id } => {
            let chain = client.get_chain(id).await?;
            println!("Chain:    {} ({})", chain.name, chain.chain_id);
            for url in chain.rpc_urls {
                println!("RPC:      {url}");
            }
            if let Some(ms) = chain.block_time_ms {
                println!("Block:    {ms} ms");
            }
            Ok(())
        }

        Command::Limits => {
            let limits = client.get_limits().await?;
            println!("Max verification window: {} s", limits.max_verification_duration_seconds);
            println!("Verification timeout:    {} ms", limits.verify_timeout_ms);
            println!("Max history page:        {}", limits.max_history_page);
            Ok(())
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn kind(task: bool) -> &'static str {
    if task {
        "task"
    } else {
        "quest"
    }
}

fn print_verify(resp: &VerifyResponse) {
    let status = match (resp.verified, resp.already_completed) {
        (true, true) => "already completed",
        (true, false) => "verified",
        (false, _) => "not verified",
    };
    println!("Status:   {status}");
    if let Some(msg) = &resp.message {
        println!("Message:  {msg}");
    }
    if let Some(tx) = &resp.tx_hash {
        println!("Tx:       {tx}");
    }
    if let Some(xp) = resp.xp_awarded {
        println!("Awarded:  {xp} XP");
    }
    if let (Some(observed), Some(window)) = (resp.observed_timestamp, resp.window_seconds) {
        println!("Observed: {} (window {window} s)", fmt_ts(observed));
    }
}

fn fmt_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_timestamps() {
        assert_eq!(fmt_ts(0), "1970-01-01 00:00:00 UTC");
        assert_eq!(fmt_ts(1_700_000_000), "2023-11-14 22:13:20 UTC");
    }

    #[test]
    fn cli_parses_subcommands() {
        let args = Args::try_parse_from(["questlink-admin", "history", "--wallet", "0xabc", "--limit", "5"]).unwrap();
        assert!(matches!(args.command, Command::History { limit: Some(5), .. }));

        let args = Args::try_parse_from(["questlink-admin", "selector", "transfer(address,uint256)"]).unwrap();
        assert!(matches!(args.command, Command::Selector { .. }));
    }
}
