//! agrotrace-node — the AgroTrace registry dispatcher.
//!
//! Startup sequence:
//!   1. Open (or initialise) the state database
//!   2. Apply bootstrap grants if the store is fresh
//!   3. Start the reader task: JSON-lines calls → queue
//!   4. Run the main loop: stamp → apply → write receipt

mod dispatch;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::AsyncRead;
use tracing::{info, warn};

use agrotrace_bootstrap::{apply_bootstrap, is_bootstrapped, BootstrapParams};
use agrotrace_state::{StateDb, StateEngine};

use crate::dispatch::{dispatch, read_calls, Clock, Inbound};

#[derive(Parser, Debug)]
#[command(
    name = "agrotrace-node",
    version,
    about = "AgroTrace node: permissioned farm-to-consumer custody registry"
)]
struct Args {
    /// Directory for the persistent state database.
    #[arg(long, default_value = "~/.agrotrace/data")]
    data_dir: PathBuf,

    /// Use a throwaway in-memory store instead of --data-dir.
    #[arg(long)]
    ephemeral: bool,

    /// Path to bootstrap params JSON (only read on first run).
    #[arg(long)]
    bootstrap_params: Option<PathBuf>,

    /// JSON-lines file of calls to apply. Reads stdin when absent.
    #[arg(long)]
    calls: Option<PathBuf>,

    /// Capacity of the queue between the reader and the apply loop.
    #[arg(long, default_value_t = 512)]
    queue_depth: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,agrotrace=debug")),
        )
        .init();

    let args = Args::parse();
    info!("AgroTrace node starting");

    // ── State database ────────────────────────────────────────────────────────
    let db = if args.ephemeral {
        warn!("--ephemeral: state is discarded on exit");
        StateDb::open_temporary().context("opening temporary state database")?
    } else {
        let data_dir = expand_tilde(&args.data_dir);
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("creating data dir {}", data_dir.display()))?;
        StateDb::open(&data_dir).context("opening state database")?
    };
    let db = Arc::new(db);

    // ── Bootstrap if fresh ────────────────────────────────────────────────────
    if is_bootstrapped(&db).context("reading bootstrap marker")? {
        info!("existing store found; skipping bootstrap");
    } else {
        info!("fresh store; applying bootstrap");
        let params = load_bootstrap_params(args.bootstrap_params.as_deref())?;
        apply_bootstrap(&db, &params).context("applying bootstrap")?;
    }

    let engine = StateEngine::new(Arc::clone(&db));

    // ── Inbound call queue ────────────────────────────────────────────────────
    let (call_sender, mut call_receiver) =
        tokio::sync::mpsc::channel::<Inbound>(args.queue_depth.max(1));

    let source: Box<dyn AsyncRead + Unpin + Send> = match &args.calls {
        Some(path) => {
            info!(path = %path.display(), "reading calls from file");
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening calls file {}", path.display()))?;
            Box::new(file)
        }
        None => {
            info!("reading calls from stdin");
            Box::new(tokio::io::stdin())
        }
    };
    let reader = tokio::spawn(read_calls(source, call_sender));

    // ── Main loop: stamp & apply ──────────────────────────────────────────────
    let mut clock = Clock::default();
    let mut seq = 0u64;
    let (mut applied, mut rejected) = (0u64, 0u64);
    let stdout = std::io::stdout();

    info!("node ready");
    while let Some(item) = call_receiver.recv().await {
        seq += 1;
        let receipt = dispatch(&engine, &mut clock, seq, item, chrono::Utc::now().timestamp());
        if receipt.ok {
            applied += 1;
        } else {
            rejected += 1;
        }
        let line = serde_json::to_string(&receipt).context("encoding receipt")?;
        writeln!(stdout.lock(), "{line}").context("writing receipt")?;
    }

    // Committed calls are flushed even when the reader failed.
    let read_result = reader.await.context("reader task panicked");
    db.flush().context("flushing state database")?;
    read_result?.context("reading calls")?;
    info!(applied, rejected, "input exhausted; shutting down");
    Ok(())
}

/// Load bootstrap parameters from a JSON file. Without a file the store
/// starts with empty permission sets.
fn load_bootstrap_params(path: Option<&Path>) -> anyhow::Result<BootstrapParams> {
    let Some(p) = path else {
        warn!("no --bootstrap-params provided; starting without admins or verifiers");
        return Ok(BootstrapParams::default());
    };
    let json = std::fs::read_to_string(p)
        .with_context(|| format!("reading bootstrap params from {}", p.display()))?;
    BootstrapParams::from_json(&json).context("parsing bootstrap params JSON")
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
