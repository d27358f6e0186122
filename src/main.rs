//! # Code Index CLI (`code-index`)
//!
//! Runs the engine's control surface, supervises an engine process, or talks
//! to a running engine.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `code-index serve` | Run the HTTP control surface |
//! | `code-index supervise <root>` | Spawn an engine on `<root>` and keep it alive |
//! | `code-index scan <root>` | One-shot in-process scan, optionally searching |
//! | `code-index start <path>` | Bind a running engine to a workspace |
//! | `code-index stop` / `clear` | Unbind a running engine |
//! | `code-index status` | Show engine status |
//! | `code-index search "<query>"` | Query a running engine |
//!
//! ## Examples
//!
//! ```bash
//! code-index serve --bind 127.0.0.1:8001
//! code-index start ~/src/project --remote-url http://localhost:6333
//! code-index search "fn load_config" --top-k 3 --prefix src
//! RUST_LOG=debug code-index supervise ~/src/project
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use code_index_engine::client::EngineClient;
use code_index_engine::config::{self, Config};
use code_index_engine::embedding::create_provider;
use code_index_engine::models::{RemoteStoreParams, SearchHit};
use code_index_engine::scanner::WorkspaceScanner;
use code_index_engine::server;
use code_index_engine::store::LocalIndex;
use code_index_engine::supervisor::{EngineLauncher, Supervisor};

/// Code Index: a live semantic index over a source-code workspace.
#[derive(Parser)]
#[command(name = "code-index", version, about)]
struct Cli {
    /// Path to a configuration file (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Engine URL for client commands. Defaults to `http://<server.bind>`.
    #[arg(long, global = true)]
    url: Option<String>,

    /// Increase log verbosity (`-v` debug, `-vv` trace). `RUST_LOG` wins.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP control surface until Ctrl-C or `POST /shutdown`.
    Serve {
        /// Address to bind, overriding `[server].bind`.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Spawn an engine process bound to `root` and restart it if it dies.
    Supervise {
        root: PathBuf,

        /// Port for the engine, overriding `[supervisor].port`.
        #[arg(long)]
        port: Option<u16>,

        #[command(flatten)]
        remote: RemoteArgs,
    },

    /// Scan a workspace in-process and print what was indexed.
    Scan {
        root: PathBuf,

        /// Also run this query against the fresh index.
        #[arg(long)]
        query: Option<String>,

        #[arg(long, default_value_t = 5)]
        top_k: usize,
    },

    /// Bind a running engine to a workspace.
    Start {
        path: PathBuf,

        #[command(flatten)]
        remote: RemoteArgs,
    },

    /// Unbind a running engine (idempotent).
    Stop,

    /// Unbind a running engine; fails if it is not bound.
    Clear,

    /// Show whether the engine is bound, and to what.
    Status,

    /// Query a running engine.
    Search {
        query: String,

        #[arg(long, default_value_t = 5)]
        top_k: usize,

        /// Only return files under this path (relative to the workspace root or absolute).
        #[arg(long)]
        prefix: Option<String>,
    },
}

#[derive(clap::Args)]
struct RemoteArgs {
    /// Qdrant URL; vectors are mirrored there and searches answered by it.
    #[arg(long)]
    remote_url: Option<String>,

    /// Qdrant API key. Falls back to `[remote].api_key`.
    #[arg(long)]
    remote_api_key: Option<String>,
}

impl RemoteArgs {
    fn params(&self, config: &Config) -> Option<RemoteStoreParams> {
        self.remote_url.as_ref().map(|url| RemoteStoreParams {
            url: url.clone(),
            api_key: self
                .remote_api_key
                .clone()
                .or_else(|| config.remote.api_key.clone()),
        })
    }
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("info"),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut cfg = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => Config::minimal(),
    };

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                cfg.server.bind = bind;
            }
            server::run_server(&cfg).await?;
        }
        Commands::Supervise { root, port, remote } => {
            if let Some(port) = port {
                cfg.supervisor.port = port;
            }
            supervise(&cfg, cli.config.as_deref(), &root, remote.params(&cfg)).await?;
        }
        Commands::Scan { root, query, top_k } => {
            scan(&cfg, &root, query.as_deref(), top_k).await?;
        }
        Commands::Start { path, remote } => {
            let client = engine_client(&cfg, cli.url.as_deref())?;
            let path = absolute(&path);
            let response = client.start(&path, remote.params(&cfg).as_ref()).await?;
            println!("{} ({})", response.status, path);
        }
        Commands::Stop => {
            let client = engine_client(&cfg, cli.url.as_deref())?;
            println!("{}", client.stop().await?.status);
        }
        Commands::Clear => {
            let client = engine_client(&cfg, cli.url.as_deref())?;
            println!("{}", client.clear().await?.status);
        }
        Commands::Status => {
            let client = engine_client(&cfg, cli.url.as_deref())?;
            let status = client.status().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Search {
            query,
            top_k,
            prefix,
        } => {
            let client = engine_client(&cfg, cli.url.as_deref())?;
            let hits = client.search(&query, top_k, prefix.as_deref()).await?;
            print_hits(&hits);
        }
    }

    Ok(())
}

fn engine_client(cfg: &Config, url: Option<&str>) -> anyhow::Result<EngineClient> {
    let base = match url {
        Some(url) => url.to_string(),
        None => format!("http://{}", cfg.server.bind),
    };
    let client = EngineClient::new(base, cfg.remote.timeout())?
        .with_start_timeout(cfg.supervisor.start_timeout());
    Ok(client)
}

/// Resolve `path` on this side, since the engine may run in another directory.
fn absolute(path: &Path) -> String {
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

async fn supervise(
    cfg: &Config,
    config_path: Option<&Path>,
    root: &Path,
    remote: Option<RemoteStoreParams>,
) -> anyhow::Result<()> {
    let mut launcher = EngineLauncher::current_exe().context("Cannot locate own executable")?;
    if let Some(path) = config_path {
        launcher = launcher.arg("--config").arg(absolute(path));
    }

    let supervisor = Supervisor::new(launcher, cfg.supervisor.clone())?;
    supervisor.launch(&absolute(root), remote).await?;
    supervisor.start_liveness().await;
    info!(
        root = %root.display(),
        port = cfg.supervisor.port,
        pid = ?supervisor.engine_pid().await,
        "Supervising engine; press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;
    supervisor.shutdown().await;
    Ok(())
}

async fn scan(cfg: &Config, root: &Path, query: Option<&str>, top_k: usize) -> anyhow::Result<()> {
    let root = std::fs::canonicalize(root)
        .with_context(|| format!("Workspace not found: {}", root.display()))?;
    let embedder = create_provider(&cfg.index)?;
    let scanner = WorkspaceScanner::new(&root, &cfg.index, embedder, Arc::new(LocalIndex::new()))?;

    let stats = scanner.scan().await;
    println!(
        "Indexed {} files under {} ({} skipped)",
        stats.indexed,
        root.display(),
        stats.skipped
    );

    if let Some(query) = query {
        let results = scanner.search(query, top_k, None).await?;
        let hits: Vec<SearchHit> = results
            .into_iter()
            .map(|scored| SearchHit {
                path: scored.block.path.display().to_string(),
                content: scored
                    .block
                    .content
                    .chars()
                    .take(cfg.index.snippet_chars)
                    .collect(),
                score: scored.score,
            })
            .collect();
        print_hits(&hits);
    } else {
        for path in scanner.paths().await {
            println!("  {}", path.display());
        }
    }
    Ok(())
}

fn print_hits(hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No results.");
        return;
    }
    for (i, hit) in hits.iter().enumerate() {
        println!("{}. [{:.3}] {}", i + 1, hit.score, hit.path);
        if let Some(first) = hit.content.lines().find(|l| !l.trim().is_empty()) {
            println!("    {}", first.trim());
        }
    }
}
