//! # Code Index Engine
//!
//! A live semantic index over a source-code workspace.
//!
//! The engine walks a workspace, embeds every source file (respecting
//! `.gitignore`, an extension allowlist, and never following symlinks), keeps
//! the index current through filesystem events, and answers similarity
//! queries over an HTTP control surface. Vectors may additionally be mirrored
//! into a Qdrant collection. A supervisor runs the engine as a child process
//! and restarts it when it dies.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐  spawn/poll   ┌─────────────────────────────────────┐
//! │ Supervisor │──────────────▶│ Engine process (code-index serve)   │
//! │  (client)  │◀──── HTTP ───▶│  server ─▶ engine ─▶ scanner ◀─ watcher
//! └────────────┘               │                       │             │
//!                              │               LocalIndex | Qdrant   │
//!                              └─────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! code-index serve                          # control surface on 127.0.0.1:8001
//! code-index start .                        # bind it to a workspace
//! code-index search "def parse_config"
//! code-index supervise . --port 8001        # or: run and babysit an engine
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Indexed blocks and control-surface bodies |
//! | [`error`] | Engine and supervisor error types |
//! | [`embedding`] | Embedding provider abstraction and cosine similarity |
//! | [`ignore_spec`] | `.gitignore` matching |
//! | [`filter`] | Which paths are indexable |
//! | [`store`] | Vector index trait, local and Qdrant implementations |
//! | [`scanner`] | The path → block index and its mutations |
//! | [`watcher`] | Filesystem events → scanner updates |
//! | [`engine`] | NotStarted/Running state machine |
//! | [`server`] | HTTP control surface |
//! | [`client`] | HTTP client for the control surface |
//! | [`supervisor`] | Child-process lifecycle and liveness |

pub mod client;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod filter;
pub mod ignore_spec;
pub mod models;
pub mod scanner;
pub mod server;
pub mod store;
pub mod supervisor;
pub mod watcher;
