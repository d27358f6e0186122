//! Filesystem watcher that keeps a [`WorkspaceScanner`] current.
//!
//! notify delivers events on its own thread; the callback forwards them with
//! `blocking_send` into a bounded channel drained by a single tokio task.
//! That task is the only writer to the scanner while the engine runs, so
//! changes are applied in the order they were observed.
//!
//! | Event | Change |
//! |-------|--------|
//! | create, modify, rename (unknown side) | [`FsChange::Upsert`] |
//! | remove, rename (source side) | [`FsChange::Remove`] |
//! | rename with both sides | [`FsChange::Rename`] |
//! | access | ignored |
//!
//! An event flagged for rescan (the kernel queue overflowed) triggers a full
//! [`WorkspaceScanner::scan`].

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::scanner::{ScanStats, WorkspaceScanner};

const EVENT_BUFFER: usize = 1024;

/// A filesystem change, reduced to what the scanner needs to do about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsChange {
    /// Path was created or modified; re-read it.
    Upsert(PathBuf),
    /// Path is gone; drop it and anything beneath it.
    Remove(PathBuf),
    Rename { from: PathBuf, to: PathBuf },
}

/// Reduce a raw notify event to scanner changes.
pub fn classify(event: &Event) -> Vec<FsChange> {
    let paths = &event.paths;
    match &event.kind {
        EventKind::Access(_) => Vec::new(),
        EventKind::Remove(_) => paths.iter().cloned().map(FsChange::Remove).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if paths.len() == 2 => {
            vec![FsChange::Rename {
                from: paths[0].clone(),
                to: paths[1].clone(),
            }]
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            paths.iter().cloned().map(FsChange::Remove).collect()
        }
        _ => paths.iter().cloned().map(FsChange::Upsert).collect(),
    }
}

/// Apply one change to the scanner.
pub async fn apply_change(scanner: &WorkspaceScanner, change: &FsChange) -> ScanStats {
    match change {
        FsChange::Upsert(path) => scanner.refresh_path(path).await,
        FsChange::Remove(path) => ScanStats {
            removed: scanner.remove_path(path).await,
            ..ScanStats::default()
        },
        FsChange::Rename { from, to } => {
            let removed = scanner.remove_path(from).await;
            let mut stats = scanner.refresh_path(to).await;
            stats.removed += removed;
            stats
        }
    }
}

/// A running watch over a scanner's root.
///
/// Dropping the watcher cancels its task without waiting for it; call
/// [`stop`](Self::stop) to wait until no further changes will be applied.
pub struct WorkspaceWatcher {
    root: PathBuf,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    watcher: Option<RecommendedWatcher>,
}

impl WorkspaceWatcher {
    /// Start watching `scanner.root()` recursively.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(scanner: Arc<WorkspaceScanner>) -> Result<Self, EngineError> {
        let root = scanner.root().to_path_buf();
        let (event_tx, event_rx) = mpsc::channel::<notify::Result<Event>>(EVENT_BUFFER);

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                // Fails only once the consumer is gone.
                let _ = event_tx.blocking_send(res);
            },
            notify::Config::default(),
        )?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(scanner, event_rx, cancel.clone()));
        info!(root = %root.display(), "Watching workspace");

        Ok(Self {
            root,
            cancel,
            task: Some(task),
            watcher: Some(watcher),
        })
    }

    /// Cancel the consumer task, wait for it, then release the OS watch.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(error = %err, "Watcher task ended abnormally");
            }
        }
        self.watcher.take();
        info!(root = %self.root.display(), "Stopped watching workspace");
    }
}

impl Drop for WorkspaceWatcher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(
    scanner: Arc<WorkspaceScanner>,
    mut events: mpsc::Receiver<notify::Result<Event>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            event = events.recv() => match event {
                Some(Ok(event)) => handle_event(&scanner, event).await,
                Some(Err(err)) => warn!(error = %err, "Watch error"),
                None => break,
            },
        }
    }
    debug!(root = %scanner.root().display(), "Watcher task exiting");
}

async fn handle_event(scanner: &WorkspaceScanner, event: Event) {
    if event.need_rescan() {
        warn!("Watch queue overflowed, rescanning workspace");
        scanner.scan().await;
        return;
    }
    for change in classify(&event) {
        let stats = apply_change(scanner, &change).await;
        if stats.changes() > 0 {
            debug!(
                ?change,
                indexed = stats.indexed,
                removed = stats.removed,
                "Applied filesystem change"
            );
        }
    }
}
