//! Engine supervisor: runs the engine as a child process and keeps it alive.
//!
//! The supervisor spawns `<program> [base args] serve --bind 127.0.0.1:<port>`,
//! waits for its status endpoint to answer, and binds it to a workspace. A
//! liveness task polls the engine on a fixed interval and, when the process
//! has died, spawns a replacement and replays the last `start`. A live engine
//! whose last `start` from this supervisor failed is bound again.
//!
//! `start` answers only after the initial scan, so it runs under
//! `start_timeout` rather than the short status-probe `request_timeout`.
//!
//! # Phases
//!
//! ```text
//! Stopped ──▶ Probing ──▶ Running
//!    ▲           │  ▲         │
//!    └───────────┘  └─────────┘ (restart)
//! ```
//!
//! Any phase may move to `Stopped` (shutdown or a failed launch).
//!
//! # Process Ownership
//!
//! Children are spawned with `kill_on_drop`, so dropping the supervisor
//! terminates the engine even when [`Supervisor::shutdown`] is never called.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::{Child, Command};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::EngineClient;
use crate::config::SupervisorConfig;
use crate::error::SupervisorError;
use crate::models::{RemoteStoreParams, SearchHit, StatusResponse};

// ============ Launcher ============

/// How to run an engine process.
#[derive(Debug, Clone)]
pub struct EngineLauncher {
    program: PathBuf,
    base_args: Vec<OsString>,
}

impl EngineLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            base_args: Vec::new(),
        }
    }

    /// Launch engines with the currently running executable.
    pub fn current_exe() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    /// Argument placed before the `serve` subcommand.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.base_args.push(arg.into());
        self
    }

    fn command(&self, port: u16, inherit_output: bool) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.base_args)
            .arg("serve")
            .arg("--bind")
            .arg(format!("127.0.0.1:{}", port))
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if !inherit_output {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }
        cmd
    }
}

// ============ Phases ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorPhase {
    /// No engine process is owned.
    Stopped,
    /// A process was spawned and is being probed for readiness.
    Probing,
    /// The engine answered and was bound to the workspace.
    Running,
}

impl SupervisorPhase {
    pub fn can_transition_to(self, next: SupervisorPhase) -> bool {
        use SupervisorPhase::*;
        matches!(
            (self, next),
            (Stopped, Probing) | (Probing, Running) | (Running, Probing) | (_, Stopped)
        )
    }
}

// ============ Supervisor ============

/// The workspace an engine should be bound to.
#[derive(Debug, Clone)]
struct Binding {
    root: String,
    remote: Option<RemoteStoreParams>,
}

#[derive(Default)]
struct ProcessState {
    child: Option<Child>,
    binding: Option<Binding>,
    /// The owned child accepted `start` for the current binding.
    bound: bool,
}

impl ProcessState {
    /// True if a child is owned and has not exited.
    fn child_alive(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }
}

struct Inner {
    launcher: EngineLauncher,
    settings: SupervisorConfig,
    client: EngineClient,
    state: Mutex<ProcessState>,
    phase: watch::Sender<SupervisorPhase>,
}

struct LivenessTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct Supervisor {
    inner: Arc<Inner>,
    liveness: Mutex<Option<LivenessTask>>,
}

impl Supervisor {
    pub fn new(launcher: EngineLauncher, settings: SupervisorConfig) -> Result<Self, SupervisorError> {
        let client = EngineClient::local(settings.port, settings.request_timeout())?
            .with_start_timeout(settings.start_timeout());
        let (phase, _) = watch::channel(SupervisorPhase::Stopped);
        Ok(Self {
            inner: Arc::new(Inner {
                launcher,
                settings,
                client,
                state: Mutex::new(ProcessState::default()),
                phase,
            }),
            liveness: Mutex::new(None),
        })
    }

    pub fn client(&self) -> &EngineClient {
        &self.inner.client
    }

    pub fn phase(&self) -> SupervisorPhase {
        *self.inner.phase.borrow()
    }

    /// Phase changes as they happen.
    pub fn subscribe(&self) -> watch::Receiver<SupervisorPhase> {
        self.inner.phase.subscribe()
    }

    /// OS process id of the owned engine, if any.
    pub async fn engine_pid(&self) -> Option<u32> {
        let state = self.inner.state.lock().await;
        state.child.as_ref().and_then(|child| child.id())
    }

    /// Make sure an engine is running and bound to `root`.
    ///
    /// An engine that already answers is only re-bound; otherwise a new
    /// process is spawned and probed first.
    pub async fn launch(
        &self,
        root: &str,
        remote: Option<RemoteStoreParams>,
    ) -> Result<(), SupervisorError> {
        let mut state = self.inner.state.lock().await;
        state.binding = Some(Binding {
            root: root.to_string(),
            remote,
        });
        state.bound = false;

        let healthy = state.child_alive() && self.inner.client.status().await.is_ok();
        if !healthy {
            self.inner.respawn(&mut state, None).await?;
        }
        self.inner.bind(&mut state, None).await
    }

    /// Restart the engine if its process is gone, or bind it again if its
    /// last `start` failed.
    ///
    /// Returns `false` without side effects when the engine is alive and
    /// bound.
    pub async fn restart(&self) -> Result<bool, SupervisorError> {
        self.inner.check_once(None).await
    }

    /// Start polling the engine every `poll_interval`. No-op if already polling.
    pub async fn start_liveness(&self) {
        let mut slot = self.liveness.lock().await;
        if slot.is_some() {
            return;
        }
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(self.inner.clone().liveness_loop(cancel.clone()));
        *slot = Some(LivenessTask { cancel, handle });
        debug!("Liveness polling started");
    }

    /// Cancel the liveness task and wait for its current iteration to finish.
    pub async fn stop_liveness(&self) {
        let task = self.liveness.lock().await.take();
        if let Some(task) = task {
            task.cancel.cancel();
            if let Err(err) = task.handle.await {
                warn!(error = %err, "Liveness task ended abnormally");
            }
            debug!("Liveness polling stopped");
        }
    }

    /// Stop polling, ask the engine to stop and exit, and reap the process.
    ///
    /// The child is killed if it has not exited within `shutdown_grace`.
    pub async fn shutdown(&self) {
        self.stop_liveness().await;

        let mut state = self.inner.state.lock().await;
        let Some(mut child) = state.child.take() else {
            self.inner.set_phase(SupervisorPhase::Stopped);
            return;
        };

        if let Err(err) = self.inner.client.stop().await {
            debug!(error = %err, "Engine stop request failed");
        }
        if let Err(err) = self.inner.client.shutdown().await {
            debug!(error = %err, "Engine shutdown request failed");
        }

        let grace = self.inner.settings.shutdown_grace();
        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => info!(%status, "Engine process exited"),
            Ok(Err(err)) => warn!(error = %err, "Failed to wait for engine process"),
            Err(_) => {
                warn!(error = %SupervisorError::ShutdownTimeout(grace), "Killing engine process");
                if let Err(err) = child.kill().await {
                    warn!(error = %err, "Failed to kill engine process");
                }
            }
        }
        self.inner.set_phase(SupervisorPhase::Stopped);
    }

    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        path_prefix: Option<&str>,
    ) -> Result<Vec<SearchHit>, SupervisorError> {
        Ok(self.inner.client.search(query, top_k, path_prefix).await?)
    }

    pub async fn status(&self) -> Result<StatusResponse, SupervisorError> {
        Ok(self.inner.client.status().await?)
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.liveness.try_lock() {
            if let Some(task) = slot.take() {
                task.cancel.cancel();
            }
        }
    }
}

impl Inner {
    fn set_phase(&self, next: SupervisorPhase) -> bool {
        let current = *self.phase.borrow();
        if current == next {
            return true;
        }
        if !current.can_transition_to(next) {
            warn!(?current, ?next, "Rejected supervisor phase transition");
            return false;
        }
        self.phase.send_replace(next);
        debug!(?current, ?next, "Supervisor phase changed");
        true
    }

    /// Replace any owned child with a freshly spawned, ready engine.
    async fn respawn(
        &self,
        state: &mut ProcessState,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), SupervisorError> {
        self.set_phase(SupervisorPhase::Probing);

        if let Some(mut old) = state.child.take() {
            if let Err(err) = old.kill().await {
                debug!(error = %err, "Previous engine process already gone");
            }
        }

        let port = self.settings.port;
        let mut child = match self
            .launcher
            .command(port, self.settings.inherit_output)
            .spawn()
        {
            Ok(child) => child,
            Err(err) => {
                self.set_phase(SupervisorPhase::Stopped);
                return Err(SupervisorError::Spawn(err));
            }
        };
        info!(pid = ?child.id(), port, "Spawned engine process");

        state.bound = false;
        match self.wait_ready(&mut child, cancel).await {
            Ok(()) => {
                state.child = Some(child);
                Ok(())
            }
            Err(err) => {
                if let Err(kill_err) = child.kill().await {
                    debug!(error = %kill_err, "Engine process already exited");
                }
                self.set_phase(SupervisorPhase::Stopped);
                Err(err)
            }
        }
    }

    async fn wait_ready(
        &self,
        child: &mut Child,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), SupervisorError> {
        let attempts = self.settings.ready_attempts;
        for attempt in 1..=attempts {
            if let Ok(Some(status)) = child.try_wait() {
                warn!(%status, "Engine process exited during startup");
                return Err(SupervisorError::ProcessUnresponsive { attempts: attempt });
            }
            if self.client.status().await.is_ok() {
                debug!(attempt, "Engine ready");
                return Ok(());
            }

            let pause = tokio::time::sleep(self.settings.ready_interval());
            match cancel {
                Some(token) => tokio::select! {
                    _ = token.cancelled() => return Err(SupervisorError::Cancelled),
                    _ = pause => {}
                },
                None => pause.await,
            }
        }
        Err(SupervisorError::ProcessUnresponsive { attempts })
    }

    /// Issue `start` for the recorded binding, if any.
    async fn bind(
        &self,
        state: &mut ProcessState,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), SupervisorError> {
        if let Some(binding) = &state.binding {
            let start = self.client.start(&binding.root, binding.remote.as_ref());
            match cancel {
                Some(token) => tokio::select! {
                    _ = token.cancelled() => return Err(SupervisorError::Cancelled),
                    result = start => { result?; }
                },
                None => {
                    start.await?;
                }
            }
            info!(root = %binding.root, "Engine bound to workspace");
        }
        state.bound = true;
        self.set_phase(SupervisorPhase::Running);
        Ok(())
    }

    /// One liveness check. Returns whether the engine was respawned or bound
    /// again.
    async fn check_once(&self, cancel: Option<&CancellationToken>) -> Result<bool, SupervisorError> {
        let mut state = self.state.lock().await;
        if state.binding.is_none() {
            return Ok(false);
        }

        let answered = match self.client.status().await {
            Ok(status) if status.is_running() => {
                if !state.bound && state.child_alive() {
                    // Our `start` gave up waiting but the engine finished it.
                    info!("Engine finished binding");
                    state.bound = true;
                    self.set_phase(SupervisorPhase::Running);
                }
                return Ok(false);
            }
            Ok(status) => {
                debug!(status = ?status.status, "Engine not running");
                true
            }
            Err(err) => {
                warn!(error = %err, "Engine status check failed");
                false
            }
        };

        if state.child_alive() {
            if answered && !state.bound {
                info!("Engine is not bound, replaying start");
                self.bind(&mut state, cancel).await?;
                return Ok(true);
            }
            return Ok(false);
        }

        warn!("Engine process is gone, restarting");
        self.respawn(&mut state, cancel).await?;
        self.bind(&mut state, cancel).await?;
        Ok(true)
    }

    async fn liveness_loop(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.settings.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            match self.check_once(Some(&cancel)).await {
                Ok(true) => info!("Engine recovered"),
                Ok(false) => {}
                Err(SupervisorError::Cancelled) => break,
                Err(err) => warn!(error = %err, "Engine restart failed, will retry"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_transitions() {
        use SupervisorPhase::*;
        assert!(Stopped.can_transition_to(Probing));
        assert!(Probing.can_transition_to(Running));
        assert!(Running.can_transition_to(Probing));
        assert!(Running.can_transition_to(Stopped));
        assert!(Probing.can_transition_to(Stopped));
        assert!(!Stopped.can_transition_to(Running));
        assert!(!Probing.can_transition_to(Probing));
    }

    #[test]
    fn test_launcher_command_line() {
        let launcher = EngineLauncher::new("/usr/bin/code-index")
            .arg("--config")
            .arg("/etc/ci.toml");
        let cmd = launcher.command(9123, false);
        let std_cmd = cmd.as_std();
        let args: Vec<_> = std_cmd
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert_eq!(std_cmd.get_program(), "/usr/bin/code-index");
        assert_eq!(
            args,
            vec!["--config", "/etc/ci.toml", "serve", "--bind", "127.0.0.1:9123"]
        );
    }

    #[tokio::test]
    async fn test_restart_before_launch_is_noop() {
        let supervisor = Supervisor::new(
            EngineLauncher::new("/nonexistent/engine"),
            SupervisorConfig::default(),
        )
        .unwrap();
        assert!(!supervisor.restart().await.unwrap());
        assert_eq!(supervisor.phase(), SupervisorPhase::Stopped);
        assert!(supervisor.engine_pid().await.is_none());
    }

    #[tokio::test]
    async fn test_launch_with_missing_program_is_spawn_error() {
        let settings = SupervisorConfig {
            port: 1,
            ..SupervisorConfig::default()
        };
        let supervisor =
            Supervisor::new(EngineLauncher::new("/nonexistent/engine"), settings).unwrap();
        let result = supervisor.launch("/tmp", None).await;
        assert!(matches!(result, Err(SupervisorError::Spawn(_))));
        assert_eq!(supervisor.phase(), SupervisorPhase::Stopped);
        supervisor.shutdown().await;
    }
}
