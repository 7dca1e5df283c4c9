//! Runs the node in the foreground with an optional companion server.
//!
//! Order of events:
//! 1. spawn the companion (if any) and wait for it to answer HTTP
//! 2. open a browser on it once ready
//! 3. run the node until it exits or the operator interrupts
//! 4. kill and reap the companion, whatever happened in 3
//! 5. remove the ephemeral store, if asked to
//!
//! An interrupt during 1 skips the node entirely. An interrupt during 3 is
//! forwarded to the node as SIGINT so it can flush its trace output; it is
//! killed only if it outlives [`LaunchOptions::shutdown_grace`].

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use deptrace_core::{DeptraceError, ResolvedConfig};
use tracing::{debug, info, warn};

use crate::error::{LaunchError, Result};
use crate::flags::node_args;
use crate::process::ChildGuard;
use crate::readiness::{self, Readiness};

/// Where the trace viewer listens.
pub const COMPANION_URL: &str = "http://127.0.0.1:4334";

/// How long an interrupted node may take to exit before it is killed.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// A background server started before the node.
#[derive(Debug, Clone)]
pub struct Companion {
    pub program: PathBuf,
    /// Leading arguments; the resolved `output` is appended after these.
    pub args: Vec<String>,
    pub url: String,
    pub open_browser: bool,
}

impl Companion {
    /// The flask trace viewer shipped next to the node binary.
    pub fn webview(script: impl Into<PathBuf>) -> Self {
        let script: PathBuf = script.into();
        Self {
            program: PathBuf::from("python3"),
            args: vec![script.to_string_lossy().into_owned()],
            url: COMPANION_URL.to_string(),
            open_browser: true,
        }
    }

    pub fn without_browser(mut self) -> Self {
        self.open_browser = false;
        self
    }
}

/// How to run the node.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub node_bin: PathBuf,
    pub http_addr: Option<String>,
    pub companion: Option<Companion>,
    /// Remove the config's on-disk store after the node exits.
    pub ephemeral: bool,
    pub ready_timeout: Duration,
    pub ready_interval: Duration,
    pub shutdown_grace: Duration,
}

impl LaunchOptions {
    pub fn new(node_bin: impl Into<PathBuf>) -> Self {
        Self {
            node_bin: node_bin.into(),
            http_addr: None,
            companion: None,
            ephemeral: false,
            ready_timeout: readiness::DEFAULT_TIMEOUT,
            ready_interval: readiness::DEFAULT_INTERVAL,
            shutdown_grace: SHUTDOWN_GRACE,
        }
    }

    pub fn with_http_addr(mut self, addr: impl Into<String>) -> Self {
        self.http_addr = Some(addr.into());
        self
    }

    pub fn with_companion(mut self, companion: Companion) -> Self {
        self.companion = Some(companion);
        self
    }

    pub fn ephemeral(mut self, ephemeral: bool) -> Self {
        self.ephemeral = ephemeral;
        self
    }

    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

/// How the node run ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeExit {
    /// The node exited successfully on its own
    Exited(ExitStatus),
    /// The operator interrupted the run and the node was stopped
    Interrupted,
}

/// Run until the node exits or Ctrl-C arrives.
pub async fn launch(options: &LaunchOptions, config: &ResolvedConfig) -> Result<NodeExit> {
    // Installed before anything is spawned so an early Ctrl-C is not lost
    let interrupt = Interrupt::listen();
    launch_until(options, config, interrupt.recv()).await
}

/// Run until the node exits or `shutdown` completes.
pub async fn launch_until<F>(
    options: &LaunchOptions,
    config: &ResolvedConfig,
    shutdown: F,
) -> Result<NodeExit>
where
    F: Future<Output = ()>,
{
    let args = node_args(config, options.http_addr.as_deref())?;
    tokio::pin!(shutdown);

    let mut companion = None;
    let mut interrupted = false;
    if let Some(spec) = &options.companion {
        let (guard, stopped) = start_companion(spec, config, options, shutdown.as_mut()).await?;
        companion = Some(guard);
        interrupted = stopped;
    }

    let outcome = if interrupted {
        info!("interrupt received before the node started");
        Ok(NodeExit::Interrupted)
    } else {
        run_node(options, &args, shutdown.as_mut()).await
    };

    if let Some(guard) = companion.take() {
        let name = guard.name().to_string();
        match guard.terminate().await {
            Ok(status) => info!(name = %name, %status, "companion stopped"),
            Err(e) => warn!(name = %name, error = %e, "failed to stop companion"),
        }
    }

    if options.ephemeral {
        remove_store(config);
    }

    outcome
}

/// Returns the running companion, and `true` if `shutdown` fired while
/// waiting for it to answer.
async fn start_companion<F>(
    spec: &Companion,
    config: &ResolvedConfig,
    options: &LaunchOptions,
    mut shutdown: Pin<&mut F>,
) -> Result<(ChildGuard, bool)>
where
    F: Future<Output = ()>,
{
    let output = config.output().ok_or_else(|| DeptraceError::ConfigInvalid {
        field: "output".to_string(),
        reason: "must name a trace file to view".to_string(),
    })?;

    let mut args = spec.args.clone();
    args.push(output.to_string());
    let mut guard = ChildGuard::spawn("companion", &spec.program, &args)?;
    info!(program = %spec.program.display(), output, pid = ?guard.id(), "companion started");

    let state = tokio::select! {
        state = readiness::wait_for_http(
            &spec.url,
            &mut guard,
            options.ready_timeout,
            options.ready_interval,
        ) => state,
        () = &mut shutdown => return Ok((guard, true)),
    };

    match state {
        Readiness::Ready if spec.open_browser => open_browser(&spec.url),
        Readiness::Ready => debug!(url = %spec.url, "companion ready"),
        Readiness::TimedOut => warn!(
            url = %spec.url,
            timeout_ms = options.ready_timeout.as_millis() as u64,
            "companion did not answer in time, not opening a browser"
        ),
        Readiness::Exited => warn!(url = %spec.url, "companion exited before answering"),
    }
    Ok((guard, false))
}

async fn run_node<F>(
    options: &LaunchOptions,
    args: &[String],
    shutdown: Pin<&mut F>,
) -> Result<NodeExit>
where
    F: Future<Output = ()>,
{
    let mut node = ChildGuard::spawn("node", &options.node_bin, args)?;
    info!(bin = %options.node_bin.display(), pid = ?node.id(), "node started");

    let finished = tokio::select! {
        status = node.wait() => Some(status),
        () = shutdown => None,
    };

    match finished {
        Some(status) => {
            let status = status?;
            if status.success() {
                info!(%status, "node exited");
                Ok(NodeExit::Exited(status))
            } else {
                Err(LaunchError::NodeFailed {
                    code: status.code(),
                })
            }
        }
        None => {
            info!(
                grace_ms = options.shutdown_grace.as_millis() as u64,
                "interrupt received, stopping node"
            );
            let status = node.shutdown(options.shutdown_grace).await?;
            debug!(%status, "node stopped");
            Ok(NodeExit::Interrupted)
        }
    }
}

/// A Ctrl-C listener registered at construction.
///
/// Never fires if the handler cannot be installed.
struct Interrupt {
    #[cfg(unix)]
    signal: Option<tokio::signal::unix::Signal>,
}

impl Interrupt {
    #[cfg(unix)]
    fn listen() -> Self {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::interrupt()) {
            Ok(signal) => Self {
                signal: Some(signal),
            },
            Err(e) => {
                warn!(error = %e, "cannot listen for Ctrl-C");
                Self { signal: None }
            }
        }
    }

    #[cfg(not(unix))]
    fn listen() -> Self {
        Self {}
    }

    #[cfg(unix)]
    async fn recv(mut self) {
        match self.signal.as_mut() {
            Some(signal) => {
                signal.recv().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    #[cfg(not(unix))]
    async fn recv(self) {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}

fn remove_store(config: &ResolvedConfig) {
    match &config.cleanup {
        Some(path) => match deptrace_core::remove_path(path) {
            Ok(()) => info!(path = %path.display(), "removed ephemeral store"),
            Err(e) => warn!(error = %e, "failed to remove ephemeral store"),
        },
        None => debug!(engine = config.engine(), "no on-disk store to remove"),
    }
}

/// Best effort; a missing opener only costs a warning.
fn open_browser(url: &str) {
    let (opener, args): (&str, &[&str]) = if cfg!(target_os = "macos") {
        ("open", &[])
    } else if cfg!(windows) {
        ("cmd", &["/C", "start", ""])
    } else {
        ("xdg-open", &[])
    };

    let spawned = tokio::process::Command::new(opener)
        .args(args)
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();
    match spawned {
        Ok(_) => info!(url, "opened browser"),
        Err(e) => warn!(url, opener, error = %e, "failed to open browser"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webview_companion_runs_python() {
        let companion = Companion::webview("/opt/deptrace/webview/app.py");
        assert_eq!(companion.program, PathBuf::from("python3"));
        assert_eq!(companion.args, vec!["/opt/deptrace/webview/app.py"]);
        assert_eq!(companion.url, COMPANION_URL);
        assert!(companion.open_browser);
        assert!(!companion.without_browser().open_browser);
    }

    #[test]
    fn options_default_to_plain_run() {
        let options = LaunchOptions::new("geth");
        assert!(options.companion.is_none());
        assert!(options.http_addr.is_none());
        assert!(!options.ephemeral);
        assert_eq!(options.ready_timeout, Duration::from_secs(10));
        assert_eq!(options.ready_interval, Duration::from_millis(100));
        assert_eq!(options.shutdown_grace, SHUTDOWN_GRACE);
    }

    #[tokio::test]
    async fn companion_requires_output() {
        let config = deptrace_core::config::parse(
            r#"{"kv":{"engine":"memory"},"output":""}"#,
            std::path::Path::new("/"),
        )
        .unwrap();
        let options = LaunchOptions::new("/bin/true").with_companion(
            Companion::webview("app.py").without_browser(),
        );

        let err = launch_until(&options, &config, std::future::pending())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LaunchError::Config(DeptraceError::ConfigInvalid { .. })
        ));
    }
}
