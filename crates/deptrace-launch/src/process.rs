//! Scoped child processes.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::{LaunchError, Result};

/// A child process that is killed when the guard goes away.
///
/// Call [`ChildGuard::terminate`] or [`ChildGuard::shutdown`] on the normal
/// path to stop and reap the child. If the guard is dropped instead (panic,
/// cancelled future), the child is still sent a kill signal.
#[derive(Debug)]
pub struct ChildGuard {
    name: String,
    child: Option<Child>,
}

impl ChildGuard {
    /// Spawn `program` with `args`, stdin closed and output inherited.
    pub fn spawn(name: impl Into<String>, program: &Path, args: &[String]) -> Result<Self> {
        let name = name.into();
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                name: name.clone(),
                program: program.to_path_buf(),
                source,
            })?;

        debug!(name = %name, pid = ?child.id(), "spawned child");
        Ok(Self {
            name,
            child: Some(child),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// OS process id, `None` once the child has been reaped.
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Exit status if the child has already exited.
    pub fn try_status(&mut self) -> Result<Option<ExitStatus>> {
        match self.child.as_mut() {
            Some(child) => child.try_wait().map_err(|source| LaunchError::Wait {
                name: self.name.clone(),
                source,
            }),
            None => Ok(None),
        }
    }

    /// Wait for the child to exit on its own.
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        let name = self.name.clone();
        let child = self.child.as_mut().ok_or_else(|| LaunchError::Wait {
            name: name.clone(),
            source: std::io::Error::other("child already reaped"),
        })?;
        let status = child
            .wait()
            .await
            .map_err(|source| LaunchError::Wait { name, source })?;
        self.child = None;
        Ok(status)
    }

    /// Kill the child (if still running) and reap it.
    pub async fn terminate(mut self) -> Result<ExitStatus> {
        let name = self.name.clone();
        let Some(mut child) = self.child.take() else {
            return Err(LaunchError::Wait {
                name,
                source: std::io::Error::other("child already reaped"),
            });
        };

        if let Err(e) = child.start_kill() {
            // InvalidInput means the child already exited
            if e.kind() != std::io::ErrorKind::InvalidInput {
                warn!(name = %name, error = %e, "failed to signal child");
            }
        }
        let status = child
            .wait()
            .await
            .map_err(|source| LaunchError::Wait {
                name: name.clone(),
                source,
            })?;
        debug!(name = %name, %status, "child terminated");
        Ok(status)
    }

    /// Send SIGINT and give the child `grace` to exit before killing it.
    pub async fn shutdown(mut self, grace: Duration) -> Result<ExitStatus> {
        let name = self.name.clone();
        let Some(child) = self.child.as_mut() else {
            return Err(LaunchError::Wait {
                name,
                source: std::io::Error::other("child already reaped"),
            });
        };

        if let Err(e) = send_interrupt(child) {
            debug!(name = %name, error = %e, "interrupt not delivered");
        }
        match tokio::time::timeout(grace, child.wait()).await {
            Ok(waited) => {
                let status = waited.map_err(|source| LaunchError::Wait {
                    name: name.clone(),
                    source,
                })?;
                self.child = None;
                debug!(name = %name, %status, "child stopped on interrupt");
                Ok(status)
            }
            Err(_) => {
                warn!(
                    name = %name,
                    grace_ms = grace.as_millis() as u64,
                    "child ignored interrupt, killing"
                );
                self.terminate().await
            }
        }
    }
}

#[cfg(unix)]
fn send_interrupt(child: &Child) -> std::io::Result<()> {
    let id = child
        .id()
        .ok_or_else(|| std::io::Error::other("child process is not running"))?;

    // SAFETY: kill(2) has no memory-safety preconditions
    let result = unsafe { libc::kill(id as libc::pid_t, libc::SIGINT) };
    if result == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn send_interrupt(child: &mut Child) -> std::io::Result<()> {
    child.start_kill()
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            if let Err(e) = child.start_kill() {
                debug!(name = %self.name, error = %e, "kill on drop failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    /// Running and not a zombie.
    fn alive(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .map(|rest| !rest.trim_start().starts_with('Z'))
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    #[tokio::test]
    async fn test_terminate_kills_running_child() {
        let guard = ChildGuard::spawn("sleeper", Path::new("sleep"), &["30".to_string()]).unwrap();
        let pid = guard.id().unwrap();
        assert!(alive(pid));

        let status = guard.terminate().await.unwrap();
        assert!(!status.success());
        assert!(!alive(pid));
    }

    #[tokio::test]
    async fn test_wait_reports_exit_code() {
        let mut guard = ChildGuard::spawn("exit", Path::new("sh"), &sh("exit 3")).unwrap();
        let status = guard.wait().await.unwrap();
        assert_eq!(status.code(), Some(3));
        assert_eq!(guard.id(), None);
    }

    #[tokio::test]
    async fn test_drop_kills_child() {
        let guard = ChildGuard::spawn("sleeper", Path::new("sleep"), &["30".to_string()]).unwrap();
        let pid = guard.id().unwrap();
        drop(guard);

        // The kill is asynchronous; give the reaper a moment.
        let mut gone = false;
        for _ in 0..50 {
            if !alive(pid) {
                gone = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(gone, "child {pid} survived its guard");
    }

    #[tokio::test]
    async fn test_terminate_after_exit_is_ok() {
        let mut guard = ChildGuard::spawn("quick", Path::new("sh"), &sh("exit 0")).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(guard.try_status().unwrap().is_some());
        // try_wait reaped it but the handle is still held
        assert!(guard.terminate().await.unwrap().success());
    }

    #[tokio::test]
    async fn test_shutdown_lets_child_finish_on_interrupt() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("flushed");
        let script = format!(
            "trap 'sleep 0.3; touch \"{}\"; exit 0' INT; while :; do sleep 0.05; done",
            marker.display()
        );
        let guard = ChildGuard::spawn("flusher", Path::new("sh"), &sh(&script)).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let status = guard.shutdown(Duration::from_secs(5)).await.unwrap();
        assert!(status.success());
        assert!(marker.exists());
    }

    #[tokio::test]
    async fn test_shutdown_kills_child_ignoring_interrupt() {
        let guard =
            ChildGuard::spawn("stubborn", Path::new("sh"), &sh("trap '' INT; sleep 30")).unwrap();
        let pid = guard.id().unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let status = guard.shutdown(Duration::from_millis(200)).await.unwrap();
        assert!(!status.success());
        assert!(!alive(pid));
    }

    #[tokio::test]
    async fn test_spawn_missing_program() {
        let err = ChildGuard::spawn("ghost", Path::new("/nonexistent/ghost-bin"), &[]).unwrap_err();
        assert!(matches!(err, LaunchError::Spawn { .. }));
    }
}
