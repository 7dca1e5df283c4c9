//! HTTP readiness polling for the companion server.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::process::ChildGuard;

/// How long to wait for the companion before giving up on the browser.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Delay between polls.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// Outcome of waiting for a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The server answered an HTTP request
    Ready,
    /// The deadline passed without an answer
    TimedOut,
    /// The server process exited before answering
    Exited,
}

/// Poll `url` until any HTTP response comes back.
///
/// Stops early if `server` exits. Response status is not inspected; a
/// listening socket that speaks HTTP is enough.
pub async fn wait_for_http(
    url: &str,
    server: &mut ChildGuard,
    timeout: Duration,
    interval: Duration,
) -> Readiness {
    let client = match reqwest::Client::builder()
        .timeout(interval.max(Duration::from_millis(500)))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            debug!(error = %e, "failed to build readiness client");
            return Readiness::TimedOut;
        }
    };

    let deadline = Instant::now() + timeout;
    loop {
        if matches!(server.try_status(), Ok(Some(_))) {
            return Readiness::Exited;
        }

        match client.get(url).send().await {
            Ok(response) => {
                debug!(url, status = %response.status(), "server ready");
                return Readiness::Ready;
            }
            Err(e) => debug!(url, error = %e, "server not ready"),
        }

        if Instant::now() + interval > deadline {
            return Readiness::TimedOut;
        }
        tokio::time::sleep(interval).await;
    }
}
