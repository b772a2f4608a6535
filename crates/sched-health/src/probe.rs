//! Active health probes dispatched by the scheduler against live instances.

use std::time::Duration;

use sched_core::HealthCheckKind;
use tracing::debug;

/// Result of a single health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    Healthy,
    Unhealthy,
    Failed,
}

/// Dispatch a single probe according to `kind`.
///
/// `Command` checks are reported by the broker out-of-band (the command
/// runs co-located with the task, not from the scheduler) and are never
/// actively dispatched here; callers should route their results in via
/// [`crate::manager::HealthCheckManager::update`] directly instead.
pub async fn probe(kind: &HealthCheckKind, address: &str, timeout: Duration) -> ProbeResult {
    match kind {
        HealthCheckKind::Http { path, .. } => http_probe(address, path, timeout).await,
        HealthCheckKind::Tcp { .. } => tcp_probe(address, timeout).await,
        HealthCheckKind::Command { .. } => {
            debug!(%address, "command health checks are broker-reported, not actively probed");
            ProbeResult::Failed
        }
    }
}

/// A bare TCP connect probe.
pub async fn tcp_probe(address: &str, timeout: Duration) -> ProbeResult {
    match tokio::time::timeout(timeout, tokio::net::TcpStream::connect(address)).await {
        Ok(Ok(_)) => ProbeResult::Healthy,
        Ok(Err(e)) => {
            debug!(error = %e, %address, "tcp health probe connection failed");
            ProbeResult::Unhealthy
        }
        Err(_) => {
            debug!(%address, "tcp health probe timed out");
            ProbeResult::Failed
        }
    }
}

/// Perform an HTTP health probe against an endpoint.
///
/// Returns `Healthy` for a 2xx response, `Unhealthy` for non-2xx, or
/// `Failed` if the connection, handshake, or request itself errors out or
/// times out.
pub async fn http_probe(address: &str, path: &str, timeout: Duration) -> ProbeResult {
    let uri = format!("http://{address}{path}");

    let result = tokio::time::timeout(timeout, async {
        let stream = match tokio::net::TcpStream::connect(address).await {
            Ok(s) => s,
            Err(e) => {
                debug!(error = %e, %uri, "health probe connection failed");
                return ProbeResult::Failed;
            }
        };

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = match hyper::client::conn::http1::handshake(io).await {
            Ok(pair) => pair,
            Err(e) => {
                debug!(error = %e, %uri, "health probe handshake failed");
                return ProbeResult::Failed;
            }
        };

        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = match http::Request::builder()
            .method("GET")
            .uri(&uri)
            .header("host", address)
            .header("user-agent", "sched-health/0.1")
            .body(http_body_util::Empty::<bytes::Bytes>::new())
        {
            Ok(req) => req,
            Err(e) => {
                debug!(error = %e, %uri, "health probe request build failed");
                return ProbeResult::Failed;
            }
        };

        match sender.send_request(req).await {
            Ok(resp) => {
                if resp.status().is_success() {
                    ProbeResult::Healthy
                } else {
                    debug!(status = %resp.status(), %uri, "health probe non-2xx");
                    ProbeResult::Unhealthy
                }
            }
            Err(e) => {
                debug!(error = %e, %uri, "health probe request failed");
                ProbeResult::Failed
            }
        }
    })
    .await;

    result.unwrap_or_else(|_| {
        debug!(%uri, "health probe timed out");
        ProbeResult::Failed
    })
}
