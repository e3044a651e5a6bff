//! Bounded-retry connectivity probe
//!
//! Any HTTP response, whatever its status, proves the gateway is reachable.
//! Every failure is treated as transient until the attempt budget runs out.

use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::http::{base_url, HttpClient, HttpError};

/// Outcome of a probe run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeResult {
    pub success: bool,
    pub attempts_used: u32,
    pub last_error: Option<String>,
}

/// Connectivity prober
pub struct ConnectivityProber {
    client: HttpClient,
}

impl ConnectivityProber {
    /// Create a prober whose single attempts time out after `attempt_timeout`
    pub fn new(attempt_timeout: Duration) -> Result<Self, HttpError> {
        Ok(Self {
            client: HttpClient::with_timeout(attempt_timeout)?,
        })
    }

    /// Probe `host:port` up to `max_attempts` times, sleeping `interval`
    /// between failures
    pub async fn probe(
        &self,
        host: &str,
        port: u16,
        max_attempts: u32,
        interval: Duration,
    ) -> ProbeResult {
        let url = base_url(host, port);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match self.client.get(&url).await {
                Ok(response) => {
                    info!(
                        "Connectivity test successful: {} (status: {}, {}ms)",
                        url, response.status_code, response.duration_ms
                    );
                    return ProbeResult {
                        success: true,
                        attempts_used: attempt,
                        last_error: None,
                    };
                }
                Err(e) => {
                    debug!("Connection attempt {} to {} failed: {}", attempt, url, e);
                    last_error = Some(e.to_string());
                }
            }

            if attempt < max_attempts {
                info!(
                    "Connection attempt {}/{} failed, retrying in {}ms...",
                    attempt,
                    max_attempts,
                    interval.as_millis()
                );
                sleep(interval).await;
            }
        }

        warn!("Connection failed after {} attempts", max_attempts);
        ProbeResult {
            success: false,
            attempts_used: max_attempts,
            last_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::http_server;
    use std::sync::atomic::Ordering;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn prober() -> ConnectivityProber {
        ConnectivityProber::new(Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_probe_closed_port_exhausts_attempts() {
        let port = crate::k8s::free_local_port().unwrap();

        let result = prober().probe("127.0.0.1", port, 3, Duration::ZERO).await;
        assert!(!result.success);
        assert_eq!(result.attempts_used, 3);
        assert!(result.last_error.is_some());
    }

    #[tokio::test]
    async fn test_probe_succeeds_on_first_attempt() {
        let (port, hits) = http_server("HTTP/1.1 200 OK").await;

        let result = prober().probe("127.0.0.1", port, 5, Duration::ZERO).await;
        assert_eq!(
            result,
            ProbeResult {
                success: true,
                attempts_used: 1,
                last_error: None,
            }
        );
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_probe_accepts_error_status() {
        let (port, _) = http_server("HTTP/1.1 403 Forbidden").await;

        let result = prober().probe("127.0.0.1", port, 2, Duration::ZERO).await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_probe_retries_until_listener_appears() {
        let port = crate::k8s::free_local_port().unwrap();

        tokio::spawn(async move {
            sleep(Duration::from_millis(150)).await;
            let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n")
                    .await;
            }
        });

        let result = prober()
            .probe("127.0.0.1", port, 50, Duration::from_millis(50))
            .await;
        assert!(result.success);
        assert!(result.attempts_used > 1);
    }

    #[tokio::test]
    async fn test_probe_with_zero_attempts() {
        let result = prober().probe("127.0.0.1", 1, 0, Duration::ZERO).await;
        assert!(!result.success);
        assert_eq!(result.attempts_used, 0);
    }
}
