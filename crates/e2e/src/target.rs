//! Reachability probe for the service under test

use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{E2eError, E2eResult};

/// Preflight settings
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Per-request timeout
    pub request_timeout: Duration,

    /// Total time to keep trying
    pub deadline: Duration,

    /// Pause between attempts
    pub interval: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            deadline: Duration::from_secs(30),
            interval: Duration::from_millis(500),
        }
    }
}

/// Check that the target answers HTTP before any browser is launched.
///
/// Any response below 500 counts as reachable; the page is judged by the
/// scenarios, not here.
pub async fn probe(url: &str, config: &ProbeConfig) -> E2eResult<()> {
    let client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()?;

    let start = Instant::now();
    let mut attempts = 0;

    loop {
        attempts += 1;
        match client.get(url).send().await {
            Ok(resp) if !resp.status().is_server_error() => {
                info!("Target {} reachable ({})", url, resp.status());
                return Ok(());
            }
            Ok(resp) => {
                warn!("Target returned {}", resp.status());
            }
            Err(e) => {
                if attempts == 1 {
                    info!("Waiting for target {}...", url);
                }
                warn!("Probe error: {}", e);
            }
        }

        if start.elapsed() + config.interval >= config.deadline {
            break;
        }
        sleep(config.interval).await;
    }

    Err(E2eError::TargetUnreachable {
        url: url.to_string(),
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_target_reports_attempts() {
        // Bind then drop to get a port nothing listens on
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        let config = ProbeConfig {
            request_timeout: Duration::from_millis(200),
            deadline: Duration::from_millis(300),
            interval: Duration::from_millis(100),
        };
        let err = probe(&format!("http://127.0.0.1:{}/", port), &config)
            .await
            .unwrap_err();

        match err {
            E2eError::TargetUnreachable { attempts, .. } => assert!(attempts >= 1),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_reachable_target() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok")
                    .await;
            }
        });

        probe(&format!("http://{}/", addr), &ProbeConfig::default())
            .await
            .unwrap();
    }
}
