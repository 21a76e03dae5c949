//! Graceful shutdown utilities
//!
//! Provides unified shutdown signal handling for all services.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Wait for shutdown signal (Ctrl+C or SIGTERM on Unix)
///
/// # Example
///
/// ```ignore
/// tokio::select! {
///     _ = common::shutdown::wait_for_shutdown() => {
///         info!("Shutdown signal received");
///     }
///     // ... other tasks
/// }
/// ```
pub async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let term_signal = match signal(SignalKind::terminate()) {
            Ok(sig) => Some(sig),
            Err(e) => {
                warn!(
                    "Failed to install SIGTERM handler: {}. Service will only respond to Ctrl+C",
                    e
                );
                None
            },
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                if let Some(mut sig) = term_signal {
                    sig.recv().await;
                } else {
                    std::future::pending::<()>().await
                }
            } => {},
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Spawn a watcher that cancels `token` once a shutdown signal arrives
///
/// The watcher also exits when `token` is cancelled by someone else; the
/// returned handle resolves once it has.
pub fn cancel_on_shutdown(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = wait_for_shutdown() => {
                info!("Shutdown signal received");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    })
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_watcher_exits_when_token_cancelled() {
        let token = CancellationToken::new();
        let watcher = cancel_on_shutdown(token.clone());
        assert!(!watcher.is_finished());

        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), watcher)
            .await
            .expect("watcher should stop without a signal")
            .unwrap();
    }

    #[tokio::test]
    async fn test_watcher_keeps_running_until_cancelled() {
        let token = CancellationToken::new();
        let watcher = cancel_on_shutdown(token.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!watcher.is_finished());
        assert!(!token.is_cancelled());

        watcher.abort();
    }
}
