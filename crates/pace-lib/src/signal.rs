//! OS signal handling.
//!
//! A run's root cancellation token is tied to SIGINT/SIGTERM so that every
//! in-flight child process is stopped before the engine exits.

use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Resolves when the process receives an interrupt or terminate signal.
pub async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(e) => {
                debug!("failed to install SIGTERM handler: {e}");
                // ctrl-c alone still gives us an orderly shutdown
                tokio::signal::ctrl_c().await.ok();
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
}

/// Cancel `token` as soon as a shutdown signal arrives.
pub fn cancel_on_signal(token: CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        debug!("shutdown signal received, cancelling run");
        token.cancel();
    });
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_token_stays_live_without_signal() {
        let token = CancellationToken::new();
        cancel_on_signal(token.clone());
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!token.is_cancelled());
    }
}
