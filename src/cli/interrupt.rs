//! Ctrl+C handling for export runs
//!
//! The first interrupt asks the driver to stop after the current page so
//! buffered records are flushed and scroll contexts released. A second
//! interrupt means the user does not want to wait for that.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::info;

/// Forward interrupts from `next_signal` to `token`.
///
/// Returns `true` once a second interrupt arrives, and `false` if listening
/// for signals fails.
pub async fn forward_interrupts<F, Fut>(token: CancellationToken, mut next_signal: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if let Err(err) = next_signal().await {
        eprintln!("Failed to listen for Ctrl+C: {}", err);
        return false;
    }
    token.cancel();
    info!("Interrupt received, finishing current page");
    eprintln!("Stopping after the current page, press Ctrl+C again to abort");

    match next_signal().await {
        Ok(()) => true,
        Err(err) => {
            eprintln!("Failed to listen for Ctrl+C: {}", err);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_second_interrupt_aborts() {
        let token = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let abort = forward_interrupts(token.clone(), || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await;

        assert!(abort);
        assert!(token.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_single_interrupt_only_cancels() {
        let token = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let waiting = forward_interrupts(token.clone(), move || {
            let first = counter.fetch_add(1, Ordering::SeqCst) == 0;
            async move {
                if !first {
                    std::future::pending::<()>().await;
                }
                Ok(())
            }
        });
        let result = tokio::time::timeout(Duration::from_millis(50), waiting).await;

        assert!(result.is_err());
        assert!(token.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_listener_failure_leaves_token_alone() {
        let token = CancellationToken::new();
        let abort = forward_interrupts(token.clone(), || async {
            Err(std::io::Error::other("no signal handler"))
        })
        .await;

        assert!(!abort);
        assert!(!token.is_cancelled());
    }
}
