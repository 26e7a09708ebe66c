//! Cancellation helpers shared by every caller of a bridge trait.

use std::future::Future;

pub use tokio_util::sync::CancellationToken;

use crate::error::{BridgeError, Result};

/// Race `fut` against `token`.
///
/// Resolves to [`BridgeError::Cancelled`] as soon as the token fires; the
/// in-flight future is dropped at that point.
pub async fn cancellable<F, T>(token: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if token.is_cancelled() {
        return Err(BridgeError::Cancelled);
    }

    tokio::select! {
        biased;
        _ = token.cancelled() => Err(BridgeError::Cancelled),
        result = fut => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_completes_when_not_cancelled() {
        let token = CancellationToken::new();
        let value = cancellable(&token, async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_already_cancelled_token_short_circuits() {
        let token = CancellationToken::new();
        token.cancel();

        let result: Result<()> = cancellable(&token, async { Ok(()) }).await;
        assert!(matches!(result, Err(BridgeError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_pending_future() {
        let token = CancellationToken::new();
        let child = token.clone();

        let handle = tokio::spawn(async move {
            cancellable(&child, async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await
        });

        token.cancel();
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(BridgeError::Cancelled)));
    }
}
