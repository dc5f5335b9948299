//! Bounded retry for operations whose errors can be classified.
//!
//! Only errors that report themselves as transient are retried; every other
//! error is handed back untouched after the first attempt. There is no delay
//! between attempts, the attempt count is the only policy.

use crate::error::FetchError;
use log::debug;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Classification hook for [`retry_if`].
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

impl Retryable for FetchError {
    fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

/// Why a retried operation gave up.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryError<E> {
    /// All attempts failed with transient errors; carries the last one.
    Exhausted { attempts: u32, last: E },
    /// A non-transient error ended the loop on the attempt it occurred.
    Rejected(E),
    /// The token was cancelled before or during an attempt.
    Cancelled,
}

impl<E> RetryError<E> {
    /// The underlying error, if there is one.
    pub fn into_inner(self) -> Option<E> {
        match self {
            RetryError::Exhausted { last, .. } => Some(last),
            RetryError::Rejected(e) => Some(e),
            RetryError::Cancelled => None,
        }
    }
}

/// Run `op` up to `max_attempts` times, retrying only transient errors.
///
/// `op` receives the 1-based attempt number. Cancellation wins over an
/// in-flight attempt and is never retried.
pub async fn retry_if<T, E, F, Fut>(
    max_attempts: u32,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    E: Retryable + std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            result = op(attempt) => result,
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => return Err(RetryError::Rejected(e)),
            Err(e) if attempt >= max_attempts => {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: e,
                });
            }
            Err(e) => {
                debug!("[Retry] Attempt {}/{} failed, retrying: {}", attempt, max_attempts, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn counter() -> Arc<AtomicU32> {
        Arc::new(AtomicU32::new(0))
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_errors() {
        let calls = counter();
        let token = CancellationToken::new();
        let c = calls.clone();
        let result = retry_if(5, &token, |attempt| {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                if attempt < 3 {
                    Err(FetchError::Transient("busy".into()))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_after_max_attempts() {
        let calls = counter();
        let token = CancellationToken::new();
        let c = calls.clone();
        let result: Result<(), _> = retry_if(5, &token, |attempt| {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::Transient(format!("attempt {}", attempt)))
            }
        })
        .await;

        assert_eq!(
            result,
            Err(RetryError::Exhausted {
                attempts: 5,
                last: FetchError::Transient("attempt 5".into()),
            })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_non_transient_errors_are_not_retried() {
        let token = CancellationToken::new();
        for error in [FetchError::NotFound(7), FetchError::Fatal("bad frame".into())] {
            let calls = counter();
            let c = calls.clone();
            let e = error.clone();
            let result: Result<(), _> = retry_if(5, &token, |_| {
                let c = c.clone();
                let e = e.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(e)
                }
            })
            .await;

            assert_eq!(result, Err(RetryError::Rejected(error)));
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_before_first_attempt() {
        let calls = counter();
        let token = CancellationToken::new();
        token.cancel();
        let c = calls.clone();
        let result: Result<u32, RetryError<FetchError>> = retry_if(5, &token, |_| {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            }
        })
        .await;

        assert_eq!(result, Err(RetryError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancellation_abandons_in_flight_attempt() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let result: Result<(), RetryError<FetchError>> = retry_if(5, &token, |_| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Err(FetchError::Transient("timeout".into()))
        })
        .await;

        assert_eq!(result, Err(RetryError::Cancelled));
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        let token = CancellationToken::new();
        let result: Result<(), _> = tokio_test::block_on(retry_if(0, &token, |_| async {
            Err(FetchError::Transient("x".into()))
        }));
        assert_eq!(
            result,
            Err(RetryError::Exhausted {
                attempts: 1,
                last: FetchError::Transient("x".into()),
            })
        );
    }
}
