use crate::error::TransientError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Bounded exponential backoff for provider calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; the call runs at most `max_retries + 1` times.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Wait before retry number `retry` (0-based): `base_delay * 2^retry`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// True for failures that may go away on their own: connection problems and
/// timeouts from the HTTP client, and anything a provider flagged as
/// [`TransientError`].
pub fn is_transient(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        if cause.downcast_ref::<TransientError>().is_some() {
            return true;
        }
        match cause.downcast_ref::<reqwest::Error>() {
            Some(e) => e.is_timeout() || e.is_connect(),
            None => false,
        }
    })
}

/// Wait the remote asked for, if any error in the chain carries one.
pub fn requested_delay(err: &anyhow::Error) -> Option<Duration> {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<TransientError>())
        .find_map(|t| t.retry_after)
        .map(Duration::from_secs)
}

/// Run `op` until it succeeds, fails with a non-transient error, or the retry
/// budget is spent. The last error is returned unchanged.
pub async fn retry_transient<T, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut retry = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if retry < policy.max_retries && is_transient(&e) => {
                // never retry sooner than a Retry-After answer allows
                let delay = match requested_delay(&e) {
                    Some(asked) => asked.max(policy.delay_for(retry)),
                    None => policy.delay_for(retry),
                };
                warn!(
                    "{} failed ({}); retry {}/{} in {:?}",
                    what,
                    e,
                    retry + 1,
                    policy.max_retries,
                    delay
                );
                tokio::time::sleep(delay).await;
                retry += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_from_base() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (0..10).map(|i| policy.delay_for(i).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 64, 128, 256, 512]);
    }

    #[test]
    fn huge_retry_numbers_saturate() {
        let policy = RetryPolicy::new(100, Duration::from_millis(1));
        assert!(policy.delay_for(64) >= policy.delay_for(31));
    }

    #[test]
    fn transient_detection_walks_context_chain() {
        let e = anyhow::Error::new(TransientError::new("503")).context("adding tracks");
        assert!(is_transient(&e));
        assert!(!is_transient(&anyhow::anyhow!("bad request")));
    }

    #[test]
    fn requested_delay_found_behind_context() {
        let limited = TransientError {
            message: "429".into(),
            retry_after: Some(30),
        };
        let e = anyhow::Error::new(limited).context("fetching snapshot id");
        assert_eq!(requested_delay(&e), Some(Duration::from_secs(30)));
        assert_eq!(requested_delay(&anyhow::Error::new(TransientError::new("503"))), None);
    }
}
