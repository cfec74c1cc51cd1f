use std::time::Duration;

use crate::service::ServiceError;

/// Backoff schedule for read-modify-write transactions.
///
/// Each entry is the pause before one more attempt, so the number of
/// attempts is `backoff.len() + 1`. The default absorbs up to three
/// conflicts: the first try plus three retries, four attempts in all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    backoff: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_millis(&[100, 300, 900])
    }
}

impl RetryPolicy {
    pub fn from_millis(delays: &[u64]) -> Self {
        Self {
            backoff: delays.iter().copied().map(Duration::from_millis).collect(),
        }
    }

    /// One attempt, no retries.
    pub fn none() -> Self {
        Self {
            backoff: Vec::new(),
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.backoff.len() + 1
    }

    pub fn delays(&self) -> &[Duration] {
        &self.backoff
    }
}

/// Runs `attempt` until it succeeds, fails with something other than a write
/// conflict, or the policy runs out of delays.
pub async fn with_retry<T, F>(
    policy: &RetryPolicy,
    operation: &'static str,
    mut attempt: F,
) -> Result<T, ServiceError>
where
    F: FnMut() -> Result<T, ServiceError>,
{
    let mut retries = 0usize;
    loop {
        match attempt() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_write_conflict() => match policy.backoff.get(retries) {
                Some(delay) => {
                    retries += 1;
                    tracing::warn!(
                        operation,
                        retry = retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "write conflict, retrying"
                    );
                    tokio::time::sleep(*delay).await;
                }
                None => {
                    tracing::error!(
                        operation,
                        attempts = retries + 1,
                        error = %err,
                        "giving up after repeated write conflicts"
                    );
                    return Err(ServiceError::RetriesExhausted {
                        operation,
                        attempts: retries + 1,
                    });
                }
            },
            Err(err) => return Err(err),
        }
    }
}
