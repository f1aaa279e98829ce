//! Retry with exponential back-off and jitter for provider requests.
//!
//! Only transient failures are retried: HTTP 429 and network-level errors
//! (connection reset, timeout). A 404, any other non-2xx status, or a body
//! that does not parse is returned on the first attempt.

use std::future::Future;
use std::time::Duration;

use crate::error::ProviderError;

/// Upper bound on a single back-off sleep.
const MAX_DELAY_MS: u64 = 60_000;

fn is_retriable(err: &ProviderError) -> bool {
    matches!(
        err,
        ProviderError::RateLimited { .. } | ProviderError::Http(_)
    )
}

/// Base delay before retry number `attempt` (1-based), before jitter.
fn backoff_delay_ms(backoff_base_secs: u64, attempt: u32) -> u64 {
    backoff_base_secs
        .saturating_mul(1000)
        .saturating_mul(1u64 << (attempt.saturating_sub(1)).min(10))
        .min(MAX_DELAY_MS)
}

/// Executes `operation`, retrying transient errors up to `max_retries` extra
/// times.
///
/// The sleep before retry `n` is `backoff_base_secs * 2^(n-1)` seconds,
/// capped at 60 s and scaled by a random factor in `[0.75, 1.25)`.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_secs: u64,
    mut operation: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let capped = backoff_delay_ms(backoff_base_secs, attempt);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "transient provider error; retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
