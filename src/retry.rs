// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Retry utilities with exponential backoff for API calls.
///
/// Wraps a single transport call, retrying transient failures (network
/// errors, timeouts, `429` and `5xx`) and converting every other status into
/// a final [`Error::Client`]. The same policy serves vendor pages, directory
/// pages and per-user lookups.
use std::{future::Future, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::Error;

/// Configuration for retry behavior with exponential backoff.
#[derive(Debug, Clone, Deserialize, Serialize,)]
#[serde(default)]
pub struct RetryConfig
{
    /// Maximum number of attempts, including the first one (default: 3).
    pub max_attempts:     u32,
    /// Delay before the second attempt in milliseconds (default: 1000).
    pub initial_delay_ms: u64,
    /// Multiplier for exponential backoff (default: 2.0).
    pub backoff_factor:   f64,
    /// Upper bound for computed delays in milliseconds (default: 60000).
    ///
    /// Server-advised `Retry-After` values are honoured even above the cap.
    pub max_delay_ms:     u64,
}

impl Default for RetryConfig
{
    fn default() -> Self
    {
        Self {
            max_attempts:     3,
            initial_delay_ms: 1000,
            backoff_factor:   2.0,
            max_delay_ms:     60_000,
        }
    }
}

impl RetryConfig
{
    /// Checks that the policy can make progress.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when `max_attempts` is zero or the
    /// backoff factor would shrink delays.
    pub fn validate(&self,) -> Result<(), Error,>
    {
        if self.max_attempts == 0 {
            return Err(Error::configuration("retry.max_attempts must be at least 1",),);
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(Error::configuration("retry.backoff_factor must be a number >= 1.0",),);
        }
        Ok((),)
    }

    /// Computed backoff after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32,) -> Duration
    {
        let exponent = attempt.saturating_sub(1,).min(i32::MAX as u32,) as i32;
        let millis = self.initial_delay_ms as f64 * self.backoff_factor.powi(exponent,);
        let capped = millis.min(self.max_delay_ms as f64,).max(0.0,);
        Duration::from_millis(capped as u64,)
    }
}

/// Executes an async operation with exponential backoff retry logic.
///
/// The delay before each retry is the larger of the computed backoff and
/// the server's `Retry-After`, and never shorter than the previous delay.
///
/// # Arguments
///
/// * `config` - Retry configuration (max attempts, delays)
/// * `endpoint` - Endpoint description used in logs and errors
/// * `f` - Async function performing one attempt
///
/// # Errors
///
/// * [`Error::Client`] as soon as a non-retryable status is observed.
/// * [`Error::RetryExhausted`] wrapping the last transient failure.
/// * Any other non-retryable error returned by `f`, unchanged.
///
/// # Example
///
/// ```no_run
/// use vendor_report::{Error, RetryConfig, retry_with_backoff};
///
/// # async fn example() -> Result<(), Error> {
/// let config = RetryConfig::default();
/// let value = retry_with_backoff(&config, "/inventory/v2/inventories/vendors", || async {
///     Ok::<_, Error>(42)
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn retry_with_backoff<F, Fut, T,>(
    config: &RetryConfig,
    endpoint: &str,
    mut f: F,
) -> Result<T, Error,>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error,>,>,
{
    let mut attempt = 1;
    let mut previous_delay = Duration::ZERO;

    loop {
        match f().await {
            Ok(result,) => {
                if attempt > 1 {
                    debug!(endpoint, attempt, "request succeeded after retry");
                }
                return Ok(result,);
            }
            Err(error,) if !error.is_retryable() => {
                return Err(match error {
                    Error::HttpStatus {
                        endpoint,
                        code,
                        body,
                        ..
                    } => Error::client(endpoint, code, body,),
                    other => other,
                },);
            }
            Err(error,) => {
                if attempt >= config.max_attempts {
                    warn!(
                        endpoint,
                        attempts = attempt,
                        %error,
                        "giving up after exhausting retries"
                    );
                    return Err(Error::RetryExhausted {
                        endpoint: endpoint.to_owned(),
                        attempts: attempt,
                        source:   Box::new(error,),
                    },);
                }

                let delay = config
                    .delay_for(attempt,)
                    .max(error.retry_after().unwrap_or_default(),)
                    .max(previous_delay,);

                warn!(
                    endpoint,
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    %error,
                    "transient failure, retrying"
                );

                sleep(delay,).await;
                previous_delay = delay;
                attempt += 1;
            }
        }
    }
}
