//! Retry helpers and the background restore job.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use super::{CloudRestoreService, RestoreResult};

/// How a failed remote call should be treated by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncRetryClass {
    Retryable,
    Permanent,
    ReauthRequired,
}

pub fn classify_http_status(status: u16) -> SyncRetryClass {
    match status {
        401 | 403 => SyncRetryClass::ReauthRequired,
        408 | 425 | 429 => SyncRetryClass::Retryable,
        500..=599 => SyncRetryClass::Retryable,
        _ => SyncRetryClass::Permanent,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound of the random delay added to each backoff.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(10 * 60),
            jitter: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    /// Backoff before the next attempt, without jitter. Doubles per failure.
    pub fn backoff(&self, consecutive_failures: u32) -> Duration {
        const MAX_EXPONENT: u32 = 8;
        let exponent = consecutive_failures.saturating_sub(1).min(MAX_EXPONENT);
        self.base_delay
            .saturating_mul(2_u32.pow(exponent))
            .min(self.max_delay)
    }

    pub fn delay_with_jitter(&self, consecutive_failures: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        self.backoff(consecutive_failures) + Duration::from_millis(extra)
    }
}

#[derive(Debug)]
pub enum RestoreJobOutcome {
    Completed {
        result: RestoreResult,
        attempts: u32,
    },
    GaveUp {
        error: String,
        attempts: u32,
        retryable: bool,
    },
}

impl RestoreJobOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Completed { attempts, .. } | Self::GaveUp { attempts, .. } => *attempts,
        }
    }
}

/// Runs restore for `tenant_id` on the tokio runtime, retrying retryable
/// failures with backoff. Permanent failures end the job on the first attempt.
pub fn spawn_restore_job(
    service: Arc<CloudRestoreService>,
    tenant_id: String,
    policy: RetryPolicy,
) -> JoinHandle<RestoreJobOutcome> {
    tokio::spawn(async move {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match service.restore_missing_data_from_cloud(&tenant_id).await {
                Ok(result) => {
                    info!(
                        "[Restore] Background restore for tenant {} completed after {} attempt(s)",
                        tenant_id, attempts
                    );
                    return RestoreJobOutcome::Completed { result, attempts };
                }
                Err(err) if err.is_retryable() && attempts < policy.max_attempts => {
                    let delay = policy.delay_with_jitter(attempts);
                    warn!(
                        "[Restore] Attempt {} for tenant {} failed ({}); retrying in {:?}",
                        attempts, tenant_id, err, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    let retryable = err.is_retryable();
                    warn!(
                        "[Restore] Giving up on tenant {} after {} attempt(s): {}",
                        tenant_id, attempts, err
                    );
                    return RestoreJobOutcome::GaveUp {
                        error: err.to_string(),
                        attempts,
                        retryable,
                    };
                }
            }
        }
    })
}
