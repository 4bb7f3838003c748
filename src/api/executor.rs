//! Request executor
//!
//! Drives one logical call (search or detail fetch) through the credential
//! pool, rate limiter, and HTTP client, with a bounded retry policy:
//!
//! | Outcome        | Action                                              |
//! |----------------|-----------------------------------------------------|
//! | Success        | Debit the ledger, return the body                   |
//! | NotFound       | Debit the ledger, return None                       |
//! | AuthError      | Invalidate credential, retry with the next one      |
//! | QuotaExceeded  | Exhaust credential, retry with the next one         |
//! | Transient      | Exponential backoff, bounded attempts               |
//!
//! Credential failovers are not counted against the transient-attempt
//! budget; they are bounded by the pool itself, which eventually reports
//! every credential drained or invalid.

use crate::api::client::{CallOutcome, DirectoryClient};
use crate::api::types::{CandidateRef, ChannelDetail};
use crate::config::QuotaConfig;
use crate::quota::{CredentialOutcome, CredentialPool, PoolExhausted, RateLimiter};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// Terminal failure of one logical call
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Transient failure after {attempts} attempts: {message}")]
    Transient { attempts: u32, message: String },

    #[error("All credentials out of quota (retry in {retry_after:?})")]
    QuotaExhaustedGlobal { retry_after: Duration },

    #[error("Every credential is invalid")]
    AllCredentialsInvalid,
}

/// Executes logical directory calls with rotation, pacing, and retry
pub struct RequestExecutor {
    pool: Arc<Mutex<CredentialPool>>,
    limiter: Arc<RateLimiter>,
    client: Arc<DirectoryClient>,
    quota: QuotaConfig,
}

impl RequestExecutor {
    pub fn new(
        pool: Arc<Mutex<CredentialPool>>,
        limiter: Arc<RateLimiter>,
        client: Arc<DirectoryClient>,
        quota: QuotaConfig,
    ) -> Self {
        Self {
            pool,
            limiter,
            client,
            quota,
        }
    }

    /// Runs a search, following continuation tokens until `max_results`
    /// candidates are gathered or the upstream runs out of pages
    ///
    /// Every page is a separately billed search call.
    pub async fn search(
        &self,
        query: &str,
        max_results: u32,
        published_after: Option<&str>,
    ) -> Result<Vec<CandidateRef>, ExecError> {
        let mut candidates: Vec<CandidateRef> = Vec::new();
        let mut page_token: Option<String> = None;
        let client = &self.client;

        while (candidates.len() as u32) < max_results {
            let remaining = max_results - candidates.len() as u32;
            let limit = remaining.min(50);
            let token_for_page = page_token.clone();

            let page = self
                .execute(self.quota.search_cost, |credential| {
                    let page = token_for_page.clone();
                    async move {
                        client
                            .search_page(&credential, query, limit, page.as_deref(), published_after)
                            .await
                    }
                })
                .await?;

            let page = match page {
                Some(p) => p,
                // A vanished search endpoint yields an empty result, not a crash
                None => break,
            };

            if page.items.is_empty() {
                break;
            }

            candidates.extend(page.items.into_iter().map(CandidateRef::from));

            match page.next_page {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        candidates.truncate(max_results as usize);
        Ok(candidates)
    }

    /// Fetches detail for one channel; `None` if the channel no longer exists
    pub async fn detail(&self, channel_id: &str) -> Result<Option<ChannelDetail>, ExecError> {
        let client = &self.client;
        self.execute(self.quota.detail_cost, |credential| async move {
            client.channel_detail(&credential, channel_id).await
        })
        .await
    }

    /// Number of credentials currently Active, for progress reporting
    pub fn active_credentials(&self) -> usize {
        self.pool.lock().unwrap().active_count()
    }

    /// Core retry loop shared by search and detail calls
    async fn execute<T, F, Fut>(&self, cost: u64, call: F) -> Result<Option<T>, ExecError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = CallOutcome<T>>,
    {
        let mut transient_attempts: u32 = 0;

        loop {
            let lease = match self.pool.lock().unwrap().acquire(cost) {
                Ok(lease) => lease,
                Err(PoolExhausted::QuotaDrained { retry_after }) => {
                    return Err(ExecError::QuotaExhaustedGlobal { retry_after });
                }
                Err(PoolExhausted::AllInvalid) => {
                    return Err(ExecError::AllCredentialsInvalid);
                }
            };

            self.limiter.wait().await;

            match call(lease.token.clone()).await {
                CallOutcome::Success(body) => {
                    let mut pool = self.pool.lock().unwrap();
                    pool.debit(lease.slot, cost);
                    pool.report_outcome(lease.slot, CredentialOutcome::Success);
                    return Ok(Some(body));
                }
                CallOutcome::NotFound => {
                    // The upstream still billed the lookup
                    let mut pool = self.pool.lock().unwrap();
                    pool.debit(lease.slot, cost);
                    pool.report_outcome(lease.slot, CredentialOutcome::Success);
                    return Ok(None);
                }
                CallOutcome::AuthError => {
                    self.pool
                        .lock()
                        .unwrap()
                        .report_outcome(lease.slot, CredentialOutcome::AuthError);
                    // Not transient: fail over immediately, no backoff
                }
                CallOutcome::QuotaExceeded => {
                    self.pool
                        .lock()
                        .unwrap()
                        .report_outcome(lease.slot, CredentialOutcome::QuotaExceeded);
                }
                CallOutcome::Transient(message) => {
                    transient_attempts += 1;
                    if transient_attempts >= self.quota.max_retries {
                        return Err(ExecError::Transient {
                            attempts: transient_attempts,
                            message,
                        });
                    }
                    let delay = backoff_delay(
                        Duration::from_millis(self.quota.backoff_base_ms),
                        transient_attempts,
                    );
                    tracing::debug!(
                        "Transient failure on credential '{}' (attempt {}): {}; backing off {:?}",
                        lease.id,
                        transient_attempts,
                        message,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Exponential backoff: base * 2^(attempt-1), capped at 60 seconds
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 1u32 << attempt.saturating_sub(1).min(10);
    (base * factor).min(Duration::from_secs(60))
}
