//! Rotating credential pool
//!
//! Owns every configured credential together with its quota ledger and
//! status. Selection is round-robin starting from the credential after the
//! last one leased, skipping Invalid entries and entries whose ledger cannot
//! cover the requested cost.

use crate::config::{CredentialEntry, QuotaConfig};
use crate::quota::QuotaLedger;
use std::time::Duration;

/// Lifecycle state of one credential within the current run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStatus {
    /// Usable, quota permitting
    Active,

    /// Budget spent; becomes Active again when its window resets
    Exhausted,

    /// Authentication failed; never retried in this run
    Invalid,
}

/// Result of reporting a call outcome back to the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialOutcome {
    Success,
    AuthError,
    QuotaExceeded,
}

/// A leased credential handed to the request executor
///
/// Carries copies of the identifying fields so the pool lock does not have
/// to be held while the call is in flight.
#[derive(Debug, Clone)]
pub struct CredentialLease {
    /// Index into the pool, used to report the outcome back
    pub slot: usize,

    /// Operator-facing label
    pub id: String,

    /// Secret token sent with the request
    pub token: String,
}

/// Why no credential could be leased
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolExhausted {
    /// Every non-invalid credential is out of quota; usable again after the wait
    QuotaDrained { retry_after: Duration },

    /// Every credential failed authentication; nothing will recover this run
    AllInvalid,
}

struct PoolEntry {
    id: String,
    token: String,
    status: CredentialStatus,
    ledger: QuotaLedger,
}

/// Pool of rotation-eligible credentials with per-credential quota state
pub struct CredentialPool {
    entries: Vec<PoolEntry>,
    /// Slot of the most recently leased credential
    last_leased: usize,
}

impl CredentialPool {
    /// Builds a pool from the configured credential list and quota settings
    pub fn new(credentials: &[CredentialEntry], quota: &QuotaConfig) -> Self {
        let window = Duration::from_secs(quota.window_hours * 3600);
        let entries = credentials
            .iter()
            .map(|c| PoolEntry {
                id: c.id.clone(),
                token: c.token.clone(),
                status: CredentialStatus::Active,
                ledger: QuotaLedger::new(quota.daily_budget, window),
            })
            .collect::<Vec<_>>();

        let last_leased = entries.len().saturating_sub(1);
        Self {
            entries,
            last_leased,
        }
    }

    /// Leases a credential able to cover `cost` units
    ///
    /// Round-robin from the slot after the last lease. Exhausted entries are
    /// given a chance to wake up first: if their window has elapsed, the
    /// ledger resets and the entry transitions back to Active.
    pub fn acquire(&mut self, cost: u64) -> Result<CredentialLease, PoolExhausted> {
        let n = self.entries.len();

        for offset in 1..=n {
            let slot = (self.last_leased + offset) % n;
            let entry = &mut self.entries[slot];

            match entry.status {
                CredentialStatus::Invalid => continue,
                CredentialStatus::Exhausted => {
                    if entry.ledger.maybe_reset() {
                        tracing::info!("Credential '{}' quota window reset, reactivating", entry.id);
                        entry.status = CredentialStatus::Active;
                    } else {
                        continue;
                    }
                }
                CredentialStatus::Active => {}
            }

            if entry.ledger.would_exceed(cost) {
                continue;
            }

            self.last_leased = slot;
            let entry = &self.entries[slot];
            return Ok(CredentialLease {
                slot,
                id: entry.id.clone(),
                token: entry.token.clone(),
            });
        }

        let retry_after = self
            .entries
            .iter()
            .filter(|e| e.status != CredentialStatus::Invalid)
            .map(|e| e.ledger.time_until_reset())
            .min();

        match retry_after {
            // Clamped so callers always get a positive wait estimate
            Some(wait) => Err(PoolExhausted::QuotaDrained {
                retry_after: wait.max(Duration::from_secs(1)),
            }),
            None => Err(PoolExhausted::AllInvalid),
        }
    }

    /// Records the upstream outcome of a call made with a leased credential
    pub fn report_outcome(&mut self, slot: usize, outcome: CredentialOutcome) {
        let entry = &mut self.entries[slot];
        match outcome {
            CredentialOutcome::Success => {}
            CredentialOutcome::AuthError => {
                tracing::warn!("Credential '{}' failed authentication, marking invalid", entry.id);
                entry.status = CredentialStatus::Invalid;
            }
            CredentialOutcome::QuotaExceeded => {
                tracing::warn!(
                    "Credential '{}' reported quota exceeded upstream (local estimate: {} units)",
                    entry.id,
                    entry.ledger.consumed()
                );
                entry.ledger.saturate();
                entry.status = CredentialStatus::Exhausted;
            }
        }
    }

    /// Charges `cost` units to the credential in `slot`
    pub fn debit(&mut self, slot: usize, cost: u64) {
        self.entries[slot].ledger.debit(cost);
    }

    /// Shortest time until any non-invalid credential's window resets
    ///
    /// Zero if some credential is usable right now or nothing can recover.
    pub fn time_until_any_reset(&self) -> Duration {
        self.entries
            .iter()
            .filter(|e| e.status != CredentialStatus::Invalid)
            .map(|e| e.ledger.time_until_reset())
            .min()
            .unwrap_or(Duration::ZERO)
    }

    /// Number of credentials not marked Invalid
    pub fn usable_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status != CredentialStatus::Invalid)
            .count()
    }

    /// Number of credentials currently Active
    pub fn active_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status == CredentialStatus::Active)
            .count()
    }

    /// Total credentials in the pool
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the pool holds no credentials
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
