//! Quota accounting and request pacing
//!
//! This module contains the pieces that decide whether an outbound call may
//! be made at all: per-credential quota ledgers, the rotating credential
//! pool, and the global rate limiter that spaces calls out regardless of
//! which credential issues them.

mod ledger;
mod pool;
mod rate_limit;

pub use ledger::QuotaLedger;
pub use pool::{
    CredentialLease, CredentialOutcome, CredentialPool, CredentialStatus, PoolExhausted,
};
pub use rate_limit::RateLimiter;
