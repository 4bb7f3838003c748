//! Upstream directory API access
//!
//! The directory is consumed as two logical operations: a paginated channel
//! search and a per-channel detail fetch. Every response is classified into
//! a [`CallOutcome`] so the executor can decide between retry, credential
//! failover, and giving up.

mod client;
mod executor;
mod types;

pub use client::{build_http_client, CallOutcome, DirectoryClient};
pub use executor::{ExecError, RequestExecutor};
pub use types::{CandidateRef, ChannelDetail, SearchPage};
