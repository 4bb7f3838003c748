//! Harvest orchestration
//!
//! The orchestrator composes the planner, request executor, dedup index,
//! and checkpoint store into the main harvest loop, running a bounded pool
//! of workers and handling quota exhaustion and interrupts.

mod orchestrator;
mod progress;

pub use orchestrator::{Orchestrator, RunSummary};
pub use progress::ProgressTracker;

use crate::config::Config;
use crate::Result;

/// Runs a full harvest with the given configuration
///
/// Convenience entry point used by the binary.
pub async fn harvest(config: Config, config_hash: String, fresh: bool) -> Result<RunSummary> {
    let orchestrator = Orchestrator::new(config, config_hash, fresh)?;
    orchestrator.run().await
}
