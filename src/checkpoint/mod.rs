//! Durable run checkpoints

mod store;

pub use store::{CheckpointError, CheckpointStore, RunCheckpoint};
