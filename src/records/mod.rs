//! Accepted records and deduplication

mod channel;
mod dedup;

pub use channel::{engagement_rate, ChannelRecord};
pub use dedup::DedupIndex;
