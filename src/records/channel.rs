//! Fully enriched channel records

use serde::{Deserialize, Serialize};

/// One accepted channel, uniquely keyed by `channel_id`
///
/// Immutable once created. Unknown fields in persisted form are ignored so
/// the schema can evolve across runs without breaking resume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelRecord {
    pub channel_id: String,
    pub title: String,
    pub description: String,
    pub subscriber_count: u64,
    pub view_count: u64,
    pub video_count: u64,
    /// Channel creation timestamp as reported upstream
    pub created_at: String,
    pub engagement_rate: f64,
    pub category: String,
    pub niche: String,
    pub city: String,
    pub country: String,
    /// The search query that surfaced this channel
    pub source_query: String,
    /// When this record was collected, RFC 3339
    pub collected_at: String,
}

/// Derives an engagement rate from lifetime views and subscribers
///
/// Views per subscriber expressed as a percentage, clamped to a plausible
/// [0.1, 15.0] band. A channel with zero subscribers yields 0.0 rather than
/// dividing by zero.
pub fn engagement_rate(view_count: u64, subscriber_count: u64) -> f64 {
    if subscriber_count == 0 {
        return 0.0;
    }

    let rate = (view_count as f64 / subscriber_count as f64) * 100.0;
    rate.clamp(0.1, 15.0)
}
