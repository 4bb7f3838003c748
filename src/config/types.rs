use serde::Deserialize;

/// Main configuration structure for Creator-Atlas
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub harvest: HarvestConfig,
    pub quota: QuotaConfig,
    pub api: ApiConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub credential: Vec<CredentialEntry>,
    #[serde(default)]
    pub category: Vec<CategoryEntry>,
    #[serde(default)]
    pub city: Vec<CityEntry>,
}

/// Harvest behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HarvestConfig {
    /// Stop the run once this many records have been accepted
    #[serde(rename = "target-count")]
    pub target_count: usize,

    /// Maximum candidates gathered per search task (across pages)
    #[serde(rename = "max-results-per-search")]
    pub max_results_per_search: u32,

    /// Minimum subscriber count for a channel to be accepted
    #[serde(rename = "min-subscribers")]
    pub min_subscribers: u64,

    /// Descriptions longer than this are truncated
    #[serde(rename = "max-description-length", default = "default_description_len")]
    pub max_description_length: usize,

    /// Number of concurrent harvest workers
    #[serde(default = "default_workers")]
    pub workers: u32,

    /// Save a checkpoint every this many accepted records
    #[serde(rename = "checkpoint-interval", default = "default_checkpoint_interval")]
    pub checkpoint_interval: usize,

    /// Only consider channels created after this RFC 3339 timestamp
    #[serde(rename = "published-after", default)]
    pub published_after: Option<String>,
}

/// Quota and pacing configuration, shared by all credentials
#[derive(Debug, Clone, Deserialize)]
pub struct QuotaConfig {
    /// Units each credential may spend per quota window
    #[serde(rename = "daily-budget")]
    pub daily_budget: u64,

    /// Length of the rolling quota window, in hours
    #[serde(rename = "window-hours", default = "default_window_hours")]
    pub window_hours: u64,

    /// Units charged per search page
    #[serde(rename = "search-cost", default = "default_search_cost")]
    pub search_cost: u64,

    /// Units charged per detail fetch
    #[serde(rename = "detail-cost", default = "default_detail_cost")]
    pub detail_cost: u64,

    /// Minimum spacing between any two outbound calls, in milliseconds
    #[serde(rename = "rate-limit-ms", default = "default_rate_limit_ms")]
    pub rate_limit_ms: u64,

    /// Maximum attempts for a single logical call before it is abandoned
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff on transient failures, in milliseconds
    #[serde(rename = "backoff-base-ms", default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

/// Upstream directory API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the directory API (search and detail endpoints hang off it)
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the CSV export of accepted records
    #[serde(rename = "csv-path")]
    pub csv_path: String,

    /// Path to the durable run checkpoint
    #[serde(rename = "checkpoint-path")]
    pub checkpoint_path: String,
}

/// One rotation-eligible API credential
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialEntry {
    /// Operator-facing label, used in logs instead of the secret
    pub id: String,

    /// The secret token sent with each request
    pub token: String,
}

/// One search category: the term queried upstream plus its display mappings
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryEntry {
    /// Term used in the search query (e.g. "makeup")
    pub term: String,

    /// Display category recorded on accepted records (e.g. "Beauty & Cosmetics")
    pub display: String,

    /// Short niche tag recorded on accepted records (e.g. "beauty")
    pub niche: String,

    /// Cities to pair with this category; empty means every configured city
    #[serde(default)]
    pub cities: Vec<String>,
}

/// One city in the search space with its country
#[derive(Debug, Clone, Deserialize)]
pub struct CityEntry {
    pub name: String,
    pub country: String,
}

fn default_description_len() -> usize {
    500
}

fn default_workers() -> u32 {
    4
}

fn default_checkpoint_interval() -> usize {
    1000
}

fn default_window_hours() -> u64 {
    24
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_search_cost() -> u64 {
    100
}

fn default_detail_cost() -> u64 {
    1
}

fn default_rate_limit_ms() -> u64 {
    100
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

impl Config {
    /// Looks up the country for a configured city, `"Unknown"` if absent
    pub fn country_for_city(&self, city: &str) -> String {
        self.city
            .iter()
            .find(|c| c.name == city)
            .map(|c| c.country.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    }
}
