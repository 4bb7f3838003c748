//! Configuration loading, parsing, and validation
//!
//! Configuration is read from a TOML file supplying the credential list, the
//! category and city tables that define the search space, quota costs, and
//! run thresholds.

mod parser;
mod types;
mod validation;

pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use types::{
    ApiConfig, CategoryEntry, CityEntry, Config, CredentialEntry, HarvestConfig, OutputConfig,
    QuotaConfig,
};
pub use validation::validate;
