//! Result export

mod csv;

pub use csv::{format_csv, write_csv, OutputError};
