//! CSV export of accepted channel records
//!
//! Fields containing commas, quotes, or newlines are quoted per RFC 4180.

use crate::records::ChannelRecord;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors raised while writing export files
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

const HEADER: &str = "channel_id,title,description,subscriber_count,view_count,video_count,\
created_at,engagement_rate,category,niche,city,country,source_query,collected_at";

/// Writes the records as CSV to the given path, creating parent directories
pub fn write_csv(records: &[ChannelRecord], path: &Path) -> Result<(), OutputError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| OutputError::Io {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }

    fs::write(path, format_csv(records)).map_err(|e| OutputError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    tracing::info!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

/// Formats records as a CSV document with a header row
pub fn format_csv(records: &[ChannelRecord]) -> String {
    let mut out = String::new();
    out.push_str(HEADER);
    out.push('\n');

    for record in records {
        let fields = [
            record.channel_id.as_str(),
            record.title.as_str(),
            record.description.as_str(),
            &record.subscriber_count.to_string(),
            &record.view_count.to_string(),
            &record.video_count.to_string(),
            record.created_at.as_str(),
            &format!("{:.2}", record.engagement_rate),
            record.category.as_str(),
            record.niche.as_str(),
            record.city.as_str(),
            record.country.as_str(),
            record.source_query.as_str(),
            record.collected_at.as_str(),
        ];

        let row: Vec<String> = fields.iter().map(|f| escape_field(f)).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }

    out
}

/// Quotes a field when it contains a delimiter, quote, or newline
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
