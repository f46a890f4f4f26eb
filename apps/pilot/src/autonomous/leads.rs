use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum LeadError {
    #[error("leads file {path} could not be read: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One candidate URL from a leads list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadItem {
    pub url: String,
    /// 1-based line in the source text.
    pub line_number: usize,
    pub valid: bool,
    /// Present iff `valid` is false.
    pub error: Option<String>,
}

/// Parses a leads list. Blank lines and `#` comments produce no items;
/// malformed lines become invalid items rather than errors.
pub fn parse_leads(text: &str) -> Vec<LeadItem> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    text.lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let line_number = index + 1;
            let item = match validate_lead_url(line) {
                Ok(()) => LeadItem {
                    url: line.to_string(),
                    line_number,
                    valid: true,
                    error: None,
                },
                Err(error) => {
                    debug!("Lead on line {line_number} rejected: {error}");
                    LeadItem {
                        url: line.to_string(),
                        line_number,
                        valid: false,
                        error: Some(error),
                    }
                }
            };
            Some(item)
        })
        .collect()
}

/// Reads and parses a UTF-8 leads file. Only an unreadable file is an error.
pub async fn read_leads(path: &Path) -> Result<Vec<LeadItem>, LeadError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| LeadError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

    let leads = parse_leads(&text);
    let invalid = leads.iter().filter(|l| !l.valid).count();
    if invalid > 0 {
        warn!(
            "{invalid} of {} leads in {} are invalid",
            leads.len(),
            path.display()
        );
    }
    Ok(leads)
}

fn validate_lead_url(candidate: &str) -> Result<(), String> {
    let url = Url::parse(candidate).map_err(|e| format!("invalid URL: {e}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!(
            "unsupported scheme '{}' (expected http or https)",
            url.scheme()
        ));
    }
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err("URL has no host".to_string()),
    }
}
