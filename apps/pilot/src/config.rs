use std::path::PathBuf;

use anyhow::{bail, Context, Result};

/// Application configuration loaded from environment variables.
/// Values are resolved once at startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct Config {
    pub tracker_db_path: PathBuf,
    pub leads_file: Option<PathBuf>,
    pub min_score: Option<f64>,
    pub include_skips: bool,
    pub dry_run: bool,
    pub recent_limit: u32,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup (the environment in
    /// production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let min_score = match lookup("MIN_SCORE") {
            Some(raw) => Some(parse_score(&raw)?),
            None => None,
        };

        Ok(Config {
            tracker_db_path: lookup("TRACKER_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/tracker.db")),
            leads_file: lookup("LEADS_FILE").map(PathBuf::from),
            min_score,
            include_skips: parse_flag(lookup("INCLUDE_SKIPS"), "INCLUDE_SKIPS", false)?,
            dry_run: parse_flag(lookup("DRY_RUN"), "DRY_RUN", true)?,
            recent_limit: lookup("RECENT_LIMIT")
                .unwrap_or_else(|| "20".to_string())
                .parse::<u32>()
                .context("RECENT_LIMIT must be a non-negative integer")?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn parse_score(raw: &str) -> Result<f64> {
    let score = raw
        .trim()
        .parse::<f64>()
        .with_context(|| format!("MIN_SCORE '{raw}' is not a number"))?;
    if !(0.0..=1.0).contains(&score) {
        bail!("MIN_SCORE must be between 0 and 1, got {score}");
    }
    Ok(score)
}

fn parse_flag(raw: Option<String>, key: &str, default: bool) -> Result<bool> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("{key} must be a boolean, got '{other}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.tracker_db_path, PathBuf::from("./data/tracker.db"));
        assert!(config.leads_file.is_none());
        assert!(config.min_score.is_none());
        assert!(!config.include_skips);
        assert!(config.dry_run);
        assert_eq!(config.recent_limit, 20);
        assert_eq!(config.rust_log, "info");
    }

    #[test]
    fn test_explicit_values_are_parsed() {
        let config = config_from(&[
            ("TRACKER_DB_PATH", "/tmp/t.db"),
            ("LEADS_FILE", "leads.txt"),
            ("MIN_SCORE", "0.7"),
            ("INCLUDE_SKIPS", "yes"),
            ("DRY_RUN", "false"),
            ("RECENT_LIMIT", "5"),
        ])
        .unwrap();
        assert_eq!(config.tracker_db_path, PathBuf::from("/tmp/t.db"));
        assert_eq!(config.leads_file, Some(PathBuf::from("leads.txt")));
        assert_eq!(config.min_score, Some(0.7));
        assert!(config.include_skips);
        assert!(!config.dry_run);
        assert_eq!(config.recent_limit, 5);
    }

    #[test]
    fn test_out_of_range_min_score_is_rejected() {
        let err = config_from(&[("MIN_SCORE", "1.5")]).unwrap_err();
        assert!(err.to_string().contains("between 0 and 1"));
    }

    #[test]
    fn test_garbage_flag_is_rejected() {
        assert!(config_from(&[("DRY_RUN", "maybe")]).is_err());
    }
}
