use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pilot::autonomous::leads::read_leads;
use pilot::config::Config;
use pilot::db::create_pool;
use pilot::errors::AppError;
use pilot::tracker::TrackerStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Configuration first; a bad value aborts before anything is opened
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting pilot v{}", env!("CARGO_PKG_VERSION"));

    let pool = create_pool(&config.tracker_db_path).await?;
    let store = TrackerStore::new(pool);
    store
        .initialize()
        .await
        .context("Failed to initialize tracker schema")?;
    info!("Tracker ready (dry run: {})", config.dry_run);

    let report = build_report(&config, &store).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

/// Status counts, recent records and (when configured) leads validation.
async fn build_report(config: &Config, store: &TrackerStore) -> Result<Value, AppError> {
    let mut leads_report = Value::Null;
    if let Some(path) = &config.leads_file {
        let leads = read_leads(path).await?;
        for lead in leads.iter().filter(|l| !l.valid) {
            warn!(
                "{}:{}: {}",
                path.display(),
                lead.line_number,
                lead.error.as_deref().unwrap_or("invalid")
            );
        }
        let invalid: Vec<_> = leads.iter().filter(|l| !l.valid).collect();
        info!("{} of {} leads are valid", leads.len() - invalid.len(), leads.len());
        leads_report = json!({
            "path": path.display().to_string(),
            "total": leads.len(),
            "valid": leads.len() - invalid.len(),
            "invalid": invalid,
        });
    }

    let counts: BTreeMap<&str, u64> = store
        .get_status_counts()
        .await?
        .into_iter()
        .map(|(status, count)| (status.as_str(), count))
        .collect();
    let recent = store.list_recent(config.recent_limit, None).await?;

    Ok(json!({
        "status_counts": counts,
        "recent": recent,
        "leads": leads_report,
    }))
}
