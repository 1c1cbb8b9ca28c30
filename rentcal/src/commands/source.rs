use anyhow::Result;

use rentcal_core::store::{JsonStore, SourceStore};
use rentcal_core::{FeedSource, Unit};

use crate::config::Config;

pub struct AddArgs {
    pub id: String,
    pub url: String,
    pub unit: String,
    pub name: Option<String>,
    pub interval: Option<String>,
    pub vanish_threshold: Option<u32>,
}

pub async fn add(config: Config, args: AddArgs) -> Result<()> {
    let store = JsonStore::open(&config.data_dir)?;

    if store.get_source(&args.id).await?.is_some() {
        anyhow::bail!("Source '{}' already exists", args.id);
    }

    // Register the unit on first use.
    let unit_known = store
        .list_units()
        .await?
        .into_iter()
        .any(|u| u.id == args.unit);
    if !unit_known {
        store
            .upsert_unit(Unit::new(args.unit.clone(), args.unit.clone()))
            .await?;
    }

    let name = args.name.unwrap_or_else(|| args.id.clone());
    let mut source = FeedSource::new(args.id.clone(), args.unit, name, args.url);
    if let Some(interval) = args.interval {
        let duration = humantime::parse_duration(&interval)
            .map_err(|e| anyhow::anyhow!("Invalid interval '{}': {}", interval, e))?;
        source.sync_interval_secs = Some(duration.as_secs());
    }
    source.vanish_threshold = args.vanish_threshold;

    store.upsert_source(source).await?;
    println!("Added source {}", args.id);

    Ok(())
}

pub async fn list(config: Config) -> Result<()> {
    let store = JsonStore::open(&config.data_dir)?;
    let sources = store.list_sources().await?;

    if sources.is_empty() {
        println!("No sources configured");
        return Ok(());
    }

    for source in sources {
        let state = if source.enabled { "enabled" } else { "disabled" };
        println!(
            "{}  unit={}  {}  {}",
            source.id, source.unit_id, state, source.url
        );
    }

    Ok(())
}

pub async fn set_enabled(config: Config, id: &str, enabled: bool) -> Result<()> {
    let store = JsonStore::open(&config.data_dir)?;
    store.set_enabled(id, enabled).await?;
    println!(
        "Source {} {}",
        id,
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}
