use anyhow::Result;

use rentcal_core::store::{BookingStore, JsonStore, SourceStore};
use rentcal_core::SyncStatus;

use crate::config::Config;

pub async fn run(config: Config) -> Result<()> {
    let store = JsonStore::open(&config.data_dir)?;
    let sources = store.list_sources().await?;

    if sources.is_empty() {
        println!(
            "No sources configured.\n\n\
            Register your first feed with:\n  \
            rentcal source add <id> <url> --unit <unit>"
        );
        return Ok(());
    }

    for (i, source) in sources.iter().enumerate() {
        let counts = store.counts(&source.id).await?;

        let state = if source.enabled { "" } else { " (disabled)" };
        println!("{} ({}){}", source.name, source.id, state);
        println!("   url: {}", source.url);
        println!(
            "   bookings: {} active, {} tombstoned",
            counts.active, counts.tombstoned
        );

        match source.last_status {
            SyncStatus::Never => println!("   never synced"),
            SyncStatus::Success => {
                let when = source
                    .last_synced_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "unknown".to_string());
                println!("   last sync: ok at {}", when);
                if let Some(stats) = &source.last_stats {
                    println!(
                        "   last run: {} events, {} created, {} updated, {} deleted, {} vanished",
                        stats.total, stats.created, stats.updated, stats.deleted, stats.vanished
                    );
                }
            }
            SyncStatus::Error => {
                let when = source
                    .last_synced_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "unknown".to_string());
                println!(
                    "   last sync: failed at {} ({})",
                    when,
                    source.last_error.as_deref().unwrap_or("unknown error")
                );
            }
        }

        if i < sources.len() - 1 {
            println!();
        }
    }

    Ok(())
}
