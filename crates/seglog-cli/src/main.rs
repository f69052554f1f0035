//! seglog - operator tool for seglog segment stores
//!
//! Inspects and purges the segments an owner has persisted to a redb
//! database, and checks retention configs before they are deployed.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use seglog_core::{
    BytesEntry, Cursor, LogEntry, OwnerId, PersistedSegment, RetentionConfig, SegmentId,
    SegmentKey, SegmentStore, SegmentSummary,
};
use seglog_logging::{LogConfig, SeglogSubscriberBuilder};
use seglog_storage::{RedbSegmentStore, RedbStoreConfig};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "seglog",
    about = "Inspect and maintain per-owner segmented event logs",
    version
)]
struct Cli {
    /// Path to the redb segment database
    #[arg(long, global = true, default_value = "seglog.redb")]
    db: PathBuf,

    /// Log level, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the persisted segments of an owner
    Segments {
        owner: String,
    },

    /// Print the entries of one segment
    Dump {
        owner: String,

        segment: SegmentId,

        /// Emit JSON lines instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Delete every segment of an owner
    Purge {
        owner: String,
    },

    /// Validate a retention config file
    CheckConfig {
        file: PathBuf,
    },

    /// Parse a textual cursor and print its normalized form
    ParseCursor {
        text: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _guard = SeglogSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .with_level(cli.log_level.clone())
        .init()
        .context("failed to initialize logging")?;

    match cli.command {
        Commands::Segments { owner } => {
            let store = open_store(&cli.db)?;
            let summaries = store.list_segments(&OwnerId::new(owner.as_str())).await?;
            for line in render_segments(&owner, &summaries) {
                println!("{line}");
            }
        }
        Commands::Dump {
            owner,
            segment,
            json,
        } => {
            let store = open_store(&cli.db)?;
            let key = SegmentKey::new(OwnerId::new(owner), segment);
            let Some(persisted) = store.try_get(&key).await? else {
                bail!("segment {key} not found");
            };
            for line in render_dump(&persisted, json)? {
                println!("{line}");
            }
        }
        Commands::Purge { owner } => {
            let store = open_store(&cli.db)?;
            let owner_id = OwnerId::new(owner);
            let removed = store.remove_all_for_owner(&owner_id).await?;
            info!(owner = %owner_id, removed, "Purged owner");
            println!("removed {removed} segment(s) for {owner_id}");
        }
        Commands::CheckConfig { file } => {
            for line in check_config(&file)? {
                println!("{line}");
            }
        }
        Commands::ParseCursor { text } => {
            println!("{}", normalize_cursor(&text)?);
        }
    }

    Ok(())
}

fn open_store(db: &Path) -> Result<RedbSegmentStore> {
    RedbSegmentStore::open(RedbStoreConfig::at(db))
        .with_context(|| format!("failed to open segment database {}", db.display()))
}

fn render_segments(owner: &str, summaries: &[SegmentSummary]) -> Vec<String> {
    if summaries.is_empty() {
        return vec![format!("no segments stored for {owner}")];
    }

    let mut lines = Vec::with_capacity(summaries.len() + 1);
    lines.push(format!(
        "{:>10}  {:<30}  {:<30}  {:<30}  {:>10}",
        "SEGMENT", "FIRST ENTRY", "LAST ENTRY", "CREATED", "BYTES"
    ));
    let mut total_bytes = 0;
    for summary in summaries {
        total_bytes += summary.payload_size;
        lines.push(format!(
            "{:>10}  {:<30}  {:<30}  {:<30}  {:>10}",
            summary.segment_id,
            summary.first_entry_timestamp.to_rfc3339(),
            summary.last_entry_timestamp.to_rfc3339(),
            summary.created_at.to_rfc3339(),
            summary.payload_size
        ));
    }
    lines.push(format!("{} segment(s), {total_bytes} bytes", summaries.len()));
    lines
}

fn render_dump(persisted: &PersistedSegment, json: bool) -> Result<Vec<String>> {
    let payload = persisted
        .open::<BytesEntry>()
        .with_context(|| format!("failed to decode segment {}", persisted.key()))?;

    let mut lines = Vec::with_capacity(payload.entries.len() + 1);
    if !json {
        lines.push(format!(
            "segment {} ({} entries, previous unique id {})",
            persisted.key(),
            payload.entries.len(),
            payload.previous_segment_last_entry_unique_id
        ));
    }

    for entry in &payload.entries {
        if json {
            let value = serde_json::json!({
                "sequential_id": entry.sequential_id(),
                "collected_at": entry.collected_at().to_rfc3339(),
                "unique_id": entry.unique_id().to_string(),
                "kind": entry.kind,
                "payload": hex::encode(&entry.payload),
            });
            lines.push(serde_json::to_string(&value)?);
        } else {
            lines.push(format!(
                "{:>8}  {}  {}  {:<16}  {}",
                entry.sequential_id(),
                entry.collected_at().to_rfc3339(),
                entry.unique_id(),
                entry.kind,
                hex::encode(&entry.payload)
            ));
        }
    }
    Ok(lines)
}

fn check_config(file: &Path) -> Result<Vec<String>> {
    let config = RetentionConfig::load(file)
        .with_context(|| format!("invalid retention config {}", file.display()))?;

    let mut lines = vec![
        format!("{}: ok", file.display()),
        format!("  retention: {}s", config.retention.as_secs()),
        format!(
            "  entries per segment: {}",
            config.num_entries_per_persisted_segment
        ),
        format!(
            "  segments retained: {}..={}",
            config.min_persisted_segments_to_retain, config.max_persisted_segments_to_retain
        ),
        format!(
            "  removed per pass: {}",
            config.max_persisted_segments_to_remove_at_once
        ),
    ];
    lines.extend(
        config
            .warnings()
            .into_iter()
            .map(|warning| format!("warning: {warning}")),
    );
    Ok(lines)
}

fn normalize_cursor(text: &str) -> Result<String> {
    let cursor = Cursor::from_str(text).with_context(|| format!("invalid cursor {text:?}"))?;
    Ok(cursor.to_string())
}
