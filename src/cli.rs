//! Command-line interface.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use console::style;

use receiptdrop::classify::{self, SourceLabel};
use receiptdrop::config::Settings;
use receiptdrop::ocr::{OcrEngine, TesseractEngine, TextExtractor};
use receiptdrop::payload::{Representation, SharePayload};
use receiptdrop::pipeline::{IngestPipeline, IngestState};
use receiptdrop::resolver::AttachmentResolver;
use receiptdrop::store::DirRecordStore;

#[derive(Parser)]
#[command(name = "receiptdrop")]
#[command(about = "Shared receipt ingestion and classification pipeline")]
#[command(version)]
pub struct Cli {
    /// Record store directory (defaults to the platform data dir)
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a shared file: resolve, extract text, classify and commit
    Ingest {
        /// File to ingest (image or PDF)
        file: PathBuf,
        /// Override the classified source label
        #[arg(long)]
        label: Option<String>,
        /// Override the inferred date (RFC 3339)
        #[arg(long)]
        date: Option<String>,
        /// Stop after review instead of committing
        #[arg(long)]
        no_commit: bool,
    },

    /// List committed records in the store
    Records,

    /// Show engine availability and store location
    Status,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load()?;
    if let Some(store_dir) = cli.store_dir {
        settings.store_dir = store_dir;
    }

    match cli.command {
        Commands::Ingest {
            file,
            label,
            date,
            no_commit,
        } => ingest(&settings, file, label, date, no_commit).await,
        Commands::Records => records(&settings).await,
        Commands::Status => status(&settings).await,
    }
}

async fn ingest(
    settings: &Settings,
    file: PathBuf,
    label: Option<String>,
    date: Option<String>,
    no_commit: bool,
) -> anyhow::Result<()> {
    let label = label
        .map(|l| {
            SourceLabel::from_str(&l).with_context(|| format!("unknown source label: {}", l))
        })
        .transpose()?;
    let date = date
        .map(|d| {
            d.parse::<DateTime<Utc>>()
                .with_context(|| format!("invalid date: {}", d))
        })
        .transpose()?;

    let payload = SharePayload::new().with(Representation::FileReference(file));
    let extractor = TextExtractor::new(Arc::new(TesseractEngine::new()), settings.ocr_options());
    let store = DirRecordStore::new(&settings.store_dir);

    let mut pipeline = IngestPipeline::new(payload, extractor, store)
        .with_resolver(AttachmentResolver::new(settings.max_dimension));

    if let IngestState::Error { message, .. } = pipeline.run().await {
        anyhow::bail!("ingestion failed: {}", message);
    }

    if let Some(label) = label {
        pipeline.edit_source(label);
    }
    if let Some(date) = date {
        pipeline.edit_date(date);
    }

    if let IngestState::Reviewing(draft) = pipeline.state() {
        println!(
            "  {} source: {}   date: {}",
            style("→").cyan(),
            style(draft.source).bold(),
            draft.occurred_at.format("%Y-%m-%d")
        );
        if let Some(text) = &draft.text {
            println!("  {} {} lines of text", style("→").cyan(), text.lines().count());
        }
    }

    if no_commit {
        println!("  {} review only, nothing committed", style("·").dim());
        return Ok(());
    }

    match pipeline.commit().await {
        IngestState::Success { record_id } => {
            println!("  {} committed record {}", style("✓").green(), record_id);
            Ok(())
        }
        IngestState::Error { message, .. } => anyhow::bail!("commit failed: {}", message),
        other => anyhow::bail!("unexpected state after commit: {:?}", other),
    }
}

async fn records(settings: &Settings) -> anyhow::Result<()> {
    let store = DirRecordStore::new(&settings.store_dir);
    let mut paths = store.list().await?;
    paths.sort();

    if paths.is_empty() {
        println!("no records in {}", settings.store_dir.display());
        return Ok(());
    }

    for path in paths {
        let record = store.read(&path).await?;
        println!(
            "{}  {}  {}  {}",
            record.id,
            record.occurred_at.format("%Y-%m-%d"),
            style(record.source).bold(),
            record
                .text
                .as_deref()
                .map(|t| t.lines().next().unwrap_or(""))
                .unwrap_or("(no text)"),
        );
    }
    Ok(())
}

async fn status(settings: &Settings) -> anyhow::Result<()> {
    let engine = TesseractEngine::new();
    let mark = if engine.is_available() {
        style("✓").green()
    } else {
        style("✗").red()
    };
    println!("{} OCR engine: {}", mark, engine.availability_hint());

    let store = DirRecordStore::new(&settings.store_dir);
    let count = store.list().await?.len();
    println!(
        "{} store: {} ({} records)",
        style("·").dim(),
        settings.store_dir.display(),
        count
    );

    let labels: Vec<&str> = classify::known_labels().map(|l| l.as_str()).collect();
    println!("{} known sources: {}", style("·").dim(), labels.join(", "));
    Ok(())
}
