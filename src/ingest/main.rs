//! Ingest binary: bulk and incremental loaders into the graph store.
//!
//! Producers parse input files on a blocking task; a bounded channel of
//! batches feeds the store writer so parsing and writing overlap.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use meridian::geonames::{FeatureFilter, GazetteerReader, ReaderStats};
use meridian::graph::schema::create_schema;
use meridian::graph::writer::{EntityWriter, WriteMode, ENTITY_BATCH_SIZE, PLACE_BATCH_SIZE};
use meridian::graph::GraphClient;
use meridian::models::person::PersonsDocument;
use meridian::models::{EntityRecord, Place};
use meridian::rdf::{FactReader, TripleGraph};
use meridian::wikidata::DumpLines;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(about = "Load reference corpora into the graph store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create constraints and indexes
    Schema,
    /// Load a GeoNames tab-separated dump
    Geonames(GeonamesArgs),
    /// Load a filtered Wikidata entity stream
    Wikidata(WikidataArgs),
    /// Parse a CIDOC-CRM Turtle file into a persons document
    Rdf(RdfArgs),
}

#[derive(Parser, Debug)]
struct GeonamesArgs {
    /// Dump file (e.g. allCountries.txt)
    #[arg(short, long)]
    file: PathBuf,

    /// Comma-separated country codes to include (e.g. US,GB,FR)
    #[arg(long)]
    countries: Option<String>,

    /// Comma-separated country codes to exclude
    #[arg(long)]
    exclude_countries: Option<String>,

    /// Comma-separated feature codes: class letters (P) or qualified
    /// codes (S.CMTY), mixed freely
    #[arg(long)]
    include_codes: Option<String>,

    /// Records per transaction
    #[arg(long, default_value_t = PLACE_BATCH_SIZE)]
    batch_size: usize,

    /// Skip the first N records (resume an interrupted load)
    #[arg(long, default_value = "0")]
    offset: u64,

    /// Count what would be loaded without writing
    #[arg(long)]
    dry_run: bool,

    /// Assume empty stores and use CREATE instead of MERGE
    #[arg(long)]
    bulk: bool,
}

#[derive(Parser, Debug)]
struct WikidataArgs {
    /// Filtered stream (.jsonl.gz) produced by the filter binary
    #[arg(short, long)]
    file: PathBuf,

    /// Records per transaction
    #[arg(long, default_value_t = ENTITY_BATCH_SIZE)]
    batch_size: usize,

    /// Assume empty stores and use CREATE instead of MERGE
    #[arg(long)]
    bulk: bool,
}

#[derive(Parser, Debug)]
struct RdfArgs {
    /// CIDOC-CRM Turtle input
    #[arg(short, long)]
    input: PathBuf,

    /// Output persons document (JSON)
    #[arg(short, long)]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Failed to initialize logging");
        return ExitCode::from(1);
    }

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Schema => run_schema().await,
        Commands::Geonames(args) => run_geonames(args).await,
        Commands::Wikidata(args) => run_wikidata(args).await,
        Commands::Rdf(args) => run_rdf(args).await,
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Ingest failed: {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run_schema() -> Result<()> {
    let client = GraphClient::from_env().await?;
    create_schema(&client).await
}

fn split_codes(arg: Option<&str>) -> Option<Vec<String>> {
    arg.map(|s| {
        s.split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    })
}

fn spinner(message: &'static str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .expect("static template"),
    );
    bar.set_message(message);
    bar
}

async fn run_geonames(args: GeonamesArgs) -> Result<()> {
    info!("Loading gazetteer from {}", args.file.display());

    let include = split_codes(args.countries.as_deref());
    let exclude = split_codes(args.exclude_countries.as_deref()).unwrap_or_default();
    let codes = split_codes(args.include_codes.as_deref());
    let filter = FeatureFilter::new(include.as_deref(), &exclude, codes.as_deref());

    let mode = if args.bulk {
        WriteMode::Bulk
    } else {
        WriteMode::Incremental
    };
    let batch_size = args.batch_size.max(1);

    // Parser task feeds batches of places through a bounded channel.
    let (tx, mut rx) = mpsc::channel::<Vec<Place>>(4);
    let file = args.file.clone();
    let offset = args.offset;
    let reader_handle = tokio::task::spawn_blocking(move || -> Result<ReaderStats> {
        let mut reader = GazetteerReader::open(&file, filter)?.with_offset(offset);
        let mut batch = Vec::with_capacity(batch_size);
        for place in reader.by_ref() {
            batch.push(place);
            if batch.len() >= batch_size {
                if tx.blocking_send(std::mem::take(&mut batch)).is_err() {
                    break;
                }
                batch.reserve(batch_size);
            }
        }
        if !batch.is_empty() {
            let _ = tx.blocking_send(batch);
        }
        Ok(reader.stats())
    });

    let bar = spinner("Loading places");
    let mut loaded = 0u64;

    if args.dry_run {
        while let Some(batch) = rx.recv().await {
            loaded += batch.len() as u64;
            bar.set_message(format!("Would load {} places", loaded));
        }
    } else {
        let client = GraphClient::from_env().await?;
        let writer = EntityWriter::new(client, mode);
        while let Some(batch) = rx.recv().await {
            loaded += writer.write_places(&batch).await?;
            bar.set_message(format!("Loaded {} places", loaded));
        }
        writer.summarize().await?;
    }
    bar.finish_and_clear();

    let stats = reader_handle
        .await
        .context("Gazetteer reader task panicked")??;
    if args.dry_run {
        info!("Dry run: would load {} places", loaded);
    } else {
        info!("Loaded {} places", loaded);
    }
    info!(
        "Reader summary: {} parsed, {} discarded (bad coordinates), {} filtered",
        stats.parsed, stats.discarded, stats.filtered
    );
    Ok(())
}

async fn run_wikidata(args: WikidataArgs) -> Result<()> {
    info!("Loading Wikidata records from {}", args.file.display());

    let client = GraphClient::from_env().await?;
    let mode = if args.bulk {
        WriteMode::Bulk
    } else {
        WriteMode::Incremental
    };
    let writer = EntityWriter::new(client, mode);
    let batch_size = args.batch_size.max(1);

    let (tx, mut rx) = mpsc::channel::<Vec<EntityRecord>>(4);
    let file = args.file.clone();
    let reader_handle = tokio::task::spawn_blocking(move || -> Result<u64> {
        let mut skipped = 0u64;
        let mut batch = Vec::with_capacity(batch_size);
        for line in DumpLines::open(&file)? {
            let line = line?;
            match serde_json::from_str::<EntityRecord>(&line) {
                Ok(record) => {
                    batch.push(record);
                    if batch.len() >= batch_size {
                        if tx.blocking_send(std::mem::take(&mut batch)).is_err() {
                            break;
                        }
                    }
                }
                // The first line is the stream metadata object.
                Err(_) => skipped += 1,
            }
        }
        if !batch.is_empty() {
            let _ = tx.blocking_send(batch);
        }
        Ok(skipped)
    });

    let bar = spinner("Loading records");
    let mut places = 0u64;
    let mut persons = 0u64;
    let mut orgs = 0u64;
    let mut fixed_swapped = 0u64;
    let mut skipped_invalid = 0u64;

    while let Some(batch) = rx.recv().await {
        let mut place_batch = Vec::new();
        let mut person_batch = Vec::new();
        let mut org_batch = Vec::new();
        for record in batch {
            match record {
                EntityRecord::Place(p) => place_batch.push(p),
                EntityRecord::Person(p) => person_batch.push(p),
                EntityRecord::Organization(o) => org_batch.push(o),
            }
        }
        let stats = writer.write_wikidata_places(&place_batch).await?;
        places += stats.written;
        fixed_swapped += stats.fixed_swapped;
        skipped_invalid += stats.skipped_invalid;
        persons += writer.write_persons(&person_batch).await?;
        orgs += writer.write_organizations(&org_batch).await?;
        bar.set_message(format!(
            "Loaded {} places, {} persons, {} organizations",
            places, persons, orgs
        ));
    }
    bar.finish_and_clear();

    let skipped_lines = reader_handle
        .await
        .context("Record reader task panicked")??;
    info!(
        "Loaded {} places, {} persons, {} organizations ({} non-record lines skipped)",
        places,
        persons,
        orgs,
        skipped_lines
    );
    if fixed_swapped > 0 {
        warn!("Fixed {} records with swapped lat/lon", fixed_swapped);
    }
    if skipped_invalid > 0 {
        warn!("Skipped {} records with invalid coordinates", skipped_invalid);
    }
    Ok(())
}

async fn run_rdf(args: RdfArgs) -> Result<()> {
    let input = args.input.clone();
    let source = args
        .input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown.ttl")
        .to_string();

    info!("Parsing RDF from {}", input.display());
    let document = tokio::task::spawn_blocking(move || -> Result<PersonsDocument> {
        let graph = TripleGraph::parse_file(&input)?;
        Ok(FactReader::new(graph).extract(&source))
    })
    .await
    .context("RDF parser task panicked")??;

    let json = serde_json::to_string_pretty(&document)?;
    std::fs::write(&args.output, json)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    info!(
        "Wrote {} persons ({} in source) to {}",
        document.metadata.persons_with_data,
        document.metadata.total_persons,
        args.output.display()
    );
    Ok(())
}
