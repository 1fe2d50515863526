//! Link binary: admin hierarchy, spatial resolution and cross-source
//! person linking.
//!
//! Exit codes: 0 on success or cancellation, 1 on unrecoverable error,
//! 2 when one or more countries ended up in the failed list.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use meridian::control::CancelFlag;
use meridian::graph::GraphClient;
use meridian::hierarchy::{AdminHierarchyBuilder, HIERARCHY_BATCH_SIZE};
use meridian::linker::{PersonLinker, PERSON_BATCH_SIZE};
use meridian::progress::ProgressLog;
use meridian::resolver::{link_by_geonames_id, ResolverParams, SpatialResolver};

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "link")]
#[command(about = "Build containment hierarchies and resolve entities across sources")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Materialise AdminDivision nodes and containment edges
    Hierarchy(HierarchyArgs),
    /// Link WikidataPlace nodes to gazetteer places
    Places(PlacesArgs),
    /// Link RDF-derived persons to places and Wikidata persons
    Persons(PersonsArgs),
}

#[derive(Parser, Debug)]
struct HierarchyArgs {
    /// Durable resume log
    #[arg(long, default_value = "admin_hierarchy_progress.json")]
    progress_file: PathBuf,

    /// Rows per transaction
    #[arg(long, default_value_t = HIERARCHY_BATCH_SIZE)]
    batch_size: usize,
}

#[derive(Parser, Debug)]
struct PlacesArgs {
    /// Durable resume log
    #[arg(long, default_value = "spatial_link_progress.json")]
    progress_file: PathBuf,

    /// Search radius for proximity candidates (km)
    #[arg(long, default_value = "10.0")]
    radius_km: f64,

    /// Nearest candidates scored per source
    #[arg(long, default_value = "5")]
    max_candidates: usize,

    /// Confidence floor for emitting an edge
    #[arg(long, default_value = "0.5")]
    min_confidence: f64,

    /// Unlinked sources fetched per batch
    #[arg(long, default_value = "1000")]
    batch_size: usize,

    /// Rows per transaction in the direct-id phase
    #[arg(long, default_value = "50000")]
    direct_batch_size: usize,

    /// Skip the direct-id phase (already complete)
    #[arg(long)]
    skip_direct: bool,
}

#[derive(Parser, Debug)]
struct PersonsArgs {
    /// Persons document produced by `ingest rdf`
    #[arg(short, long)]
    file: PathBuf,

    /// Persons per transaction
    #[arg(long, default_value_t = PERSON_BATCH_SIZE)]
    batch_size: usize,
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
        Commands::Hierarchy(args) => run_hierarchy(args).await,
        Commands::Places(args) => run_places(args).await,
        Commands::Persons(args) => run_persons(args).await.map(|_| ExitCode::SUCCESS),
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            error!("Linking failed: {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run_hierarchy(args: HierarchyArgs) -> Result<ExitCode> {
    let client = GraphClient::from_env().await?;
    let progress = ProgressLog::load(&args.progress_file)?;
    let cancel = CancelFlag::new();
    cancel.install_sigint_handler();

    let mut builder = AdminHierarchyBuilder::new(client, progress, args.batch_size, cancel);
    let summary = builder.run().await?;

    if summary.countries_failed > 0 {
        info!(
            "{} countries failed; progress file {} is authoritative for resume",
            summary.countries_failed,
            args.progress_file.display()
        );
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}

async fn run_places(args: PlacesArgs) -> Result<ExitCode> {
    let client = GraphClient::from_env().await?;
    let cancel = CancelFlag::new();
    cancel.install_sigint_handler();

    // Phase A first: direct identifier matches are the cheap, certain
    // links and must complete before proximity linking is meaningful.
    if !args.skip_direct {
        link_by_geonames_id(&client, args.direct_batch_size).await?;
    }

    let progress = ProgressLog::load(&args.progress_file)?;
    let params = ResolverParams {
        radius_km: args.radius_km,
        max_candidates: args.max_candidates,
        min_confidence: args.min_confidence,
        batch_size: args.batch_size,
    };
    let mut resolver = SpatialResolver::new(client, params, progress, cancel);
    let summary = resolver.run().await?;

    if summary.countries_failed > 0 {
        info!(
            "{} countries failed; progress file {} is authoritative for resume",
            summary.countries_failed,
            args.progress_file.display()
        );
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}

async fn run_persons(args: PersonsArgs) -> Result<()> {
    let document = PersonLinker::load_document(&args.file)?;
    let client = GraphClient::from_env().await?;
    let linker = PersonLinker::new(client, args.batch_size.max(1));
    linker.run(&document).await?;
    Ok(())
}
