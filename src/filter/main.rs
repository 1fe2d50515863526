//! Wikidata dump filter binary.
//!
//! Streams a compressed newline-delimited dump in a single pass and
//! writes three typed, compressed record streams.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use meridian::wikidata::{DumpFilter, StreamPaths};

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "filter")]
#[command(about = "Filter a Wikidata JSON dump into typed entity streams")]
struct Args {
    /// Dump file (.json or .json.gz, one entity per line)
    #[arg(short, long)]
    input: PathBuf,

    /// Directory for the output streams
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Output filename prefix
    #[arg(long, default_value = "wikidata_filtered")]
    prefix: String,

    /// Records buffered in memory before each flush to the sink
    #[arg(long, default_value = "1000")]
    buffer_size: usize,
}

fn main() -> ExitCode {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Failed to initialize logging");
        return ExitCode::from(1);
    }

    let args = Args::parse();
    let outputs = StreamPaths::with_prefix(&args.output_dir, &args.prefix);

    let mut filter = DumpFilter::new();
    match filter.run(&args.input, &outputs, args.buffer_size) {
        Ok(stats) => {
            info!(
                "Summary: {} entities, {} with coordinates, {} with GeoNames ids, {} historical, {} colonial, {} with cross-db ids",
                stats.total_entities,
                stats.with_coordinates,
                stats.with_geonames,
                stats.historical_entities,
                stats.colonial_entities,
                stats.with_cross_db_ids
            );
            info!(
                "Persons: {} found, {} with place ties; organizations: {} found, {} with place ties",
                stats.people_found,
                stats.people_with_places,
                stats.orgs_found,
                stats.orgs_with_places
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Filter failed: {:#}", e);
            ExitCode::from(1)
        }
    }
}
