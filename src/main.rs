use ancestry_etl::app::ports::{GeocoderPort, RecordSink};
use ancestry_etl::config::Config;
use ancestry_etl::constants;
use ancestry_etl::infra::{sqlite_sink, CsvSink, NominatimGeocoder, SqliteSink};
use ancestry_etl::logging;
use ancestry_etl::observability::init_metrics;
use ancestry_etl::pipeline::ingestion::{read_records, FieldMapper};
use ancestry_etl::pipeline::processing::{
    GeocodeCache, GeocodeResolver, Redactor, ResolverSettings, VariantTable,
};
use ancestry_etl::pipeline::Pipeline;
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "ancestry_etl")]
#[command(about = "Cleans, geocodes and redacts a genealogy export")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ancestry.toml in the working directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline on a UTF-16 tab-separated export
    Run {
        /// The genealogy export file
        input: PathBuf,
        /// Output CSV (overrides paths.output_csv)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Also load the result into this SQLite database
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Load an output CSV into the SQLite database named by DEV_DB_URL
    Load {
        /// CSV to load (defaults to paths.output_csv)
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Use PROD_DB_URL instead of DEV_DB_URL
        #[arg(long)]
        prod: bool,
    },
}

async fn run_pipeline(
    config: &Config,
    input: PathBuf,
    output: Option<PathBuf>,
    db: Option<PathBuf>,
) -> anyhow::Result<PathBuf> {
    let variants = VariantTable::load(&config.paths.variants)
        .with_context(|| format!("loading {}", config.paths.variants.display()))?;
    let cache = GeocodeCache::load(&config.paths.geocode_cache)?;
    let geocoder: Arc<dyn GeocoderPort> = Arc::new(NominatimGeocoder::new(&config.geocoder)?);
    let resolver = GeocodeResolver::new(geocoder, cache, ResolverSettings::from(&config.geocoder));
    let mut pipeline = Pipeline::new(
        variants,
        config.names.clone(),
        resolver,
        Redactor::new(config.privacy.cutoff),
    );

    let delimiter = config.input.delimiter as u8;
    let records = read_records(&input, delimiter, &FieldMapper::default())
        .with_context(|| format!("reading {}", input.display()))?;
    info!("📥 Read {} records from {}", records.len(), input.display());

    let output = output.unwrap_or_else(|| config.paths.output_csv.clone());
    let mut sinks: Vec<Box<dyn RecordSink>> = vec![Box::new(CsvSink::new(&output))];
    if let Some(db) = db {
        sinks.push(Box::new(SqliteSink::open(db, &config.database.table)?));
    }

    let outcome = pipeline.run(records, &mut sinks).await;
    // Resolved places are kept even when a later stage fails.
    if let Err(e) = pipeline.persist_cache() {
        error!("Failed to persist geocode cache: {}", e);
    }
    let result = outcome?;

    println!("\n📊 Pipeline Results:");
    println!("   Total records: {}", result.total_records);
    println!("   Written: {}", result.written_records);
    println!("   Excluded: {}", result.excluded_records);
    println!("   Dates redacted: {}", result.fields_redacted);
    println!("   Unresolved places: {}", result.places_unresolved);
    Ok(output)
}

fn load_database(config: &Config, csv: Option<PathBuf>, prod: bool) -> anyhow::Result<()> {
    let var = if prod {
        constants::PROD_DB_URL_VAR
    } else {
        constants::DEV_DB_URL_VAR
    };
    let url = std::env::var(var).with_context(|| format!("{} is not set", var))?;
    let csv = csv.unwrap_or_else(|| config.paths.output_csv.clone());

    let mut sink = SqliteSink::open(sqlite_sink::path_from_url(&url), &config.database.table)?;
    let rows = sink
        .load_csv(&csv)
        .with_context(|| format!("loading {}", csv.display()))?;
    info!("Loaded {} rows using {}", rows, var);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _guard = logging::init_logging();
    init_metrics();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Run { input, output, db } => {
            info!("🚀 Running ancestry pipeline...");
            let output = run_pipeline(&config, input, output, db).await?;
            println!("Finished, wrote {}", output.display());
        }
        Commands::Load { csv, prod } => {
            load_database(&config, csv, prod)?;
            println!("DONE.");
        }
    }
    Ok(())
}
