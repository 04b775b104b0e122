use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use nppes_states::config::ENV_PREFIX;
use nppes_states::constants::{DEFAULT_SPLIT_ROWS, PRACTICE_POSTAL_COLUMN};
use nppes_states::enrich::default_enriched_path;
use nppes_states::prelude::*;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "npsplit", version)]
#[command(about = "NPPES state splitter - Partition NPPES provider files into per-state CSV files", long_about = None)]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Partition a directory of NPPES CSV files into one file per state
    Partition(PartitionArgs),
    /// Split one large CSV file into smaller pieces
    Split(SplitArgs),
    /// Normalize postal codes and add city, county and state columns
    Enrich(EnrichArgs),
    /// Write a default configuration file
    InitConfig(InitConfigArgs),
}

#[derive(Args)]
struct PartitionArgs {
    /// Directory containing the input CSV files
    #[arg(short, long)]
    input_dir: Option<PathBuf>,
    /// Directory receiving the per-state files
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
    /// Rows read per chunk
    #[arg(long)]
    chunk_size: Option<usize>,
    /// Number of worker threads
    #[arg(short, long)]
    threads: Option<usize>,
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Remove existing state files before partitioning
    #[arg(long)]
    clean: bool,
    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,
    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct SplitArgs {
    /// CSV file to split
    #[arg(short, long)]
    input: PathBuf,
    /// Directory receiving the pieces
    #[arg(short, long)]
    output_dir: PathBuf,
    /// Data rows per piece
    #[arg(long, default_value_t = DEFAULT_SPLIT_ROWS)]
    rows: usize,
}

#[derive(Args)]
struct EnrichArgs {
    /// CSV file to enrich
    #[arg(short, long)]
    input: PathBuf,
    /// Output file (defaults to <input>_enriched.csv)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// ZIP code table with zipcode,major_city,county,state columns
    #[arg(short, long)]
    zip_table: PathBuf,
    /// Column holding the postal code
    #[arg(long, default_value = PRACTICE_POSTAL_COLUMN)]
    postal_column: String,
}

#[derive(Args)]
struct InitConfigArgs {
    /// Where to write the file (defaults to the user config directory)
    #[arg(short, long)]
    path: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let result = match cli.command {
        Commands::Partition(args) => cmd_partition(args),
        Commands::Split(args) => cmd_split(args),
        Commands::Enrich(args) => cmd_enrich(args),
        Commands::InitConfig(args) => cmd_init_config(args),
    };

    if let Err(e) = result {
        match e.downcast_ref::<PartitionError>() {
            Some(err) => eprintln!("Error: {}", err.user_message()),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_partition(args: PartitionArgs) -> anyhow::Result<()> {
    let loaded = PartitionConfig::load_layered(args.config.as_deref())
        .with_context(|| format!("Failed to load configuration (file or {}_* variables)", ENV_PREFIX))?;

    let mut builder = ConfigBuilder::from_config(loaded);
    if let Some(dir) = &args.input_dir {
        builder = builder.input_dir(dir);
    }
    if let Some(dir) = &args.output_dir {
        builder = builder.output_dir(dir);
    }
    if let Some(size) = args.chunk_size {
        builder = builder.chunk_size(size);
    }
    if args.threads.is_some() {
        builder = builder.parallel_threads(args.threads);
    }
    if args.clean {
        builder = builder.clean_output(true);
    }
    if args.no_progress || args.json {
        builder = builder.progress_bar(false);
    }
    let config = builder.build()?;

    let summary = StatePartitioner::new(config).run()?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        summary.print_summary();
    }

    if !summary.is_success() {
        bail!(
            "{} of {} input files failed",
            summary.files_failed.len(),
            summary.files_discovered
        );
    }
    Ok(())
}

fn cmd_split(args: SplitArgs) -> anyhow::Result<()> {
    let pieces = split_file(&args.input, &args.output_dir, args.rows)?;
    println!("Wrote {} files to {}", pieces.len(), args.output_dir.display());
    Ok(())
}

fn cmd_enrich(args: EnrichArgs) -> anyhow::Result<()> {
    let table = ZipTable::from_path(&args.zip_table)?;
    if table.is_empty() {
        bail!("ZIP code table {} has no entries", args.zip_table.display());
    }
    let output = args.output.unwrap_or_else(|| default_enriched_path(&args.input));

    let report = PostalEnricher::new(&table).enrich_file(&args.input, &output, &args.postal_column)?;
    println!("=== Postal Enrichment ===");
    println!("Rows read:      {}", report.rows_read);
    println!("Rows written:   {}", report.rows_written);
    println!("Rows dropped:   {} (postal code could not be normalized)", report.rows_dropped);
    println!("Unresolved:     {}", report.unresolved);
    println!("Lookup errors:  {}", report.lookup_errors);
    println!("Output:         {}", output.display());
    Ok(())
}

fn cmd_init_config(args: InitConfigArgs) -> anyhow::Result<()> {
    let path = match args.path.or_else(PartitionConfig::default_config_path) {
        Some(path) => path,
        None => bail!("Could not determine a configuration directory; pass --path"),
    };
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    PartitionConfig::default().save(&path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
