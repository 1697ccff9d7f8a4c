use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use park_persist::container::ChunkEntry;
use park_persist::migrate::GATES;
use park_persist::{
    CompatibilityPolicy, Compression, ContainerHeader, ContainerReader, InMemoryRepository, LoadOptions, SaveOptions,
};

#[derive(Parser)]
#[command(name = "park-inspect")]
#[command(about = "Inspect, verify and upgrade park save files")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Refuse files older than this version
    #[arg(long)]
    min_version: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the header and chunk directory
    Info { file: PathBuf },
    /// Load the file through the full pipeline and print the load report
    Verify {
        file: PathBuf,
        /// Fail if anything had to be dropped
        #[arg(long)]
        strict: bool,
    },
    /// Load an old file and write it back at the current version
    Upgrade {
        input: PathBuf,
        output: PathBuf,
        #[arg(long, value_enum, default_value = "zstd")]
        compression: CompressionArg,
    },
    /// List the version gates
    Gates,
}

#[derive(Clone, Copy, ValueEnum)]
enum CompressionArg {
    None,
    Zlib,
    Zstd,
}

impl From<CompressionArg> for Compression {
    fn from(arg: CompressionArg) -> Self {
        match arg {
            CompressionArg::None => Compression::None,
            CompressionArg::Zlib => Compression::Zlib,
            CompressionArg::Zstd => Compression::Zstd,
        }
    }
}

#[derive(Serialize)]
struct FileInfo<'a> {
    header: &'a ContainerHeader,
    chunks: Vec<ChunkSummary>,
}

#[derive(Serialize)]
struct ChunkSummary {
    name: &'static str,
    #[serde(flatten)]
    entry: ChunkEntry,
}

#[derive(Serialize)]
struct GateSummary {
    version: u32,
    name: &'static str,
    description: &'static str,
    transform: bool,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    let policy = match cli.min_version {
        Some(min) => CompatibilityPolicy::with_floor(min)?,
        None => CompatibilityPolicy::default(),
    };
    let repository = InMemoryRepository::with_builtins();

    match cli.command {
        Commands::Info { file } => {
            let bytes = std::fs::read(&file)?;
            let container = ContainerReader::open(&bytes, &policy)?;
            let chunks = container
                .directory()
                .iter()
                .map(|entry| ChunkSummary { name: entry.id.name(), entry: *entry })
                .collect();
            print_json(&FileInfo { header: container.header(), chunks })?;
        }
        Commands::Verify { file, strict } => {
            let loaded = park_persist::load(&file, &repository, &LoadOptions { policy, strict })?;
            print_json(&loaded.report)?;
        }
        Commands::Upgrade { input, output, compression } => {
            let loaded = park_persist::load(&input, &repository, &LoadOptions { policy, strict: false })?;

            // Only builtin terrain is known here; anything else the file did not
            // embed is logged and left out
            let options = SaveOptions {
                compression: compression.into(),
                preview: loaded.preview,
                packed_objects: loaded.packed_objects,
                allow_unresolved: true,
                ..Default::default()
            };
            park_persist::save(&output, &loaded.park, &repository, &options)?;
            eprintln!(
                "Upgraded {} (version {}) -> {} (version {})",
                input.display(),
                loaded.report.original_version,
                output.display(),
                park_persist::CURRENT_VERSION
            );
        }
        Commands::Gates => {
            let gates: Vec<_> = GATES
                .iter()
                .map(|g| GateSummary {
                    version: g.version,
                    name: g.name,
                    description: g.description,
                    transform: g.transform.is_some(),
                })
                .collect();
            print_json(&gates)?;
        }
    }

    Ok(())
}
