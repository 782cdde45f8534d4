//! Wire Schemas CLI
//!
//! Loads announcements from JSON, registers their shapes, exports the
//! scheme dependency graph and encodes announcements to the wire format.
//!
//! Usage:
//!   wire-schemas register chat.json users.json
//!   wire-schemas graph chat.json --output chat.dot
//!   wire-schemas encode chat.json --output chat.bin

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use wire_schemas::{Announcement, Encode, SchemaConfig, SchemeGraph, TypeRegistry};

#[derive(Parser)]
#[command(name = "wire-schemas")]
#[command(about = "Inspect schema announcements and the shapes they register")]
struct Cli {
    /// Configuration file layered over the default locations
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register every shape of the given announcements and list the ids
    Register {
        /// Announcement files (JSON)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Export the scheme dependency graph in DOT format
    Graph {
        /// Announcement files (JSON)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Encode an announcement to the binary wire format
    Encode {
        /// Announcement file (JSON)
        file: PathBuf,

        /// Output file (defaults to <file>.bin)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config {
        /// Write it to this file instead
        #[arg(long)]
        init: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn load_announcement(path: &Path) -> anyhow::Result<Announcement> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let announcement: Announcement = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse announcement in {}", path.display()))?;
    debug!(path = %path.display(), scheme = announcement.name(), "loaded announcement");
    Ok(announcement)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.as_deref().map(|p| p.to_string_lossy().into_owned());
    let config = SchemaConfig::load_from(config_path.as_deref())
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::Register { files } => {
            let mut registry = TypeRegistry::with_limits(config.wire);
            for file in &files {
                let announcement = load_announcement(file)?;
                let ids = registry
                    .register_announcement(&announcement)
                    .with_context(|| format!("Failed to register {}", file.display()))?;
                println!("📦 {} ({} shapes)", announcement.name(), ids.len());
            }

            println!();
            println!("{:<10} {:<20} {:<20} {:<14} SHAPE", "ID", "SCHEME", "OBJECT", "FINGERPRINT");
            for (id, scheme, object, shape) in registry.iter() {
                println!(
                    "{:<10} {:<20} {:<20} {:<14} {}",
                    id.to_string(),
                    scheme,
                    object,
                    shape.fingerprint().short(),
                    shape
                );
            }
        }

        Commands::Graph { files, output } => {
            let mut graph = SchemeGraph::new();
            for file in &files {
                let announcement = load_announcement(file)?;
                graph.merge(&announcement.graph());
            }

            eprintln!(
                "Graph loaded: {} schemes, {} edges",
                graph.scheme_count(),
                graph.edge_count()
            );
            for cycle in graph.cycles() {
                eprintln!("⚠️  Cycle: {}", cycle.join(" -> "));
            }

            let dot = graph.to_dot();
            match output {
                Some(path) => {
                    fs::write(&path, &dot)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    eprintln!("✅ Exported DOT to: {}", path.display());
                }
                None => print!("{}", dot),
            }
        }

        Commands::Encode { file, output } => {
            let announcement = load_announcement(&file)?;
            let bytes = announcement
                .to_wire_checked(config.wire.max_payload)
                .with_context(|| format!("Failed to encode {}", announcement.name()))?;
            let output = output.unwrap_or_else(|| file.with_extension("bin"));
            fs::write(&output, &bytes)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!(
                "✅ Encoded {} ({} bytes) to: {}",
                announcement.name(),
                bytes.len(),
                output.display()
            );
            println!("   Fingerprint: {}", announcement.fingerprint());
        }

        Commands::Config { init } => match init {
            Some(path) => {
                config
                    .save(&path.to_string_lossy())
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("✅ Wrote configuration to: {}", path.display());
            }
            None => print!("{}", toml::to_string_pretty(&config)?),
        },
    }

    Ok(())
}
