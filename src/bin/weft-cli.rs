//! Weft CLI - render scriptlet documents from the command line
//!
//! Provides subcommands for rendering a document file and for inspecting how
//! the engine parses it.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use weft::adapters::register_builtin;
use weft::document::{Executable, ParsingConfig};
use weft::engine::{AdapterCatalog, ExecutionContext};
use weft::repository::{DocumentRepository, MemoryRepository};

#[derive(Parser)]
#[command(name = "weft")]
#[command(about = "Multi-language scriptlet-document engine", long_about = None)]
struct Cli {
    /// Default language tag when a document embeds none
    #[arg(short, long)]
    language: Option<String>,

    /// Prepare every program during compilation instead of lazily
    #[arg(long)]
    eager: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and execute a document, writing its output to stdout
    Render {
        /// Document file
        file: PathBuf,
    },

    /// Compile a document and describe its segments
    Inspect {
        /// Document file
        file: PathBuf,
    },

    /// List registered language adapters
    Languages,
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let catalog = AdapterCatalog::global();
    register_builtin(catalog);
    let registry = catalog.snapshot();

    match cli.command {
        Commands::Render { file } => {
            let (name, source, language) = load(&file, cli.language.as_deref(), &registry)?;
            let repository = Arc::new(MemoryRepository::new());
            let config = ParsingConfig::new(language).with_repository(repository as Arc<dyn DocumentRepository>);
            let config = if cli.eager {
                config.with_eager_preparation()
            } else {
                config
            };

            let executable = Executable::compile(&name, &source, &config, &registry)?;
            let context = ExecutionContext::new(std::io::stdout(), std::io::stderr());
            executable.execute(&context)?;
        }

        Commands::Inspect { file } => {
            let (name, source, language) = load(&file, cli.language.as_deref(), &registry)?;
            let config = ParsingConfig::new(language);
            let executable = Executable::compile(&name, &source, &config, &registry)?;

            println!("document: {}", executable.name());
            println!(
                "delimiters: {}",
                match (executable.start_delimiter(), executable.end_delimiter()) {
                    (Some(start), Some(end)) => format!("{start} {end}"),
                    _ => "none (pure literal)".to_string(),
                }
            );
            for segment in executable.segments() {
                let pos = segment.pos();
                match segment.language() {
                    Some(language) => println!(
                        "  {}:{} program[{}] {} ({} bytes)",
                        pos.line,
                        pos.column,
                        segment.position().unwrap_or_default(),
                        language,
                        segment.source().len()
                    ),
                    None => println!(
                        "  {}:{} literal ({} bytes)",
                        pos.line,
                        pos.column,
                        segment.source().len()
                    ),
                }
            }
        }

        Commands::Languages => {
            let mut tags = registry.list_tags();
            tags.sort();
            for tag in tags {
                println!("{tag}");
            }
        }
    }

    Ok(())
}

/// Read a document file and pick its default language: the explicit flag if
/// given, otherwise the adapter registered for the file extension.
fn load(
    file: &PathBuf,
    language: Option<&str>,
    registry: &weft::AdapterRegistry,
) -> anyhow::Result<(String, String, String)> {
    let source = std::fs::read_to_string(file)
        .with_context(|| format!("reading document {}", file.display()))?;
    let name = file
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());

    let language = match language {
        Some(language) => language.to_string(),
        None => {
            let extension = file.extension().map(|ext| ext.to_string_lossy().into_owned());
            extension
                .as_deref()
                .and_then(|ext| registry.by_extension(ext))
                .map(|adapter| adapter.tag().to_string())
                .unwrap_or_else(|| "echo".to_string())
        }
    };
    Ok((name, source, language))
}
