use clap::{Parser, Subcommand};
use cli::{RunConfig, read_associations, write_associations};
use color_eyre::eyre::{Result, WrapErr};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{self, EnvFilter};

use alttext::{AltTextCommand, AltTextManager, Document, Pipeline};
use engines::build_engine_set;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate alt-text for an HTML or EPUB file
    Generate {
        /// Path to the input .html/.xhtml/.epub file
        #[arg(short, long)]
        input: PathBuf,
        /// Write the remediated document here
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Run configuration (.toml or .json)
        #[arg(short, long, env = "ALTTEXT_CONFIG")]
        config: Option<PathBuf>,
        /// JSON object of option overrides, e.g. '{"version": 1}'
        #[arg(long)]
        options: Option<String>,
        /// Regenerate every image, not only those missing a description
        #[arg(long)]
        all: bool,
        /// Save the generated associations as JSON for review
        #[arg(long)]
        associations: Option<PathBuf>,
        /// Ingest the document into the language engine before generating
        #[arg(long)]
        ingest: bool,
    },
    /// List images that have no usable alt-text
    Missing {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Apply reviewed associations to a document
    Apply {
        #[arg(short, long)]
        input: PathBuf,
        /// JSON array of {src, alt} associations
        #[arg(short, long)]
        associations: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print the JSON schema of the run configuration or of session commands
    Schema {
        #[arg(long)]
        commands: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Generate {
            input,
            output,
            config,
            options,
            all,
            associations,
            ingest,
        } => {
            generate(GenerateArgs {
                input,
                output: output.as_deref(),
                config: config.as_deref(),
                options: options.as_deref(),
                all: *all,
                associations: associations.as_deref(),
                ingest: *ingest,
            })
            .await?;
        }
        Commands::Missing { input } => {
            let document = alttext::open(input)
                .wrap_err_with(|| format!("Failed to open {}", input.display()))?;
            let missing = document.missing_description_images();
            info!(count = missing.len(), "Images missing alt-text");
            println!("{}", serde_json::to_string_pretty(&missing)?);
        }
        Commands::Apply {
            input,
            associations,
            output,
        } => {
            let mut document = alttext::open(input)
                .wrap_err_with(|| format!("Failed to open {}", input.display()))?;
            let associations = read_associations(associations)?;
            let updated = document.set_descriptions(&associations)?;
            document.export_to_file(output)?;
            info!(updated = updated.len(), output = %output.display(), "Applied associations");
        }
        Commands::Schema { commands } => {
            let schema = if *commands {
                serde_json::to_string_pretty(&AltTextCommand::schema())?
            } else {
                serde_json::to_string_pretty(&RunConfig::schema())?
            };
            println!("{}", schema);
        }
    }

    Ok(())
}

struct GenerateArgs<'a> {
    input: &'a Path,
    output: Option<&'a Path>,
    config: Option<&'a Path>,
    options: Option<&'a str>,
    all: bool,
    associations: Option<&'a Path>,
    ingest: bool,
}

async fn generate(args: GenerateArgs<'_>) -> Result<()> {
    let mut config = match args.config {
        Some(path) => RunConfig::from_file(path)
            .wrap_err_with(|| format!("Failed to load config {}", path.display()))?,
        None => RunConfig::default(),
    };
    if let Some(overrides) = args.options {
        config = config.with_option_overrides(overrides)?;
    }

    let engines = build_engine_set(&config.engines)?;
    let pipeline = Pipeline::new(engines, config.options)?;
    info!("{}", pipeline.info());

    let mut manager = AltTextManager::new(pipeline);
    manager.parse_file(args.input)?;

    if args.ingest {
        manager.ingest().await?;
    }

    let command = if args.all {
        AltTextCommand::GenerateAll
    } else {
        AltTextCommand::GenerateMissing
    };
    let generated = manager.execute(command).await;

    if args.ingest {
        if let Err(e) = manager.degest().await {
            warn!(error = %e, "Failed to remove document from the language engine");
        }
    }
    let associations = generated?;

    match args.associations {
        Some(path) => {
            write_associations(path, &associations)?;
            info!(path = %path.display(), count = associations.len(), "Saved associations");
        }
        None if args.output.is_none() => {
            println!("{}", serde_json::to_string_pretty(&associations)?);
        }
        None => {}
    }

    if let Some(output) = args.output {
        manager.apply(&associations)?;
        manager.export_to_file(output)?;
        info!(output = %output.display(), updated = associations.len(), "Wrote remediated document");
    }

    Ok(())
}
