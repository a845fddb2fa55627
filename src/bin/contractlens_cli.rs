use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use contractlens::{
    analysis::OpenAiClient,
    config,
    extraction::{DocumentExtractor, MediaType, TextExtractor},
    logging,
    pipeline::{ContractPipeline, UploadedDocument},
};
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "contractlens-cli",
    about = "Run the contract analysis pipeline on local files"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the text extracted from a PDF or image.
    Extract {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        media_type: Option<String>,
        /// Tesseract executable; falls back to `TESSERACT_BIN`, then `tesseract` on `PATH`.
        #[arg(long, env = "TESSERACT_BIN", default_value = "tesseract")]
        tesseract_bin: String,
    },
    /// Print a plain-language risk analysis of a contract.
    Analyze {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        media_type: Option<String>,
    },
    /// Classify clause text from a file into safe and risky clauses.
    Classify {
        #[arg(long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    logging::init_cli_tracing();
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Extract {
            file,
            media_type,
            tesseract_bin,
        } => {
            let media_type = resolve_media_type(&file, media_type.as_deref())?;
            let text = DocumentExtractor::new(tesseract_bin)
                .extract(&file, &media_type)
                .await?;
            println!("{text}");
        }
        Command::Analyze { file, media_type } => {
            let declared = resolve_media_type(&file, media_type.as_deref())?.to_string();
            let pipeline_config = config::load_config()?;
            let pipeline = build_pipeline(&pipeline_config)?;

            // The pipeline deletes its input, so it gets a private copy.
            tokio::fs::create_dir_all(&pipeline_config.upload_dir).await?;
            let copy = pipeline_config.upload_dir.join(Uuid::new_v4().to_string());
            let size_bytes = tokio::fs::copy(&file, &copy)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let document = UploadedDocument {
                temporary_path: copy,
                declared_media_type: declared,
                size_bytes,
                original_name: file
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            };
            println!("{}", pipeline.analyze(document).await?);
        }
        Command::Classify { file } => {
            let clauses = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let pipeline = build_pipeline(&config::load_config()?)?;
            let summary = pipeline.classify(&clauses).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    Ok(())
}

fn build_pipeline(config: &config::Config) -> Result<ContractPipeline> {
    Ok(ContractPipeline::new(
        Arc::new(DocumentExtractor::new(config.tesseract_bin.clone())),
        Arc::new(OpenAiClient::new(config)?),
    ))
}

fn resolve_media_type(file: &Path, declared: Option<&str>) -> Result<MediaType> {
    match declared {
        Some(value) => {
            MediaType::parse(value).ok_or_else(|| anyhow!("unsupported media type '{value}'"))
        }
        None => MediaType::from_extension(file).ok_or_else(|| {
            anyhow!(
                "cannot infer media type of {}; pass --media-type",
                file.display()
            )
        }),
    }
}
