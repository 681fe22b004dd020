use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use docsearch::input::{read_documents, read_index_body};
use docsearch::logging::init_tracing;
use docsearch::{AppError, Dependencies, Settings};

#[derive(Parser)]
#[command(name = "docsearch")]
#[command(about = "Manage indexes and bulk load documents into a search engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Run against an in-memory engine instead of the configured endpoint
    #[arg(long, global = true)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an index
    CreateIndex {
        index: String,
        /// JSON file with the index mappings or full creation body
        #[arg(long)]
        mapping: Option<PathBuf>,
    },
    /// Delete an index
    DeleteIndex { index: String },
    /// Bulk load a newline-delimited JSON file
    Ingest {
        index: String,
        file: PathBuf,
        /// Create the index first if it does not exist
        #[arg(long)]
        create_index: bool,
    },
    /// Print the number of documents in an index
    Count { index: String },
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            process::exit(2);
        }
    };

    let deps = if cli.dry_run {
        Dependencies::in_memory(&settings)
    } else {
        match Dependencies::connect(&settings).await {
            Ok(deps) => deps,
            Err(e) => {
                error!(error = %e, "Failed to connect to search engine");
                process::exit(1);
            }
        }
    };

    if let Err(e) = run(cli.command, &deps).await {
        error!(error = %e, "Command failed");
        process::exit(1);
    }
}

async fn run(command: Commands, deps: &Dependencies) -> Result<(), AppError> {
    match command {
        Commands::CreateIndex { index, mapping } => {
            let body = read_index_body(mapping.as_deref()).await?;
            let ack = deps.indexes.create_index(&index, &body).await?;
            info!(index = %index, acknowledged = ack.acknowledged, "Index created");
        }
        Commands::DeleteIndex { index } => {
            let ack = deps.indexes.delete_index(&index).await?;
            info!(index = %index, acknowledged = ack.acknowledged, "Index deleted");
        }
        Commands::Ingest {
            index,
            file,
            create_index,
        } => {
            if create_index {
                let body = read_index_body(None).await?;
                deps.indexes.ensure_index(&index, &body).await?;
            }

            let documents = read_documents(&file).await?;
            info!(index = %index, file = %file.display(), documents = documents.len(), "Loaded documents");

            let summary = deps.ingestor.bulk_ingest(&index, documents).await?;
            let elapsed = summary.finished_at - summary.started_at;
            info!(
                index = %summary.index,
                documents = summary.documents,
                batches = summary.stats.batches_flushed,
                succeeded = summary.stats.items_succeeded,
                failed = summary.stats.items_failed,
                without_result = summary.stats.batches_without_result,
                elapsed_ms = elapsed.num_milliseconds(),
                "Ingestion finished"
            );
        }
        Commands::Count { index } => {
            let count = deps.indexes.count(&index).await?;
            println!("{}", count);
        }
    }
    Ok(())
}
