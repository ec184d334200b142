//! answerdesk - CLI entry point

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use answerdesk::cli::{Args, Commands};
use answerdesk::config::Config;
use answerdesk::ingest::UploadRequest;
use answerdesk::service::{ChatRequest, DeskService};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_filter())),
        )
        .with_target(false)
        .init();

    let config = Config::load()?;

    if let Commands::Config = args.command {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let service = DeskService::from_config(&config)?;

    match args.command {
        Commands::Upload { file, category } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let filename = file
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("upload.txt")
                .to_string();

            let receipt = service
                .upload(UploadRequest {
                    owner_id: args.owner,
                    category,
                    filename,
                    bytes,
                    chunking: None,
                })
                .await?;

            println!(
                "Uploaded {} ({} chunks) into '{}'",
                receipt.document_id, receipt.chunk_count, receipt.category
            );
        }

        Commands::Ask {
            question,
            session,
            reset,
        } => {
            let response = service
                .chat(ChatRequest {
                    owner_id: args.owner,
                    session_id: session,
                    message: question,
                    reset,
                })
                .await?;

            println!("{}", response.answer);
            if let Some(category) = &response.routed_category {
                println!("\n[category: {}]", category);
            }
            if !response.citations.is_empty() {
                println!("[citations]");
                for citation in &response.citations {
                    println!("  {}", citation.chunk_id);
                }
            }
            if !response.tools_invoked.is_empty() {
                println!("[tools: {}]", response.tools_invoked.join(", "));
            }
            println!("[session: {}]", response.session_id);
        }

        Commands::Documents => {
            let documents = service.documents(&args.owner).await;
            if documents.is_empty() {
                println!("No documents uploaded.");
            }
            for doc in documents {
                println!(
                    "{}  {}  [{}]  {} chunks  {} bytes",
                    doc.id,
                    doc.filename,
                    doc.category,
                    doc.chunk_ids.len(),
                    doc.byte_size
                );
            }
        }

        Commands::Categories => {
            for category in service.categories(&args.owner).await {
                println!("{}", category);
            }
        }

        Commands::Delete { document_id } => {
            service.delete_document(&args.owner, &document_id).await?;
            println!("Deleted {}", document_id);
        }

        Commands::Reset { session_id } => {
            let removed = service.reset_session(&session_id).await?;
            println!("Cleared {} messages from session {}", removed, session_id);
        }

        Commands::Config => unreachable!("handled above"),
    }

    Ok(())
}
