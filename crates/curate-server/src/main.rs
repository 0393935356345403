use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use curate_core::ContentType;
use curate_logging::CurateSubscriberBuilder;
use curate_server::config::{Cli, Command};
use curate_server::state::{open_blobs, open_documents};
use curate_server::{AppState, ServerConfig, StorageBackend, collect_garbage, router};
use curate_sync::SchemaRegistry;
use tracing::info;

fn load_config(path: Option<&Path>) -> anyhow::Result<ServerConfig> {
    match path {
        Some(path) => Ok(ServerConfig::load(path)?),
        None => Ok(ServerConfig::default()),
    }
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    let bind = config.bind.clone();

    let state = AppState::open(config).await?;
    info!(bind = %bind, "Curate server listening");

    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    state.live.stop();
    info!("Curate server stopped");
    Ok(())
}

async fn gc_blobs(config: ServerConfig, dry_run: bool) -> anyhow::Result<()> {
    if config.storage == StorageBackend::Memory {
        bail!("gc-blobs needs a persistent document store; set storage = \"redb\"");
    }

    let documents = open_documents(&config)?;
    let blobs = Arc::new(open_blobs(&config).await?);
    let result = collect_garbage(documents, blobs, dry_run).await?;

    let verb = if dry_run { "Would delete" } else { "Deleted" };
    for path in &result.deleted_paths {
        println!("{verb} {path}");
    }
    println!(
        "{verb} {} blob(s), {} bytes; {} retained",
        result.deleted_count, result.bytes_freed, result.retained_count
    );
    Ok(())
}

fn print_types() {
    let registry = SchemaRegistry::builtin();
    for content_type in ContentType::ALL {
        println!("{} ({})", content_type.display_label(), content_type.collection());
        match registry.declared(content_type) {
            Some(fields) => {
                for field in fields {
                    println!("  {:<16} {:<20} {:?}", field.name, field.label, field.kind);
                }
            }
            None => println!("  (fields discovered from stored records)"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { config, bind } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(bind) = bind {
                config = config.with_bind(bind);
            }
            let _guard = CurateSubscriberBuilder::new()
                .with_config(config.logging.clone())
                .init();
            serve(config).await
        }
        Command::GcBlobs { config, dry_run } => {
            let config = load_config(config.as_deref())?;
            let _guard = CurateSubscriberBuilder::new()
                .with_config(config.logging.clone())
                .init();
            gc_blobs(config, dry_run).await
        }
        Command::Types => {
            print_types();
            Ok(())
        }
    }
}
