use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod adapters;
mod cli;
mod config;
mod error;
mod pipeline;
mod server;
mod store;

use adapters::Backends;
use cli::{Cli, Commands};
use config::Config;
use server::gate::GateState;
use server::AppState;
use store::ArtifactStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Secrets come from the environment; a local .env is a convenience.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "media_processor=debug,tower_http=debug"
    } else {
        "media_processor=info"
    };

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);

            let secret = config.shared_secret();
            if secret.is_none() {
                tracing::warn!(
                    "{} not set; every non-preflight request will be rejected",
                    config::SECRET_ENV
                );
            }

            let store = ArtifactStore::new(config.storage.root.clone())
                .context("Failed to open artifact store")?;
            let backends = Backends::from_config(&config);

            let state = AppState {
                store: Arc::new(store),
                backends,
                tempo_factor: config.tools.tempo_factor,
            };
            let router = server::build_router(
                state,
                GateState::new(secret),
                &config.server.cors_origins,
            );

            let addr = format!("{}:{}", host, port);
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind to {}", addr))?;

            tracing::info!("media-processor listening on {}", addr);
            axum::serve(listener, router).await?;
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                config.save()?;
                println!("Configuration written. Edit it and restart the server:");
                config.display();
            }
        }
    }

    Ok(())
}
