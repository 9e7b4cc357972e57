//! # clerk-sync Main Entry Point

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use clerk_sync::{
    config::ConfigLoader,
    db,
    identity::{ClerkClient, IdentityProvider},
    migration::{Migrator, MigratorTrait},
    repositories::UserRepository,
    server::{AppState, run_server},
    telemetry,
    webhook_verification::WebhookVerifier,
};

/// Clerk webhook receiver that keeps the local users table in sync.
#[derive(Parser, Debug)]
#[command(name = "clerk-sync", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending migrations, then serve HTTP (default)
    Serve,
    /// Apply pending migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new()
        .load()
        .context("loading configuration")?;
    telemetry::init_tracing(&config).context("initializing telemetry")?;

    match config.redacted_json() {
        Ok(redacted) => tracing::info!(profile = %config.profile, config = %redacted, "Loaded configuration"),
        Err(err) => tracing::warn!(error = %err, "Failed to render configuration"),
    }

    // Fail fast on an undecodable secret before touching the database.
    let verifier = WebhookVerifier::new(
        config.require_webhook_secret()?,
        config.webhook_tolerance_seconds,
    )
    .context("initializing webhook verifier")?;

    let db = db::init_pool(&config)
        .await
        .context("initializing database connection pool")?;
    Migrator::up(&db, None)
        .await
        .context("applying database migrations")?;
    tracing::info!("Database migrations applied");

    if matches!(cli.command, Some(Command::Migrate)) {
        return Ok(());
    }

    let identity = ClerkClient::from_config(&config)
        .context("initializing identity provider client")?
        .map(|client| Arc::new(client) as Arc<dyn IdentityProvider>);
    if identity.is_none() {
        tracing::warn!("CLERK_SECRET_KEY not set; session lookups are disabled");
    }

    let state = AppState {
        users: Arc::new(UserRepository::new(Arc::new(db.clone()))),
        config: Arc::new(config),
        db,
        verifier: Arc::new(verifier),
        identity,
    };

    run_server(state).await
}
