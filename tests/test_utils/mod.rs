//! Test utilities for database and webhook testing.
//!
//! Provides an in-memory SQLite database with migrations applied and helpers
//! for building signed webhook deliveries.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use axum::{Router, body::Body, http::Request};
use clerk_sync::{
    config::AppConfig,
    repositories::UserRepository,
    server::{AppState, create_app},
    webhook_verification::WebhookVerifier,
};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use serde_json::Value;

pub const SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Builds the full router over a real user repository, without an identity client.
pub fn app_with_db(db: DatabaseConnection) -> (Router, Arc<WebhookVerifier>) {
    let verifier = Arc::new(WebhookVerifier::new(SECRET, 300).expect("test secret is valid"));
    let state = AppState {
        config: Arc::new(AppConfig {
            webhook_secret: Some(SECRET.to_string()),
            ..AppConfig::default()
        }),
        users: Arc::new(UserRepository::new(Arc::new(db.clone()))),
        db,
        verifier: verifier.clone(),
        identity: None,
    };
    (create_app(state), verifier)
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch")
        .as_secs()
}

/// A POST to the webhook route signed the way svix signs deliveries.
pub fn signed_webhook(verifier: &WebhookVerifier, msg_id: &str, body: &Value) -> Request<Body> {
    let body = body.to_string();
    let timestamp = unix_now();
    let signature = verifier.sign(msg_id, timestamp, body.as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/webhooks/clerk")
        .header("content-type", "application/json")
        .header("svix-id", msg_id)
        .header("svix-timestamp", timestamp.to_string())
        .header("svix-signature", signature)
        .body(Body::from(body))
        .expect("valid request")
}
