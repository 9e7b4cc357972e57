//! # Webhook Handlers
//!
//! Receives Clerk notifications, verifies their svix signature against the raw
//! body and synchronizes users into the local store.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use metrics::counter;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::error::{ValidationKind, WebhookError};
use crate::events::{SessionData, UserData, WebhookEvent};
use crate::server::AppState;
use crate::sync::{ValidatedUser, build_create_record, build_update_record};
use crate::webhook_verification::SvixHeaders;

/// Clerk webhook endpoint
#[utoipa::path(
    post,
    path = "/api/webhooks/clerk",
    params(
        ("svix-id" = String, Header, description = "Unique message id"),
        ("svix-timestamp" = String, Header, description = "Unix timestamp (seconds) of the delivery attempt"),
        ("svix-signature" = String, Header, description = "Space-separated list of `v1,<base64>` signatures")
    ),
    request_body(content = JsonValue, description = "Clerk event envelope", content_type = "application/json"),
    responses(
        (status = 200, description = "Event processed or ignored"),
        (status = 400, description = "Missing svix headers, invalid signature or missing data", body = String, content_type = "text/plain"),
        (status = 500, description = "User store or identity provider failure", body = String, content_type = "text/plain")
    ),
    tag = "webhooks"
)]
pub async fn clerk_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, WebhookError> {
    let svix = SvixHeaders::from_headers(&headers)?;
    state.verifier.verify(&svix, &body)?;

    let event = WebhookEvent::from_slice(&body).map_err(|err| {
        WebhookError::validation(ValidationKind::InvalidPayload, err.to_string())
    })?;

    let event_type = event.event_type().to_string();
    counter!("clerk_webhook_events_total", "event_type" => event_type.clone()).increment(1);
    info!(
        msg_id = %svix.id,
        event_type = %event_type,
        payload = %String::from_utf8_lossy(&body),
        "Received webhook"
    );

    match event {
        WebhookEvent::UserCreated(data) => handle_user_created(&state, &data).await?,
        WebhookEvent::UserUpdated(data) => handle_user_updated(&state, &data).await?,
        WebhookEvent::SessionCreated(data) => handle_session_created(&state, &data).await?,
        WebhookEvent::Unhandled(event_type) => {
            debug!(%event_type, "Ignoring unhandled event type");
        }
    }

    Ok(StatusCode::OK)
}

fn validated(data: &UserData) -> Result<ValidatedUser<'_>, WebhookError> {
    ValidatedUser::new(data).ok_or_else(|| {
        WebhookError::validation(
            ValidationKind::MissingData,
            "user event without id or email address",
        )
    })
}

async fn handle_user_created(state: &AppState, data: &UserData) -> Result<(), WebhookError> {
    let user = validated(data)?;
    let record = build_create_record(&user);
    info!(?record, ?data, "Creating user");

    state.users.create_user(record).await?;
    Ok(())
}

async fn handle_user_updated(state: &AppState, data: &UserData) -> Result<(), WebhookError> {
    let user = validated(data)?;
    let record = build_update_record(&user);
    info!(?record, ?data, "Updating user");

    state.users.update_user(user.id, record).await?;
    Ok(())
}

async fn handle_session_created(state: &AppState, data: &SessionData) -> Result<(), WebhookError> {
    let session_id = data.session_id().ok_or_else(|| {
        WebhookError::validation(ValidationKind::MissingData, "session event without id")
    })?;

    let Some(identity) = state.identity.as_ref() else {
        warn!(%session_id, "No identity provider secret key configured; skipping session lookup");
        return Ok(());
    };

    let session = identity.get_session(session_id).await?;
    info!(?session, "Fetched session");
    Ok(())
}
