//! # Webhook Events
//!
//! Clerk wraps every notification in an envelope of the form
//! `{"object": "event", "type": "user.created", "data": {...}}`. The envelope is
//! decoded first and `data` is only interpreted once the type is known, so
//! notifications this service does not handle never fail to decode.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

pub const USER_CREATED: &str = "user.created";
pub const USER_UPDATED: &str = "user.updated";
pub const SESSION_CREATED: &str = "session.created";

/// Raw webhook envelope as delivered by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
}

/// A decoded webhook event.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    UserCreated(UserData),
    UserUpdated(UserData),
    SessionCreated(SessionData),
    /// Any event type without a handler, kept by name for logging.
    Unhandled(String),
}

impl WebhookEvent {
    /// Interprets the envelope's `data` according to its `type`.
    pub fn from_envelope(envelope: WebhookEnvelope) -> serde_json::Result<Self> {
        let event = match envelope.event_type.as_str() {
            USER_CREATED => Self::UserCreated(serde_json::from_value(envelope.data)?),
            USER_UPDATED => Self::UserUpdated(serde_json::from_value(envelope.data)?),
            SESSION_CREATED => Self::SessionCreated(serde_json::from_value(envelope.data)?),
            _ => Self::Unhandled(envelope.event_type),
        };
        Ok(event)
    }

    /// Decodes a raw request body.
    pub fn from_slice(body: &[u8]) -> serde_json::Result<Self> {
        Self::from_envelope(serde_json::from_slice(body)?)
    }

    pub fn event_type(&self) -> &str {
        match self {
            Self::UserCreated(_) => USER_CREATED,
            Self::UserUpdated(_) => USER_UPDATED,
            Self::SessionCreated(_) => SESSION_CREATED,
            Self::Unhandled(event_type) => event_type,
        }
    }
}

/// User payload carried by `user.created` and `user.updated`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserData {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub email_addresses: Option<Vec<EmailAddress>>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty_map")]
    pub private_metadata: Map<String, JsonValue>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub public_metadata: PublicMetadata,
}

impl UserData {
    /// The identity id, if present and non-empty.
    pub fn identity_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// The first listed email address, which is what gets stored as the user's email.
    pub fn primary_email(&self) -> Option<&str> {
        self.email_addresses
            .as_ref()
            .and_then(|addresses| addresses.first())
            .map(|address| address.email_address.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailAddress {
    #[serde(default)]
    pub id: Option<String>,
    pub email_address: String,
}

/// Provider-visible metadata; only the subscription tier is interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublicMetadata {
    #[serde(default, rename = "subscriptionType")]
    pub subscription_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// Session payload carried by `session.created`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl SessionData {
    pub fn session_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}

fn null_as_empty_map<'de, D>(deserializer: D) -> Result<Map<String, JsonValue>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Map<String, JsonValue>>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_default<'de, D>(deserializer: D) -> Result<PublicMetadata, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<PublicMetadata>::deserialize(deserializer)?.unwrap_or_default())
}
