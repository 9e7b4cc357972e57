//! # User Synchronization
//!
//! Turns user event payloads into [`UserRecord`]s for the user store. A record
//! is a field-name to JSON-value map: the well-known fields below plus whatever
//! keys the provider's private metadata carries.

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::events::UserData;

pub const CLERK_USER_ID: &str = "ClerkUserId";
pub const EMAIL: &str = "Email";
pub const USERNAME: &str = "Username";
pub const FIRST_NAME: &str = "FirstName";
pub const LAST_NAME: &str = "LastName";
pub const IS_DEMO: &str = "IsDemo";
pub const IS_ADMIN: &str = "IsAdmin";
pub const IS_NEW_USER: &str = "IsNewUser";

/// Fields an update must never touch.
const IMMUTABLE_ON_UPDATE: [&str; 3] = [CLERK_USER_ID, EMAIL, USERNAME];

/// Subscription tier read from public metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionTier {
    Demo,
    Admin,
    Standard,
}

impl SubscriptionTier {
    /// Parses the tier string; unknown values map to `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "demo" => Some(Self::Demo),
            "admin" => Some(Self::Admin),
            "standard" => Some(Self::Standard),
            _ => None,
        }
    }

    /// The single record flag this tier sets.
    pub fn flag(self) -> &'static str {
        match self {
            Self::Demo => IS_DEMO,
            Self::Admin => IS_ADMIN,
            Self::Standard => IS_NEW_USER,
        }
    }
}

/// Field map handed to the user store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct UserRecord(Map<String, JsonValue>);

impl UserRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field, replacing any earlier value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<JsonValue> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merges `other` key-by-key; later values win.
    pub fn merge(&mut self, other: &Map<String, JsonValue>) {
        for (key, value) in other {
            self.0.insert(key.clone(), value.clone());
        }
    }

    fn insert_non_empty(&mut self, key: &str, value: Option<&str>) {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.insert(key, value);
        }
    }

    fn insert_subscription_flag(&mut self, user: &UserData) {
        if let Some(tier) = user
            .public_metadata
            .subscription_type
            .as_deref()
            .and_then(SubscriptionTier::parse)
        {
            self.insert(tier.flag(), true);
        }
    }
}

impl From<Map<String, JsonValue>> for UserRecord {
    fn from(map: Map<String, JsonValue>) -> Self {
        Self(map)
    }
}

impl IntoIterator for UserRecord {
    type Item = (String, JsonValue);
    type IntoIter = serde_json::map::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// A validated user payload: identity id and primary email are guaranteed present.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedUser<'a> {
    pub id: &'a str,
    pub email: &'a str,
    pub data: &'a UserData,
}

impl<'a> ValidatedUser<'a> {
    /// Returns `None` when the identity id or the email list is missing or empty.
    pub fn new(data: &'a UserData) -> Option<Self> {
        Some(Self {
            id: data.identity_id()?,
            email: data.primary_email()?,
            data,
        })
    }
}

/// Record for `create-user`.
///
/// Private metadata is applied first, so the identity id, email and names
/// written after it win over same-named metadata keys. This differs from
/// Clerk's sample handlers, which spread metadata last and let it override
/// `ClerkUserId` and `Email`.
pub fn build_create_record(user: &ValidatedUser<'_>) -> UserRecord {
    let mut record = UserRecord::new();
    record.merge(&user.data.private_metadata);
    record.insert(CLERK_USER_ID, user.id);
    record.insert(EMAIL, user.email);
    record.insert_non_empty(USERNAME, user.data.username.as_deref());
    record.insert_non_empty(FIRST_NAME, user.data.first_name.as_deref());
    record.insert_non_empty(LAST_NAME, user.data.last_name.as_deref());
    record.insert_subscription_flag(user.data);
    record
}

/// Partial record for `update-user`; never contains the identity id, email or username.
pub fn build_update_record(user: &ValidatedUser<'_>) -> UserRecord {
    let mut record = UserRecord::new();
    record.merge(&user.data.private_metadata);
    for key in IMMUTABLE_ON_UPDATE {
        record.remove(key);
    }
    record.insert_non_empty(FIRST_NAME, user.data.first_name.as_deref());
    record.insert_non_empty(LAST_NAME, user.data.last_name.as_deref());
    record.insert_subscription_flag(user.data);
    record
}
