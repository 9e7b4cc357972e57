//! # User Repository
//!
//! SeaORM-backed implementation of the [`UserStore`] used by the webhook handler.
//! Well-known record fields map onto columns; every other key is kept in the
//! `metadata` JSON object.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, QueryFilter, RuntimeErr, Set, SqlErr,
};
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::user::{self, ActiveModel as UserActiveModel, Entity as User, Model as UserModel};
use crate::sync::{
    CLERK_USER_ID, EMAIL, FIRST_NAME, IS_ADMIN, IS_DEMO, IS_NEW_USER, LAST_NAME, USERNAME,
    UserRecord,
};

/// Errors surfaced by user store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("user {clerk_user_id} already exists")]
    AlreadyExists { clerk_user_id: String },

    #[error("user {clerk_user_id} not found")]
    NotFound { clerk_user_id: String },

    #[error("invalid value for field {field}: {reason}")]
    InvalidField { field: String, reason: &'static str },

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

/// Persistence seam for synchronized users.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a new user from a complete record.
    async fn create_user(&self, record: UserRecord) -> Result<UserModel, StoreError>;

    /// Applies a partial record to the user with the given identity id.
    async fn update_user(
        &self,
        clerk_user_id: &str,
        record: UserRecord,
    ) -> Result<UserModel, StoreError>;
}

/// Repository for user database operations
#[derive(Debug, Clone)]
pub struct UserRepository {
    db: Arc<DatabaseConnection>,
}

impl UserRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Finds a user by identity-provider id
    pub async fn find_by_clerk_user_id(
        &self,
        clerk_user_id: &str,
    ) -> Result<Option<UserModel>, StoreError> {
        let user = User::find()
            .filter(user::Column::ClerkUserId.eq(clerk_user_id))
            .one(&*self.db)
            .await?;
        Ok(user)
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn create_user(&self, record: UserRecord) -> Result<UserModel, StoreError> {
        let now = Utc::now().fixed_offset();
        let mut active = UserActiveModel {
            id: Set(Uuid::new_v4()),
            clerk_user_id: NotSet,
            email: NotSet,
            username: Set(None),
            first_name: Set(None),
            last_name: Set(None),
            is_demo: Set(false),
            is_admin: Set(false),
            is_new_user: Set(false),
            metadata: NotSet,
            created_at: Set(now),
            updated_at: Set(now),
        };

        let mut metadata = Map::new();
        for (key, value) in record {
            apply_field(&mut active, &mut metadata, key, value)?;
        }

        let clerk_user_id = match &active.clerk_user_id {
            sea_orm::ActiveValue::Set(id) => id.clone(),
            _ => return Err(required(CLERK_USER_ID)),
        };
        if active.email.is_not_set() {
            return Err(required(EMAIL));
        }
        active.metadata = Set(JsonValue::Object(metadata));

        let model = active.insert(&*self.db).await.map_err(|err| {
            if is_unique_violation(&err) {
                debug!(error = ?err, "Unique constraint violation detected");
                StoreError::AlreadyExists {
                    clerk_user_id: clerk_user_id.clone(),
                }
            } else {
                StoreError::Database(err)
            }
        })?;

        info!(user_id = %model.id, clerk_user_id = %model.clerk_user_id, "Created user");
        Ok(model)
    }

    async fn update_user(
        &self,
        clerk_user_id: &str,
        record: UserRecord,
    ) -> Result<UserModel, StoreError> {
        if record.contains_key(CLERK_USER_ID) {
            return Err(StoreError::InvalidField {
                field: CLERK_USER_ID.to_string(),
                reason: "identity id cannot be changed",
            });
        }

        let existing = self
            .find_by_clerk_user_id(clerk_user_id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                clerk_user_id: clerk_user_id.to_string(),
            })?;

        let mut metadata = existing.metadata.as_object().cloned().unwrap_or_default();
        let mut active = existing.into_active_model();

        for (key, value) in record {
            apply_field(&mut active, &mut metadata, key, value)?;
        }
        active.metadata = Set(JsonValue::Object(metadata));
        active.updated_at = Set(Utc::now().fixed_offset());

        let model = active.update(&*self.db).await?;

        info!(user_id = %model.id, clerk_user_id = %model.clerk_user_id, "Updated user");
        Ok(model)
    }
}

fn apply_field(
    active: &mut UserActiveModel,
    metadata: &mut Map<String, JsonValue>,
    key: String,
    value: JsonValue,
) -> Result<(), StoreError> {
    match key.as_str() {
        CLERK_USER_ID => active.clerk_user_id = Set(required_string(&key, value)?),
        EMAIL => active.email = Set(required_string(&key, value)?),
        USERNAME => active.username = Set(optional_string(&key, value)?),
        FIRST_NAME => active.first_name = Set(optional_string(&key, value)?),
        LAST_NAME => active.last_name = Set(optional_string(&key, value)?),
        IS_DEMO => active.is_demo = Set(boolean(&key, value)?),
        IS_ADMIN => active.is_admin = Set(boolean(&key, value)?),
        IS_NEW_USER => active.is_new_user = Set(boolean(&key, value)?),
        _ => {
            metadata.insert(key, value);
        }
    }
    Ok(())
}

fn required(field: &str) -> StoreError {
    StoreError::InvalidField {
        field: field.to_string(),
        reason: "required",
    }
}

fn required_string(field: &str, value: JsonValue) -> Result<String, StoreError> {
    match value {
        JsonValue::String(s) if !s.is_empty() => Ok(s),
        _ => Err(StoreError::InvalidField {
            field: field.to_string(),
            reason: "expected a non-empty string",
        }),
    }
}

fn optional_string(field: &str, value: JsonValue) -> Result<Option<String>, StoreError> {
    match value {
        JsonValue::Null => Ok(None),
        JsonValue::String(s) => Ok(Some(s)),
        _ => Err(StoreError::InvalidField {
            field: field.to_string(),
            reason: "expected a string or null",
        }),
    }
}

fn boolean(field: &str, value: JsonValue) -> Result<bool, StoreError> {
    value.as_bool().ok_or_else(|| StoreError::InvalidField {
        field: field.to_string(),
        reason: "expected a boolean",
    })
}

fn is_unique_violation(error: &DbErr) -> bool {
    const PG_UNIQUE: &str = "23505";
    const MYSQL_DUPLICATE_CODES: &[&str] = &["1022", "1062", "1169", "1586"];
    const SQLITE_DUPLICATE_CODES: &[&str] = &["1555", "2067"];

    if matches!(error.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        return true;
    }

    let runtime_err = match error {
        DbErr::Query(RuntimeErr::SqlxError(sqlx_err)) | DbErr::Exec(RuntimeErr::SqlxError(sqlx_err)) => {
            sqlx_err
        }
        _ => return false,
    };
    let Some(db_error) = runtime_err.as_database_error() else {
        return false;
    };

    db_error.is_unique_violation()
        || db_error.code().is_some_and(|code| {
            let code: &str = code.as_ref();
            code == PG_UNIQUE
                || MYSQL_DUPLICATE_CODES.contains(&code)
                || SQLITE_DUPLICATE_CODES.contains(&code)
        })
}
