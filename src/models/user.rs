//! User entity model
//!
//! This module contains the SeaORM entity model for the users table,
//! which mirrors identity-provider users into the local database.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Locally synchronized user
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Local identifier (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Identity-provider user id; written once on insert
    #[sea_orm(unique)]
    pub clerk_user_id: String,

    /// Primary email address at creation time
    pub email: String,

    pub username: Option<String>,

    pub first_name: Option<String>,

    pub last_name: Option<String>,

    /// Set for the `demo` subscription tier
    pub is_demo: bool,

    /// Set for the `admin` subscription tier
    pub is_admin: bool,

    /// Set for the `standard` subscription tier
    pub is_new_user: bool,

    /// Private-metadata entries without a dedicated column (JSON object)
    #[sea_orm(column_type = "Json")]
    pub metadata: JsonValue,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
