use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::database::query::Field;
use crate::database::store::Resource;
use crate::dto::user_dto::{CreateUserPayload, UpdateUserPayload};

pub const DEFAULT_PHOTO: &str = "default.jpg";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub photo: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(skip_serializing)]
    pub password_changed_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// True when the password was changed after a token issued at `issued_at`
    /// (unix seconds).
    pub fn changed_password_after(&self, issued_at: i64) -> bool {
        self.password_changed_at
            .map(|changed| changed.timestamp() > issued_at)
            .unwrap_or(false)
    }
}

impl Resource for User {
    type Create = CreateUserPayload;
    type Update = UpdateUserPayload;

    const FIELDS: &'static [Field] = &[
        Field::new("name", "name", "text"),
        Field::new("email", "email", "text"),
        Field::new("role", "role", "text"),
        Field::new("active", "active", "boolean"),
        Field::new("photo", "photo", "text"),
        Field::new("createdAt", "created_at", "timestamptz"),
        Field::new("updatedAt", "updated_at", "timestamptz"),
    ];
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
