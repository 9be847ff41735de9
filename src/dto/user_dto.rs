use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::user::Role;

/// Fields a caller may change on their own profile. `photo` is added by the
/// upload step, never taken from the body.
pub const UPDATE_ME_FIELDS: &[&str] = &["name", "email"];

/// Keys that must never reach the self-service update.
pub const PASSWORD_FIELDS: &[&str] = &["password", "passwordConfirm"];

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserPayload {
    #[validate(length(min = 1, max = 80, message = "A user must have a name"))]
    pub name: String,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords are not the same!"))]
    pub password_confirm: String,
    pub role: Option<Role>,
    pub photo: Option<String>,
}

/// Partial update. Passwords are changed only through `/updateMyPassword`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserPayload {
    #[validate(length(min = 1, max = 80, message = "A user must have a name"))]
    pub name: Option<String>,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: Option<String>,
    #[validate(length(min = 1, message = "Photo filename cannot be empty"))]
    pub photo: Option<String>,
    pub role: Option<Role>,
    pub active: Option<bool>,
}

impl UpdateUserPayload {
    pub fn deactivate() -> Self {
        Self {
            active: Some(false),
            ..Self::default()
        }
    }
}
