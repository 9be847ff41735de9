use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::database::query::{Field, ListQuery};
use crate::error::Result;
use crate::models::user::User;

/// A persisted collection the generic CRUD handlers can serve.
pub trait Resource: Serialize + Clone + Send + Sync + 'static {
    type Create: DeserializeOwned + Validate + Send + 'static;
    type Update: DeserializeOwned + Validate + Send + 'static;

    /// Fields list endpoints may filter, sort and project on.
    const FIELDS: &'static [Field];
}

/// Persistence capabilities for one resource. Absent records are reported as
/// `Ok(None)` / `Ok(false)`; the handlers decide how that maps to HTTP.
#[async_trait]
pub trait Store<R: Resource>: Send + Sync {
    async fn find_all(&self, query: &ListQuery) -> Result<Vec<R>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<R>>;

    async fn create(&self, input: R::Create) -> Result<R>;

    async fn update_by_id(&self, id: Uuid, changes: R::Update) -> Result<Option<R>>;

    async fn delete_by_id(&self, id: Uuid) -> Result<bool>;
}

/// User-only lookups needed by authentication.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Replaces the password hash and stamps `password_changed_at`.
    async fn set_password(&self, id: Uuid, password_hash: String) -> Result<Option<User>>;
}
