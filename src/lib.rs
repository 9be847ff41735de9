pub mod app;
pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::extract::FromRef;

use crate::config::Config;
use crate::database::store::{CredentialStore, Store};
use crate::models::user::User;
use crate::services::photo_service::PhotoService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub users: Arc<dyn Store<User>>,
    pub credentials: Arc<dyn CredentialStore>,
    pub photos: PhotoService,
}

impl AppState {
    pub fn new<S>(config: Config, store: Arc<S>) -> Self
    where
        S: Store<User> + CredentialStore + 'static,
    {
        let photos = PhotoService::new(config.photo_dir());
        Self {
            config: Arc::new(config),
            users: store.clone(),
            credentials: store,
            photos,
        }
    }
}

impl FromRef<AppState> for Arc<dyn Store<User>> {
    fn from_ref(state: &AppState) -> Self {
        state.users.clone()
    }
}
