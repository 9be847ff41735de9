#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use account_backend::{
    app::build_app,
    config::{Config, Environment},
    database::{
        query::{FilterOp, ListQuery},
        store::{CredentialStore, Store},
    },
    dto::user_dto::{CreateUserPayload, UpdateUserPayload},
    error::{Error, Result},
    middleware::chain::MiddlewareChain,
    models::user::{normalize_email, Role, User, DEFAULT_PHOTO},
    utils::{crypto::hash_password, token::sign_token},
    AppState,
};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, Response},
    Router,
};
use chrono::{Duration, Utc};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::Value as JsonValue;
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "pass1234";

pub fn test_config(environment: Environment) -> Config {
    let public_dir = std::env::temp_dir().join(format!("account-backend-{}", Uuid::new_v4()));
    Config {
        server_address: "127.0.0.1:0".into(),
        database_url: String::new(),
        environment,
        jwt_secret: "test_secret_key".into(),
        jwt_expires_in_days: 90,
        jwt_cookie_expires_in_days: 90,
        public_dir,
        rate_limit_max: 100,
        rate_limit_window_secs: 3600,
        body_limit_bytes: 10 * 1024,
        upload_limit_bytes: 5 * 1024 * 1024,
        hpp_whitelist: vec!["price".into()],
        trust_proxy: false,
    }
}

/// Users kept in a `Vec`, with the same not-found and uniqueness behaviour as
/// the Postgres store.
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<Vec<User>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, name: &str, email: &str, role: Role) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: normalize_email(email),
            photo: DEFAULT_PHOTO.to_string(),
            role,
            password: hash_password(PASSWORD).unwrap(),
            password_changed_at: None,
            active: true,
            created_at: now,
            updated_at: now,
        };
        self.users.lock().unwrap().push(user.clone());
        user
    }

    pub fn get(&self, id: Uuid) -> Option<User> {
        self.users.lock().unwrap().iter().find(|u| u.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.users.lock().unwrap().len()
    }
}

fn field_text(user: &User, name: &str) -> String {
    match serde_json::to_value(user).unwrap().get(name) {
        Some(JsonValue::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

#[async_trait]
impl Store<User> for MemoryStore {
    async fn find_all(&self, query: &ListQuery) -> Result<Vec<User>> {
        let mut users: Vec<User> = self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|user| {
                query.filters.iter().all(|filter| {
                    let actual = field_text(user, filter.field.name);
                    match filter.op {
                        FilterOp::Eq => actual == filter.value,
                        FilterOp::Gt => actual > filter.value,
                        FilterOp::Gte => actual >= filter.value,
                        FilterOp::Lt => actual < filter.value,
                        FilterOp::Lte => actual <= filter.value,
                    }
                })
            })
            .cloned()
            .collect();

        if let Some(key) = query.sort.first() {
            users.sort_by(|a, b| {
                let ordering = field_text(a, key.field.name).cmp(&field_text(b, key.field.name));
                if key.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        Ok(users
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit as usize)
            .collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.get(id))
    }

    async fn create(&self, input: CreateUserPayload) -> Result<User> {
        let email = normalize_email(&input.email);
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == email) {
            return Err(Error::BadRequest(
                "Duplicate field value for email. Please use another value!".into(),
            ));
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: input.name.trim().to_string(),
            email,
            photo: input.photo.unwrap_or_else(|| DEFAULT_PHOTO.to_string()),
            role: input.role.unwrap_or_default(),
            password: hash_password(&input.password)?,
            password_changed_at: None,
            active: true,
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn update_by_id(&self, id: Uuid, changes: UpdateUserPayload) -> Result<Option<User>> {
        let mut users = self.users.lock().unwrap();
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            user.name = name.trim().to_string();
        }
        if let Some(email) = changes.email {
            user.email = normalize_email(&email);
        }
        if let Some(photo) = changes.photo {
            user.photo = photo;
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        if let Some(active) = changes.active {
            user.active = active;
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool> {
        let mut users = self.users.lock().unwrap();
        let before = users.len();
        users.retain(|u| u.id != id);
        Ok(users.len() != before)
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = normalize_email(email);
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn set_password(&self, id: Uuid, password_hash: String) -> Result<Option<User>> {
        let mut users = self.users.lock().unwrap();
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        user.password = password_hash;
        user.password_changed_at = Some(Utc::now() - Duration::seconds(1));
        Ok(Some(user.clone()))
    }
}

mockall::mock! {
    pub Users {}

    #[async_trait]
    impl Store<User> for Users {
        async fn find_all(&self, query: &ListQuery) -> Result<Vec<User>>;
        async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
        async fn create(&self, input: CreateUserPayload) -> Result<User>;
        async fn update_by_id(&self, id: Uuid, changes: UpdateUserPayload) -> Result<Option<User>>;
        async fn delete_by_id(&self, id: Uuid) -> Result<bool>;
    }

    #[async_trait]
    impl CredentialStore for Users {
        async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
        async fn set_password(&self, id: Uuid, password_hash: String) -> Result<Option<User>>;
    }
}

pub fn sample_user(role: Role) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        name: "Mock User".into(),
        email: format!("mock_{}@example.com", Uuid::new_v4().simple()),
        photo: DEFAULT_PHOTO.into(),
        role,
        password: hash_password(PASSWORD).unwrap(),
        password_changed_at: None,
        active: true,
        created_at: now,
        updated_at: now,
    }
}

pub struct TestApp {
    pub router: Router,
    pub config: Config,
}

impl TestApp {
    pub fn with_store<S>(config: Config, store: Arc<S>) -> Self
    where
        S: Store<User> + CredentialStore + 'static,
    {
        let chain = MiddlewareChain::standard(&config);
        let router = build_app(AppState::new(config.clone(), store), &chain);
        Self { router, config }
    }

    pub fn token_for(&self, user: &User) -> String {
        sign_token(&self.config, user.id).unwrap()
    }

    pub fn photo_dir(&self) -> PathBuf {
        self.config.photo_dir()
    }

    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(req).await.unwrap()
    }
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: &JsonValue) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub const BOUNDARY: &str = "X-ACCOUNT-BACKEND-BOUNDARY";

pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        field: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
}

pub fn multipart_request(uri: &str, token: &str, parts: &[Part<'_>]) -> Request<Body> {
    let mut body: Vec<u8> = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n", name, value)
                        .as_bytes(),
                );
            }
            Part::File {
                field,
                file_name,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        field, file_name, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("PATCH")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 251) as u8, (y % 241) as u8, 90]));
    let mut buf = std::io::Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

pub async fn body_json(response: Response<Body>) -> JsonValue {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}
