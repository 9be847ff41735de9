use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;

/// Runtime mode. Controls error detail, request logging and cookie flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub environment: Environment,
    pub jwt_secret: String,
    pub jwt_expires_in_days: i64,
    pub jwt_cookie_expires_in_days: i64,
    pub public_dir: PathBuf,
    pub rate_limit_max: u32,
    pub rate_limit_window_secs: u64,
    pub body_limit_bytes: usize,
    pub upload_limit_bytes: usize,
    pub hpp_whitelist: Vec<String>,
    pub trust_proxy: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_address: get_env_or("SERVER_ADDRESS", "0.0.0.0:3000"),
            database_url: get_env("DATABASE_URL")?,
            environment: get_env_parse_or("APP_ENV", Environment::Production)?,
            jwt_secret: get_env("JWT_SECRET")?,
            jwt_expires_in_days: get_env_parse_or("JWT_EXPIRES_IN_DAYS", 90)?,
            jwt_cookie_expires_in_days: get_env_parse_or("JWT_COOKIE_EXPIRES_IN_DAYS", 90)?,
            public_dir: PathBuf::from(get_env_or("PUBLIC_DIR", "public")),
            rate_limit_max: get_env_parse_or("RATE_LIMIT_MAX", 100)?,
            rate_limit_window_secs: get_env_parse_or("RATE_LIMIT_WINDOW_SECS", 60 * 60)?,
            body_limit_bytes: get_env_parse_or("BODY_LIMIT_BYTES", 10 * 1024)?,
            upload_limit_bytes: get_env_parse_or("UPLOAD_LIMIT_BYTES", 5 * 1024 * 1024)?,
            hpp_whitelist: vec!["price".to_string()],
            trust_proxy: get_env_parse_or("TRUST_PROXY", false)?,
        })
    }

    /// Directory user avatars are written to and served from.
    pub fn photo_dir(&self) -> PathBuf {
        self.public_dir.join("img").join("users")
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}
