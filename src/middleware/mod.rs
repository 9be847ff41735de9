pub mod auth;
pub mod body_limit;
pub mod chain;
pub mod cookies;
pub mod rate_limit;
pub mod sanitize;
pub mod security_headers;
pub mod static_files;
