use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    Router,
};
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use crate::config::Config;
use crate::middleware::{
    body_limit::limit_body,
    cookies::parse_cookies,
    rate_limit::{rate_limit_middleware, RateLimiter},
    sanitize::{nosql_sanitize, parameter_pollution, xss_clean},
    security_headers::with_security_headers,
    static_files::{public_dir, serve_static},
};

/// One step of the request pipeline, in the order requests pass through it.
#[derive(Clone, Debug)]
pub enum Stage {
    StaticFiles { dir: PathBuf },
    SecurityHeaders,
    BodyParsing { limit: usize },
    CookieParsing,
    RequestLogging,
    RateLimit(RateLimiter),
    NoSqlSanitize,
    ParameterPollution { whitelist: Arc<[String]> },
    XssClean,
    Compression,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::StaticFiles { .. } => "static_files",
            Stage::SecurityHeaders => "security_headers",
            Stage::BodyParsing { .. } => "body_parsing",
            Stage::CookieParsing => "cookie_parsing",
            Stage::RequestLogging => "request_logging",
            Stage::RateLimit(_) => "rate_limit",
            Stage::NoSqlSanitize => "nosql_sanitize",
            Stage::ParameterPollution { .. } => "parameter_pollution",
            Stage::XssClean => "xss_clean",
            Stage::Compression => "compression",
        }
    }

    fn wrap<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        match self {
            Stage::StaticFiles { dir } => {
                router.layer(from_fn_with_state(public_dir(dir), serve_static))
            }
            Stage::SecurityHeaders => with_security_headers(router),
            Stage::BodyParsing { limit } => router.layer(from_fn_with_state(*limit, limit_body)),
            Stage::CookieParsing => router.layer(from_fn(parse_cookies)),
            Stage::RequestLogging => router.layer(TraceLayer::new_for_http()),
            Stage::RateLimit(limiter) => {
                router.layer(from_fn_with_state(limiter.clone(), rate_limit_middleware))
            }
            Stage::NoSqlSanitize => router.layer(from_fn(nosql_sanitize)),
            Stage::ParameterPollution { whitelist } => {
                router.layer(from_fn_with_state(whitelist.clone(), parameter_pollution))
            }
            Stage::XssClean => router.layer(from_fn(xss_clean)),
            Stage::Compression => router.layer(CompressionLayer::new()),
        }
    }
}

/// The ordered, immutable list of stages every request passes through.
#[derive(Clone, Debug)]
pub struct MiddlewareChain {
    stages: Vec<Stage>,
}

impl MiddlewareChain {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// The production pipeline. Request logging is only present in development.
    pub fn standard(config: &Config) -> Self {
        let mut stages = vec![
            Stage::StaticFiles {
                dir: config.public_dir.clone(),
            },
            Stage::SecurityHeaders,
            Stage::BodyParsing {
                limit: config.body_limit_bytes,
            },
            Stage::CookieParsing,
        ];
        if config.environment.is_development() {
            stages.push(Stage::RequestLogging);
        }
        stages.extend([
            Stage::RateLimit(RateLimiter::from_config(config)),
            Stage::NoSqlSanitize,
            Stage::ParameterPollution {
                whitelist: config.hpp_whitelist.clone().into(),
            },
            Stage::XssClean,
            Stage::Compression,
        ]);
        Self { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(Stage::name).collect()
    }

    /// Layers the stages onto `router` so the first stage sees requests first.
    pub fn apply<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        self.stages
            .iter()
            .rev()
            .fold(router, |router, stage| stage.wrap(router))
    }
}
