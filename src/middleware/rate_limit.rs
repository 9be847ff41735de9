use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::config::Config;
use crate::error::Error;

const PRUNE_THRESHOLD: usize = 10_000;

pub const LIMIT_MESSAGE: &str = "Too many requests from this IP, please try again in an hour!";

#[derive(Debug)]
struct WindowState {
    start: Instant,
    count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_in: Duration,
}

/// Fixed-window counter per client IP, applied to paths under `prefix`.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    max: u32,
    window: Duration,
    prefix: String,
    trust_proxy: bool,
    clients: Arc<Mutex<HashMap<String, WindowState>>>,
}

impl RateLimiter {
    pub fn new(max: u32, window: Duration, prefix: impl Into<String>) -> Self {
        Self {
            max: max.max(1),
            window,
            prefix: prefix.into(),
            trust_proxy: false,
            clients: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.rate_limit_max,
            Duration::from_secs(config.rate_limit_window_secs),
            "/api",
        )
        .trust_proxy(config.trust_proxy)
    }

    /// Take the client address from `X-Forwarded-For` when present.
    pub fn trust_proxy(mut self, trust: bool) -> Self {
        self.trust_proxy = trust;
        self
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `/api` covers `/api` and `/api/...` but not `/apiary`.
    pub fn covers(&self, path: &str) -> bool {
        match path.strip_prefix(self.prefix.trim_end_matches('/')) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Counts one request for `client` and reports whether it is within budget.
    pub fn check(&self, client: &str) -> Decision {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        if clients.len() >= PRUNE_THRESHOLD {
            let window = self.window;
            clients.retain(|_, state| now.duration_since(state.start) < window);
        }

        let state = clients.entry(client.to_string()).or_insert(WindowState {
            start: now,
            count: 0,
        });
        if now.duration_since(state.start) >= self.window {
            state.start = now;
            state.count = 0;
        }
        state.count = state.count.saturating_add(1);

        Decision {
            allowed: state.count <= self.max,
            remaining: self.max.saturating_sub(state.count),
            reset_in: self.window.saturating_sub(now.duration_since(state.start)),
        }
    }

    fn client_key(&self, req: &Request) -> String {
        if self.trust_proxy {
            let forwarded = req
                .headers()
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty());
            if let Some(ip) = forwarded {
                return ip.to_string();
            }
        }
        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

fn set_header(headers: &mut HeaderMap, name: &'static str, value: u64) {
    headers.insert(name, HeaderValue::from(value));
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Response {
    if !limiter.covers(req.uri().path()) {
        return next.run(req).await;
    }

    let client = limiter.client_key(&req);
    let decision = limiter.check(&client);

    let mut response = if decision.allowed {
        next.run(req).await
    } else {
        tracing::warn!(%client, "rate limit exceeded");
        let mut response = Error::TooManyRequests(LIMIT_MESSAGE.to_string()).into_response();
        set_header(
            response.headers_mut(),
            "retry-after",
            decision.reset_in.as_secs().max(1),
        );
        response
    };

    let headers = response.headers_mut();
    set_header(headers, "x-ratelimit-limit", u64::from(limiter.max));
    set_header(headers, "x-ratelimit-remaining", u64::from(decision.remaining));
    response
}
