use std::collections::HashMap;

use axum::{
    extract::Request,
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use cookie::{time::Duration, Cookie, SameSite};

use crate::config::Config;

pub const JWT_COOKIE: &str = "jwt";
pub const LOGGED_OUT: &str = "loggedout";

/// Cookies sent with the request, keyed by name. Later duplicates win.
#[derive(Debug, Clone, Default)]
pub struct Cookies(HashMap<String, String>);

impl Cookies {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut jar = HashMap::new();
        for raw in headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
        {
            for cookie in Cookie::split_parse(raw).filter_map(|c| c.ok()) {
                jar.insert(cookie.name().to_string(), cookie.value().to_string());
            }
        }
        Self(jar)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub async fn parse_cookies(mut req: Request, next: Next) -> Response {
    let cookies = Cookies::from_headers(req.headers());
    req.extensions_mut().insert(cookies);
    next.run(req).await
}

pub fn session_cookie(config: &Config, token: String) -> Cookie<'static> {
    Cookie::build((JWT_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(!config.environment.is_development())
        .max_age(Duration::days(config.jwt_cookie_expires_in_days))
        .build()
}

pub fn logout_cookie() -> Cookie<'static> {
    Cookie::build((JWT_COOKIE, LOGGED_OUT))
        .path("/")
        .http_only(true)
        .max_age(Duration::seconds(10))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multiple_pairs_with_spaces() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "theme=dark;  jwt=abc.def.ghi".parse().unwrap());
        let cookies = Cookies::from_headers(&headers);
        assert_eq!(cookies.get("jwt"), Some("abc.def.ghi"));
        assert_eq!(cookies.get("theme"), Some("dark"));
        assert_eq!(cookies.get("missing"), None);
    }

    #[test]
    fn no_header_means_no_cookies() {
        assert!(Cookies::from_headers(&HeaderMap::new()).is_empty());
    }

    #[test]
    fn logout_cookie_expires_quickly() {
        let rendered = logout_cookie().to_string();
        assert!(rendered.starts_with("jwt=loggedout"));
        assert!(rendered.contains("Max-Age=10"));
        assert!(rendered.contains("HttpOnly"));
    }
}
