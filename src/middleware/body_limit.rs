use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::error::{Error, Result};

/// Body encodings the parser stage buffers. Multipart uploads are left to the
/// route's own `DefaultBodyLimit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Json,
    Form,
    Other,
}

impl BodyKind {
    pub fn of(headers: &HeaderMap) -> Self {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
            .unwrap_or_default();

        if content_type == "application/json" || content_type.ends_with("+json") {
            BodyKind::Json
        } else if content_type == "application/x-www-form-urlencoded" {
            BodyKind::Form
        } else {
            BodyKind::Other
        }
    }
}

fn too_large(limit: usize) -> Error {
    Error::PayloadTooLarge(format!(
        "Request body is larger than the {} byte limit",
        limit
    ))
}

/// Buffers JSON and urlencoded bodies, rejecting anything over `limit` bytes.
pub async fn limit_body(State(limit): State<usize>, req: Request, next: Next) -> Result<Response> {
    if BodyKind::of(req.headers()) == BodyKind::Other {
        return Ok(next.run(req).await);
    }

    let declared = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(too_large(limit));
    }

    let (parts, body) = req.into_parts();
    let bytes = to_bytes(body, limit).await.map_err(|_| too_large(limit))?;
    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, content_type.parse().unwrap());
        headers
    }

    #[test]
    fn classifies_content_types() {
        assert_eq!(BodyKind::of(&headers("application/json")), BodyKind::Json);
        assert_eq!(
            BodyKind::of(&headers("application/json; charset=utf-8")),
            BodyKind::Json
        );
        assert_eq!(BodyKind::of(&headers("application/merge-patch+json")), BodyKind::Json);
        assert_eq!(
            BodyKind::of(&headers("application/x-www-form-urlencoded")),
            BodyKind::Form
        );
        assert_eq!(
            BodyKind::of(&headers("multipart/form-data; boundary=x")),
            BodyKind::Other
        );
        assert_eq!(BodyKind::of(&HeaderMap::new()), BodyKind::Other);
    }
}
