use axum::{
    body::Body,
    extract::{Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::Response,
};
use tower::ServiceExt;
use tower_http::services::ServeDir;

pub fn public_dir(dir: impl AsRef<std::path::Path>) -> ServeDir {
    ServeDir::new(dir).append_index_html_on_directories(false)
}

/// Answers GET/HEAD requests from the public directory when a file matches;
/// everything else continues down the chain untouched.
pub async fn serve_static(State(dir): State<ServeDir>, req: Request, next: Next) -> Response {
    if req.method() != Method::GET && req.method() != Method::HEAD {
        return next.run(req).await;
    }

    let mut probe = Request::new(Body::empty());
    *probe.method_mut() = req.method().clone();
    *probe.uri_mut() = req.uri().clone();
    *probe.headers_mut() = req.headers().clone();

    match dir.oneshot(probe).await {
        Ok(response) if response.status() != StatusCode::NOT_FOUND => response.map(Body::new),
        _ => next.run(req).await,
    }
}
