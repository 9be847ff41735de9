//! Request scrubbing stages: query-operator injection, parameter pollution and
//! HTML in user input.
//!
//! Each stage rewrites the query string and, for JSON or urlencoded bodies, the
//! body. Untouched requests are passed through as-is.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{Request, State},
    http::{header, uri::PathAndQuery, Uri},
    middleware::Next,
    response::Response,
};
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::middleware::body_limit::BodyKind;

pub type Pairs = Vec<(String, String)>;

pub fn query_pairs(uri: &Uri) -> Pairs {
    url::form_urlencoded::parse(uri.query().unwrap_or("").as_bytes())
        .into_owned()
        .collect()
}

fn encode_pairs(pairs: &Pairs) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

fn replace_query(req: &mut Request, pairs: &Pairs) -> Result<()> {
    let query = encode_pairs(pairs);
    let path_and_query = if query.is_empty() {
        req.uri().path().to_string()
    } else {
        format!("{}?{}", req.uri().path(), query)
    };

    let mut parts = req.uri().clone().into_parts();
    parts.path_and_query = Some(
        PathAndQuery::try_from(path_and_query)
            .map_err(|e| Error::BadRequest(format!("Invalid query string: {}", e)))?,
    );
    *req.uri_mut() = Uri::from_parts(parts)
        .map_err(|e| Error::BadRequest(format!("Invalid request URI: {}", e)))?;
    Ok(())
}

/// Applies `f` to the query pairs and writes them back if anything changed.
fn map_query(req: &mut Request, f: impl FnOnce(&mut Pairs) -> bool) -> Result<()> {
    if req.uri().query().is_none() {
        return Ok(());
    }
    let mut pairs = query_pairs(req.uri());
    if f(&mut pairs) {
        replace_query(req, &pairs)?;
    }
    Ok(())
}

/// Re-buffers the body and hands it to the matching scrubber. The body has
/// already been size-checked by the parsing stage.
async fn map_body(
    req: Request,
    json: &(dyn Fn(&mut JsonValue) -> bool + Sync),
    form: &(dyn Fn(&mut Pairs) -> bool + Sync),
) -> Result<Request> {
    let kind = BodyKind::of(req.headers());
    if kind == BodyKind::Other {
        return Ok(req);
    }

    let (mut parts, body) = req.into_parts();
    let bytes = to_bytes(body, usize::MAX)
        .await
        .map_err(|e| Error::BadRequest(format!("Could not read request body: {}", e)))?;

    let rewritten: Option<Bytes> = if kind == BodyKind::Json {
        match serde_json::from_slice::<JsonValue>(&bytes) {
            Ok(mut value) => {
                if json(&mut value) {
                    Some(serde_json::to_vec(&value)?.into())
                } else {
                    None
                }
            }
            // Malformed JSON is left for the extractor to reject.
            Err(_) => None,
        }
    } else {
        let mut pairs: Pairs = url::form_urlencoded::parse(&bytes).into_owned().collect();
        form(&mut pairs).then(|| Bytes::from(encode_pairs(&pairs)))
    };

    let body = match rewritten {
        Some(new_bytes) => {
            parts.headers.remove(header::CONTENT_LENGTH);
            Body::from(new_bytes)
        }
        None => Body::from(bytes),
    };
    Ok(Request::from_parts(parts, body))
}

fn is_operator_key(key: &str) -> bool {
    key.starts_with('$') || key.contains('.')
}

/// Removes object keys that could be read as query operators or paths.
pub fn strip_operators(value: &mut JsonValue) -> bool {
    match value {
        JsonValue::Object(map) => {
            let before = map.len();
            map.retain(|key, _| !is_operator_key(key));
            let mut changed = map.len() != before;
            for nested in map.values_mut() {
                changed |= strip_operators(nested);
            }
            changed
        }
        JsonValue::Array(items) => items
            .iter_mut()
            .fold(false, |changed, item| strip_operators(item) | changed),
        _ => false,
    }
}

fn strip_operator_pairs(pairs: &mut Pairs) -> bool {
    let before = pairs.len();
    pairs.retain(|(key, _)| !key.contains('$') && !key.starts_with('.'));
    pairs.len() != before
}

pub async fn nosql_sanitize(mut req: Request, next: Next) -> Result<Response> {
    map_query(&mut req, strip_operator_pairs)?;
    let req = map_body(req, &strip_operators, &strip_operator_pairs).await?;
    Ok(next.run(req).await)
}

/// Keeps the last value of each repeated key unless the key is whitelisted.
/// Surviving pairs stay at the position of the key's first occurrence.
pub fn collapse_duplicates(pairs: &mut Pairs, whitelist: &[String]) -> bool {
    let before = pairs.len();
    let mut collapsed: Pairs = Vec::with_capacity(before);
    for (key, value) in pairs.drain(..) {
        if whitelist.iter().any(|allowed| *allowed == key) {
            collapsed.push((key, value));
            continue;
        }
        match collapsed.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = value,
            None => collapsed.push((key, value)),
        }
    }
    *pairs = collapsed;
    pairs.len() != before
}

pub async fn parameter_pollution(
    State(whitelist): State<Arc<[String]>>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    let collapse = |pairs: &mut Pairs| collapse_duplicates(pairs, &whitelist);
    map_query(&mut req, collapse)?;
    let req = map_body(req, &|_: &mut JsonValue| false, &collapse).await?;
    Ok(next.run(req).await)
}

pub fn escape_html(input: &str) -> Option<String> {
    if !input.contains(['<', '>']) {
        return None;
    }
    Some(input.replace('<', "&lt;").replace('>', "&gt;"))
}

/// Escapes angle brackets in every string of a JSON document, keys excluded.
pub fn escape_json_strings(value: &mut JsonValue) -> bool {
    match value {
        JsonValue::String(s) => match escape_html(s) {
            Some(escaped) => {
                *s = escaped;
                true
            }
            None => false,
        },
        JsonValue::Array(items) => items
            .iter_mut()
            .fold(false, |changed, item| escape_json_strings(item) | changed),
        JsonValue::Object(map) => map
            .values_mut()
            .fold(false, |changed, item| escape_json_strings(item) | changed),
        _ => false,
    }
}

fn escape_pair_values(pairs: &mut Pairs) -> bool {
    pairs.iter_mut().fold(false, |changed, (_, value)| match escape_html(value) {
        Some(escaped) => {
            *value = escaped;
            true
        }
        None => changed,
    })
}

pub async fn xss_clean(mut req: Request, next: Next) -> Result<Response> {
    map_query(&mut req, escape_pair_values)?;
    let req = map_body(req, &escape_json_strings, &escape_pair_values).await?;
    Ok(next.run(req).await)
}
