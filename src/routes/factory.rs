//! Generic CRUD handlers. Any [`Resource`] with a `Store` in state gets the
//! same list/read/create/update/delete behaviour and response envelope.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, RawQuery, State},
    http::{request::Parts, StatusCode},
    Json,
};
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use crate::database::query::ListQuery;
use crate::database::store::{Resource, Store};
use crate::error::{Error, Result};
use crate::utils::filter::filter_obj;
use crate::utils::validation::ValidatedJson;

pub fn no_document() -> Error {
    Error::NotFound("No document found with that ID".to_string())
}

/// Overrides the `:id` path segment. Inserted by routes that act on the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetId(pub Uuid);

/// The id a single-document handler operates on. An id that is not a UUID can
/// never match a document, so it is reported as not found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for ResourceId
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        if let Some(TargetId(id)) = parts.extensions.get::<TargetId>() {
            return Ok(ResourceId(*id));
        }
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| no_document())?;
        Uuid::parse_str(&raw).map(ResourceId).map_err(|_| no_document())
    }
}

fn project(doc: JsonValue, fields: Option<&[String]>) -> JsonValue {
    match (fields, doc) {
        (Some(fields), JsonValue::Object(map)) => {
            let allowed: Vec<&str> = fields.iter().map(String::as_str).collect();
            JsonValue::Object(filter_obj(&map, &allowed))
        }
        (_, doc) => doc,
    }
}

pub async fn get_all<R: Resource>(
    State(store): State<Arc<dyn Store<R>>>,
    RawQuery(raw): RawQuery,
) -> Result<Json<JsonValue>> {
    let query = ListQuery::parse(raw.as_deref(), R::FIELDS)?;
    let docs = store.find_all(&query).await?;

    let data = docs
        .iter()
        .map(|doc| -> Result<JsonValue> {
            Ok(project(serde_json::to_value(doc)?, query.fields.as_deref()))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Json(json!({
        "status": "success",
        "results": data.len(),
        "data": { "data": data },
    })))
}

pub async fn get_one<R: Resource>(
    State(store): State<Arc<dyn Store<R>>>,
    ResourceId(id): ResourceId,
) -> Result<Json<JsonValue>> {
    let doc = store.find_by_id(id).await?.ok_or_else(no_document)?;
    Ok(Json(json!({
        "status": "success",
        "data": { "data": serde_json::to_value(doc)? },
    })))
}

pub async fn create_one<R: Resource>(
    State(store): State<Arc<dyn Store<R>>>,
    ValidatedJson(input): ValidatedJson<R::Create>,
) -> Result<(StatusCode, Json<JsonValue>)> {
    let doc = store.create(input).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "data": { "data": serde_json::to_value(doc)? },
        })),
    ))
}

pub async fn update_one<R: Resource>(
    State(store): State<Arc<dyn Store<R>>>,
    ResourceId(id): ResourceId,
    ValidatedJson(changes): ValidatedJson<R::Update>,
) -> Result<Json<JsonValue>> {
    let doc = store
        .update_by_id(id, changes)
        .await?
        .ok_or_else(no_document)?;
    Ok(Json(json!({
        "status": "success",
        "data": { "data": serde_json::to_value(doc)? },
    })))
}

pub async fn delete_one<R: Resource>(
    State(store): State<Arc<dyn Store<R>>>,
    ResourceId(id): ResourceId,
) -> Result<StatusCode> {
    if !store.delete_by_id(id).await? {
        return Err(no_document());
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_keeps_requested_fields() {
        let doc = json!({ "id": "1", "name": "Ada", "email": "ada@example.com" });
        let fields = vec!["name".to_string(), "id".to_string()];
        assert_eq!(
            project(doc.clone(), Some(&fields)),
            json!({ "id": "1", "name": "Ada" })
        );
        assert_eq!(project(doc.clone(), None), doc);
    }
}
