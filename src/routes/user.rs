use axum::{
    async_trait,
    extract::{DefaultBodyLimit, Extension, FromRequest, Multipart, Request, State},
    http::{header, StatusCode},
    middleware::{from_fn, from_fn_with_state, Next},
    response::Response,
    routing::{delete, get, patch, post},
    Form, Json, Router,
};
use serde_json::{json, Map, Value as JsonValue};
use validator::Validate;

use crate::dto::user_dto::{UpdateUserPayload, PASSWORD_FIELDS, UPDATE_ME_FIELDS};
use crate::error::{Error, Result};
use crate::middleware::auth::{protect, restrict_to, CurrentUser};
use crate::middleware::body_limit::BodyKind;
use crate::models::user::{Role, User};
use crate::routes::{auth, not_found};
use crate::routes::factory::{
    create_one, delete_one, get_all, get_one, no_document, update_one, TargetId,
};
use crate::services::photo_service::{ensure_image, PhotoUpload};
use crate::utils::filter::filter_obj;
use crate::AppState;

pub const PHOTO_FIELD: &str = "photo";

pub fn router(state: AppState) -> Router<AppState> {
    let upload_limit = state.config.upload_limit_bytes;

    let account = Router::new()
        .route(
            "/updateMyPassword",
            patch(auth::update_password).fallback(not_found),
        )
        .route(
            "/me",
            get(get_one::<User>)
                .layer(from_fn(get_me))
                .fallback(not_found),
        )
        .route(
            "/updateMe",
            patch(update_me)
                .layer(DefaultBodyLimit::max(upload_limit))
                .fallback(not_found),
        )
        .route("/deleteMe", delete(delete_me).fallback(not_found));

    let admin = Router::new()
        .route(
            "/",
            get(get_all::<User>)
                .post(create_one::<User>)
                .fallback(not_found),
        )
        .route(
            "/:id",
            get(get_one::<User>)
                .patch(update_one::<User>)
                .delete(delete_one::<User>)
                .fallback(not_found),
        )
        .route_layer(from_fn(|req: Request, next: Next| {
            restrict_to(req, next, &[Role::Admin])
        }));

    Router::new()
        .route("/signup", post(auth::signup).fallback(not_found))
        .route("/login", post(auth::login).fallback(not_found))
        .route("/logout", get(auth::logout).fallback(not_found))
        .merge(
            account
                .merge(admin)
                .route_layer(from_fn_with_state(state, protect)),
        )
}

/// Points the single-document handlers at the caller's own record.
pub async fn get_me(mut req: Request, next: Next) -> Result<Response> {
    let id = req
        .extensions()
        .get::<CurrentUser>()
        .map(|CurrentUser(user)| user.id)
        .ok_or_else(|| {
            Error::Unauthorized("You are not logged in! Please log in to get access.".to_string())
        })?;
    req.extensions_mut().insert(TargetId(id));
    Ok(next.run(req).await)
}

/// Profile fields plus an optional avatar, from a JSON, urlencoded or
/// multipart body.
#[derive(Debug, Default)]
pub struct ProfileForm {
    pub fields: Map<String, JsonValue>,
    pub photo: Option<PhotoUpload>,
}

impl ProfileForm {
    async fn from_multipart(mut multipart: Multipart) -> Result<Self> {
        let mut form = ProfileForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            let file_name = field.file_name().map(str::to_string);
            match file_name.as_deref() {
                None => {
                    let text = field.text().await?;
                    form.fields.insert(name, JsonValue::String(text));
                    continue;
                }
                Some("") => continue,
                Some(_) => {}
            }
            if name != PHOTO_FIELD || form.photo.is_some() {
                return Err(Error::BadRequest(format!("Unexpected field: {}", name)));
            }

            let content_type = ensure_image(field.content_type())?.to_string();
            let data = field.bytes().await?;
            if !data.is_empty() {
                form.photo = Some(PhotoUpload::new(content_type, data));
            }
        }

        Ok(form)
    }
}

#[async_trait]
impl<S> FromRequest<S> for ProfileForm
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("multipart/form-data"));

        match BodyKind::of(req.headers()) {
            BodyKind::Json => {
                let Json(value) = Json::<JsonValue>::from_request(req, state)
                    .await
                    .map_err(|rejection| Error::BadRequest(rejection.body_text()))?;
                match value {
                    JsonValue::Object(fields) => Ok(ProfileForm {
                        fields,
                        photo: None,
                    }),
                    _ => Err(Error::BadRequest(
                        "Request body must be a JSON object".to_string(),
                    )),
                }
            }
            BodyKind::Form => {
                let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
                    .await
                    .map_err(|rejection| Error::BadRequest(rejection.body_text()))?;
                let fields = pairs
                    .into_iter()
                    .map(|(key, value)| (key, JsonValue::String(value)))
                    .collect();
                Ok(ProfileForm {
                    fields,
                    photo: None,
                })
            }
            BodyKind::Other if is_multipart => {
                let multipart = Multipart::from_request(req, state)
                    .await
                    .map_err(|rejection| Error::BadRequest(rejection.body_text()))?;
                ProfileForm::from_multipart(multipart).await
            }
            BodyKind::Other => Ok(ProfileForm::default()),
        }
    }
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    form: ProfileForm,
) -> Result<Json<JsonValue>> {
    if PASSWORD_FIELDS.iter().any(|key| form.fields.contains_key(*key)) {
        return Err(Error::BadRequest(
            "This route is not for password updates. Please use /updateMyPassword.".to_string(),
        ));
    }

    let filtered = filter_obj(&form.fields, UPDATE_ME_FIELDS);
    let mut changes: UpdateUserPayload = serde_json::from_value(JsonValue::Object(filtered))
        .map_err(|e| Error::BadRequest(format!("Invalid input data. {}", e)))?;
    changes.validate()?;

    // Only write the photo once the rest of the update is known to be valid.
    if let Some(filename) = state.photos.resize_user_photo(user.id, form.photo).await? {
        changes.photo = Some(filename);
    }

    let updated = state
        .users
        .update_by_id(user.id, changes)
        .await?
        .ok_or_else(no_document)?;

    tracing::info!(user_id = %updated.id, "profile updated");
    Ok(Json(json!({
        "status": "success",
        "data": { "user": serde_json::to_value(&updated)? },
    })))
}

pub async fn delete_me(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<StatusCode> {
    state
        .users
        .update_by_id(user.id, UpdateUserPayload::deactivate())
        .await?
        .ok_or_else(no_document)?;
    tracing::info!(user_id = %user.id, "account deactivated");
    Ok(StatusCode::NO_CONTENT)
}
