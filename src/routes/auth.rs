use axum::{
    extract::{Extension, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::config::Config;
use crate::dto::auth_dto::{LoginPayload, SignupPayload, UpdatePasswordPayload};
use crate::dto::user_dto::CreateUserPayload;
use crate::error::{Error, Result};
use crate::middleware::auth::CurrentUser;
use crate::middleware::cookies::{logout_cookie, session_cookie};
use crate::models::user::{Role, User};
use crate::routes::factory::no_document;
use crate::utils::crypto::{hash_password, verify_password};
use crate::utils::token::sign_token;
use crate::utils::validation::ValidatedJson;
use crate::AppState;

/// Issues a JWT both in the body and as the `jwt` cookie.
fn send_token(config: &Config, user: &User, status: StatusCode) -> Result<Response> {
    let token = sign_token(config, user.id)?;
    let cookie = session_cookie(config, token.clone());
    let body = json!({
        "status": "success",
        "token": token,
        "data": { "user": serde_json::to_value(user)? },
    });
    Ok((status, [(header::SET_COOKIE, cookie.to_string())], Json(body)).into_response())
}

pub async fn signup(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<SignupPayload>,
) -> Result<Response> {
    let user = state
        .users
        .create(CreateUserPayload {
            name: payload.name,
            email: payload.email,
            password: payload.password,
            password_confirm: payload.password_confirm,
            role: Some(Role::User),
            photo: None,
        })
        .await?;

    tracing::info!(user_id = %user.id, "user signed up");
    send_token(&state.config, &user, StatusCode::CREATED)
}

pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginPayload>,
) -> Result<Response> {
    let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
    let (Some(email), Some(password)) = (non_empty(payload.email), non_empty(payload.password))
    else {
        return Err(Error::BadRequest(
            "Please provide email and password!".to_string(),
        ));
    };

    let user = state
        .credentials
        .find_by_email(&email)
        .await?
        .filter(|user| user.active && verify_password(&password, &user.password))
        .ok_or_else(|| Error::Unauthorized("Incorrect email or password".to_string()))?;

    tracing::info!(user_id = %user.id, "user logged in");
    send_token(&state.config, &user, StatusCode::OK)
}

pub async fn logout() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::SET_COOKIE, logout_cookie().to_string())],
        Json(json!({ "status": "success" })),
    )
}

pub async fn update_password(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ValidatedJson(payload): ValidatedJson<UpdatePasswordPayload>,
) -> Result<Response> {
    if !verify_password(&payload.password_current, &user.password) {
        return Err(Error::Unauthorized(
            "Your current password is wrong.".to_string(),
        ));
    }

    let password_hash = hash_password(&payload.password)?;
    let updated = state
        .credentials
        .set_password(user.id, password_hash)
        .await?
        .ok_or_else(no_document)?;

    tracing::info!(user_id = %updated.id, "password changed");
    send_token(&state.config, &updated, StatusCode::OK)
}
