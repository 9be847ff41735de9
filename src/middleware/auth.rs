use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::middleware::cookies::{Cookies, JWT_COOKIE, LOGGED_OUT};
use crate::models::user::{Role, User};
use crate::utils::token::verify_token;
use crate::AppState;

/// The authenticated caller, inserted by [`protect`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

fn bearer_token(req: &Request) -> Option<String> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn cookie_token(req: &Request) -> Option<String> {
    let parsed;
    let cookies = match req.extensions().get::<Cookies>() {
        Some(cookies) => cookies,
        None => {
            parsed = Cookies::from_headers(req.headers());
            &parsed
        }
    };
    cookies
        .get(JWT_COOKIE)
        .filter(|value| *value != LOGGED_OUT && !value.is_empty())
        .map(str::to_string)
}

pub async fn protect(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response> {
    let token = bearer_token(&req)
        .or_else(|| cookie_token(&req))
        .ok_or_else(|| {
            Error::Unauthorized("You are not logged in! Please log in to get access.".to_string())
        })?;

    let claims = verify_token(&state.config, &token)?;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| Error::Unauthorized("Invalid token. Please log in again!".to_string()))?;

    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .filter(|user| user.active)
        .ok_or_else(|| {
            Error::Unauthorized("The user belonging to this token does no longer exist.".to_string())
        })?;

    if user.changed_password_after(claims.iat) {
        return Err(Error::Unauthorized(
            "User recently changed password! Please log in again.".to_string(),
        ));
    }

    tracing::debug!(user_id = %user.id, "authenticated request");
    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

/// Must run inside [`protect`].
pub async fn restrict_to(req: Request, next: Next, allowed: &[Role]) -> Result<Response> {
    let permitted = req
        .extensions()
        .get::<CurrentUser>()
        .map(|CurrentUser(user)| allowed.contains(&user.role))
        .unwrap_or(false);

    if !permitted {
        return Err(Error::Forbidden(
            "You do not have permission to perform this action".to_string(),
        ));
    }
    Ok(next.run(req).await)
}
