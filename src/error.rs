use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{json, Value as JsonValue};

use crate::config::Environment;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    TooManyRequests(String),

    #[error("Invalid input data: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Multipart error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest(_) | Error::Validation(_) | Error::Json(_) => StatusCode::BAD_REQUEST,
            Error::Multipart(err) if err.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            Error::Multipart(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) | Error::Token(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Error::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Operational errors are anticipated and safe to show to the client verbatim.
    pub fn is_operational(&self) -> bool {
        !self.status_code().is_server_error()
    }

    fn public_message(&self) -> String {
        match self {
            Error::Validation(errors) => validation_message(errors),
            Error::Token(err) => match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    "Your token has expired! Please log in again.".to_string()
                }
                _ => "Invalid token. Please log in again!".to_string(),
            },
            Error::Json(err) => format!("Invalid request body: {}", err),
            Error::Multipart(err) => format!("Invalid upload: {}", err.body_text()),
            other => other.to_string(),
        }
    }
}

fn validation_message(errors: &validator::ValidationErrors) -> String {
    let mut parts: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(msg) => msg.to_string(),
                None => format!("{} is invalid ({})", field, e.code),
            })
        })
        .collect();
    parts.sort();
    format!("Invalid input data. {}", parts.join(". "))
}

/// Everything the centralized handler needs to render an error, carried as a
/// response extension from wherever the error was raised.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub message: String,
    pub operational: bool,
    pub detail: String,
    pub stack: Vec<String>,
    pub errors: Option<JsonValue>,
}

impl ErrorReport {
    fn from_error(err: &Error) -> Self {
        let mut stack = vec![err.to_string()];
        let mut source = std::error::Error::source(err);
        while let Some(cause) = source {
            stack.push(cause.to_string());
            source = cause.source();
        }

        let errors = match err {
            Error::Validation(errs) => serde_json::to_value(errs).ok(),
            _ => None,
        };

        Self {
            message: err.public_message(),
            operational: err.is_operational(),
            detail: format!("{:?}", err),
            stack,
            errors,
        }
    }

    pub fn render(&self, status: StatusCode, environment: Environment) -> JsonValue {
        let status_label = if status.is_client_error() {
            "fail"
        } else {
            "error"
        };

        let mut body = if environment.is_development() {
            json!({
                "status": status_label,
                "message": self.message,
                "error": self.detail,
                "stack": self.stack,
            })
        } else if self.operational {
            json!({
                "status": status_label,
                "message": self.message,
            })
        } else {
            json!({
                "status": "error",
                "message": "Something went wrong!",
            })
        };

        if let (Some(errors), Some(obj)) = (&self.errors, body.as_object_mut()) {
            obj.insert("errors".to_string(), errors.clone());
        }
        body
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let report = ErrorReport::from_error(&self);
        let mut response = status.into_response();
        response.extensions_mut().insert(report);
        response
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("No document found with that ID".to_string()),
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                let field = db
                    .constraint()
                    .map(|c| c.trim_start_matches("users_").trim_end_matches("_key").to_string())
                    .unwrap_or_else(|| "value".to_string());
                Error::BadRequest(format!(
                    "Duplicate field value for {}. Please use another value!",
                    field
                ))
            }
            // invalid_text_representation, invalid_datetime_format, datetime_field_overflow
            sqlx::Error::Database(db)
                if matches!(db.code().as_deref(), Some("22P02" | "22007" | "22008")) =>
            {
                Error::BadRequest(format!("Invalid input value: {}", db.message()))
            }
            other => Error::Database(other),
        }
    }
}

/// Outermost layer: turns every `ErrorReport` produced below it into the JSON
/// error envelope for the configured environment.
pub async fn global_error_handler(
    State(environment): State<Environment>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let mut response = next.run(req).await;

    let Some(report) = response.extensions_mut().remove::<ErrorReport>() else {
        return response;
    };

    let status = response.status();
    if report.operational {
        tracing::debug!(%method, %uri, %status, message = %report.message, "request failed");
    } else {
        tracing::error!(%method, %uri, %status, error = %report.detail, "unexpected error");
    }

    let body = report.render(status, environment);
    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.remove(header::CONTENT_ENCODING);
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    Response::from_parts(parts, Body::from(body.to_string()))
}
