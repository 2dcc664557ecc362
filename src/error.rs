use askama::Template;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }
}

#[derive(Template)]
#[template(path = "pages/error.html")]
pub struct ErrorTemplate {
    pub code: u16,
    pub message: String,
}

/// Render the shared error page; falls back to plain text if the template fails.
pub fn error_page(status: StatusCode, message: &str) -> Response {
    let page = ErrorTemplate {
        code: status.as_u16(),
        message: message.to_string(),
    };
    match page.render() {
        Ok(body) => (
            status,
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Template render error: {}", e);
            (status, message.to_string()).into_response()
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Unauthorized => Redirect::to("/login").into_response(),
            AppError::NotFound => error_page(StatusCode::NOT_FOUND, "Page not found"),
            AppError::Validation(msg) => error_page(StatusCode::BAD_REQUEST, msg),
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                error_page(StatusCode::INTERNAL_SERVER_ERROR, "Please try later")
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                error_page(StatusCode::INTERNAL_SERVER_ERROR, "Please try later")
            }
            AppError::Hash(e) => {
                tracing::error!("Password hashing error: {}", e);
                error_page(StatusCode::INTERNAL_SERVER_ERROR, "Please try later")
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                error_page(StatusCode::INTERNAL_SERVER_ERROR, "Please try later")
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
