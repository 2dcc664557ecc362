use askama::Template;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use chrono::Utc;
use serde::Deserialize;

use crate::auth::credentials::{validate_login, validate_registration};
use crate::auth::session::{clear_session_cookie, session_cookie};
use crate::error::{AppError, AppResult};
use crate::extractors::{MaybeUser, SessionToken, ValidForm};
use crate::routes::home::Html;
use crate::state::AppState;

const LOGIN_FAILED: &str = "Invalid username or password";

// -- Templates --

#[derive(Template, Default)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub logged_in: bool,
    pub username: String,
    pub message: String,
    pub login_name: String,
}

#[derive(Template, Default)]
#[template(path = "pages/register.html")]
pub struct RegisterTemplate {
    pub logged_in: bool,
    pub username: String,
    pub message: String,
    pub name: String,
    pub email: String,
}

// -- Request types --

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

fn login_failed(login_name: &str, message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Html(LoginTemplate {
            message: message.to_string(),
            login_name: login_name.to_string(),
            ..Default::default()
        }),
    )
        .into_response()
}

fn register_failed(name: &str, email: &str, message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Html(RegisterTemplate {
            message: message.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            ..Default::default()
        }),
    )
        .into_response()
}

/// Run bcrypt-heavy work off the async runtime.
async fn run_blocking<T, F>(work: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Internal(format!("Task join error: {}", e)))?
}

/// 303 back to the front page carrying a fresh session cookie.
fn signed_in(state: &AppState, token: &str) -> Response {
    let cookie = session_cookie(state.cookie_name(), token, state.sessions.lifetime());
    (
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, "/".to_string()),
            (header::SET_COOKIE, cookie),
        ],
    )
        .into_response()
}

// -- Login --

pub async fn login_page(maybe_user: MaybeUser) -> Response {
    if maybe_user.0.is_some() {
        return Redirect::to("/").into_response();
    }
    Html(LoginTemplate::default()).into_response()
}

pub async fn login(
    State(state): State<AppState>,
    SessionToken(presented): SessionToken,
    ValidForm(form): ValidForm<LoginForm>,
) -> AppResult<Response> {
    let login_name = form.username.trim();
    if let Err(e) = validate_login(login_name, &form.password) {
        return Ok(login_failed(login_name, &e.to_string()));
    }

    let users = state.users.clone();
    let (login, password) = (login_name.to_string(), form.password.clone());
    let authenticated = run_blocking(move || users.authenticate(&login, &password)).await?;
    let Some(user) = authenticated else {
        tracing::info!("Failed login attempt");
        return Ok(login_failed(login_name, LOGIN_FAILED));
    };

    let session = state
        .sessions
        .login(user.id, presented.as_deref(), Utc::now())?;
    tracing::info!(user_id = user.id, "User logged in");

    Ok(signed_in(&state, &session.id))
}

// -- Registration --

pub async fn register_page(maybe_user: MaybeUser) -> Response {
    if maybe_user.0.is_some() {
        return Redirect::to("/").into_response();
    }
    Html(RegisterTemplate::default()).into_response()
}

pub async fn register(
    State(state): State<AppState>,
    ValidForm(form): ValidForm<RegisterForm>,
) -> AppResult<Response> {
    let name = form.name.trim();
    let email = form.email.trim();
    if let Err(e) = validate_registration(name, email, &form.password) {
        return Ok(register_failed(name, email, &e.to_string()));
    }

    let users = state.users.clone();
    let (new_name, new_email, password) = (name.to_string(), email.to_string(), form.password.clone());
    let registered = run_blocking(move || users.register(&new_name, &new_email, &password)).await;
    let user_id = match registered {
        Ok(id) => id,
        Err(AppError::Validation(msg)) => return Ok(register_failed(name, email, &msg)),
        Err(e) => return Err(e),
    };
    tracing::info!(user_id, "Registered new user");

    let session = state.sessions.create(user_id, Utc::now())?;
    Ok(signed_in(&state, &session.id))
}

// -- Logout --

pub async fn logout(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
) -> AppResult<Response> {
    if let Some(token) = token {
        state.sessions.revoke(&token)?;
        tracing::info!("User logged out");
    }

    Ok((
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, "/".to_string()),
            (header::SET_COOKIE, clear_session_cookie(state.cookie_name())),
        ],
    )
        .into_response())
}
