use askama::Template;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, FormPairs, MaybeUser, ValidForm};
use crate::forum::domain::parse_comment;
use crate::forum::{Category, PostDraft, PostView};
use crate::routes::home::{category_options, CategoryOption, Html};
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/new_post.html")]
pub struct NewPostTemplate {
    pub logged_in: bool,
    pub username: String,
    pub message: String,
    pub title: String,
    pub content: String,
    pub categories: Vec<CategoryOption>,
}

#[derive(Template)]
#[template(path = "pages/post.html")]
pub struct PostTemplate {
    pub logged_in: bool,
    pub username: String,
    pub post: PostView,
    pub message: String,
    pub draft: String,
}

#[derive(Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub content: String,
}

/// Non-numeric ids name no post at all.
fn parse_post_id(raw: &str) -> AppResult<i64> {
    raw.parse().map_err(|_| AppError::NotFound)
}

pub async fn new_post_page(user: CurrentUser) -> Response {
    Html(NewPostTemplate {
        logged_in: true,
        username: user.username,
        message: String::new(),
        title: String::new(),
        content: String::new(),
        categories: category_options(&[]),
    })
    .into_response()
}

/// Takes form pairs so repeated `categories` fields survive.
pub async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    FormPairs(pairs): FormPairs,
) -> AppResult<Response> {
    let mut title = String::new();
    let mut content = String::new();
    let mut labels = Vec::new();
    for (key, value) in pairs {
        match key.as_str() {
            "title" => title = value,
            "content" => content = value,
            "categories" => labels.push(value),
            _ => {}
        }
    }

    let draft = match PostDraft::parse(&title, &content, &labels) {
        Ok(draft) => draft,
        Err(AppError::Validation(message)) => {
            let ticked: Vec<Category> = labels.iter().filter_map(|l| l.parse().ok()).collect();
            let page = NewPostTemplate {
                logged_in: true,
                username: user.username,
                message,
                title,
                content,
                categories: category_options(&ticked),
            };
            return Ok((StatusCode::BAD_REQUEST, Html(page)).into_response());
        }
        Err(e) => return Err(e),
    };

    let post_id = state.posts.create_post(user.id, &draft)?;
    tracing::info!(user_id = user.id, post_id, "Post created");

    Ok(Redirect::to(&format!("/posts/{}", post_id)).into_response())
}

pub async fn show_post(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let post_id = parse_post_id(&id)?;
    let post = state.posts.get_post(post_id, maybe_user.id())?;

    let (logged_in, username) = match maybe_user.0 {
        Some(user) => (true, user.username),
        None => (false, String::new()),
    };

    Ok(Html(PostTemplate {
        logged_in,
        username,
        post,
        message: String::new(),
        draft: String::new(),
    })
    .into_response())
}

pub async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    ValidForm(form): ValidForm<CommentForm>,
) -> AppResult<Response> {
    let post_id = parse_post_id(&id)?;
    if !state.posts.post_exists(post_id)? {
        return Err(AppError::NotFound);
    }

    let content = match parse_comment(&form.content) {
        Ok(content) => content,
        Err(AppError::Validation(message)) => {
            let post = state.posts.get_post(post_id, Some(user.id))?;
            let page = PostTemplate {
                logged_in: true,
                username: user.username,
                post,
                message,
                draft: form.content,
            };
            return Ok((StatusCode::BAD_REQUEST, Html(page)).into_response());
        }
        Err(e) => return Err(e),
    };

    let comment_id = state.posts.add_comment(post_id, user.id, &content)?;
    tracing::debug!(user_id = user.id, post_id, comment_id, "Comment added");

    Ok(Redirect::to(&format!("/posts/{}", post_id)).into_response())
}
