use askama::Template;
use axum::extract::{RawQuery, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::{AppError, AppResult};
use crate::extractors::MaybeUser;
use crate::forum::domain::parse_categories;
use crate::forum::{Category, ListFilter, PostView};
use crate::state::AppState;

/// A category checkbox, ticked when it is part of the current selection.
pub struct CategoryOption {
    pub label: &'static str,
    pub selected: bool,
}

pub fn category_options(selected: &[Category]) -> Vec<CategoryOption> {
    Category::ALL
        .iter()
        .map(|c| CategoryOption {
            label: c.as_str(),
            selected: selected.contains(c),
        })
        .collect()
}

#[derive(Template)]
#[template(path = "pages/home.html")]
pub struct HomeTemplate {
    pub logged_in: bool,
    pub username: String,
    pub filter: &'static str,
    pub categories: Vec<CategoryOption>,
    pub posts: Vec<PostView>,
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

/// The front page query: `?filter=mine&category=Art&category=Science`.
#[derive(Debug, Default, PartialEq)]
pub struct ListQuery {
    pub filter: ListFilter,
    pub categories: Vec<Category>,
}

impl ListQuery {
    pub fn parse(query: &str) -> Result<Self, AppError> {
        let mut filter = ListFilter::All;
        let mut labels = Vec::new();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "filter" => filter = value.parse()?,
                "category" if !value.is_empty() => labels.push(value.into_owned()),
                _ => {}
            }
        }
        Ok(Self {
            filter,
            categories: parse_categories(labels.iter().map(String::as_str))?,
        })
    }
}

pub async fn index(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    RawQuery(query): RawQuery,
) -> AppResult<Response> {
    let query = ListQuery::parse(query.as_deref().unwrap_or_default())?;
    let posts = state
        .posts
        .list_posts(query.filter, &query.categories, maybe_user.id())?;

    let (logged_in, username) = match maybe_user.0 {
        Some(user) => (true, user.username),
        None => (false, String::new()),
    };

    Ok(Html(HomeTemplate {
        logged_in,
        username,
        filter: query.filter.as_str(),
        categories: category_options(&query.categories),
        posts,
    })
    .into_response())
}
