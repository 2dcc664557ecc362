use axum::extract::State;
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, ValidForm};
use crate::forum::{Polarity, Target};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ReactionForm {
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub redirect: String,
}

/// Where to send the user once the reaction is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Return {
    Home,
    Post,
}

impl Return {
    fn parse(raw: &str) -> AppResult<Self> {
        match raw {
            "home" => Ok(Return::Home),
            "" | "post" => Ok(Return::Post),
            _ => Err(AppError::validation("We cannot redirect you there")),
        }
    }
}

pub async fn react(
    State(state): State<AppState>,
    user: CurrentUser,
    ValidForm(form): ValidForm<ReactionForm>,
) -> AppResult<Response> {
    let action: Polarity = form.kind.parse()?;
    let target = Target::parse(&form.target, &form.id)?;
    let back = Return::parse(&form.redirect)?;

    let reaction = state.reactions.react(user.id, target, action)?;
    tracing::debug!(user_id = user.id, ?target, state = reaction.as_i8(), "Reaction applied");

    let location = match (target, back) {
        (Target::Comment(comment_id), _) => {
            let post_id = state
                .posts
                .comment_post_id(comment_id)?
                .ok_or(AppError::NotFound)?;
            format!("/posts/{}", post_id)
        }
        (Target::Post(_), Return::Home) => "/".to_string(),
        (Target::Post(post_id), Return::Post) => format!("/posts/{}", post_id),
    };

    Ok(Redirect::to(&location).into_response())
}
