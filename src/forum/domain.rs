// Domain types - pure, no database access
use std::str::FromStr;

use crate::auth::credentials::is_printable;
use crate::error::AppError;

pub const MAX_TITLE_CHARS: usize = 150;
pub const MAX_CONTENT_CHARS: usize = 50_000;
pub const MAX_COMMENT_CHARS: usize = 1_000;

/// The category allow-list. Labels match exactly, case included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Technology,
    Science,
    Art,
    Gaming,
    Other,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Technology,
        Category::Science,
        Category::Art,
        Category::Gaming,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Technology => "Technology",
            Category::Science => "Science",
            Category::Art => "Art",
            Category::Gaming => "Gaming",
            Category::Other => "Other",
        }
    }
}

impl FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| AppError::validation("This category doesn't exist"))
    }
}

/// Parse labels against the allow-list, dropping repeats but keeping order.
pub fn parse_categories<'a>(
    labels: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<Category>, AppError> {
    let mut categories = Vec::new();
    for label in labels {
        let category: Category = label.parse()?;
        if !categories.contains(&category) {
            categories.push(category);
        }
    }
    Ok(categories)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Like,
    Dislike,
}

impl Polarity {
    pub fn is_like(&self) -> bool {
        matches!(self, Polarity::Like)
    }
}

impl FromStr for Polarity {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(Polarity::Like),
            "dislike" => Ok(Polarity::Dislike),
            _ => Err(AppError::validation("Unknown reaction")),
        }
    }
}

/// Something a user can react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Post(i64),
    Comment(i64),
}

impl Target {
    /// Parse the `target`/`id` form pair. A malformed id is a missing target.
    pub fn parse(kind: &str, id: &str) -> Result<Self, AppError> {
        let build: fn(i64) -> Target = match kind {
            "post" => Target::Post,
            "comment" => Target::Comment,
            _ => {
                return Err(AppError::validation(
                    "You can only react to a post or a comment",
                ))
            }
        };
        id.trim()
            .parse::<i64>()
            .map(build)
            .map_err(|_| AppError::NotFound)
    }

    pub fn id(&self) -> i64 {
        match self {
            Target::Post(id) | Target::Comment(id) => *id,
        }
    }

    pub(crate) fn column(&self) -> &'static str {
        match self {
            Target::Post(_) => "post_id",
            Target::Comment(_) => "comment_id",
        }
    }
}

/// A user's opinion on one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReactionState {
    Disliked,
    #[default]
    Neutral,
    Liked,
}

impl ReactionState {
    pub fn from_is_like(is_like: Option<bool>) -> Self {
        match is_like {
            Some(true) => ReactionState::Liked,
            Some(false) => ReactionState::Disliked,
            None => ReactionState::Neutral,
        }
    }

    /// Repeating the current polarity retracts it; the opposite one switches.
    pub fn apply(self, action: Polarity) -> Self {
        match (self, action) {
            (ReactionState::Liked, Polarity::Like) => ReactionState::Neutral,
            (ReactionState::Disliked, Polarity::Dislike) => ReactionState::Neutral,
            (_, Polarity::Like) => ReactionState::Liked,
            (_, Polarity::Dislike) => ReactionState::Disliked,
        }
    }

    /// `-1` disliked, `0` neutral, `1` liked.
    pub fn as_i8(&self) -> i8 {
        match self {
            ReactionState::Disliked => -1,
            ReactionState::Neutral => 0,
            ReactionState::Liked => 1,
        }
    }

    pub fn is_liked(&self) -> bool {
        matches!(self, ReactionState::Liked)
    }

    pub fn is_disliked(&self) -> bool {
        matches!(self, ReactionState::Disliked)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListFilter {
    #[default]
    All,
    Mine,
    Liked,
}

impl ListFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListFilter::All => "",
            ListFilter::Mine => "mine",
            ListFilter::Liked => "liked",
        }
    }

    pub fn needs_user(&self) -> bool {
        !matches!(self, ListFilter::All)
    }
}

impl FromStr for ListFilter {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(ListFilter::All),
            "mine" => Ok(ListFilter::Mine),
            "liked" => Ok(ListFilter::Liked),
            _ => Err(AppError::validation("Unknown filter")),
        }
    }
}

fn printable_text(c: char) -> bool {
    is_printable(c) || matches!(c, '\n' | '\r' | '\t')
}

/// A validated post, ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    pub categories: Vec<Category>,
}

impl PostDraft {
    pub fn parse(title: &str, content: &str, categories: &[String]) -> Result<Self, AppError> {
        let title = title.trim();
        let content = content.trim();

        if title.is_empty() {
            return Err(AppError::validation("Title is empty"));
        }
        if content.is_empty() {
            return Err(AppError::validation("Content is empty"));
        }
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(AppError::validation(
                "The title can be at most 150 characters",
            ));
        }
        if content.chars().count() > MAX_CONTENT_CHARS {
            return Err(AppError::validation(
                "The content can be at most 50000 characters",
            ));
        }
        if !title.chars().all(is_printable) || !content.chars().all(printable_text) {
            return Err(AppError::validation(
                "Only printable characters are allowed",
            ));
        }
        if categories.is_empty() {
            return Err(AppError::validation("Pick at least one category"));
        }
        let categories = parse_categories(categories.iter().map(String::as_str))?;

        Ok(Self {
            title: title.to_string(),
            content: content.to_string(),
            categories,
        })
    }
}

/// Validate and normalise a comment body.
pub fn parse_comment(content: &str) -> Result<String, AppError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::validation("Comment must not be empty"));
    }
    if content.chars().count() > MAX_COMMENT_CHARS {
        return Err(AppError::validation(
            "A comment can be at most 1000 characters",
        ));
    }
    if !content.chars().all(printable_text) {
        return Err(AppError::validation(
            "Only printable characters are allowed",
        ));
    }
    Ok(content.to_string())
}
