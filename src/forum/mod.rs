pub mod domain;
pub mod posts;
pub mod reactions;

pub use domain::{Category, ListFilter, Polarity, PostDraft, ReactionState, Target};
pub use posts::{CommentView, PostRepository, PostView};
pub use reactions::ReactionEngine;
