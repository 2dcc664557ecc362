use rusqlite::{params, OptionalExtension, TransactionBehavior};

use crate::db::models::Reaction;
use crate::db::unique_violation;
use crate::error::{AppError, AppResult};
use crate::forum::domain::{Polarity, ReactionState, Target};
use crate::state::DbPool;

// A unique violation means a concurrent toggle inserted first; the retry
// then sees that row and toggles it.
const MAX_ATTEMPTS: usize = 2;

/// Applies like/dislike actions, keeping at most one row per user and target.
#[derive(Clone)]
pub struct ReactionEngine {
    pool: DbPool,
}

enum Outcome {
    Done(ReactionState),
    LostRace,
}

impl ReactionEngine {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Apply `action` from `user_id` to `target` and return the new state.
    pub fn react(
        &self,
        user_id: i64,
        target: Target,
        action: Polarity,
    ) -> AppResult<ReactionState> {
        retry_lost_races(|| self.try_react(user_id, target, action))
    }

    fn try_react(&self, user_id: i64, target: Target, action: Polarity) -> AppResult<Outcome> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let table = match target {
            Target::Post(_) => "posts",
            Target::Comment(_) => "comments",
        };
        let exists: bool = tx.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)", table),
            params![target.id()],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(AppError::NotFound);
        }

        let existing = find_reaction(&tx, user_id, target)?;
        let current = ReactionState::from_is_like(existing.as_ref().map(|r| r.is_like));
        let next = current.apply(action);

        match (existing, next) {
            (None, _) => {
                if !insert_reaction(&tx, user_id, target, action)? {
                    return Ok(Outcome::LostRace);
                }
            }
            (Some(row), ReactionState::Neutral) => {
                tx.execute("DELETE FROM reactions WHERE id = ?1", params![row.id])?;
            }
            (Some(row), _) => {
                tx.execute(
                    "UPDATE reactions SET is_like = ?1 WHERE id = ?2",
                    params![action.is_like(), row.id],
                )?;
            }
        }

        tx.commit()?;
        Ok(Outcome::Done(next))
    }
}

/// Insert a fresh row. `false` when another row for the same user and
/// target got there first.
fn insert_reaction(
    conn: &rusqlite::Connection,
    user_id: i64,
    target: Target,
    action: Polarity,
) -> AppResult<bool> {
    let inserted = conn.execute(
        &format!(
            "INSERT INTO reactions (user_id, {}, is_like) VALUES (?1, ?2, ?3)",
            target.column()
        ),
        params![user_id, target.id(), action.is_like()],
    );
    match inserted {
        Ok(_) => Ok(true),
        Err(e) if unique_violation(&e).is_some() => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Run `attempt` until it is not beaten by a concurrent insert, at most
/// `MAX_ATTEMPTS` times.
fn retry_lost_races(
    mut attempt: impl FnMut() -> AppResult<Outcome>,
) -> AppResult<ReactionState> {
    for _ in 0..MAX_ATTEMPTS {
        match attempt()? {
            Outcome::Done(state) => return Ok(state),
            Outcome::LostRace => {
                tracing::debug!("Reaction insert raced, retrying as toggle");
            }
        }
    }
    Err(AppError::Internal("reaction kept conflicting".into()))
}

fn find_reaction(
    conn: &rusqlite::Connection,
    user_id: i64,
    target: Target,
) -> AppResult<Option<Reaction>> {
    let reaction = conn
        .query_row(
            &format!(
                "SELECT id, user_id, post_id, comment_id, is_like FROM reactions \
                 WHERE user_id = ?1 AND {} = ?2",
                target.column()
            ),
            params![user_id, target.id()],
            |row| {
                Ok(Reaction {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    post_id: row.get(2)?,
                    comment_id: row.get(3)?,
                    is_like: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(reaction)
}
