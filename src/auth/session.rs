use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rusqlite::{params, OptionalExtension};

use crate::db::models::Session;
use crate::db::{self, unique_violation};
use crate::error::{AppError, AppResult};
use crate::state::DbPool;

const MAX_TOKEN_ATTEMPTS: usize = 3;

/// The user a valid session token resolves to.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOwner {
    pub user_id: i64,
    pub username: String,
}

/// Server-side session rows keyed by an opaque random token.
#[derive(Clone)]
pub struct SessionStore {
    pool: DbPool,
    lifetime: Duration,
}

impl SessionStore {
    pub fn new(pool: DbPool, lifetime: Duration) -> Self {
        Self { pool, lifetime }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Create a new session for a user. A colliding token is regenerated.
    pub fn create(&self, user_id: i64, now: DateTime<Utc>) -> AppResult<Session> {
        self.create_with(user_id, now, generate_token)
    }

    fn create_with(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
        mut next_token: impl FnMut() -> String,
    ) -> AppResult<Session> {
        let conn = self.pool.get()?;
        let created_at = db::timestamp(now);
        let expires_at = db::timestamp(now + self.lifetime);

        for _ in 0..MAX_TOKEN_ATTEMPTS {
            let token = next_token();
            let inserted = conn.execute(
                "INSERT INTO sessions (id, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
                params![token, user_id, created_at, expires_at],
            );

            match inserted {
                Ok(_) => {
                    return Ok(Session {
                        id: token,
                        user_id,
                        created_at,
                        expires_at,
                    })
                }
                Err(e) if unique_violation(&e) == Some("sessions.id") => {
                    tracing::warn!("Session token collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::Internal(
            "could not allocate a unique session token".into(),
        ))
    }

    /// Resolve a token to its owner. Missing and expired tokens are both
    /// `Unauthorized`; an expired row is deleted on the way out.
    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> AppResult<SessionOwner> {
        let conn = self.pool.get()?;
        let row = conn
            .query_row(
                "SELECT s.user_id, u.name, s.expires_at FROM sessions s \
                 JOIN users u ON u.id = s.user_id \
                 WHERE s.id = ?1",
                params![token],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((user_id, username, expires_at)) = row else {
            return Err(AppError::Unauthorized);
        };

        if expires_at <= db::timestamp(now) {
            conn.execute("DELETE FROM sessions WHERE id = ?1", params![token])?;
            return Err(AppError::Unauthorized);
        }

        Ok(SessionOwner { user_id, username })
    }

    /// Delete a session by token. Deleting an absent session is not an error.
    pub fn revoke(&self, token: &str) -> AppResult<()> {
        let conn = self.pool.get()?;
        conn.execute("DELETE FROM sessions WHERE id = ?1", params![token])?;
        Ok(())
    }

    pub fn revoke_all_for_user(&self, user_id: i64) -> AppResult<u64> {
        let conn = self.pool.get()?;
        let rows = conn.execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id])?;
        Ok(rows as u64)
    }

    /// Push the expiry of the user's session to `now + lifetime`.
    /// Returns false when no such session exists.
    pub fn refresh(&self, user_id: i64, token: &str, now: DateTime<Utc>) -> AppResult<bool> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "UPDATE sessions SET expires_at = ?1 WHERE id = ?2 AND user_id = ?3",
            params![db::timestamp(now + self.lifetime), token, user_id],
        )?;
        Ok(rows > 0)
    }

    /// Session to hand out after a successful login: the presented one is
    /// refreshed when it still belongs to this user, otherwise every other
    /// session of the user is dropped and a fresh one is created.
    pub fn login(
        &self,
        user_id: i64,
        presented: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<Session> {
        if let Some(token) = presented {
            match self.validate(token, now) {
                Ok(owner) if owner.user_id == user_id => {
                    if self.refresh(user_id, token, now)? {
                        return self.get(token)?.ok_or(AppError::Unauthorized);
                    }
                }
                Ok(_) | Err(AppError::Unauthorized) => {}
                Err(e) => return Err(e),
            }
        }

        self.revoke_all_for_user(user_id)?;
        self.create(user_id, now)
    }

    pub fn get(&self, token: &str) -> AppResult<Option<Session>> {
        let conn = self.pool.get()?;
        let session = conn
            .query_row(
                "SELECT id, user_id, created_at, expires_at FROM sessions WHERE id = ?1",
                params![token],
                |row| {
                    Ok(Session {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        created_at: row.get(2)?,
                        expires_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(session)
    }

    /// Remove every expired session (returns count deleted).
    pub fn purge_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            params![db::timestamp(now)],
        )?;
        Ok(rows as u64)
    }
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

// -- Cookie helpers --

pub fn session_cookie(name: &str, token: &str, lifetime: Duration) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        name,
        token,
        lifetime.num_seconds()
    )
}

pub fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", name)
}
