use rusqlite::{params, OptionalExtension};
use std::sync::LazyLock;

use crate::db::models::User;
use crate::db::unique_violation;
use crate::error::{AppError, AppResult};
use crate::state::DbPool;

pub const NAME_TAKEN: &str = "This username is already taken";
pub const EMAIL_TAKEN: &str = "This email is already registered";

/// Verified against when the login matches nobody, so unknown and known
/// users cost the same bcrypt work.
static DUMMY_HASH: LazyLock<String> = LazyLock::new(|| {
    bcrypt::hash("dummy-never-matches", bcrypt::DEFAULT_COST)
        .expect("failed to generate dummy hash")
});

#[derive(Clone)]
pub struct UserRepository {
    pool: DbPool,
    bcrypt_cost: u32,
}

impl UserRepository {
    pub fn new(pool: DbPool, bcrypt_cost: u32) -> Self {
        Self { pool, bcrypt_cost }
    }

    /// Insert a new user with a bcrypt-hashed password. A duplicate name or
    /// email is a `Validation` error naming the field.
    pub fn register(&self, name: &str, email: &str, password: &str) -> AppResult<i64> {
        let conn = self.pool.get()?;

        let (name_taken, email_taken): (bool, bool) = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE name = ?1), \
                    EXISTS(SELECT 1 FROM users WHERE email = ?2)",
            params![name, email],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        if name_taken {
            return Err(AppError::validation(NAME_TAKEN));
        }
        if email_taken {
            return Err(AppError::validation(EMAIL_TAKEN));
        }

        let hash = bcrypt::hash(password, self.bcrypt_cost)?;

        // The UNIQUE constraints still decide if another registration raced us
        match conn.execute(
            "INSERT INTO users (name, email, password_hash) VALUES (?1, ?2, ?3)",
            params![name, email, hash],
        ) {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(e) => match unique_violation(&e) {
                Some("users.name") => Err(AppError::validation(NAME_TAKEN)),
                Some("users.email") => Err(AppError::validation(EMAIL_TAKEN)),
                _ => Err(e.into()),
            },
        }
    }

    /// Look up a user by email when `login` holds an '@', by name otherwise.
    pub fn find_by_login(&self, login: &str) -> AppResult<Option<User>> {
        let column = if login.contains('@') { "email" } else { "name" };
        let conn = self.pool.get()?;
        let user = conn
            .query_row(
                &format!(
                    "SELECT id, name, email, password_hash, created_at FROM users \
                     WHERE {} = ?1",
                    column
                ),
                params![login],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        email: row.get(2)?,
                        password_hash: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    /// Check a login attempt. `None` covers both an unknown user and a wrong
    /// password.
    pub fn authenticate(&self, login: &str, password: &str) -> AppResult<Option<User>> {
        let Some(user) = self.find_by_login(login)? else {
            bcrypt::verify(password, DUMMY_HASH.as_str())?;
            return Ok(None);
        };
        if bcrypt::verify(password, &user.password_hash)? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }
}
