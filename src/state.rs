use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::{SessionStore, UserRepository};
use crate::config::Config;
use crate::forum::{PostRepository, ReactionEngine};

pub type DbPool = Pool<SqliteConnectionManager>;

/// Services shared by every request, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sessions: SessionStore,
    pub users: UserRepository,
    pub posts: PostRepository,
    pub reactions: ReactionEngine,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> Self {
        Self {
            sessions: SessionStore::new(db.clone(), config.session_lifetime()),
            users: UserRepository::new(db.clone(), config.auth.bcrypt_cost),
            posts: PostRepository::new(db.clone()),
            reactions: ReactionEngine::new(db),
            config,
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.config.auth.cookie_name
    }
}
