pub mod credentials;
pub mod handlers;
pub mod session;
pub mod users;

pub use session::{SessionOwner, SessionStore};
pub use users::UserRepository;
