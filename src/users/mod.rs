pub mod repo;
pub mod repo_types;

pub use repo::{InMemoryUserRepository, PgUserRepository, UserRepository};
pub use repo_types::{NewUser, PublicUser, User};
