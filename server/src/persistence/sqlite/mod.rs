//! SQLite-backed repository implementations.
//!
//! [`Database`] wraps a `sqlx::SqlitePool` configured with WAL journaling,
//! foreign keys enabled, and embedded migrations (`sqlx::migrate!`) run
//! automatically on [`Database::open`]. Each `Sqlite*Repository` holds a
//! cloned pool and implements the corresponding trait from
//! [`crate::persistence::traits`].

mod database;
mod games_repo;
mod moves_repo;
mod users_repo;

pub use database::Database;
pub use games_repo::SqliteGamesRepository;
pub use moves_repo::SqliteMovesRepository;
pub use users_repo::SqliteUsersRepository;
