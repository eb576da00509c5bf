//! Persistence layer for the chess backend.
//!
//! Repository traits in [`traits`] abstract over the Durable Store seam:
//! production code talks to [`sqlite`], tests talk to [`memory`]. Neither
//! backend is generic-dispatched; callers hold `Arc<dyn ... Repository>`
//! so the projector and HTTP handlers don't carry a backend type
//! parameter around.
//!
//! [`Projector`] is the Persistence Projector (component C7): it
//! subscribes to a session's event bus and writes moves and completion
//! state asynchronously, off the hot path of move validation.

pub mod memory;
pub mod projector;
pub mod sqlite;
pub mod traits;

pub use projector::Projector;
pub use traits::{
    GameCompletion, GameRecord, GameSnapshotUpdate, GamesRepository, MoveRow, MovesRepository,
    NewGame, RatingOutcome, UserRecord, UsersRepository,
};

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("SQLite error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(String),
    #[error("not found")]
    NotFound,
}
