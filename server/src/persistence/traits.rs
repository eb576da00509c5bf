//! Async repository trait definitions for the persistence layer.
//!
//! `#[async_trait]` boxes each method's future so these traits stay
//! object-safe: the projector and HTTP handlers hold `Arc<dyn ...
//! Repository>` rather than carrying a backend type parameter around.

use async_trait::async_trait;

use super::PersistenceError;

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub elo_rating: i32,
    pub games_played: i32,
    pub games_won: i32,
    pub games_lost: i32,
    pub games_drawn: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingOutcome {
    Win,
    Loss,
    Draw,
}

/// Repository for player accounts and their rating history.
///
/// `apply_rating_update` and the two-user transaction it participates in
/// (see [`super::Projector`]) are the only writers of `elo_rating`.
#[async_trait]
pub trait UsersRepository: Send + Sync {
    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, PersistenceError>;

    async fn apply_rating_update(
        &self,
        user_id: &str,
        rating_delta: i32,
        outcome: RatingOutcome,
    ) -> Result<(), PersistenceError>;
}

/// A just-created session has exactly one seat filled — whichever color
/// the creator picked (or was dealt by the matchmaker's coin flip). The
/// other id is `None` until a second player joins.
#[derive(Debug, Clone)]
pub struct NewGame {
    pub id: String,
    pub white_id: Option<String>,
    pub black_id: Option<String>,
    pub game_mode: String,
    pub time_control_ms: i64,
    pub increment_ms: i64,
    pub delay_ms: i64,
    pub delay_mode: String,
}

#[derive(Debug, Clone)]
pub struct GameRecord {
    pub id: String,
    pub white_id: Option<String>,
    pub black_id: Option<String>,
    pub time_control_ms: i64,
    pub increment_ms: i64,
    pub delay_ms: i64,
    pub delay_mode: String,
    pub fen: String,
    pub pgn: String,
    pub white_remaining_ms: i64,
    pub black_remaining_ms: i64,
    pub active_color: Option<String>,
    pub status: String,
    pub result: Option<String>,
    pub winner_id: Option<String>,
    pub end_reason: Option<String>,
}

/// Snapshot fields written back on every session mutation. Kept narrow
/// (no move history) since moves are appended separately, idempotently,
/// by [`MovesRepository::record_move`].
#[derive(Debug, Clone)]
pub struct GameSnapshotUpdate<'a> {
    pub game_id: &'a str,
    pub white_id: Option<&'a str>,
    pub black_id: Option<&'a str>,
    pub fen: &'a str,
    pub pgn: &'a str,
    pub white_remaining_ms: i64,
    pub black_remaining_ms: i64,
    pub active_color: Option<&'a str>,
    pub status: &'a str,
}

/// Fields written transactionally at game completion, alongside the two
/// rating-bearing user rows.
#[derive(Debug, Clone)]
pub struct GameCompletion<'a> {
    pub game_id: &'a str,
    pub result: &'a str,
    pub winner_id: Option<&'a str>,
    pub end_reason: &'a str,
}

#[async_trait]
pub trait GamesRepository: Send + Sync {
    async fn insert_game(&self, game: &NewGame) -> Result<(), PersistenceError>;

    async fn update_snapshot(&self, update: GameSnapshotUpdate<'_>) -> Result<(), PersistenceError>;

    /// Atomically marks the game completed and applies both players'
    /// rating deltas in a single transaction (law: game completion and
    /// rating update are never observed separately).
    async fn complete_game(
        &self,
        completion: GameCompletion<'_>,
        white_delta: Option<i32>,
        black_delta: Option<i32>,
    ) -> Result<(), PersistenceError>;

    async fn get_game(&self, id: &str) -> Result<Option<GameRecord>, PersistenceError>;

    async fn list_lobby(&self, limit: i64, offset: i64) -> Result<Vec<GameRecord>, PersistenceError>;
}

#[derive(Debug, Clone)]
pub struct MoveRow {
    pub ordinal: i64,
    pub color: String,
    pub from: String,
    pub to: String,
    pub san: String,
    pub captured: Option<String>,
    pub is_check: bool,
    pub is_checkmate: bool,
    pub is_castle: bool,
    pub is_en_passant: bool,
    pub promotion: Option<String>,
    pub elapsed_ms: i64,
}

/// Repository for recorded moves. Writes are idempotent on `(game_id,
/// ordinal)` so a projector retry after a crash never double-inserts.
#[async_trait]
pub trait MovesRepository: Send + Sync {
    async fn record_move(&self, game_id: &str, row: &MoveRow) -> Result<(), PersistenceError>;

    async fn list_moves(
        &self,
        game_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<MoveRow>, i64), PersistenceError>;
}
