//! In-memory Durable Store stand-in, used by tests that exercise the
//! Persistence Projector without a real SQLite file.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::traits::{
    GameCompletion, GameRecord, GameSnapshotUpdate, GamesRepository, MoveRow, MovesRepository,
    NewGame, RatingOutcome, UserRecord, UsersRepository,
};
use super::PersistenceError;

#[derive(Default)]
pub struct InMemoryStore {
    users: Mutex<HashMap<String, UserRecord>>,
    games: Mutex<HashMap<String, GameRecord>>,
    moves: Mutex<HashMap<String, Vec<MoveRow>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_user(&self, id: &str, elo_rating: i32) {
        self.users.lock().unwrap().insert(
            id.to_string(),
            UserRecord {
                id: id.to_string(),
                username: id.to_string(),
                email: format!("{id}@example.com"),
                password_hash: "x".into(),
                elo_rating,
                games_played: 0,
                games_won: 0,
                games_lost: 0,
                games_drawn: 0,
            },
        );
    }
}

#[async_trait]
impl UsersRepository for InMemoryStore {
    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, PersistenceError> {
        Ok(self.users.lock().unwrap().get(id).cloned())
    }

    async fn apply_rating_update(
        &self,
        user_id: &str,
        rating_delta: i32,
        outcome: RatingOutcome,
    ) -> Result<(), PersistenceError> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(user_id).ok_or(PersistenceError::NotFound)?;
        user.elo_rating += rating_delta;
        user.games_played += 1;
        match outcome {
            RatingOutcome::Win => user.games_won += 1,
            RatingOutcome::Loss => user.games_lost += 1,
            RatingOutcome::Draw => user.games_drawn += 1,
        }
        Ok(())
    }
}

#[async_trait]
impl GamesRepository for InMemoryStore {
    async fn insert_game(&self, game: &NewGame) -> Result<(), PersistenceError> {
        self.games.lock().unwrap().insert(
            game.id.clone(),
            GameRecord {
                id: game.id.clone(),
                white_id: game.white_id.clone(),
                black_id: game.black_id.clone(),
                time_control_ms: game.time_control_ms,
                increment_ms: game.increment_ms,
                delay_ms: game.delay_ms,
                delay_mode: game.delay_mode.clone(),
                fen: chess::Position::startpos().to_fen(),
                pgn: String::new(),
                white_remaining_ms: game.time_control_ms,
                black_remaining_ms: game.time_control_ms,
                active_color: Some("white".into()),
                status: "lobby".into(),
                result: None,
                winner_id: None,
                end_reason: None,
            },
        );
        Ok(())
    }

    async fn update_snapshot(&self, update: GameSnapshotUpdate<'_>) -> Result<(), PersistenceError> {
        let mut games = self.games.lock().unwrap();
        let game = games.get_mut(update.game_id).ok_or(PersistenceError::NotFound)?;
        if let Some(w) = update.white_id {
            game.white_id = Some(w.to_string());
        }
        if let Some(b) = update.black_id {
            game.black_id = Some(b.to_string());
        }
        game.fen = update.fen.to_string();
        game.pgn = update.pgn.to_string();
        game.white_remaining_ms = update.white_remaining_ms;
        game.black_remaining_ms = update.black_remaining_ms;
        game.active_color = update.active_color.map(str::to_string);
        game.status = update.status.to_string();
        Ok(())
    }

    async fn complete_game(
        &self,
        completion: GameCompletion<'_>,
        white_delta: Option<i32>,
        black_delta: Option<i32>,
    ) -> Result<(), PersistenceError> {
        let (white_id, black_id) = {
            let mut games = self.games.lock().unwrap();
            let game = games.get_mut(completion.game_id).ok_or(PersistenceError::NotFound)?;
            if game.status == "completed" {
                return Ok(());
            }
            game.status = "completed".into();
            game.result = Some(completion.result.to_string());
            game.winner_id = completion.winner_id.map(str::to_string);
            game.end_reason = Some(completion.end_reason.to_string());
            (game.white_id.clone(), game.black_id.clone())
        };

        let outcome_for = |is_white: bool| match completion.result {
            "white-wins" if is_white => RatingOutcome::Win,
            "white-wins" => RatingOutcome::Loss,
            "black-wins" if is_white => RatingOutcome::Loss,
            "black-wins" => RatingOutcome::Win,
            _ => RatingOutcome::Draw,
        };

        if let (Some(id), Some(delta)) = (white_id, white_delta) {
            self.apply_rating_update(&id, delta, outcome_for(true)).await?;
        }
        if let (Some(id), Some(delta)) = (black_id, black_delta) {
            self.apply_rating_update(&id, delta, outcome_for(false)).await?;
        }
        Ok(())
    }

    async fn get_game(&self, id: &str) -> Result<Option<GameRecord>, PersistenceError> {
        Ok(self.games.lock().unwrap().get(id).cloned())
    }

    async fn list_lobby(&self, limit: i64, offset: i64) -> Result<Vec<GameRecord>, PersistenceError> {
        let games = self.games.lock().unwrap();
        let mut lobby: Vec<GameRecord> =
            games.values().filter(|g| g.status == "lobby").cloned().collect();
        lobby.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(lobby
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }
}

#[async_trait]
impl MovesRepository for InMemoryStore {
    async fn record_move(&self, game_id: &str, row: &MoveRow) -> Result<(), PersistenceError> {
        let mut moves = self.moves.lock().unwrap();
        let entries = moves.entry(game_id.to_string()).or_default();
        if !entries.iter().any(|m| m.ordinal == row.ordinal) {
            entries.push(row.clone());
        }
        Ok(())
    }

    async fn list_moves(
        &self,
        game_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<MoveRow>, i64), PersistenceError> {
        let moves = self.moves.lock().unwrap();
        let all = moves.get(game_id).cloned().unwrap_or_default();
        let total = all.len() as i64;
        let page = all
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }
}
