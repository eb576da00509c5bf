use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::persistence::traits::{
    GameCompletion, GameRecord, GameSnapshotUpdate, GamesRepository, NewGame, RatingOutcome,
};
use crate::persistence::PersistenceError;

pub struct SqliteGamesRepository {
    pool: SqlitePool,
}

impl SqliteGamesRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GamesRepository for SqliteGamesRepository {
    async fn insert_game(&self, game: &NewGame) -> Result<(), PersistenceError> {
        sqlx::query(
            "INSERT INTO games (id, white_id, black_id, game_mode, time_control_ms, \
             increment_ms, delay_ms, delay_mode, fen, pgn, white_remaining_ms, \
             black_remaining_ms, active_color, status) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, '', ?10, ?10, 'white', 'lobby')",
        )
        .bind(&game.id)
        .bind(&game.white_id)
        .bind(&game.black_id)
        .bind(&game.game_mode)
        .bind(game.time_control_ms)
        .bind(game.increment_ms)
        .bind(game.delay_ms)
        .bind(&game.delay_mode)
        .bind(chess::Position::startpos().to_fen())
        .bind(game.time_control_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_snapshot(&self, update: GameSnapshotUpdate<'_>) -> Result<(), PersistenceError> {
        sqlx::query(
            "UPDATE games SET white_id = COALESCE(?1, white_id), black_id = COALESCE(?2, black_id), \
             fen = ?3, pgn = ?4, white_remaining_ms = ?5, black_remaining_ms = ?6, \
             active_color = ?7, status = ?8 WHERE id = ?9",
        )
        .bind(update.white_id)
        .bind(update.black_id)
        .bind(update.fen)
        .bind(update.pgn)
        .bind(update.white_remaining_ms)
        .bind(update.black_remaining_ms)
        .bind(update.active_color)
        .bind(update.status)
        .bind(update.game_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn complete_game(
        &self,
        completion: GameCompletion<'_>,
        white_delta: Option<i32>,
        black_delta: Option<i32>,
    ) -> Result<(), PersistenceError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE games SET status = 'completed', result = ?1, winner_id = ?2, \
             end_reason = ?3, completed_at = ?4 WHERE id = ?5 AND status != 'completed'",
        )
        .bind(completion.result)
        .bind(completion.winner_id)
        .bind(completion.end_reason)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(completion.game_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            // Already completed: a retried or duplicate event must not
            // re-apply rating deltas a second time.
            tx.commit().await?;
            return Ok(());
        }

        let game: (Option<String>, Option<String>) =
            sqlx::query_as("SELECT white_id, black_id FROM games WHERE id = ?1")
                .bind(completion.game_id)
                .fetch_one(&mut *tx)
                .await?;

        let outcome_for = |is_white: bool| -> RatingOutcome {
            match completion.result {
                "white-wins" if is_white => RatingOutcome::Win,
                "white-wins" => RatingOutcome::Loss,
                "black-wins" if is_white => RatingOutcome::Loss,
                "black-wins" => RatingOutcome::Win,
                _ => RatingOutcome::Draw,
            }
        };

        if let (Some(white_id), Some(delta)) = (&game.0, white_delta) {
            apply_rating_in_tx(&mut tx, white_id, delta, outcome_for(true)).await?;
        }
        if let (Some(black_id), Some(delta)) = (&game.1, black_delta) {
            apply_rating_in_tx(&mut tx, black_id, delta, outcome_for(false)).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_game(&self, id: &str) -> Result<Option<GameRecord>, PersistenceError> {
        let row = sqlx::query_as::<_, GameRow>(
            "SELECT id, white_id, black_id, time_control_ms, increment_ms, delay_ms, delay_mode, \
             fen, pgn, white_remaining_ms, black_remaining_ms, \
             active_color, status, result, winner_id, end_reason FROM games WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list_lobby(&self, limit: i64, offset: i64) -> Result<Vec<GameRecord>, PersistenceError> {
        let rows = sqlx::query_as::<_, GameRow>(
            "SELECT id, white_id, black_id, time_control_ms, increment_ms, delay_ms, delay_mode, \
             fen, pgn, white_remaining_ms, black_remaining_ms, \
             active_color, status, result, winner_id, end_reason FROM games \
             WHERE status = 'lobby' ORDER BY id LIMIT ?1 OFFSET ?2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Shared by `complete_game`: applies a rating update inside the caller's
/// open transaction rather than through [`SqliteUsersRepository`], which
/// only ever runs against the pool directly.
async fn apply_rating_in_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    user_id: &str,
    rating_delta: i32,
    outcome: RatingOutcome,
) -> Result<(), PersistenceError> {
    let (won, lost, drawn) = match outcome {
        RatingOutcome::Win => (1, 0, 0),
        RatingOutcome::Loss => (0, 1, 0),
        RatingOutcome::Draw => (0, 0, 1),
    };
    sqlx::query(
        "UPDATE users SET elo_rating = elo_rating + ?1, games_played = games_played + 1, \
         games_won = games_won + ?2, games_lost = games_lost + ?3, games_drawn = games_drawn + ?4, \
         updated_at = ?5 WHERE id = ?6",
    )
    .bind(rating_delta)
    .bind(won)
    .bind(lost)
    .bind(drawn)
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(user_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[derive(sqlx::FromRow)]
struct GameRow {
    id: String,
    white_id: Option<String>,
    black_id: Option<String>,
    time_control_ms: i64,
    increment_ms: i64,
    delay_ms: i64,
    delay_mode: String,
    fen: String,
    pgn: String,
    white_remaining_ms: i64,
    black_remaining_ms: i64,
    active_color: Option<String>,
    status: String,
    result: Option<String>,
    winner_id: Option<String>,
    end_reason: Option<String>,
}

impl From<GameRow> for GameRecord {
    fn from(row: GameRow) -> Self {
        GameRecord {
            id: row.id,
            white_id: row.white_id,
            black_id: row.black_id,
            time_control_ms: row.time_control_ms,
            increment_ms: row.increment_ms,
            delay_ms: row.delay_ms,
            delay_mode: row.delay_mode,
            fen: row.fen,
            pgn: row.pgn,
            white_remaining_ms: row.white_remaining_ms,
            black_remaining_ms: row.black_remaining_ms,
            active_color: row.active_color,
            status: row.status,
            result: row.result,
            winner_id: row.winner_id,
            end_reason: row.end_reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::sqlite::{Database, SqliteUsersRepository};

    async fn seed_user(pool: &SqlitePool, id: &str) {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, created_at, updated_at) \
             VALUES (?1, ?2, ?3, 'hash', ?4, ?4)",
        )
        .bind(id)
        .bind(format!("user-{id}"))
        .bind(format!("{id}@example.com"))
        .bind(now)
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let db = Database::open_in_memory().await.unwrap();
        seed_user(db.pool(), "black1").await;
        let repo = SqliteGamesRepository::new(db.pool().clone());
        repo.insert_game(&NewGame {
            id: "game1".into(),
            white_id: None,
            black_id: Some("black1".into()),
            game_mode: "standard".into(),
            time_control_ms: 180_000,
            increment_ms: 2_000,
            delay_ms: 0,
            delay_mode: "fischer".into(),
        })
        .await
        .unwrap();

        let game = repo.get_game("game1").await.unwrap().unwrap();
        assert_eq!(game.status, "lobby");
        assert_eq!(game.black_id.as_deref(), Some("black1"));
    }

    #[tokio::test]
    async fn completion_updates_both_players_transactionally() {
        let db = Database::open_in_memory().await.unwrap();
        seed_user(db.pool(), "white1").await;
        seed_user(db.pool(), "black1").await;
        let repo = SqliteGamesRepository::new(db.pool().clone());
        repo.insert_game(&NewGame {
            id: "game1".into(),
            white_id: Some("white1".into()),
            black_id: Some("black1".into()),
            game_mode: "standard".into(),
            time_control_ms: 180_000,
            increment_ms: 2_000,
            delay_ms: 0,
            delay_mode: "fischer".into(),
        })
        .await
        .unwrap();

        repo.complete_game(
            GameCompletion {
                game_id: "game1",
                result: "white-wins",
                winner_id: Some("white1"),
                end_reason: "checkmate",
            },
            Some(16),
            Some(-16),
        )
        .await
        .unwrap();

        let users = SqliteUsersRepository::new(db.pool().clone());
        use crate::persistence::traits::UsersRepository;
        let white = users.get_user("white1").await.unwrap().unwrap();
        let black = users.get_user("black1").await.unwrap().unwrap();
        assert_eq!(white.elo_rating, 1216);
        assert_eq!(black.elo_rating, 1184);
        assert_eq!(white.games_won, 1);
        assert_eq!(black.games_lost, 1);
    }
}
