use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::persistence::traits::{MoveRow, MovesRepository};
use crate::persistence::PersistenceError;

pub struct SqliteMovesRepository {
    pool: SqlitePool,
}

impl SqliteMovesRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MovesRepository for SqliteMovesRepository {
    async fn record_move(&self, game_id: &str, row: &MoveRow) -> Result<(), PersistenceError> {
        let id = format!("{game_id}-{}", row.ordinal);
        sqlx::query(
            "INSERT OR IGNORE INTO moves (id, game_id, ordinal, color, from_square, to_square, \
             san, captured, is_check, is_checkmate, is_castle, is_en_passant, promotion, \
             elapsed_ms, ts) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        )
        .bind(id)
        .bind(game_id)
        .bind(row.ordinal)
        .bind(&row.color)
        .bind(&row.from)
        .bind(&row.to)
        .bind(&row.san)
        .bind(&row.captured)
        .bind(row.is_check)
        .bind(row.is_checkmate)
        .bind(row.is_castle)
        .bind(row.is_en_passant)
        .bind(&row.promotion)
        .bind(row.elapsed_ms)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_moves(
        &self,
        game_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<MoveRow>, i64), PersistenceError> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM moves WHERE game_id = ?1")
            .bind(game_id)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, StoredMoveRow>(
            "SELECT ordinal, color, from_square, to_square, san, captured, is_check, \
             is_checkmate, is_castle, is_en_passant, promotion, elapsed_ms FROM moves \
             WHERE game_id = ?1 ORDER BY ordinal LIMIT ?2 OFFSET ?3",
        )
        .bind(game_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total.0))
    }
}

#[derive(sqlx::FromRow)]
struct StoredMoveRow {
    ordinal: i64,
    color: String,
    from_square: String,
    to_square: String,
    san: String,
    captured: Option<String>,
    is_check: bool,
    is_checkmate: bool,
    is_castle: bool,
    is_en_passant: bool,
    promotion: Option<String>,
    elapsed_ms: i64,
}

impl From<StoredMoveRow> for MoveRow {
    fn from(row: StoredMoveRow) -> Self {
        MoveRow {
            ordinal: row.ordinal,
            color: row.color,
            from: row.from_square,
            to: row.to_square,
            san: row.san,
            captured: row.captured,
            is_check: row.is_check,
            is_checkmate: row.is_checkmate,
            is_castle: row.is_castle,
            is_en_passant: row.is_en_passant,
            promotion: row.promotion,
            elapsed_ms: row.elapsed_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::sqlite::{Database, SqliteGamesRepository};
    use crate::persistence::traits::{GamesRepository, NewGame};

    async fn seeded_game(pool: &SqlitePool) {
        SqliteGamesRepository::new(pool.clone())
            .insert_game(&NewGame {
                id: "game1".into(),
                white_id: None,
                black_id: Some("black1".into()),
                game_mode: "standard".into(),
                time_control_ms: 180_000,
                increment_ms: 0,
                delay_ms: 0,
                delay_mode: "fischer".into(),
            })
            .await
            .unwrap();
    }

    fn sample_move(ordinal: i64) -> MoveRow {
        MoveRow {
            ordinal,
            color: "white".into(),
            from: "e2".into(),
            to: "e4".into(),
            san: "e4".into(),
            captured: None,
            is_check: false,
            is_checkmate: false,
            is_castle: false,
            is_en_passant: false,
            promotion: None,
            elapsed_ms: 1200,
        }
    }

    #[tokio::test]
    async fn record_then_list_round_trips() {
        let db = Database::open_in_memory().await.unwrap();
        seeded_game(db.pool()).await;
        let repo = SqliteMovesRepository::new(db.pool().clone());

        repo.record_move("game1", &sample_move(1)).await.unwrap();
        let (moves, total) = repo.list_moves("game1", 20, 0).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(moves[0].san, "e4");
    }

    #[tokio::test]
    async fn duplicate_ordinal_write_is_idempotent() {
        let db = Database::open_in_memory().await.unwrap();
        seeded_game(db.pool()).await;
        let repo = SqliteMovesRepository::new(db.pool().clone());

        repo.record_move("game1", &sample_move(1)).await.unwrap();
        repo.record_move("game1", &sample_move(1)).await.unwrap();

        let (_, total) = repo.list_moves("game1", 20, 0).await.unwrap();
        assert_eq!(total, 1);
    }
}
