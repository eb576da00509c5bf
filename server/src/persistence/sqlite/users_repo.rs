use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::persistence::traits::{RatingOutcome, UserRecord, UsersRepository};
use crate::persistence::PersistenceError;

pub struct SqliteUsersRepository {
    pool: SqlitePool,
}

impl SqliteUsersRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsersRepository for SqliteUsersRepository {
    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, PersistenceError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, email, password_hash, elo_rating, games_played, \
             games_won, games_lost, games_drawn FROM users WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn apply_rating_update(
        &self,
        user_id: &str,
        rating_delta: i32,
        outcome: RatingOutcome,
    ) -> Result<(), PersistenceError> {
        let (won, lost, drawn) = match outcome {
            RatingOutcome::Win => (1, 0, 0),
            RatingOutcome::Loss => (0, 1, 0),
            RatingOutcome::Draw => (0, 0, 1),
        };
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "UPDATE users SET elo_rating = elo_rating + ?1, games_played = games_played + 1, \
             games_won = games_won + ?2, games_lost = games_lost + ?3, \
             games_drawn = games_drawn + ?4, updated_at = ?5 WHERE id = ?6",
        )
        .bind(rating_delta)
        .bind(won)
        .bind(lost)
        .bind(drawn)
        .bind(now)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    username: String,
    email: String,
    password_hash: String,
    elo_rating: i64,
    games_played: i64,
    games_won: i64,
    games_lost: i64,
    games_drawn: i64,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        UserRecord {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            elo_rating: row.elo_rating as i32,
            games_played: row.games_played as i32,
            games_won: row.games_won as i32,
            games_lost: row.games_lost as i32,
            games_drawn: row.games_drawn as i32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::sqlite::Database;

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
    async fn rating_update_accumulates_across_games() {
        let db = Database::open_in_memory().await.unwrap();
        seed_user(db.pool(), "u1").await;
        let repo = SqliteUsersRepository::new(db.pool().clone());

        repo.apply_rating_update("u1", 16, RatingOutcome::Win).await.unwrap();
        repo.apply_rating_update("u1", -8, RatingOutcome::Loss).await.unwrap();

        let user = repo.get_user("u1").await.unwrap().unwrap();
        assert_eq!(user.elo_rating, 1208);
        assert_eq!(user.games_played, 2);
        assert_eq!(user.games_won, 1);
        assert_eq!(user.games_lost, 1);
    }

    #[tokio::test]
    async fn missing_user_returns_none() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = SqliteUsersRepository::new(db.pool().clone());
        assert!(repo.get_user("missing").await.unwrap().is_none());
    }
}
