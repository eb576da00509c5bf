//! Matchmaker / Join (component C8): the only place a new session comes
//! into existence. Wires the Registry (session lifecycle), the Durable
//! Store (a `games` row from the moment of creation), and the Persistence
//! Projector (so every subsequent mutation gets written back) together
//! behind two operations, `create` and `join`, matching §4.8.

use std::sync::Arc;

use chess::PieceColor;
use rand::Rng as _;
use thiserror::Error;

use crate::clock::TimeControl;
use crate::persistence::{GamesRepository, NewGame, Projector};
use crate::registry::{Registry, RegistryError};
use crate::session::SessionHandle;

#[derive(Debug, Error)]
pub enum MatchmakerError {
    #[error("too many active games")]
    TooManyActiveGames,
    #[error("no such game")]
    NoSuchGame,
    #[error("invalid time control: {0}")]
    InvalidTimeControl(#[from] crate::clock::TimeControlError),
    #[error("persistence error: {0}")]
    Persistence(#[from] crate::persistence::PersistenceError),
}

impl From<RegistryError> for MatchmakerError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::TooManyActiveGames => MatchmakerError::TooManyActiveGames,
            RegistryError::NoSuchGame => MatchmakerError::NoSuchGame,
        }
    }
}

/// Caller's requested seat: a fixed color, or a fair coin flip.
#[derive(Debug, Clone, Copy)]
pub enum ColorPreference {
    Fixed(PieceColor),
    Random,
}

pub struct Matchmaker {
    registry: Registry,
    games: Arc<dyn GamesRepository>,
    projector: Arc<Projector>,
}

impl Matchmaker {
    pub fn new(registry: Registry, games: Arc<dyn GamesRepository>, projector: Arc<Projector>) -> Self {
        Self {
            registry,
            games,
            projector,
        }
    }

    /// `Create(spec, creatorId, colorPref)`: validates the time control,
    /// picks a seat for the creator, inserts the session (Lobby) plus its
    /// Durable Store row, and starts projecting it.
    pub async fn create(
        &self,
        creator_id: String,
        color_pref: ColorPreference,
        time_control: TimeControl,
        game_mode: &str,
    ) -> Result<SessionHandle, MatchmakerError> {
        time_control.validate()?;

        let creator_color = match color_pref {
            ColorPreference::Fixed(color) => color,
            ColorPreference::Random => {
                if rand::rng().random_bool(0.5) {
                    PieceColor::White
                } else {
                    PieceColor::Black
                }
            }
        };

        let handle = self.registry.create(creator_id.clone(), creator_color, time_control).await?;

        let (white_id, black_id) = match creator_color {
            PieceColor::White => (Some(creator_id), None),
            PieceColor::Black => (None, Some(creator_id)),
        };
        self.games
            .insert_game(&NewGame {
                id: handle.game_id().to_string(),
                white_id,
                black_id,
                game_mode: game_mode.to_string(),
                time_control_ms: time_control.initial_ms as i64,
                increment_ms: time_control.increment_ms as i64,
                delay_ms: time_control.delay_ms as i64,
                delay_mode: delay_mode_str(time_control.delay_mode).to_string(),
            })
            .await?;

        self.projector.clone().spawn(handle.clone());
        Ok(handle)
    }

    /// `Join(gameId, userId)`: rejects if the session isn't joinable
    /// (propagated as whatever the session actor itself rejected the seat
    /// request with); otherwise fills the empty seat.
    pub async fn join(&self, game_id: &str, user_id: String) -> Result<SessionHandle, MatchmakerError> {
        Ok(self.registry.join(game_id, user_id).await?)
    }
}

fn delay_mode_str(mode: crate::clock::DelayMode) -> &'static str {
    match mode {
        crate::clock::DelayMode::None => "none",
        crate::clock::DelayMode::FischerOnly => "fischer",
        crate::clock::DelayMode::Bronstein => "bronstein",
        crate::clock::DelayMode::Simple => "simple",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::DelayMode;
    use crate::persistence::memory::InMemoryStore;
    use std::time::Duration;

    fn fischer_spec() -> TimeControl {
        TimeControl {
            initial_ms: 180_000,
            increment_ms: 2_000,
            delay_ms: 0,
            delay_mode: DelayMode::FischerOnly,
        }
    }

    fn matchmaker() -> (Matchmaker, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let registry = Registry::new(
            Duration::from_millis(100),
            Duration::from_secs(300),
            Duration::from_secs(30),
            5,
        );
        let projector = Projector::new(store.clone(), store.clone(), store.clone(), 32);
        (Matchmaker::new(registry, store.clone(), projector), store)
    }

    #[tokio::test]
    async fn create_seats_creator_and_persists_a_lobby_row() {
        let (mm, store) = matchmaker();
        let handle = mm
            .create("alice".into(), ColorPreference::Fixed(PieceColor::White), fischer_spec(), "standard")
            .await
            .unwrap();

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.white_id.as_deref(), Some("alice"));
        assert!(snapshot.black_id.is_none());

        let game = store.get_game(handle.game_id()).await.unwrap().unwrap();
        assert_eq!(game.white_id.as_deref(), Some("alice"));
        assert_eq!(game.status, "lobby");
    }

    #[tokio::test]
    async fn join_fills_the_empty_seat() {
        let (mm, _store) = matchmaker();
        let handle = mm
            .create("alice".into(), ColorPreference::Fixed(PieceColor::White), fischer_spec(), "standard")
            .await
            .unwrap();

        mm.join(handle.game_id(), "bob".into()).await.unwrap();

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.black_id.as_deref(), Some("bob"));
        assert_eq!(snapshot.fsm_state, crate::session::FsmState::Live);
    }

    #[tokio::test]
    async fn join_of_unknown_game_errors() {
        let (mm, _store) = matchmaker();
        let result = mm.join("no-such-id", "bob".into()).await;
        assert!(matches!(result, Err(MatchmakerError::NoSuchGame)));
    }
}
