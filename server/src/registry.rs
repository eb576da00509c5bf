//! The Session Registry (component C4): an in-memory `gameId -> Session`
//! map guarded for concurrent lookup/insert, with per-user active-game
//! caps and a background sweep that retires completed sessions after a
//! grace period.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chess::{CozyRulesAdapter, PieceColor};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::clock::TimeControl;
use crate::session::{FsmState, SessionActor, SessionHandle};

#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    #[error("no such game")]
    NoSuchGame,
    #[error("too many active games")]
    TooManyActiveGames,
}

/// Owns every live session actor. Cloneable: internally an `Arc` around
/// the map and config, so the HTTP/WebSocket layers and the sweep task
/// all share one registry.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RwLock<HashMap<String, SessionHandle>>>,
    tick_cadence: Duration,
    retire_after: Duration,
    disconnect_grace: Duration,
    max_active_games_per_user: u32,
}

impl Registry {
    pub fn new(
        tick_cadence: Duration,
        retire_after: Duration,
        disconnect_grace: Duration,
        max_active_games_per_user: u32,
    ) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            tick_cadence,
            retire_after,
            disconnect_grace,
            max_active_games_per_user,
        }
    }

    /// Creates a new session seated with `creator_id` on `creator_color`.
    /// Returns `too-many-active-games` if the creator is already at cap.
    pub async fn create(
        &self,
        creator_id: String,
        creator_color: PieceColor,
        time_control: TimeControl,
    ) -> Result<SessionHandle, RegistryError> {
        self.check_cap(&creator_id).await?;

        let game_id = Uuid::new_v4().to_string();
        let handle = SessionActor::spawn(
            game_id.clone(),
            time_control,
            Arc::new(CozyRulesAdapter),
            creator_id.clone(),
            creator_color,
            self.tick_cadence,
            self.disconnect_grace,
        );

        self.inner.write().await.insert(game_id, handle.clone());
        Ok(handle)
    }

    pub async fn join(&self, game_id: &str, user_id: String) -> Result<SessionHandle, RegistryError> {
        self.check_cap(&user_id).await?;
        let handle = self.lookup(game_id).await?;
        handle
            .seat_player(user_id, None)
            .await
            .map_err(|_| RegistryError::NoSuchGame)?;
        Ok(handle)
    }

    pub async fn lookup(&self, game_id: &str) -> Result<SessionHandle, RegistryError> {
        self.inner
            .read()
            .await
            .get(game_id)
            .cloned()
            .ok_or(RegistryError::NoSuchGame)
    }

    /// Sessions currently in `Lobby`, for the Matchmaker/lobby listing.
    pub async fn open_lobby_games(&self) -> Vec<SessionHandle> {
        let handles: Vec<SessionHandle> = self.inner.read().await.values().cloned().collect();
        let mut open = Vec::new();
        for handle in handles {
            if let Ok(snapshot) = handle.snapshot().await {
                if snapshot.fsm_state == FsmState::Lobby {
                    open.push(handle);
                }
            }
        }
        open
    }

    async fn check_cap(&self, user_id: &str) -> Result<(), RegistryError> {
        let handles: Vec<SessionHandle> = self.inner.read().await.values().cloned().collect();
        let mut active = 0u32;
        for handle in handles {
            if let Ok(snapshot) = handle.snapshot().await {
                let involved = snapshot.white_id.as_deref() == Some(user_id)
                    || snapshot.black_id.as_deref() == Some(user_id);
                if involved && snapshot.fsm_state != FsmState::Completed {
                    active += 1;
                }
            }
        }
        if active >= self.max_active_games_per_user {
            Err(RegistryError::TooManyActiveGames)
        } else {
            Ok(())
        }
    }

    /// Background task: every `retire_after / 4` (bounded below), drop the
    /// handle for any session that has been `Completed` for at least
    /// `retire_after`. Run via `tokio::spawn(registry.clone().run_sweep())`.
    pub async fn run_sweep(self) {
        let interval = (self.retire_after / 4).max(Duration::from_secs(1));
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            self.sweep_once().await;
        }
    }

    async fn sweep_once(&self) {
        let candidates: Vec<(String, SessionHandle)> = self
            .inner
            .read()
            .await
            .iter()
            .map(|(id, handle)| (id.clone(), handle.clone()))
            .collect();

        for (game_id, handle) in candidates {
            if handle.is_closed() {
                self.inner.write().await.remove(&game_id);
                continue;
            }
            let Ok(snapshot) = handle.snapshot().await else {
                continue;
            };
            let Some(completed_at_ms) = snapshot.completed_at_ms else {
                continue;
            };
            let age = chrono::Utc::now().timestamp_millis().saturating_sub(completed_at_ms);
            if age as u64 >= self.retire_after.as_millis() as u64 {
                handle.shutdown().await;
                self.inner.write().await.remove(&game_id);
                tracing::debug!(game_id, "retired completed session");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::DelayMode;

    fn fischer_spec() -> TimeControl {
        TimeControl {
            initial_ms: 180_000,
            increment_ms: 2_000,
            delay_ms: 0,
            delay_mode: DelayMode::FischerOnly,
        }
    }

    #[tokio::test]
    async fn create_then_lookup_round_trips() {
        let registry = Registry::new(Duration::from_millis(100), Duration::from_secs(300), Duration::from_secs(30), 5);
        let handle = registry
            .create("alice".into(), PieceColor::White, fischer_spec())
            .await
            .unwrap();
        let looked_up = registry.lookup(handle.game_id()).await.unwrap();
        assert_eq!(looked_up.game_id(), handle.game_id());
    }

    #[tokio::test]
    async fn join_seats_second_player_and_starts_game() {
        let registry = Registry::new(Duration::from_millis(100), Duration::from_secs(300), Duration::from_secs(30), 5);
        let handle = registry
            .create("alice".into(), PieceColor::White, fischer_spec())
            .await
            .unwrap();
        registry.join(handle.game_id(), "bob".into()).await.unwrap();

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.fsm_state, FsmState::Live);
        assert_eq!(snapshot.black_id.as_deref(), Some("bob"));
    }

    #[tokio::test]
    async fn lookup_of_unknown_game_errors() {
        let registry = Registry::new(Duration::from_millis(100), Duration::from_secs(300), Duration::from_secs(30), 5);
        assert!(matches!(registry.lookup("no-such-id").await, Err(RegistryError::NoSuchGame)));
    }

    #[tokio::test]
    async fn cap_rejects_a_sixth_concurrent_game() {
        let registry = Registry::new(Duration::from_millis(100), Duration::from_secs(300), Duration::from_secs(30), 1);
        registry.create("alice".into(), PieceColor::White, fischer_spec()).await.unwrap();
        let second = registry.create("alice".into(), PieceColor::White, fischer_spec()).await;
        assert!(matches!(second, Err(RegistryError::TooManyActiveGames)));
    }

    #[tokio::test]
    async fn lobby_only_lists_unseated_games() {
        let registry = Registry::new(Duration::from_millis(100), Duration::from_secs(300), Duration::from_secs(30), 5);
        let lonely = registry.create("alice".into(), PieceColor::White, fischer_spec()).await.unwrap();
        let full = registry.create("carol".into(), PieceColor::White, fischer_spec()).await.unwrap();
        registry.join(full.game_id(), "dave".into()).await.unwrap();

        let lobby = registry.open_lobby_games().await;
        let lobby_ids: Vec<&str> = lobby.iter().map(|h| h.game_id()).collect();
        assert!(lobby_ids.contains(&lonely.game_id()));
        assert!(!lobby_ids.contains(&full.game_id()));
    }
}
