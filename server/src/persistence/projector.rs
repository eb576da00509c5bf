//! The Persistence Projector (component C7): subscribes to a session's
//! event bus and writes moves and completion state to the Durable Store
//! off the move-validation hot path.
//!
//! Writes are retried with backoff on transient failure. After
//! `MAX_ATTEMPTS` consecutive failures for one event, the projector logs
//! `persistence-divergent` and moves on — per the error-handling table,
//! reads keep serving from the in-memory session while the store catches
//! up or an operator intervenes.

use std::sync::Arc;
use std::time::Duration;

use crate::rating::{elo_delta, Outcome};
use crate::session::{EndReason, GameResult, SessionEventKind, SessionHandle, SessionSnapshot};

use super::traits::{GameCompletion, GameSnapshotUpdate, MoveRow};
use super::{GamesRepository, MovesRepository, UsersRepository};

const MAX_ATTEMPTS: u32 = 5;
const BASE_BACKOFF: Duration = Duration::from_millis(50);

pub struct Projector {
    games: Arc<dyn GamesRepository>,
    moves: Arc<dyn MovesRepository>,
    users: Arc<dyn UsersRepository>,
    k_factor: i32,
}

impl Projector {
    pub fn new(
        games: Arc<dyn GamesRepository>,
        moves: Arc<dyn MovesRepository>,
        users: Arc<dyn UsersRepository>,
        k_factor: i32,
    ) -> Arc<Self> {
        Arc::new(Self {
            games,
            moves,
            users,
            k_factor,
        })
    }

    /// Spawns a background task that drains `handle`'s event bus for the
    /// lifetime of the session.
    pub fn spawn(self: Arc<Self>, handle: SessionHandle) {
        tokio::spawn(async move {
            let Ok(outcome) = handle.subscribe("projector".into(), None).await else {
                return;
            };
            let mut events = outcome.events;
            self.project_snapshot(&outcome.snapshot).await;

            loop {
                match events.recv().await {
                    Ok(event) => self.project(event.kind, &event.snapshot).await,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "projector lagged behind session event bus");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    async fn project(&self, kind: SessionEventKind, snapshot: &SessionSnapshot) {
        match kind {
            SessionEventKind::Move | SessionEventKind::Seated => {
                self.project_snapshot(snapshot).await;
                if let Some(last) = snapshot.move_history.last() {
                    self.project_move(&snapshot.game_id, last).await;
                }
            }
            SessionEventKind::Completed => self.project_completion(snapshot).await,
            SessionEventKind::ClockTick
            | SessionEventKind::DrawOffered
            | SessionEventKind::DrawAccepted
            | SessionEventKind::DrawDeclined
            | SessionEventKind::Resigned
            | SessionEventKind::Abandoned => {}
        }
    }

    async fn project_snapshot(&self, snapshot: &SessionSnapshot) {
        let sans: Vec<String> = snapshot.move_history.iter().map(|m| m.san.clone()).collect();
        let pgn = chess::pgn::render_movetext(&sans);
        let update = GameSnapshotUpdate {
            game_id: &snapshot.game_id,
            white_id: snapshot.white_id.as_deref(),
            black_id: snapshot.black_id.as_deref(),
            fen: &snapshot.fen,
            pgn: &pgn,
            white_remaining_ms: snapshot.white_remaining_ms as i64,
            black_remaining_ms: snapshot.black_remaining_ms as i64,
            active_color: snapshot.active_side.map(|s| s.as_str()),
            status: fsm_status(snapshot),
        };
        self.retry("update_snapshot", || self.games.update_snapshot(update.clone())).await;
    }

    async fn project_move(&self, game_id: &str, mv: &crate::session::MoveRecord) {
        let row = MoveRow {
            ordinal: mv.ordinal as i64,
            color: mv.mover.as_str().to_string(),
            from: mv.from.clone(),
            to: mv.to.clone(),
            san: mv.san.clone(),
            captured: mv.captured.map(|k| k.to_string()),
            is_check: mv.is_check,
            is_checkmate: mv.is_checkmate,
            is_castle: mv.is_castle,
            is_en_passant: mv.is_en_passant,
            promotion: mv.promotion.map(|k| k.to_string()),
            elapsed_ms: mv.elapsed_ms_for_move as i64,
        };
        self.retry("record_move", || self.moves.record_move(game_id, &row)).await;
    }

    async fn project_completion(&self, snapshot: &SessionSnapshot) {
        let result_str = match snapshot.result {
            Some(GameResult::WhiteWins) => "white-wins",
            Some(GameResult::BlackWins) => "black-wins",
            Some(GameResult::Draw) | None => "draw",
        };
        let end_reason = snapshot.end_reason.map(EndReason::as_str).unwrap_or("abandonment");

        let (white_delta, black_delta) = self.rating_deltas(snapshot).await;

        let completion = GameCompletion {
            game_id: &snapshot.game_id,
            result: result_str,
            winner_id: snapshot.winner_id.as_deref(),
            end_reason,
        };
        self.retry("complete_game", || {
            self.games.complete_game(completion.clone(), white_delta, black_delta)
        })
        .await;
    }

    async fn rating_deltas(&self, snapshot: &SessionSnapshot) -> (Option<i32>, Option<i32>) {
        let (Some(white_id), Some(black_id)) = (&snapshot.white_id, &snapshot.black_id) else {
            return (None, None);
        };
        let white_user = self.users.get_user(white_id).await.ok().flatten();
        let black_user = self.users.get_user(black_id).await.ok().flatten();
        let (Some(white_user), Some(black_user)) = (white_user, black_user) else {
            return (None, None);
        };

        let outcome = match snapshot.result {
            Some(GameResult::WhiteWins) => Outcome::Win,
            Some(GameResult::BlackWins) => Outcome::Loss,
            _ => Outcome::Draw,
        };
        let delta = elo_delta(white_user.elo_rating, black_user.elo_rating, outcome, self.k_factor);
        (Some(delta.winner_delta), Some(delta.loser_delta))
    }

    /// Retries `op` with exponential backoff, logging and giving up after
    /// `MAX_ATTEMPTS` — the projector never panics or blocks the session
    /// actor, since it only ever reads off the broadcast bus.
    async fn retry<F, Fut>(&self, label: &str, op: F)
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<(), super::PersistenceError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(()) => return,
                Err(err) => {
                    attempt += 1;
                    if attempt >= MAX_ATTEMPTS {
                        tracing::error!(
                            operation = label,
                            error = %err,
                            "persistence-divergent: giving up after {attempt} attempts"
                        );
                        return;
                    }
                    tracing::warn!(operation = label, error = %err, attempt, "projector write failed, retrying");
                    tokio::time::sleep(BASE_BACKOFF * 2u32.pow(attempt)).await;
                }
            }
        }
    }
}

fn fsm_status(snapshot: &SessionSnapshot) -> &'static str {
    match snapshot.fsm_state {
        crate::session::FsmState::Lobby => "lobby",
        crate::session::FsmState::Live => "live",
        crate::session::FsmState::Completed => "completed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{DelayMode, TimeControl};
    use crate::persistence::memory::InMemoryStore;
    use chess::{CozyRulesAdapter, PieceColor};
    use cozy_chess::Square;
    use std::str::FromStr;

    fn fischer_spec() -> TimeControl {
        TimeControl {
            initial_ms: 180_000,
            increment_ms: 2_000,
            delay_ms: 0,
            delay_mode: DelayMode::FischerOnly,
        }
    }

    #[tokio::test]
    async fn move_and_completion_are_projected() {
        let store = Arc::new(InMemoryStore::new());
        store.seed_user("white1", 1200);
        store.seed_user("black1", 1200);
        store
            .insert_game(&super::super::traits::NewGame {
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

        let projector = Projector::new(store.clone(), store.clone(), store.clone(), 32);

        let handle = crate::session::SessionActor::spawn(
            "game1".into(),
            fischer_spec(),
            Arc::new(CozyRulesAdapter),
            "white1".into(),
            PieceColor::White,
            Duration::from_millis(100),
            Duration::from_secs(30),
        );
        handle.seat_player("black1".into(), Some(PieceColor::Black)).await.unwrap();
        projector.spawn(handle.clone());

        handle
            .make_move(
                "white1".into(),
                Square::from_str("e2").unwrap(),
                Square::from_str("e4").unwrap(),
                None,
            )
            .await
            .unwrap();
        handle.resign("black1".into()).await.unwrap();

        // Give the spawned projector task a chance to drain the bus.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let (moves, total) = store.list_moves("game1", 10, 0).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(moves[0].san, "e4");

        let game = store.get_game("game1").await.unwrap().unwrap();
        assert_eq!(game.status, "completed");
        assert_eq!(game.result.as_deref(), Some("white-wins"));

        let white = store.get_user("white1").await.unwrap().unwrap();
        assert!(white.elo_rating > 1200);
    }
}
