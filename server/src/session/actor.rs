//! The session actor: the only task that ever mutates a [`SessionState`].
//! Everyone else talks to it through a [`SessionHandle`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chess::{PieceColor, RulesAdapter};
use tokio::sync::{broadcast, mpsc};
use tracing::{info_span, Instrument};

use crate::clock::TimeControl;

use super::commands::SessionCommand;
use super::events::{SessionEvent, SessionEventKind, SubscribeOutcome};
use super::handle::SessionHandle;
use super::state::SessionState;

const COMMAND_CHANNEL_CAPACITY: usize = 64;
const EVENT_BUS_CAPACITY: usize = 256;

pub struct SessionActor {
    state: SessionState,
    rx: mpsc::Receiver<SessionCommand>,
    bus: broadcast::Sender<SessionEvent>,
    /// Bounded replay tail mirroring what `bus` itself still has buffered,
    /// so a resubscribing client's `lastSeq` can be answered with the
    /// missed events instead of a full snapshot (spec §6 reconnect
    /// protocol). `bus.subscribe()` alone only ever sees *future* sends.
    recent: VecDeque<SessionEvent>,
    tick_cadence: Duration,
}

impl SessionActor {
    /// Spawns the actor task and returns a handle to it. `tick_cadence` is
    /// the clock-tick broadcast rate (config key `session.tickHz`);
    /// `disconnect_grace` is `session.disconnectGraceMs`.
    pub fn spawn(
        game_id: String,
        time_control: TimeControl,
        rules: Arc<dyn RulesAdapter>,
        creator_id: String,
        creator_color: PieceColor,
        tick_cadence: Duration,
        disconnect_grace: Duration,
    ) -> SessionHandle {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (bus, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        let state = SessionState::new(
            game_id.clone(),
            time_control,
            rules,
            creator_id,
            creator_color,
            disconnect_grace,
        );
        let actor = SessionActor {
            state,
            rx,
            bus,
            recent: VecDeque::with_capacity(EVENT_BUS_CAPACITY),
            tick_cadence,
        };
        tokio::spawn(actor.run().instrument(info_span!("session", id = %game_id)));
        SessionHandle::new(game_id, tx)
    }

    async fn run(mut self) {
        loop {
            let wake_at = self
                .state
                .next_wake(Instant::now(), self.tick_cadence)
                .map(tokio::time::Instant::from_std);

            let sleep = async {
                match wake_at {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                cmd = self.rx.recv() => {
                    match cmd {
                        Some(SessionCommand::Shutdown) | None => break,
                        Some(cmd) => self.handle_command(cmd),
                    }
                }
                _ = sleep => {
                    self.on_timer_wake();
                }
            }
        }
        tracing::debug!("session actor exiting");
    }

    fn on_timer_wake(&mut self) {
        let now = Instant::now();
        let wall_now_ms = wall_now_ms();
        self.state.check_timers(now, wall_now_ms);
        self.emit(SessionEventKind::ClockTick);
    }

    fn handle_command(&mut self, cmd: SessionCommand) {
        let now = Instant::now();
        let wall_now_ms = wall_now_ms();

        match cmd {
            SessionCommand::SeatPlayer { user_id, color, reply } => {
                let result = self.state.seat_player(user_id, color, now, wall_now_ms);
                let out = result.map(|_| self.state.snapshot());
                if out.is_ok() {
                    self.emit(SessionEventKind::Seated);
                }
                let _ = reply.send(out);
            }
            SessionCommand::MakeMove {
                user_id,
                from,
                to,
                promotion,
                reply,
            } => {
                let was_completed = self.state.fsm == super::snapshot::FsmState::Completed;
                let result = self.state.make_move(&user_id, from, to, promotion, now, wall_now_ms);
                match result {
                    Ok(()) => {
                        let completed = self.state.fsm == super::snapshot::FsmState::Completed;
                        self.emit(SessionEventKind::Move);
                        if completed {
                            self.emit(SessionEventKind::Completed);
                        }
                        let _ = reply.send(Ok(self.state.snapshot()));
                    }
                    Err(err) => {
                        // A flag fall discovered while validating the move
                        // still ends the game; tell subscribers even though
                        // the move itself is rejected. Only when this call
                        // is what ended it — a command against an
                        // already-finished game must emit no transition.
                        if !was_completed && self.state.fsm == super::snapshot::FsmState::Completed {
                            self.emit(SessionEventKind::Completed);
                        }
                        let _ = reply.send(Err(err));
                    }
                }
            }
            SessionCommand::Resign { user_id, reply } => {
                let result = self.state.resign(&user_id, now, wall_now_ms);
                let out = result.map(|_| self.state.snapshot());
                if out.is_ok() {
                    self.emit(SessionEventKind::Resigned);
                    self.emit(SessionEventKind::Completed);
                }
                let _ = reply.send(out);
            }
            SessionCommand::OfferDraw { user_id, reply } => {
                let result = self.state.offer_draw(&user_id, wall_now_ms);
                let out = result.map(|_| self.state.snapshot());
                if out.is_ok() {
                    self.emit(SessionEventKind::DrawOffered);
                }
                let _ = reply.send(out);
            }
            SessionCommand::AcceptDraw { user_id, reply } => {
                let result = self.state.accept_draw(&user_id, now, wall_now_ms);
                let out = result.map(|_| self.state.snapshot());
                if out.is_ok() {
                    self.emit(SessionEventKind::DrawAccepted);
                    self.emit(SessionEventKind::Completed);
                }
                let _ = reply.send(out);
            }
            SessionCommand::DeclineDraw { user_id, reply } => {
                let result = self.state.decline_draw(&user_id);
                let out = result.map(|_| self.state.snapshot());
                if out.is_ok() {
                    self.emit(SessionEventKind::DrawDeclined);
                }
                let _ = reply.send(out);
            }
            SessionCommand::TimeoutCheck { reply } => {
                self.state.check_timers(now, wall_now_ms);
                let _ = reply.send(self.state.snapshot());
            }
            SessionCommand::Subscribe {
                subscriber_id,
                last_seq,
                reply,
            } => {
                tracing::trace!(subscriber_id, ?last_seq, "new subscriber");
                let events = self.bus.subscribe();
                let tail_start = self.recent.front().map(|e| e.seq);
                let resumed = match (last_seq, tail_start) {
                    (Some(last), Some(tail)) => last + 1 >= tail,
                    (Some(last), None) => last >= self.state.seq,
                    (None, _) => false,
                };
                let backlog = if resumed {
                    self.recent
                        .iter()
                        .filter(|e| e.seq > last_seq.unwrap_or(0))
                        .cloned()
                        .collect()
                } else {
                    Vec::new()
                };
                let _ = reply.send(SubscribeOutcome {
                    snapshot: self.state.snapshot(),
                    seq: self.state.seq,
                    resumed,
                    backlog,
                    events,
                });
            }
            SessionCommand::MarkDisconnected { user_id } => {
                self.state.mark_disconnected(&user_id, now, wall_now_ms);
                if self.state.fsm == super::snapshot::FsmState::Completed {
                    self.emit(SessionEventKind::Abandoned);
                    self.emit(SessionEventKind::Completed);
                }
            }
            SessionCommand::GetSnapshot { reply } => {
                let _ = reply.send(self.state.snapshot());
            }
            SessionCommand::Shutdown => unreachable!("handled in run()"),
        }
    }

    fn emit(&mut self, kind: SessionEventKind) {
        let seq = self.state.next_seq();
        let snapshot = self.state.snapshot();
        let event = SessionEvent { seq, kind, snapshot };

        self.recent.push_back(event.clone());
        if self.recent.len() > EVENT_BUS_CAPACITY {
            self.recent.pop_front();
        }

        // No receivers is routine (nobody subscribed yet); drop silently.
        let _ = self.bus.send(event);
    }
}

fn wall_now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
