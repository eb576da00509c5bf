//! Internal mutable state, owned entirely by the session actor. No locks:
//! the actor loop is the only task that ever touches this struct.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chess::{MoveRequest, PieceColor, Position, RulesAdapter};
use cozy_chess::Square;

use crate::clock::{Clock, TimeControl};

use super::commands::SessionError;
use super::snapshot::{
    DrawOffer, EndReason, FsmState, GameResult, MoveRecord, SessionSnapshot,
};

/// Default for `SessionState::disconnect_grace` when a caller (mostly
/// tests) doesn't thread one through explicitly. Operators configure this
/// via `Config::session_disconnect_grace` (`CHESS_SESSION_DISCONNECT_GRACE_MS`).
pub const DEFAULT_DISCONNECT_GRACE: Duration = Duration::from_secs(30);

pub(crate) struct SessionState {
    pub game_id: String,
    pub white_id: Option<String>,
    pub black_id: Option<String>,
    pub time_control: TimeControl,
    pub position: Position,
    pub rules: Arc<dyn RulesAdapter>,
    pub move_history: Vec<MoveRecord>,
    repetition_history: Vec<String>,
    pub clock: Clock,
    pub draw_offer: Option<DrawOffer>,
    pub fsm: FsmState,
    pub result: Option<GameResult>,
    pub end_reason: Option<EndReason>,
    pub winner_id: Option<String>,
    pub started_at_ms: Option<i64>,
    pub completed_at_ms: Option<i64>,
    pub seq: u64,
    white_connected: bool,
    black_connected: bool,
    white_disconnected_since: Option<Instant>,
    black_disconnected_since: Option<Instant>,
    disconnect_grace: Duration,
}

impl SessionState {
    pub fn new(
        game_id: String,
        time_control: TimeControl,
        rules: Arc<dyn RulesAdapter>,
        creator_id: String,
        creator_color: PieceColor,
        disconnect_grace: Duration,
    ) -> Self {
        let (white_id, black_id) = match creator_color {
            PieceColor::White => (Some(creator_id), None),
            PieceColor::Black => (None, Some(creator_id)),
        };
        Self {
            game_id,
            white_id,
            black_id,
            position: Position::startpos(),
            repetition_history: vec![Position::startpos().repetition_key()],
            clock: Clock::new(time_control),
            time_control,
            rules,
            move_history: Vec::new(),
            draw_offer: None,
            fsm: FsmState::Lobby,
            result: None,
            end_reason: None,
            winner_id: None,
            started_at_ms: None,
            completed_at_ms: None,
            seq: 0,
            white_connected: true,
            black_connected: true,
            white_disconnected_since: None,
            black_disconnected_since: None,
            disconnect_grace,
        }
    }

    pub fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    pub fn seat_player(
        &mut self,
        user_id: String,
        color: Option<PieceColor>,
        now: Instant,
        wall_now_ms: i64,
    ) -> Result<(), SessionError> {
        if self.fsm != FsmState::Lobby {
            return Err(SessionError::WrongFsmState);
        }
        if self.white_id.as_deref() == Some(user_id.as_str())
            || self.black_id.as_deref() == Some(user_id.as_str())
        {
            return Err(SessionError::AlreadySeated);
        }

        let seat = color.unwrap_or_else(|| {
            if self.white_id.is_none() {
                PieceColor::White
            } else {
                PieceColor::Black
            }
        });

        match seat {
            PieceColor::White if self.white_id.is_none() => self.white_id = Some(user_id),
            PieceColor::Black if self.black_id.is_none() => self.black_id = Some(user_id),
            _ => return Err(SessionError::AlreadySeated),
        }

        if self.white_id.is_some() && self.black_id.is_some() {
            self.fsm = FsmState::Live;
            self.started_at_ms = Some(wall_now_ms);
            self.clock.start(now);
        }
        Ok(())
    }

    fn seated_color(&self, user_id: &str) -> Option<PieceColor> {
        if self.white_id.as_deref() == Some(user_id) {
            Some(PieceColor::White)
        } else if self.black_id.as_deref() == Some(user_id) {
            Some(PieceColor::Black)
        } else {
            None
        }
    }

    pub fn make_move(
        &mut self,
        user_id: &str,
        from: Square,
        to: Square,
        promotion: Option<chess::PieceKind>,
        now: Instant,
        wall_now_ms: i64,
    ) -> Result<(), SessionError> {
        if self.fsm != FsmState::Live {
            return Err(SessionError::WrongFsmState);
        }
        let mover_color = self.seated_color(user_id).ok_or(SessionError::NotAPlayer)?;
        if mover_color != self.position.side_to_move() {
            return Err(SessionError::NotYourTurn);
        }

        // Time expired before the move is legally applied: reject the move
        // and end the game by timeout instead.
        let peek = self.clock.peek(now);
        if matches!(peek.active_side, Some(side) if side == mover_color) {
            let remaining = match mover_color {
                PieceColor::White => peek.white_ms,
                PieceColor::Black => peek.black_ms,
            };
            if remaining == 0 {
                self.end_by_timeout(mover_color, now, wall_now_ms);
                return Err(SessionError::FlagFell);
            }
        }

        let moved_piece = self.position.piece_on(from).unwrap_or(chess::PieceKind::Pawn);

        let outcome = self
            .rules
            .apply_move(
                &self.position,
                MoveRequest {
                    from,
                    to,
                    promotion,
                },
            )
            .map_err(|_| SessionError::IllegalMove)?;

        let commit = self.clock.commit_move(now);

        self.position = outcome.position;
        self.repetition_history.push(self.position.repetition_key());

        let ordinal = self.move_history.len() as u32 + 1;
        self.move_history.push(MoveRecord {
            ordinal,
            mover: mover_color,
            from: chess::format_square(from),
            to: chess::format_square(to),
            piece: moved_piece,
            captured: outcome.captured_piece,
            san: outcome.san,
            is_check: outcome.flags.check,
            is_checkmate: outcome.flags.checkmate,
            is_castle: outcome.flags.castle,
            is_en_passant: outcome.flags.en_passant,
            promotion,
            elapsed_ms_for_move: commit.deducted_ms,
            wall_clock_ts_ms: wall_now_ms,
        });
        self.draw_offer = None;

        if commit.timed_out {
            self.end_by_timeout(commit.new_active_side.opposite(), now, wall_now_ms);
            return Ok(());
        }

        self.evaluate_terminal_after_move(now, wall_now_ms);
        Ok(())
    }

    /// Terminal precedence: checkmate -> stalemate -> insufficient-material
    /// -> fifty-move -> threefold-repetition.
    fn evaluate_terminal_after_move(&mut self, now: Instant, wall_now_ms: i64) {
        if let Some(last) = self.move_history.last() {
            if last.is_checkmate {
                let winner = Some(last.mover);
                self.complete(
                    winner.map(|c| match c {
                        PieceColor::White => GameResult::WhiteWins,
                        PieceColor::Black => GameResult::BlackWins,
                    }),
                    EndReason::Checkmate,
                    self.winner_id_for(winner),
                    now,
                    wall_now_ms,
                );
                return;
            }
        }
        if self.rules.is_stalemate(&self.position) {
            self.complete(Some(GameResult::Draw), EndReason::Stalemate, None, now, wall_now_ms);
            return;
        }
        if self.rules.is_insufficient_material(&self.position) {
            self.complete(
                Some(GameResult::Draw),
                EndReason::InsufficientMaterial,
                None,
                now,
                wall_now_ms,
            );
            return;
        }
        if self.rules.is_fifty_move_rule(&self.position) {
            self.complete(Some(GameResult::Draw), EndReason::FiftyMove, None, now, wall_now_ms);
            return;
        }
        if self.rules.is_threefold_repetition(&self.repetition_history) {
            self.complete(
                Some(GameResult::Draw),
                EndReason::ThreefoldRepetition,
                None,
                now,
                wall_now_ms,
            );
        }
    }

    fn end_by_timeout(&mut self, timed_out_side: PieceColor, now: Instant, wall_now_ms: i64) {
        let opponent = timed_out_side.opposite();
        if self.rules.side_is_insufficient_material(&self.position, opponent) {
            self.complete(
                Some(GameResult::Draw),
                EndReason::InsufficientMaterialVsTimeout,
                None,
                now,
                wall_now_ms,
            );
            return;
        }
        let winner_result = match opponent {
            PieceColor::White => GameResult::WhiteWins,
            PieceColor::Black => GameResult::BlackWins,
        };
        self.complete(
            Some(winner_result),
            EndReason::Timeout,
            self.winner_id_for(Some(opponent)),
            now,
            wall_now_ms,
        );
    }

    pub fn timeout_check(&mut self, now: Instant, wall_now_ms: i64) {
        if self.fsm != FsmState::Live {
            return;
        }
        let peek = self.clock.peek(now);
        if peek.white_ms == 0 {
            self.end_by_timeout(PieceColor::White, now, wall_now_ms);
        } else if peek.black_ms == 0 {
            self.end_by_timeout(PieceColor::Black, now, wall_now_ms);
        }
    }

    /// Combined background-timer wake handler: flag falls take precedence
    /// over an expiring disconnect grace, matching the command-precedence
    /// rule applied to explicit commands.
    pub fn check_timers(&mut self, now: Instant, wall_now_ms: i64) {
        self.timeout_check(now, wall_now_ms);
        if self.fsm == FsmState::Live {
            self.maybe_abandon(now, wall_now_ms);
        }
    }

    pub fn resign(&mut self, user_id: &str, now: Instant, wall_now_ms: i64) -> Result<(), SessionError> {
        if self.fsm != FsmState::Live {
            return Err(SessionError::WrongFsmState);
        }
        let resigner = self.seated_color(user_id).ok_or(SessionError::NotAPlayer)?;
        let winner = resigner.opposite();
        let result = match winner {
            PieceColor::White => GameResult::WhiteWins,
            PieceColor::Black => GameResult::BlackWins,
        };
        self.complete(
            Some(result),
            EndReason::Resignation,
            self.winner_id_for(Some(winner)),
            now,
            wall_now_ms,
        );
        Ok(())
    }

    pub fn offer_draw(&mut self, user_id: &str, wall_now_ms: i64) -> Result<(), SessionError> {
        if self.fsm != FsmState::Live {
            return Err(SessionError::WrongFsmState);
        }
        let side = self.seated_color(user_id).ok_or(SessionError::NotAPlayer)?;
        // Idempotent: offering twice by the same side is a no-op, per law 7.
        if let Some(existing) = self.draw_offer {
            if existing.by == side {
                return Ok(());
            }
        }
        self.draw_offer = Some(DrawOffer { by: side, at_ms: wall_now_ms });
        Ok(())
    }

    pub fn accept_draw(&mut self, user_id: &str, now: Instant, wall_now_ms: i64) -> Result<(), SessionError> {
        if self.fsm != FsmState::Live {
            return Err(SessionError::WrongFsmState);
        }
        let side = self.seated_color(user_id).ok_or(SessionError::NotAPlayer)?;
        let offer = self.draw_offer.ok_or(SessionError::NoDrawOffer)?;
        if offer.by == side {
            return Err(SessionError::NoDrawOffer);
        }
        self.complete(Some(GameResult::Draw), EndReason::DrawAgreement, None, now, wall_now_ms);
        Ok(())
    }

    pub fn decline_draw(&mut self, user_id: &str) -> Result<(), SessionError> {
        if self.fsm != FsmState::Live {
            return Err(SessionError::WrongFsmState);
        }
        let side = self.seated_color(user_id).ok_or(SessionError::NotAPlayer)?;
        let offer = self.draw_offer.ok_or(SessionError::NoDrawOffer)?;
        if offer.by == side {
            return Err(SessionError::NoDrawOffer);
        }
        self.draw_offer = None;
        Ok(())
    }

    pub fn mark_disconnected(&mut self, user_id: &str, now: Instant, wall_now_ms: i64) {
        match self.seated_color(user_id) {
            Some(PieceColor::White) => {
                self.white_connected = false;
                self.white_disconnected_since = Some(now);
            }
            Some(PieceColor::Black) => {
                self.black_connected = false;
                self.black_disconnected_since = Some(now);
            }
            None => return,
        }
        self.maybe_abandon(now, wall_now_ms);
    }

    pub fn mark_connected(&mut self, user_id: &str) {
        match self.seated_color(user_id) {
            Some(PieceColor::White) => {
                self.white_connected = true;
                self.white_disconnected_since = None;
            }
            Some(PieceColor::Black) => {
                self.black_connected = true;
                self.black_disconnected_since = None;
            }
            None => {}
        }
    }

    fn maybe_abandon(&mut self, now: Instant, wall_now_ms: i64) {
        if self.fsm != FsmState::Live {
            return;
        }
        let white_gone = !self.white_connected
            && self
                .white_disconnected_since
                .is_some_and(|since| now.duration_since(since) >= self.disconnect_grace);
        let black_gone = !self.black_connected
            && self
                .black_disconnected_since
                .is_some_and(|since| now.duration_since(since) >= self.disconnect_grace);

        if white_gone && black_gone {
            self.complete(None, EndReason::Abandonment, None, now, wall_now_ms);
        } else if white_gone && self.black_connected {
            self.complete(
                Some(GameResult::BlackWins),
                EndReason::Abandonment,
                self.black_id.clone(),
                now,
                wall_now_ms,
            );
        } else if black_gone && self.white_connected {
            self.complete(
                Some(GameResult::WhiteWins),
                EndReason::Abandonment,
                self.white_id.clone(),
                now,
                wall_now_ms,
            );
        }
    }

    /// Disconnect-grace timer wake: earliest of active side's zero-time
    /// instant, next clock-tick cadence, disconnect-grace expiry.
    pub fn next_wake(&self, now: Instant, tick_cadence: std::time::Duration) -> Option<Instant> {
        if self.fsm != FsmState::Live {
            return None;
        }
        let mut candidates = vec![now + tick_cadence];

        let peek = self.clock.peek(now);
        if let Some(side) = peek.active_side {
            let remaining_ms = match side {
                PieceColor::White => peek.white_ms,
                PieceColor::Black => peek.black_ms,
            };
            candidates.push(now + std::time::Duration::from_millis(remaining_ms));
        }
        if let Some(since) = self.white_disconnected_since {
            candidates.push(since + self.disconnect_grace);
        }
        if let Some(since) = self.black_disconnected_since {
            candidates.push(since + self.disconnect_grace);
        }
        candidates.into_iter().min()
    }

    fn winner_id_for(&self, winner: Option<PieceColor>) -> Option<String> {
        match winner {
            Some(PieceColor::White) => self.white_id.clone(),
            Some(PieceColor::Black) => self.black_id.clone(),
            None => None,
        }
    }

    fn complete(
        &mut self,
        result: Option<GameResult>,
        reason: EndReason,
        winner_id: Option<String>,
        now: Instant,
        wall_now_ms: i64,
    ) {
        self.fsm = FsmState::Completed;
        self.result = result;
        self.end_reason = Some(reason);
        self.winner_id = winner_id;
        self.completed_at_ms = Some(wall_now_ms);
        self.draw_offer = None;
        self.clock.stop();
        let _ = now;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let peek = self.clock.peek(Instant::now());
        SessionSnapshot {
            game_id: self.game_id.clone(),
            white_id: self.white_id.clone(),
            black_id: self.black_id.clone(),
            fen: self.position.to_fen(),
            fsm_state: self.fsm,
            active_side: peek.active_side,
            white_remaining_ms: peek.white_ms,
            black_remaining_ms: peek.black_ms,
            move_history: self.move_history.clone(),
            draw_offer: self.draw_offer,
            result: self.result,
            end_reason: self.end_reason,
            winner_id: self.winner_id.clone(),
            started_at_ms: self.started_at_ms,
            completed_at_ms: self.completed_at_ms,
            seq: self.seq,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::DelayMode;
    use chess::CozyRulesAdapter;

    fn fischer_spec() -> TimeControl {
        TimeControl {
            initial_ms: 180_000,
            increment_ms: 2_000,
            delay_ms: 0,
            delay_mode: DelayMode::FischerOnly,
        }
    }

    fn seated_state() -> SessionState {
        let mut state = SessionState::new(
            "game-1".into(),
            fischer_spec(),
            Arc::new(CozyRulesAdapter),
            "white-player".into(),
            PieceColor::White,
            DEFAULT_DISCONNECT_GRACE,
        );
        state
            .seat_player("black-player".into(), Some(PieceColor::Black), Instant::now(), 0)
            .unwrap();
        state
    }

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    #[test]
    fn seating_both_players_starts_clock() {
        let state = seated_state();
        assert_eq!(state.fsm, FsmState::Live);
        assert!(state.started_at_ms.is_some());
    }

    #[test]
    fn out_of_turn_move_rejected() {
        let mut state = seated_state();
        let result = state.make_move("black-player", sq("e7"), sq("e5"), None, Instant::now(), 0);
        assert!(matches!(result, Err(SessionError::NotYourTurn)));
    }

    #[test]
    fn legal_move_advances_turn_and_clears_draw_offer() {
        let mut state = seated_state();
        state.offer_draw("white-player", 0).unwrap();
        state
            .make_move("white-player", sq("e2"), sq("e4"), None, Instant::now(), 0)
            .unwrap();
        assert!(state.draw_offer.is_none());
        assert_eq!(state.move_history.len(), 1);
        assert_eq!(state.position.side_to_move(), PieceColor::Black);
    }

    #[test]
    fn resignation_completes_with_opponent_winning() {
        let mut state = seated_state();
        state.resign("black-player", Instant::now(), 0).unwrap();
        assert_eq!(state.fsm, FsmState::Completed);
        assert_eq!(state.result, Some(GameResult::WhiteWins));
        assert_eq!(state.end_reason, Some(EndReason::Resignation));
    }

    #[test]
    fn draw_offer_then_accept_completes_as_draw() {
        let mut state = seated_state();
        state.offer_draw("white-player", 0).unwrap();
        state.accept_draw("black-player", Instant::now(), 0).unwrap();
        assert_eq!(state.result, Some(GameResult::Draw));
        assert_eq!(state.end_reason, Some(EndReason::DrawAgreement));
    }

    #[test]
    fn same_side_cannot_accept_its_own_offer() {
        let mut state = seated_state();
        state.offer_draw("white-player", 0).unwrap();
        let result = state.accept_draw("white-player", Instant::now(), 0);
        assert!(matches!(result, Err(SessionError::NoDrawOffer)));
    }

    #[test]
    fn double_offer_from_same_side_is_idempotent() {
        let mut state = seated_state();
        state.offer_draw("white-player", 10).unwrap();
        state.offer_draw("white-player", 20).unwrap();
        assert_eq!(state.draw_offer.unwrap().at_ms, 10);
    }

    #[test]
    fn scholars_mate_ends_game_by_checkmate() {
        let mut state = seated_state();
        let moves = [
            ("white-player", "e2", "e4"),
            ("black-player", "e7", "e5"),
            ("white-player", "f1", "c4"),
            ("black-player", "b8", "c6"),
            ("white-player", "d1", "h5"),
            ("black-player", "g8", "f6"),
            ("white-player", "h5", "f7"),
        ];
        for (user, from, to) in moves {
            state
                .make_move(user, sq(from), sq(to), None, Instant::now(), 0)
                .unwrap();
        }
        assert_eq!(state.fsm, FsmState::Completed);
        assert_eq!(state.result, Some(GameResult::WhiteWins));
        assert_eq!(state.end_reason, Some(EndReason::Checkmate));
    }

    #[test]
    fn both_seats_disconnected_past_grace_abandons() {
        let mut state = seated_state();
        let t0 = Instant::now();
        state.mark_disconnected("white-player", t0, 0);
        state.mark_disconnected("black-player", t0, 0);
        let later = t0 + DEFAULT_DISCONNECT_GRACE + std::time::Duration::from_millis(1);
        state.maybe_abandon(later, 0);
        assert_eq!(state.fsm, FsmState::Completed);
        assert_eq!(state.end_reason, Some(EndReason::Abandonment));
        assert!(state.winner_id.is_none());
    }

    #[test]
    fn timeout_with_insufficient_opponent_material_is_a_draw() {
        let mut state = seated_state();
        // Black flags; White (the opponent) has only a king, even though
        // Black itself still has a queen. Only White's own material
        // decides this, per FIDE 6.9.
        state.position = Position::from_fen("4k2q/8/8/8/8/8/8/4K3 b - - 0 1").unwrap();
        state.end_by_timeout(PieceColor::Black, Instant::now(), 0);
        assert_eq!(state.fsm, FsmState::Completed);
        assert_eq!(state.result, Some(GameResult::Draw));
        assert_eq!(state.end_reason, Some(EndReason::InsufficientMaterialVsTimeout));
    }

    #[test]
    fn timeout_with_sufficient_opponent_material_is_a_win() {
        let mut state = seated_state();
        // White flags; Black (the opponent) has a queen and can mate.
        state.position = Position::from_fen("4k2q/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        state.end_by_timeout(PieceColor::White, Instant::now(), 0);
        assert_eq!(state.fsm, FsmState::Completed);
        assert_eq!(state.result, Some(GameResult::BlackWins));
        assert_eq!(state.end_reason, Some(EndReason::Timeout));
    }

    #[test]
    fn single_seat_disconnected_past_grace_other_side_wins() {
        let mut state = seated_state();
        let t0 = Instant::now();
        state.mark_disconnected("white-player", t0, 0);
        let later = t0 + DEFAULT_DISCONNECT_GRACE + std::time::Duration::from_millis(1);
        state.maybe_abandon(later, 0);
        assert_eq!(state.fsm, FsmState::Completed);
        assert_eq!(state.result, Some(GameResult::BlackWins));
    }
}
