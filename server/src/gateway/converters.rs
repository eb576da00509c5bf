//! Domain <-> wire type conversions. Gateway code (both the WebSocket
//! handler and the HTTP shell) is responsible for crossing this boundary;
//! [`crate::session`] and [`crate::persistence`] never see a wire type.

use axum::http::StatusCode;
use chess_wire::dto::{GameSnapshotResponse, MoveHistoryEntryDto};

use crate::matchmaker::MatchmakerError;
use crate::registry::RegistryError;
use crate::session::{FsmState, MoveRecord, SessionError, SessionSnapshot};

pub fn snapshot_to_dto(snapshot: &SessionSnapshot) -> GameSnapshotResponse {
    GameSnapshotResponse {
        id: snapshot.game_id.clone(),
        white_id: snapshot.white_id.clone(),
        black_id: snapshot.black_id.clone(),
        fen: snapshot.fen.clone(),
        fsm_state: fsm_state_str(snapshot.fsm_state).to_string(),
        active_color: snapshot.active_side.map(|c| c.as_str().to_string()),
        white_remaining_ms: snapshot.white_remaining_ms,
        black_remaining_ms: snapshot.black_remaining_ms,
        result: snapshot.result.map(|r| match r {
            crate::session::GameResult::WhiteWins => "white-wins".to_string(),
            crate::session::GameResult::BlackWins => "black-wins".to_string(),
            crate::session::GameResult::Draw => "draw".to_string(),
        }),
        end_reason: snapshot.end_reason.map(|r| r.as_str().to_string()),
        winner_id: snapshot.winner_id.clone(),
        ply_count: snapshot.move_history.len() as u32,
    }
}

pub fn move_record_to_dto(record: &MoveRecord) -> MoveHistoryEntryDto {
    MoveHistoryEntryDto {
        ordinal: record.ordinal,
        color: record.mover.as_str().to_string(),
        from: record.from.clone(),
        to: record.to.clone(),
        san: record.san.clone(),
        is_check: record.is_check,
        is_checkmate: record.is_checkmate,
        elapsed_ms: record.elapsed_ms_for_move,
    }
}

fn fsm_state_str(state: FsmState) -> &'static str {
    match state {
        FsmState::Lobby => "lobby",
        FsmState::Live => "live",
        FsmState::Completed => "completed",
    }
}

/// A client-facing `(httpStatus, errorCode, message)` per §6/§7's error
/// table. Never mutates Session state — these are rejections only.
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        let message = err.to_string();
        match err {
            SessionError::IllegalMove => ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "illegal-move", message),
            SessionError::NotYourTurn => ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "not-your-turn", message),
            SessionError::FlagFell => ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "illegal-move", message),
            SessionError::WrongFsmState => ApiError::new(StatusCode::CONFLICT, "wrong-fsm-state", message),
            SessionError::NotAPlayer => ApiError::new(StatusCode::FORBIDDEN, "not-a-player", message),
            SessionError::AlreadySeated => ApiError::new(StatusCode::CONFLICT, "already-seated", message),
            SessionError::NoDrawOffer => ApiError::new(StatusCode::BAD_REQUEST, "invalid-arg", message),
            SessionError::Internal(_) => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        let message = err.to_string();
        match err {
            RegistryError::NoSuchGame => ApiError::new(StatusCode::NOT_FOUND, "no-such-game", message),
            RegistryError::TooManyActiveGames => {
                ApiError::new(StatusCode::CONFLICT, "too-many-active-games", message)
            }
        }
    }
}

impl From<MatchmakerError> for ApiError {
    fn from(err: MatchmakerError) -> Self {
        let message = err.to_string();
        match err {
            MatchmakerError::TooManyActiveGames => {
                ApiError::new(StatusCode::CONFLICT, "too-many-active-games", message)
            }
            MatchmakerError::NoSuchGame => ApiError::new(StatusCode::NOT_FOUND, "no-such-game", message),
            MatchmakerError::InvalidTimeControl(_) => ApiError::new(StatusCode::BAD_REQUEST, "invalid-arg", message),
            MatchmakerError::Persistence(_) => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
            }
        }
    }
}
