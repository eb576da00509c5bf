use chess::PieceColor;
use cozy_chess::Square;
use tokio::sync::oneshot;

use super::events::SubscribeOutcome;
use super::snapshot::SessionSnapshot;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error("illegal move")]
    IllegalMove,
    #[error("not your turn")]
    NotYourTurn,
    #[error("command invalid in current state")]
    WrongFsmState,
    #[error("the flag fell before this move was submitted")]
    FlagFell,
    #[error("user is not seated in this game")]
    NotAPlayer,
    #[error("seat already filled")]
    AlreadySeated,
    #[error("no draw offer to respond to")]
    NoDrawOffer,
    #[error("session actor is gone")]
    Internal(String),
}

/// Commands accepted by the session actor. Each carries a `oneshot` reply
/// so the caller (Gateway, HTTP handler) awaits the outcome without
/// touching session state directly.
pub enum SessionCommand {
    SeatPlayer {
        user_id: String,
        color: Option<PieceColor>,
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    MakeMove {
        user_id: String,
        from: Square,
        to: Square,
        promotion: Option<chess::PieceKind>,
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    Resign {
        user_id: String,
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    OfferDraw {
        user_id: String,
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    AcceptDraw {
        user_id: String,
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    DeclineDraw {
        user_id: String,
        reply: oneshot::Sender<Result<SessionSnapshot, SessionError>>,
    },
    /// Re-check for a flag fall outside of a move submission (background
    /// timer wake, or an explicit poll).
    TimeoutCheck {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Subscribe {
        subscriber_id: String,
        /// The client's last known event `seq`, if resubscribing after a
        /// drop. `None` for a first-time subscribe.
        last_seq: Option<u64>,
        reply: oneshot::Sender<SubscribeOutcome>,
    },
    MarkDisconnected {
        user_id: String,
    },
    GetSnapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Shutdown,
}
