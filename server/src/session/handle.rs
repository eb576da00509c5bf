//! Cloneable handle to a running session actor. Every caller — the
//! Gateway, HTTP handlers, the registry's sweep task — goes through this
//! rather than touching `SessionState` directly.

use chess::PieceColor;
use cozy_chess::Square;
use tokio::sync::{mpsc, oneshot};

use super::commands::{SessionCommand, SessionError};
use super::events::SubscribeOutcome;
use super::snapshot::SessionSnapshot;

#[derive(Clone)]
pub struct SessionHandle {
    game_id: String,
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub(crate) fn new(game_id: String, tx: mpsc::Sender<SessionCommand>) -> Self {
        Self { game_id, tx }
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    async fn call<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| SessionError::Internal("session actor is gone".into()))?;
        reply_rx
            .await
            .map_err(|_| SessionError::Internal("session actor dropped reply".into()))
    }

    pub async fn seat_player(
        &self,
        user_id: String,
        color: Option<PieceColor>,
    ) -> Result<SessionSnapshot, SessionError> {
        self.call(|reply| SessionCommand::SeatPlayer {
            user_id,
            color,
            reply,
        })
        .await?
    }

    pub async fn make_move(
        &self,
        user_id: String,
        from: Square,
        to: Square,
        promotion: Option<chess::PieceKind>,
    ) -> Result<SessionSnapshot, SessionError> {
        self.call(|reply| SessionCommand::MakeMove {
            user_id,
            from,
            to,
            promotion,
            reply,
        })
        .await?
    }

    pub async fn resign(&self, user_id: String) -> Result<SessionSnapshot, SessionError> {
        self.call(|reply| SessionCommand::Resign { user_id, reply }).await?
    }

    pub async fn offer_draw(&self, user_id: String) -> Result<SessionSnapshot, SessionError> {
        self.call(|reply| SessionCommand::OfferDraw { user_id, reply }).await?
    }

    pub async fn accept_draw(&self, user_id: String) -> Result<SessionSnapshot, SessionError> {
        self.call(|reply| SessionCommand::AcceptDraw { user_id, reply }).await?
    }

    pub async fn decline_draw(&self, user_id: String) -> Result<SessionSnapshot, SessionError> {
        self.call(|reply| SessionCommand::DeclineDraw { user_id, reply }).await?
    }

    pub async fn subscribe(
        &self,
        subscriber_id: String,
        last_seq: Option<u64>,
    ) -> Result<SubscribeOutcome, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::Subscribe {
                subscriber_id,
                last_seq,
                reply: reply_tx,
            })
            .await
            .map_err(|_| SessionError::Internal("session actor is gone".into()))?;
        reply_rx
            .await
            .map_err(|_| SessionError::Internal("session actor dropped reply".into()))
    }

    pub async fn mark_disconnected(&self, user_id: String) {
        let _ = self.tx.send(SessionCommand::MarkDisconnected { user_id }).await;
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::GetSnapshot { reply: reply_tx })
            .await
            .map_err(|_| SessionError::Internal("session actor is gone".into()))?;
        reply_rx
            .await
            .map_err(|_| SessionError::Internal("session actor dropped reply".into()))
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(SessionCommand::Shutdown).await;
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
