//! JSON wire types shared between the server and any client: the realtime
//! duplex-socket frame envelopes, the HTTP request/response bodies for the
//! thin shell, and the small value types both surfaces serialize.
//!
//! Nothing here owns behavior — these are the DTOs that cross the process
//! boundary. Session state (`server::session::state`) and domain errors
//! (`server::session::commands`) are deliberately distinct types; gateway
//! code is responsible for the conversion in both directions.

use serde::{Deserialize, Serialize};

pub mod dto;

/// A frame sent by a client over the realtime socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientFrame {
    pub v: u8,
    pub id: String,
    pub cmd: ClientCommandKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game: Option<String>,
    /// For `subscribe`: the last event `seq` this client already has.
    /// When it falls within the bus's buffered tail, the server resumes
    /// streaming from there instead of resending the full snapshot.
    #[serde(rename = "lastSeq", skip_serializing_if = "Option::is_none")]
    pub last_seq: Option<u64>,
    #[serde(default)]
    pub args: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientCommandKind {
    JoinGame,
    LeaveGame,
    MakeMove,
    Resign,
    OfferDraw,
    AcceptDraw,
    DeclineDraw,
    Subscribe,
    Unsubscribe,
    Chat,
    Ping,
}

/// A frame sent by the server over the realtime socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerFrame {
    pub v: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    pub kind: ServerEventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game: Option<String>,
    pub payload: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
}

impl ServerFrame {
    pub fn event(game: &str, seq: u64, kind: ServerEventKind, payload: impl Serialize) -> Self {
        Self {
            v: 1,
            seq: Some(seq),
            kind,
            game: Some(game.to_string()),
            payload: serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
            in_reply_to: None,
        }
    }

    pub fn reply(in_reply_to: &str, kind: ServerEventKind, payload: impl Serialize) -> Self {
        Self {
            v: 1,
            seq: None,
            kind,
            game: None,
            payload: serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
            in_reply_to: Some(in_reply_to.to_string()),
        }
    }

    pub fn error(in_reply_to: Option<&str>, code: &str, message: &str) -> Self {
        Self {
            v: 1,
            seq: None,
            kind: ServerEventKind::Error,
            game: None,
            payload: serde_json::json!({ "code": code, "message": message }),
            in_reply_to: in_reply_to.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerEventKind {
    Seated,
    Move,
    DrawOffered,
    DrawAccepted,
    DrawDeclined,
    Resigned,
    Completed,
    ClockTick,
    Abandoned,
    Chat,
    Pong,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_frame_roundtrips() {
        let frame = ClientFrame {
            v: 1,
            id: "req-1".into(),
            cmd: ClientCommandKind::MakeMove,
            game: Some("game-1".into()),
            last_seq: None,
            args: serde_json::json!({"from": "e2", "to": "e4"}),
        };
        let json = serde_json::to_string(&frame).unwrap();
        let back: ClientFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(back.cmd, ClientCommandKind::MakeMove);
        assert_eq!(back.game.as_deref(), Some("game-1"));
        assert_eq!(back.last_seq, None);
    }

    #[test]
    fn client_frame_carries_last_seq_for_resume() {
        let json = r#"{"v":1,"id":"req-2","cmd":"subscribe","game":"game-1","lastSeq":15}"#;
        let frame: ClientFrame = serde_json::from_str(json).unwrap();
        assert_eq!(frame.last_seq, Some(15));
    }

    #[test]
    fn server_frame_error_has_no_seq() {
        let frame = ServerFrame::error(Some("req-1"), "illegal-move", "e2e5 is not legal");
        assert!(frame.seq.is_none());
        assert_eq!(frame.in_reply_to.as_deref(), Some("req-1"));
    }

    #[test]
    fn command_kind_uses_snake_case() {
        let value = serde_json::to_value(ClientCommandKind::AcceptDraw).unwrap();
        assert_eq!(value, serde_json::json!("accept_draw"));
    }
}
