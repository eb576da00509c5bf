use tokio::sync::broadcast;

use super::snapshot::SessionSnapshot;

/// Events broadcast from the session actor to all subscribers, in emission
/// order. `seq` is the bus's monotonic sequence number for this session.
#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub seq: u64,
    pub kind: SessionEventKind,
    pub snapshot: SessionSnapshot,
}

/// Reply to a `Subscribe` command. `resumed` tells the caller whether
/// `backlog` already covers everything between the client's claimed
/// `lastSeq` and now — if so the full `snapshot` need not be resent, only
/// `backlog` replayed and then `events` drained as usual.
pub struct SubscribeOutcome {
    pub snapshot: SessionSnapshot,
    pub seq: u64,
    pub resumed: bool,
    pub backlog: Vec<SessionEvent>,
    pub events: broadcast::Receiver<SessionEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEventKind {
    Seated,
    Move,
    DrawOffered,
    DrawAccepted,
    DrawDeclined,
    Resigned,
    Completed,
    ClockTick,
    Abandoned,
}

impl SessionEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionEventKind::Seated => "seated",
            SessionEventKind::Move => "move",
            SessionEventKind::DrawOffered => "draw-offered",
            SessionEventKind::DrawAccepted => "draw-accepted",
            SessionEventKind::DrawDeclined => "draw-declined",
            SessionEventKind::Resigned => "resigned",
            SessionEventKind::Completed => "completed",
            SessionEventKind::ClockTick => "clock-tick",
            SessionEventKind::Abandoned => "abandoned",
        }
    }
}
