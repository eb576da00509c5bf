use chess::PieceColor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsmState {
    Lobby,
    Live,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    WhiteWins,
    BlackWins,
    Draw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Checkmate,
    Stalemate,
    ThreefoldRepetition,
    InsufficientMaterial,
    FiftyMove,
    Timeout,
    InsufficientMaterialVsTimeout,
    Resignation,
    DrawAgreement,
    Abandonment,
}

impl EndReason {
    pub fn as_str(self) -> &'static str {
        match self {
            EndReason::Checkmate => "checkmate",
            EndReason::Stalemate => "stalemate",
            EndReason::ThreefoldRepetition => "threefold-repetition",
            EndReason::InsufficientMaterial => "insufficient-material",
            EndReason::FiftyMove => "fifty-move",
            EndReason::Timeout => "timeout",
            EndReason::InsufficientMaterialVsTimeout => "insufficient-material-vs-timeout",
            EndReason::Resignation => "resignation",
            EndReason::DrawAgreement => "draw-agreement",
            EndReason::Abandonment => "abandonment",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DrawOffer {
    pub by: PieceColor,
    pub at_ms: i64,
}

#[derive(Debug, Clone)]
pub struct MoveRecord {
    pub ordinal: u32,
    pub mover: PieceColor,
    pub from: String,
    pub to: String,
    pub piece: chess::PieceKind,
    pub captured: Option<chess::PieceKind>,
    pub san: String,
    pub is_check: bool,
    pub is_checkmate: bool,
    pub is_castle: bool,
    pub is_en_passant: bool,
    pub promotion: Option<chess::PieceKind>,
    pub elapsed_ms_for_move: u64,
    pub wall_clock_ts_ms: i64,
}

/// Immutable snapshot of a session's authoritative state, handed to
/// subscribers on `Subscribe` and after every mutation.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub game_id: String,
    pub white_id: Option<String>,
    pub black_id: Option<String>,
    pub fen: String,
    pub fsm_state: FsmState,
    pub active_side: Option<PieceColor>,
    pub white_remaining_ms: u64,
    pub black_remaining_ms: u64,
    pub move_history: Vec<MoveRecord>,
    pub draw_offer: Option<DrawOffer>,
    pub result: Option<GameResult>,
    pub end_reason: Option<EndReason>,
    pub winner_id: Option<String>,
    pub started_at_ms: Option<i64>,
    pub completed_at_ms: Option<i64>,
    pub seq: u64,
}
