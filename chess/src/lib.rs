pub mod pgn;
pub mod position;
pub mod rules;
pub mod san;
pub mod types;

pub use position::{MaterialSummary, Position, PositionError};
pub use rules::{CozyRulesAdapter, IllegalMove, MoveFlags, MoveOutcome, MoveRequest, RulesAdapter};
pub use san::render_san;
pub use types::{file_char, format_square, parse_square, rank_char, PieceColor, PieceKind};
