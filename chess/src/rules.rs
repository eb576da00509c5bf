//! Stateless move legality, SAN rendering, and terminal-condition
//! detection on a position.
//!
//! Expressed as a trait so the Session depends on an interface rather
//! than a concrete chess library — any engine can back it. Never mutates
//! its inputs, never knows about time or players, never logs.

use cozy_chess::{File, Move, Piece, Rank, Square};

use crate::position::Position;
use crate::types::PieceColor;
use crate::{san::render_san, types::PieceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveRequest {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveFlags {
    pub capture: bool,
    pub castle: bool,
    pub en_passant: bool,
    pub promotion: bool,
    pub check: bool,
    pub checkmate: bool,
}

#[derive(Debug, Clone)]
pub struct MoveOutcome {
    pub position: Position,
    pub san: String,
    pub flags: MoveFlags,
    pub captured_piece: Option<PieceKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal move")]
pub struct IllegalMove;

/// Pure, stateless move legality and terminal-condition checks on a
/// position. Implementations must never mutate `position` and must not
/// perform IO.
pub trait RulesAdapter: Send + Sync {
    fn apply_move(
        &self,
        position: &Position,
        request: MoveRequest,
    ) -> Result<MoveOutcome, IllegalMove>;

    fn legal_move_count(&self, position: &Position) -> usize;

    fn side_to_move(&self, position: &Position) -> PieceColor {
        position.side_to_move()
    }

    fn is_stalemate(&self, position: &Position) -> bool;

    fn is_insufficient_material(&self, position: &Position) -> bool {
        position.material_summary().is_insufficient_for_mate()
    }

    /// Whether `side` alone, independent of the other side's material,
    /// lacks enough to force checkmate. Used by the timeout check, which
    /// per FIDE Art. 6.9 only cares about the side that did not flag.
    fn side_is_insufficient_material(&self, position: &Position, side: PieceColor) -> bool {
        position.material_summary().side_is_insufficient_for_mate(side)
    }

    fn is_fifty_move_rule(&self, position: &Position) -> bool {
        position.halfmove_clock() >= 100
    }

    /// `history` is the repetition key (see `Position::repetition_key`) of
    /// every position reached so far in the game, in order, including the
    /// current one. A key occurring 3 or more times is a draw claim.
    fn is_threefold_repetition(&self, history: &[String]) -> bool {
        history
            .iter()
            .max_by_key(|key| history.iter().filter(|k| k == key).count())
            .map(|key| history.iter().filter(|k| *k == key).count() >= 3)
            .unwrap_or(false)
    }
}

/// Production `RulesAdapter` backed by `cozy_chess`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CozyRulesAdapter;

impl RulesAdapter for CozyRulesAdapter {
    fn apply_move(
        &self,
        position: &Position,
        request: MoveRequest,
    ) -> Result<MoveOutcome, IllegalMove> {
        let board = position.board();
        let mut legal = Vec::new();
        board.generate_moves(|moves| {
            legal.extend(moves);
            false
        });

        let requested = Move {
            from: request.from,
            to: request.to,
            promotion: request.promotion.map(Into::into),
        };
        let normalized = normalize_castling(requested, &legal);

        if !legal.contains(&normalized) {
            return Err(IllegalMove);
        }

        let piece = board.piece_on(normalized.from).ok_or(IllegalMove)?;
        let is_en_passant =
            piece == Piece::Pawn && board.piece_on(normalized.to).is_none() && normalized.from.file() != normalized.to.file();
        let captured_piece = if is_en_passant {
            Some(PieceKind::Pawn)
        } else {
            board.piece_on(normalized.to).map(Into::into)
        };
        let is_castle = piece == Piece::King && board.color_on(normalized.to) == board.color_on(normalized.from);
        let is_capture = captured_piece.is_some();

        let mut after_board = board.clone();
        after_board.play_unchecked(normalized);

        let san = render_san(board, normalized, &after_board);
        let in_check = !after_board.checkers().is_empty();
        let is_checkmate = in_check && after_board.status() == cozy_chess::GameStatus::Won;

        Ok(MoveOutcome {
            position: Position::from_board(after_board),
            san,
            flags: MoveFlags {
                capture: is_capture,
                castle: is_castle,
                en_passant: is_en_passant,
                promotion: normalized.promotion.is_some(),
                check: in_check,
                checkmate: is_checkmate,
            },
            captured_piece,
        })
    }

    fn legal_move_count(&self, position: &Position) -> usize {
        let mut count = 0;
        position.board().generate_moves(|moves| {
            count += moves.len();
            false
        });
        count
    }

    fn is_stalemate(&self, position: &Position) -> bool {
        position.board().checkers().is_empty() && self.legal_move_count(position) == 0
    }
}

/// `cozy_chess` encodes castling as the king moving onto its own rook's
/// square (e1h1 rather than e1g1 for white kingside) — this adapts the
/// teacher's `convert_uci_castling_to_cozy` to accept a `MoveRequest`
/// expressed in ordinary king-moves-two-squares notation.
fn normalize_castling(mv: Move, legal_moves: &[Move]) -> Move {
    let is_back_rank = matches!(mv.from.rank(), Rank::First | Rank::Eighth);
    let is_e_file = matches!(mv.from.file(), File::E);
    let is_g_or_c_file = matches!(mv.to.file(), File::G | File::C);

    if is_back_rank && is_e_file && is_g_or_c_file && mv.promotion.is_none() {
        let target = match (mv.from.rank(), mv.to.file()) {
            (Rank::First, File::G) => Square::new(File::H, Rank::First),
            (Rank::First, File::C) => Square::new(File::A, Rank::First),
            (Rank::Eighth, File::G) => Square::new(File::H, Rank::Eighth),
            (Rank::Eighth, File::C) => Square::new(File::A, Rank::Eighth),
            _ => return mv,
        };
        let converted = Move {
            from: mv.from,
            to: target,
            promotion: None,
        };
        if legal_moves.contains(&converted) {
            return converted;
        }
    }
    mv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    #[test]
    fn legal_pawn_push() {
        let pos = Position::startpos();
        let adapter = CozyRulesAdapter;
        let outcome = adapter
            .apply_move(
                &pos,
                MoveRequest {
                    from: sq("e2"),
                    to: sq("e4"),
                    promotion: None,
                },
            )
            .unwrap();
        assert_eq!(outcome.san, "e4");
        assert!(!outcome.flags.capture);
    }

    #[test]
    fn illegal_move_rejected() {
        let pos = Position::startpos();
        let adapter = CozyRulesAdapter;
        let result = adapter.apply_move(
            &pos,
            MoveRequest {
                from: sq("e2"),
                to: sq("e5"),
                promotion: None,
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn castling_kingside_standard_squares() {
        let pos = Position::from_fen("rnbqk2r/pppp1ppp/5n2/4p3/1b2P3/2N2N2/PPPPBPPP/R1BQK2R w KQkq - 4 5").unwrap();
        let adapter = CozyRulesAdapter;
        let outcome = adapter
            .apply_move(
                &pos,
                MoveRequest {
                    from: sq("e1"),
                    to: sq("g1"),
                    promotion: None,
                },
            )
            .unwrap();
        assert_eq!(outcome.san, "O-O");
        assert!(outcome.flags.castle);
    }

    #[test]
    fn scholars_mate_checkmate_flag() {
        let adapter = CozyRulesAdapter;
        let mut pos = Position::startpos();
        for (from, to) in [
            ("e2", "e4"),
            ("e7", "e5"),
            ("f1", "c4"),
            ("b8", "c6"),
            ("d1", "h5"),
            ("g8", "f6"),
        ] {
            let outcome = adapter
                .apply_move(
                    &pos,
                    MoveRequest {
                        from: sq(from),
                        to: sq(to),
                        promotion: None,
                    },
                )
                .unwrap();
            pos = outcome.position;
        }
        let outcome = adapter
            .apply_move(
                &pos,
                MoveRequest {
                    from: sq("h5"),
                    to: sq("f7"),
                    promotion: None,
                },
            )
            .unwrap();
        assert!(outcome.flags.check);
        assert!(outcome.flags.checkmate);
        assert_eq!(outcome.san, "Qxf7#");
    }

    #[test]
    fn insufficient_material_king_vs_king() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let adapter = CozyRulesAdapter;
        assert!(adapter.is_insufficient_material(&pos));
    }

    #[test]
    fn sufficient_material_king_queen_vs_king() {
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/3QK3 w - - 0 1").unwrap();
        let adapter = CozyRulesAdapter;
        assert!(!adapter.is_insufficient_material(&pos));
    }

    #[test]
    fn threefold_repetition_detected() {
        let adapter = CozyRulesAdapter;
        let history = vec![
            "key-a".to_string(),
            "key-b".to_string(),
            "key-a".to_string(),
            "key-b".to_string(),
            "key-a".to_string(),
        ];
        assert!(adapter.is_threefold_repetition(&history));
    }

    #[test]
    fn no_repetition_below_threshold() {
        let adapter = CozyRulesAdapter;
        let history = vec!["key-a".to_string(), "key-b".to_string(), "key-a".to_string()];
        assert!(!adapter.is_threefold_repetition(&history));
    }
}
