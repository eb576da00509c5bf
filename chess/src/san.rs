//! Standard Algebraic Notation rendering.
//!
//! The teacher's `pgn/san.rs` left this as a UCI-fallback stub; full
//! disambiguation (file, rank, or both) and the `+`/`#` suffixes are
//! implemented here instead.

use cozy_chess::{Board, Move, Piece};

use crate::types::{file_char, format_square, rank_char};

/// Render `mv` (already known to be legal in `board_before`) as SAN.
/// `board_after` is the position with `mv` already applied, used to detect
/// check/checkmate for the `+`/`#` suffix.
pub fn render_san(board_before: &Board, mv: Move, board_after: &Board) -> String {
    let piece = board_before
        .piece_on(mv.from)
        .expect("move origin must hold a piece");
    let is_capture = board_before.piece_on(mv.to).is_some() || is_en_passant(board_before, mv, piece);

    let mut san = String::new();

    if let Some(castle) = castle_notation(board_before, mv, piece) {
        san.push_str(castle);
    } else {
        match piece {
            Piece::Pawn => {
                if is_capture {
                    san.push(file_char(mv.from.file()));
                }
            }
            _ => {
                san.push(piece_letter(piece));
                san.push_str(&disambiguation(board_before, mv, piece));
            }
        }

        if is_capture {
            san.push('x');
        }

        san.push(file_char(mv.to.file()));
        san.push(rank_char(mv.to.rank()));

        if let Some(promo) = mv.promotion {
            san.push('=');
            san.push(piece_letter(promo));
        }
    }

    let in_check = !board_after.checkers().is_empty();
    if in_check {
        let is_mate = board_after.status() == cozy_chess::GameStatus::Won;
        san.push(if is_mate { '#' } else { '+' });
    }

    san
}

fn piece_letter(piece: Piece) -> char {
    match piece {
        Piece::Pawn => 'P',
        Piece::Knight => 'N',
        Piece::Bishop => 'B',
        Piece::Rook => 'R',
        Piece::Queen => 'Q',
        Piece::King => 'K',
    }
}

/// cozy_chess represents castling as the king "capturing" its own rook
/// (e1h1 for white kingside, not the standard e1g1) — see `normalize_move`
/// in `rules.rs`. Detect that shape here to print `O-O`/`O-O-O`.
fn castle_notation(board: &Board, mv: Move, piece: Piece) -> Option<&'static str> {
    if piece != Piece::King {
        return None;
    }
    if board.color_on(mv.to) != board.color_on(mv.from) {
        return None;
    }
    if mv.from.rank() != mv.to.rank() {
        return None;
    }
    use cozy_chess::File;
    Some(if mv.to.file() > mv.from.file() {
        "O-O"
    } else if mv.to.file() < mv.from.file() {
        "O-O-O"
    } else {
        return None;
    })
    .filter(|_| matches!(mv.to.file(), File::A | File::H))
}

fn is_en_passant(board: &Board, mv: Move, piece: Piece) -> bool {
    piece == Piece::Pawn && board.piece_on(mv.to).is_none() && mv.from.file() != mv.to.file()
}

/// Disambiguate among same-kind, same-destination legal moves: prefer a
/// bare piece letter, then file, then rank, then both.
fn disambiguation(board: &Board, mv: Move, piece: Piece) -> String {
    let mut others = Vec::new();
    board.generate_moves(|moves| {
        if moves.piece == piece {
            for candidate in moves {
                if candidate.to == mv.to && candidate.from != mv.from {
                    others.push(candidate.from);
                }
            }
        }
        false
    });

    if others.is_empty() {
        return String::new();
    }

    let same_file = others.iter().any(|sq| sq.file() == mv.from.file());
    let same_rank = others.iter().any(|sq| sq.rank() == mv.from.rank());

    if !same_file {
        file_char(mv.from.file()).to_string()
    } else if !same_rank {
        rank_char(mv.from.rank()).to_string()
    } else {
        format_square(mv.from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cozy_chess::Square;

    fn mv(from: &str, to: &str) -> Move {
        Move {
            from: from.parse().unwrap(),
            to: to.parse().unwrap(),
            promotion: None,
        }
    }

    #[test]
    fn pawn_push() {
        let before: Board = Board::default();
        let mut after = before.clone();
        after.play_unchecked(mv("e2", "e4"));
        assert_eq!(render_san(&before, mv("e2", "e4"), &after), "e4");
    }

    #[test]
    fn knight_development() {
        let before: Board = Board::default();
        let mut after = before.clone();
        after.play_unchecked(mv("g1", "f3"));
        assert_eq!(render_san(&before, mv("g1", "f3"), &after), "Nf3");
    }

    #[test]
    fn capture_adds_x() {
        let before: Board = "rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 2"
            .parse()
            .unwrap();
        let mut after = before.clone();
        after.play_unchecked(mv("e4", "d5"));
        assert_eq!(render_san(&before, mv("e4", "d5"), &after), "exd5");
    }

    #[test]
    fn promotion_notation() {
        let before: Board = "8/P7/8/8/8/8/8/4K2k w - - 0 1".parse().unwrap();
        let mut after = before.clone();
        let m = Move {
            from: Square::new(cozy_chess::File::A, cozy_chess::Rank::Seventh),
            to: Square::new(cozy_chess::File::A, cozy_chess::Rank::Eighth),
            promotion: Some(Piece::Queen),
        };
        after.play_unchecked(m);
        assert_eq!(render_san(&before, m, &after), "a8=Q");
    }

    #[test]
    fn castle_kingside() {
        let before: Board = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQK2R w KQkq - 0 1"
            .parse()
            .unwrap();
        let m = mv("e1", "h1");
        let mut after = before.clone();
        after.play_unchecked(m);
        assert_eq!(render_san(&before, m, &after), "O-O");
    }

    #[test]
    fn fools_mate_suffix() {
        let before: Board = "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3"
            .parse()
            .unwrap();
        // Black already delivered mate on the prior move in this position;
        // exercise the '#' suffix via the move that produced it directly.
        let from_pos: Board = "rnbqkbnr/pppp1ppp/8/4p3/6P1/5P2/PPPPP2P/RNBQKBNR b KQkq g3 0 2"
            .parse()
            .unwrap();
        let m = Move {
            from: Square::new(cozy_chess::File::D, cozy_chess::Rank::Eighth),
            to: Square::new(cozy_chess::File::H, cozy_chess::Rank::Fourth),
            promotion: None,
        };
        let mut after = from_pos.clone();
        after.play_unchecked(m);
        assert_eq!(render_san(&from_pos, m, &after), "Qh4#");
    }
}
