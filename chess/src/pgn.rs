//! PGN movetext rendering.
//!
//! Only export is implemented — the service never needs to parse PGN back
//! in, since the authoritative move history lives in the moves table, not
//! a PGN blob. The `pgn` column on a game row exists for client/export
//! convenience only.

/// Render a sequence of SAN moves as PGN movetext, e.g. `1. e4 e5 2. Nf3`.
pub fn render_movetext(moves: &[String]) -> String {
    let mut out = String::new();
    for (i, san) in moves.iter().enumerate() {
        if i % 2 == 0 {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(&(i / 2 + 1).to_string());
            out.push_str(". ");
        } else {
            out.push(' ');
        }
        out.push_str(san);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_move_numbers() {
        let moves = vec!["e4".to_string(), "e5".to_string(), "Nf3".to_string()];
        assert_eq!(render_movetext(&moves), "1. e4 e5 2. Nf3");
    }

    #[test]
    fn single_move_no_trailing_number() {
        let moves = vec!["e4".to_string()];
        assert_eq!(render_movetext(&moves), "1. e4");
    }

    #[test]
    fn empty_history() {
        assert_eq!(render_movetext(&[]), "");
    }
}
