//! Canonical piece and color types for the project.
//! cozy-chess types are an internal implementation detail of the rules
//! adapter; nothing outside this crate should name them directly.

use cozy_chess::{File, Rank, Square};

/// Project-owned piece type. Discriminants double as the index into the
/// char tables below, so adding a variant means extending those tables
/// too — `from_char`'s `position()` scan would otherwise silently treat
/// the new piece as unrecognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PieceKind {
    Pawn = 0,
    Knight = 1,
    Bishop = 2,
    Rook = 3,
    Queen = 4,
    King = 5,
}

/// Project-owned color type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceColor {
    White,
    Black,
}

const PIECE_KINDS: [PieceKind; 6] = [
    PieceKind::Pawn,
    PieceKind::Knight,
    PieceKind::Bishop,
    PieceKind::Rook,
    PieceKind::Queen,
    PieceKind::King,
];
const PIECE_UPPER_CHARS: [char; 6] = ['P', 'N', 'B', 'R', 'Q', 'K'];

impl PieceKind {
    pub fn to_char_upper(self) -> char {
        PIECE_UPPER_CHARS[self as usize]
    }

    pub fn to_char_lower(self) -> char {
        self.to_char_upper().to_ascii_lowercase()
    }

    pub fn from_char(c: char) -> Option<Self> {
        let upper = c.to_ascii_uppercase();
        PIECE_UPPER_CHARS
            .iter()
            .position(|&known| known == upper)
            .map(|i| PIECE_KINDS[i])
    }
}

impl PieceColor {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::White => "white",
            Self::Black => "black",
        }
    }

    /// The other color. Backed by [`Not`](std::ops::Not) so call sites
    /// that prefer `!color` over `.opposite()` work too.
    pub fn opposite(self) -> Self {
        !self
    }
}

impl std::ops::Not for PieceColor {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }
}

/// Generates a pair of `From` impls between one of this crate's enums and
/// its `cozy_chess` counterpart from a single variant-correspondence
/// list, instead of writing the same match twice in opposite directions.
macro_rules! bidirectional_from {
    ($ours:ident <-> $theirs:path { $($our_variant:ident <=> $their_variant:ident),+ $(,)? }) => {
        impl From<$theirs> for $ours {
            fn from(value: $theirs) -> Self {
                match value {
                    $(<$theirs>::$their_variant => Self::$our_variant,)+
                }
            }
        }

        impl From<$ours> for $theirs {
            fn from(value: $ours) -> Self {
                match value {
                    $($ours::$our_variant => Self::$their_variant,)+
                }
            }
        }
    };
}

bidirectional_from!(PieceKind <-> cozy_chess::Piece {
    Pawn <=> Pawn,
    Knight <=> Knight,
    Bishop <=> Bishop,
    Rook <=> Rook,
    Queen <=> Queen,
    King <=> King,
});

bidirectional_from!(PieceColor <-> cozy_chess::Color {
    White <=> White,
    Black <=> Black,
});

impl std::fmt::Display for PieceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_char_upper())
    }
}

impl std::fmt::Display for PieceColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Format a square in algebraic notation ("e4").
pub fn format_square(sq: Square) -> String {
    format!("{}{}", file_char(sq.file()), rank_char(sq.rank()))
}

/// Parse a square from algebraic notation ("e4").
pub fn parse_square(s: &str) -> Option<Square> {
    s.parse().ok()
}

pub fn file_char(file: File) -> char {
    match file {
        File::A => 'a',
        File::B => 'b',
        File::C => 'c',
        File::D => 'd',
        File::E => 'e',
        File::F => 'f',
        File::G => 'g',
        File::H => 'h',
    }
}

pub fn rank_char(rank: Rank) -> char {
    match rank {
        Rank::First => '1',
        Rank::Second => '2',
        Rank::Third => '3',
        Rank::Fourth => '4',
        Rank::Fifth => '5',
        Rank::Sixth => '6',
        Rank::Seventh => '7',
        Rank::Eighth => '8',
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn piece_char_roundtrip() {
        for (ch, kind) in [
            ('p', PieceKind::Pawn),
            ('n', PieceKind::Knight),
            ('b', PieceKind::Bishop),
            ('r', PieceKind::Rook),
            ('q', PieceKind::Queen),
            ('k', PieceKind::King),
        ] {
            assert_eq!(PieceKind::from_char(ch), Some(kind));
            assert_eq!(kind.to_char_lower(), ch);
        }
    }

    #[test]
    fn from_char_rejects_unknown_letters() {
        assert_eq!(PieceKind::from_char('x'), None);
    }

    #[test]
    fn color_opposite() {
        assert_eq!(PieceColor::White.opposite(), PieceColor::Black);
        assert_eq!(PieceColor::Black.opposite(), PieceColor::White);
        assert_eq!(!PieceColor::White, PieceColor::Black);
    }

    #[test]
    fn cozy_piece_round_trips_through_from() {
        for kind in PIECE_KINDS {
            let cozy: cozy_chess::Piece = kind.into();
            assert_eq!(PieceKind::from(cozy), kind);
        }
    }

    #[test]
    fn square_format_roundtrip() {
        let sq = parse_square("e4").unwrap();
        assert_eq!(format_square(sq), "e4");
    }
}
