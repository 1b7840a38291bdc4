//! Chess rules adapter.
//!
//! Wraps the external rules library behind the narrow interface the room
//! aggregate needs: apply a `{from, to, promotion?}` move, read the side
//! to move, and classify terminal positions. Library-level failures never
//! escape this module; anything that cannot be interpreted as a legal
//! move collapses into [`IllegalMove`].

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use shakmaty::{
    CastlingMode, Chess, Color, EnPassantMode, File, Move, Position, Role, Square, fen::Fen,
    san::SanPlus,
};

/// Side to move, `"w"` / `"b"` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "w")]
    White,
    #[serde(rename = "b")]
    Black,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::White => "w",
            Side::Black => "b",
        }
    }

    fn from_color(color: Color) -> Self {
        match color {
            Color::White => Side::White,
            Color::Black => Side::Black,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Move rejected by the rules engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IllegalMove;

/// Position string that the rules library refused to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidPosition;

/// Result of a successfully applied move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    pub san: String,
    pub fen: String,
    pub next_turn: Side,
}

/// Board-derived terminal classification.
///
/// `Draw` covers the fifty-move rule; agreement draws and clock expiry
/// are tracked above this layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardTermination {
    Active,
    Checkmate,
    Stalemate,
    InsufficientMaterial,
    ThreefoldRepetition,
    Draw,
}

/// A chess position plus the repetition bookkeeping the library does not
/// carry (it exposes positions, not histories).
#[derive(Debug, Clone)]
pub struct BoardEngine {
    pos: Chess,
    /// Occurrence count per position key, for threefold detection.
    seen: HashMap<String, u32>,
}

impl BoardEngine {
    /// Starting position.
    pub fn new() -> Self {
        let pos = Chess::default();
        let mut seen = HashMap::new();
        seen.insert(Self::position_key(&pos), 1);
        Self { pos, seen }
    }

    /// Load an arbitrary position from FEN.
    pub fn from_fen(fen: &str) -> Result<Self, InvalidPosition> {
        let pos: Chess = fen
            .parse::<Fen>()
            .map_err(|_| InvalidPosition)?
            .into_position(CastlingMode::Standard)
            .map_err(|_| InvalidPosition)?;
        let mut seen = HashMap::new();
        seen.insert(Self::position_key(&pos), 1);
        Ok(Self { pos, seen })
    }

    pub fn turn(&self) -> Side {
        Side::from_color(self.pos.turn())
    }

    pub fn is_check(&self) -> bool {
        self.pos.is_check()
    }

    /// Serialized position for client reconstruction.
    pub fn fen(&self) -> String {
        Fen::from_position(self.pos.clone(), EnPassantMode::Legal).to_string()
    }

    /// Apply a `{from, to, promotion?}` move.
    ///
    /// Squares are lower-cased before interpretation; a promotion left
    /// unspecified defaults to a queen; castling is accepted as the
    /// king's two-square move.
    pub fn apply(
        &mut self,
        from: &str,
        to: &str,
        promotion: Option<char>,
    ) -> Result<AppliedMove, IllegalMove> {
        let from = parse_square(from)?;
        let to = parse_square(to)?;
        let promotion = match promotion {
            Some(c) => Some(Role::from_char(c.to_ascii_lowercase()).ok_or(IllegalMove)?),
            None => None,
        };

        let m = self.find_move(from, to, promotion).ok_or(IllegalMove)?;
        let san = SanPlus::from_move_and_play_unchecked(&mut self.pos, &m).to_string();
        *self
            .seen
            .entry(Self::position_key(&self.pos))
            .or_insert(0) += 1;

        Ok(AppliedMove {
            san,
            fen: self.fen(),
            next_turn: self.turn(),
        })
    }

    /// Classify the current position.
    pub fn termination(&self) -> BoardTermination {
        if self.pos.is_checkmate() {
            BoardTermination::Checkmate
        } else if self.pos.is_stalemate() {
            BoardTermination::Stalemate
        } else if self.pos.is_insufficient_material() {
            BoardTermination::InsufficientMaterial
        } else if self.is_threefold() {
            BoardTermination::ThreefoldRepetition
        } else if self.pos.halfmoves() >= 100 {
            BoardTermination::Draw
        } else {
            BoardTermination::Active
        }
    }

    fn is_threefold(&self) -> bool {
        self.seen
            .get(&Self::position_key(&self.pos))
            .is_some_and(|count| *count >= 3)
    }

    /// Board, side to move, castling rights and en-passant square; the
    /// move counters must not distinguish repeated positions.
    fn position_key(pos: &Chess) -> String {
        let fen = Fen::from_position(pos.clone(), EnPassantMode::Legal).to_string();
        fen.split_whitespace()
            .take(4)
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn find_move(&self, from: Square, to: Square, promotion: Option<Role>) -> Option<Move> {
        for m in &self.pos.legal_moves() {
            let (m_from, m_to) = match *m {
                Move::Normal { from, to, .. } => (from, to),
                Move::EnPassant { from, to } => (from, to),
                Move::Castle { king, rook } => {
                    // presented to clients as the king's two-square move
                    let file = if rook.file() > king.file() {
                        File::G
                    } else {
                        File::C
                    };
                    (king, Square::from_coords(file, king.rank()))
                }
                Move::Put { .. } => continue,
            };
            if m_from != from || m_to != to {
                continue;
            }
            match (m.promotion(), promotion) {
                (None, _) => return Some(m.clone()),
                (Some(have), Some(want)) if have == want => return Some(m.clone()),
                (Some(Role::Queen), None) => return Some(m.clone()),
                _ => continue,
            }
        }
        None
    }
}

impl Default for BoardEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_square(input: &str) -> Result<Square, IllegalMove> {
    let normalized = input.trim().to_ascii_lowercase();
    Square::from_ascii(normalized.as_bytes()).map_err(|_| IllegalMove)
}
