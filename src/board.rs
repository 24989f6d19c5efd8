// Square mapping: rank 0 is the top row as stored (rank 8 in notation), file 0 is the a-file.
// Every board is an immutable value; applying a move produces a new board.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    #[inline]
    pub fn opposite(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// Side letter used in position strings.
    pub fn letter(self) -> char {
        match self {
            Color::White => 'w',
            Color::Black => 'b',
        }
    }

    pub fn from_letter(ch: char) -> Option<Color> {
        match ch {
            'w' => Some(Color::White),
            'b' => Some(Color::Black),
            _ => None,
        }
    }

    /// Row direction a pawn of this color advances in.
    #[inline]
    pub fn forward(self) -> i8 {
        match self {
            Color::White => -1,
            Color::Black => 1,
        }
    }

    pub fn pawn_start_rank(self) -> u8 {
        match self {
            Color::White => 6,
            Color::Black => 1,
        }
    }

    pub fn promotion_rank(self) -> u8 {
        match self {
            Color::White => 0,
            Color::Black => 7,
        }
    }

    /// Row holding this side's king and rooks at the start.
    pub fn back_rank(self) -> u8 {
        match self {
            Color::White => 7,
            Color::Black => 0,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::White => write!(f, "White"),
            Color::Black => write!(f, "Black"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceKind {
    /// Lowercase piece letter.
    pub fn to_char(self) -> char {
        match self {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        }
    }

    pub fn from_char(ch: char) -> Option<PieceKind> {
        match ch.to_ascii_lowercase() {
            'p' => Some(PieceKind::Pawn),
            'n' => Some(PieceKind::Knight),
            'b' => Some(PieceKind::Bishop),
            'r' => Some(PieceKind::Rook),
            'q' => Some(PieceKind::Queen),
            'k' => Some(PieceKind::King),
            _ => None,
        }
    }

    /// Kinds a pawn may promote to, from a lowercase letter.
    pub fn promotion_from_char(ch: char) -> Option<PieceKind> {
        match ch {
            'q' => Some(PieceKind::Queen),
            'r' => Some(PieceKind::Rook),
            'b' => Some(PieceKind::Bishop),
            'n' => Some(PieceKind::Knight),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Piece {
    pub kind: PieceKind,
    pub color: Color,
    /// Governs castling rights; there is no separate rights record.
    pub moved: bool,
}

impl Piece {
    pub fn new(kind: PieceKind, color: Color) -> Self {
        Self {
            kind,
            color,
            moved: false,
        }
    }

    pub fn moved(self) -> Self {
        Self {
            moved: true,
            ..self
        }
    }

    /// Position-string letter: uppercase for white, lowercase for black.
    pub fn fen_char(self) -> char {
        let ch = self.kind.to_char();
        match self.color {
            Color::White => ch.to_ascii_uppercase(),
            Color::Black => ch,
        }
    }

    pub fn is(self, kind: PieceKind, color: Color) -> bool {
        self.kind == kind && self.color == color
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Square {
    pub rank: u8,
    pub file: u8,
}

impl Square {
    pub const fn new(rank: u8, file: u8) -> Self {
        Self { rank, file }
    }

    #[inline]
    pub fn index(self) -> usize {
        self.rank as usize * 8 + self.file as usize
    }

    /// All 64 squares, top row first.
    pub fn all() -> impl Iterator<Item = Square> {
        (0..8u8).flat_map(|rank| (0..8u8).map(move |file| Square::new(rank, file)))
    }

    #[inline]
    pub fn offset(self, dr: i8, df: i8) -> Option<Square> {
        let rank = self.rank as i8 + dr;
        let file = self.file as i8 + df;
        if crate::utils::in_bounds(rank, file) {
            Some(Square::new(rank as u8, file as u8))
        } else {
            None
        }
    }

    /// Parse file-rank notation such as "e2".
    pub fn parse(s: &str) -> Option<Square> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return None;
        }
        let (file, rank) = (bytes[0], bytes[1]);
        if !(b'a'..=b'h').contains(&file) || !(b'1'..=b'8').contains(&rank) {
            return None;
        }
        Some(Square::new(b'8' - rank, file - b'a'))
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file = (b'a' + self.file) as char;
        let rank = (b'8' - self.rank) as char;
        write!(f, "{}{}", file, rank)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastleSide {
    Kingside,
    Queenside,
}

impl CastleSide {
    /// (rook origin file, rook destination file)
    pub fn rook_files(self) -> (u8, u8) {
        match self {
            CastleSide::Kingside => (7, 5),
            CastleSide::Queenside => (0, 3),
        }
    }

    /// File the king lands on.
    pub fn king_file(self) -> u8 {
        match self {
            CastleSide::Kingside => 6,
            CastleSide::Queenside => 2,
        }
    }

    /// File the king passes through on its way.
    pub fn transit_file(self) -> u8 {
        match self {
            CastleSide::Kingside => 5,
            CastleSide::Queenside => 3,
        }
    }
}

/// Candidate move. Built once by the generator and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub capture: bool,
    pub promotion: bool,
    /// Chosen promotion piece; queen is assumed when absent.
    pub promote_to: Option<PieceKind>,
    pub castle: Option<CastleSide>,
    /// Square of the pawn removed by an en-passant capture.
    pub en_passant: Option<Square>,
    /// En-passant target produced by a double pawn step.
    pub double_step: Option<Square>,
}

impl Move {
    pub fn quiet(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            capture: false,
            promotion: false,
            promote_to: None,
            castle: None,
            en_passant: None,
            double_step: None,
        }
    }

    pub fn capture(from: Square, to: Square) -> Self {
        Self {
            capture: true,
            ..Self::quiet(from, to)
        }
    }

    /// Same move with the promotion piece chosen.
    pub fn with_promotion(self, kind: PieceKind) -> Self {
        Self {
            promote_to: Some(kind),
            ..self
        }
    }

    pub fn promotion_piece(&self) -> Option<PieceKind> {
        if self.promotion {
            Some(self.promote_to.unwrap_or(PieceKind::Queen))
        } else {
            None
        }
    }

    /// Coordinate notation, e.g. "e2e4" or "e7e8q".
    pub fn to_uci(&self) -> String {
        let mut uci = format!("{}{}", self.from, self.to);
        if let Some(kind) = self.promotion_piece() {
            uci.push(kind.to_char());
        }
        uci
    }

    /// True when this move matches a parsed coordinate move.
    pub fn matches(&self, coord: &CoordinateMove) -> bool {
        if self.from != coord.from || self.to != coord.to {
            return false;
        }
        match (self.promotion, coord.promotion) {
            (true, _) => true,
            (false, None) => true,
            (false, Some(_)) => false,
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uci())
    }
}

/// A move in coordinate notation before it is matched against a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinateMove {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceKind>,
}

/// Parse `<file><rank><file><rank>[qrbn]`. Anything else is unparseable.
pub fn parse_coordinate(text: &str) -> Option<CoordinateMove> {
    let s = text.trim();
    if !(4..=5).contains(&s.len()) || !s.is_ascii() {
        return None;
    }
    let from = Square::parse(&s[0..2])?;
    let to = Square::parse(&s[2..4])?;
    let promotion = match s[4..].chars().next() {
        Some(ch) => Some(PieceKind::promotion_from_char(ch)?),
        None => None,
    };
    Some(CoordinateMove {
        from,
        to,
        promotion,
    })
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Board {
    squares: [[Option<Piece>; 8]; 8],
}

impl Board {
    pub fn empty() -> Self {
        Self {
            squares: [[None; 8]; 8],
        }
    }

    /// Standard starting position, nothing moved.
    pub fn standard() -> Self {
        const BACK: [PieceKind; 8] = [
            PieceKind::Rook,
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Queen,
            PieceKind::King,
            PieceKind::Bishop,
            PieceKind::Knight,
            PieceKind::Rook,
        ];
        let mut board = Self::empty();
        for (file, &kind) in BACK.iter().enumerate() {
            board.squares[0][file] = Some(Piece::new(kind, Color::Black));
            board.squares[1][file] = Some(Piece::new(PieceKind::Pawn, Color::Black));
            board.squares[6][file] = Some(Piece::new(PieceKind::Pawn, Color::White));
            board.squares[7][file] = Some(Piece::new(kind, Color::White));
        }
        board
    }

    #[inline]
    pub fn get(&self, sq: Square) -> Option<Piece> {
        self.squares[sq.rank as usize][sq.file as usize]
    }

    /// Place or clear a square; used while building positions.
    pub fn set(&mut self, sq: Square, piece: Option<Piece>) {
        self.squares[sq.rank as usize][sq.file as usize] = piece;
    }

    /// Builder form of [`Board::set`].
    pub fn with(mut self, sq: Square, piece: Option<Piece>) -> Self {
        self.set(sq, piece);
        self
    }

    #[inline]
    pub fn is_empty(&self, sq: Square) -> bool {
        self.get(sq).is_none()
    }

    /// Occupied squares with their pieces, top row first.
    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        Square::all().filter_map(move |sq| self.get(sq).map(|p| (sq, p)))
    }

    pub fn king_square(&self, color: Color) -> Option<Square> {
        self.pieces()
            .find(|(_, p)| p.is(PieceKind::King, color))
            .map(|(sq, _)| sq)
    }

    /// Apply a move and return the new board plus the new en-passant target.
    ///
    /// Order: clear origin, remove an en-passant victim, relocate the castling
    /// rook (flagged or inferred from a two-file king move), place the mover
    /// (promoted if needed), then derive the en-passant target.
    pub fn apply_move(&self, mv: &Move) -> (Board, Option<Square>) {
        let mut next = *self;
        let piece = match next.get(mv.from) {
            Some(p) => p,
            None => return (next, None),
        };
        next.set(mv.from, None);

        if let Some(victim) = mv.en_passant {
            next.set(victim, None);
        }

        let castle = mv.castle.or_else(|| {
            let inferred = piece.kind == PieceKind::King
                && mv.from.rank == mv.to.rank
                && mv.from.file.abs_diff(mv.to.file) == 2;
            if !inferred {
                None
            } else if mv.to.file > mv.from.file {
                Some(CastleSide::Kingside)
            } else {
                Some(CastleSide::Queenside)
            }
        });
        if let Some(side) = castle {
            let (rook_from, rook_to) = side.rook_files();
            let rook_from = Square::new(mv.to.rank, rook_from);
            if let Some(rook) = next.get(rook_from).filter(|p| p.kind == PieceKind::Rook) {
                next.set(rook_from, None);
                next.set(Square::new(mv.to.rank, rook_to), Some(rook.moved()));
            }
        }

        let mut placed = piece.moved();
        if let Some(kind) = mv.promotion_piece() {
            placed.kind = kind;
        }
        next.set(mv.to, Some(placed));

        let ep = if piece.kind == PieceKind::Pawn {
            mv.double_step
        } else {
            None
        };
        (next, ep)
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::standard()
    }
}

// Simple display, white at the bottom
impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rank in 0..8u8 {
            write!(f, "{} ", 8 - rank)?;
            for file in 0..8u8 {
                match self.get(Square::new(rank, file)) {
                    Some(p) => write!(f, "{} ", p.fen_char())?,
                    None => write!(f, ". ")?,
                }
            }
            writeln!(f)?;
        }
        write!(f, "  a b c d e f g h")
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", crate::fen::board_rows(self))
    }
}

/// Board plus side to move and the one-move en-passant target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub board: Board,
    pub side: Color,
    pub en_passant: Option<Square>,
}

impl Position {
    pub fn standard() -> Self {
        Self {
            board: Board::standard(),
            side: Color::White,
            en_passant: None,
        }
    }

    pub fn new(board: Board, side: Color, en_passant: Option<Square>) -> Self {
        Self {
            board,
            side,
            en_passant,
        }
    }

    /// Position after `mv`; the en-passant target never outlives one move.
    pub fn apply(&self, mv: &Move) -> Position {
        let (board, en_passant) = self.board.apply_move(mv);
        Position {
            board,
            side: self.side.opposite(),
            en_passant,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::standard()
    }
}

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        Square::parse(s).unwrap()
    }

    #[test]
    fn square_notation_maps_top_row_to_rank_eight() {
        assert_eq!(sq("a8"), Square::new(0, 0));
        assert_eq!(sq("h1"), Square::new(7, 7));
        assert_eq!(Square::new(6, 4).to_string(), "e2");
        assert!(Square::parse("i1").is_none());
        assert!(Square::parse("a9").is_none());
    }

    #[test]
    fn coordinate_pattern_is_strict() {
        let mv = parse_coordinate("e7e8q").unwrap();
        assert_eq!(mv.from, sq("e7"));
        assert_eq!(mv.promotion, Some(PieceKind::Queen));
        assert!(parse_coordinate("e2e4").unwrap().promotion.is_none());
        for bad in ["", "e2", "e2e", "e2e4k", "e2e4qq", "E2E4", "e9e4", "(none)", "0000"] {
            assert!(parse_coordinate(bad).is_none(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn double_step_sets_target_and_marks_moved() {
        let pos = Position::standard();
        let mv = Move {
            double_step: Some(sq("e3")),
            ..Move::quiet(sq("e2"), sq("e4"))
        };
        let next = pos.apply(&mv);
        assert_eq!(next.en_passant, Some(sq("e3")));
        assert_eq!(next.side, Color::Black);
        assert!(next.board.get(sq("e4")).unwrap().moved);
        assert!(next.board.is_empty(sq("e2")));

        let reply = next.apply(&Move::quiet(sq("g8"), sq("f6")));
        assert_eq!(reply.en_passant, None);
    }

    #[test]
    fn inferred_castle_moves_rook() {
        let board = Board::empty()
            .with(sq("e1"), Some(Piece::new(PieceKind::King, Color::White)))
            .with(sq("h1"), Some(Piece::new(PieceKind::Rook, Color::White)));
        let (next, _) = board.apply_move(&Move::quiet(sq("e1"), sq("g1")));
        assert!(next.get(sq("g1")).unwrap().is(PieceKind::King, Color::White));
        let rook = next.get(sq("f1")).unwrap();
        assert!(rook.is(PieceKind::Rook, Color::White) && rook.moved);
        assert!(next.is_empty(sq("h1")));
    }

    #[test]
    fn promotion_defaults_to_queen() {
        let board = Board::empty().with(sq("a7"), Some(Piece::new(PieceKind::Pawn, Color::White)));
        let mv = Move {
            promotion: true,
            ..Move::quiet(sq("a7"), sq("a8"))
        };
        let (next, _) = board.apply_move(&mv);
        assert_eq!(next.get(sq("a8")).unwrap().kind, PieceKind::Queen);
        assert_eq!(mv.to_uci(), "a7a8q");

        let (next, _) = board.apply_move(&mv.with_promotion(PieceKind::Knight));
        assert_eq!(next.get(sq("a8")).unwrap().kind, PieceKind::Knight);
    }
}
