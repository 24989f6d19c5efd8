//! Static material evaluation and the heuristic move picker used whenever the
//! external search is unavailable, too slow, or returns garbage.

use crate::board::{Board, Color, Move, PieceKind, Position};
use rand::seq::IndexedRandom;
use rand::Rng;

// ============================================================================
// MATERIAL VALUES (centipawns)
// ============================================================================
pub const PAWN_VALUE: i32 = 100;
pub const KNIGHT_VALUE: i32 = 320;
pub const BISHOP_VALUE: i32 = 330;
pub const ROOK_VALUE: i32 = 500;
pub const QUEEN_VALUE: i32 = 900;
pub const KING_VALUE: i32 = 20000;

/// How many of the best-scoring moves the picker chooses between.
pub const HEURISTIC_TOP_N: usize = 3;

pub fn piece_value(kind: PieceKind) -> i32 {
    match kind {
        PieceKind::Pawn => PAWN_VALUE,
        PieceKind::Knight => KNIGHT_VALUE,
        PieceKind::Bishop => BISHOP_VALUE,
        PieceKind::Rook => ROOK_VALUE,
        PieceKind::Queen => QUEEN_VALUE,
        PieceKind::King => KING_VALUE,
    }
}

/// Signed material sum, white positive.
pub fn material(board: &Board) -> i32 {
    board
        .pieces()
        .map(|(_, p)| match p.color {
            Color::White => piece_value(p.kind),
            Color::Black => -piece_value(p.kind),
        })
        .sum()
}

/// Material from `side`'s point of view.
pub fn score_for(board: &Board, side: Color) -> i32 {
    match side {
        Color::White => material(board),
        Color::Black => -material(board),
    }
}

/// Score every move by the material on the resulting board and pick at
/// random among the top [`HEURISTIC_TOP_N`].
pub fn pick_heuristic_move<R: Rng + ?Sized>(
    pos: &Position,
    legal: &[Move],
    rng: &mut R,
) -> Option<Move> {
    let mut scored: Vec<(i32, Move)> = legal
        .iter()
        .map(|mv| {
            let (next, _) = pos.board.apply_move(mv);
            (score_for(&next, pos.side), *mv)
        })
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.truncate(HEURISTIC_TOP_N);
    scored.choose(rng).map(|(_, mv)| *mv)
}

/// Heuristic pick, or a uniformly random legal move if that yields nothing.
pub fn fallback_move<R: Rng + ?Sized>(pos: &Position, legal: &[Move], rng: &mut R) -> Option<Move> {
    pick_heuristic_move(pos, legal, rng).or_else(|| legal.choose(rng).copied())
}
