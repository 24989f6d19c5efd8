// Direction tables and precomputed neighbour lists for move generation

use crate::board::Square;
use std::sync::OnceLock;

// (rank delta, file delta); rank 0 is the top row (rank 8)
pub const KNIGHT_OFFSETS: [(i8, i8); 8] = [
    (2, 1),
    (2, -1),
    (-2, 1),
    (-2, -1),
    (1, 2),
    (1, -2),
    (-1, 2),
    (-1, -2),
];

pub const KING_OFFSETS: [(i8, i8); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

pub const ORTHOGONAL: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
pub const DIAGONAL: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

#[inline]
pub fn in_bounds(rank: i8, file: i8) -> bool {
    (0..8).contains(&rank) && (0..8).contains(&file)
}

// Precomputed neighbour tables using OnceLock for thread safety
static KNIGHT_TARGETS: OnceLock<Vec<Vec<Square>>> = OnceLock::new();
static KING_TARGETS: OnceLock<Vec<Vec<Square>>> = OnceLock::new();

fn build_targets(offsets: &[(i8, i8)]) -> Vec<Vec<Square>> {
    Square::all()
        .map(|sq| offsets.iter().filter_map(|&(dr, df)| sq.offset(dr, df)).collect())
        .collect()
}

pub fn init_attack_tables() {
    KNIGHT_TARGETS.get_or_init(|| build_targets(&KNIGHT_OFFSETS));
    KING_TARGETS.get_or_init(|| build_targets(&KING_OFFSETS));
}

/// Squares a knight on `sq` jumps to.
#[inline]
pub fn knight_targets(sq: Square) -> &'static [Square] {
    &KNIGHT_TARGETS.get_or_init(|| build_targets(&KNIGHT_OFFSETS))[sq.index()]
}

/// Squares adjacent to `sq`.
#[inline]
pub fn king_targets(sq: Square) -> &'static [Square] {
    &KING_TARGETS.get_or_init(|| build_targets(&KING_OFFSETS))[sq.index()]
}
