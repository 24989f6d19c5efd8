//! Move generation, attack detection and legality filtering.
//!
//! Pseudo-legal generation follows piece movement rules only. Check safety is
//! decided in one place, [`is_legal`], by applying the move and testing the
//! mover's king; no pin detection is maintained separately.

use crate::board::{
    parse_coordinate, Board, CastleSide, Color, Move, PieceKind, Position, Square,
};
use crate::error::MoveError;
use crate::utils::{king_targets, knight_targets, DIAGONAL, ORTHOGONAL};

/// Pseudo-legal moves for the piece on `from`. Empty when the square is empty.
pub fn pseudo_moves(board: &Board, from: Square, en_passant: Option<Square>) -> Vec<Move> {
    let mut out = Vec::with_capacity(32);
    let piece = match board.get(from) {
        Some(p) => p,
        None => return out,
    };
    match piece.kind {
        PieceKind::Pawn => pawn_moves(board, from, piece.color, en_passant, &mut out),
        PieceKind::Knight => step_moves(board, from, piece.color, knight_targets(from), &mut out),
        PieceKind::Bishop => slide_moves(board, from, piece.color, &DIAGONAL, &mut out),
        PieceKind::Rook => slide_moves(board, from, piece.color, &ORTHOGONAL, &mut out),
        PieceKind::Queen => {
            slide_moves(board, from, piece.color, &ORTHOGONAL, &mut out);
            slide_moves(board, from, piece.color, &DIAGONAL, &mut out);
        }
        PieceKind::King => {
            step_moves(board, from, piece.color, king_targets(from), &mut out);
            if !piece.moved && from == Square::new(piece.color.back_rank(), 4) {
                castling_moves(board, from, piece.color, &mut out);
            }
        }
    }
    out
}

fn pawn_moves(
    board: &Board,
    from: Square,
    color: Color,
    en_passant: Option<Square>,
    out: &mut Vec<Move>,
) {
    let dir = color.forward();
    let promo_rank = color.promotion_rank();

    if let Some(one) = from.offset(dir, 0).filter(|&sq| board.is_empty(sq)) {
        out.push(Move {
            promotion: one.rank == promo_rank,
            ..Move::quiet(from, one)
        });
        if from.rank == color.pawn_start_rank() {
            if let Some(two) = from.offset(2 * dir, 0).filter(|&sq| board.is_empty(sq)) {
                out.push(Move {
                    double_step: Some(one),
                    ..Move::quiet(from, two)
                });
            }
        }
    }

    for df in [-1, 1] {
        let to = match from.offset(dir, df) {
            Some(sq) => sq,
            None => continue,
        };
        if board.get(to).is_some_and(|t| t.color != color) {
            out.push(Move {
                promotion: to.rank == promo_rank,
                ..Move::capture(from, to)
            });
        }
        if en_passant == Some(to) {
            // victim sits beside the capturing pawn, behind the target square
            let victim = Square::new(from.rank, to.file);
            if board
                .get(victim)
                .is_some_and(|p| p.kind == PieceKind::Pawn && p.color != color)
            {
                out.push(Move {
                    en_passant: Some(victim),
                    ..Move::capture(from, to)
                });
            }
        }
    }
}

fn step_moves(board: &Board, from: Square, color: Color, targets: &[Square], out: &mut Vec<Move>) {
    for &to in targets {
        match board.get(to) {
            None => out.push(Move::quiet(from, to)),
            Some(t) if t.color != color => out.push(Move::capture(from, to)),
            Some(_) => {}
        }
    }
}

fn slide_moves(board: &Board, from: Square, color: Color, dirs: &[(i8, i8)], out: &mut Vec<Move>) {
    for &(dr, df) in dirs {
        let mut cur = from.offset(dr, df);
        while let Some(to) = cur {
            match board.get(to) {
                None => out.push(Move::quiet(from, to)),
                Some(t) => {
                    if t.color != color {
                        out.push(Move::capture(from, to));
                    }
                    break; // Stop sliding when we hit any piece
                }
            }
            cur = to.offset(dr, df);
        }
    }
}

// Check safety of the path is enforced by the legality filter, not here.
fn castling_moves(board: &Board, king_from: Square, color: Color, out: &mut Vec<Move>) {
    let rank = king_from.rank;
    for side in [CastleSide::Kingside, CastleSide::Queenside] {
        let (rook_file, _) = side.rook_files();
        let rook_ok = board
            .get(Square::new(rank, rook_file))
            .is_some_and(|r| r.is(PieceKind::Rook, color) && !r.moved);
        if !rook_ok {
            continue;
        }
        let (lo, hi) = if rook_file > king_from.file {
            (king_from.file + 1, rook_file)
        } else {
            (rook_file + 1, king_from.file)
        };
        if (lo..hi).all(|file| board.is_empty(Square::new(rank, file))) {
            out.push(Move {
                castle: Some(side),
                ..Move::quiet(king_from, Square::new(rank, side.king_file()))
            });
        }
    }
}

/// Whether any piece of color `by` attacks `target`.
pub fn is_square_attacked(board: &Board, target: Square, by: Color) -> bool {
    // Pawn attacks: an attacking pawn sits one row behind, from its own point of view
    let pawn_row = -by.forward();
    for df in [-1, 1] {
        if let Some(sq) = target.offset(pawn_row, df) {
            if board.get(sq).is_some_and(|p| p.is(PieceKind::Pawn, by)) {
                return true;
            }
        }
    }
    // Knight attacks
    if knight_targets(target)
        .iter()
        .any(|&sq| board.get(sq).is_some_and(|p| p.is(PieceKind::Knight, by)))
    {
        return true;
    }
    // Sliding attacks stop at the first occupant
    let ray_hits = |dirs: &[(i8, i8)], kinds: [PieceKind; 2]| {
        dirs.iter().any(|&(dr, df)| {
            let mut cur = target.offset(dr, df);
            while let Some(sq) = cur {
                if let Some(p) = board.get(sq) {
                    return p.color == by && kinds.contains(&p.kind);
                }
                cur = sq.offset(dr, df);
            }
            false
        })
    };
    if ray_hits(&ORTHOGONAL, [PieceKind::Rook, PieceKind::Queen])
        || ray_hits(&DIAGONAL, [PieceKind::Bishop, PieceKind::Queen])
    {
        return true;
    }
    // King attacks
    king_targets(target)
        .iter()
        .any(|&sq| board.get(sq).is_some_and(|p| p.is(PieceKind::King, by)))
}

/// Whether `color`'s king is attacked. A board without that king is never in check.
pub fn is_in_check(board: &Board, color: Color) -> bool {
    board
        .king_square(color)
        .is_some_and(|sq| is_square_attacked(board, sq, color.opposite()))
}

/// Legality filter: castling may not start from or pass through an attacked
/// square, and no move may leave the mover's own king attacked.
pub fn is_legal(board: &Board, mv: &Move, turn: Color) -> bool {
    let enemy = turn.opposite();
    if let Some(side) = mv.castle {
        if is_square_attacked(board, mv.from, enemy) {
            return false;
        }
        let transit = Square::new(mv.from.rank, side.transit_file());
        if is_square_attacked(board, transit, enemy) {
            return false;
        }
    }
    let (next, _) = board.apply_move(mv);
    match next.king_square(turn) {
        Some(king) => !is_square_attacked(&next, king, enemy),
        None => false,
    }
}

/// Legal moves for the piece on `from`, which must belong to the side to move.
pub fn legal_moves_from(pos: &Position, from: Square) -> Vec<Move> {
    match pos.board.get(from) {
        Some(p) if p.color == pos.side => pseudo_moves(&pos.board, from, pos.en_passant)
            .into_iter()
            .filter(|mv| is_legal(&pos.board, mv, pos.side))
            .collect(),
        _ => Vec::new(),
    }
}

/// Every legal move for the side to move.
pub fn legal_moves(pos: &Position) -> Vec<Move> {
    let mut legal = Vec::with_capacity(64);
    for (sq, piece) in pos.board.pieces() {
        if piece.color != pos.side {
            continue;
        }
        legal.extend(
            pseudo_moves(&pos.board, sq, pos.en_passant)
                .into_iter()
                .filter(|mv| is_legal(&pos.board, mv, pos.side)),
        );
    }
    legal
}

/// Parse a coordinate-notation move and find the matching legal move,
/// carrying the requested promotion piece.
pub fn resolve_uci(pos: &Position, uci: &str) -> Result<Move, MoveError> {
    let coord = parse_coordinate(uci).ok_or_else(|| MoveError::Unparseable(uci.to_string()))?;
    legal_moves_from(pos, coord.from)
        .into_iter()
        .find(|mv| mv.matches(&coord))
        .map(|mv| match coord.promotion {
            Some(kind) if mv.promotion => mv.with_promotion(kind),
            _ => mv,
        })
        .ok_or_else(|| MoveError::Illegal(uci.to_string()))
}

/// Count leaf nodes of the legal move tree, expanding each promotion into
/// its four piece choices.
pub fn perft(pos: &Position, depth: u8) -> u64 {
    if depth == 0 {
        return 1;
    }
    let mut nodes = 0;
    for mv in legal_moves(pos) {
        if mv.promotion {
            for kind in [
                PieceKind::Queen,
                PieceKind::Rook,
                PieceKind::Bishop,
                PieceKind::Knight,
            ] {
                nodes += perft(&pos.apply(&mv.with_promotion(kind)), depth - 1);
            }
        } else {
            nodes += perft(&pos.apply(&mv), depth - 1);
        }
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Piece;

    fn sq(s: &str) -> Square {
        Square::parse(s).unwrap()
    }

    fn play(pos: Position, moves: &[&str]) -> Position {
        moves
            .iter()
            .fold(pos, |p, m| p.apply(&resolve_uci(&p, m).unwrap()))
    }

    #[test]
    fn start_position_has_twenty_moves() {
        assert_eq!(legal_moves(&Position::standard()).len(), 20);
    }

    #[test]
    fn double_step_needs_both_squares_empty() {
        let board = Board::standard().with(sq("e3"), Some(Piece::new(PieceKind::Knight, Color::Black)));
        let moves = pseudo_moves(&board, sq("e2"), None);
        assert!(moves.is_empty(), "pawn blocked on e3 has no pushes: {moves:?}");
        let board = Board::standard().with(sq("e4"), Some(Piece::new(PieceKind::Knight, Color::Black)));
        let moves = pseudo_moves(&board, sq("e2"), None);
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].to, sq("e3"));
    }

    #[test]
    fn en_passant_requires_enemy_pawn_beside() {
        let pos = play(Position::standard(), &["e2e4", "a7a6", "e4e5", "d7d5"]);
        assert_eq!(pos.en_passant, Some(sq("d6")));
        let moves = legal_moves_from(&pos, sq("e5"));
        let ep = moves.iter().find(|m| m.en_passant.is_some()).unwrap();
        assert_eq!(ep.to, sq("d6"));
        assert_eq!(ep.en_passant, Some(sq("d5")));

        // same target but nothing to capture beside the pawn
        let mut stale = pos;
        stale.board.set(sq("d5"), None);
        assert!(legal_moves_from(&stale, sq("e5"))
            .iter()
            .all(|m| m.en_passant.is_none()));
    }

    #[test]
    fn castling_needs_king_on_its_home_square() {
        let king = Some(Piece::new(PieceKind::King, Color::White));
        let rook = Some(Piece::new(PieceKind::Rook, Color::White));
        let home = Board::empty()
            .with(sq("e1"), king)
            .with(sq("h1"), rook)
            .with(sq("a1"), rook)
            .with(sq("e8"), Some(Piece::new(PieceKind::King, Color::Black)));
        assert_eq!(
            pseudo_moves(&home, sq("e1"), None).iter().filter(|m| m.castle.is_some()).count(),
            2
        );

        // unmoved king placed off e1 gets no castling candidates
        let displaced = home.with(sq("e1"), None).with(sq("d1"), king);
        assert!(pseudo_moves(&displaced, sq("d1"), None).iter().all(|m| m.castle.is_none()));
        let displaced = home.with(sq("e1"), None).with(sq("f2"), king);
        assert!(pseudo_moves(&displaced, sq("f2"), None).iter().all(|m| m.castle.is_none()));
    }

    #[test]
    fn pinned_piece_cannot_move() {
        let board = Board::empty()
            .with(sq("e1"), Some(Piece::new(PieceKind::King, Color::White)))
            .with(sq("e2"), Some(Piece::new(PieceKind::Rook, Color::White)))
            .with(sq("e8"), Some(Piece::new(PieceKind::Rook, Color::Black)))
            .with(sq("a8"), Some(Piece::new(PieceKind::King, Color::Black)));
        let pos = Position::new(board, Color::White, None);
        let rook_moves = legal_moves_from(&pos, sq("e2"));
        assert!(rook_moves.iter().all(|m| m.to.file == 4), "{rook_moves:?}");
        assert!(rook_moves.iter().any(|m| m.to == sq("e8")));
    }

    #[test]
    fn attack_oracle_stops_at_first_occupant() {
        let board = Board::empty()
            .with(sq("a1"), Some(Piece::new(PieceKind::Rook, Color::Black)))
            .with(sq("a4"), Some(Piece::new(PieceKind::Pawn, Color::White)));
        assert!(is_square_attacked(&board, sq("a3"), Color::Black));
        assert!(is_square_attacked(&board, sq("a4"), Color::Black));
        assert!(!is_square_attacked(&board, sq("a5"), Color::Black));
        // white pawn on a4 attacks b5 only
        assert!(is_square_attacked(&board, sq("b5"), Color::White));
        assert!(!is_square_attacked(&board, sq("b3"), Color::White));
    }

    #[test]
    fn resolve_rejects_unparseable_and_illegal() {
        let pos = Position::standard();
        assert!(matches!(resolve_uci(&pos, "e2e5"), Err(MoveError::Illegal(_))));
        assert!(matches!(resolve_uci(&pos, "zz"), Err(MoveError::Unparseable(_))));
        assert!(matches!(resolve_uci(&pos, "e7e5"), Err(MoveError::Illegal(_))));
    }

    #[test]
    fn perft_start_depth_three() {
        assert_eq!(perft(&Position::standard(), 1), 20);
        assert_eq!(perft(&Position::standard(), 2), 400);
        assert_eq!(perft(&Position::standard(), 3), 8902);
    }
}
