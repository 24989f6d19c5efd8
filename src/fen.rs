//! Position codec: board + side + castling rights + en-passant <-> position string.
//!
//! Castling rights are not stored anywhere; they are derived live from the
//! moved flags of each king and its rooks. Half-move and full-move counters
//! are not tracked and are always emitted as `0 1`.

use crate::board::{Board, Color, Piece, PieceKind, Position, Square};
use crate::error::FenError;

/// Board rows top to bottom, run-length encoded and joined with `/`.
pub fn board_rows(board: &Board) -> String {
    let mut rows = Vec::with_capacity(8);
    for rank in 0..8u8 {
        let mut row = String::new();
        let mut empty = 0;
        for file in 0..8u8 {
            match board.get(Square::new(rank, file)) {
                None => empty += 1,
                Some(p) => {
                    if empty > 0 {
                        row.push_str(&empty.to_string());
                        empty = 0;
                    }
                    row.push(p.fen_char());
                }
            }
        }
        if empty > 0 {
            row.push_str(&empty.to_string());
        }
        rows.push(row);
    }
    rows.join("/")
}

fn unmoved(board: &Board, sq: Square, kind: PieceKind, color: Color) -> bool {
    board
        .get(sq)
        .is_some_and(|p| p.is(kind, color) && !p.moved)
}

/// Castling token: `K`/`Q` for white, `k`/`q` for black, `-` when none.
pub fn castling_rights(board: &Board) -> String {
    let mut rights = String::new();
    for color in [Color::White, Color::Black] {
        let rank = color.back_rank();
        if !unmoved(board, Square::new(rank, 4), PieceKind::King, color) {
            continue;
        }
        let mut letters = String::new();
        if unmoved(board, Square::new(rank, 7), PieceKind::Rook, color) {
            letters.push('k');
        }
        if unmoved(board, Square::new(rank, 0), PieceKind::Rook, color) {
            letters.push('q');
        }
        match color {
            Color::White => rights.push_str(&letters.to_ascii_uppercase()),
            Color::Black => rights.push_str(&letters),
        }
    }
    if rights.is_empty() {
        rights.push('-');
    }
    rights
}

/// Full canonical position string.
pub fn to_fen(pos: &Position) -> String {
    let ep = pos
        .en_passant
        .map(|sq| sq.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{} {} {} {} 0 1",
        board_rows(&pos.board),
        pos.side.letter(),
        castling_rights(&pos.board),
        ep
    )
}

/// Reduced key used by the opening book: board rows and side only.
pub fn book_key(board: &Board, side: Color) -> String {
    format!("{} {}", board_rows(board), side.letter())
}

/// Parse a position string. Moved flags are reconstructed from the castling
/// token: kings and rooks keep castling eligibility only where a right is
/// listed, and pawns count as moved once they left their start rank.
pub fn from_fen(fen: &str) -> Result<Position, FenError> {
    let mut parts = fen.split_whitespace();
    let piece_part = parts.next().ok_or(FenError::Missing("pieces"))?;
    let side_part = parts.next().ok_or(FenError::Missing("side"))?;
    let castle_part = parts.next().ok_or(FenError::Missing("castling"))?;
    let ep_part = parts.next().ok_or(FenError::Missing("en-passant"))?;
    for counter in parts.by_ref().take(2) {
        counter
            .parse::<u32>()
            .map_err(|_| FenError::Counter(counter.to_string()))?;
    }

    let rows: Vec<&str> = piece_part.split('/').collect();
    if rows.len() != 8 {
        return Err(FenError::RowCount(rows.len()));
    }

    let mut rights = [false; 4]; // K Q k q
    for ch in castle_part.chars() {
        match ch {
            'K' => rights[0] = true,
            'Q' => rights[1] = true,
            'k' => rights[2] = true,
            'q' => rights[3] = true,
            '-' => {}
            _ => return Err(FenError::Castling(ch)),
        }
    }
    let kingside = |color: Color| match color {
        Color::White => rights[0],
        Color::Black => rights[2],
    };
    let queenside = |color: Color| match color {
        Color::White => rights[1],
        Color::Black => rights[3],
    };

    let mut board = Board::empty();
    for (rank, row) in rows.iter().enumerate() {
        let mut file = 0usize;
        for ch in row.chars() {
            if let Some(n) = ch.to_digit(10) {
                file += n as usize;
                continue;
            }
            let kind = PieceKind::from_char(ch).ok_or(FenError::Piece(ch))?;
            let color = if ch.is_ascii_uppercase() {
                Color::White
            } else {
                Color::Black
            };
            if file >= 8 {
                return Err(FenError::RowWidth(rank));
            }
            let sq = Square::new(rank as u8, file as u8);
            let home = rank as u8 == color.back_rank();
            let moved = match kind {
                PieceKind::Pawn => sq.rank != color.pawn_start_rank(),
                PieceKind::King => !(home && sq.file == 4 && (kingside(color) || queenside(color))),
                PieceKind::Rook => {
                    !(home && ((sq.file == 7 && kingside(color)) || (sq.file == 0 && queenside(color))))
                }
                _ => false,
            };
            board.set(sq, Some(Piece { kind, color, moved }));
            file += 1;
        }
        if file != 8 {
            return Err(FenError::RowWidth(rank));
        }
    }

    let mut side_chars = side_part.chars();
    let side = match (side_chars.next().and_then(Color::from_letter), side_chars.next()) {
        (Some(color), None) => color,
        _ => return Err(FenError::Side(side_part.to_string())),
    };

    let en_passant = match ep_part {
        "-" => None,
        s => {
            let sq = Square::parse(s).ok_or_else(|| FenError::EnPassant(s.to_string()))?;
            // only ranks 3 and 6 can hold a skipped-over square
            if sq.rank != 2 && sq.rank != 5 {
                return Err(FenError::EnPassant(s.to_string()));
            }
            Some(sq)
        }
    };

    Ok(Position::new(board, side, en_passant))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::START_FEN;
    use crate::movegen::resolve_uci;

    #[test]
    fn start_position_encodes_canonically() {
        assert_eq!(to_fen(&Position::standard()), START_FEN);
        assert_eq!(
            book_key(&Board::standard(), Color::White),
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w"
        );
    }

    #[test]
    fn rights_follow_moved_flags() {
        let mut pos = Position::standard();
        for uci in ["g1f3", "g8f6", "h1g1", "f6g8"] {
            let mv = resolve_uci(&pos, uci).unwrap();
            pos = pos.apply(&mv);
        }
        assert_eq!(castling_rights(&pos.board), "Qkq");
        // rook returns home but stays moved
        let mv = resolve_uci(&pos, "g1h1").unwrap();
        pos = pos.apply(&mv);
        assert_eq!(castling_rights(&pos.board), "Qkq");
    }

    #[test]
    fn en_passant_square_is_written() {
        let pos = Position::standard();
        let pos = pos.apply(&resolve_uci(&pos, "e2e4").unwrap());
        assert_eq!(
            to_fen(&pos),
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1"
        );
    }

    #[test]
    fn decode_round_trips() {
        for fen in [
            START_FEN,
            "r3k2r/8/8/8/8/8/8/R3K2R w Kq - 0 1",
            "rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 1",
            "8/8/8/8/8/8/6k1/4K2R w - - 0 1",
        ] {
            let pos = from_fen(fen).unwrap();
            assert_eq!(to_fen(&pos), fen);
        }
    }

    #[test]
    fn decode_rejects_garbage() {
        assert_eq!(from_fen(""), Err(FenError::Missing("pieces")));
        assert!(matches!(
            from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP w KQkq - 0 1"),
            Err(FenError::RowCount(7))
        ));
        assert!(matches!(
            from_fen("rnbqkbnr/pppppppp/9/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"),
            Err(FenError::RowWidth(2))
        ));
        assert!(matches!(from_fen("8/8/8/8/8/8/8/8 x - - 0 1"), Err(FenError::Side(_))));
        assert!(matches!(from_fen("8/8/8/8/8/8/8/8 w X - 0 1"), Err(FenError::Castling('X'))));
        assert!(matches!(from_fen("8/8/8/8/8/8/8/8 w - e4 0 1"), Err(FenError::EnPassant(_))));
    }
}
