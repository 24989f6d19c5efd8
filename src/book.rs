//! Small static opening book keyed by the reduced position string.

use crate::board::{Move, Position};
use crate::fen::book_key;
use crate::movegen::resolve_uci;
use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::HashMap;
use tracing::debug;

const STANDARD_LINES: &[(&str, &[&str])] = &[
    (
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w",
        &["e2e4", "d2d4", "c2c4", "g1f3", "b1c3"],
    ),
    (
        "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b",
        &["e7e5", "c7c5", "e7e6", "c7c6", "g8f6"],
    ),
    (
        "rnbqkbnr/pppppppp/8/8/3P4/8/PPP1PPPP/RNBQKBNR b",
        &["d7d5", "g8f6", "e7e6", "c7c5", "c7c6", "g7g6"],
    ),
    (
        "rnbqkbnr/pppppppp/8/8/2P5/8/PP1PPPPP/RNBQKBNR b",
        &["e7e5", "c7c5", "g8f6", "e7e6", "g7g6"],
    ),
    (
        "rnbqkbnr/pppppppp/8/8/8/5N2/PPPPPPPP/RNBQKB1R b",
        &["d7d5", "g8f6", "c7c5", "e7e6"],
    ),
    (
        "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w",
        &["g1f3", "b1c3", "f1c4", "f1b5"],
    ),
    (
        "rnbqkbnr/ppp1pppp/8/3p4/3P4/8/PPP1PPPP/RNBQKBNR w",
        &["c2c4", "g1f3", "g2g3"],
    ),
];

#[derive(Debug, Clone)]
pub struct OpeningBook {
    lines: HashMap<String, Vec<String>>,
}

impl OpeningBook {
    /// The built-in table of common first moves.
    pub fn standard() -> Self {
        Self::from_entries(
            STANDARD_LINES
                .iter()
                .map(|(key, moves)| (key.to_string(), moves.iter().map(|m| m.to_string()).collect())),
        )
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (String, Vec<String>)>) -> Self {
        Self {
            lines: entries.into_iter().collect(),
        }
    }

    pub fn candidates(&self, key: &str) -> Option<&[String]> {
        self.lines
            .get(key)
            .map(Vec::as_slice)
            .filter(|list| !list.is_empty())
    }

    /// Pick uniformly among the candidates for this position. Entries that
    /// are not legal in the position yield no book move.
    pub fn pick<R: Rng + ?Sized>(&self, pos: &Position, rng: &mut R) -> Option<Move> {
        let key = book_key(&pos.board, pos.side);
        let uci = self.candidates(&key)?.choose(rng)?;
        match resolve_uci(pos, uci) {
            Ok(mv) => {
                debug!(%key, %uci, "book move");
                Some(mv)
            }
            Err(err) => {
                debug!(%key, %uci, %err, "book entry not playable");
                None
            }
        }
    }
}

impl Default for OpeningBook {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn start_position_has_book_moves() {
        let book = OpeningBook::standard();
        let mut rng = StdRng::seed_from_u64(7);
        let pos = Position::standard();
        for _ in 0..20 {
            let mv = book.pick(&pos, &mut rng).unwrap();
            assert!(["e2e4", "d2d4", "c2c4", "g1f3", "b1c3"].contains(&mv.to_uci().as_str()));
        }
    }

    #[test]
    fn unknown_position_has_no_book_move() {
        let book = OpeningBook::standard();
        let mut rng = StdRng::seed_from_u64(1);
        let pos = Position::standard();
        let pos = pos.apply(&resolve_uci(&pos, "h2h4").unwrap());
        assert!(book.pick(&pos, &mut rng).is_none());
    }

    #[test]
    fn illegal_entry_is_ignored() {
        let book = OpeningBook::from_entries([(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w".to_string(),
            vec!["e2e5".to_string()],
        )]);
        let mut rng = StdRng::seed_from_u64(3);
        assert!(book.pick(&Position::standard(), &mut rng).is_none());
        assert!(book.candidates("nope").is_none());
    }
}
