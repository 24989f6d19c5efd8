use chess_console::board::{CastleSide, Color, PieceKind, Position, Square};
use chess_console::fen::{from_fen, to_fen};
use chess_console::game::{Game, GameStatus};
use chess_console::movegen::{is_in_check, legal_moves, legal_moves_from, resolve_uci};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;

fn sq(s: &str) -> Square {
    Square::parse(s).unwrap()
}

fn castles(pos: &Position) -> Vec<CastleSide> {
    legal_moves(pos).iter().filter_map(|m| m.castle).collect()
}

#[test]
fn legal_moves_never_leave_own_king_attacked() {
    chess_console::init();
    let mut rng = StdRng::seed_from_u64(2024);
    for _ in 0..20 {
        let mut pos = Position::standard();
        for _ in 0..60 {
            let legal = legal_moves(&pos);
            for mv in &legal {
                let next = pos.apply(mv);
                assert!(
                    !is_in_check(&next.board, pos.side),
                    "{} leaves the king in check in {}",
                    mv,
                    to_fen(&pos)
                );
            }
            match legal.choose(&mut rng) {
                Some(mv) => pos = pos.apply(mv),
                None => break,
            }
        }
    }
}

#[test]
fn fools_mate() {
    let mut game = Game::default();
    for uci in ["f2f3", "e7e5", "g2g4", "d8h4"] {
        game.play_uci(uci).unwrap();
    }
    assert_eq!(game.status(), GameStatus::Checkmate { winner: Color::Black });
    assert_eq!(game.side_to_move(), Color::White);
    assert!(game.legal_moves().is_empty());
}

#[test]
fn en_passant_removes_the_passed_pawn() {
    let mut game = Game::default();
    for uci in ["e2e4", "a7a6", "e4e5", "d7d5"] {
        game.play_uci(uci).unwrap();
    }
    let targets = game.legal_targets(sq("e5"));
    assert!(targets.contains(&sq("d6")));

    game.play_uci("e5d6").unwrap();
    let board = game.position().board;
    assert!(board.get(sq("d5")).is_none(), "captured pawn must be gone");
    assert!(board.get(sq("d7")).is_none());
    assert_eq!(
        board.get(sq("d6")).map(|p| (p.kind, p.color)),
        Some((PieceKind::Pawn, Color::White))
    );
    assert_eq!(game.position().en_passant, None);
}

#[test]
fn en_passant_expires_after_one_move() {
    let mut pos = Position::standard();
    for uci in ["e2e4", "a7a6", "e4e5", "d7d5", "h2h3", "h7h6"] {
        pos = pos.apply(&resolve_uci(&pos, uci).unwrap());
    }
    assert!(legal_moves_from(&pos, sq("e5")).iter().all(|m| m.en_passant.is_none()));
}

#[test]
fn kingside_castling_conditions() {
    let open = from_fen("4k3/8/8/8/8/8/8/4K2R w K - 0 1").unwrap();
    assert_eq!(castles(&open), vec![CastleSide::Kingside]);

    // blocked f1
    let blocked = from_fen("4k3/8/8/8/8/8/8/4KB1R w K - 0 1").unwrap();
    assert!(castles(&blocked).is_empty());

    // king in check
    let checked = from_fen("4r1k1/8/8/8/8/8/8/4K2R w K - 0 1").unwrap();
    assert!(castles(&checked).is_empty());

    // f1 attacked
    let transit = from_fen("5rk1/8/8/8/8/8/8/4K2R w K - 0 1").unwrap();
    assert!(castles(&transit).is_empty());

    // g1 attacked
    let landing = from_fen("6rk/8/8/8/8/8/8/4K2R w K - 0 1").unwrap();
    assert!(castles(&landing).is_empty());

    // rook has moved
    let mut pos = open;
    for uci in ["h1h2", "e8d8", "h2h1", "d8e8"] {
        pos = pos.apply(&resolve_uci(&pos, uci).unwrap());
    }
    assert!(castles(&pos).is_empty());
}

#[test]
fn black_kingside_castling_conditions() {
    let open = from_fen("4k2r/8/8/8/8/8/8/4K3 b k - 0 1").unwrap();
    assert_eq!(castles(&open), vec![CastleSide::Kingside]);

    // blocked g8
    let blocked = from_fen("4k1nr/8/8/8/8/8/8/4K3 b k - 0 1").unwrap();
    assert!(castles(&blocked).is_empty());

    // f8 attacked
    let transit = from_fen("4k2r/8/8/8/8/8/8/5RK1 b k - 0 1").unwrap();
    assert!(castles(&transit).is_empty());

    // g8 attacked
    let landing = from_fen("4k2r/8/8/8/8/8/8/4K1R1 b k - 0 1").unwrap();
    assert!(castles(&landing).is_empty());
}

#[test]
fn queenside_castling_ignores_attacks_on_the_rook_path() {
    let open = from_fen("4k3/8/8/8/8/8/8/R3K3 w Q - 0 1").unwrap();
    assert_eq!(castles(&open), vec![CastleSide::Queenside]);

    // b1 only has to be empty, not safe
    let b_file = from_fen("1r2k3/8/8/8/8/8/8/R3K3 w Q - 0 1").unwrap();
    assert_eq!(castles(&b_file), vec![CastleSide::Queenside]);

    let occupied = from_fen("4k3/8/8/8/8/8/8/RN2K3 w Q - 0 1").unwrap();
    assert!(castles(&occupied).is_empty());

    // d1 is crossed by the king
    let d_file = from_fen("3rk3/8/8/8/8/8/8/R3K3 w Q - 0 1").unwrap();
    assert!(castles(&d_file).is_empty());

    // c1 is where the king lands
    let c_file = from_fen("2r1k3/8/8/8/8/8/8/R3K3 w Q - 0 1").unwrap();
    assert!(castles(&c_file).is_empty());
}

#[test]
fn castling_moves_the_rook() {
    let pos = from_fen("r3k2r/8/8/8/8/8/8/R3K2R b KQkq - 0 1").unwrap();
    let next = pos.apply(&resolve_uci(&pos, "e8c8").unwrap());
    assert_eq!(next.board.get(sq("d8")).map(|p| p.kind), Some(PieceKind::Rook));
    assert!(next.board.get(sq("a8")).is_none());
    assert_eq!(to_fen(&next), "2kr3r/8/8/8/8/8/8/R3K2R w KQ - 0 1");
}

#[test]
fn undo_is_exact_over_random_games() {
    let mut rng = StdRng::seed_from_u64(77);
    for _ in 0..10 {
        let mut game = Game::default();
        let start = *game.position();
        let mut played = 0;
        for _ in 0..40 {
            let legal = game.legal_moves();
            let Some(mv) = legal.choose(&mut rng) else { break };
            game.play(*mv).unwrap();
            played += 1;
        }
        for _ in 0..played {
            assert!(game.undo());
        }
        assert_eq!(*game.position(), start);
        assert_eq!(game.position().side, Color::White);
        assert_eq!(game.position().en_passant, None);
        assert!(game.moves().is_empty());
    }
}
