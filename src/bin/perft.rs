use anyhow::{anyhow, Context, Result};
use chess_console::board::{PieceKind, START_FEN};
use chess_console::fen::from_fen;
use chess_console::movegen::{legal_moves, perft};
use clap::Parser;
use shakmaty::fen::Fen;
use shakmaty::{Chess, Position};

#[derive(Parser, Debug)]
#[command(author, version, about = "Move generator node counts, checked against shakmaty", long_about = None)]
struct Args {
    #[arg(short, long, default_value_t = String::from(START_FEN))]
    fen: String,

    #[arg(short, long, default_value_t = 4)]
    depth: u8,

    /// Print per-move counts at the root
    #[arg(long)]
    divide: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    chess_console::init();

    println!("Running perft on FEN: '{}' at depth {}", args.fen, args.depth);

    let pos = from_fen(&args.fen).with_context(|| format!("invalid position '{}'", args.fen))?;
    let reference: Chess = {
        let fen: Fen = args.fen.parse().map_err(|e| anyhow!("shakmaty: {e}"))?;
        fen.into_position(shakmaty::CastlingMode::Standard)
            .map_err(|e| anyhow!("shakmaty: {e}"))?
    };

    if args.divide && args.depth > 0 {
        for mv in legal_moves(&pos) {
            let choices: Vec<_> = if mv.promotion {
                [PieceKind::Queen, PieceKind::Rook, PieceKind::Bishop, PieceKind::Knight]
                    .into_iter()
                    .map(|kind| mv.with_promotion(kind))
                    .collect()
            } else {
                vec![mv]
            };
            for mv in choices {
                println!("{}: {}", mv, perft(&pos.apply(&mv), args.depth - 1));
            }
        }
    }

    let start = std::time::Instant::now();
    let nodes = perft(&pos, args.depth);
    let duration = start.elapsed();
    println!(
        "perft({}) = {} nodes ({} ms, {:.2} Mnps)",
        args.depth,
        nodes,
        duration.as_millis(),
        nodes as f64 / (duration.as_micros().max(1) as f64)
    );

    let expected = perft_shakmaty(&reference, args.depth);
    println!("Shakmaty perft({}) = {}", args.depth, expected);
    if nodes != expected {
        return Err(anyhow!("node count mismatch: {nodes} vs {expected}"));
    }
    Ok(())
}

fn perft_shakmaty(pos: &Chess, depth: u8) -> u64 {
    if depth == 0 {
        return 1;
    }

    let mut nodes = 0;
    for m in pos.legal_moves() {
        let mut new_pos = pos.clone();
        new_pos.play_unchecked(&m);
        nodes += perft_shakmaty(&new_pos, depth - 1);
    }
    nodes
}
