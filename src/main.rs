//! Terminal chess console: play against the automated side with clocks,
//! undo and a move log.

use anyhow::{Context, Result};
use chess_console::board::{Color, PieceKind, Square};
use chess_console::game::{Game, GameStatus, Selection};
use chess_console::options::Options;
use chess_console::search::{AiPlayer, MoveChoice, SearchOrchestrator};
use chess_console::time::format_clock;
use chess_console::worker::{EngineRegistry, WorkerLink};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const TICK: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(author, version, about = "Play chess in the terminal against an engine", long_about = None)]
struct Args {
    /// JSON options file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Side played by the engine: white, black or none
    #[arg(long)]
    ai: Option<String>,

    /// Engine strength 1..10
    #[arg(short, long)]
    level: Option<u8>,

    /// Disable book moves and exploratory moves
    #[arg(long)]
    no_variety: bool,

    /// Minutes per side
    #[arg(short, long)]
    minutes: Option<u32>,

    /// UCI engine executable for the search worker
    #[arg(short, long, env = "CHESS_ENGINE")]
    engine: Option<PathBuf>,

    /// Extra argument passed to the engine (repeatable)
    #[arg(long = "engine-arg", allow_hyphen_values = true)]
    engine_args: Vec<String>,

    /// Run the search worker as this separate executable instead of in-process
    #[arg(long)]
    worker: Option<PathBuf>,

    /// Log raw engine output
    #[arg(long)]
    engine_log: bool,

    /// Seed for the engine's random choices
    #[arg(long)]
    seed: Option<u64>,
}

fn load_options(args: &Args) -> Result<Options> {
    let mut options = match &args.config {
        Some(path) => Options::from_json_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => Options::default(),
    };
    if let Some(ai) = &args.ai {
        options.set_option("AiPlays", Some(ai))?;
    }
    if let Some(level) = args.level {
        options.set_option("AiLevel", Some(&level.to_string()))?;
    }
    if args.no_variety {
        options.ai_variety = false;
    }
    if let Some(minutes) = args.minutes {
        options.set_option("ClockMinutes", Some(&minutes.to_string()))?;
    }
    if let Some(engine) = &args.engine {
        options.engine_path = Some(engine.clone());
    }
    if !args.engine_args.is_empty() {
        options.engine_args = args.engine_args.clone();
    }
    options.forward_engine_log |= args.engine_log;
    Ok(options)
}

fn start_search(worker: Option<&Path>, options: &Options) -> Result<Option<SearchOrchestrator>> {
    let grace = Duration::from_millis(options.search_grace_ms);
    if let Some(worker) = worker {
        let mut worker_args = Vec::new();
        if let Some(engine) = &options.engine_path {
            worker_args.push("--engine".to_string());
            worker_args.push(engine.display().to_string());
        }
        for arg in &options.engine_args {
            worker_args.push(format!("--engine-arg={arg}"));
        }
        if options.forward_engine_log {
            worker_args.push("--engine-log".to_string());
        }
        let link = WorkerLink::child_process(worker, &worker_args)
            .with_context(|| format!("failed to start worker {}", worker.display()))?;
        return Ok(Some(SearchOrchestrator::new(link, grace)));
    }
    match &options.engine_path {
        Some(path) => {
            let registry = EngineRegistry::with_process(Some(path.clone()), options.engine_args.clone());
            let link = WorkerLink::in_process(registry, options.forward_engine_log);
            Ok(Some(SearchOrchestrator::new(link, grace)))
        }
        None => {
            info!("no engine configured, using the built-in heuristic");
            Ok(None)
        }
    }
}

type Thinking = Pin<Box<dyn Future<Output = Option<MoveChoice>> + Send>>;

struct Console {
    game: Game,
    options: Options,
    player: AiPlayer,
    search: Option<SearchOrchestrator>,
    worker: Option<PathBuf>,
    seed: Option<u64>,
    thinking: Option<Thinking>,
}

impl Console {
    fn new(
        options: Options,
        search: Option<SearchOrchestrator>,
        worker: Option<PathBuf>,
        seed: Option<u64>,
    ) -> Self {
        let player = make_player(&options, search.clone(), seed);
        Self {
            game: Game::new(options.clock_per_side()),
            options,
            player,
            search,
            worker,
            seed,
            thinking: None,
        }
    }

    fn ai_to_move(&self) -> bool {
        self.game.status() == GameStatus::Ongoing && self.options.ai_plays == Some(self.game.side_to_move())
    }

    fn stop_thinking(&mut self) {
        if self.thinking.take().is_some() {
            self.player.cancel();
        }
    }

    fn show(&self) {
        println!("{}", self.game.position().board);
        let clock = self.game.clock();
        println!(
            "White {} | Black {} | {} to move",
            format_clock(clock.remaining(Color::White)),
            format_clock(clock.remaining(Color::Black)),
            self.game.side_to_move()
        );
        if let Some(mv) = self.game.last_move() {
            println!("Last move: {mv}");
        }
        if let Some(king) = self.game.checked_king() {
            println!("Check! King on {king}");
        }
        if self.game.status().is_over() {
            println!("Game over: {}", self.game.status());
        }
    }

    fn on_status(&mut self, status: GameStatus) {
        self.show();
        if status.is_over() {
            self.stop_thinking();
        }
    }

    /// Returns false when the console should exit.
    fn command(&mut self, line: &str) -> bool {
        let mut parts = line.split_whitespace();
        let Some(cmd) = parts.next() else { return true };
        match cmd {
            "quit" | "exit" => return false,
            "help" => print_help(),
            "board" => self.show(),
            "fen" => println!("{}", self.game.fen()),
            "moves" => {
                for (i, pair) in self.game.moves().chunks(2).enumerate() {
                    println!("{}. {}", i + 1, pair.join(" "));
                }
            }
            "new" => {
                self.stop_thinking();
                self.game.reset();
                self.show();
            }
            "undo" => {
                self.stop_thinking();
                let mut undone = self.game.undo();
                // take back the engine's reply too so the human is to move
                while undone && self.ai_to_move() && self.game.ply_count() > 0 {
                    undone = self.game.undo();
                }
                if !undone {
                    println!("Nothing to undo");
                }
                self.show();
            }
            "select" => match parts.next().and_then(Square::parse) {
                Some(sq) if !self.ai_to_move() => match self.game.select(sq) {
                    Selection::Selected { from, targets } => {
                        let list: Vec<String> = targets.iter().map(|t| t.to_string()).collect();
                        println!("{from}: {}", list.join(" "));
                    }
                    Selection::Played(status) => self.on_status(status),
                    Selection::PromotionRequired { .. } => println!("Promote to? (promote q|r|b|n)"),
                    Selection::Cleared => println!("Selection cleared"),
                    Selection::Ignored => println!("Ignored"),
                },
                Some(_) => println!("Not your turn"),
                None => println!("Usage: select <square>"),
            },
            "promote" => {
                let kind = parts
                    .next()
                    .and_then(|s| s.chars().next())
                    .and_then(PieceKind::promotion_from_char);
                match kind {
                    Some(kind) => match self.game.promote(kind) {
                        Ok(status) => self.on_status(status),
                        Err(err) => println!("{err}"),
                    },
                    None => {
                        self.game.cancel_promotion();
                        println!("Promotion cancelled");
                    }
                }
            }
            "options" => {
                for line in self.options.describe() {
                    println!("{line}");
                }
            }
            "setoption" => self.set_option(line),
            mv if !self.ai_to_move() => match self.game.play_uci(mv) {
                Ok(status) => self.on_status(status),
                Err(err) => println!("{err}"),
            },
            _ => println!("Not your turn"),
        }
        true
    }

    /// `setoption name <name> [value <value>]`
    fn set_option(&mut self, line: &str) {
        let rest = line.trim_start_matches("setoption").trim();
        let rest = rest.strip_prefix("name").unwrap_or(rest).trim();
        let (name, value) = match rest.split_once(" value ") {
            Some((name, value)) => (name.trim(), Some(value.trim())),
            None => (rest, None),
        };
        if let Err(err) = self.options.set_option(name, value) {
            println!("{err}");
            return;
        }
        self.stop_thinking();
        self.game.set_time_control(self.options.clock_per_side());
        if Options::restarts_worker(name) {
            if let Err(err) = self.restart_search() {
                println!("{err:#}");
            }
        }
        self.player = make_player(&self.options, self.search.clone(), self.seed);
        println!("{name} updated");
    }

    /// Replace the search worker so engine options take effect.
    fn restart_search(&mut self) -> Result<()> {
        if let Some(old) = self.search.take() {
            old.cancel();
        }
        self.search = start_search(self.worker.as_deref(), &self.options)?;
        info!(engine = self.search.is_some(), "search worker restarted");
        Ok(())
    }

    async fn run(mut self) -> Result<()> {
        let mut stdin = BufReader::new(tokio::io::stdin()).lines();
        let mut ticker = tokio::time::interval(TICK);
        let mut last_tick = Instant::now();
        self.show();

        loop {
            if self.thinking.is_none() && self.ai_to_move() {
                println!("AI thinking...");
                let pos = *self.game.position();
                self.thinking = Some(Box::pin(self.player.think(&pos, self.game.ply_count())));
            }

            tokio::select! {
                _ = ticker.tick() => {
                    let now = Instant::now();
                    let before = self.game.status();
                    let status = self.game.tick(now - last_tick);
                    last_tick = now;
                    if status != before {
                        self.on_status(status);
                    }
                }
                choice = async {
                    match self.thinking.as_mut() {
                        Some(fut) => fut.await,
                        None => std::future::pending().await,
                    }
                }, if self.thinking.is_some() => {
                    self.thinking = None;
                    match choice {
                        Some(choice) => match self.game.play(choice.mv) {
                            Ok(status) => {
                                println!("AI plays {} ({:?})", choice.mv, choice.source);
                                self.on_status(status);
                            }
                            Err(err) => warn!(%err, "engine move rejected"),
                        },
                        None => warn!("engine found no move"),
                    }
                }
                line = stdin.next_line() => match line.context("failed to read stdin")? {
                    Some(line) => {
                        if !self.command(line.trim()) {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
        self.stop_thinking();
        Ok(())
    }
}

fn make_player(options: &Options, search: Option<SearchOrchestrator>, seed: Option<u64>) -> AiPlayer {
    match seed {
        Some(seed) => AiPlayer::with_rng(options, search, StdRng::seed_from_u64(seed)),
        None => AiPlayer::new(options, search),
    }
}

fn print_help() {
    println!("Commands:");
    println!("  <move>              play a move in coordinate notation, e.g. e2e4 or e7e8q");
    println!("  select <square>     pick up a piece or move the selected one there");
    println!("  promote <q|r|b|n>   finish a pending promotion");
    println!("  undo | new | board | fen | moves | options");
    println!("  setoption name <name> value <value>");
    println!("  quit");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    chess_console::init();

    let args = Args::parse();
    let options = load_options(&args)?;
    let search = start_search(args.worker.as_deref(), &options)?;
    Console::new(options, search, args.worker, args.seed).run().await
}
