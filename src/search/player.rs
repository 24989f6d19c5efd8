//! Move choice for the automated side.
//!
//! Order of preference: opening book (early game, variety on), an occasional
//! exploratory heuristic move, the external search, and finally the static
//! heuristic whenever the search has nothing usable.

use super::orchestrator::{SearchOrchestrator, SearchOutcome};
use crate::board::{parse_coordinate, Move, Position};
use crate::book::OpeningBook;
use crate::eval::{fallback_move, pick_heuristic_move};
use crate::fen::to_fen;
use crate::movegen::legal_moves;
use crate::options::Options;
use crate::time::TimeManager;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveSource {
    Book,
    Exploration,
    Engine,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveChoice {
    pub mv: Move,
    pub source: MoveSource,
}

pub struct AiPlayer {
    book: OpeningBook,
    level: u8,
    variety: bool,
    book_max_ply: usize,
    think_delay_ms: (u64, u64),
    search: Option<SearchOrchestrator>,
    rng: StdRng,
}

impl AiPlayer {
    pub fn new(options: &Options, search: Option<SearchOrchestrator>) -> Self {
        Self::with_rng(options, search, StdRng::from_os_rng())
    }

    pub fn with_rng(options: &Options, search: Option<SearchOrchestrator>, rng: StdRng) -> Self {
        Self {
            book: OpeningBook::standard(),
            level: options.ai_level,
            variety: options.ai_variety,
            book_max_ply: options.book_max_ply,
            think_delay_ms: options.think_delay_ms,
            search,
            rng,
        }
    }

    /// Drop any outstanding worker request.
    pub fn cancel(&self) {
        if let Some(search) = &self.search {
            search.cancel();
        }
    }

    /// Decide on a move for the side to move after `ply` half-moves.
    ///
    /// Random draws happen up front so the returned future owns everything
    /// it needs; dropping it abandons the turn.
    pub fn think(
        &mut self,
        pos: &Position,
        ply: usize,
    ) -> impl Future<Output = Option<MoveChoice>> + Send + 'static {
        let pos = *pos;
        let legal = legal_moves(&pos);
        let (lo, hi) = self.think_delay_ms;
        let delay = Duration::from_millis(if hi > lo { self.rng.random_range(lo..=hi) } else { lo });

        let book = if self.variety && ply < self.book_max_ply && !legal.is_empty() {
            self.book.pick(&pos, &mut self.rng)
        } else {
            None
        };
        let budget = TimeManager::search_budget(self.level, &mut self.rng);
        let explore = self.rng.random::<f64>() < TimeManager::exploration_probability(self.variety, ply);
        let exploratory = if explore {
            pick_heuristic_move(&pos, &legal, &mut self.rng)
        } else {
            None
        };
        let fallback = fallback_move(&pos, &legal, &mut self.rng);
        let search = self.search.clone();

        async move {
            if legal.is_empty() {
                return None;
            }
            tokio::time::sleep(delay).await;

            if let Some(mv) = book {
                info!(mv = %mv, "book move");
                return Some(MoveChoice {
                    mv,
                    source: MoveSource::Book,
                });
            }
            if let Some(mv) = exploratory {
                info!(mv = %mv, "exploratory move");
                return Some(MoveChoice {
                    mv,
                    source: MoveSource::Exploration,
                });
            }

            if let Some(search) = search {
                let outcome = search.search(&to_fen(&pos), budget).await;
                match engine_move(&legal, &outcome) {
                    Some(mv) => {
                        info!(mv = %mv, budget, "engine move");
                        return Some(MoveChoice {
                            mv,
                            source: MoveSource::Engine,
                        });
                    }
                    None => debug!(?outcome, "no usable engine move"),
                }
            }

            let mv = fallback?;
            info!(mv = %mv, "heuristic fallback move");
            Some(MoveChoice {
                mv,
                source: MoveSource::Fallback,
            })
        }
    }
}

/// Validate the engine's answer: it must be strict coordinate notation and
/// name one of the `legal` moves.
pub fn engine_move(legal: &[Move], outcome: &SearchOutcome) -> Option<Move> {
    let coord = parse_coordinate(outcome.best_move()?)?;
    legal
        .iter()
        .find(|mv| mv.matches(&coord))
        .map(|mv| match coord.promotion {
            Some(kind) if mv.promotion => mv.with_promotion(kind),
            _ => *mv,
        })
}
