//! Move search for the automated side: worker orchestration and the
//! book/heuristic policy around it.

pub mod orchestrator;
pub mod player;

pub use self::orchestrator::{SearchOrchestrator, SearchOutcome, DEFAULT_GRACE};
pub use self::player::{AiPlayer, MoveChoice, MoveSource};
