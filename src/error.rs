//! Error types shared across the crate.

use crate::board::Square;
use crate::game::GameStatus;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FenError {
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("invalid piece char '{0}'")]
    Piece(char),
    #[error("row {0} does not cover eight files")]
    RowWidth(usize),
    #[error("expected 8 rows, found {0}")]
    RowCount(usize),
    #[error("invalid side '{0}'")]
    Side(String),
    #[error("invalid castle char '{0}'")]
    Castling(char),
    #[error("invalid en-passant square '{0}'")]
    EnPassant(String),
    #[error("invalid move counter '{0}'")]
    Counter(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoveError {
    #[error("unparseable move '{0}'")]
    Unparseable(String),
    #[error("illegal move '{0}'")]
    Illegal(String),
    #[error("no piece of the side to move on {0}")]
    NoPiece(Square),
    #[error("game is over ({0})")]
    GameOver(GameStatus),
    #[error("no promotion is waiting for a piece choice")]
    NoPendingPromotion,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no engine instantiation path succeeded")]
    Unavailable,
    #[error("failed to spawn engine process: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("failed to send command to engine: {0}")]
    Send(String),
    #[error("engine channel closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum OptionError {
    #[error("unknown option: {0}")]
    Unknown(String),
    #[error("invalid value for option {name}: {value}")]
    InvalidValue { name: String, value: String },
    #[error("option {0} requires a value")]
    MissingValue(String),
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
}
