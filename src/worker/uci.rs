//! UCI text towards the engine and classification of what comes back.

use std::fmt;

/// Commands the adapter sends to a UCI engine.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum EngineCommand {
    Uci,
    IsReady,
    UciNewGame,
    /// `None` sends `position startpos`.
    Position { fen: Option<String> },
    Go { movetime: u64 },
    Stop,
    Quit,
}

impl EngineCommand {
    /// `position startpos` for an empty or `startpos` string, otherwise
    /// `position fen <fen>`.
    pub fn position(position: &str) -> Self {
        let trimmed = position.trim();
        if trimmed.is_empty() || trimmed == "startpos" {
            EngineCommand::Position { fen: None }
        } else {
            EngineCommand::Position {
                fen: Some(trimmed.to_string()),
            }
        }
    }
}

impl fmt::Display for EngineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineCommand::Uci => f.write_str("uci"),
            EngineCommand::IsReady => f.write_str("isready"),
            EngineCommand::UciNewGame => f.write_str("ucinewgame"),
            EngineCommand::Position { fen: None } => f.write_str("position startpos"),
            EngineCommand::Position { fen: Some(fen) } => write!(f, "position fen {fen}"),
            EngineCommand::Go { movetime } => write!(f, "go movetime {movetime}"),
            EngineCommand::Stop => f.write_str("stop"),
            EngineCommand::Quit => f.write_str("quit"),
        }
    }
}

/// One line of engine output.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum EngineLine {
    /// Second token of a `bestmove` line; empty when the engine sent none.
    BestMove(String),
    UciOk,
    ReadyOk,
    Info(String),
    Other(String),
}

/// Classify by prefix. Engine output is free text, so anything starting
/// with `bestmove` counts as a result.
pub fn parse_engine_line(line: &str) -> EngineLine {
    let trimmed = line.trim();
    if trimmed.starts_with("bestmove") {
        let mv = trimmed.split_whitespace().nth(1).unwrap_or("");
        return EngineLine::BestMove(mv.to_string());
    }
    match trimmed {
        "uciok" => EngineLine::UciOk,
        "readyok" => EngineLine::ReadyOk,
        _ if trimmed.starts_with("info") => EngineLine::Info(trimmed.to_string()),
        _ => EngineLine::Other(trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_command_uses_startpos_shortcut() {
        assert_eq!(EngineCommand::position("").to_string(), "position startpos");
        assert_eq!(EngineCommand::position(" startpos ").to_string(), "position startpos");
        assert_eq!(
            EngineCommand::position("8/8/8/8/8/8/8/K6k w - - 0 1").to_string(),
            "position fen 8/8/8/8/8/8/8/K6k w - - 0 1"
        );
        assert_eq!(EngineCommand::Go { movetime: 40 }.to_string(), "go movetime 40");
    }

    #[test]
    fn bestmove_takes_second_token() {
        assert_eq!(
            parse_engine_line("bestmove e2e4 ponder e7e5"),
            EngineLine::BestMove("e2e4".into())
        );
        assert_eq!(parse_engine_line("bestmove"), EngineLine::BestMove(String::new()));
        assert_eq!(parse_engine_line("uciok"), EngineLine::UciOk);
        assert!(matches!(parse_engine_line("info depth 3 score cp 12"), EngineLine::Info(_)));
        assert!(matches!(parse_engine_line("Stockfish 16"), EngineLine::Other(_)));
    }
}
