//! Messages crossing the worker boundary, encoded as one JSON object per line.

use serde::{Deserialize, Serialize};

/// Position and time limits for one search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPayload {
    /// Full position string; empty or `startpos` means the initial position.
    #[serde(default, alias = "fen")]
    pub position: String,
    #[serde(default, alias = "timeMs", skip_serializing_if = "Option::is_none")]
    pub time_budget_ms: Option<u64>,
    /// Overrides the clamped budget as the engine's `go movetime`.
    #[serde(default, alias = "moveTimeMs", skip_serializing_if = "Option::is_none")]
    pub move_time_ms: Option<u64>,
}

impl SearchPayload {
    pub fn new(position: impl Into<String>, time_budget_ms: u64) -> Self {
        Self {
            position: position.into(),
            time_budget_ms: Some(time_budget_ms),
            move_time_ms: None,
        }
    }
}

/// Requests handled by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Inbound {
    Init,
    Search {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        payload: Option<SearchPayload>,
    },
    Cancel {
        #[serde(default)]
        id: Option<String>,
    },
}

/// Messages posted back by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Outbound {
    #[serde(rename = "READY")]
    Ready,
    #[serde(rename = "BESTMOVE")]
    BestMove {
        id: Option<String>,
        bestmove: String,
        raw: String,
    },
    #[serde(rename = "ENGINE_MSG")]
    EngineMsg { text: String },
    #[serde(rename = "ERROR")]
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
}

impl Outbound {
    pub fn error(message: impl Into<String>, id: Option<String>) -> Self {
        Outbound::Error {
            message: message.into(),
            id,
        }
    }
}
