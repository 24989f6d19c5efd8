//! Configuration for the console and its automated opponent.
//!
//! Options can be loaded from a JSON file, overridden from the command line,
//! and changed one at a time by name with [`Options::set_option`].

use crate::board::Color;
use crate::error::OptionError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Side played by the engine; `None` for two humans.
    pub ai_plays: Option<Color>,

    /// Search strength, 1..=10. Scales the search time budget.
    pub ai_level: u8,

    /// Book moves and occasional heuristic moves for less predictable play.
    pub ai_variety: bool,

    /// Book is consulted only while fewer plies than this have been played.
    pub book_max_ply: usize,

    /// Minutes on each side's clock.
    pub clock_minutes: u32,

    /// Extra wait past the search budget before giving up on the worker.
    pub search_grace_ms: u64,

    /// Random pause range before the engine replies, in milliseconds.
    pub think_delay_ms: (u64, u64),

    /// UCI engine executable started by the worker.
    pub engine_path: Option<PathBuf>,

    pub engine_args: Vec<String>,

    /// Forward raw engine output as informational worker messages.
    pub forward_engine_log: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            ai_plays: Some(Color::Black),
            ai_level: 3,
            ai_variety: true,
            book_max_ply: 10,
            clock_minutes: 5,
            search_grace_ms: 1000,
            think_delay_ms: (100, 320),
            engine_path: None,
            engine_args: Vec::new(),
            forward_engine_log: false,
        }
    }
}

fn parse_bool(name: &str, v: &str) -> Result<bool, OptionError> {
    match v {
        "true" | "on" | "1" => Ok(true),
        "false" | "off" | "0" => Ok(false),
        _ => Err(invalid(name, v)),
    }
}

fn invalid(name: &str, value: &str) -> OptionError {
    OptionError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clock_per_side(&self) -> Duration {
        Duration::from_secs(u64::from(self.clock_minutes) * 60)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, OptionError> {
        let text = std::fs::read_to_string(path)?;
        let opts: Options = serde_json::from_str(&text)?;
        opts.validate()?;
        Ok(opts)
    }

    pub fn validate(&self) -> Result<(), OptionError> {
        if !(1..=10).contains(&self.ai_level) {
            return Err(invalid("AiLevel", &self.ai_level.to_string()));
        }
        if self.clock_minutes == 0 {
            return Err(invalid("ClockMinutes", "0"));
        }
        if self.think_delay_ms.0 > self.think_delay_ms.1 {
            return Err(invalid(
                "ThinkDelay",
                &format!("{}..{}", self.think_delay_ms.0, self.think_delay_ms.1),
            ));
        }
        Ok(())
    }

    /// Set a single option by name. On error the options are unchanged.
    pub fn set_option(&mut self, name: &str, value: Option<&str>) -> Result<(), OptionError> {
        let v = value.map(str::trim);
        let require = || v.ok_or_else(|| OptionError::MissingValue(name.to_string()));
        match name {
            "AiPlays" => {
                self.ai_plays = match require()? {
                    "white" | "w" => Some(Color::White),
                    "black" | "b" => Some(Color::Black),
                    "none" => None,
                    other => return Err(invalid(name, other)),
                }
            }
            "AiLevel" => {
                let raw = require()?;
                let level: u8 = raw.parse().map_err(|_| invalid(name, raw))?;
                if !(1..=10).contains(&level) {
                    return Err(invalid(name, raw));
                }
                self.ai_level = level;
            }
            "AiVariety" => self.ai_variety = parse_bool(name, require()?)?,
            "BookMaxPly" => {
                let raw = require()?;
                self.book_max_ply = raw.parse().map_err(|_| invalid(name, raw))?;
            }
            "ClockMinutes" => {
                let raw = require()?;
                let minutes: u32 = raw.parse().map_err(|_| invalid(name, raw))?;
                if minutes == 0 {
                    return Err(invalid(name, raw));
                }
                self.clock_minutes = minutes;
            }
            "SearchGraceMs" => {
                let raw = require()?;
                self.search_grace_ms = raw.parse().map_err(|_| invalid(name, raw))?;
            }
            "EnginePath" => {
                self.engine_path = match v {
                    None | Some("") | Some("<empty>") => None,
                    Some(p) => Some(PathBuf::from(p)),
                }
            }
            "EngineLog" => self.forward_engine_log = parse_bool(name, require()?)?,
            _ => return Err(OptionError::Unknown(name.to_string())),
        }
        Ok(())
    }

    /// Options only read when the search worker starts.
    pub fn restarts_worker(name: &str) -> bool {
        matches!(name, "EnginePath" | "EngineLog")
    }

    /// One line per option, in UCI `option name ...` style.
    pub fn describe(&self) -> Vec<String> {
        let plays = match self.ai_plays {
            Some(Color::White) => "white",
            Some(Color::Black) => "black",
            None => "none",
        };
        vec![
            format!("option name AiPlays type combo default {plays} var white var black var none"),
            format!("option name AiLevel type spin default {} min 1 max 10", self.ai_level),
            format!("option name AiVariety type check default {}", self.ai_variety),
            format!("option name BookMaxPly type spin default {}", self.book_max_ply),
            format!("option name ClockMinutes type spin default {} min 1", self.clock_minutes),
            format!("option name SearchGraceMs type spin default {}", self.search_grace_ms),
            format!(
                "option name EnginePath type string default {}",
                self.engine_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "<empty>".to_string())
            ),
            format!("option name EngineLog type check default {}", self.forward_engine_log),
        ]
    }
}
