//! Time management: search budgets, worker-side movetime limits and the
//! per-side game clock.

use crate::board::Color;
use rand::Rng;
use std::time::Duration;

/// Default budget when a search request carries none.
pub const DEFAULT_TIME_BUDGET_MS: u64 = 1000;
const MIN_BUDGET_MS: u64 = 250;
const MIN_MOVETIME_MS: u64 = 40;
const MAX_MOVETIME_MS: u64 = 8000;
const BACKSTOP_MARGIN_MS: u64 = 1000;
const MIN_BACKSTOP_MS: u64 = 4000;

pub struct TimeManager;

impl TimeManager {
    /// Milliseconds to give the external search for one move at `level`,
    /// jittered so replies do not arrive at a fixed cadence.
    pub fn search_budget<R: Rng + ?Sized>(level: u8, rng: &mut R) -> u64 {
        let base = 800.0 + f64::from(level) * 350.0;
        let jitter = 0.7 + rng.random::<f64>() * 0.6;
        ((base * jitter) as u64).max(MIN_BUDGET_MS)
    }

    /// `go movetime` value sent to the engine. An explicit move time wins;
    /// otherwise the budget is clamped to a sane window.
    pub fn engine_movetime(time_budget_ms: u64, move_time_ms: Option<u64>) -> u64 {
        move_time_ms.unwrap_or_else(|| time_budget_ms.clamp(MIN_MOVETIME_MS, MAX_MOVETIME_MS))
    }

    /// Hard stop for a runaway engine search.
    pub fn backstop(time_budget_ms: u64) -> Duration {
        Duration::from_millis((time_budget_ms + BACKSTOP_MARGIN_MS).max(MIN_BACKSTOP_MS))
    }

    /// Probability of skipping the engine in favor of the heuristic.
    pub fn exploration_probability(variety: bool, ply: usize) -> f64 {
        if !variety {
            return 0.0;
        }
        (0.18 - ply as f64 * 0.01).max(0.06)
    }
}

/// Independent countdown per side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameClock {
    white: Duration,
    black: Duration,
}

impl GameClock {
    pub fn new(per_side: Duration) -> Self {
        Self {
            white: per_side,
            black: per_side,
        }
    }

    pub fn remaining(&self, color: Color) -> Duration {
        match color {
            Color::White => self.white,
            Color::Black => self.black,
        }
    }

    /// Run `color`'s clock down by `elapsed`, stopping at zero.
    pub fn tick(&mut self, color: Color, elapsed: Duration) {
        let slot = match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        };
        *slot = slot.saturating_sub(elapsed);
    }

    /// Side whose time has run out, if any.
    pub fn flagged(&self) -> Option<Color> {
        if self.white.is_zero() {
            Some(Color::White)
        } else if self.black.is_zero() {
            Some(Color::Black)
        } else {
            None
        }
    }
}

/// `mm:ss` display of a remaining time.
pub fn format_clock(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn budget_grows_with_level_and_stays_in_jitter_window() {
        let mut rng = StdRng::seed_from_u64(42);
        for level in 1..=10u8 {
            let base = 800.0 + f64::from(level) * 350.0;
            for _ in 0..20 {
                let b = TimeManager::search_budget(level, &mut rng) as f64;
                assert!(b >= (base * 0.7).floor() && b <= base * 1.3, "level {level}: {b}");
            }
        }
    }

    #[test]
    fn movetime_is_clamped_unless_explicit() {
        assert_eq!(TimeManager::engine_movetime(10, None), 40);
        assert_eq!(TimeManager::engine_movetime(20_000, None), 8000);
        assert_eq!(TimeManager::engine_movetime(1200, None), 1200);
        assert_eq!(TimeManager::engine_movetime(1200, Some(15)), 15);
    }

    #[test]
    fn backstop_has_a_floor() {
        assert_eq!(TimeManager::backstop(500), Duration::from_millis(4000));
        assert_eq!(TimeManager::backstop(5000), Duration::from_millis(6000));
    }

    #[test]
    fn exploration_decays_to_floor() {
        assert_eq!(TimeManager::exploration_probability(false, 0), 0.0);
        assert!((TimeManager::exploration_probability(true, 0) - 0.18).abs() < 1e-9);
        assert!((TimeManager::exploration_probability(true, 40) - 0.06).abs() < 1e-9);
    }

    #[test]
    fn clock_runs_one_side_only() {
        let mut clock = GameClock::new(Duration::from_millis(250));
        clock.tick(Color::White, Duration::from_millis(100));
        assert_eq!(clock.flagged(), None);
        assert_eq!(clock.remaining(Color::Black), Duration::from_millis(250));
        clock.tick(Color::White, Duration::from_millis(200));
        assert_eq!(clock.remaining(Color::White), Duration::ZERO);
        assert_eq!(clock.flagged(), Some(Color::White));
        assert_eq!(format_clock(Duration::from_secs(305)), "05:05");
    }
}
