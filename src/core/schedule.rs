//! Spaced-repetition scheduling.
//!
//! A fixed interval ladder, not SM-2: the recall grade moves the strength
//! level up or down, and the resulting level alone picks the next interval.
//! The same (level, grade) pair always produces the same transition, so
//! local and synced backends agree.
//!
//! | grade | level change | | level | interval |
//! |-------|--------------|-|-------|----------|
//! | hard  | -1 (floor 0) | | 0     | now      |
//! | good  | +1 (cap 5)   | | 1     | 1 day    |
//! | easy  | +2 (cap 5)   | | 2     | 3 days   |
//! |       |              | | 3     | 7 days   |
//! |       |              | | 4     | 14 days  |
//! |       |              | | 5     | 30 days  |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::item::ReviewItem;
use crate::error::CahierError;

/// Lowest strength level.
pub const MIN_STRENGTH: i32 = 0;

/// Highest strength level.
pub const MAX_STRENGTH: i32 = 5;

/// Review interval in days, indexed by the resulting strength level.
pub const INTERVAL_DAYS: [i64; 6] = [0, 1, 3, 7, 14, 30];

/// Milliseconds per day.
pub const DAY_MS: i64 = 86_400_000;

/// Recall quality reported after reviewing an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    /// Poor recall ("low").
    #[serde(alias = "low")]
    Hard,
    /// Normal recall.
    #[serde(alias = "normal")]
    Good,
    /// Effortless recall ("high").
    #[serde(alias = "high")]
    Easy,
}

impl Quality {
    pub fn all() -> &'static [Quality] {
        &[Quality::Hard, Quality::Good, Quality::Easy]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Hard => "hard",
            Quality::Good => "good",
            Quality::Easy => "easy",
        }
    }

    fn level_delta(&self) -> i32 {
        match self {
            Quality::Hard => -1,
            Quality::Good => 1,
            Quality::Easy => 2,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quality {
    type Err = CahierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hard" | "low" => Ok(Quality::Hard),
            "good" | "normal" => Ok(Quality::Good),
            "easy" | "high" => Ok(Quality::Easy),
            other => Err(CahierError::invalid_input(format!(
                "unknown recall quality '{}' (expected hard, good or easy)",
                other
            ))),
        }
    }
}

/// Clamp a possibly corrupted stored level into range.
pub fn clamp_strength(level: i32) -> i32 {
    level.clamp(MIN_STRENGTH, MAX_STRENGTH)
}

/// The strength level after grading an item at `level`.
pub fn next_strength(level: i32, quality: Quality) -> i32 {
    clamp_strength(clamp_strength(level) + quality.level_delta())
}

/// Interval in milliseconds for a strength level.
pub fn interval_ms(level: i32) -> i64 {
    // clamp_strength keeps the index in 0..=5
    INTERVAL_DAYS[clamp_strength(level) as usize] * DAY_MS
}

/// Apply a recall grade to an item.
///
/// Never fails: out-of-range levels are clamped first. The returned item
/// has a fresh `next_review_at` even if the stored one was unreadable.
pub fn schedule(item: &ReviewItem, quality: Quality, now: i64) -> ReviewItem {
    let strength_level = next_strength(item.strength_level, quality);
    ReviewItem {
        strength_level,
        next_review_at: Some(now + interval_ms(strength_level)),
        ..item.clone()
    }
}

/// The interval (days) each grade would produce from `level`, for display.
pub fn preview_intervals(level: i32) -> [(Quality, i64); 3] {
    [Quality::Hard, Quality::Good, Quality::Easy]
        .map(|q| (q, INTERVAL_DAYS[next_strength(level, q) as usize]))
}

/// Format an interval in days for humans.
pub fn format_interval(days: i64) -> String {
    match days {
        d if d <= 0 => "now".to_string(),
        d if d < 7 => format!("{}d", d),
        d if d < 30 => format!("{}w", d / 7),
        d => format!("{}mo", d / 30),
    }
}
