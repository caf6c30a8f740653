//! Announcement policy
//!
//! Decides whether a freshly fetched step should be spoken. A step is
//! announced when its instruction text changed, when the remaining distance
//! moved by at least the distance threshold, or when enough time has passed
//! since the last announcement. The very first step is always announced.

use std::time::Duration;

use crate::config::AnnounceConfig;
use crate::routes::Step;

/// What was last announced
///
/// Replaced as a whole on every positive decision.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnouncementMemory {
    pub instruction: String,
    pub distance_m: f64,
    pub announced_at_ms: i64,
}

/// Decides when a step is worth speaking again
#[derive(Debug, Clone)]
pub struct AnnouncementPolicy {
    distance_threshold_m: f64,
    repeat_after_ms: i64,
    memory: Option<AnnouncementMemory>,
}

impl Default for AnnouncementPolicy {
    fn default() -> Self {
        Self::new(&AnnounceConfig::default())
    }
}

impl AnnouncementPolicy {
    /// Create a policy with no announcement history
    #[must_use]
    pub fn new(config: &AnnounceConfig) -> Self {
        Self {
            distance_threshold_m: config.distance_threshold_m,
            repeat_after_ms: duration_ms(config.repeat_after),
            memory: None,
        }
    }

    /// Decide whether to announce, recording the announcement if so
    pub fn should_announce(&mut self, instruction: &str, distance_m: f64, now_ms: i64) -> bool {
        let announce = self.memory.as_ref().is_none_or(|previous| {
            instruction != previous.instruction
                || (distance_m - previous.distance_m).abs() >= self.distance_threshold_m
                || now_ms.saturating_sub(previous.announced_at_ms) >= self.repeat_after_ms
        });

        if announce {
            self.memory = Some(AnnouncementMemory {
                instruction: instruction.to_string(),
                distance_m,
                announced_at_ms: now_ms,
            });
        }

        announce
    }

    /// Evaluate a step; returns the text to speak when it should be announced
    pub fn evaluate(&mut self, step: &Step, now_ms: i64) -> Option<String> {
        let instruction = step.instructions()?;
        let distance_m = parse_distance(step.distance_text());

        if self.should_announce(instruction, distance_m, now_ms) {
            step.spoken_text()
        } else {
            None
        }
    }

    /// Last recorded announcement, if any
    #[must_use]
    pub const fn memory(&self) -> Option<&AnnouncementMemory> {
        self.memory.as_ref()
    }

    /// Forget history so the next step is announced unconditionally
    pub fn reset(&mut self) {
        self.memory = None;
    }
}

fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// Parse a localized distance such as "250 m" or "2,5 km" into meters
///
/// Unknown units and malformed input yield `0.0`.
#[must_use]
pub fn parse_distance(text: &str) -> f64 {
    let mut parts = text.split_whitespace();
    let value = parts
        .next()
        .and_then(|v| v.replace(',', ".").parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0);

    match parts.next() {
        Some("m") => value,
        Some("km") => value * 1000.0,
        _ => 0.0,
    }
}
