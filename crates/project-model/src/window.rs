//! Source time windows assigned to output segments.

use serde::{Deserialize, Serialize};

/// A `[start, end)` interval of source time, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Length of the window in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// One planned output segment: its window plus its position in the run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlannedSegment {
    /// 1-based position, matching natural reading order ("Part 1").
    pub ordinal: usize,
    /// Total number of segments in the run.
    pub total: usize,
    pub window: TimeWindow,
}

impl PlannedSegment {
    pub fn duration(&self) -> f64 {
        self.window.duration()
    }

    /// Part-index label, e.g. `Part 3/12`.
    pub fn label(&self) -> String {
        format!("Part {}/{}", self.ordinal, self.total)
    }
}

/// What to do with a trailing remainder shorter than a full part.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "mode", content = "min_secs")]
pub enum TrailingPolicy {
    /// Always keep the remainder as its own segment, however short.
    #[default]
    Keep,
    /// Fold a remainder strictly shorter than the threshold (seconds)
    /// into the previous segment.
    MergeBelow(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_duration() {
        let w = TimeWindow::new(30.0, 60.0);
        assert!((w.duration() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_segment_label() {
        let seg = PlannedSegment {
            ordinal: 3,
            total: 12,
            window: TimeWindow::new(60.0, 90.0),
        };
        assert_eq!(seg.label(), "Part 3/12");
    }

    #[test]
    fn test_trailing_policy_serde() {
        let json = serde_json::to_string(&TrailingPolicy::MergeBelow(1.5)).unwrap();
        assert_eq!(json, r#"{"mode":"merge_below","min_secs":1.5}"#);
        let keep: TrailingPolicy = serde_json::from_str(r#"{"mode":"keep"}"#).unwrap();
        assert_eq!(keep, TrailingPolicy::Keep);
    }
}
