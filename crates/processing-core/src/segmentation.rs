//! Segmentation planning.
//!
//! Partitions the source duration into contiguous, ordered windows of
//! `part_duration` seconds. The last window ends exactly at `duration`
//! and may be shorter than the others.

use reelsplit_common::error::{ReelsError, ReelsResult};
use reelsplit_project_model::window::{PlannedSegment, TimeWindow, TrailingPolicy};

/// Ratios this close to an integer count as exact, so float noise never
/// yields a zero-length trailing window.
const RATIO_EPSILON: f64 = 1e-9;

/// A validated partition of `[0, duration)`.
///
/// Cheap to copy; [`SegmentPlan::windows`] can be called any number of
/// times and always yields the same sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentPlan {
    duration: f64,
    part_duration: f64,
    count: usize,
}

impl SegmentPlan {
    /// Plan windows for a source of `duration` seconds.
    pub fn new(duration: f64, part_duration: f64, policy: TrailingPolicy) -> ReelsResult<Self> {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(ReelsError::invalid_duration(format!(
                "source duration must be positive, got {duration}"
            )));
        }
        if !part_duration.is_finite() || part_duration <= 0.0 {
            return Err(ReelsError::invalid_duration(format!(
                "part_duration must be positive, got {part_duration}"
            )));
        }

        let ratio = duration / part_duration;
        let whole = ratio.floor();
        let mut count = if ratio - whole < RATIO_EPSILON {
            whole as usize
        } else {
            whole as usize + 1
        }
        .max(1);

        if let TrailingPolicy::MergeBelow(min) = policy {
            if !min.is_finite() || min < 0.0 {
                return Err(ReelsError::invalid_duration(format!(
                    "trailing merge threshold must be non-negative, got {min}"
                )));
            }
            let remainder = duration - (count - 1) as f64 * part_duration;
            if count > 1 && remainder < min {
                tracing::debug!(remainder, min, "Merging short trailing window");
                count -= 1;
            }
        }

        Ok(Self {
            duration,
            part_duration,
            count,
        })
    }

    /// Number of windows.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Always false; a valid plan has at least one window.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The window at 0-based `index`, if in range.
    pub fn get(&self, index: usize) -> Option<PlannedSegment> {
        if index >= self.count {
            return None;
        }
        let start = index as f64 * self.part_duration;
        let end = if index + 1 == self.count {
            self.duration
        } else {
            (index + 1) as f64 * self.part_duration
        };
        Some(PlannedSegment {
            ordinal: index + 1,
            total: self.count,
            window: TimeWindow::new(start, end),
        })
    }

    /// Iterate the planned segments in order.
    pub fn windows(&self) -> impl Iterator<Item = PlannedSegment> + '_ {
        (0..self.count).filter_map(move |i| self.get(i))
    }

    /// Collect every planned segment.
    pub fn segments(&self) -> Vec<PlannedSegment> {
        self.windows().collect()
    }
}

/// Convenience wrapper around [`SegmentPlan::new`].
pub fn plan_segments(
    duration: f64,
    part_duration: f64,
    policy: TrailingPolicy,
) -> ReelsResult<SegmentPlan> {
    let plan = SegmentPlan::new(duration, part_duration, policy)?;
    tracing::debug!(
        duration,
        part_duration,
        segments = plan.len(),
        "Planned segments"
    );
    Ok(plan)
}
