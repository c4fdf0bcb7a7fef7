//! ReelSplit Processing Core
//!
//! Decides what each output part contains:
//! - **Segmentation:** Partition the source duration into part windows
//! - **Layout:** Resolve overlay descriptors to absolute canvas pixels
//!
//! This crate is pure computation with no I/O and no media dependencies.
//! Text and image sizes are supplied through [`layout::ElementMetrics`].

pub mod layout;
pub mod segmentation;

pub use layout::{ElementMetrics, LayoutEngine};
pub use segmentation::{plan_segments, SegmentPlan};
