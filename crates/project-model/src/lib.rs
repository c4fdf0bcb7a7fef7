//! ReelSplit Project Model
//!
//! Defines the core data contracts for a ReelSplit run:
//! - **Windows:** Source time intervals assigned to output parts
//! - **Overlays:** What each visual element is and how it anchors
//! - **Geometry:** Absolute pixel sizes and rectangles on the 9:16 canvas
//! - **Run:** Validated configuration, run identity, and output naming
//!
//! Layout coordinates are absolute output pixels; time is seconds of
//! source video.

pub mod color;
pub mod geometry;
pub mod overlay;
pub mod run;
pub mod window;

pub use color::*;
pub use geometry::*;
pub use overlay::*;
pub use run::*;
pub use window::*;
