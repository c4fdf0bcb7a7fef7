//! ReelSplit Render Engine
//!
//! Turns a planned run into part files: each window of the source video
//! is composited with its background, branding and text overlays and
//! encoded to its own vertical MP4.
//!
//! # Pipeline Architecture
//!
//! ```text
//! input.mp4 ── probe ── plan windows ──┐
//!                                      │  (per segment, bounded pool)
//! config ── layout (static) ───────────┼── extract sub-clip
//!                                      ├── part-index overlay
//! fonts/images ── overlay cache ───────┼── stack layers by z
//!                                      ▼
//!                              ffmpeg encode (H.264/AAC)
//!                                      │
//!                                      ▼
//!                          run_dir/part_{n}.mp4
//! ```

pub mod compositor;
pub mod export;
pub mod glyph;
pub mod media;
pub mod overlay;
pub mod pipeline;

pub use export::{CancelFlag, ExportSummary, SegmentProgress, SegmentStage};
pub use glyph::{GlyphRenderer, RusttypeGlyphs};
pub use media::{FfmpegMedia, MediaIo, SourceVideo};
pub use pipeline::{generate_parts, PipelineOptions, RunReport};
