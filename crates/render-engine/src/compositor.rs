//! Segment compositor: stacks background, video and overlays for one part.
//!
//! A [`SegmentComposition`] is the complete description of one output
//! file. Its duration is exactly the window length, and every layer is
//! clipped to `[0, duration]`.

use std::path::PathBuf;
use std::sync::Arc;

use reelsplit_common::error::ReelsResult;
use reelsplit_processing_core::layout::LayoutEngine;
use reelsplit_project_model::geometry::PixelRect;
use reelsplit_project_model::overlay::{OverlayKind, OverlaySpec, PlacedElement, TextStyle};
use reelsplit_project_model::window::PlannedSegment;

use crate::media::{MediaIo, SourceVideo, SubClip};
use crate::overlay::OverlayRenderer;

/// Pixel source of one layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerContent {
    /// Pre-rendered RGBA image at its placed size.
    Still { png: PathBuf },
    /// The sub-clip scaled to the layer rectangle.
    Video,
    /// The sub-clip cover-scaled to the layer rectangle and blurred.
    BlurredVideo { radius: u32 },
}

/// One timed, positioned layer of a composition.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub kind: OverlayKind,
    pub content: LayerContent,
    pub rect: PixelRect,
    pub z: u32,
    /// Visible from this offset (seconds from segment start).
    pub start: f64,
    /// Visible until this offset; never past the segment duration.
    pub end: f64,
}

/// Everything needed to render one output part.
#[derive(Debug, Clone)]
pub struct SegmentComposition {
    pub segment: PlannedSegment,
    pub clip: SubClip,
    /// Ascending z-order.
    pub layers: Vec<Layer>,
}

impl SegmentComposition {
    /// Output duration in seconds; equal to the window length.
    pub fn duration(&self) -> f64 {
        self.segment.window.duration()
    }

    /// Paths of every pre-rendered image layer, bottom to top.
    pub fn still_images(&self) -> impl Iterator<Item = &PathBuf> {
        self.layers.iter().filter_map(|l| match &l.content {
            LayerContent::Still { png } => Some(png),
            _ => None,
        })
    }
}

/// Clip placed elements to a segment and turn them into layers.
///
/// Elements whose timing starts at or after the segment end are dropped.
pub fn build_layers(
    placed: &[PlacedElement],
    segment_secs: f64,
    renderer: &OverlayRenderer,
) -> ReelsResult<Vec<Layer>> {
    let mut layers = Vec::with_capacity(placed.len());
    for element in placed {
        let Some((start, end)) = element.timing.clip(segment_secs) else {
            tracing::debug!(kind = ?element.kind, segment_secs, "Dropping element outside segment");
            continue;
        };
        layers.push(Layer {
            kind: element.kind,
            content: renderer.render_layer(element)?,
            rect: element.rect,
            z: element.z,
            start,
            end,
        });
    }
    layers.sort_by_key(|l| l.z);
    Ok(layers)
}

/// Builds per-segment compositions from the run's static layout.
pub struct SegmentCompositor {
    layout: LayoutEngine,
    static_elements: Vec<PlacedElement>,
    part_style: TextStyle,
    renderer: Arc<OverlayRenderer>,
}

impl SegmentCompositor {
    pub fn new(
        layout: LayoutEngine,
        static_elements: Vec<PlacedElement>,
        part_style: TextStyle,
        renderer: Arc<OverlayRenderer>,
    ) -> Self {
        Self {
            layout,
            static_elements,
            part_style,
            renderer,
        }
    }

    /// Elements shared by every segment.
    pub fn static_elements(&self) -> &[PlacedElement] {
        &self.static_elements
    }

    /// Extract the sub-clip and stack every layer for `segment`.
    pub fn compose(
        &self,
        media: &dyn MediaIo,
        source: &Arc<SourceVideo>,
        segment: PlannedSegment,
    ) -> ReelsResult<SegmentComposition> {
        let clip = media.extract(source, segment.window)?;

        let part = OverlaySpec::part_index(segment.label(), self.part_style.clone());
        let placed = self
            .layout
            .place_onto(&self.static_elements, &[part], self.renderer.as_ref())?;
        let layers = build_layers(&placed, segment.duration(), &self.renderer)?;

        tracing::debug!(
            ordinal = segment.ordinal,
            start = segment.window.start,
            end = segment.window.end,
            layers = layers.len(),
            "Composed segment"
        );

        Ok(SegmentComposition {
            segment,
            clip,
            layers,
        })
    }
}
