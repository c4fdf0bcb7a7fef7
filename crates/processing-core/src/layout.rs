//! Layout engine.
//!
//! Resolves [`OverlaySpec`]s to absolute pixel rectangles on the canvas.
//! Intrinsic sizes of text and images come from an [`ElementMetrics`]
//! implementation so that placement stays pure and deterministic.

use std::path::Path;

use reelsplit_common::error::{ReelsError, ReelsResult};
use reelsplit_project_model::geometry::{Canvas, PixelRect, Size};
use reelsplit_project_model::overlay::{
    Anchor, Corner, ForegroundFit, OverlayKind, OverlaySource, OverlaySpec, PlacedElement,
    TextStyle,
};

/// Source of intrinsic element sizes.
pub trait ElementMetrics {
    /// Bounding box of `text` rendered with `style`.
    fn text_size(&self, text: &str, style: &TextStyle) -> ReelsResult<Size>;

    /// Native pixel size of the image at `path`.
    fn image_size(&self, path: &Path) -> ReelsResult<Size>;
}

/// Places overlays on a fixed canvas for one source video.
#[derive(Debug, Clone, Copy)]
pub struct LayoutEngine {
    canvas: Canvas,
    source: Size,
}

impl LayoutEngine {
    /// `source` is the native frame size of the input video.
    pub fn new(canvas: Canvas, source: Size) -> Self {
        Self { canvas, source }
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Place every spec, returning elements in ascending z-order.
    pub fn place(
        &self,
        specs: &[OverlaySpec],
        metrics: &dyn ElementMetrics,
    ) -> ReelsResult<Vec<PlacedElement>> {
        self.place_onto(&[], specs, metrics)
    }

    /// Place `specs` on top of already-placed elements.
    ///
    /// `Above` anchors may reference elements in either set. The result
    /// contains both sets, stably sorted by z-order.
    pub fn place_onto(
        &self,
        base: &[PlacedElement],
        specs: &[OverlaySpec],
        metrics: &dyn ElementMetrics,
    ) -> ReelsResult<Vec<PlacedElement>> {
        let mut placed: Vec<PlacedElement> = base.to_vec();

        // Stacked elements go last so their reference is already placed.
        let (stacked, direct): (Vec<&OverlaySpec>, Vec<&OverlaySpec>) = specs
            .iter()
            .partition(|s| matches!(s.anchor, Anchor::Above { .. }));

        for spec in direct.into_iter().chain(stacked) {
            let rect = self.resolve(spec, &placed, metrics)?;
            tracing::trace!(kind = ?spec.kind, x = rect.x, y = rect.y, w = rect.w, h = rect.h, "Placed element");
            placed.push(PlacedElement {
                kind: spec.kind,
                source: spec.source.clone(),
                style: spec.style.clone(),
                rect,
                z: spec.kind.z_order(),
                timing: spec.timing,
            });
        }

        placed.sort_by_key(|e| e.z);
        Ok(placed)
    }

    fn resolve(
        &self,
        spec: &OverlaySpec,
        placed: &[PlacedElement],
        metrics: &dyn ElementMetrics,
    ) -> ReelsResult<PixelRect> {
        let canvas = self.canvas;

        let rect = match spec.anchor {
            Anchor::Fill => canvas.full_rect(),
            Anchor::Center { fit } => {
                let size = self.foreground_size(fit)?;
                PixelRect::new(
                    canvas.centered_x(size.w),
                    canvas.centered_y(size.h),
                    size.w,
                    size.h,
                )
            }
            Anchor::Corner { corner, margin } => {
                let size = self.intrinsic_size(spec, metrics)?;
                let m = margin as i32;
                let (w, h) = (size.w as i32, size.h as i32);
                let (cw, ch) = (canvas.width as i32, canvas.height as i32);
                let (x, y) = match corner {
                    Corner::TopLeft => (m, m),
                    Corner::TopRight => (cw - w - m, m),
                    Corner::BottomLeft => (m, ch - h - m),
                    Corner::BottomRight => (cw - w - m, ch - h - m),
                };
                PixelRect::new(x, y, size.w, size.h)
            }
            Anchor::TopCenter { offset } => {
                let size = self.intrinsic_size(spec, metrics)?;
                PixelRect::new(canvas.centered_x(size.w), offset as i32, size.w, size.h)
            }
            Anchor::BottomCenter { offset } => {
                let size = self.intrinsic_size(spec, metrics)?;
                self.bottom_center(size, offset)
            }
            Anchor::Above {
                kind,
                gap,
                fallback_offset,
            } => {
                let size = self.intrinsic_size(spec, metrics)?;
                match placed.iter().find(|e| e.kind == kind) {
                    Some(below) => PixelRect::new(
                        canvas.centered_x(size.w),
                        below.rect.y - gap as i32 - size.h as i32,
                        size.w,
                        size.h,
                    ),
                    None => self.bottom_center(size, fallback_offset),
                }
            }
        };
        Ok(rect)
    }

    fn bottom_center(&self, size: Size, offset: u32) -> PixelRect {
        PixelRect::new(
            self.canvas.centered_x(size.w),
            self.canvas.height as i32 - offset as i32 - size.h as i32,
            size.w,
            size.h,
        )
    }

    /// Scaled size of the foreground video.
    ///
    /// Dimensions are rounded down to even values for 4:2:0 output.
    pub fn foreground_size(&self, fit: ForegroundFit) -> ReelsResult<Size> {
        if self.source.is_empty() {
            return Err(ReelsError::media(format!(
                "source video has no usable frame size ({}x{})",
                self.source.w, self.source.h
            )));
        }
        let canvas = self.canvas;
        let size = match fit {
            ForegroundFit::FitWidth => self.source.scaled_to_width(canvas.width),
            ForegroundFit::Contain => {
                if self.source.aspect() >= canvas.aspect() {
                    self.source.scaled_to_width(canvas.width)
                } else {
                    self.source.scaled_to_height(canvas.height)
                }
            }
        };
        Ok(size.even())
    }

    fn intrinsic_size(
        &self,
        spec: &OverlaySpec,
        metrics: &dyn ElementMetrics,
    ) -> ReelsResult<Size> {
        let natural = match &spec.source {
            OverlaySource::Text(text) => {
                let style = spec.style.as_ref().ok_or_else(|| {
                    ReelsError::config(format!(
                        "`{}` is a text element without a text style",
                        spec.kind.field_name()
                    ))
                })?;
                metrics.text_size(text, style)?
            }
            OverlaySource::Image(path) => metrics.image_size(path)?,
            OverlaySource::SourceVideo | OverlaySource::BlurredSourceVideo { .. } => {
                self.canvas.size()
            }
        };
        Ok(match spec.max_size {
            Some(bounds) => natural.fit_within(bounds),
            None => natural,
        })
    }
}

/// Elements of a given kind, in placement order.
pub fn elements_of(placed: &[PlacedElement], kind: OverlayKind) -> impl Iterator<Item = &PlacedElement> {
    placed.iter().filter(move |e| e.kind == kind)
}
