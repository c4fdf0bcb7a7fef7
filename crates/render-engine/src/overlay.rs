//! Overlay rendering and the per-run asset cache.
//!
//! Text and image elements are rasterised once into PNG files in the
//! run's scratch directory; video elements stay as instructions for the
//! media backend. Rendered assets are keyed by what determines their
//! pixels, so a username shared by every segment is drawn only once even
//! when segments render concurrently.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use image::imageops::FilterType;

use reelsplit_common::error::{ReelsError, ReelsResult};
use reelsplit_processing_core::layout::ElementMetrics;
use reelsplit_project_model::geometry::Size;
use reelsplit_project_model::overlay::{OverlaySource, PlacedElement, TextStyle};

use crate::compositor::LayerContent;
use crate::glyph::GlyphRenderer;

/// Text used to check that every configured font can be rasterised.
const PREFLIGHT_SAMPLE: &str = "Part 1/1 @Aa";

/// What determines a rendered asset's pixels.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AssetKey {
    Image { path: PathBuf, size: Size },
    Text { text: String, style: TextStyle },
}

/// A failed computation, kept in a form every waiting caller can receive.
#[derive(Debug, Clone)]
enum CachedFailure {
    AssetNotFound { field: String, path: PathBuf },
    Render(String),
}

impl From<ReelsError> for CachedFailure {
    fn from(err: ReelsError) -> Self {
        match err {
            ReelsError::AssetNotFound { field, path } => Self::AssetNotFound { field, path },
            ReelsError::Render { message } => Self::Render(message),
            other => Self::Render(other.to_string()),
        }
    }
}

impl From<CachedFailure> for ReelsError {
    fn from(failure: CachedFailure) -> Self {
        match failure {
            CachedFailure::AssetNotFound { field, path } => ReelsError::asset_not_found(field, path),
            CachedFailure::Render(message) => ReelsError::render(message),
        }
    }
}

type Slot = Arc<OnceLock<Result<PathBuf, CachedFailure>>>;

/// Keyed store with compute-once semantics.
///
/// Concurrent callers asking for the same key block on the single
/// in-flight computation and share its result, including failures.
#[derive(Default)]
pub struct AssetCache {
    slots: Mutex<HashMap<AssetKey, Slot>>,
    computed: AtomicUsize,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached asset for `key`, computing it with `compute` if
    /// no caller has done so yet.
    pub fn get_or_compute<F>(&self, key: AssetKey, compute: F) -> ReelsResult<PathBuf>
    where
        F: FnOnce() -> ReelsResult<PathBuf>,
    {
        let slot = {
            let mut slots = self
                .slots
                .lock()
                .map_err(|_| ReelsError::render("asset cache lock poisoned"))?;
            Arc::clone(slots.entry(key).or_default())
        };

        slot.get_or_init(|| {
            self.computed.fetch_add(1, Ordering::Relaxed);
            compute().map_err(CachedFailure::from)
        })
        .clone()
        .map_err(ReelsError::from)
    }

    /// Number of computations actually performed.
    pub fn computed(&self) -> usize {
        self.computed.load(Ordering::Relaxed)
    }

    /// Number of distinct keys requested.
    pub fn len(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Turns placed elements into layers.
pub struct OverlayRenderer {
    glyphs: Arc<dyn GlyphRenderer>,
    scratch_dir: PathBuf,
    cache: AssetCache,
    next_asset: AtomicUsize,
}

impl OverlayRenderer {
    /// Rendered PNGs are written into `scratch_dir`, which must exist.
    pub fn new(glyphs: Arc<dyn GlyphRenderer>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            glyphs,
            scratch_dir: scratch_dir.into(),
            cache: AssetCache::new(),
            next_asset: AtomicUsize::new(1),
        }
    }

    pub fn cache(&self) -> &AssetCache {
        &self.cache
    }

    /// Rasterise a sample with every style so that a missing or broken
    /// text renderer fails the run before any segment is scheduled.
    pub fn preflight(&self, styles: &[(&str, &TextStyle)]) -> ReelsResult<()> {
        for &(field, style) in styles {
            self.glyphs
                .render(PREFLIGHT_SAMPLE, style)
                .map_err(|e| match e {
                    ReelsError::AssetNotFound { path, .. } => ReelsError::asset_not_found(field, path),
                    other => ReelsError::render(format!(
                        "Glyph rendering unavailable for `{field}` ({}): {other}",
                        style.font.display()
                    )),
                })?;
        }
        tracing::debug!(renderer = self.glyphs.name(), "Glyph preflight passed");
        Ok(())
    }

    /// Layer content for a placed element.
    pub fn render_layer(&self, element: &PlacedElement) -> ReelsResult<LayerContent> {
        match &element.source {
            OverlaySource::SourceVideo => Ok(LayerContent::Video),
            OverlaySource::BlurredSourceVideo { radius } => {
                Ok(LayerContent::BlurredVideo { radius: *radius })
            }
            OverlaySource::Image(path) => {
                let size = element.rect.size();
                let png = self.cache.get_or_compute(
                    AssetKey::Image {
                        path: path.clone(),
                        size,
                    },
                    || self.render_image(element.kind.field_name(), path, size),
                )?;
                Ok(LayerContent::Still { png })
            }
            OverlaySource::Text(text) => {
                let style = element.style.as_ref().ok_or_else(|| {
                    ReelsError::render(format!(
                        "`{}` has no text style",
                        element.kind.field_name()
                    ))
                })?;
                let png = self.cache.get_or_compute(
                    AssetKey::Text {
                        text: text.clone(),
                        style: style.clone(),
                    },
                    || self.render_text(text, style),
                )?;
                Ok(LayerContent::Still { png })
            }
        }
    }

    fn render_image(&self, field: &str, path: &Path, size: Size) -> ReelsResult<PathBuf> {
        if !path.is_file() {
            return Err(ReelsError::asset_not_found(field, path));
        }
        if size.is_empty() {
            return Err(ReelsError::render(format!(
                "Image {} placed with empty size",
                path.display()
            )));
        }
        let decoded = image::open(path)
            .map_err(|e| ReelsError::render(format!("Failed to decode {}: {e}", path.display())))?;
        let scaled = image::imageops::resize(&decoded.to_rgba8(), size.w, size.h, FilterType::Lanczos3);

        let out = self.asset_path("image");
        scaled
            .save(&out)
            .map_err(|e| ReelsError::render(format!("Failed to write {}: {e}", out.display())))?;
        tracing::debug!(
            image = %path.display(),
            width = size.w,
            height = size.h,
            asset = %out.display(),
            "Rendered image overlay"
        );
        Ok(out)
    }

    fn render_text(&self, text: &str, style: &TextStyle) -> ReelsResult<PathBuf> {
        let bitmap = self.glyphs.render(text, style)?;
        let out = self.asset_path("text");
        bitmap
            .save(&out)
            .map_err(|e| ReelsError::render(format!("Failed to write {}: {e}", out.display())))?;
        tracing::debug!(text, asset = %out.display(), "Rendered text overlay");
        Ok(out)
    }

    fn asset_path(&self, prefix: &str) -> PathBuf {
        let n = self.next_asset.fetch_add(1, Ordering::Relaxed);
        self.scratch_dir.join(format!("{prefix}_{n:04}.png"))
    }
}

impl ElementMetrics for OverlayRenderer {
    fn text_size(&self, text: &str, style: &TextStyle) -> ReelsResult<Size> {
        self.glyphs.measure(text, style)
    }

    fn image_size(&self, path: &Path) -> ReelsResult<Size> {
        if !path.is_file() {
            return Err(ReelsError::asset_not_found("image", path));
        }
        let (w, h) = image::image_dimensions(path)
            .map_err(|e| ReelsError::render(format!("Failed to read {}: {e}", path.display())))?;
        Ok(Size::new(w, h))
    }
}
