//! Text rasterisation.
//!
//! [`GlyphRenderer`] turns a string plus a [`TextStyle`] into an RGBA
//! bitmap. The production implementation uses `rusttype` and keeps each
//! parsed font for the lifetime of the renderer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use image::{Rgba, RgbaImage};
use rusttype::{point, Font, PositionedGlyph, Scale};

use reelsplit_common::error::{ReelsError, ReelsResult};
use reelsplit_project_model::geometry::Size;
use reelsplit_project_model::overlay::TextStyle;

/// Capability to measure and rasterise styled text.
pub trait GlyphRenderer: Send + Sync {
    /// Bitmap size `render` would produce.
    fn measure(&self, text: &str, style: &TextStyle) -> ReelsResult<Size>;

    /// Rasterise `text` onto a transparent bitmap.
    fn render(&self, text: &str, style: &TextStyle) -> ReelsResult<RgbaImage>;

    /// Renderer name for logs.
    fn name(&self) -> &str;
}

/// `rusttype`-backed glyph renderer.
#[derive(Default)]
pub struct RusttypeGlyphs {
    fonts: Mutex<HashMap<PathBuf, Arc<Font<'static>>>>,
}

impl RusttypeGlyphs {
    pub fn new() -> Self {
        Self::default()
    }

    fn font(&self, path: &Path) -> ReelsResult<Arc<Font<'static>>> {
        let mut fonts = self
            .fonts
            .lock()
            .map_err(|_| ReelsError::render("font cache lock poisoned"))?;
        if let Some(font) = fonts.get(path) {
            return Ok(Arc::clone(font));
        }

        let bytes = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ReelsError::asset_not_found("font", path)
            } else {
                ReelsError::render(format!("Failed to read font {}: {e}", path.display()))
            }
        })?;
        let font = Font::try_from_vec(bytes).ok_or_else(|| {
            ReelsError::render(format!("Failed to parse font {}", path.display()))
        })?;

        tracing::debug!(font = %path.display(), "Loaded font");
        let font = Arc::new(font);
        fonts.insert(path.to_path_buf(), Arc::clone(&font));
        Ok(font)
    }

    fn layout(&self, text: &str, style: &TextStyle) -> ReelsResult<TextLayout> {
        if text.is_empty() {
            return Err(ReelsError::render("Cannot render empty text"));
        }
        let font = self.font(&style.font)?;
        let scale = Scale::uniform(style.size.max(1) as f32);
        let v_metrics = font.v_metrics(scale);
        let glyphs: Vec<PositionedGlyph<'static>> = font
            .layout(text, scale, point(0.0, v_metrics.ascent))
            .collect();

        let advance = glyphs
            .last()
            .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
            .unwrap_or(0.0);
        let ink_right = glyphs
            .iter()
            .filter_map(|g| g.pixel_bounding_box())
            .map(|bb| bb.max.x)
            .max()
            .unwrap_or(0);
        let width = (advance.ceil() as i32).max(ink_right).max(1) as u32;
        let height = ((v_metrics.ascent - v_metrics.descent).ceil() as u32).max(1);

        Ok(TextLayout {
            glyphs,
            size: Size::new(width, height),
        })
    }
}

struct TextLayout {
    glyphs: Vec<PositionedGlyph<'static>>,
    size: Size,
}

impl GlyphRenderer for RusttypeGlyphs {
    fn measure(&self, text: &str, style: &TextStyle) -> ReelsResult<Size> {
        Ok(self.layout(text, style)?.size)
    }

    fn render(&self, text: &str, style: &TextStyle) -> ReelsResult<RgbaImage> {
        let layout = self.layout(text, style)?;
        let [r, g, b, a] = style.color.to_rgba_array();
        let mut bitmap = RgbaImage::new(layout.size.w, layout.size.h);

        for glyph in &layout.glyphs {
            let Some(bb) = glyph.pixel_bounding_box() else {
                continue;
            };
            glyph.draw(|gx, gy, coverage| {
                let x = gx as i32 + bb.min.x;
                let y = gy as i32 + bb.min.y;
                if x < 0 || y < 0 || x >= layout.size.w as i32 || y >= layout.size.h as i32 {
                    return;
                }
                let alpha = (coverage * a as f32).round().clamp(0.0, 255.0) as u8;
                let pixel = bitmap.get_pixel_mut(x as u32, y as u32);
                // Overlapping glyph edges keep the stronger coverage.
                if alpha > pixel[3] {
                    *pixel = Rgba([r, g, b, alpha]);
                }
            });
        }

        Ok(bitmap)
    }

    fn name(&self) -> &str {
        "rusttype"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelsplit_project_model::color::Color;

    fn style(font: &Path) -> TextStyle {
        TextStyle {
            font: font.to_path_buf(),
            color: Color::WHITE,
            size: 40,
        }
    }

    #[test]
    fn test_missing_font_is_asset_not_found() {
        let glyphs = RusttypeGlyphs::new();
        let err = glyphs
            .measure("hello", &style(Path::new("/no/such/font.ttf")))
            .unwrap_err();
        assert!(matches!(err, ReelsError::AssetNotFound { .. }));
    }

    #[test]
    fn test_garbage_font_is_render_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ttf");
        std::fs::write(&path, b"definitely not a font").unwrap();

        let glyphs = RusttypeGlyphs::new();
        let err = glyphs.render("hello", &style(&path)).unwrap_err();
        assert!(matches!(err, ReelsError::Render { .. }));
    }

    #[test]
    fn test_empty_text_is_render_error() {
        let glyphs = RusttypeGlyphs::new();
        let err = glyphs
            .measure("", &style(Path::new("/no/such/font.ttf")))
            .unwrap_err();
        assert!(matches!(err, ReelsError::Render { .. }));
    }
}
