//! Pixel geometry for the output canvas.
//!
//! All layout coordinates are absolute output pixels with `(0, 0)` at the top-left of the canvas. Rectangles may
//! extend past the canvas edges (a cropped foreground has a negative `y`).

use serde::{Deserialize, Serialize};

/// Width/height pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    pub const fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    /// Width divided by height (0 for degenerate sizes).
    pub fn aspect(&self) -> f64 {
        if self.h == 0 {
            return 0.0;
        }
        self.w as f64 / self.h as f64
    }

    /// Whether either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    /// Scale uniformly so the result fits inside `bounds`, preserving
    /// aspect ratio. Scales up as well as down.
    pub fn fit_within(&self, bounds: Size) -> Size {
        if self.is_empty() || bounds.is_empty() {
            return Size::new(0, 0);
        }
        let scale = (bounds.w as f64 / self.w as f64).min(bounds.h as f64 / self.h as f64);
        Size::new(
            ((self.w as f64 * scale).round() as u32).clamp(1, bounds.w),
            ((self.h as f64 * scale).round() as u32).clamp(1, bounds.h),
        )
    }

    /// Scale uniformly to the given width.
    pub fn scaled_to_width(&self, width: u32) -> Size {
        if self.is_empty() {
            return Size::new(width, 0);
        }
        let h = (self.h as f64 * width as f64 / self.w as f64).round() as u32;
        Size::new(width, h)
    }

    /// Scale uniformly to the given height.
    pub fn scaled_to_height(&self, height: u32) -> Size {
        if self.is_empty() {
            return Size::new(0, height);
        }
        let w = (self.w as f64 * height as f64 / self.h as f64).round() as u32;
        Size::new(w, height)
    }

    /// Round both dimensions down to even values (minimum 2).
    ///
    /// 4:2:0 chroma subsampling rejects odd frame dimensions.
    pub fn even(&self) -> Size {
        Size::new((self.w & !1).max(2), (self.h & !1).max(2))
    }
}

/// An absolute pixel rectangle on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width.
    pub w: u32,
    /// Height.
    pub h: u32,
}

impl PixelRect {
    pub const fn new(x: i32, y: i32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// Rectangle of `size` placed at the origin.
    pub fn at_origin(size: Size) -> Self {
        Self::new(0, 0, size.w, size.h)
    }

    pub fn size(&self) -> Size {
        Size::new(self.w, self.h)
    }

    /// Right edge (exclusive).
    pub fn right(&self) -> i32 {
        self.x + self.w as i32
    }

    /// Bottom edge (exclusive).
    pub fn bottom(&self) -> i32 {
        self.y + self.h as i32
    }
}

/// The fixed output frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    /// 1080×1920 vertical output used for every segment.
    pub const REELS: Canvas = Canvas {
        width: 1080,
        height: 1920,
    };

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn aspect(&self) -> f64 {
        self.size().aspect()
    }

    /// Rectangle covering the whole canvas.
    pub fn full_rect(&self) -> PixelRect {
        PixelRect::at_origin(self.size())
    }

    /// Left edge that horizontally centers an element of width `w`.
    pub fn centered_x(&self, w: u32) -> i32 {
        (self.width as i32 - w as i32) / 2
    }

    /// Top edge that vertically centers an element of height `h`.
    pub fn centered_y(&self, h: u32) -> i32 {
        (self.height as i32 - h as i32) / 2
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::REELS
    }
}
