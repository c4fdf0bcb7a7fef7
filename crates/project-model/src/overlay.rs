//! Overlay descriptors and their resolved placements.
//!
//! An [`OverlaySpec`] says *what* an element is and *how* it anchors to
//! the canvas. The layout engine turns it into a [`PlacedElement`] with an
//! absolute pixel rectangle and z-order.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::geometry::{PixelRect, Size};

/// Margin between the logo and its corner of the canvas.
pub const LOGO_MARGIN_PX: u32 = 50;
/// Box the logo is scaled to fit, independent of canvas content.
pub const LOGO_MAX_SIZE: Size = Size::new(300, 50);
/// Distance between the username's bottom edge and the canvas bottom.
pub const USERNAME_BOTTOM_OFFSET_PX: u32 = 50;
/// Vertical gap between the title and the username below it.
pub const TITLE_GAP_PX: u32 = 20;
/// Distance between the part-index label and the canvas top.
pub const PART_TOP_OFFSET_PX: u32 = 120;
/// Box-blur radius for the blurred-video background.
pub const BACKGROUND_BLUR_RADIUS: u32 = 20;

pub const DEFAULT_USERNAME_SIZE: u32 = 30;
pub const DEFAULT_TITLE_SIZE: u32 = 70;
pub const DEFAULT_PART_SIZE: u32 = 60;

/// The role an element plays in the composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayKind {
    Background,
    Foreground,
    Logo,
    Title,
    PartIndex,
    Username,
}

impl OverlayKind {
    /// Stacking order; higher draws on top.
    pub fn z_order(self) -> u32 {
        match self {
            OverlayKind::Background => 0,
            OverlayKind::Foreground => 1,
            OverlayKind::Logo => 2,
            OverlayKind::Title => 3,
            OverlayKind::PartIndex => 4,
            OverlayKind::Username => 5,
        }
    }

    /// Configuration field this element is built from, used in errors.
    pub fn field_name(self) -> &'static str {
        match self {
            OverlayKind::Background => "background_image",
            OverlayKind::Foreground => "input_video",
            OverlayKind::Logo => "logo_image",
            OverlayKind::Title => "video_title",
            OverlayKind::PartIndex => "part",
            OverlayKind::Username => "username",
        }
    }

    pub fn is_text(self) -> bool {
        matches!(
            self,
            OverlayKind::Title | OverlayKind::PartIndex | OverlayKind::Username
        )
    }
}

/// Where an element's pixels come from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlaySource {
    /// A still image file.
    Image(PathBuf),
    /// A text string rendered with the element's [`TextStyle`].
    Text(String),
    /// The segment's own sub-clip.
    SourceVideo,
    /// A blurred, canvas-covering copy of the segment's sub-clip.
    BlurredSourceVideo { radius: u32 },
}

/// Font, color and size of a text element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextStyle {
    /// Font file (TrueType/OpenType).
    pub font: PathBuf,
    pub color: Color,
    /// Pixel height of the em box.
    pub size: u32,
}

/// Canvas corner for corner-anchored elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Corner {
    #[default]
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// How the foreground video is scaled onto the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ForegroundFit {
    /// Scale to the canvas width. Wider sources are letterboxed top and
    /// bottom; narrower sources are center-cropped top and bottom.
    #[default]
    FitWidth,
    /// Scale to fit entirely inside the canvas (fit width when wider than
    /// 9:16, fit height otherwise).
    Contain,
}

/// How an element is positioned on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    /// Cover the entire canvas.
    Fill,
    /// Centered, scaled per the fit policy.
    Center { fit: ForegroundFit },
    /// Fixed corner with a fixed margin.
    Corner { corner: Corner, margin: u32 },
    /// Horizontally centered, top edge `offset` px below the canvas top.
    TopCenter { offset: u32 },
    /// Horizontally centered, bottom edge `offset` px above the canvas bottom.
    BottomCenter { offset: u32 },
    /// Horizontally centered directly above another element. Falls back to
    /// `BottomCenter { offset: fallback_offset }` when that element is absent.
    Above {
        kind: OverlayKind,
        gap: u32,
        fallback_offset: u32,
    },
}

/// When an element is visible within its segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementTiming {
    /// Offset from the segment start, in seconds.
    pub start: f64,
    /// Custom visible duration; `None` means until the segment ends.
    pub duration: Option<f64>,
}

impl ElementTiming {
    /// Visible for the whole segment.
    pub const FULL: ElementTiming = ElementTiming {
        start: 0.0,
        duration: None,
    };

    /// Clip to a segment of `segment_secs`, returning the visible
    /// `(start, end)` offsets or `None` if nothing remains visible.
    pub fn clip(&self, segment_secs: f64) -> Option<(f64, f64)> {
        let start = self.start.max(0.0);
        if start >= segment_secs {
            return None;
        }
        let end = match self.duration {
            Some(d) => (start + d.max(0.0)).min(segment_secs),
            None => segment_secs,
        };
        if end <= start {
            return None;
        }
        Some((start, end))
    }
}

impl Default for ElementTiming {
    fn default() -> Self {
        Self::FULL
    }
}

/// Description of one visual element, built once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlaySpec {
    pub kind: OverlayKind,
    pub source: OverlaySource,
    /// Required for text sources.
    pub style: Option<TextStyle>,
    pub anchor: Anchor,
    /// Images are scaled to fit this box.
    pub max_size: Option<Size>,
    pub timing: ElementTiming,
}

impl OverlaySpec {
    /// Static background image stretched over the canvas.
    pub fn background_image(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: OverlayKind::Background,
            source: OverlaySource::Image(path.into()),
            style: None,
            anchor: Anchor::Fill,
            max_size: None,
            timing: ElementTiming::FULL,
        }
    }

    /// Background derived from the segment's own video, blurred.
    pub fn blurred_background(radius: u32) -> Self {
        Self {
            kind: OverlayKind::Background,
            source: OverlaySource::BlurredSourceVideo { radius },
            style: None,
            anchor: Anchor::Fill,
            max_size: None,
            timing: ElementTiming::FULL,
        }
    }

    /// The segment's video, centered.
    pub fn foreground(fit: ForegroundFit) -> Self {
        Self {
            kind: OverlayKind::Foreground,
            source: OverlaySource::SourceVideo,
            style: None,
            anchor: Anchor::Center { fit },
            max_size: None,
            timing: ElementTiming::FULL,
        }
    }

    /// Logo image in a fixed corner.
    pub fn logo(path: impl Into<PathBuf>, corner: Corner) -> Self {
        Self {
            kind: OverlayKind::Logo,
            source: OverlaySource::Image(path.into()),
            style: None,
            anchor: Anchor::Corner {
                corner,
                margin: LOGO_MARGIN_PX,
            },
            max_size: Some(LOGO_MAX_SIZE),
            timing: ElementTiming::FULL,
        }
    }

    /// Username near the bottom of the canvas.
    pub fn username(text: impl Into<String>, style: TextStyle) -> Self {
        Self::text(
            OverlayKind::Username,
            text,
            style,
            Anchor::BottomCenter {
                offset: USERNAME_BOTTOM_OFFSET_PX,
            },
        )
    }

    /// Title stacked above the username.
    pub fn title(text: impl Into<String>, style: TextStyle) -> Self {
        Self::text(
            OverlayKind::Title,
            text,
            style,
            Anchor::Above {
                kind: OverlayKind::Username,
                gap: TITLE_GAP_PX,
                fallback_offset: USERNAME_BOTTOM_OFFSET_PX,
            },
        )
    }

    /// Part-index label at the top of the canvas.
    pub fn part_index(text: impl Into<String>, style: TextStyle) -> Self {
        Self::text(
            OverlayKind::PartIndex,
            text,
            style,
            Anchor::TopCenter {
                offset: PART_TOP_OFFSET_PX,
            },
        )
    }

    fn text(kind: OverlayKind, text: impl Into<String>, style: TextStyle, anchor: Anchor) -> Self {
        Self {
            kind,
            source: OverlaySource::Text(text.into()),
            style: Some(style),
            anchor,
            max_size: None,
            timing: ElementTiming::FULL,
        }
    }

    /// Restrict visibility to `duration` seconds from the segment start.
    pub fn with_duration(mut self, duration: f64) -> Self {
        self.timing.duration = Some(duration);
        self
    }
}

/// An overlay resolved to absolute pixels and stacking order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedElement {
    pub kind: OverlayKind,
    pub source: OverlaySource,
    pub style: Option<TextStyle>,
    pub rect: PixelRect,
    pub z: u32,
    pub timing: ElementTiming,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_z_order_stacks_text_on_top() {
        let mut kinds = [
            OverlayKind::Username,
            OverlayKind::Background,
            OverlayKind::Title,
            OverlayKind::Logo,
            OverlayKind::Foreground,
            OverlayKind::PartIndex,
        ];
        kinds.sort_by_key(|k| k.z_order());
        assert_eq!(kinds[0], OverlayKind::Background);
        assert_eq!(kinds[1], OverlayKind::Foreground);
        assert_eq!(kinds[2], OverlayKind::Logo);
        assert!(kinds[3..].iter().all(|k| k.is_text()));
    }

    #[test]
    fn test_timing_full_covers_segment() {
        assert_eq!(ElementTiming::FULL.clip(12.5), Some((0.0, 12.5)));
    }

    #[test]
    fn test_timing_custom_duration_is_clipped_to_segment() {
        let timing = ElementTiming {
            start: 1.0,
            duration: Some(60.0),
        };
        assert_eq!(timing.clip(5.0), Some((1.0, 5.0)));

        let short = ElementTiming {
            start: 0.0,
            duration: Some(3.0),
        };
        assert_eq!(short.clip(30.0), Some((0.0, 3.0)));
    }

    #[test]
    fn test_timing_starting_after_segment_is_dropped() {
        let timing = ElementTiming {
            start: 10.0,
            duration: None,
        };
        assert_eq!(timing.clip(5.0), None);
        assert_eq!(timing.clip(10.0), None);
    }

    #[test]
    fn test_title_stacks_above_username() {
        let style = TextStyle {
            font: PathBuf::from("font.ttf"),
            color: Color::WHITE,
            size: DEFAULT_TITLE_SIZE,
        };
        let title = OverlaySpec::title("Hello", style);
        assert!(matches!(
            title.anchor,
            Anchor::Above {
                kind: OverlayKind::Username,
                ..
            }
        ));
        assert_eq!(title.source, OverlaySource::Text("Hello".to_string()));
    }
}
