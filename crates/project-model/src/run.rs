//! Run configuration, validation, and output naming.
//!
//! A run turns one input video into `part_1.mp4 .. part_n.mp4` inside a
//! freshly allocated run directory. [`RunConfig`] holds the raw values a
//! user supplied; [`RunConfig::validate`] checks every path and color up
//! front so that a bad configuration aborts before anything is written.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use reelsplit_common::config::RunDefaults;
use reelsplit_common::error::{ReelsError, ReelsResult};

use crate::color::Color;
use crate::geometry::Canvas;
use crate::overlay::{
    Corner, ForegroundFit, OverlaySpec, TextStyle, BACKGROUND_BLUR_RADIUS, DEFAULT_PART_SIZE,
    DEFAULT_TITLE_SIZE, DEFAULT_USERNAME_SIZE,
};
use crate::window::TrailingPolicy;

/// Font and color of one text field, as configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFieldConfig {
    pub font: PathBuf,
    pub color: String,
}

/// Everything a run consumes, constructed once and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub input_video: PathBuf,
    pub background_image: Option<PathBuf>,
    pub logo_image: Option<PathBuf>,
    pub username: String,
    pub video_title: String,
    pub part_duration_secs: f64,
    pub output_base: PathBuf,
    pub username_text: TextFieldConfig,
    pub title_text: TextFieldConfig,
    pub part_text: TextFieldConfig,

    /// Use the blurred-video background even when an image is configured.
    #[serde(default)]
    pub blur_background: bool,
    #[serde(default)]
    pub trailing: TrailingPolicy,
    #[serde(default)]
    pub foreground_fit: ForegroundFit,
    #[serde(default)]
    pub logo_corner: Corner,
    /// Segments rendered concurrently (1 = sequential).
    pub workers: usize,
    /// Kill an encoder that runs longer than this many seconds.
    #[serde(default)]
    pub encode_timeout_secs: Option<u64>,
}

impl RunConfig {
    /// A configuration for `input_video` using the given defaults.
    pub fn new(input_video: impl Into<PathBuf>, defaults: &RunDefaults) -> Self {
        Self {
            input_video: input_video.into(),
            background_image: None,
            logo_image: None,
            username: "@username".to_string(),
            video_title: "Video Title".to_string(),
            part_duration_secs: defaults.part_duration_secs,
            output_base: PathBuf::from("output"),
            username_text: TextFieldConfig {
                font: defaults.username_font.clone(),
                color: defaults.username_color.clone(),
            },
            title_text: TextFieldConfig {
                font: defaults.title_font.clone(),
                color: defaults.title_color.clone(),
            },
            part_text: TextFieldConfig {
                font: defaults.part_font.clone(),
                color: defaults.part_color.clone(),
            },
            blur_background: false,
            trailing: TrailingPolicy::Keep,
            foreground_fit: ForegroundFit::FitWidth,
            logo_corner: Corner::TopLeft,
            workers: defaults.workers,
            encode_timeout_secs: defaults.encode_timeout_secs,
        }
    }

    /// Check durations, paths and colors, resolving text styles.
    ///
    /// Errors name the offending configuration field.
    pub fn validate(&self) -> ReelsResult<ValidatedRun> {
        if !self.part_duration_secs.is_finite() || self.part_duration_secs <= 0.0 {
            return Err(ReelsError::invalid_duration(format!(
                "part_duration must be a positive number of seconds, got {}",
                self.part_duration_secs
            )));
        }
        if let TrailingPolicy::MergeBelow(min) = self.trailing {
            if !min.is_finite() || min < 0.0 {
                return Err(ReelsError::invalid_duration(format!(
                    "trailing merge threshold must be non-negative, got {min}"
                )));
            }
        }
        if self.workers == 0 {
            return Err(ReelsError::config("workers must be at least 1"));
        }

        require_file("input_video", &self.input_video)?;
        if let Some(path) = &self.background_image {
            require_file("background_image", path)?;
        }
        if let Some(path) = &self.logo_image {
            require_file("logo_image", path)?;
        }

        let username_style = resolve_style(
            "username_font",
            "username_color",
            &self.username_text,
            DEFAULT_USERNAME_SIZE,
        )?;
        let title_style = resolve_style(
            "title_font",
            "title_color",
            &self.title_text,
            DEFAULT_TITLE_SIZE,
        )?;
        let part_style =
            resolve_style("part_font", "part_color", &self.part_text, DEFAULT_PART_SIZE)?;

        Ok(ValidatedRun {
            config: self.clone(),
            canvas: Canvas::REELS,
            username_style,
            title_style,
            part_style,
        })
    }
}

fn require_file(field: &str, path: &Path) -> ReelsResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ReelsError::asset_not_found(field, path))
    }
}

fn resolve_style(
    font_field: &str,
    color_field: &str,
    text: &TextFieldConfig,
    size: u32,
) -> ReelsResult<TextStyle> {
    require_file(font_field, &text.font)?;
    let color = Color::parse(&text.color)
        .map_err(|e| ReelsError::unsupported_color(color_field, e.value))?;
    Ok(TextStyle {
        font: text.font.clone(),
        color,
        size,
    })
}

/// A configuration whose paths exist and whose colors parsed.
#[derive(Debug, Clone)]
pub struct ValidatedRun {
    pub config: RunConfig,
    pub canvas: Canvas,
    pub username_style: TextStyle,
    pub title_style: TextStyle,
    pub part_style: TextStyle,
}

impl ValidatedRun {
    /// Overlays shared by every segment, in the order they are laid out.
    ///
    /// The background falls back to a blurred copy of the video when no
    /// image is configured. Empty username/title strings produce no element.
    pub fn static_overlays(&self) -> Vec<OverlaySpec> {
        let config = &self.config;
        let mut specs = Vec::with_capacity(5);

        match (&config.background_image, config.blur_background) {
            (Some(path), false) => specs.push(OverlaySpec::background_image(path)),
            _ => specs.push(OverlaySpec::blurred_background(BACKGROUND_BLUR_RADIUS)),
        }
        specs.push(OverlaySpec::foreground(config.foreground_fit));

        if let Some(path) = &config.logo_image {
            specs.push(OverlaySpec::logo(path, config.logo_corner));
        }
        if !config.username.trim().is_empty() {
            specs.push(OverlaySpec::username(
                config.username.clone(),
                self.username_style.clone(),
            ));
        }
        if !config.video_title.trim().is_empty() {
            specs.push(OverlaySpec::title(
                config.video_title.clone(),
                self.title_style.clone(),
            ));
        }
        specs
    }

    /// Every distinct text style, for the glyph preflight.
    pub fn text_styles(&self) -> [(&'static str, &TextStyle); 3] {
        [
            ("username_font", &self.username_style),
            ("title_font", &self.title_style),
            ("part_font", &self.part_style),
        ]
    }
}

/// Identity of one run: the title it was made for plus a short random id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIdentity {
    pub title: String,
    /// First 8 hex characters of a UUID v4.
    pub run_id: String,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
}

impl RunIdentity {
    /// A fresh identity for `title`.
    pub fn new(title: impl Into<String>) -> Self {
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        Self::with_id(title, &uuid[..8])
    }

    /// An identity with a caller-chosen id (deterministic in tests).
    pub fn with_id(title: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            run_id: run_id.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Directory name: `{sanitized title}_{run_id}`.
    pub fn dir_name(&self) -> String {
        format!("{}_{}", sanitize_title(&self.title), self.run_id)
    }

    /// Run directory under `output_base` (not created).
    pub fn run_dir(&self, output_base: &Path) -> PathBuf {
        output_base.join(self.dir_name())
    }

    /// Create the run directory under `output_base`.
    pub fn allocate(&self, output_base: &Path) -> ReelsResult<PathBuf> {
        let dir = self.run_dir(output_base);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

/// Replace path separators and control characters so a title is usable
/// as a single directory name.
pub fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned
    }
}

/// Output file name for a 1-based ordinal.
pub fn part_file_name(ordinal: usize) -> String {
    format!("part_{ordinal}.mp4")
}

/// Output path for a 1-based ordinal inside a run directory.
pub fn part_path(dir: &Path, ordinal: usize) -> PathBuf {
    dir.join(part_file_name(ordinal))
}

/// Temporary path a part is encoded to before being moved into place.
pub fn part_temp_path(dir: &Path, ordinal: usize) -> PathBuf {
    dir.join(format!(".part_{ordinal}.tmp.mp4"))
}

/// Fixed encode settings shared by every segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub video_codec: String,
    pub audio_codec: String,
    pub preset: String,
    pub pixel_format: String,
}

impl OutputSettings {
    /// 1080×1920 @ 30 fps, H.264 + AAC.
    pub fn reels() -> Self {
        Self {
            width: Canvas::REELS.width,
            height: Canvas::REELS.height,
            fps: 30,
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            preset: "ultrafast".to_string(),
            pixel_format: "yuv420p".to_string(),
        }
    }

    /// Duration of one output frame in seconds.
    pub fn frame_secs(&self) -> f64 {
        1.0 / self.fps.max(1) as f64
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self::reels()
    }
}
