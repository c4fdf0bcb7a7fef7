//! Error types shared across ReelSplit crates.

use std::path::PathBuf;

/// Top-level error type for ReelSplit operations.
///
/// Configuration-class variants (`InvalidDuration`, `AssetNotFound`,
/// `UnsupportedColor`, `Config`) abort a run before any output exists.
/// `Render` aborts the run when it comes from the glyph preflight.
/// `Encode` and `Media` are recorded per segment.
#[derive(Debug, thiserror::Error)]
pub enum ReelsError {
    #[error("Invalid duration: {message}")]
    InvalidDuration { message: String },

    #[error("Asset not found for `{field}`: {path}")]
    AssetNotFound { field: String, path: PathBuf },

    #[error("Unsupported color for `{field}`: {value:?}")]
    UnsupportedColor { field: String, value: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Encode error (part {ordinal}): {message}")]
    Encode { ordinal: usize, message: String },

    #[error("Media error: {message}")]
    Media { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Run cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ReelsError.
pub type ReelsResult<T> = Result<T, ReelsError>;

impl ReelsError {
    pub fn invalid_duration(msg: impl Into<String>) -> Self {
        Self::InvalidDuration {
            message: msg.into(),
        }
    }

    pub fn asset_not_found(field: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::AssetNotFound {
            field: field.into(),
            path: path.into(),
        }
    }

    pub fn unsupported_color(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::UnsupportedColor {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn encode(ordinal: usize, msg: impl Into<String>) -> Self {
        Self::Encode {
            ordinal,
            message: msg.into(),
        }
    }

    pub fn media(msg: impl Into<String>) -> Self {
        Self::Media {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether this error invalidates the whole run rather than one segment.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidDuration { .. }
                | Self::AssetNotFound { .. }
                | Self::UnsupportedColor { .. }
                | Self::Config { .. }
                | Self::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offending_field() {
        let err = ReelsError::asset_not_found("logo_image", "assets/logo.png");
        assert_eq!(
            err.to_string(),
            "Asset not found for `logo_image`: assets/logo.png"
        );

        let err = ReelsError::unsupported_color("title_color", "bluish");
        assert!(err.to_string().contains("title_color"));
        assert!(err.to_string().contains("bluish"));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(ReelsError::invalid_duration("zero").is_fatal());
        assert!(ReelsError::config("bad").is_fatal());
        assert!(!ReelsError::encode(3, "boom").is_fatal());
        assert!(!ReelsError::media("probe").is_fatal());
    }
}
