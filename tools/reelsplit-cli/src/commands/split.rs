//! Split a video into decorated vertical parts.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, ValueEnum};

use reelsplit_common::config::AppConfig;
use reelsplit_common::error::ReelsError;
use reelsplit_project_model::overlay::{Corner, ForegroundFit};
use reelsplit_project_model::run::RunConfig;
use reelsplit_project_model::window::TrailingPolicy;
use reelsplit_render_engine::{
    generate_parts, CancelFlag, FfmpegMedia, PipelineOptions, RunReport, RusttypeGlyphs,
    SegmentProgress, SegmentStage,
};

#[derive(Args, Debug)]
pub struct SplitArgs {
    /// Input video file
    pub input: PathBuf,

    /// Background image (defaults to a blurred copy of the video)
    #[arg(long)]
    pub background: Option<PathBuf>,

    /// Logo image placed in a corner
    #[arg(long)]
    pub logo: Option<PathBuf>,

    /// Username shown at the bottom (empty to hide)
    #[arg(long, default_value = "@username")]
    pub username: String,

    /// Title shown above the username (empty to hide)
    #[arg(long, default_value = "Video Title")]
    pub title: String,

    /// Length of each part in seconds
    #[arg(short = 'd', long)]
    pub part_duration: Option<f64>,

    /// Base directory for run directories
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub username_font: Option<PathBuf>,
    #[arg(long)]
    pub title_font: Option<PathBuf>,
    #[arg(long)]
    pub part_font: Option<PathBuf>,

    /// Named color or hex (#rrggbb)
    #[arg(long)]
    pub username_color: Option<String>,
    #[arg(long)]
    pub title_color: Option<String>,
    #[arg(long)]
    pub part_color: Option<String>,

    /// Parts rendered concurrently
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Blur the video as background even when --background is given
    #[arg(long)]
    pub blur_background: bool,

    /// Fold a trailing part shorter than this many seconds into the previous one
    #[arg(long, value_name = "SECS")]
    pub merge_below: Option<f64>,

    /// Foreground scaling
    #[arg(long, value_enum, default_value_t = FitArg::FitWidth)]
    pub fit: FitArg,

    /// Logo corner
    #[arg(long, value_enum, default_value_t = CornerArg::TopLeft)]
    pub logo_corner: CornerArg,

    /// Kill an encode that runs longer than this many seconds
    #[arg(long, value_name = "SECS")]
    pub encode_timeout: Option<u64>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum FitArg {
    FitWidth,
    Contain,
}

impl From<FitArg> for ForegroundFit {
    fn from(value: FitArg) -> Self {
        match value {
            FitArg::FitWidth => ForegroundFit::FitWidth,
            FitArg::Contain => ForegroundFit::Contain,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum CornerArg {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl From<CornerArg> for Corner {
    fn from(value: CornerArg) -> Self {
        match value {
            CornerArg::TopLeft => Corner::TopLeft,
            CornerArg::TopRight => Corner::TopRight,
            CornerArg::BottomLeft => Corner::BottomLeft,
            CornerArg::BottomRight => Corner::BottomRight,
        }
    }
}

impl SplitArgs {
    /// Layer command-line values over the configured defaults.
    pub fn into_run_config(self, app: &AppConfig) -> RunConfig {
        let mut config = RunConfig::new(self.input, &app.run);
        config.output_base = self.output.unwrap_or_else(|| app.output_base.clone());
        config.background_image = self.background;
        config.logo_image = self.logo;
        config.username = self.username;
        config.video_title = self.title;
        if let Some(secs) = self.part_duration {
            config.part_duration_secs = secs;
        }

        if let Some(font) = self.username_font {
            config.username_text.font = font;
        }
        if let Some(font) = self.title_font {
            config.title_text.font = font;
        }
        if let Some(font) = self.part_font {
            config.part_text.font = font;
        }
        if let Some(color) = self.username_color {
            config.username_text.color = color;
        }
        if let Some(color) = self.title_color {
            config.title_text.color = color;
        }
        if let Some(color) = self.part_color {
            config.part_text.color = color;
        }

        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        config.blur_background = self.blur_background;
        config.trailing = match self.merge_below {
            Some(secs) => TrailingPolicy::MergeBelow(secs),
            None => TrailingPolicy::Keep,
        };
        config.foreground_fit = self.fit.into();
        config.logo_corner = self.logo_corner.into();
        if self.encode_timeout.is_some() {
            config.encode_timeout_secs = self.encode_timeout;
        }
        config
    }
}

pub async fn run(args: SplitArgs, app: &AppConfig) -> anyhow::Result<()> {
    let config = args.into_run_config(app);

    println!("Splitting: {}", config.input_video.display());
    println!("  Part duration: {}s", config.part_duration_secs);
    println!("  Workers: {}", config.workers);
    println!("  Output base: {}", config.output_base.display());

    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted: finishing parts in progress, skipping the rest");
            on_interrupt.cancel();
        }
    });

    let progress = Arc::new(|p: SegmentProgress| {
        let verb = match p.stage {
            SegmentStage::Started => "rendering",
            SegmentStage::Finished => "done",
            SegmentStage::Failed => "FAILED",
            SegmentStage::Skipped => "skipped",
        };
        println!("  Part {}/{}: {verb}", p.ordinal, p.total);
    });

    let media = FfmpegMedia::new().with_timeout(config.encode_timeout_secs.map(Duration::from_secs));
    let options = PipelineOptions {
        cancel: cancel.clone(),
        progress: Some(progress),
        ..Default::default()
    };

    let report = generate_parts(&config, Arc::new(media), Arc::new(RusttypeGlyphs::new()), options)
        .await?;
    print_summary(&report);

    if report.is_success() {
        Ok(())
    } else if cancel.is_cancelled() {
        Err(ReelsError::Cancelled.into())
    } else {
        anyhow::bail!(
            "{} of {} parts failed",
            report.summary.failed.len(),
            report.planned
        )
    }
}

fn print_summary(report: &RunReport) {
    let summary = &report.summary;
    println!();
    println!("Run {} -> {}", report.identity.run_id, report.run_dir.display());
    println!(
        "  Succeeded: {} {:?}",
        summary.succeeded.len(),
        summary.succeeded_ordinals()
    );
    if !summary.failed.is_empty() {
        println!("  Failed: {} {:?}", summary.failed.len(), summary.failed_ordinals());
        for part in &summary.failed {
            println!("    part {}: {}", part.ordinal, part.message);
        }
    }
    if !summary.skipped.is_empty() {
        println!("  Skipped: {} {:?}", summary.skipped.len(), summary.skipped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: SplitArgs,
    }

    fn parse(argv: &[&str]) -> SplitArgs {
        Harness::parse_from(std::iter::once("reelsplit").chain(argv.iter().copied())).args
    }

    #[test]
    fn test_defaults_come_from_config() {
        let mut app = AppConfig::default();
        app.run.part_duration_secs = 15.0;
        app.run.workers = 3;
        app.output_base = PathBuf::from("/tmp/parts");

        let config = parse(&["in.mp4"]).into_run_config(&app);
        assert_eq!(config.input_video, PathBuf::from("in.mp4"));
        assert!((config.part_duration_secs - 15.0).abs() < 1e-9);
        assert_eq!(config.workers, 3);
        assert_eq!(config.output_base, PathBuf::from("/tmp/parts"));
        assert_eq!(config.trailing, TrailingPolicy::Keep);
        assert_eq!(config.title_text.color, "#0b789a");
    }

    #[test]
    fn test_flags_override_config() {
        let config = parse(&[
            "in.mp4",
            "-d",
            "45",
            "--workers",
            "2",
            "--title-color",
            "white",
            "--merge-below",
            "5",
            "--fit",
            "contain",
            "--logo-corner",
            "bottom-right",
            "--username",
            "",
        ])
        .into_run_config(&AppConfig::default());

        assert!((config.part_duration_secs - 45.0).abs() < 1e-9);
        assert_eq!(config.workers, 2);
        assert_eq!(config.title_text.color, "white");
        assert_eq!(config.trailing, TrailingPolicy::MergeBelow(5.0));
        assert_eq!(config.foreground_fit, ForegroundFit::Contain);
        assert_eq!(config.logo_corner, Corner::BottomRight);
        assert!(config.username.is_empty());
    }
}
