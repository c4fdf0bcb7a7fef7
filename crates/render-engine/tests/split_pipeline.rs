use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use image::RgbaImage;

use reelsplit_common::config::RunDefaults;
use reelsplit_common::error::{ReelsError, ReelsResult};
use reelsplit_project_model::geometry::Size;
use reelsplit_project_model::overlay::TextStyle;
use reelsplit_project_model::run::{OutputSettings, RunConfig, RunIdentity};
use reelsplit_project_model::window::TimeWindow;
use reelsplit_render_engine::compositor::SegmentComposition;
use reelsplit_render_engine::export::{CancelFlag, SegmentStage};
use reelsplit_render_engine::glyph::GlyphRenderer;
use reelsplit_render_engine::media::{check_window, MediaIo, SourceVideo, SubClip};
use reelsplit_render_engine::pipeline::{generate_parts, PipelineOptions, MANIFEST_FILE};

/// In-memory media service that records what it was asked to encode.
struct FakeMedia {
    duration_secs: f64,
    fail_on: Vec<usize>,
    missing_asset_on: Vec<usize>,
    available: bool,
    encoded: Mutex<Vec<(usize, f64)>>,
}

impl FakeMedia {
    fn new(duration_secs: f64) -> Self {
        Self {
            duration_secs,
            fail_on: Vec::new(),
            missing_asset_on: Vec::new(),
            available: true,
            encoded: Mutex::new(Vec::new()),
        }
    }

    fn failing_on(mut self, ordinals: &[usize]) -> Self {
        self.fail_on = ordinals.to_vec();
        self
    }

    fn missing_asset_on(mut self, ordinals: &[usize]) -> Self {
        self.missing_asset_on = ordinals.to_vec();
        self
    }

    fn encoded(&self) -> Vec<(usize, f64)> {
        let mut encoded = self.encoded.lock().expect("lock").clone();
        encoded.sort_by_key(|(ordinal, _)| *ordinal);
        encoded
    }
}

impl MediaIo for FakeMedia {
    fn probe(&self, path: &Path) -> ReelsResult<SourceVideo> {
        Ok(SourceVideo {
            path: path.to_path_buf(),
            duration_secs: self.duration_secs,
            width: 1920,
            height: 1080,
            fps: 30.0,
            has_audio: true,
        })
    }

    fn extract(&self, source: &Arc<SourceVideo>, window: TimeWindow) -> ReelsResult<SubClip> {
        check_window(source, window)?;
        Ok(SubClip {
            source: Arc::clone(source),
            window,
        })
    }

    fn encode(
        &self,
        composition: &SegmentComposition,
        settings: &OutputSettings,
        output: &Path,
    ) -> ReelsResult<()> {
        let ordinal = composition.segment.ordinal;
        assert_eq!((settings.width, settings.height), (1080, 1920));
        assert!(output
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(".part_")));
        for png in composition.still_images() {
            assert!(png.is_file(), "missing overlay asset {}", png.display());
        }

        // Leave a partial file behind to check temporaries are cleaned up.
        std::fs::write(output, b"partial")?;
        if self.missing_asset_on.contains(&ordinal) {
            return Err(ReelsError::asset_not_found("logo_image", "logo.png"));
        }
        if self.fail_on.contains(&ordinal) {
            return Err(ReelsError::encode(ordinal, "injected encoder failure"));
        }

        self.encoded
            .lock()
            .expect("lock")
            .push((ordinal, composition.duration()));
        std::fs::write(output, format!("part {ordinal}"))?;
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Solid blocks, `size/2` px per character.
struct BlockGlyphs;

impl GlyphRenderer for BlockGlyphs {
    fn measure(&self, text: &str, style: &TextStyle) -> ReelsResult<Size> {
        Ok(Size::new(
            (text.chars().count() as u32 * style.size / 2).max(1),
            style.size,
        ))
    }

    fn render(&self, text: &str, style: &TextStyle) -> ReelsResult<RgbaImage> {
        let size = self.measure(text, style)?;
        Ok(RgbaImage::from_pixel(
            size.w,
            size.h,
            image::Rgba(style.color.to_rgba_array()),
        ))
    }

    fn name(&self) -> &str {
        "blocks"
    }
}

/// Stands in for a system without a usable text rasteriser.
struct NoGlyphs;

impl GlyphRenderer for NoGlyphs {
    fn measure(&self, _text: &str, _style: &TextStyle) -> ReelsResult<Size> {
        Err(ReelsError::render("no glyph backend"))
    }

    fn render(&self, _text: &str, _style: &TextStyle) -> ReelsResult<RgbaImage> {
        Err(ReelsError::render("no glyph backend"))
    }

    fn name(&self) -> &str {
        "none"
    }
}

struct Fixture {
    dir: tempfile::TempDir,
    config: RunConfig,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("input.mp4");
        std::fs::write(&input, b"not really a video").expect("write input");
        let font = dir.path().join("font.ttf");
        std::fs::write(&font, b"not really a font").expect("write font");
        let logo = dir.path().join("logo.png");
        RgbaImage::from_pixel(600, 150, image::Rgba([255, 255, 255, 255]))
            .save(&logo)
            .expect("write logo");

        let mut config = RunConfig::new(input, &RunDefaults::default());
        config.output_base = dir.path().join("output");
        config.logo_image = Some(logo);
        config.username = "@reels".to_string();
        config.video_title = "Pipeline Test".to_string();
        config.part_duration_secs = 30.0;
        config.username_text.font = font.clone();
        config.title_text.font = font.clone();
        config.part_text.font = font;

        Self { dir, config }
    }

    fn output_base(&self) -> PathBuf {
        self.dir.path().join("output")
    }
}

fn options(run_id: &str) -> PipelineOptions {
    PipelineOptions {
        identity: Some(RunIdentity::with_id("Pipeline Test", run_id)),
        ..Default::default()
    }
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("read dir")
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn writes_one_part_per_window_with_exact_durations() {
    let fx = Fixture::new();
    let media = Arc::new(FakeMedia::new(95.0));

    let report = generate_parts(&fx.config, media.clone(), Arc::new(BlockGlyphs), options("aaaa0001"))
        .await
        .expect("run should complete");

    assert!(report.is_success());
    assert_eq!(report.planned, 4);
    assert_eq!(report.run_dir, fx.output_base().join("Pipeline Test_aaaa0001"));
    assert_eq!(
        files_in(&report.run_dir),
        vec!["part_1.mp4", "part_2.mp4", "part_3.mp4", "part_4.mp4", MANIFEST_FILE]
    );

    let frame = OutputSettings::reels().frame_secs();
    let expected = [30.0, 30.0, 30.0, 5.0];
    let encoded = media.encoded();
    assert_eq!(encoded.len(), 4);
    for ((ordinal, duration), want) in encoded.iter().zip(expected) {
        assert!(
            (duration - want).abs() <= frame,
            "part {ordinal} lasted {duration}s, expected {want}s"
        );
    }

    let manifest: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(report.run_dir.join(MANIFEST_FILE)).expect("manifest"),
    )
    .expect("manifest json");
    assert_eq!(manifest["planned"], 4);
    assert_eq!(manifest["identity"]["run_id"], "aaaa0001");
}

#[tokio::test]
async fn encode_failure_on_one_segment_does_not_stop_the_batch() {
    let fx = Fixture::new();
    let media = Arc::new(FakeMedia::new(150.0).failing_on(&[3]));

    let report = generate_parts(&fx.config, media, Arc::new(BlockGlyphs), options("bbbb0002"))
        .await
        .expect("run should complete");

    assert!(!report.is_success());
    assert_eq!(report.summary.succeeded_ordinals(), vec![1, 2, 4, 5]);
    assert_eq!(report.summary.failed_ordinals(), vec![3]);
    assert!(report.summary.failed[0].message.contains("injected"));

    let files = files_in(&report.run_dir);
    assert!(!files.contains(&"part_3.mp4".to_string()));
    assert!(files.iter().all(|f| !f.contains(".tmp.")));
}

#[tokio::test]
async fn parallel_workers_report_the_same_failures() {
    let mut fx = Fixture::new();
    fx.config.workers = 3;
    let media = Arc::new(FakeMedia::new(150.0).failing_on(&[3]));

    let report = generate_parts(&fx.config, media, Arc::new(BlockGlyphs), options("cccc0003"))
        .await
        .expect("run should complete");

    assert_eq!(report.summary.succeeded_ordinals(), vec![1, 2, 4, 5]);
    assert_eq!(report.summary.failed_ordinals(), vec![3]);
}

#[tokio::test]
async fn missing_logo_aborts_before_anything_is_written() {
    let mut fx = Fixture::new();
    fx.config.logo_image = Some(fx.dir.path().join("nope.png"));

    let err = generate_parts(
        &fx.config,
        Arc::new(FakeMedia::new(95.0)),
        Arc::new(BlockGlyphs),
        options("dddd0004"),
    )
    .await
    .expect_err("missing logo must abort");

    match err {
        ReelsError::AssetNotFound { field, .. } => assert_eq!(field, "logo_image"),
        other => panic!("expected AssetNotFound, got {other:?}"),
    }
    assert!(!fx.output_base().exists());
}

#[tokio::test]
async fn unavailable_glyph_rendering_is_fatal() {
    let fx = Fixture::new();
    let err = generate_parts(
        &fx.config,
        Arc::new(FakeMedia::new(95.0)),
        Arc::new(NoGlyphs),
        options("eeee0005"),
    )
    .await
    .expect_err("glyph failure must abort");

    assert!(matches!(err, ReelsError::Render { .. }));
    assert!(!fx.output_base().exists());
}

#[tokio::test]
async fn zero_length_source_is_invalid_duration() {
    let fx = Fixture::new();
    let err = generate_parts(
        &fx.config,
        Arc::new(FakeMedia::new(0.0)),
        Arc::new(BlockGlyphs),
        options("ffff0006"),
    )
    .await
    .expect_err("empty source must abort");

    assert!(matches!(err, ReelsError::InvalidDuration { .. }));
    assert!(!fx.output_base().exists());
}

#[tokio::test]
async fn unavailable_media_backend_is_fatal() {
    let fx = Fixture::new();
    let mut media = FakeMedia::new(95.0);
    media.available = false;

    let err = generate_parts(&fx.config, Arc::new(media), Arc::new(BlockGlyphs), options("gggg0007"))
        .await
        .expect_err("missing backend must abort");
    assert!(matches!(err, ReelsError::Media { .. }));
}

#[tokio::test]
async fn repeated_runs_produce_the_same_parts() {
    let fx = Fixture::new();

    let mut outcomes = Vec::new();
    for run_id in ["hhhh0008", "hhhh0009"] {
        let media = Arc::new(FakeMedia::new(95.0));
        let report = generate_parts(&fx.config, media.clone(), Arc::new(BlockGlyphs), options(run_id))
            .await
            .expect("run should complete");
        let durations: Vec<f64> = report
            .summary
            .succeeded
            .iter()
            .map(|p| p.duration_secs)
            .collect();
        outcomes.push((report.summary.succeeded_ordinals(), durations, media.encoded()));
    }

    assert_eq!(outcomes[0], outcomes[1]);
}

#[tokio::test]
async fn cancellation_skips_segments_not_yet_started() {
    let fx = Fixture::new();
    let cancel = CancelFlag::new();
    let events = Arc::new(Mutex::new(Vec::new()));

    let progress = {
        let cancel = cancel.clone();
        let events = Arc::clone(&events);
        Arc::new(move |p: reelsplit_render_engine::SegmentProgress| {
            events.lock().expect("lock").push((p.ordinal, p.stage));
            if p.ordinal == 2 && p.stage == SegmentStage::Finished {
                cancel.cancel();
            }
        })
    };

    let report = generate_parts(
        &fx.config,
        Arc::new(FakeMedia::new(150.0)),
        Arc::new(BlockGlyphs),
        PipelineOptions {
            cancel,
            progress: Some(progress),
            ..options("iiii0010")
        },
    )
    .await
    .expect("run should complete");

    assert_eq!(report.summary.succeeded_ordinals(), vec![1, 2]);
    assert_eq!(report.summary.skipped, vec![3, 4, 5]);
    assert!(!report.is_success());

    let events = events.lock().expect("lock").clone();
    assert!(events.contains(&(1, SegmentStage::Started)));
    assert!(events.contains(&(5, SegmentStage::Skipped)));
    assert!(!events.contains(&(3, SegmentStage::Started)));
}

#[tokio::test]
async fn fatal_segment_error_skips_the_rest() {
    let fx = Fixture::new();
    let media = Arc::new(FakeMedia::new(150.0).missing_asset_on(&[2]));

    let report = generate_parts(&fx.config, media, Arc::new(BlockGlyphs), options("jjjj0011"))
        .await
        .expect("run should complete");

    assert_eq!(report.summary.succeeded_ordinals(), vec![1]);
    assert_eq!(report.summary.failed_ordinals(), vec![2]);
    assert!(report.summary.failed[0].message.contains("logo_image"));
    assert_eq!(report.summary.skipped, vec![3, 4, 5]);
}

#[tokio::test]
async fn panicking_progress_callback_still_accounts_for_the_part() {
    let fx = Fixture::new();
    let progress = Arc::new(|p: reelsplit_render_engine::SegmentProgress| {
        if p.ordinal == 2 && p.stage == SegmentStage::Finished {
            panic!("progress sink failed");
        }
    });

    let report = generate_parts(
        &fx.config,
        Arc::new(FakeMedia::new(150.0)),
        Arc::new(BlockGlyphs),
        PipelineOptions {
            progress: Some(progress),
            ..options("kkkk0012")
        },
    )
    .await
    .expect("run should complete");

    assert_eq!(report.summary.total(), report.planned);
    assert_eq!(report.summary.failed_ordinals(), vec![2]);
    assert_eq!(report.summary.succeeded_ordinals(), vec![1, 3, 4, 5]);
}
