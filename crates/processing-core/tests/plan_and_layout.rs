use std::path::{Path, PathBuf};

use reelsplit_common::error::ReelsResult;
use reelsplit_processing_core::layout::{ElementMetrics, LayoutEngine};
use reelsplit_processing_core::segmentation::plan_segments;
use reelsplit_project_model::color::Color;
use reelsplit_project_model::geometry::{Canvas, PixelRect, Size};
use reelsplit_project_model::overlay::{
    Corner, ForegroundFit, OverlayKind, OverlaySpec, TextStyle,
};
use reelsplit_project_model::window::TrailingPolicy;

/// Monospace stand-in: every glyph is `size * 0.6` wide.
struct Monospace;

impl ElementMetrics for Monospace {
    fn text_size(&self, text: &str, style: &TextStyle) -> ReelsResult<Size> {
        let w = (text.chars().count() as f64 * style.size as f64 * 0.6).round() as u32;
        Ok(Size::new(w, style.size))
    }

    fn image_size(&self, _path: &Path) -> ReelsResult<Size> {
        Ok(Size::new(600, 150))
    }
}

fn style(size: u32) -> TextStyle {
    TextStyle {
        font: PathBuf::from("fonts/test.ttf"),
        color: Color::parse("#0b789a").expect("valid color"),
        size,
    }
}

#[test]
fn every_part_gets_a_distinct_label_at_the_same_anchor() {
    let plan = plan_segments(95.0, 30.0, TrailingPolicy::Keep).expect("valid plan");
    let engine = LayoutEngine::new(Canvas::REELS, Size::new(1920, 1080));

    let static_specs = vec![
        OverlaySpec::blurred_background(20),
        OverlaySpec::foreground(ForegroundFit::FitWidth),
        OverlaySpec::logo("logo.png", Corner::TopLeft),
        OverlaySpec::username("@reels", style(30)),
        OverlaySpec::title("Episode 1", style(70)),
    ];
    let base = engine
        .place(&static_specs, &Monospace)
        .expect("static layout");

    let mut labels = Vec::new();
    for segment in plan.windows() {
        let part = OverlaySpec::part_index(segment.label(), style(60));
        let placed = engine
            .place_onto(&base, &[part], &Monospace)
            .expect("part layout");

        let part = placed
            .iter()
            .find(|e| e.kind == OverlayKind::PartIndex)
            .expect("part element");
        assert_eq!(part.rect.y, 120);
        assert_eq!(part.rect.h, 60);
        labels.push(format!("{:?}", part.source));

        // Static elements are untouched by per-part placement.
        let statics: Vec<_> = placed
            .iter()
            .filter(|e| e.kind != OverlayKind::PartIndex)
            .cloned()
            .collect();
        assert_eq!(statics, base);
    }

    assert_eq!(labels.len(), 4);
    assert!(labels[3].contains("Part 4/4"));
}

#[test]
fn static_layout_matches_reference_geometry() {
    let engine = LayoutEngine::new(Canvas::REELS, Size::new(1280, 720));
    let placed = engine
        .place(
            &[
                OverlaySpec::background_image("bg.jpg"),
                OverlaySpec::foreground(ForegroundFit::FitWidth),
                OverlaySpec::logo("logo.png", Corner::TopLeft),
                OverlaySpec::username("@abc", style(30)),
                OverlaySpec::title("Hello", style(70)),
            ],
            &Monospace,
        )
        .expect("layout");

    let rects: Vec<(OverlayKind, PixelRect)> = placed.iter().map(|e| (e.kind, e.rect)).collect();
    assert_eq!(
        rects,
        vec![
            (OverlayKind::Background, PixelRect::new(0, 0, 1080, 1920)),
            // 1280×720 → 1080×607.5 → 1080×608 (even)
            (OverlayKind::Foreground, PixelRect::new(0, 656, 1080, 608)),
            // 600×150 fit into 300×50 → 200×50
            (OverlayKind::Logo, PixelRect::new(50, 50, 200, 50)),
            // "Hello" @70 → 210×70, 20 px above the username
            (OverlayKind::Title, PixelRect::new(435, 1750, 210, 70)),
            // "@abc" @30 → 72×30, bottom edge 50 px above the canvas bottom
            (OverlayKind::Username, PixelRect::new(504, 1840, 72, 30)),
        ]
    );
}
