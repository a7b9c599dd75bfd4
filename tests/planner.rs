//! Frame planning and sampling tests.
//!
//! These run without a video: metadata is constructed directly.

use frame2img::planner::{self, UNKNOWN_PAD_WIDTH, frames_in_range, pad_width};
use frame2img::{FrameSelector, Sampling, TimeWindow, VideoMetadata};

fn ten_seconds_at_30fps() -> VideoMetadata {
    VideoMetadata {
        duration_seconds: Some(10.0),
        frame_rate: Some(30.0),
        frame_count: 300,
        frame_count_exact: true,
        width: Some(320),
        height: Some(240),
        codec_name: Some("h264".to_string()),
    }
}

// ── Frame counts ────────────────────────────────────────────────────

#[test]
fn whole_video_keeps_every_frame() {
    let plan = planner::plan(&ten_seconds_at_30fps(), None, Sampling::default(), "out");
    assert_eq!(plan.frames_planned, 300);
    assert_eq!(plan.frames_in_range, 300);
    assert_eq!(plan.filename_pad_width, 3);
    assert!(!plan.is_indeterminate());
}

#[test]
fn window_selects_half_open_range() {
    let window = TimeWindow::new(2.0, Some(5.0));
    let plan = planner::plan(
        &ten_seconds_at_30fps(),
        Some(&window),
        Sampling::default(),
        "out",
    );
    assert_eq!(plan.frames_planned, 90);
    assert_eq!(plan.filename_pad_width, 2);
}

#[test]
fn window_end_past_the_video_is_clamped_to_total() {
    let metadata = ten_seconds_at_30fps();
    assert_eq!(frames_in_range(&metadata, 8.0, Some(20.0)), 60);
}

#[test]
fn window_start_past_the_video_plans_nothing() {
    let metadata = ten_seconds_at_30fps();
    assert_eq!(frames_in_range(&metadata, 12.0, None), 0);
}

#[test]
fn every_nth_frame_rounds_up() {
    let plan = planner::plan(
        &ten_seconds_at_30fps(),
        None,
        Sampling::EveryNthFrame(7),
        "out",
    );
    assert_eq!(plan.frames_in_range, 300);
    assert_eq!(plan.frames_planned, 43);
}

#[test]
fn every_seconds_without_end_uses_the_duration() {
    let plan = planner::plan(
        &ten_seconds_at_30fps(),
        None,
        Sampling::EverySeconds(0.5),
        "out",
    );
    assert_eq!(plan.frames_planned, 21);
    assert_eq!(plan.filename_pad_width, 2);
}

#[test]
fn every_seconds_within_window() {
    let window = TimeWindow::new(2.0, Some(5.0));
    let plan = planner::plan(
        &ten_seconds_at_30fps(),
        Some(&window),
        Sampling::EverySeconds(1.0),
        "out",
    );
    assert_eq!(plan.frames_planned, 4);
}

#[test]
fn every_seconds_tolerates_binary_rounding() {
    let window = TimeWindow::new(0.0, Some(0.3));
    let plan = planner::plan(
        &ten_seconds_at_30fps(),
        Some(&window),
        Sampling::EverySeconds(0.1),
        "out",
    );
    assert_eq!(plan.frames_planned, 4);
}

#[test]
fn tiny_interval_saturates_instead_of_overflowing() {
    let plan = planner::plan(
        &ten_seconds_at_30fps(),
        None,
        Sampling::EverySeconds(1e-300),
        "out",
    );
    assert_eq!(plan.frames_planned, u64::MAX);
    assert_eq!(plan.filename_pad_width, 20);
}

#[test]
fn unknown_frame_rate_uses_the_total_count() {
    let metadata = VideoMetadata {
        frame_count: 120,
        ..VideoMetadata::default()
    };
    let window = TimeWindow::new(1.0, Some(2.0));
    let plan = planner::plan(&metadata, Some(&window), Sampling::default(), "out");
    assert_eq!(plan.frames_planned, 120);
}

#[test]
fn unknown_metadata_is_indeterminate() {
    let plan = planner::plan(
        &VideoMetadata::unknown(),
        None,
        Sampling::default(),
        "out",
    );
    assert_eq!(plan.frames_planned, 0);
    assert!(plan.is_indeterminate());
    assert_eq!(plan.filename_pad_width, UNKNOWN_PAD_WIDTH);

    let timed = planner::plan(
        &VideoMetadata::unknown(),
        None,
        Sampling::EverySeconds(1.0),
        "out",
    );
    assert_eq!(timed.frames_planned, 0);
}

#[test]
fn plan_records_the_output_directory() {
    let plan = planner::plan(&ten_seconds_at_30fps(), None, Sampling::default(), "out/a");
    assert_eq!(plan.output_directory, std::path::PathBuf::from("out/a"));
}

// ── Pad width and clamping ──────────────────────────────────────────

#[test]
fn pad_width_counts_digits() {
    assert_eq!(pad_width(0), UNKNOWN_PAD_WIDTH);
    assert_eq!(pad_width(1), 1);
    assert_eq!(pad_width(9), 1);
    assert_eq!(pad_width(10), 2);
    assert_eq!(pad_width(999), 3);
    assert_eq!(pad_width(1000), 4);
}

#[test]
fn clamp_only_applies_to_known_plans() {
    let known = planner::plan(&ten_seconds_at_30fps(), None, Sampling::default(), "out");
    assert_eq!(known.clamp(250), 250);
    assert_eq!(known.clamp(301), 300);

    let unknown = planner::plan(&VideoMetadata::unknown(), None, Sampling::default(), "out");
    assert_eq!(unknown.clamp(5000), 5000);
}

// ── Sampling resolution ─────────────────────────────────────────────

#[test]
fn time_sampling_takes_precedence() {
    assert_eq!(
        Sampling::from_parts(Some(5), Some(2.0)),
        Sampling::EverySeconds(2.0)
    );
    assert_eq!(
        Sampling::from_parts(Some(5), Some(0.0)),
        Sampling::EveryNthFrame(5)
    );
    assert_eq!(Sampling::from_parts(None, None), Sampling::EveryNthFrame(1));
}

// ── FrameSelector ───────────────────────────────────────────────────

#[test]
fn selector_keeps_every_frame_by_default() {
    let mut selector = FrameSelector::new(Sampling::default());
    assert!((0..10).all(|index| selector.should_save(index, None, None)));
}

#[test]
fn selector_keeps_multiples_of_n() {
    let mut selector = FrameSelector::new(Sampling::EveryNthFrame(3));
    let kept: Vec<u64> = (0..10)
        .filter(|&index| selector.should_save(index, None, Some(30.0)))
        .collect();
    assert_eq!(kept, vec![0, 3, 6, 9]);
}

#[test]
fn selector_time_schedule_anchors_to_first_frame() {
    let mut selector = FrameSelector::new(Sampling::EverySeconds(0.5));
    let kept: Vec<u64> = (0..60)
        .filter(|&index| {
            let timestamp = 2.0 + index as f64 / 30.0;
            selector.should_save(index, Some(timestamp), Some(30.0))
        })
        .collect();
    assert_eq!(kept, vec![0, 15, 30, 45]);
}

#[test]
fn selector_derives_time_from_index_without_timestamps() {
    let mut selector = FrameSelector::new(Sampling::EverySeconds(1.0));
    let kept = (0..90)
        .filter(|&index| selector.should_save(index, None, Some(30.0)))
        .count();
    assert_eq!(kept, 3);
}

#[test]
fn selector_saves_when_time_is_unknowable() {
    let mut selector = FrameSelector::new(Sampling::EverySeconds(1.0));
    assert!(selector.should_save(0, None, None));
    assert!(selector.should_save(1, None, None));
}
