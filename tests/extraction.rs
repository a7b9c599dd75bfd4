//! End-to-end extraction tests with the software backend.
//!
//! These need `tests/fixtures/sample_video.mp4` (10 s, 30 fps, 320x240) and
//! `tests/fixtures/sample_offset.ts` (the same frames starting at 5 s), and
//! return early when they are missing. Run
//! `tests/fixtures/generate_fixtures.sh` to create them.

use std::path::Path;

use frame2img::backend::software::presentation_seconds;
use frame2img::output::count_frame_files;
use frame2img::{
    BackendKind, BackendPreference, ExtractionEvent, ExtractionRequest, ExtractionResult,
    Extractor, ExtractorOptions, ImageFormat, Sampling, TimeWindow,
};

const SAMPLE_VIDEO: &str = "tests/fixtures/sample_video.mp4";
const OFFSET_VIDEO: &str = "tests/fixtures/sample_offset.ts";

fn fixture_available() -> bool {
    Path::new(SAMPLE_VIDEO).exists()
}

fn software_extractor() -> Extractor {
    Extractor::new(ExtractorOptions::new().with_backend(BackendPreference::SoftwareOnly))
}

fn frame_names(directory: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(directory)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// ── Whole video ─────────────────────────────────────────────────────

#[test]
fn extracts_every_frame_as_png() {
    if !fixture_available() {
        return;
    }
    let root = tempfile::tempdir().expect("Failed to create temp dir");
    let request = ExtractionRequest::new(SAMPLE_VIDEO, root.path());

    let result = software_extractor().spawn(request).unwrap().wait();
    assert!(result.is_success(), "{}", result.detailed_message());
    assert_eq!(result.frames_saved(), 300);

    let directory = result.output_dir().unwrap();
    assert_eq!(directory, root.path().join("sample_video_frames"));

    let names = frame_names(directory);
    assert_eq!(names.len(), 300);
    assert_eq!(names.first().map(String::as_str), Some("frame_001.png"));
    assert_eq!(names.last().map(String::as_str), Some("frame_300.png"));

    let image = image::open(directory.join("frame_150.png")).unwrap();
    assert_eq!((image.width(), image.height()), (320, 240));
}

#[test]
fn second_run_gets_a_new_directory() {
    if !fixture_available() {
        return;
    }
    let root = tempfile::tempdir().expect("Failed to create temp dir");
    let request = ExtractionRequest::new(SAMPLE_VIDEO, root.path())
        .with_window(TimeWindow::new(0.0, Some(0.5)));

    let first = software_extractor().spawn(request.clone()).unwrap().wait();
    let second = software_extractor().spawn(request).unwrap().wait();

    assert_eq!(
        first.output_dir().unwrap(),
        root.path().join("sample_video_frames")
    );
    assert_eq!(
        second.output_dir().unwrap(),
        root.path().join("sample_video_frames_1")
    );
    assert_eq!(first.frames_saved(), second.frames_saved());
}

// ── Windows and sampling ────────────────────────────────────────────

#[test]
fn window_extracts_half_open_range() {
    if !fixture_available() {
        return;
    }
    let root = tempfile::tempdir().expect("Failed to create temp dir");
    let request = ExtractionRequest::new(SAMPLE_VIDEO, root.path())
        .with_window(TimeWindow::new(2.0, Some(5.0)));

    let result = software_extractor().spawn(request).unwrap().wait();
    assert!(result.is_success(), "{}", result.detailed_message());
    assert_eq!(result.frames_saved(), 90);

    let names = frame_names(result.output_dir().unwrap());
    assert_eq!(names.first().map(String::as_str), Some("frame_01.png"));
    assert_eq!(names.last().map(String::as_str), Some("frame_90.png"));
}

#[test]
fn every_nth_frame_is_densely_numbered() {
    if !fixture_available() {
        return;
    }
    let root = tempfile::tempdir().expect("Failed to create temp dir");
    let request = ExtractionRequest::new(SAMPLE_VIDEO, root.path())
        .with_sampling(Sampling::EveryNthFrame(7));

    let result = software_extractor().spawn(request).unwrap().wait();
    assert_eq!(result.frames_saved(), 43);

    let names = frame_names(result.output_dir().unwrap());
    assert_eq!(names.len(), 43);
    assert_eq!(names.last().map(String::as_str), Some("frame_43.png"));
}

#[test]
fn every_seconds_samples_by_time() {
    if !fixture_available() {
        return;
    }
    let root = tempfile::tempdir().expect("Failed to create temp dir");
    let request = ExtractionRequest::new(SAMPLE_VIDEO, root.path())
        .with_sampling(Sampling::EverySeconds(0.5));

    let result = software_extractor().spawn(request).unwrap().wait();
    assert!(result.is_success(), "{}", result.detailed_message());
    assert!((19..=21).contains(&result.frames_saved()));
    assert_eq!(
        count_frame_files(result.output_dir().unwrap(), ImageFormat::Png),
        result.frames_saved()
    );
}

#[test]
fn jpeg_output() {
    if !fixture_available() {
        return;
    }
    let root = tempfile::tempdir().expect("Failed to create temp dir");
    let request = ExtractionRequest::new(SAMPLE_VIDEO, root.path())
        .with_window(TimeWindow::new(1.0, Some(2.0)))
        .with_format(ImageFormat::Jpeg)
        .with_jpeg_quality(75);

    let result = software_extractor().spawn(request).unwrap().wait();
    assert_eq!(result.frames_saved(), 30);

    let directory = result.output_dir().unwrap();
    assert_eq!(count_frame_files(directory, ImageFormat::Jpeg), 30);
    assert_eq!(count_frame_files(directory, ImageFormat::Png), 0);
    let image = image::open(directory.join("frame_01.jpg")).unwrap();
    assert_eq!((image.width(), image.height()), (320, 240));
}

#[test]
fn window_is_relative_to_the_first_frame() {
    if !fixture_available() || !Path::new(OFFSET_VIDEO).exists() {
        return;
    }
    let window = TimeWindow::new(0.0, Some(1.0));

    let plain_root = tempfile::tempdir().expect("Failed to create temp dir");
    let plain = software_extractor()
        .spawn(ExtractionRequest::new(SAMPLE_VIDEO, plain_root.path()).with_window(window))
        .unwrap()
        .wait();

    let offset_root = tempfile::tempdir().expect("Failed to create temp dir");
    let offset = software_extractor()
        .spawn(ExtractionRequest::new(OFFSET_VIDEO, offset_root.path()).with_window(window))
        .unwrap()
        .wait();

    assert!(offset.is_success(), "{}", offset.detailed_message());
    assert_eq!(plain.frames_saved(), 30);
    assert_eq!(offset.frames_saved(), 30);

    let first_plain = image::open(plain.output_dir().unwrap().join("frame_01.png")).unwrap();
    let first_offset = image::open(offset.output_dir().unwrap().join("frame_01.png")).unwrap();
    assert_eq!(first_plain.to_rgb8(), first_offset.to_rgb8());
}

#[test]
fn presentation_time_counts_from_the_stream_start() {
    let time_base = ffmpeg_next::Rational::new(1, 90_000);

    let seconds = presentation_seconds(585_000, 450_000, time_base).unwrap();
    assert!((seconds - 1.5).abs() < 1e-9);

    let unknown_start = ffmpeg_next::ffi::AV_NOPTS_VALUE;
    let seconds = presentation_seconds(45_000, unknown_start, time_base).unwrap();
    assert!((seconds - 0.5).abs() < 1e-9);

    assert!(presentation_seconds(10, 0, ffmpeg_next::Rational::new(1, 0)).is_none());
}

// ── Events ──────────────────────────────────────────────────────────

#[test]
fn events_are_ordered_and_monotonic() {
    if !fixture_available() {
        return;
    }
    let root = tempfile::tempdir().expect("Failed to create temp dir");
    let request = ExtractionRequest::new(SAMPLE_VIDEO, root.path())
        .with_window(TimeWindow::new(0.0, Some(2.0)));

    let mut handle = software_extractor().spawn(request).unwrap();
    let events: Vec<ExtractionEvent> = handle.events().collect();

    assert!(matches!(events.last(), Some(ExtractionEvent::Finished(_))));
    let finished = events
        .iter()
        .filter(|event| matches!(event, ExtractionEvent::Finished(_)))
        .count();
    assert_eq!(finished, 1);

    let saved: Vec<u64> = events
        .iter()
        .filter_map(|event| match event {
            ExtractionEvent::Progress(progress) => {
                assert_eq!(progress.backend, BackendKind::Software);
                assert_eq!(progress.attempt, 1);
                assert_eq!(progress.frames_planned, 60);
                Some(progress.frames_saved)
            }
            _ => None,
        })
        .collect();
    assert_eq!(saved.first(), Some(&0));
    assert_eq!(saved.last(), Some(&60));
    assert!(saved.windows(2).all(|pair| pair[0] <= pair[1]));

    let statuses: Vec<&str> = events
        .iter()
        .filter_map(|event| match event {
            ExtractionEvent::Status(message) => Some(message.as_str()),
            _ => None,
        })
        .collect();
    assert!(statuses[0].starts_with("Video: "));
    assert_eq!(statuses.last(), Some(&"Done."));

    assert!(handle.wait().is_success());
}

// ── Cancellation ────────────────────────────────────────────────────

#[test]
fn cancellation_keeps_written_frames() {
    if !fixture_available() {
        return;
    }
    let root = tempfile::tempdir().expect("Failed to create temp dir");
    let extractor = Extractor::new(
        ExtractorOptions::new()
            .with_backend(BackendPreference::SoftwareOnly)
            .with_progress_batch_size(5)
            .with_channel_capacity(1),
    );

    let mut handle = extractor
        .spawn(ExtractionRequest::new(SAMPLE_VIDEO, root.path()))
        .unwrap();
    for event in handle.events() {
        if let ExtractionEvent::Progress(progress) = event {
            if progress.frames_saved >= 10 {
                break;
            }
        }
    }
    handle.cancel();
    let result = handle.wait();

    match &result {
        ExtractionResult::Canceled {
            output_dir,
            frames_saved,
        } => {
            assert!(*frames_saved >= 10);
            assert!(*frames_saved < 300);
            assert_eq!(count_frame_files(output_dir, ImageFormat::Png), *frames_saved);
        }
        other => panic!("expected a canceled run, got {other:?}"),
    }
}

#[test]
fn dropping_the_handle_cancels_the_run() {
    if !fixture_available() {
        return;
    }
    let root = tempfile::tempdir().expect("Failed to create temp dir");
    let extractor = Extractor::new(
        ExtractorOptions::new()
            .with_backend(BackendPreference::SoftwareOnly)
            .with_channel_capacity(1),
    );

    let mut handle = extractor
        .spawn(ExtractionRequest::new(SAMPLE_VIDEO, root.path()))
        .unwrap();
    let token = handle.cancellation_token();
    let _ = handle.next();
    drop(handle);

    assert!(token.is_cancelled());
}
