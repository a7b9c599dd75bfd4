//! Hardware backend command construction and output parsing tests.
//!
//! Nothing here needs a GPU: the arguments are built without running the
//! decoder.

use std::ffi::OsString;
use std::path::Path;

use frame2img::backend::BackendJob;
use frame2img::backend::hardware::{jpeg_qscale, parse_progress_line, supports_cuda};
use frame2img::{
    BackendPreference, ExtractionRequest, ExtractorOptions, HardwareBackend, ImageFormat,
    PngCompression, Sampling, TimeWindow, VideoMetadata, hardware_available, planner,
};

fn metadata() -> VideoMetadata {
    VideoMetadata {
        duration_seconds: Some(10.0),
        frame_rate: Some(30.0),
        frame_count: 300,
        frame_count_exact: true,
        ..VideoMetadata::default()
    }
}

fn arguments_for(request: &ExtractionRequest) -> Vec<String> {
    let metadata = metadata();
    let plan = planner::plan(
        &metadata,
        request.window(),
        request.sampling(),
        Path::new("/out/clip_frames"),
    );
    let job = BackendJob {
        request,
        plan: &plan,
        metadata: &metadata,
    };

    HardwareBackend::with_executable("ffmpeg", PngCompression::Default)
        .arguments(&job)
        .into_iter()
        .map(|arg: OsString| arg.to_string_lossy().into_owned())
        .collect()
}

fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|index| args.get(index + 1))
        .map(String::as_str)
}

// ── Arguments ───────────────────────────────────────────────────────

#[test]
fn whole_video_png_arguments() {
    let request = ExtractionRequest::new("/videos/clip.mp4", "/out");
    let args = arguments_for(&request);

    assert_eq!(&args[..4], ["-hide_banner", "-y", "-hwaccel", "cuda"]);
    assert_eq!(value_after(&args, "-i"), Some("/videos/clip.mp4"));
    assert!(!args.contains(&"-ss".to_string()));
    assert!(!args.contains(&"-t".to_string()));
    assert!(!args.contains(&"-vf".to_string()));
    assert_eq!(value_after(&args, "-start_number"), Some("1"));
    assert_eq!(value_after(&args, "-compression_level"), Some("6"));
    assert!(args.contains(&"/out/clip_frames/frame_%03d.png".to_string()));
    assert_eq!(value_after(&args, "-progress"), Some("pipe:1"));
}

#[test]
fn window_seeks_before_input_and_limits_duration() {
    let request = ExtractionRequest::new("clip.mp4", "/out")
        .with_window(TimeWindow::new(2.0, Some(5.0)));
    let args = arguments_for(&request);

    let seek = args.iter().position(|arg| arg == "-ss").unwrap();
    let input = args.iter().position(|arg| arg == "-i").unwrap();
    assert!(seek < input);
    assert_eq!(value_after(&args, "-ss"), Some("2.000"));
    assert_eq!(value_after(&args, "-t"), Some("3.000"));
    assert!(args.contains(&"/out/clip_frames/frame_%02d.png".to_string()));
}

#[test]
fn sampling_becomes_a_filter() {
    let nth = ExtractionRequest::new("clip.mp4", "/out").with_sampling(Sampling::EveryNthFrame(5));
    assert_eq!(
        value_after(&arguments_for(&nth), "-vf"),
        Some("select=not(mod(n\\,5))")
    );

    let timed =
        ExtractionRequest::new("clip.mp4", "/out").with_sampling(Sampling::EverySeconds(0.5));
    assert_eq!(value_after(&arguments_for(&timed), "-vf"), Some("fps=1/0.5"));
}

#[test]
fn jpeg_uses_quality_scale() {
    let request = ExtractionRequest::new("clip.mp4", "/out")
        .with_format(ImageFormat::Jpeg)
        .with_jpeg_quality(100);
    let args = arguments_for(&request);

    assert_eq!(value_after(&args, "-q:v"), Some("2"));
    assert!(!args.contains(&"-compression_level".to_string()));
    assert!(args.contains(&"/out/clip_frames/frame_%03d.jpg".to_string()));
}

#[test]
fn png_compression_level_follows_options() {
    let metadata = metadata();
    let request = ExtractionRequest::new("clip.mp4", "/out");
    let plan = planner::plan(&metadata, None, Sampling::default(), "/out/clip_frames");
    let job = BackendJob {
        request: &request,
        plan: &plan,
        metadata: &metadata,
    };

    let args = HardwareBackend::with_executable("ffmpeg", PngCompression::Best).arguments(&job);
    let level = args
        .iter()
        .position(|arg| arg == "-compression_level")
        .map(|index| args[index + 1].clone());
    assert_eq!(level, Some(OsString::from("9")));
}

// ── Output parsing ──────────────────────────────────────────────────

#[test]
fn progress_lines() {
    assert_eq!(parse_progress_line("frame=0"), Some(0));
    assert_eq!(parse_progress_line("frame=1234\n"), Some(1234));
    assert_eq!(parse_progress_line("  frame = 7 "), Some(7));
    assert_eq!(parse_progress_line("fps=29.97"), None);
    assert_eq!(parse_progress_line("progress=end"), None);
    assert_eq!(parse_progress_line("frame=N/A"), None);
    assert_eq!(parse_progress_line(""), None);
}

#[test]
fn cuda_detection() {
    let listing = "Hardware acceleration methods:\nvdpau\ncuda\nvaapi\n";
    assert!(supports_cuda(listing));
    assert!(supports_cuda("Hardware acceleration methods:\r\nNVDEC\r\n"));
    assert!(!supports_cuda("Hardware acceleration methods:\nvaapi\nqsv\n"));
    assert!(!supports_cuda("cuda_unsupported_build"));
}

#[test]
fn jpeg_quality_maps_onto_qscale() {
    assert_eq!(jpeg_qscale(1), 31);
    assert_eq!(jpeg_qscale(100), 2);
    assert_eq!(jpeg_qscale(0), 31);

    let mut previous = u8::MAX;
    for quality in 1..=100 {
        let scale = jpeg_qscale(quality);
        assert!((2..=31).contains(&scale));
        assert!(scale <= previous);
        previous = scale;
    }
}

// ── Detection ───────────────────────────────────────────────────────

#[test]
fn software_only_disables_detection() {
    let options = ExtractorOptions::new().with_backend(BackendPreference::SoftwareOnly);
    assert!(HardwareBackend::detect(&options).is_none());
    assert!(!hardware_available(&options));
}

#[test]
fn missing_executable_disables_detection() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let options = ExtractorOptions::new().with_ffmpeg_path(dir.path().join("no-such-ffmpeg"));
    assert!(HardwareBackend::detect(&options).is_none());
}
