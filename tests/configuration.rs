//! Request and engine configuration tests.

use std::path::Path;

use frame2img::{
    BackendPreference, ExtractionRequest, ExtractorOptions, FfmpegLogLevel, ImageFormat,
    PngCompression, Sampling, TimeWindow,
};

// ── ExtractionRequest ───────────────────────────────────────────────

#[test]
fn request_defaults() {
    let request = ExtractionRequest::new("in.mp4", "out");
    assert_eq!(request.video_path(), Path::new("in.mp4"));
    assert_eq!(request.output_root(), Path::new("out"));
    assert!(request.window().is_none());
    assert_eq!(request.sampling(), Sampling::EveryNthFrame(1));
    assert_eq!(request.format(), ImageFormat::Png);
    assert_eq!(request.jpeg_quality(), ExtractionRequest::DEFAULT_JPEG_QUALITY);
    assert!(!request.precision_count());
}

#[test]
fn request_builder_chain() {
    let request = ExtractionRequest::new("in.mp4", "out")
        .with_window(TimeWindow::new(1.5, Some(4.0)))
        .with_sampling(Sampling::EverySeconds(0.25))
        .with_format(ImageFormat::Jpeg)
        .with_jpeg_quality(80)
        .with_precision_count(true);

    assert_eq!(request.window(), Some(&TimeWindow::new(1.5, Some(4.0))));
    assert_eq!(request.sampling(), Sampling::EverySeconds(0.25));
    assert_eq!(request.format(), ImageFormat::Jpeg);
    assert_eq!(request.jpeg_quality(), 80);
    assert!(request.precision_count());
}

#[test]
fn optional_window_can_clear() {
    let request = ExtractionRequest::new("in.mp4", "out")
        .with_window(TimeWindow::new(1.0, None))
        .with_optional_window(None);
    assert!(request.window().is_none());
}

// ── TimeWindow ──────────────────────────────────────────────────────

#[test]
fn window_from_bounds() {
    assert_eq!(TimeWindow::from_bounds(None, None), None);
    assert_eq!(
        TimeWindow::from_bounds(None, Some(3.0)),
        Some(TimeWindow::new(0.0, Some(3.0)))
    );
    assert_eq!(
        TimeWindow::from_bounds(Some(2.0), None),
        Some(TimeWindow::new(2.0, None))
    );
}

#[test]
fn window_accessors() {
    let window = TimeWindow::new(2.0, Some(5.0));
    assert!(window.validate().is_ok());
    assert_eq!(window.duration(), Some(3.0));
    assert!(window.has_start());

    let open = TimeWindow::new(0.0, None);
    assert!(open.validate().is_ok());
    assert_eq!(open.duration(), None);
    assert!(!open.has_start());
}

// ── Sampling and formats ────────────────────────────────────────────

#[test]
fn sampling_validation() {
    assert!(Sampling::EveryNthFrame(1).validate().is_ok());
    assert!(Sampling::EveryNthFrame(1).keeps_all_frames());
    assert!(!Sampling::EveryNthFrame(2).keeps_all_frames());
    assert!(!Sampling::EverySeconds(1.0).keeps_all_frames());
    assert!(Sampling::EveryNthFrame(0).validate().is_err());
    assert!(Sampling::EverySeconds(f64::NAN).validate().is_err());
}

#[test]
fn image_format_names() {
    assert_eq!(ImageFormat::from_name("png"), Some(ImageFormat::Png));
    assert_eq!(ImageFormat::from_name(".JPG"), Some(ImageFormat::Jpeg));
    assert_eq!(ImageFormat::from_name(" jpeg "), Some(ImageFormat::Jpeg));
    assert_eq!(ImageFormat::from_name("gif"), None);

    assert_eq!(ImageFormat::Png.extension(), "png");
    assert_eq!(ImageFormat::Jpeg.extension(), "jpg");
    assert_eq!(ImageFormat::Jpeg.to_string(), "JPEG");
}

// ── ExtractorOptions ────────────────────────────────────────────────

#[test]
fn options_defaults() {
    let options = ExtractorOptions::default();
    assert_eq!(options.backend(), BackendPreference::Auto);

    let debug = format!("{options:?}");
    assert!(debug.contains("progress_batch_size: 10"), "{debug}");
    assert!(debug.contains("channel_capacity: 64"), "{debug}");
    assert!(debug.contains("png_compression: Fast"), "{debug}");
}

#[test]
fn options_builder_chain() {
    let options = ExtractorOptions::new()
        .with_backend(BackendPreference::SoftwareOnly)
        .with_ffmpeg_path("/opt/ffmpeg/bin/ffmpeg")
        .with_ffprobe_path("/opt/ffmpeg/bin/ffprobe")
        .with_progress_batch_size(0)
        .with_png_compression(PngCompression::Best)
        .with_channel_capacity(0);

    assert_eq!(options.backend(), BackendPreference::SoftwareOnly);
    let debug = format!("{options:?}");
    assert!(debug.contains("/opt/ffmpeg/bin/ffmpeg"), "{debug}");
    assert!(debug.contains("/opt/ffmpeg/bin/ffprobe"), "{debug}");
    assert!(debug.contains("progress_batch_size: 1"), "{debug}");
    assert!(debug.contains("channel_capacity: 1"), "{debug}");
    assert!(debug.contains("png_compression: Best"), "{debug}");
}

// ── FFmpeg logging ──────────────────────────────────────────────────

#[test]
fn ffmpeg_log_level_follows_log_filter() {
    assert_eq!(
        FfmpegLogLevel::from_log_filter(log::LevelFilter::Off),
        FfmpegLogLevel::Quiet
    );
    assert_eq!(
        FfmpegLogLevel::from_log_filter(log::LevelFilter::Error),
        FfmpegLogLevel::Fatal
    );
    assert_eq!(
        FfmpegLogLevel::from_log_filter(log::LevelFilter::Warn),
        FfmpegLogLevel::Error
    );
    assert_eq!(
        FfmpegLogLevel::from_log_filter(log::LevelFilter::Info),
        FfmpegLogLevel::Warning
    );
    assert_eq!(
        FfmpegLogLevel::from_log_filter(log::LevelFilter::Trace),
        FfmpegLogLevel::Debug
    );
}
