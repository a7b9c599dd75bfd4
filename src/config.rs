//! Extraction requests and engine configuration.
//!
//! [`ExtractionRequest`] describes *what* to extract: the video, the output
//! root, an optional time window, the sampling policy and the image format.
//! [`ExtractorOptions`] tunes *how* the engine runs: backend preference,
//! external tool locations, progress throttling and encoder settings.
//!
//! Both are builders whose setters consume and return `self`.
//!
//! # Example
//!
//! ```
//! use frame2img::{ExtractionRequest, ExtractorOptions, ImageFormat, Sampling, TimeWindow};
//!
//! let request = ExtractionRequest::new("input.mp4", "out")
//!     .with_window(TimeWindow::new(2.0, Some(5.0)))
//!     .with_sampling(Sampling::EveryNthFrame(3))
//!     .with_format(ImageFormat::Jpeg)
//!     .with_jpeg_quality(90);
//!
//! let options = ExtractorOptions::new().with_progress_batch_size(25);
//! # let _ = (request, options);
//! ```

use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};

use crate::error::ExtractionError;

/// The `[start, end)` time range to extract from.
///
/// `end = None` means "until the end of the video".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    /// Window start in seconds (`>= 0`).
    pub start_seconds: f64,
    /// Exclusive window end in seconds.
    pub end_seconds: Option<f64>,
}

impl TimeWindow {
    /// Create a window. No validation happens here; see
    /// [`validate`](TimeWindow::validate).
    pub fn new(start_seconds: f64, end_seconds: Option<f64>) -> Self {
        Self {
            start_seconds,
            end_seconds,
        }
    }

    /// Build a window from optional bounds as they come from a UI.
    ///
    /// Returns `None` when neither bound is set. An invalid pair is kept
    /// as-is so the engine can reject it.
    pub fn from_bounds(start: Option<f64>, end: Option<f64>) -> Option<Self> {
        match (start, end) {
            (None, None) => None,
            (start, end) => Some(Self::new(start.unwrap_or(0.0), end)),
        }
    }

    /// Check the window invariant: `start >= 0`, and `end > start` when an
    /// end is given.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::InvalidTimeWindow`].
    pub fn validate(&self) -> Result<(), ExtractionError> {
        let start_ok = self.start_seconds.is_finite() && self.start_seconds >= 0.0;
        let end_ok = self
            .end_seconds
            .is_none_or(|end| end.is_finite() && end > self.start_seconds);

        if start_ok && end_ok {
            Ok(())
        } else {
            Err(ExtractionError::InvalidTimeWindow {
                start: self.start_seconds,
                end: self.end_seconds.unwrap_or(f64::NAN),
            })
        }
    }

    /// Window length in seconds, when the end is known.
    pub fn duration(&self) -> Option<f64> {
        self.end_seconds.map(|end| end - self.start_seconds)
    }

    /// Returns `true` when the window has a non-zero start.
    pub fn has_start(&self) -> bool {
        self.start_seconds > 0.0
    }
}

/// Frame sampling policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sampling {
    /// Keep frames whose index within the window is a multiple of `N`.
    /// `EveryNthFrame(1)` keeps every frame.
    EveryNthFrame(u64),
    /// Keep one frame every `T` seconds.
    EverySeconds(f64),
}

impl Default for Sampling {
    fn default() -> Self {
        Sampling::EveryNthFrame(1)
    }
}

impl Sampling {
    /// Resolve the two sampling inputs a UI exposes.
    ///
    /// Time-based sampling takes precedence whenever `every_seconds > 0`,
    /// regardless of `every_nth`. Otherwise `every_nth` is used (default 1).
    pub fn from_parts(every_nth: Option<u64>, every_seconds: Option<f64>) -> Self {
        match every_seconds {
            Some(seconds) if seconds > 0.0 => Sampling::EverySeconds(seconds),
            _ => Sampling::EveryNthFrame(every_nth.unwrap_or(1)),
        }
    }

    /// Check that `N >= 1` or `T > 0`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::InvalidSampling`].
    pub fn validate(&self) -> Result<(), ExtractionError> {
        match *self {
            Sampling::EveryNthFrame(0) => Err(ExtractionError::InvalidSampling(
                "every-Nth-frame interval must be at least 1".to_string(),
            )),
            Sampling::EverySeconds(seconds) if !(seconds.is_finite() && seconds > 0.0) => {
                Err(ExtractionError::InvalidSampling(format!(
                    "sampling interval must be a positive number of seconds, got {seconds}"
                )))
            }
            _ => Ok(()),
        }
    }

    /// Returns `true` if every frame in the window is kept.
    pub fn keeps_all_frames(&self) -> bool {
        matches!(self, Sampling::EveryNthFrame(1))
    }
}

/// Output image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    /// Lossless PNG. This is the default.
    #[default]
    Png,
    /// Lossy JPEG, see [`ExtractionRequest::with_jpeg_quality`].
    Jpeg,
}

impl ImageFormat {
    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
        }
    }

    /// Parse a user-facing format name (`png`, `jpg`, `jpeg`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            _ => None,
        }
    }
}

impl Display for ImageFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ImageFormat::Png => write!(f, "PNG"),
            ImageFormat::Jpeg => write!(f, "JPEG"),
        }
    }
}

/// One extraction job, constructed once by the caller.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub(crate) video_path: PathBuf,
    pub(crate) output_root: PathBuf,
    pub(crate) window: Option<TimeWindow>,
    pub(crate) sampling: Sampling,
    pub(crate) format: ImageFormat,
    pub(crate) jpeg_quality: u8,
    pub(crate) precision_count: bool,
}

impl ExtractionRequest {
    /// Default JPEG quality.
    pub const DEFAULT_JPEG_QUALITY: u8 = 95;

    /// Create a request extracting every frame of `video_path` as PNG into a
    /// fresh directory under `output_root`.
    pub fn new<V: AsRef<Path>, O: AsRef<Path>>(video_path: V, output_root: O) -> Self {
        Self {
            video_path: video_path.as_ref().to_path_buf(),
            output_root: output_root.as_ref().to_path_buf(),
            window: None,
            sampling: Sampling::default(),
            format: ImageFormat::default(),
            jpeg_quality: Self::DEFAULT_JPEG_QUALITY,
            precision_count: false,
        }
    }

    /// Restrict extraction to a time window.
    #[must_use]
    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = Some(window);
        self
    }

    /// Set or clear the time window.
    #[must_use]
    pub fn with_optional_window(mut self, window: Option<TimeWindow>) -> Self {
        self.window = window;
        self
    }

    /// Set the sampling policy.
    #[must_use]
    pub fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    /// Set the output image format.
    #[must_use]
    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self
    }

    /// Set JPEG quality (`1..=100`). Ignored for PNG.
    #[must_use]
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    /// Request an exact (slow) frame recount before planning.
    #[must_use]
    pub fn with_precision_count(mut self, precise: bool) -> Self {
        self.precision_count = precise;
        self
    }

    /// Path of the input video.
    pub fn video_path(&self) -> &Path {
        &self.video_path
    }

    /// Directory the per-run output folder is created in.
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// The requested time window, if any.
    pub fn window(&self) -> Option<&TimeWindow> {
        self.window.as_ref()
    }

    /// The sampling policy.
    pub fn sampling(&self) -> Sampling {
        self.sampling
    }

    /// The output image format.
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// JPEG quality.
    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    /// Whether a precise frame recount was requested.
    pub fn precision_count(&self) -> bool {
        self.precision_count
    }

    /// Window start in seconds, `0.0` when no window is set.
    pub(crate) fn start_seconds(&self) -> f64 {
        self.window.map_or(0.0, |window| window.start_seconds)
    }

    /// Window end in seconds, if any.
    pub(crate) fn end_seconds(&self) -> Option<f64> {
        self.window.and_then(|window| window.end_seconds)
    }

    /// Validate everything that does not touch the filesystem.
    pub(crate) fn validate_parameters(&self) -> Result<(), ExtractionError> {
        if let Some(window) = &self.window {
            window.validate()?;
        }
        self.sampling.validate()?;
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ExtractionError::InvalidJpegQuality(self.jpeg_quality));
        }
        Ok(())
    }
}

/// Which decode backends the orchestrator may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendPreference {
    /// Prefer the hardware backend when available, falling back to software.
    #[default]
    Auto,
    /// Never try the hardware backend.
    SoftwareOnly,
}

/// PNG compression effort used by the software backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PngCompression {
    /// Fast compression, larger files. This is the default.
    #[default]
    Fast,
    /// Balanced compression.
    Default,
    /// Smallest files, slowest.
    Best,
}

impl PngCompression {
    /// The equivalent zlib level passed to the external decoder.
    pub(crate) fn zlib_level(self) -> u8 {
        match self {
            PngCompression::Fast => 3,
            PngCompression::Default => 6,
            PngCompression::Best => 9,
        }
    }
}

/// Engine tuning.
///
/// All fields have sensible defaults; a default-constructed value prefers the
/// hardware backend, discovers `ffmpeg`/`ffprobe` automatically and reports
/// software progress every 10 saved frames.
#[derive(Clone)]
pub struct ExtractorOptions {
    pub(crate) backend: BackendPreference,
    pub(crate) ffmpeg_path: Option<PathBuf>,
    pub(crate) ffprobe_path: Option<PathBuf>,
    pub(crate) progress_batch_size: u64,
    pub(crate) png_compression: PngCompression,
    pub(crate) channel_capacity: usize,
}

impl Debug for ExtractorOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ExtractorOptions")
            .field("backend", &self.backend)
            .field("ffmpeg_path", &self.ffmpeg_path)
            .field("ffprobe_path", &self.ffprobe_path)
            .field("progress_batch_size", &self.progress_batch_size)
            .field("png_compression", &self.png_compression)
            .field("channel_capacity", &self.channel_capacity)
            .finish()
    }
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractorOptions {
    /// Default software progress throttle.
    pub const DEFAULT_PROGRESS_BATCH_SIZE: u64 = 10;
    /// Default worker event channel capacity.
    pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            backend: BackendPreference::Auto,
            ffmpeg_path: None,
            ffprobe_path: None,
            progress_batch_size: Self::DEFAULT_PROGRESS_BATCH_SIZE,
            png_compression: PngCompression::default(),
            channel_capacity: Self::DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Choose which backends may run.
    #[must_use]
    pub fn with_backend(mut self, backend: BackendPreference) -> Self {
        self.backend = backend;
        self
    }

    /// Use a specific `ffmpeg` executable for the hardware backend.
    #[must_use]
    pub fn with_ffmpeg_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.ffmpeg_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Use a specific `ffprobe` executable for probing.
    #[must_use]
    pub fn with_ffprobe_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.ffprobe_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Report software progress every `size` saved frames. Clamped to a
    /// minimum of 1.
    #[must_use]
    pub fn with_progress_batch_size(mut self, size: u64) -> Self {
        self.progress_batch_size = size.max(1);
        self
    }

    /// Set the PNG compression effort.
    #[must_use]
    pub fn with_png_compression(mut self, compression: PngCompression) -> Self {
        self.png_compression = compression;
        self
    }

    /// Set the capacity of the bounded event channel used by
    /// [`Extractor::spawn`](crate::Extractor::spawn). Clamped to at least 1.
    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// The configured backend preference.
    pub fn backend(&self) -> BackendPreference {
        self.backend
    }
}
