//! # frame2img
//!
//! Extract still-image frames from video files.
//!
//! `frame2img` saves the frames of a video, optionally restricted to a time
//! window and thinned out by a sampling policy, as numbered PNG or JPEG files
//! in a fresh output folder. Decoding prefers an external `ffmpeg` with CUDA
//! acceleration and falls back to in-process CPU decoding through
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) when the GPU path is
//! unavailable or fails.
//!
//! ## Quick Start
//!
//! ```no_run
//! use frame2img::{ExtractionRequest, Extractor, ExtractorOptions};
//!
//! let extractor = Extractor::new(ExtractorOptions::new());
//! let result = extractor
//!     .spawn(ExtractionRequest::new("input.mp4", "frames"))?
//!     .wait();
//!
//! println!("{}", result.detailed_message());
//! # Ok::<(), frame2img::ExtractionError>(())
//! ```
//!
//! ### Window and sampling
//!
//! ```no_run
//! use frame2img::{
//!     ExtractionRequest, Extractor, ExtractorOptions, ImageFormat, Sampling, TimeWindow,
//!     timecode::parse_timecode,
//! };
//!
//! let start = parse_timecode("00:01:30")?.unwrap_or(0.0);
//! let end = parse_timecode("1:45.5")?;
//!
//! let request = ExtractionRequest::new("input.mp4", "frames")
//!     .with_window(TimeWindow::new(start, end))
//!     .with_sampling(Sampling::EverySeconds(0.5))
//!     .with_format(ImageFormat::Jpeg)
//!     .with_jpeg_quality(90);
//!
//! let result = Extractor::new(ExtractorOptions::new()).spawn(request)?.wait();
//! # Ok::<(), frame2img::ExtractionError>(())
//! ```
//!
//! ## Output layout
//!
//! `<output root>/<video stem>_frames[_N]/frame_<index>.<png|jpg>`, where the
//! index starts at 1, has no gaps, and is zero-padded to the digits of the
//! planned frame count (6 when unknown).
//!
//! ## Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `async` | [`ExtractionStream`] for consuming events from Tokio |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed to build. The hardware
//! path and metadata probing additionally use the `ffmpeg` and `ffprobe`
//! executables when they can be found.

pub mod backend;
pub mod config;
pub mod error;
pub mod extractor;
pub mod ffmpeg;
pub mod metadata;
pub mod output;
pub mod planner;
pub mod probe;
pub mod progress;
#[cfg(feature = "async")]
pub mod stream;
pub mod timecode;
mod utilities;

pub use backend::hardware::hardware_available;
pub use backend::{BackendKind, FrameBackend, HardwareBackend, SoftwareBackend};
pub use config::{
    BackendPreference, ExtractionRequest, ExtractorOptions, ImageFormat, PngCompression,
    Sampling, TimeWindow,
};
pub use error::ExtractionError;
pub use extractor::{
    ChannelObserver, ExtractionEvent, ExtractionHandle, ExtractionResult, ExtractionState,
    Extractor,
};
pub use ffmpeg::{FfmpegLogLevel, ToolLocator, set_ffmpeg_log_level};
pub use metadata::VideoMetadata;
pub use planner::{ExtractionPlan, FrameSelector};
pub use probe::MediaProbe;
pub use progress::{
    CancellationToken, ExtractionObserver, NoOpObserver, ProgressEvent, ProgressTracker,
};
#[cfg(feature = "async")]
pub use stream::ExtractionStream;
