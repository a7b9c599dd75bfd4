//! Error types for the `frame2img` crate.
//!
//! This module defines [`ExtractionError`], the unified error type returned by
//! every fallible operation in the engine. Variants fall into four groups:
//!
//! - **validation** errors, raised before any backend starts and never retried;
//! - **recoverable** backend errors, which make the orchestrator fall back from
//!   the hardware backend to the software backend;
//! - **fatal** backend errors, which abort the run;
//! - the engine-level catch-all for a panicking worker.
//!
//! Cancellation is deliberately *not* an error: it is a terminal outcome of its
//! own ([`ExtractionResult::Canceled`](crate::ExtractionResult::Canceled)).

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `frame2img` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExtractionError {
    /// The input video does not exist or is not a regular file.
    #[error("Video not found: {path}")]
    VideoNotFound {
        /// Path that was submitted in the request.
        path: PathBuf,
    },

    /// The output root directory is missing or cannot be written to.
    #[error("Output folder not writable at {path}: {reason}")]
    OutputNotWritable {
        /// The output root directory.
        path: PathBuf,
        /// Why the write test failed.
        reason: String,
    },

    /// The time window has `end <= start` (or a negative / non-finite bound).
    #[error("Invalid time window: end ({end:.3}s) must be greater than start ({start:.3}s)")]
    InvalidTimeWindow {
        /// Window start in seconds.
        start: f64,
        /// Window end in seconds.
        end: f64,
    },

    /// A sampling parameter is out of range.
    #[error("Invalid sampling: {0}")]
    InvalidSampling(String),

    /// JPEG quality outside `1..=100`.
    #[error("JPEG quality must be within 1..=100, got {0}")]
    InvalidJpegQuality(u8),

    /// A time string did not match `SS(.ms)`, `MM:SS(.ms)` or `HH:MM:SS(.ms)`.
    #[error("Invalid time value: {0:?}")]
    InvalidTimecode(String),

    /// The external hardware decoder failed. Recoverable: the orchestrator
    /// retries the same request with the software backend.
    #[error("Hardware decoder failed ({status}){}", format_stderr(.stderr))]
    HardwareBackendFailed {
        /// Exit status or spawn failure description.
        status: String,
        /// Tail of the decoder's standard error, if any was captured.
        stderr: String,
    },

    /// The video could not be opened for software decoding.
    #[error("Failed to open video at {path}: {reason}")]
    FileOpen {
        /// The video path.
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The file does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// A video frame could not be decoded or converted.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(#[source] FfmpegError),

    /// An extracted frame could not be written to disk. I/O failures arrive
    /// as [`ImageError::IoError`].
    #[error("Failed to write frame to {path}: {source}")]
    FrameWrite {
        /// Destination image path.
        path: PathBuf,
        /// Underlying encoder or I/O error.
        #[source]
        source: ImageError,
    },

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(#[from] FfmpegError),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// The extraction worker panicked. The payload message is preserved.
    #[error("Extraction worker panicked: {0}")]
    WorkerPanicked(String),
}

impl ExtractionError {
    /// Returns `true` for input validation errors, which are surfaced before
    /// any backend starts.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ExtractionError::VideoNotFound { .. }
                | ExtractionError::OutputNotWritable { .. }
                | ExtractionError::InvalidTimeWindow { .. }
                | ExtractionError::InvalidSampling(_)
                | ExtractionError::InvalidJpegQuality(_)
                | ExtractionError::InvalidTimecode(_)
        )
    }

    /// Returns `true` when the orchestrator may retry with the software
    /// backend.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ExtractionError::HardwareBackendFailed { .. })
    }
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(":\n{trimmed}")
    }
}
