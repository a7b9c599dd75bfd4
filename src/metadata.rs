//! Video metadata types.
//!
//! [`VideoMetadata`] is produced once per extraction request by the
//! [`probe`](crate::probe) module and shared read-only by the planner and the
//! decode backends. Every field except the frame count may be absent: a
//! failed probe yields [`VideoMetadata::unknown`], never an error.

use std::fmt::Write as _;

use crate::timecode::format_seconds;

/// Container and stream facts for the first video stream of a file.
///
/// # Example
///
/// ```
/// use frame2img::VideoMetadata;
///
/// let metadata = VideoMetadata {
///     duration_seconds: Some(10.0),
///     frame_rate: Some(30.0),
///     frame_count: 300,
///     frame_count_exact: true,
///     width: Some(1920),
///     height: Some(1080),
///     codec_name: Some("h264".to_string()),
/// };
/// assert!(metadata.summary().contains("1920x1080"));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[must_use]
pub struct VideoMetadata {
    /// Container duration in seconds.
    pub duration_seconds: Option<f64>,
    /// Frames per second (average rate, falling back to the nominal rate).
    pub frame_rate: Option<f64>,
    /// Total number of frames; `0` means unknown.
    pub frame_count: u64,
    /// `true` when `frame_count` was reported or counted directly, `false`
    /// when it is a `duration × frame_rate` estimate.
    pub frame_count_exact: bool,
    /// Frame width in pixels.
    pub width: Option<u32>,
    /// Frame height in pixels.
    pub height: Option<u32>,
    /// Codec name (e.g. `"h264"`, `"vp9"`).
    pub codec_name: Option<String>,
}

impl VideoMetadata {
    /// The all-absent record returned when probing fails.
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Returns `true` if nothing at all is known about the video.
    pub fn is_unknown(&self) -> bool {
        *self == Self::default()
    }

    /// Frame rate, if known and strictly positive.
    pub fn known_frame_rate(&self) -> Option<f64> {
        self.frame_rate.filter(|rate| rate.is_finite() && *rate > 0.0)
    }

    /// Duration, if known and strictly positive.
    pub fn known_duration(&self) -> Option<f64> {
        self.duration_seconds
            .filter(|duration| duration.is_finite() && *duration > 0.0)
    }

    /// Replace the frame count, e.g. with a precise recount or a
    /// software-library count.
    pub fn with_frame_count(mut self, frame_count: u64, exact: bool) -> Self {
        self.frame_count = frame_count;
        self.frame_count_exact = exact && frame_count > 0;
        self
    }

    /// One-line human readable description.
    ///
    /// Unknown fields are omitted. Estimated frame counts are labelled
    /// `approx.`.
    pub fn summary(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        if let (Some(width), Some(height)) = (self.width, self.height) {
            parts.push(format!("{width}x{height}"));
        }
        if let Some(rate) = self.known_frame_rate() {
            parts.push(format!("{rate:.3} fps"));
        }
        if let Some(codec) = &self.codec_name {
            parts.push(codec.clone());
        }
        if let Some(duration) = self.known_duration() {
            parts.push(format_seconds(duration));
        }
        if self.frame_count > 0 {
            let mut frames = format!("{} frames", self.frame_count);
            if !self.frame_count_exact {
                let _ = write!(frames, " (approx.)");
            }
            parts.push(frames);
        }

        if parts.is_empty() {
            "metadata unavailable".to_string()
        } else {
            parts.join(" • ")
        }
    }
}
