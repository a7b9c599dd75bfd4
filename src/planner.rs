//! Range and sampling planning.
//!
//! [`plan`] turns probed metadata, an optional time window and a sampling
//! policy into an [`ExtractionPlan`]: the expected number of saved frames and
//! the zero-padding width of output file names. The plan is advisory: a
//! backend may save fewer frames (short video, early end) or, through
//! rounding, slightly more. Progress consumers clamp to it; nothing fails
//! because of it.
//!
//! [`FrameSelector`] is the per-frame counterpart used by the software
//! backend.
//!
//! # Example
//!
//! ```
//! use frame2img::{Sampling, TimeWindow, VideoMetadata, planner};
//!
//! let metadata = VideoMetadata {
//!     duration_seconds: Some(10.0),
//!     frame_rate: Some(30.0),
//!     frame_count: 300,
//!     frame_count_exact: true,
//!     ..VideoMetadata::default()
//! };
//!
//! let window = TimeWindow::new(2.0, Some(5.0));
//! let plan = planner::plan(&metadata, Some(&window), Sampling::default(), "out/clip_frames");
//! assert_eq!(plan.frames_planned, 90);
//! assert_eq!(plan.filename_pad_width, 2);
//! ```

use std::path::{Path, PathBuf};

use crate::config::{Sampling, TimeWindow};
use crate::metadata::VideoMetadata;

/// Pad width used when the planned frame count is unknown.
pub const UNKNOWN_PAD_WIDTH: usize = 6;

/// Guards `floor(d / T)` against binary representation error, so that e.g.
/// `0.3 / 0.1` counts as 3.
const SAMPLING_EPSILON: f64 = 1e-9;

/// Derived, read-only description of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionPlan {
    /// Expected number of saved frames; `0` means unknown.
    pub frames_planned: u64,
    /// Source frames inside the window before sampling; `0` means unknown.
    pub frames_in_range: u64,
    /// Digits used for the frame index in output file names.
    pub filename_pad_width: usize,
    /// Directory the frames are written to.
    pub output_directory: PathBuf,
}

impl ExtractionPlan {
    /// Returns `true` if the frame count could not be planned.
    pub fn is_indeterminate(&self) -> bool {
        self.frames_planned == 0
    }

    /// Clamp a running frame counter to the plan. Unknown plans do not clamp.
    pub fn clamp(&self, frames: u64) -> u64 {
        if self.frames_planned > 0 {
            frames.min(self.frames_planned)
        } else {
            frames
        }
    }
}

/// Compute the plan for a run.
pub fn plan<P: AsRef<Path>>(
    metadata: &VideoMetadata,
    window: Option<&TimeWindow>,
    sampling: Sampling,
    output_directory: P,
) -> ExtractionPlan {
    let start = window.map_or(0.0, |window| window.start_seconds);
    let end = window.and_then(|window| window.end_seconds);

    let in_range = frames_in_range(metadata, start, end);

    let frames_planned = match sampling {
        Sampling::EveryNthFrame(every) => in_range.div_ceil(every.max(1)),
        Sampling::EverySeconds(interval) => {
            let span = match end {
                Some(end) => Some(end - start),
                None => metadata.known_duration().map(|duration| duration - start),
            };
            time_sampled_count(span, interval)
        }
    };

    let plan = ExtractionPlan {
        frames_planned,
        frames_in_range: in_range,
        filename_pad_width: pad_width(frames_planned),
        output_directory: output_directory.as_ref().to_path_buf(),
    };

    log::debug!(
        "Planned {} frame(s) ({} in range, pad {})",
        plan.frames_planned,
        plan.frames_in_range,
        plan.filename_pad_width
    );

    plan
}

/// Number of source frames in `[start, end)`.
///
/// With a known frame rate `r`: `max(0, min(round(end·r), total) −
/// round(start·r))`, where a missing `end` means the total. Without a frame
/// rate the total frame count is returned as-is.
pub fn frames_in_range(metadata: &VideoMetadata, start: f64, end: Option<f64>) -> u64 {
    let total = metadata.frame_count;

    let Some(rate) = metadata.known_frame_rate() else {
        return total;
    };

    let start_frame = (start.max(0.0) * rate).round() as u64;
    let mut end_frame = match end {
        Some(end) => (end.max(0.0) * rate).round() as u64,
        None => total,
    };
    if total > 0 {
        end_frame = end_frame.min(total);
    }

    end_frame.saturating_sub(start_frame)
}

/// `floor(span / interval) + 1`, or `0` when the span is unknown or negative.
/// Saturates at `u64::MAX` for vanishingly small intervals.
fn time_sampled_count(span: Option<f64>, interval: f64) -> u64 {
    match span {
        Some(span) if span.is_finite() && span >= 0.0 && interval > 0.0 => {
            ((span / interval + SAMPLING_EPSILON).floor() as u64).saturating_add(1)
        }
        _ => 0,
    }
}

/// Digits needed to print `frames_planned`, or [`UNKNOWN_PAD_WIDTH`] when it
/// is `0`.
pub fn pad_width(frames_planned: u64) -> usize {
    if frames_planned == 0 {
        UNKNOWN_PAD_WIDTH
    } else {
        frames_planned.ilog10() as usize + 1
    }
}

/// Per-frame save decision for the software backend.
///
/// Frames are fed in decode order. `index` is the position of the frame
/// within the window (0 for the first frame at or after the start) and
/// `timestamp` its presentation time in seconds, when known.
#[derive(Debug, Clone)]
pub struct FrameSelector {
    sampling: Sampling,
    next_sample: Option<f64>,
}

impl FrameSelector {
    /// Create a selector for `sampling`.
    pub fn new(sampling: Sampling) -> Self {
        Self {
            sampling,
            next_sample: None,
        }
    }

    /// Decide whether the frame should be saved.
    ///
    /// Time sampling anchors its schedule to the first frame it sees and then
    /// advances by `T` on every save. Frames without a timestamp fall back to
    /// `index / rate` when `rate` is known and are otherwise saved.
    pub fn should_save(&mut self, index: u64, timestamp: Option<f64>, rate: Option<f64>) -> bool {
        match self.sampling {
            Sampling::EverySeconds(interval) => {
                let Some(time) =
                    timestamp.or_else(|| rate.map(|rate| index as f64 / rate))
                else {
                    return true;
                };

                match self.next_sample {
                    None => {
                        self.next_sample = Some(time + interval);
                        true
                    }
                    Some(next) if time + SAMPLING_EPSILON >= next => {
                        self.next_sample = Some(next + interval);
                        true
                    }
                    Some(_) => false,
                }
            }
            Sampling::EveryNthFrame(every) if every > 1 => index % every == 0,
            Sampling::EveryNthFrame(_) => true,
        }
    }
}
