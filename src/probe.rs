//! Metadata probing through `ffprobe`.
//!
//! [`MediaProbe`] runs the external `ffprobe` tool against the first video
//! stream of a file and turns its JSON report into a [`VideoMetadata`].
//! Probing never fails: a missing tool, a non-zero exit or unparsable output
//! all degrade to [`VideoMetadata::unknown`], and callers treat absent fields
//! as "unknown".
//!
//! The exact frame recount ([`MediaProbe::probe_precise_frame_count`])
//! decodes every packet and can take as long as the video itself. It is only
//! ever run on explicit request.
//!
//! # Example
//!
//! ```no_run
//! use frame2img::MediaProbe;
//!
//! let probe = MediaProbe::new();
//! let metadata = probe.probe_metadata("input.mp4");
//! println!("{}", metadata.summary());
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::ffmpeg::{ToolLocator, hidden_command};
use crate::metadata::VideoMetadata;

#[derive(Debug, Default, Deserialize)]
struct ProbeReport {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: Option<ProbeFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeStream {
    #[serde(default)]
    nb_frames: Option<String>,
    #[serde(default)]
    nb_read_frames: Option<String>,
    #[serde(default)]
    avg_frame_rate: Option<String>,
    #[serde(default)]
    r_frame_rate: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    codec_name: Option<String>,
    #[serde(default)]
    duration: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    #[serde(default)]
    duration: Option<String>,
}

/// Reads container and stream facts with the external `ffprobe` tool.
#[derive(Debug, Clone, Default)]
pub struct MediaProbe {
    ffprobe: Option<PathBuf>,
}

impl MediaProbe {
    /// Create a probe using the default tool lookup.
    pub fn new() -> Self {
        Self::with_locator(&ToolLocator::new())
    }

    /// Create a probe using a configured [`ToolLocator`].
    pub fn with_locator(locator: &ToolLocator) -> Self {
        let ffprobe = locator.ffprobe();
        if ffprobe.is_none() {
            log::warn!("ffprobe not found; video metadata will be unavailable");
        }
        Self { ffprobe }
    }

    /// Returns `true` if an `ffprobe` executable was found.
    pub fn is_available(&self) -> bool {
        self.ffprobe.is_some()
    }

    /// Probe duration, frame rate, frame count, geometry and codec of the
    /// first video stream.
    ///
    /// Any failure yields [`VideoMetadata::unknown`].
    pub fn probe_metadata<P: AsRef<Path>>(&self, path: P) -> VideoMetadata {
        let path = path.as_ref();
        let entries = "stream=nb_frames,avg_frame_rate,r_frame_rate,width,height,codec_name,duration:format=duration";

        match self.run(path, &["-show_entries", entries]) {
            Some(output) => {
                let metadata = parse_probe_output(&output);
                log::debug!("Probed {}: {}", path.display(), metadata.summary());
                metadata
            }
            None => VideoMetadata::unknown(),
        }
    }

    /// Count frames exactly by decoding the whole stream.
    ///
    /// Returns `0` when the count is unavailable.
    pub fn probe_precise_frame_count<P: AsRef<Path>>(&self, path: P) -> u64 {
        let path = path.as_ref();
        log::info!("Counting frames precisely in {}", path.display());

        self.run(
            path,
            &["-count_frames", "-show_entries", "stream=nb_read_frames"],
        )
        .and_then(|output| parse_precise_frame_count(&output))
        .unwrap_or(0)
    }

    fn run(&self, path: &Path, query: &[&str]) -> Option<String> {
        let ffprobe = self.ffprobe.as_ref()?;

        let output = hidden_command(ffprobe)
            .args(["-v", "error", "-select_streams", "v:0"])
            .args(query)
            .args(["-of", "json"])
            .arg(path)
            .output();

        match output {
            Ok(output) if output.status.success() => {
                Some(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(output) => {
                log::warn!(
                    "ffprobe exited with {} for {}: {}",
                    output.status,
                    path.display(),
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                None
            }
            Err(error) => {
                log::warn!("Failed to run {}: {error}", ffprobe.display());
                None
            }
        }
    }
}

/// Parse an `ffprobe -of json` report into [`VideoMetadata`].
///
/// The frame rate prefers `avg_frame_rate` and falls back to `r_frame_rate`.
/// A numeric `nb_frames` is an exact count; otherwise the count is estimated
/// as `round(duration × rate)`. Malformed input yields
/// [`VideoMetadata::unknown`].
pub fn parse_probe_output(json: &str) -> VideoMetadata {
    let report: ProbeReport = match serde_json::from_str(json) {
        Ok(report) => report,
        Err(error) => {
            log::warn!("Could not parse ffprobe output: {error}");
            return VideoMetadata::unknown();
        }
    };

    let stream = report.streams.into_iter().next().unwrap_or_default();

    let frame_rate = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_fraction)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_fraction));

    let duration_seconds = report
        .format
        .and_then(|format| format.duration)
        .as_deref()
        .and_then(parse_positive)
        .or_else(|| stream.duration.as_deref().and_then(parse_positive));

    let reported_frames = stream
        .nb_frames
        .as_deref()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|&frames| frames > 0);

    let (frame_count, frame_count_exact) = match (reported_frames, duration_seconds, frame_rate) {
        (Some(frames), _, _) => (frames, true),
        (None, Some(duration), Some(rate)) => ((duration * rate).round() as u64, false),
        _ => (0, false),
    };

    VideoMetadata {
        duration_seconds,
        frame_rate,
        frame_count,
        frame_count_exact,
        width: stream.width.filter(|&width| width > 0),
        height: stream.height.filter(|&height| height > 0),
        codec_name: stream.codec_name.filter(|name| !name.is_empty()),
    }
}

/// Parse an `ffprobe -count_frames` report. Returns `None` when the count is
/// missing or not numeric.
pub fn parse_precise_frame_count(json: &str) -> Option<u64> {
    let report: ProbeReport = serde_json::from_str(json).ok()?;
    report
        .streams
        .first()?
        .nb_read_frames
        .as_deref()?
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|&frames| frames > 0)
}

/// Parse a rate such as `"30000/1001"` or `"25"`.
///
/// Zero denominators, zero or negative rates and non-numeric parts yield
/// `None`.
///
/// ```
/// use frame2img::probe::parse_fraction;
///
/// assert_eq!(parse_fraction("30/1"), Some(30.0));
/// assert_eq!(parse_fraction("0/0"), None);
/// assert_eq!(parse_fraction("N/A"), None);
/// ```
pub fn parse_fraction(value: &str) -> Option<f64> {
    let value = value.trim();
    let rate = match value.split_once('/') {
        Some((numerator, denominator)) => {
            let numerator = numerator.trim().parse::<f64>().ok()?;
            let denominator = denominator.trim().parse::<f64>().ok()?;
            if denominator == 0.0 {
                return None;
            }
            numerator / denominator
        }
        None => value.parse::<f64>().ok()?,
    };

    (rate.is_finite() && rate > 0.0).then_some(rate)
}

fn parse_positive(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
}
