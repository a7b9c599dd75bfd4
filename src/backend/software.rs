//! Software backend: in-process decoding with the FFmpeg libraries.
//!
//! Frames are pulled one at a time from [`SoftwareDecoder`], filtered by the
//! window and a [`FrameSelector`], converted to RGB24 and encoded by the
//! `image` crate. File names follow saved order, so sampled output is always
//! densely numbered from 1.
//!
//! The demuxer, decoder and scaler are owned by [`SoftwareDecoder`] and
//! released when it drops, on every exit path.

use std::path::Path;

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    ffi::{AV_NOPTS_VALUE, AV_TIME_BASE},
    format::{self, Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};

use crate::backend::{BackendJob, BackendKind, BackendOutcome, FrameBackend};
use crate::config::PngCompression;
use crate::error::ExtractionError;
use crate::output::FrameWriter;
use crate::planner::FrameSelector;
use crate::progress::{CancellationToken, ProgressTracker};
use crate::utilities::{frame_to_rgb_buffer, pts_to_seconds, seconds_to_av_timestamp};

/// Frames this close before the window start still count as inside it.
const WINDOW_TOLERANCE: f64 = 1e-6;

/// Runs extraction by decoding on the CPU.
#[derive(Debug, Clone, Default)]
pub struct SoftwareBackend {
    png_compression: PngCompression,
}

impl SoftwareBackend {
    /// Create a software backend.
    pub fn new(png_compression: PngCompression) -> Self {
        Self { png_compression }
    }
}

impl FrameBackend for SoftwareBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Software
    }

    fn run(
        &self,
        job: &BackendJob<'_>,
        progress: &mut ProgressTracker,
        cancel: &CancellationToken,
    ) -> Result<BackendOutcome, ExtractionError> {
        let request = job.request;
        let start = request.start_seconds();
        let end = request.end_seconds();

        let mut decoder = SoftwareDecoder::open(request.video_path())?;

        if start > 0.0 {
            if let Err(error) = decoder.seek(start) {
                log::warn!("Seek to {start:.3}s failed, decoding from the beginning: {error}");
            }
        }

        let rate = job
            .metadata
            .known_frame_rate()
            .or_else(|| decoder.frame_rate());
        let end_offset = end.and_then(|end| rate.map(|rate| ((end - start) * rate).round() as u64));

        let mut selector = FrameSelector::new(request.sampling());
        let mut writer = FrameWriter::new(
            &job.plan.output_directory,
            job.plan.filename_pad_width,
            request.format(),
            request.jpeg_quality(),
            self.png_compression,
        );

        progress.start();

        let mut index: u64 = 0;
        let mut saved: u64 = 0;

        loop {
            if cancel.is_cancelled() {
                log::info!("Software decoding cancelled after {saved} frame(s)");
                return Ok(BackendOutcome::canceled(saved));
            }

            let Some(frame) = decoder.next_frame()? else {
                break;
            };

            if frame
                .timestamp
                .is_some_and(|timestamp| timestamp + WINDOW_TOLERANCE < start)
            {
                continue;
            }
            if end_offset.is_some_and(|limit| index >= limit) {
                break;
            }
            if let (Some(timestamp), Some(end)) = (frame.timestamp, end) {
                if timestamp >= end {
                    break;
                }
            }

            if selector.should_save(index, frame.timestamp, rate) {
                let rgb = decoder.convert_current()?;
                writer.write_rgb(&rgb, decoder.width, decoder.height)?;
                saved += 1;
                progress.advance();
            }

            index += 1;
        }

        log::debug!("Software decoding finished: {saved} frame(s) from {index} decoded");
        Ok(BackendOutcome::completed(saved))
    }
}

/// Presentation time of a decoded frame, when the stream provides one.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DecodedFrame {
    pub(crate) timestamp: Option<f64>,
}

/// Pull-based decoder for the best video stream of a file.
pub(crate) struct SoftwareDecoder {
    input: Input,
    decoder: VideoDecoder,
    scaler: ScalingContext,
    stream_index: usize,
    time_base: Rational,
    start_time: i64,
    frame_rate: Option<f64>,
    width: u32,
    height: u32,
    decoded: VideoFrame,
    converted: VideoFrame,
    eof_sent: bool,
}

impl SoftwareDecoder {
    pub(crate) fn open(path: &Path) -> Result<Self, ExtractionError> {
        log::debug!("Opening {} for software decoding", path.display());

        let open_error = |reason: String| ExtractionError::FileOpen {
            path: path.to_path_buf(),
            reason,
        };

        ffmpeg_next::init()
            .map_err(|error| open_error(format!("FFmpeg initialisation failed: {error}")))?;
        let input = format::input(&path).map_err(|error| open_error(error.to_string()))?;

        let stream = input
            .streams()
            .best(Type::Video)
            .ok_or(ExtractionError::NoVideoStream)?;
        let stream_index = stream.index();
        let time_base = stream.time_base();
        let start_time = stream.start_time();
        let frame_rate = rational_to_rate(stream.avg_frame_rate())
            .or_else(|| rational_to_rate(stream.rate()));

        let decoder = CodecContext::from_parameters(stream.parameters())?
            .decoder()
            .video()?;
        let width = decoder.width();
        let height = decoder.height();

        let scaler = ScalingContext::get(
            decoder.format(),
            width,
            height,
            Pixel::RGB24,
            width,
            height,
            ScalingFlags::BILINEAR,
        )?;

        Ok(Self {
            input,
            decoder,
            scaler,
            stream_index,
            time_base,
            start_time,
            frame_rate,
            width,
            height,
            decoded: VideoFrame::empty(),
            converted: VideoFrame::empty(),
            eof_sent: false,
        })
    }

    pub(crate) fn frame_rate(&self) -> Option<f64> {
        self.frame_rate
    }

    /// Absolute time of the stream's first frame.
    fn start_seconds(&self) -> f64 {
        if self.start_time == AV_NOPTS_VALUE {
            return 0.0;
        }
        pts_to_seconds(self.start_time, self.time_base).unwrap_or(0.0)
    }

    /// Seek to the keyframe at or before `seconds`, counted from the first
    /// presentation time of the stream.
    pub(crate) fn seek(&mut self, seconds: f64) -> Result<(), ExtractionError> {
        let timestamp = seconds_to_av_timestamp(seconds + self.start_seconds());
        self.input.seek(timestamp, ..timestamp)?;
        self.decoder.flush();
        Ok(())
    }

    /// Decode the next frame. `Ok(None)` means end of stream.
    pub(crate) fn next_frame(&mut self) -> Result<Option<DecodedFrame>, ExtractionError> {
        loop {
            if self.decoder.receive_frame(&mut self.decoded).is_ok() {
                let timestamp = self
                    .decoded
                    .timestamp()
                    .or_else(|| self.decoded.pts())
                    .and_then(|pts| presentation_seconds(pts, self.start_time, self.time_base));
                return Ok(Some(DecodedFrame { timestamp }));
            }

            if self.eof_sent {
                return Ok(None);
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() == self.stream_index {
                        if let Err(error) = self.decoder.send_packet(&packet) {
                            log::warn!("Skipping undecodable packet: {error}");
                        }
                    }
                }
                Err(FfmpegError::Eof) => {
                    self.decoder.send_eof()?;
                    self.eof_sent = true;
                }
                Err(_) => {}
            }
        }
    }

    /// Convert the most recently decoded frame to packed RGB24.
    pub(crate) fn convert_current(&mut self) -> Result<Vec<u8>, ExtractionError> {
        self.scaler
            .run(&self.decoded, &mut self.converted)
            .map_err(ExtractionError::VideoDecodeError)?;
        Ok(frame_to_rgb_buffer(&self.converted, self.width, self.height))
    }
}

/// Seconds from the stream's first presentation time to `pts`.
///
/// `start_time` is the stream's start in the same time base, or
/// `AV_NOPTS_VALUE` when the stream has none, in which case `pts` is taken
/// as-is. Returns `None` for a degenerate time base.
pub fn presentation_seconds(pts: i64, start_time: i64, time_base: Rational) -> Option<f64> {
    let origin = if start_time == AV_NOPTS_VALUE {
        0
    } else {
        start_time
    };
    pts_to_seconds(pts.saturating_sub(origin), time_base)
}

/// Total frame count as the FFmpeg libraries see it.
///
/// Uses the stream's reported count when present (exact), otherwise
/// `duration × rate` (estimate). Returns `None` when the file cannot be
/// opened or neither is known.
pub fn library_frame_count(path: &Path) -> Option<(u64, bool)> {
    ffmpeg_next::init().ok()?;
    let input = format::input(&path).ok()?;
    let stream = input.streams().best(Type::Video)?;

    let reported = stream.frames();
    if reported > 0 {
        return Some((reported as u64, true));
    }

    let rate = rational_to_rate(stream.avg_frame_rate()).or_else(|| rational_to_rate(stream.rate()))?;
    let duration = input.duration();
    if duration <= 0 {
        return None;
    }
    let seconds = duration as f64 / f64::from(AV_TIME_BASE);
    let estimate = (seconds * rate).round() as u64;
    (estimate > 0).then_some((estimate, false))
}

fn rational_to_rate(rational: Rational) -> Option<f64> {
    (rational.numerator() > 0 && rational.denominator() > 0)
        .then(|| f64::from(rational.numerator()) / f64::from(rational.denominator()))
}
