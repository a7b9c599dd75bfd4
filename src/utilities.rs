//! Internal utility functions.
//!
//! Pixel packing and timestamp conversion for the software backend.

use ffmpeg_next::{Rational, ffi::AV_TIME_BASE, frame::Video as VideoFrame};

/// Pack the first plane of an RGB24 frame into `width × 3` bytes per row,
/// dropping any stride padding.
pub(crate) fn frame_to_rgb_buffer(video_frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let row_bytes = width as usize * 3;
    let rows = height as usize;
    let stride = video_frame.stride(0).max(row_bytes).max(1);

    let mut buffer = Vec::with_capacity(row_bytes * rows);
    for row in video_frame.data(0).chunks(stride).take(rows) {
        buffer.extend_from_slice(&row[..row_bytes.min(row.len())]);
    }
    buffer
}

/// Rescale a PTS value from stream time base to seconds.
pub(crate) fn pts_to_seconds(pts: i64, time_base: Rational) -> Option<f64> {
    if time_base.denominator() == 0 {
        return None;
    }
    Some(pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64)
}

/// Convert seconds to `AV_TIME_BASE` units, as expected by container-level
/// seeking.
pub(crate) fn seconds_to_av_timestamp(seconds: f64) -> i64 {
    (seconds * f64::from(AV_TIME_BASE)).round() as i64
}
