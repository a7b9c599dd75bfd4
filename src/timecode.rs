//! Time string parsing and formatting.
//!
//! Window bounds arrive from the caller as text. The accepted grammar is
//! `SS(.ms)`, `MM:SS(.ms)` or `HH:MM:SS(.ms)`; every component may carry a
//! fractional part and surrounding whitespace is ignored.
//!
//! # Example
//!
//! ```
//! use frame2img::timecode::{format_seconds, parse_timecode};
//!
//! assert_eq!(parse_timecode("75").unwrap(), Some(75.0));
//! assert_eq!(parse_timecode("01:15.5").unwrap(), Some(75.5));
//! assert_eq!(parse_timecode("  ").unwrap(), None);
//! assert_eq!(format_seconds(3725.0), "1:02:05");
//! ```

use crate::error::ExtractionError;

/// Parse a time string into seconds.
///
/// Blank input means "no value" and yields `Ok(None)`. Negative or
/// non-numeric components are rejected.
///
/// # Errors
///
/// Returns [`ExtractionError::InvalidTimecode`] for anything that does not
/// match the grammar.
pub fn parse_timecode(value: &str) -> Result<Option<f64>, ExtractionError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let invalid = || ExtractionError::InvalidTimecode(trimmed.to_string());

    let mut components = Vec::with_capacity(3);
    for part in trimmed.split(':') {
        let number = part.trim().parse::<f64>().map_err(|_| invalid())?;
        if !number.is_finite() || number < 0.0 {
            return Err(invalid());
        }
        components.push(number);
    }

    let seconds = match components.as_slice() {
        [seconds] => *seconds,
        [minutes, seconds] => minutes * 60.0 + seconds,
        [hours, minutes, seconds] => hours * 3600.0 + minutes * 60.0 + seconds,
        _ => return Err(invalid()),
    };

    Ok(Some(seconds))
}

/// Render a number of seconds as `M:SS` or `H:MM:SS`.
///
/// Values are rounded to whole seconds; negative and non-finite values
/// render as `0:00` and `--:--` respectively.
pub fn format_seconds(seconds: f64) -> String {
    if !seconds.is_finite() {
        return "--:--".to_string();
    }

    let total = seconds.max(0.0).round() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}
