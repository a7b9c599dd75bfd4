//! Progress reporting and cancellation support.
//!
//! This module provides [`ExtractionObserver`] for monitoring a run,
//! [`CancellationToken`] for cooperative cancellation, and [`ProgressEvent`]
//! for progress snapshots.
//!
//! Within one backend attempt `frames_saved` never decreases and never
//! exceeds a known `frames_planned`. After a hardware failure the software
//! backend starts attempt 2 from zero; the fallback notice arrives through
//! [`ExtractionObserver::on_status`] before any attempt-2 event.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use frame2img::{
//!     ExtractionObserver, ExtractionRequest, Extractor, ExtractorOptions, ProgressEvent,
//! };
//!
//! struct PrintProgress;
//!
//! impl ExtractionObserver for PrintProgress {
//!     fn on_progress(&self, event: &ProgressEvent) {
//!         match event.percentage() {
//!             Some(pct) => println!("{pct:.1}% ({} frames)", event.frames_saved),
//!             None => println!("{} frames", event.frames_saved),
//!         }
//!     }
//!
//!     fn on_status(&self, message: &str) {
//!         println!("{message}");
//!     }
//! }
//!
//! let extractor = Extractor::new(ExtractorOptions::new());
//! let request = ExtractionRequest::new("input.mp4", "out");
//! let result = extractor.run(&request, Arc::new(PrintProgress), &Default::default());
//! println!("{result}");
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

use crate::backend::BackendKind;

/// A snapshot of extraction progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Frames written so far in this attempt.
    pub frames_saved: u64,
    /// Frames the plan expects; `0` means unknown.
    pub frames_planned: u64,
    /// The backend producing the frames.
    pub backend: BackendKind,
    /// 1 for the first backend, 2 after a fallback.
    pub attempt: u8,
    /// Wall-clock time since this attempt started.
    pub elapsed: Duration,
    /// Estimated time remaining, when the plan is known.
    pub estimated_remaining: Option<Duration>,
}

impl ProgressEvent {
    /// Completion percentage (0.0 – 100.0), if the plan is known.
    pub fn percentage(&self) -> Option<f32> {
        (self.frames_planned > 0)
            .then(|| (self.frames_saved as f32 / self.frames_planned as f32) * 100.0)
    }

    /// Average throughput of this attempt.
    pub fn frames_per_second(&self) -> f64 {
        let seconds = self.elapsed.as_secs_f64();
        if seconds > 0.0 {
            self.frames_saved as f64 / seconds
        } else {
            0.0
        }
    }
}

/// Trait for receiving progress and status updates during a run.
///
/// Implementations must be [`Send`] and [`Sync`] because the engine calls
/// them from its worker thread.
///
/// Observers are **infallible**: they watch but cannot halt the run. Use
/// [`CancellationToken`] for cooperative cancellation.
pub trait ExtractionObserver: Send + Sync {
    /// Called with throttled progress snapshots.
    fn on_progress(&self, event: &ProgressEvent);

    /// Called with user-facing status text, e.g. the fallback notice.
    fn on_status(&self, _message: &str) {}
}

/// An observer that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl ExtractionObserver for NoOpObserver {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clone this token and share it between threads; call
/// [`cancel`](CancellationToken::cancel) from any thread to request
/// cancellation. Backends check
/// [`is_cancelled`](CancellationToken::is_cancelled) once per decoded frame
/// or per line of decoder output.
///
/// # Example
///
/// ```
/// use frame2img::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation.
    ///
    /// All clones of this token will observe the cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks one backend attempt and emits throttled, clamped, monotonic
/// progress events.
pub struct ProgressTracker {
    observer: Arc<dyn ExtractionObserver>,
    backend: BackendKind,
    attempt: u8,
    planned: u64,
    batch_size: u64,
    start_time: Instant,
    saved: u64,
    last_reported: Option<u64>,
}

impl ProgressTracker {
    /// Create a tracker for one attempt.
    pub fn new(
        observer: Arc<dyn ExtractionObserver>,
        backend: BackendKind,
        attempt: u8,
        planned: u64,
        batch_size: u64,
    ) -> Self {
        Self {
            observer,
            backend,
            attempt,
            planned,
            batch_size: batch_size.max(1),
            start_time: Instant::now(),
            saved: 0,
            last_reported: None,
        }
    }

    /// Frames saved so far (unclamped).
    pub fn saved(&self) -> u64 {
        self.saved
    }

    /// Emit the initial `0 / planned` event.
    pub fn start(&mut self) {
        self.report();
    }

    /// Record one saved frame and report on every batch boundary and when
    /// the plan is reached.
    pub fn advance(&mut self) {
        self.saved += 1;
        if self.saved % self.batch_size == 0 || self.saved == self.planned {
            self.report();
        }
    }

    /// Record an externally observed running counter.
    ///
    /// Counters that go backwards are ignored. A report is emitted whenever
    /// the clamped value changes.
    pub fn set_saved(&mut self, frames: u64) {
        if frames > self.saved {
            self.saved = frames;
            self.report();
        }
    }

    /// Unconditionally emit a final report.
    pub fn finish(&mut self) {
        self.last_reported = None;
        self.report();
    }

    fn clamped(&self) -> u64 {
        if self.planned > 0 {
            self.saved.min(self.planned)
        } else {
            self.saved
        }
    }

    fn report(&mut self) {
        let current = self.clamped();
        if self.last_reported == Some(current) {
            return;
        }
        self.last_reported = Some(current);

        let elapsed = self.start_time.elapsed();

        let estimated_remaining = (current > 0 && self.planned > 0).then(|| {
            let remaining = self.planned.saturating_sub(current);
            elapsed.mul_f64(remaining as f64 / current as f64)
        });

        let event = ProgressEvent {
            frames_saved: current,
            frames_planned: self.planned,
            backend: self.backend,
            attempt: self.attempt,
            elapsed,
            estimated_remaining,
        };

        self.observer.on_progress(&event);
    }
}
