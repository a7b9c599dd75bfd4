//! Decode backends.
//!
//! A backend turns a planned run into image files on disk. Two exist:
//!
//! - [`HardwareBackend`] drives an external `ffmpeg` process with CUDA
//!   decoding and lets it write the images itself.
//! - [`SoftwareBackend`] decodes in-process with the FFmpeg libraries and
//!   encodes each selected frame with the `image` crate.
//!
//! Both implement [`FrameBackend`]; the orchestrator picks one per attempt
//! through the [`Backend`] enum and falls back from hardware to software at
//! most once.

pub mod hardware;
pub mod software;

use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::config::ExtractionRequest;
use crate::error::ExtractionError;
use crate::metadata::VideoMetadata;
use crate::planner::ExtractionPlan;
use crate::progress::{CancellationToken, ProgressTracker};

pub use hardware::HardwareBackend;
pub use software::SoftwareBackend;

/// Which decode path produced a set of frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// External decoder with GPU decoding.
    Hardware,
    /// In-process CPU decoding.
    Software,
}

impl Display for BackendKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            BackendKind::Hardware => write!(f, "hardware"),
            BackendKind::Software => write!(f, "software"),
        }
    }
}

/// Everything a backend reads during one attempt.
#[derive(Debug, Clone, Copy)]
pub struct BackendJob<'a> {
    /// The caller's request.
    pub request: &'a ExtractionRequest,
    /// The plan computed for this run.
    pub plan: &'a ExtractionPlan,
    /// Metadata probed for this run.
    pub metadata: &'a VideoMetadata,
}

/// How a backend attempt ended, short of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendOutcome {
    /// Image files written by this attempt.
    pub frames_saved: u64,
    /// `true` if the attempt stopped because of a cancellation request.
    pub canceled: bool,
}

impl BackendOutcome {
    pub(crate) fn completed(frames_saved: u64) -> Self {
        Self {
            frames_saved,
            canceled: false,
        }
    }

    pub(crate) fn canceled(frames_saved: u64) -> Self {
        Self {
            frames_saved,
            canceled: true,
        }
    }
}

/// The capability set shared by all decode backends.
///
/// Implementations write frames for `job` into the plan's output directory,
/// report every saved frame through `progress`, honour the window and the
/// sampling policy, and check `cancel` at each of their suspension points.
pub trait FrameBackend {
    /// Which backend this is.
    fn kind(&self) -> BackendKind;

    /// Run one attempt.
    ///
    /// # Errors
    ///
    /// Recoverable failures ([`ExtractionError::is_recoverable`]) let the
    /// orchestrator retry with another backend; anything else aborts the run.
    fn run(
        &self,
        job: &BackendJob<'_>,
        progress: &mut ProgressTracker,
        cancel: &CancellationToken,
    ) -> Result<BackendOutcome, ExtractionError>;
}

/// A backend selected for one attempt.
#[derive(Debug, Clone)]
pub enum Backend {
    /// See [`HardwareBackend`].
    Hardware(HardwareBackend),
    /// See [`SoftwareBackend`].
    Software(SoftwareBackend),
}

impl FrameBackend for Backend {
    fn kind(&self) -> BackendKind {
        match self {
            Backend::Hardware(backend) => backend.kind(),
            Backend::Software(backend) => backend.kind(),
        }
    }

    fn run(
        &self,
        job: &BackendJob<'_>,
        progress: &mut ProgressTracker,
        cancel: &CancellationToken,
    ) -> Result<BackendOutcome, ExtractionError> {
        match self {
            Backend::Hardware(backend) => backend.run(job, progress, cancel),
            Backend::Software(backend) => backend.run(job, progress, cancel),
        }
    }
}
