//! The extraction orchestrator.
//!
//! [`Extractor`] drives one request through
//! `Idle → Probing → Planning → Decoding(Hardware) → Decoding(Software) →
//! Finalizing → Done | Canceled | Failed`:
//!
//! - the request is validated before anything else runs;
//! - metadata is probed once and shared by the planner and the backends;
//! - a fresh output directory is allocated and the run is planned;
//! - the hardware backend runs when available, and a recoverable failure
//!   falls back to the software backend exactly once, after a status notice;
//! - the final progress event and the [`ExtractionResult`] are always
//!   emitted, even when the worker panics.
//!
//! Runs can be driven synchronously with [`Extractor::run`] or on a worker
//! thread with [`Extractor::spawn`].
//!
//! # Example
//!
//! ```no_run
//! use frame2img::{ExtractionEvent, ExtractionRequest, Extractor, ExtractorOptions, Sampling};
//!
//! let extractor = Extractor::new(ExtractorOptions::new());
//! let request = ExtractionRequest::new("input.mp4", "out")
//!     .with_sampling(Sampling::EverySeconds(0.5));
//!
//! let mut handle = extractor.spawn(request)?;
//! for event in handle.events() {
//!     match event {
//!         ExtractionEvent::Progress(progress) => {
//!             println!("{}/{}", progress.frames_saved, progress.frames_planned)
//!         }
//!         ExtractionEvent::Status(message) => println!("{message}"),
//!         ExtractionEvent::Finished(result) => println!("{result}"),
//!     }
//! }
//! # Ok::<(), frame2img::ExtractionError>(())
//! ```

use std::any::Any;
use std::error::Error as StdError;
use std::fmt::{Display, Formatter, Result as FmtResult, Write as _};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::backend::software::library_frame_count;
use crate::backend::{
    Backend, BackendJob, BackendKind, BackendOutcome, FrameBackend, HardwareBackend,
    SoftwareBackend,
};
use crate::config::{ExtractionRequest, ExtractorOptions};
use crate::error::ExtractionError;
use crate::ffmpeg::ToolLocator;
use crate::metadata::VideoMetadata;
use crate::output;
use crate::planner::{self, ExtractionPlan};
use crate::probe::MediaProbe;
use crate::progress::{
    CancellationToken, ExtractionObserver, ProgressEvent, ProgressTracker,
};

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionState {
    /// Request submitted, being validated.
    Idle,
    /// Reading video metadata.
    Probing,
    /// Allocating the output directory and planning the frame count.
    Planning,
    /// A backend is writing frames.
    Decoding(BackendKind),
    /// Emitting the final progress event and result.
    Finalizing,
    /// Finished successfully.
    Done,
    /// Stopped on request.
    Canceled,
    /// Aborted by an error.
    Failed,
}

impl Display for ExtractionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ExtractionState::Idle => write!(f, "validating the request"),
            ExtractionState::Probing => write!(f, "reading video metadata"),
            ExtractionState::Planning => write!(f, "preparing the output folder"),
            ExtractionState::Decoding(kind) => write!(f, "{kind} decoding"),
            ExtractionState::Finalizing => write!(f, "finalizing"),
            ExtractionState::Done => write!(f, "done"),
            ExtractionState::Canceled => write!(f, "canceled"),
            ExtractionState::Failed => write!(f, "failed"),
        }
    }
}

/// Terminal outcome of a run.
#[derive(Debug, Clone)]
pub enum ExtractionResult {
    /// Every planned frame was written.
    Success {
        /// Directory holding the frames.
        output_dir: PathBuf,
        /// Number of image files written.
        frames_saved: u64,
    },
    /// The run was cancelled; the frames written so far are kept.
    Canceled {
        /// Directory holding the frames.
        output_dir: PathBuf,
        /// Number of image files written, equal to the files on disk.
        frames_saved: u64,
    },
    /// The run was aborted.
    Failed {
        /// The cause.
        error: Arc<ExtractionError>,
        /// The state the run was in when it failed.
        stage: ExtractionState,
    },
}

impl ExtractionResult {
    fn failed(error: ExtractionError, stage: ExtractionState) -> Self {
        ExtractionResult::Failed {
            error: Arc::new(error),
            stage,
        }
    }

    /// Returns `true` for [`ExtractionResult::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, ExtractionResult::Success { .. })
    }

    /// Returns `true` for [`ExtractionResult::Canceled`].
    pub fn is_canceled(&self) -> bool {
        matches!(self, ExtractionResult::Canceled { .. })
    }

    /// The output directory, unless the run failed.
    pub fn output_dir(&self) -> Option<&Path> {
        match self {
            ExtractionResult::Success { output_dir, .. }
            | ExtractionResult::Canceled { output_dir, .. } => Some(output_dir),
            ExtractionResult::Failed { .. } => None,
        }
    }

    /// Frames written; `0` for failed runs.
    pub fn frames_saved(&self) -> u64 {
        match self {
            ExtractionResult::Success { frames_saved, .. }
            | ExtractionResult::Canceled { frames_saved, .. } => *frames_saved,
            ExtractionResult::Failed { .. } => 0,
        }
    }

    /// The error of a failed run.
    pub fn error(&self) -> Option<&ExtractionError> {
        match self {
            ExtractionResult::Failed { error, .. } => Some(error.as_ref()),
            _ => None,
        }
    }

    /// Full description including the stage and the error's source chain.
    pub fn detailed_message(&self) -> String {
        match self {
            ExtractionResult::Failed { error, stage } => {
                let mut message = format!("Extraction failed while {stage}: {error}");
                let mut source = error.source();
                while let Some(cause) = source {
                    let _ = write!(message, "\n  caused by: {cause}");
                    source = cause.source();
                }
                message
            }
            other => other.to_string(),
        }
    }
}

impl Display for ExtractionResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ExtractionResult::Success {
                output_dir,
                frames_saved,
            } => write!(f, "Saved {frames_saved} frame(s) to {}", output_dir.display()),
            ExtractionResult::Canceled {
                output_dir,
                frames_saved,
            } => write!(
                f,
                "Canceled after {frames_saved} frame(s) in {}",
                output_dir.display()
            ),
            ExtractionResult::Failed { error, .. } => write!(f, "Extraction failed: {error}"),
        }
    }
}

/// One item of a run's event stream. `Finished` is always the last.
#[derive(Debug, Clone)]
pub enum ExtractionEvent {
    /// A progress snapshot.
    Progress(ProgressEvent),
    /// A user-facing status line.
    Status(String),
    /// The terminal result.
    Finished(ExtractionResult),
}

/// Runs extraction requests.
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    options: ExtractorOptions,
}

impl Extractor {
    /// Create an extractor with the given options.
    pub fn new(options: ExtractorOptions) -> Self {
        Self { options }
    }

    /// The options this extractor runs with.
    pub fn options(&self) -> &ExtractorOptions {
        &self.options
    }

    /// A metadata probe using this extractor's tool configuration.
    pub fn probe(&self) -> MediaProbe {
        MediaProbe::with_locator(&ToolLocator::from_options(&self.options))
    }

    /// Run `request` on the calling thread.
    ///
    /// Progress and status go to `observer`; `cancel` is checked at every
    /// backend suspension point. This never panics and never returns early
    /// without a result: a panic inside the run becomes
    /// [`ExtractionError::WorkerPanicked`].
    pub fn run(
        &self,
        request: &ExtractionRequest,
        observer: Arc<dyn ExtractionObserver>,
        cancel: &CancellationToken,
    ) -> ExtractionResult {
        let recorder = Arc::new(LastProgress::new(observer));
        let mut run = Run {
            options: &self.options,
            request,
            observer: recorder.clone(),
            cancel,
            state: ExtractionState::Idle,
            frames_planned: 0,
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| run.execute()));

        match outcome {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                log::error!("Extraction worker panicked: {message}");

                let last = recorder.last().unwrap_or_else(|| ProgressEvent {
                    frames_saved: 0,
                    frames_planned: run.frames_planned,
                    backend: match run.state {
                        ExtractionState::Decoding(kind) => kind,
                        _ => BackendKind::Software,
                    },
                    attempt: 1,
                    elapsed: Duration::ZERO,
                    estimated_remaining: None,
                });
                let delivered =
                    panic::catch_unwind(AssertUnwindSafe(|| recorder.inner.on_progress(&last)));
                if delivered.is_err() {
                    log::error!("Observer panicked while receiving the final progress event");
                }

                ExtractionResult::failed(ExtractionError::WorkerPanicked(message), run.state)
            }
        }
    }

    /// Run `request` on a dedicated worker thread.
    ///
    /// Events flow back through a bounded channel of
    /// [`ExtractorOptions::with_channel_capacity`] entries; the worker waits
    /// when the caller falls behind. Dropping the handle before the run ends
    /// cancels it.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::IoError`] if the thread cannot be spawned.
    pub fn spawn(&self, request: ExtractionRequest) -> Result<ExtractionHandle, ExtractionError> {
        let (sender, receiver) = mpsc::sync_channel(self.options.channel_capacity);
        let cancel = CancellationToken::new();

        let extractor = self.clone();
        let worker_cancel = cancel.clone();
        let thread = thread::Builder::new()
            .name("frame2img-extractor".to_string())
            .spawn(move || {
                let observer = Arc::new(ChannelObserver::new(sender.clone()));
                let result = extractor.run(&request, observer, &worker_cancel);
                let _ = sender.send(ExtractionEvent::Finished(result));
            })?;

        Ok(ExtractionHandle {
            receiver,
            cancel,
            thread: Some(thread),
            finished: None,
        })
    }
}

/// An observer that forwards everything into a bounded channel.
///
/// A disconnected receiver is ignored; the run carries on.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: SyncSender<ExtractionEvent>,
}

impl ChannelObserver {
    /// Wrap a channel sender.
    pub fn new(sender: SyncSender<ExtractionEvent>) -> Self {
        Self { sender }
    }
}

impl ExtractionObserver for ChannelObserver {
    fn on_progress(&self, event: &ProgressEvent) {
        let _ = self.sender.send(ExtractionEvent::Progress(event.clone()));
    }

    fn on_status(&self, message: &str) {
        let _ = self.sender.send(ExtractionEvent::Status(message.to_string()));
    }
}

/// Forwards to the caller's observer and remembers the last progress
/// event, so a panicked run can still close its progress stream.
struct LastProgress {
    inner: Arc<dyn ExtractionObserver>,
    last: Mutex<Option<ProgressEvent>>,
}

impl LastProgress {
    fn new(inner: Arc<dyn ExtractionObserver>) -> Self {
        Self {
            inner,
            last: Mutex::new(None),
        }
    }

    fn last(&self) -> Option<ProgressEvent> {
        match self.last.lock() {
            Ok(last) => last.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ExtractionObserver for LastProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        match self.last.lock() {
            Ok(mut last) => *last = Some(event.clone()),
            Err(poisoned) => *poisoned.into_inner() = Some(event.clone()),
        }
        self.inner.on_progress(event);
    }

    fn on_status(&self, message: &str) {
        self.inner.on_status(message);
    }
}

/// Handle to a run started with [`Extractor::spawn`].
///
/// Iterating the handle yields the run's events in order and ends after
/// [`ExtractionEvent::Finished`].
pub struct ExtractionHandle {
    receiver: Receiver<ExtractionEvent>,
    cancel: CancellationToken,
    thread: Option<JoinHandle<()>>,
    finished: Option<ExtractionResult>,
}

impl ExtractionHandle {
    /// Blocking iterator over the remaining events.
    pub fn events(&mut self) -> impl Iterator<Item = ExtractionEvent> + '_ {
        self.by_ref()
    }

    /// Next event if one is ready, without blocking.
    pub fn try_next(&mut self) -> Option<ExtractionEvent> {
        if self.finished.is_some() {
            return None;
        }
        match self.receiver.try_recv() {
            Ok(event) => Some(self.record(event)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(self.record_lost_worker()),
        }
    }

    /// Request cooperative cancellation. The run still ends with a
    /// `Finished` event.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A clone of the run's cancellation token.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Returns `true` once the terminal event has been received.
    pub fn is_finished(&self) -> bool {
        self.finished.is_some()
    }

    /// Drain the remaining events and return the terminal result.
    pub fn wait(mut self) -> ExtractionResult {
        while self.next().is_some() {}

        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }

        match &self.finished {
            Some(result) => result.clone(),
            None => lost_worker_result(),
        }
    }

    fn record(&mut self, event: ExtractionEvent) -> ExtractionEvent {
        if let ExtractionEvent::Finished(result) = &event {
            self.finished = Some(result.clone());
        }
        event
    }

    fn record_lost_worker(&mut self) -> ExtractionEvent {
        self.record(ExtractionEvent::Finished(lost_worker_result()))
    }
}

impl Iterator for ExtractionHandle {
    type Item = ExtractionEvent;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished.is_some() {
            return None;
        }
        match self.receiver.recv() {
            Ok(event) => Some(self.record(event)),
            Err(_) => Some(self.record_lost_worker()),
        }
    }
}

impl Drop for ExtractionHandle {
    fn drop(&mut self) {
        if self.finished.is_none() {
            self.cancel.cancel();
        }
    }
}

fn lost_worker_result() -> ExtractionResult {
    ExtractionResult::failed(
        ExtractionError::WorkerPanicked("worker exited without a result".to_string()),
        ExtractionState::Finalizing,
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// State of one in-flight request.
struct Run<'a> {
    options: &'a ExtractorOptions,
    request: &'a ExtractionRequest,
    observer: Arc<dyn ExtractionObserver>,
    cancel: &'a CancellationToken,
    state: ExtractionState,
    frames_planned: u64,
}

impl Run<'_> {
    fn transition(&mut self, next: ExtractionState) {
        log::debug!("Extraction state: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn status(&self, message: &str) {
        log::info!("{message}");
        self.observer.on_status(message);
    }

    fn execute(&mut self) -> ExtractionResult {
        if let Err(error) = validate(self.request) {
            log::warn!("Rejected request: {error}");
            return self.fail(error);
        }

        self.transition(ExtractionState::Probing);
        let metadata = self.probe();
        self.status(&format!("Video: {}", metadata.summary()));

        self.transition(ExtractionState::Planning);
        let root = self.request.output_root();
        let base_name = output::video_base_name(self.request.video_path());
        let output_dir = match output::allocate(root, &base_name) {
            Ok(directory) => directory,
            Err(error) => return self.fail(error),
        };
        let plan = planner::plan(
            &metadata,
            self.request.window(),
            self.request.sampling(),
            &output_dir,
        );
        self.frames_planned = plan.frames_planned;

        let job = BackendJob {
            request: self.request,
            plan: &plan,
            metadata: &metadata,
        };

        let first = match HardwareBackend::detect(self.options) {
            Some(hardware) => Backend::Hardware(hardware),
            None => Backend::Software(self.software()),
        };

        match self.attempt(&first, &job, 1) {
            Ok(finished) => finished,
            Err((error, mut tracker)) if error.is_recoverable() => {
                log::warn!("Hardware backend failed: {error}");
                tracker.finish();
                self.status(&format!(
                    "GPU decoding failed, falling back to CPU decoding…\n{error}"
                ));

                let format = self.request.format();
                if let Err(cleanup) = output::remove_frame_files(&plan.output_directory, format) {
                    log::warn!("Could not clear partial hardware output: {cleanup}");
                }

                let replanned = planner::plan(
                    &metadata,
                    self.request.window(),
                    self.request.sampling(),
                    &plan.output_directory,
                );
                log::debug!(
                    "Software attempt planned {} frame(s) into {}",
                    replanned.frames_planned,
                    replanned.output_directory.display()
                );
                self.frames_planned = replanned.frames_planned;
                let job = BackendJob {
                    request: self.request,
                    plan: &replanned,
                    metadata: &metadata,
                };

                let software = Backend::Software(self.software());
                match self.attempt(&software, &job, 2) {
                    Ok(finished) => finished,
                    Err((error, mut tracker)) => {
                        tracker.finish();
                        self.fail(error)
                    }
                }
            }
            Err((error, mut tracker)) => {
                tracker.finish();
                self.fail(error)
            }
        }
    }

    fn software(&self) -> SoftwareBackend {
        SoftwareBackend::new(self.options.png_compression)
    }

    fn probe(&self) -> VideoMetadata {
        let path = self.request.video_path();
        let probe = MediaProbe::with_locator(&ToolLocator::from_options(self.options));
        let mut metadata = probe.probe_metadata(path);

        if self.request.precision_count() {
            self.status("Counting frames precisely (this can take a while)…");
            let precise = probe.probe_precise_frame_count(path);
            if precise > 0 {
                metadata = metadata.with_frame_count(precise, true);
            }
        }

        if metadata.frame_count == 0 {
            if let Some((count, exact)) = library_frame_count(path) {
                log::debug!("Frame count from decoder library: {count} (exact: {exact})");
                metadata = metadata.with_frame_count(count, exact);
            }
        }

        metadata
    }

    /// Run one backend attempt and finalize it unless it failed.
    fn attempt(
        &mut self,
        backend: &Backend,
        job: &BackendJob<'_>,
        attempt: u8,
    ) -> Result<ExtractionResult, (ExtractionError, ProgressTracker)> {
        let kind = backend.kind();
        self.transition(ExtractionState::Decoding(kind));
        log::info!("Extracting with the {kind} backend (attempt {attempt})");
        self.status(match kind {
            BackendKind::Hardware => "Using GPU-accelerated decoding…",
            BackendKind::Software => "Starting extraction…",
        });

        let mut tracker = ProgressTracker::new(
            self.observer.clone(),
            kind,
            attempt,
            job.plan.frames_planned,
            self.options.progress_batch_size,
        );

        match backend.run(job, &mut tracker, self.cancel) {
            Ok(outcome) => Ok(self.finalize(job.plan, outcome, &mut tracker)),
            Err(error) => Err((error, tracker)),
        }
    }

    fn finalize(
        &mut self,
        plan: &ExtractionPlan,
        outcome: BackendOutcome,
        tracker: &mut ProgressTracker,
    ) -> ExtractionResult {
        self.transition(ExtractionState::Finalizing);
        tracker.set_saved(outcome.frames_saved);
        tracker.finish();

        let output_dir = plan.output_directory.clone();
        let frames_saved = outcome.frames_saved;

        if outcome.canceled {
            self.transition(ExtractionState::Canceled);
            self.status("Canceled by user.");
            ExtractionResult::Canceled {
                output_dir,
                frames_saved,
            }
        } else {
            self.transition(ExtractionState::Done);
            self.status("Done.");
            ExtractionResult::Success {
                output_dir,
                frames_saved,
            }
        }
    }

    fn fail(&mut self, error: ExtractionError) -> ExtractionResult {
        let stage = self.state;
        self.transition(ExtractionState::Failed);
        let result = ExtractionResult::failed(error, stage);
        log::error!("{}", result.detailed_message());
        result
    }
}

/// Fail fast on anything that would make a backend pointless to start.
fn validate(request: &ExtractionRequest) -> Result<(), ExtractionError> {
    if !request.video_path().is_file() {
        return Err(ExtractionError::VideoNotFound {
            path: request.video_path().to_path_buf(),
        });
    }
    request.validate_parameters()?;
    output::ensure_writable(request.output_root())
}
