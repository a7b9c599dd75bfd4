//! Hardware backend: an external `ffmpeg` process with CUDA decoding.
//!
//! The process seeks, trims, samples and writes the numbered images itself.
//! This backend only builds the command line, follows the `-progress pipe:1`
//! key/value stream on stdout, and reconciles the final count with the files
//! on disk.
//!
//! Any non-zero exit (or a failure to start the process at all) is reported
//! as [`ExtractionError::HardwareBackendFailed`], which the orchestrator
//! answers by retrying with the software backend.

use std::ffi::OsString;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::backend::{BackendJob, BackendKind, BackendOutcome, FrameBackend};
use crate::config::{BackendPreference, ExtractorOptions, ImageFormat, PngCompression, Sampling};
use crate::error::ExtractionError;
use crate::ffmpeg::{ToolLocator, hidden_command};
use crate::output::{count_frame_files, frame_file_pattern};
use crate::progress::{CancellationToken, ProgressTracker};

/// How long a cancelled process gets to exit after `q` before it is killed.
const TERMINATE_GRACE: Duration = Duration::from_secs(3);
const TERMINATE_POLL: Duration = Duration::from_millis(50);
/// Bytes of decoder stderr kept for error reports.
const STDERR_TAIL_BYTES: usize = 4096;

/// Runs extraction through an external `ffmpeg` with `-hwaccel cuda`.
#[derive(Debug, Clone)]
pub struct HardwareBackend {
    ffmpeg: PathBuf,
    png_compression: PngCompression,
}

impl HardwareBackend {
    /// Use a specific `ffmpeg` executable without probing its capabilities.
    pub fn with_executable<P: AsRef<Path>>(ffmpeg: P, png_compression: PngCompression) -> Self {
        Self {
            ffmpeg: ffmpeg.as_ref().to_path_buf(),
            png_compression,
        }
    }

    /// Find an `ffmpeg` that lists CUDA or NVDEC among its hardware
    /// accelerators.
    ///
    /// Returns `None` when the options forbid hardware decoding, no
    /// executable is found, or it lacks GPU support.
    pub fn detect(options: &ExtractorOptions) -> Option<Self> {
        if options.backend == BackendPreference::SoftwareOnly {
            log::debug!("Hardware backend disabled by configuration");
            return None;
        }

        let Some(ffmpeg) = ToolLocator::from_options(options).ffmpeg() else {
            log::info!("ffmpeg not found; hardware decoding unavailable");
            return None;
        };

        let output = match hidden_command(&ffmpeg)
            .args(["-hide_banner", "-hwaccels"])
            .stdin(Stdio::null())
            .output()
        {
            Ok(output) if output.status.success() => output,
            Ok(output) => {
                log::warn!("{} -hwaccels exited with {}", ffmpeg.display(), output.status);
                return None;
            }
            Err(error) => {
                log::warn!("Failed to query {}: {error}", ffmpeg.display());
                return None;
            }
        };

        if supports_cuda(&String::from_utf8_lossy(&output.stdout)) {
            log::info!("GPU decoding available via {}", ffmpeg.display());
            Some(Self::with_executable(ffmpeg, options.png_compression))
        } else {
            log::info!("{} reports no CUDA/NVDEC support", ffmpeg.display());
            None
        }
    }

    /// Path of the `ffmpeg` executable this backend runs.
    pub fn executable(&self) -> &Path {
        &self.ffmpeg
    }

    /// Command-line arguments for `job`, excluding the program name.
    pub fn arguments(&self, job: &BackendJob<'_>) -> Vec<OsString> {
        let request = job.request;
        let start = request.start_seconds();
        let mut args: Vec<OsString> = ["-hide_banner", "-y", "-hwaccel", "cuda"]
            .into_iter()
            .map(OsString::from)
            .collect();

        if start > 0.0 {
            args.push("-ss".into());
            args.push(format!("{start:.3}").into());
        }

        args.push("-i".into());
        args.push(request.video_path().as_os_str().to_owned());

        if let Some(end) = request.end_seconds() {
            args.push("-t".into());
            args.push(format!("{:.3}", (end - start).max(0.0)).into());
        }

        match request.sampling() {
            Sampling::EverySeconds(interval) => {
                args.push("-vf".into());
                args.push(format!("fps=1/{interval}").into());
            }
            Sampling::EveryNthFrame(every) if every > 1 => {
                args.push("-vf".into());
                args.push(format!("select=not(mod(n\\,{every}))").into());
            }
            Sampling::EveryNthFrame(_) => {}
        }

        args.extend(
            ["-vsync", "0", "-start_number", "1"]
                .into_iter()
                .map(OsString::from),
        );

        match request.format() {
            ImageFormat::Png => {
                args.push("-compression_level".into());
                args.push(self.png_compression.zlib_level().to_string().into());
            }
            ImageFormat::Jpeg => {
                args.push("-q:v".into());
                args.push(jpeg_qscale(request.jpeg_quality()).to_string().into());
            }
        }

        args.push(
            frame_file_pattern(
                &job.plan.output_directory,
                job.plan.filename_pad_width,
                request.format(),
            )
            .into_os_string(),
        );

        args.extend(
            ["-progress", "pipe:1", "-nostats", "-loglevel", "error"]
                .into_iter()
                .map(OsString::from),
        );

        args
    }
}

impl FrameBackend for HardwareBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Hardware
    }

    fn run(
        &self,
        job: &BackendJob<'_>,
        progress: &mut ProgressTracker,
        cancel: &CancellationToken,
    ) -> Result<BackendOutcome, ExtractionError> {
        let args = self.arguments(job);
        log::debug!("Running {} {:?}", self.ffmpeg.display(), args);

        let mut child = hidden_command(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|error| failure(format!("failed to start: {error}"), String::new()))?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            kill(&mut child);
            return Err(failure("decoder pipes unavailable".to_string(), String::new()));
        };

        let stderr_thread = thread::spawn(move || read_tail(stderr));

        progress.start();

        let mut reader = BufReader::new(stdout);
        let mut line = String::new();
        let mut canceled = false;
        loop {
            if cancel.is_cancelled() {
                canceled = true;
                break;
            }
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if let Some(frames) = parse_progress_line(&line) {
                        progress.set_saved(frames);
                    }
                }
            }
        }

        let directory = &job.plan.output_directory;
        let format = job.request.format();

        if canceled {
            log::info!("Stopping hardware decoder after cancellation");
            terminate(&mut child);
            drop(reader);
            let _ = stderr_thread.join();

            let frames_saved = count_frame_files(directory, format);
            progress.set_saved(frames_saved);
            return Ok(BackendOutcome::canceled(frames_saved));
        }

        let status = child
            .wait()
            .map_err(|error| failure(format!("wait failed: {error}"), String::new()))?;
        let stderr_tail = stderr_thread.join().unwrap_or_default();

        if !status.success() {
            return Err(failure(status.to_string(), stderr_tail));
        }

        let mut frames_saved = progress.saved();
        if frames_saved == 0 {
            frames_saved = count_frame_files(directory, format);
            progress.set_saved(frames_saved);
        }

        Ok(BackendOutcome::completed(frames_saved))
    }
}

/// Returns `true` if `ffmpeg -hwaccels` output lists CUDA or NVDEC.
pub fn supports_cuda(hwaccels_output: &str) -> bool {
    hwaccels_output
        .lines()
        .map(|line| line.trim().to_ascii_lowercase())
        .any(|line| line == "cuda" || line == "nvdec")
}

/// Check whether the hardware backend can run with `options`.
pub fn hardware_available(options: &ExtractorOptions) -> bool {
    HardwareBackend::detect(options).is_some()
}

/// Extract the running frame counter from one `-progress` line.
///
/// ```
/// use frame2img::backend::hardware::parse_progress_line;
///
/// assert_eq!(parse_progress_line("frame=42\n"), Some(42));
/// assert_eq!(parse_progress_line("fps=29.97"), None);
/// ```
pub fn parse_progress_line(line: &str) -> Option<u64> {
    let (key, value) = line.trim().split_once('=')?;
    if key.trim() != "frame" {
        return None;
    }
    value.trim().parse().ok()
}

/// Map JPEG quality `1..=100` onto ffmpeg's `-q:v` scale `31..=2` (lower is
/// better).
pub fn jpeg_qscale(quality: u8) -> u8 {
    let quality = u32::from(quality.clamp(1, 100));
    let scaled = ((quality - 1) * 29 + 49) / 99;
    (31 - scaled) as u8
}

fn failure(status: String, stderr: String) -> ExtractionError {
    ExtractionError::HardwareBackendFailed { status, stderr }
}

/// Ask the process to quit with `q`, then kill it if it is still running
/// after the grace period.
fn terminate(child: &mut Child) {
    if let Some(mut stdin) = child.stdin.take() {
        let _ = stdin.write_all(b"q\n");
        let _ = stdin.flush();
    }

    let deadline = Instant::now() + TERMINATE_GRACE;
    while Instant::now() < deadline {
        match child.try_wait() {
            Ok(Some(_)) => return,
            Ok(None) => thread::sleep(TERMINATE_POLL),
            Err(error) => {
                log::warn!("Could not poll decoder process: {error}");
                break;
            }
        }
    }

    log::warn!("Decoder did not exit after {TERMINATE_GRACE:?}; killing it");
    kill(child);
}

fn kill(child: &mut Child) {
    if let Err(error) = child.kill() {
        log::debug!("Kill failed: {error}");
    }
    let _ = child.wait();
}

fn read_tail(mut stderr: ChildStderr) -> String {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match stderr.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(read) => {
                buffer.extend_from_slice(&chunk[..read]);
                if buffer.len() > STDERR_TAIL_BYTES {
                    let excess = buffer.len() - STDERR_TAIL_BYTES;
                    buffer.drain(..excess);
                }
            }
        }
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
