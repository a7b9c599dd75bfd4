//! FFmpeg integration: library setup and external tool discovery.
//!
//! The engine talks to FFmpeg in two ways. The software backend links the
//! FFmpeg libraries through `ffmpeg-next`; their console chatter is tuned with
//! [`set_ffmpeg_log_level`]. The probe and the hardware backend run the
//! `ffprobe` / `ffmpeg` executables, which are located with [`ToolLocator`].
//!
//! # Tool lookup order
//!
//! 1. An explicit path from [`ExtractorOptions`](crate::ExtractorOptions).
//! 2. `FRAME2IMG_FFMPEG` / `FRAME2IMG_FFPROBE`, then `FFMPEG_PATH` (a
//!    directory or the `ffmpeg` binary itself).
//! 3. A bundled copy next to the running executable, then in its `bin/`.
//! 4. The system `PATH`.
//!
//! # Example
//!
//! ```no_run
//! use frame2img::{FfmpegLogLevel, ToolLocator};
//!
//! frame2img::set_ffmpeg_log_level(FfmpegLogLevel::Error);
//!
//! if let Some(ffprobe) = ToolLocator::new().ffprobe() {
//!     println!("using {}", ffprobe.display());
//! }
//! ```

use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

#[cfg(windows)]
use std::os::windows::process::CommandExt;

use ffmpeg_next::util::log::Level;

use crate::config::ExtractorOptions;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// FFmpeg internal log verbosity level.
///
/// Maps directly to FFmpeg's `AV_LOG_*` constants and only affects the
/// in-process libraries used by the software backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfmpegLogLevel {
    /// Print no output at all.
    Quiet,
    /// Only log unrecoverable errors.
    Fatal,
    /// Log recoverable errors.
    Error,
    /// Log warnings (FFmpeg's default).
    Warning,
    /// Log informational messages.
    Info,
    /// Log debugging messages.
    Debug,
}

impl FfmpegLogLevel {
    fn to_ffmpeg_level(self) -> Level {
        match self {
            FfmpegLogLevel::Quiet => Level::Quiet,
            FfmpegLogLevel::Fatal => Level::Fatal,
            FfmpegLogLevel::Error => Level::Error,
            FfmpegLogLevel::Warning => Level::Warning,
            FfmpegLogLevel::Info => Level::Info,
            FfmpegLogLevel::Debug => Level::Debug,
        }
    }

    /// Pick the FFmpeg level matching a `log` crate filter, so one verbosity
    /// switch drives both.
    pub fn from_log_filter(filter: log::LevelFilter) -> Self {
        match filter {
            log::LevelFilter::Off => FfmpegLogLevel::Quiet,
            log::LevelFilter::Error => FfmpegLogLevel::Fatal,
            log::LevelFilter::Warn => FfmpegLogLevel::Error,
            log::LevelFilter::Info => FfmpegLogLevel::Warning,
            log::LevelFilter::Debug => FfmpegLogLevel::Info,
            log::LevelFilter::Trace => FfmpegLogLevel::Debug,
        }
    }
}

/// Set the verbosity of the in-process FFmpeg libraries.
///
/// This does **not** affect the external `ffmpeg`/`ffprobe` processes, which
/// always run with `-loglevel error`, nor the Rust-side `log` output.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    ffmpeg_next::util::log::set_level(level.to_ffmpeg_level());
}

/// Create a [`Command`] that won't open a console window on Windows.
pub(crate) fn hidden_command<S: AsRef<OsStr>>(program: S) -> Command {
    #[allow(unused_mut)]
    let mut command = Command::new(program);
    #[cfg(windows)]
    command.creation_flags(CREATE_NO_WINDOW);
    command
}

/// Resolves the external `ffmpeg` and `ffprobe` executables.
#[derive(Debug, Clone, Default)]
pub struct ToolLocator {
    ffmpeg_override: Option<PathBuf>,
    ffprobe_override: Option<PathBuf>,
}

impl ToolLocator {
    /// A locator with no explicit overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// A locator honouring the paths configured in `options`.
    pub fn from_options(options: &ExtractorOptions) -> Self {
        Self {
            ffmpeg_override: options.ffmpeg_path.clone(),
            ffprobe_override: options.ffprobe_path.clone(),
        }
    }

    /// Locate `ffmpeg`.
    pub fn ffmpeg(&self) -> Option<PathBuf> {
        self.locate("ffmpeg", self.ffmpeg_override.as_deref(), "FRAME2IMG_FFMPEG")
    }

    /// Locate `ffprobe`.
    pub fn ffprobe(&self) -> Option<PathBuf> {
        self.locate(
            "ffprobe",
            self.ffprobe_override.as_deref(),
            "FRAME2IMG_FFPROBE",
        )
    }

    fn locate(&self, tool: &str, explicit: Option<&Path>, variable: &str) -> Option<PathBuf> {
        if let Some(path) = explicit {
            if path.is_file() {
                return Some(path.to_path_buf());
            }
            log::warn!("Configured {tool} path {} does not exist", path.display());
            return None;
        }

        if let Some(path) = env::var_os(variable).map(PathBuf::from) {
            if path.is_file() {
                return Some(path);
            }
            log::warn!("{variable} points at missing file {}", path.display());
        }

        if let Some(found) = env::var_os("FFMPEG_PATH").and_then(|value| {
            let path = PathBuf::from(value);
            if path.is_dir() {
                existing(path.join(executable_name(tool)))
            } else {
                path.parent()
                    .and_then(|dir| existing(dir.join(executable_name(tool))))
            }
        }) {
            return Some(found);
        }

        if let Some(found) = env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .and_then(|dir| {
                existing(dir.join(executable_name(tool)))
                    .or_else(|| existing(dir.join("bin").join(executable_name(tool))))
            })
        {
            log::debug!("Using bundled {tool} at {}", found.display());
            return Some(found);
        }

        search_path(tool)
    }
}

fn executable_name(tool: &str) -> String {
    if cfg!(windows) {
        format!("{tool}.exe")
    } else {
        tool.to_string()
    }
}

fn existing(path: PathBuf) -> Option<PathBuf> {
    path.is_file().then_some(path)
}

fn search_path(tool: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths).find_map(|dir| existing(dir.join(executable_name(tool))))
}

