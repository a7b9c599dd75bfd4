use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use frame2img::timecode::{format_seconds, parse_timecode};
use frame2img::{
    BackendPreference, ExtractionEvent, ExtractionRequest, ExtractionResult, Extractor,
    ExtractorOptions, FfmpegLogLevel, ImageFormat, ProgressEvent, Sampling, TimeWindow,
    ToolLocator, VideoMetadata, hardware_available,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  frame2img extract input.mp4 --out frames --progress\n  frame2img extract input.mp4 --out frames --start 1:30 --end 1:45 --every-seconds 0.5\n  frame2img probe input.mp4 --json\n  frame2img capabilities\n  frame2img completions zsh > _frame2img";

#[derive(Debug, Parser)]
#[command(
    name = "frame2img",
    version,
    about = "Extract still frames from video files",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// FFmpeg library log level (quiet, fatal, error, warning, info, debug).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Path to the ffmpeg executable used for GPU decoding.
    #[arg(long, global = true)]
    ffmpeg: Option<PathBuf>,

    /// Path to the ffprobe executable used for metadata.
    #[arg(long, global = true)]
    ffprobe: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Extract frames into a new folder under the output directory.
    #[command(
        about = "Extract video frames",
        after_help = "Examples:\n  frame2img extract input.mp4 --out frames --every 10 --format jpg --quality 90\n  frame2img extract input.mp4 --out frames --start 0:10 --end 0:20 --progress"
    )]
    Extract {
        /// Input video path.
        input: PathBuf,
        /// Directory the `<name>_frames` folder is created in.
        #[arg(long)]
        out: PathBuf,
        /// Window start (SS, MM:SS or HH:MM:SS, fractions allowed).
        #[arg(long)]
        start: Option<String>,
        /// Window end, exclusive.
        #[arg(long)]
        end: Option<String>,
        /// Keep every Nth frame.
        #[arg(long)]
        every: Option<u64>,
        /// Keep one frame every S seconds. Takes precedence over --every.
        #[arg(long)]
        every_seconds: Option<f64>,
        /// Output image format (png, jpg).
        #[arg(long, default_value = "png")]
        format: String,
        /// JPEG quality, 1-100.
        #[arg(long, default_value_t = ExtractionRequest::DEFAULT_JPEG_QUALITY)]
        quality: u8,
        /// Count frames exactly before extracting (slow).
        #[arg(long)]
        precise_count: bool,
        /// Never use GPU decoding.
        #[arg(long)]
        software: bool,
        /// Show a progress bar.
        #[arg(long)]
        progress: bool,
        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print video metadata.
    #[command(visible_alias = "info")]
    Probe {
        /// Input video path.
        input: PathBuf,
        /// Count frames exactly (slow).
        #[arg(long)]
        precise: bool,
        /// Output metadata as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Report which external tools and decoders are available.
    Capabilities {
        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_image_format(value: &str) -> Result<ImageFormat, String> {
    ImageFormat::from_name(value).ok_or_else(|| format!("unsupported --format: {value}"))
}

fn parse_log_level(value: &str) -> Option<FfmpegLogLevel> {
    match value.trim().to_ascii_lowercase().as_str() {
        "quiet" => Some(FfmpegLogLevel::Quiet),
        "fatal" => Some(FfmpegLogLevel::Fatal),
        "error" => Some(FfmpegLogLevel::Error),
        "warning" | "warn" => Some(FfmpegLogLevel::Warning),
        "info" => Some(FfmpegLogLevel::Info),
        "debug" => Some(FfmpegLogLevel::Debug),
        _ => None,
    }
}

fn parse_window(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<Option<TimeWindow>, Box<dyn std::error::Error>> {
    let start = start.map(parse_timecode).transpose()?.flatten();
    let end = end.map(parse_timecode).transpose()?.flatten();
    Ok(TimeWindow::from_bounds(start, end))
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    let filter = if global.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let level = match &global.log_level {
        Some(level) => {
            parse_log_level(level).ok_or(format!("unsupported --log-level: {level}"))?
        }
        None => FfmpegLogLevel::from_log_filter(log::max_level()),
    };
    frame2img::set_ffmpeg_log_level(level);

    Ok(())
}

fn extractor_options(global: &GlobalOptions) -> ExtractorOptions {
    let mut options = ExtractorOptions::new();
    if let Some(ffmpeg) = &global.ffmpeg {
        options = options.with_ffmpeg_path(ffmpeg);
    }
    if let Some(ffprobe) = &global.ffprobe {
        options = options.with_ffprobe_path(ffprobe);
    }
    options
}

fn metadata_json(metadata: &VideoMetadata) -> serde_json::Value {
    json!({
        "duration_seconds": metadata.duration_seconds,
        "frame_rate": metadata.frame_rate,
        "frame_count": metadata.frame_count,
        "frame_count_exact": metadata.frame_count_exact,
        "width": metadata.width,
        "height": metadata.height,
        "codec": metadata.codec_name,
    })
}

fn result_json(result: &ExtractionResult) -> serde_json::Value {
    match result {
        ExtractionResult::Success {
            output_dir,
            frames_saved,
        } => json!({
            "status": "success",
            "output_dir": output_dir,
            "frames_saved": frames_saved,
        }),
        ExtractionResult::Canceled {
            output_dir,
            frames_saved,
        } => json!({
            "status": "canceled",
            "output_dir": output_dir,
            "frames_saved": frames_saved,
        }),
        ExtractionResult::Failed { error, stage } => json!({
            "status": "failed",
            "stage": stage.to_string(),
            "error": error.to_string(),
        }),
    }
}

/// Terminal rendering of progress events.
struct TerminalProgress {
    bar: Option<ProgressBar>,
    attempt: u8,
}

impl TerminalProgress {
    fn new(enabled: bool) -> Self {
        Self {
            bar: enabled.then(ProgressBar::no_length),
            attempt: 0,
        }
    }

    fn update(&mut self, event: &ProgressEvent) -> Result<(), Box<dyn std::error::Error>> {
        let Some(bar) = &self.bar else {
            return Ok(());
        };

        if event.attempt != self.attempt {
            self.attempt = event.attempt;
            let template = if event.frames_planned > 0 {
                bar.set_length(event.frames_planned);
                "{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}"
            } else {
                bar.unset_length();
                "{spinner:.green} {pos} frames {msg}"
            };
            bar.set_style(ProgressStyle::with_template(template)?.progress_chars("##-"));
            bar.reset();
        }

        bar.set_position(event.frames_saved);
        let eta = event
            .estimated_remaining
            .map(|remaining| format!(" ETA {}", format_seconds(remaining.as_secs_f64())))
            .unwrap_or_default();
        bar.set_message(format!(
            "[{}] {:.1} fps{eta}",
            event.backend,
            event.frames_per_second()
        ));
        Ok(())
    }

    fn status(&self, message: &str) {
        let line = format!("{} {message}", "status".cyan().bold());
        match &self.bar {
            Some(bar) => bar.println(line),
            None => eprintln!("{line}"),
        }
    }

    fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;
    let options = extractor_options(&cli.global);

    match cli.command {
        Commands::Extract {
            input,
            out,
            start,
            end,
            every,
            every_seconds,
            format,
            quality,
            precise_count,
            software,
            progress,
            json,
        } => {
            let window = parse_window(start.as_deref(), end.as_deref())?;
            let request = ExtractionRequest::new(&input, &out)
                .with_optional_window(window)
                .with_sampling(Sampling::from_parts(every, every_seconds))
                .with_format(parse_image_format(&format)?)
                .with_jpeg_quality(quality)
                .with_precision_count(precise_count);

            let options = if software {
                options.with_backend(BackendPreference::SoftwareOnly)
            } else {
                options
            };

            let mut terminal = TerminalProgress::new(progress && !json);
            let mut handle = Extractor::new(options).spawn(request)?;
            let mut result = None;

            for event in handle.events() {
                match event {
                    ExtractionEvent::Progress(event) => terminal.update(&event)?,
                    ExtractionEvent::Status(message) => {
                        if !json {
                            terminal.status(&message);
                        }
                    }
                    ExtractionEvent::Finished(finished) => result = Some(finished),
                }
            }
            terminal.finish();

            let result = result.unwrap_or_else(|| handle.wait());

            if json {
                println!("{}", serde_json::to_string_pretty(&result_json(&result))?);
            }

            match &result {
                ExtractionResult::Success { .. } if !json => {
                    println!("{} {}", "success:".green().bold(), result.to_string().green());
                }
                ExtractionResult::Canceled { .. } if !json => {
                    println!("{} {}", "canceled:".yellow().bold(), result.to_string().yellow());
                }
                ExtractionResult::Failed { .. } => return Err(result.detailed_message().into()),
                _ => {}
            }
        }
        Commands::Probe {
            input,
            precise,
            json,
        } => {
            if !input.is_file() {
                return Err(format!("video not found: {}", input.display()).into());
            }

            let probe = Extractor::new(options).probe();
            let mut metadata = probe.probe_metadata(&input);
            if precise {
                let count = probe.probe_precise_frame_count(&input);
                if count > 0 {
                    metadata = metadata.with_frame_count(count, true);
                }
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&metadata_json(&metadata))?);
            } else {
                println!("{}", metadata.summary());
            }
        }
        Commands::Capabilities { json } => {
            let locator = ToolLocator::from_options(&options);
            let ffmpeg = locator.ffmpeg();
            let ffprobe = locator.ffprobe();
            let gpu = hardware_available(&options);

            if json {
                let payload = json!({
                    "ffmpeg": ffmpeg,
                    "ffprobe": ffprobe,
                    "gpu_decoding": gpu,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                let describe = |path: Option<PathBuf>| match path {
                    Some(path) => path.display().to_string().green(),
                    None => "not found".red(),
                };
                println!("ffmpeg:  {}", describe(ffmpeg));
                println!("ffprobe: {}", describe(ffprobe));
                println!(
                    "GPU decoding: {}",
                    if gpu { "available".green() } else { "unavailable".yellow() }
                );
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "frame2img", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_image_format, parse_log_level, parse_window};
    use frame2img::{FfmpegLogLevel, ImageFormat};

    #[test]
    fn parse_image_format_aliases() {
        assert_eq!(parse_image_format("png").unwrap(), ImageFormat::Png);
        assert_eq!(parse_image_format("JPG").unwrap(), ImageFormat::Jpeg);
        assert_eq!(parse_image_format(".jpeg").unwrap(), ImageFormat::Jpeg);
        assert!(parse_image_format("bmp").is_err());
    }

    #[test]
    fn parse_log_level_aliases() {
        assert_eq!(parse_log_level("warn"), Some(FfmpegLogLevel::Warning));
        assert_eq!(parse_log_level("QUIET"), Some(FfmpegLogLevel::Quiet));
        assert!(parse_log_level("verbose").is_none());
    }

    #[test]
    fn parse_window_formats() {
        let window = parse_window(Some("1:30"), Some("00:01:45.5")).unwrap().unwrap();
        assert_eq!(window.start_seconds, 90.0);
        assert_eq!(window.end_seconds, Some(105.5));

        let open_ended = parse_window(Some("10"), None).unwrap().unwrap();
        assert_eq!(open_ended.end_seconds, None);

        assert!(parse_window(None, Some(" ")).unwrap().is_none());
        assert!(parse_window(Some("abc"), None).is_err());
    }
}
