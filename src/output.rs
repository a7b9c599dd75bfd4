//! Output directory allocation and frame file naming.
//!
//! Every run writes into a directory of its own,
//! `<root>/<video stem>_frames`, or `_frames_1`, `_frames_2`, … when that
//! name is taken. Directories are claimed with a non-recursive
//! [`fs::create_dir`], so an existing directory is never reused, emptied or
//! overwritten.
//!
//! Frames are named `frame_<index>.<ext>` with a 1-based index zero-padded to
//! the plan's width, so names sort in capture order.

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, ImageError};

use crate::config::{ImageFormat, PngCompression};
use crate::error::ExtractionError;

/// File name prefix of every extracted frame.
pub const FRAME_PREFIX: &str = "frame_";

const WRITE_TEST_FILE: &str = ".frame2img_write_test.tmp";

/// Make sure `root` is a directory we can create files in, creating it and
/// any missing parents first.
///
/// A throwaway file is written and removed again.
///
/// # Errors
///
/// Returns [`ExtractionError::OutputNotWritable`] when the directory cannot
/// be created or written to.
pub fn ensure_writable(root: &Path) -> Result<(), ExtractionError> {
    let not_writable = |reason: String| ExtractionError::OutputNotWritable {
        path: root.to_path_buf(),
        reason,
    };

    fs::create_dir_all(root).map_err(|error| not_writable(error.to_string()))?;

    let test_file = root.join(WRITE_TEST_FILE);
    fs::File::create(&test_file)
        .and_then(|mut file| file.write_all(b"ok"))
        .map_err(|error| not_writable(error.to_string()))?;

    if let Err(error) = fs::remove_file(&test_file) {
        log::warn!("Could not remove {}: {error}", test_file.display());
    }
    Ok(())
}

/// Base name used for the output directory: the video's file stem, or
/// `video` when it has none.
pub fn video_base_name(video_path: &Path) -> String {
    video_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "video".to_string())
}

/// Create a fresh output directory for `base_name` under `root`.
///
/// Tries `<base_name>_frames`, then `<base_name>_frames_1`, `_2`, … and
/// returns the first one it managed to create.
///
/// # Errors
///
/// Returns [`ExtractionError::IoError`] if a candidate cannot be created for
/// a reason other than already existing.
pub fn allocate(root: &Path, base_name: &str) -> Result<PathBuf, ExtractionError> {
    let stem = format!("{base_name}_frames");

    let mut suffix = 0u64;
    loop {
        let name = if suffix == 0 {
            stem.clone()
        } else {
            format!("{stem}_{suffix}")
        };
        let candidate = root.join(name);

        match fs::create_dir(&candidate) {
            Ok(()) => {
                log::info!("Writing frames to {}", candidate.display());
                return Ok(candidate);
            }
            Err(error) if error.kind() == ErrorKind::AlreadyExists => suffix += 1,
            Err(error) => return Err(error.into()),
        }
    }
}

/// File name of the frame with 1-based `index`.
///
/// ```
/// use frame2img::ImageFormat;
/// use frame2img::output::frame_file_name;
///
/// assert_eq!(frame_file_name(7, 3, ImageFormat::Png), "frame_007.png");
/// assert_eq!(frame_file_name(1234, 3, ImageFormat::Jpeg), "frame_1234.jpg");
/// ```
pub fn frame_file_name(index: u64, pad_width: usize, format: ImageFormat) -> String {
    format!("{FRAME_PREFIX}{index:0pad_width$}.{}", format.extension())
}

/// The external decoder's output pattern matching [`frame_file_name`].
pub(crate) fn frame_file_pattern(directory: &Path, pad_width: usize, format: ImageFormat) -> PathBuf {
    directory.join(format!(
        "{FRAME_PREFIX}%0{pad_width}d.{}",
        format.extension()
    ))
}

fn is_frame_file(path: &Path, format: ImageFormat) -> bool {
    path.is_file()
        && path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| {
                name.starts_with(FRAME_PREFIX)
                    && name.ends_with(&format!(".{}", format.extension()))
            })
}

/// Number of `frame_*.<ext>` files in `directory`. A missing directory
/// counts as empty.
pub fn count_frame_files(directory: &Path, format: ImageFormat) -> u64 {
    let Ok(entries) = fs::read_dir(directory) else {
        return 0;
    };

    entries
        .filter_map(Result::ok)
        .filter(|entry| is_frame_file(&entry.path(), format))
        .count() as u64
}

/// Delete the `frame_*.<ext>` files from a directory this run created.
///
/// Used before retrying with another backend so the directory ends up with a
/// single gapless sequence. Other files are left alone.
pub(crate) fn remove_frame_files(directory: &Path, format: ImageFormat) -> Result<u64, ExtractionError> {
    let mut removed = 0;
    for entry in fs::read_dir(directory)? {
        let path = entry?.path();
        if is_frame_file(&path, format) {
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Encodes RGB frames into sequentially numbered image files.
pub(crate) struct FrameWriter {
    directory: PathBuf,
    pad_width: usize,
    format: ImageFormat,
    jpeg_quality: u8,
    png_compression: PngCompression,
    next_index: u64,
}

impl FrameWriter {
    pub(crate) fn new(
        directory: &Path,
        pad_width: usize,
        format: ImageFormat,
        jpeg_quality: u8,
        png_compression: PngCompression,
    ) -> Self {
        Self {
            directory: directory.to_path_buf(),
            pad_width,
            format,
            jpeg_quality,
            png_compression,
            next_index: 1,
        }
    }

    /// Write the next frame from tightly packed RGB24 data and return its
    /// path.
    pub(crate) fn write_rgb(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<PathBuf, ExtractionError> {
        let path = self.directory.join(frame_file_name(
            self.next_index,
            self.pad_width,
            self.format,
        ));
        let write_error = |source: ImageError| ExtractionError::FrameWrite {
            path: path.clone(),
            source,
        };

        let file = File::create(&path).map_err(|error| write_error(ImageError::IoError(error)))?;
        let mut writer = BufWriter::new(file);

        match self.format {
            ImageFormat::Png => {
                let compression = match self.png_compression {
                    PngCompression::Fast => CompressionType::Fast,
                    PngCompression::Default => CompressionType::Default,
                    PngCompression::Best => CompressionType::Best,
                };
                PngEncoder::new_with_quality(&mut writer, compression, FilterType::Adaptive)
                    .write_image(rgb, width, height, ExtendedColorType::Rgb8)
            }
            ImageFormat::Jpeg => JpegEncoder::new_with_quality(&mut writer, self.jpeg_quality)
                .write_image(rgb, width, height, ExtendedColorType::Rgb8),
        }
        .map_err(write_error)?;

        writer
            .flush()
            .map_err(|error| write_error(ImageError::IoError(error)))?;

        self.next_index += 1;
        Ok(path)
    }
}
