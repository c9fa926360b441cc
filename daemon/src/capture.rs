//! Frame and clip sources for the capture session.
//!
//! Frames come from a directory that some external grabber (webcam tool,
//! screenshot utility) keeps writing to; the newest image is rasterized to a
//! bounded JPEG. Uploaded files are sent as-is.

use formcheck_core::CaptureMode;
use formcheck_core::media::{encode_data_uri, mime_type_for_path};
use image::ImageReader;
use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;

/// Frames wider than this are scaled down before upload.
pub const MAX_FRAME_WIDTH: u32 = 640;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no image frames in {0}")]
    NoFrames(PathBuf),
    #[error("unsupported media type for {0}")]
    UnsupportedMedia(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to rasterize frame: {0}")]
    Image(#[from] image::ImageError),
}

impl CaptureError {
    fn io(path: &Path, source: io::Error) -> Self {
        CaptureError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FrameDirectory {
    dir: PathBuf,
}

impl FrameDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Most recently modified image in the directory.
    pub fn latest_frame(&self) -> Result<PathBuf, CaptureError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| CaptureError::io(&self.dir, e))?;

        let mut newest: Option<(SystemTime, PathBuf)> = None;
        for entry in entries.flatten() {
            let path = entry.path();
            let is_image = mime_type_for_path(&path).is_some_and(|m| m.starts_with("image/"));
            if !is_image {
                continue;
            }
            let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
                continue;
            };
            if newest.as_ref().is_none_or(|(t, _)| modified > *t) {
                newest = Some((modified, path));
            }
        }

        newest
            .map(|(_, path)| path)
            .ok_or_else(|| CaptureError::NoFrames(self.dir.clone()))
    }

    /// The newest frame as a JPEG `data:image/jpeg;base64,...` URI.
    pub fn snapshot(&self) -> Result<String, CaptureError> {
        let path = self.latest_frame()?;
        let bytes = fs::read(&path).map_err(|e| CaptureError::io(&path, e))?;
        let jpeg = rasterize_frame(&bytes)?;
        Ok(encode_data_uri(&jpeg, "image/jpeg"))
    }
}

/// Decodes any supported still and re-encodes it as JPEG, at most
/// [`MAX_FRAME_WIDTH`] wide with the aspect ratio kept.
pub fn rasterize_frame(data: &[u8]) -> Result<Vec<u8>, CaptureError> {
    let img = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?
        .decode()?;

    let img = if img.width() > MAX_FRAME_WIDTH {
        img.thumbnail(MAX_FRAME_WIDTH, img.height())
    } else {
        img
    };

    // JPEG has no alpha channel
    let rgb = image::DynamicImage::ImageRgb8(img.to_rgb8());
    let mut output = Cursor::new(Vec::new());
    rgb.write_to(&mut output, image::ImageFormat::Jpeg)?;

    Ok(output.into_inner())
}

/// Which endpoint an uploaded file belongs to, from its extension.
pub fn upload_mode(path: &Path) -> Result<CaptureMode, CaptureError> {
    mime_type_for_path(path)
        .and_then(CaptureMode::for_mime_type)
        .ok_or_else(|| CaptureError::UnsupportedMedia(path.to_path_buf()))
}

/// Reads an uploaded still or clip into a data URI without re-encoding.
pub fn read_upload(path: &Path) -> Result<String, CaptureError> {
    let mime_type =
        mime_type_for_path(path).ok_or_else(|| CaptureError::UnsupportedMedia(path.to_path_buf()))?;
    let bytes = fs::read(path).map_err(|e| CaptureError::io(path, e))?;
    Ok(encode_data_uri(&bytes, mime_type))
}
