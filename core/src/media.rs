//! Embedded-data URI encoding for captured frames and clips.
//!
//! A captured still or video is carried as `data:<mime>;base64,<payload>` so it
//! can travel inline with the analysis request instead of a separate upload.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("not a base64 data URI")]
    NotDataUri,
    #[error("invalid base64 payload: {0}")]
    Decode(#[from] base64::DecodeError),
}

/// Encodes raw media bytes as a `data:<mime>;base64,` URI.
pub fn encode_data_uri(bytes: &[u8], mime_type: &str) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes))
}

/// A parsed view over a data URI string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataUri<'a> {
    /// Full media type, including parameters such as `codecs=vp9`.
    pub mime_type: &'a str,
    /// Base64 text after the `;base64,` marker.
    pub payload: &'a str,
}

impl<'a> DataUri<'a> {
    pub fn parse(uri: &'a str) -> Result<Self, MediaError> {
        let rest = uri.strip_prefix("data:").ok_or(MediaError::NotDataUri)?;
        let (mime_type, payload) = rest
            .split_once(";base64,")
            .ok_or(MediaError::NotDataUri)?;

        let essence = mime_type.split(';').next().unwrap_or_default();
        match essence.split_once('/') {
            Some((kind, subtype)) if !kind.is_empty() && !subtype.is_empty() => {}
            _ => return Err(MediaError::NotDataUri),
        }

        Ok(Self { mime_type, payload })
    }

    /// Media type without parameters (`video/webm;codecs=vp9` -> `video/webm`).
    pub fn essence(&self) -> &'a str {
        self.mime_type.split(';').next().unwrap_or(self.mime_type)
    }

    pub fn decode(&self) -> Result<Vec<u8>, MediaError> {
        Ok(STANDARD.decode(self.payload)?)
    }
}

/// Guesses a media type from a file extension.
pub fn mime_type_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        _ => return None,
    };
    Some(mime)
}
