//! Analysis request/result types and the request validator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::media::DataUri;

/// The posture-check mode selected by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    Squat,
    DeskSitting,
}

impl Activity {
    pub const ALL: [Activity; 2] = [Activity::Squat, Activity::DeskSitting];

    /// Wire value, as accepted by the validator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Activity::Squat => "squat",
            Activity::DeskSitting => "desk_sitting",
        }
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Activity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Activity::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| ValidationError::Activity(s.to_string()))
    }
}

/// Whether a request carries a single still frame or a video clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    Frame,
    Clip,
}

impl CaptureMode {
    /// The data-URI prefix every request in this mode must start with.
    pub fn expected_prefix(&self) -> &'static str {
        match self {
            CaptureMode::Frame => "data:image/",
            CaptureMode::Clip => "data:video/",
        }
    }

    pub fn for_mime_type(mime_type: &str) -> Option<Self> {
        if mime_type.starts_with("image/") {
            Some(CaptureMode::Frame)
        } else if mime_type.starts_with("video/") {
            Some(CaptureMode::Clip)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureMode::Frame => "frame",
            CaptureMode::Clip => "clip",
        }
    }
}

/// A request rejected before any network call was made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("media must be a base64 data URI starting with {expected}")]
    Media { expected: &'static str },
    #[error("activity must be one of squat, desk_sitting (got {0:?})")]
    Activity(String),
}

impl ValidationError {
    /// Name of the offending request field.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::Media { .. } => "media",
            ValidationError::Activity(_) => "activity",
        }
    }
}

/// A validated, immutable analysis request.
///
/// The only constructor is [`AnalysisRequest::validate`], so holding one means
/// the media prefix matched the capture mode and the activity is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisRequest {
    media: String,
    activity: Activity,
    #[serde(skip)]
    mode: CaptureMode,
}

impl AnalysisRequest {
    pub fn validate(
        media: impl Into<String>,
        activity: &str,
        mode: CaptureMode,
    ) -> Result<Self, ValidationError> {
        let media = media.into();
        let expected = mode.expected_prefix();

        if !media.starts_with(expected) {
            return Err(ValidationError::Media { expected });
        }
        match DataUri::parse(&media) {
            Ok(uri) if !uri.payload.is_empty() => {}
            _ => return Err(ValidationError::Media { expected }),
        }

        let activity = activity.parse()?;

        Ok(Self {
            media,
            activity,
            mode,
        })
    }

    pub fn media(&self) -> &str {
        &self.media
    }

    pub fn activity(&self) -> Activity {
        self.activity
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }
}

/// The model's judgment for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub is_correct: bool,
    pub feedback: String,
}
