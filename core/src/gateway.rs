//! The inference interface and the structured-output contract with the model.
//!
//! Every backend (hosted model, the analysis API, a test double) implements
//! [`PostureAnalyzer`]. The prompt template and reply parsing live here so
//! that they are shared by all hosted-model backends.

use serde::Deserialize;
use serde_json::{Value, json};
use std::future::Future;
use thiserror::Error;

use crate::analysis::{Activity, AnalysisRequest, AnalysisResult};
use crate::media::MediaError;

/// Shown to the user for any inference failure; details go to the log only.
pub const INFERENCE_FAILURE_MESSAGE: &str = "Posture analysis failed. Please try again.";

/// A failed provider call or an unusable provider reply.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider returned {status}: {body}")]
    UnexpectedStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("provider returned no content ({0})")]
    EmptyReply(String),
    #[error("provider reply does not match the result shape: {0}")]
    MalformedReply(#[from] serde_json::Error),
    #[error("media could not be attached: {0}")]
    Media(#[from] MediaError),
}

/// Judges the posture shown in one validated request.
///
/// One attempt per call; retrying is left to the caller.
pub trait PostureAnalyzer: Send + Sync {
    fn analyze(
        &self,
        request: &AnalysisRequest,
    ) -> impl Future<Output = Result<AnalysisResult, InferenceError>> + Send;
}

fn checklist(activity: Activity) -> &'static str {
    match activity {
        Activity::Squat => {
            "Check squat depth (hips at or below knee level), knees tracking over the toes \
             without caving inward, heels flat on the floor, a neutral spine without rounding \
             of the lower back, and the chest kept up."
        }
        Activity::DeskSitting => {
            "Check for a neutral spine supported by the chair back, relaxed shoulders that are \
             not hunched or rounded forward, the head balanced over the shoulders without \
             jutting forward, feet flat on the floor with knees at roughly hip height, and the \
             screen at eye level."
        }
    }
}

/// The instruction sent alongside the media for `activity`.
pub fn instruction_for(activity: Activity) -> String {
    format!(
        "You are an AI posture analysis tool. Analyze the attached image or video of a person \
         and determine whether their posture is correct for the activity \"{activity}\".\n\n\
         {checklist}\n\n\
         Set postureAnalysis.isCorrect to true only if the posture is correct for this \
         activity. In postureAnalysis.feedback, explain what is good about the posture or \
         give concise, actionable guidance on how to correct it.",
        activity = activity.as_str(),
        checklist = checklist(activity),
    )
}

/// JSON schema the provider is asked to conform to.
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "postureAnalysis": {
                "type": "OBJECT",
                "properties": {
                    "isCorrect": {
                        "type": "BOOLEAN",
                        "description": "Whether the posture is correct for the activity."
                    },
                    "feedback": {
                        "type": "STRING",
                        "description": "Feedback on the posture, including suggestions for improvement."
                    }
                },
                "required": ["isCorrect", "feedback"]
            }
        },
        "required": ["postureAnalysis"]
    })
}

#[derive(Deserialize)]
struct PostureReply {
    #[serde(rename = "postureAnalysis")]
    posture_analysis: AnalysisResult,
}

/// Decodes the model's JSON text into a result. Partial replies are errors.
pub fn parse_reply(text: &str) -> Result<AnalysisResult, InferenceError> {
    let reply: PostureReply = serde_json::from_str(text.trim())?;
    Ok(reply.posture_analysis)
}
