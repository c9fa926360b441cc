//! Posture-analysis contract shared by the API server and the capture daemon.
//!
//! - [`media`]: embedded-data URI encoding of captured frames and clips
//! - [`analysis`]: request/result types and the request validator
//! - [`gateway`]: the one-method inference interface, prompt template and reply parsing
//! - [`gemini`]: the hosted Gemini implementation of that interface
//! - [`analyzer`]: a capture session that keeps at most one request in flight

pub mod analysis;
pub mod analyzer;
pub mod gateway;
pub mod gemini;
pub mod logging;
pub mod media;

pub use analysis::{Activity, AnalysisRequest, AnalysisResult, CaptureMode, ValidationError};
pub use analyzer::{AnalyzeError, Analyzer, Outcome, SessionState, TickOutcome, Verdict};
pub use gateway::{INFERENCE_FAILURE_MESSAGE, InferenceError, PostureAnalyzer};
pub use gemini::{GeminiConfig, GeminiGateway};
