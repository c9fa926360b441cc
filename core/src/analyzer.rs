//! Capture session driving the gateway.
//!
//! A session is `Idle`, `Capturing` (periodic frames), or `Recording` (a clip
//! to analyze on demand), and reports `Analyzing` while a request is in flight.
//! At most one request is in flight: periodic ticks arriving meanwhile are
//! dropped and manual requests are rejected. Only the latest outcome is kept.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use crate::analysis::{AnalysisRequest, AnalysisResult, CaptureMode, ValidationError};
use crate::gateway::{INFERENCE_FAILURE_MESSAGE, InferenceError, PostureAnalyzer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Capturing,
    Recording,
    Analyzing,
}

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("an analysis is already in progress")]
    Busy,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AnalyzeError {
    /// Display-safe text for the user.
    pub fn user_message(&self) -> String {
        match self {
            AnalyzeError::Busy => {
                "An analysis is already in progress. Please wait for it to finish.".to_string()
            }
            AnalyzeError::Validation(err) => format!("Invalid request: {err}."),
            AnalyzeError::Inference(_) => INFERENCE_FAILURE_MESSAGE.to_string(),
            AnalyzeError::Unexpected(_) => {
                "An unexpected error occurred. Please try again.".to_string()
            }
        }
    }
}

/// What the user currently sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Result(AnalysisResult),
    Error(String),
}

#[derive(Debug, Clone)]
pub struct Outcome {
    pub verdict: Verdict,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug)]
pub enum TickOutcome {
    /// The tick was dispatched (or failed before dispatch) and finished.
    Completed(Result<AnalysisResult, AnalyzeError>),
    /// Another request was in flight.
    Dropped,
    /// The session is not capturing frames.
    NotCapturing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Idle,
    Capturing,
    Recording,
}

/// Clears the in-flight flag on every exit path, including unwinding.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Analyzer<G> {
    gateway: G,
    in_flight: AtomicBool,
    mode: Mutex<Mode>,
    latest: Mutex<Option<Outcome>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<G: PostureAnalyzer> Analyzer<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            in_flight: AtomicBool::new(false),
            mode: Mutex::new(Mode::Idle),
            latest: Mutex::new(None),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn state(&self) -> SessionState {
        if self.in_flight.load(Ordering::Acquire) {
            return SessionState::Analyzing;
        }
        match *lock(&self.mode) {
            Mode::Idle => SessionState::Idle,
            Mode::Capturing => SessionState::Capturing,
            Mode::Recording => SessionState::Recording,
        }
    }

    /// `Idle -> Capturing`. Returns false from any other state.
    pub fn start_capture(&self) -> bool {
        self.transition(Mode::Idle, Mode::Capturing)
    }

    /// `Idle -> Recording`. Returns false from any other state.
    pub fn start_recording(&self) -> bool {
        self.transition(Mode::Idle, Mode::Recording)
    }

    /// Back to `Idle`. A request already sent is left to finish.
    pub fn stop(&self) {
        let mut mode = lock(&self.mode);
        if *mode != Mode::Idle {
            info!(target: "analyzer", "Stopping {:?}", *mode);
        }
        *mode = Mode::Idle;
    }

    fn transition(&self, from: Mode, to: Mode) -> bool {
        let mut mode = lock(&self.mode);
        if *mode != from {
            return false;
        }
        *mode = to;
        true
    }

    /// The most recent result or error message, if any.
    pub fn latest(&self) -> Option<Outcome> {
        lock(&self.latest).clone()
    }

    /// Periodic capture tick. `capture` is only invoked when the tick is
    /// actually dispatched, so dropped ticks cost nothing.
    pub async fn on_tick<F, E>(&self, activity: &str, capture: F) -> TickOutcome
    where
        F: FnOnce() -> Result<String, E>,
        E: fmt::Display,
    {
        if *lock(&self.mode) != Mode::Capturing {
            return TickOutcome::NotCapturing;
        }
        let Some(guard) = self.try_begin() else {
            debug!(target: "analyzer", "Dropping tick: analysis in flight");
            return TickOutcome::Dropped;
        };

        let result = self
            .dispatch(guard, activity, CaptureMode::Frame, capture)
            .await;
        TickOutcome::Completed(result)
    }

    /// Explicit "analyze" action for an uploaded or recorded clip or a still.
    pub async fn analyze_now<F, E>(
        &self,
        activity: &str,
        mode: CaptureMode,
        capture: F,
    ) -> Result<AnalysisResult, AnalyzeError>
    where
        F: FnOnce() -> Result<String, E>,
        E: fmt::Display,
    {
        let Some(guard) = self.try_begin() else {
            warn!(target: "analyzer", "Rejecting analyze request: analysis in flight");
            return Err(AnalyzeError::Busy);
        };
        self.dispatch(guard, activity, mode, capture).await
    }

    fn try_begin(&self) -> Option<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(&self.in_flight))
    }

    async fn dispatch<F, E>(
        &self,
        guard: InFlight<'_>,
        activity: &str,
        mode: CaptureMode,
        capture: F,
    ) -> Result<AnalysisResult, AnalyzeError>
    where
        F: FnOnce() -> Result<String, E>,
        E: fmt::Display,
    {
        let result = self.run(activity, mode, capture).await;
        drop(guard);

        match &result {
            Ok(r) => info!(
                target: "analyzer",
                "Posture {} for {}",
                if r.is_correct { "correct" } else { "incorrect" },
                activity
            ),
            Err(err) => warn!(target: "analyzer", "Analysis failed: {}", err),
        }
        self.record(&result);
        result
    }

    async fn run<F, E>(
        &self,
        activity: &str,
        mode: CaptureMode,
        capture: F,
    ) -> Result<AnalysisResult, AnalyzeError>
    where
        F: FnOnce() -> Result<String, E>,
        E: fmt::Display,
    {
        let media = capture().map_err(|e| AnalyzeError::Unexpected(e.to_string()))?;
        let request = AnalysisRequest::validate(media, activity, mode)?;
        Ok(self.gateway.analyze(&request).await?)
    }

    fn record(&self, result: &Result<AnalysisResult, AnalyzeError>) {
        let verdict = match result {
            Ok(r) => Verdict::Result(r.clone()),
            Err(err) => Verdict::Error(err.user_message()),
        };
        *lock(&self.latest) = Some(Outcome {
            verdict,
            finished_at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    const FRAME: &str = "data:image/jpeg;base64,AAAA";

    fn ok_frame() -> Result<String, Infallible> {
        Ok(FRAME.to_string())
    }

    /// Counts calls; each call waits until released.
    #[derive(Default)]
    struct HeldGateway {
        calls: AtomicUsize,
        release: Notify,
    }

    impl PostureAnalyzer for HeldGateway {
        async fn analyze(&self, _: &AnalysisRequest) -> Result<AnalysisResult, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.release.notified().await;
            Ok(AnalysisResult {
                is_correct: true,
                feedback: "Good form.".to_string(),
            })
        }
    }

    #[derive(Default)]
    struct CountingGateway {
        calls: AtomicUsize,
    }

    impl PostureAnalyzer for CountingGateway {
        async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(AnalysisResult {
                is_correct: false,
                feedback: format!("Keep your back straight while doing {}.", request.activity()),
            })
        }
    }

    struct FailingGateway;

    impl PostureAnalyzer for FailingGateway {
        async fn analyze(&self, _: &AnalysisRequest) -> Result<AnalysisResult, InferenceError> {
            Err(InferenceError::EmptyReply("no candidates".to_string()))
        }
    }

    #[tokio::test]
    async fn tick_during_an_outstanding_request_is_dropped() {
        let analyzer = Analyzer::new(HeldGateway::default());
        assert!(analyzer.start_capture());

        let first = analyzer.on_tick("squat", ok_frame);
        let second = async {
            tokio::task::yield_now().await;
            assert_eq!(analyzer.state(), SessionState::Analyzing);
            let outcome = analyzer.on_tick("squat", ok_frame).await;
            analyzer.gateway().release.notify_one();
            outcome
        };

        let (first, second) = tokio::join!(first, second);

        assert!(matches!(first, TickOutcome::Completed(Ok(_))));
        assert!(matches!(second, TickOutcome::Dropped));
        assert_eq!(analyzer.gateway().calls.load(Ordering::SeqCst), 1);
        assert_eq!(analyzer.state(), SessionState::Capturing);
    }

    #[tokio::test]
    async fn manual_request_during_an_outstanding_one_is_rejected() {
        let analyzer = Analyzer::new(HeldGateway::default());
        assert!(analyzer.start_capture());

        let tick = analyzer.on_tick("squat", ok_frame);
        let manual = async {
            tokio::task::yield_now().await;
            let result = analyzer
                .analyze_now("squat", CaptureMode::Frame, ok_frame)
                .await;
            analyzer.gateway().release.notify_one();
            result
        };

        let (tick, manual) = tokio::join!(tick, manual);

        assert!(matches!(tick, TickOutcome::Completed(Ok(_))));
        let err = manual.unwrap_err();
        assert!(matches!(err, AnalyzeError::Busy));
        assert!(err.user_message().contains("already in progress"));
        assert_eq!(analyzer.gateway().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_media_never_reaches_the_gateway() {
        let analyzer = Analyzer::new(CountingGateway::default());
        assert!(analyzer.start_capture());

        for media in ["", "AAAA", "data:video/webm;base64,AAAA", "data:image/png,AAAA"] {
            let outcome = analyzer
                .on_tick("squat", || Ok::<_, Infallible>(media.to_string()))
                .await;
            match outcome {
                TickOutcome::Completed(Err(AnalyzeError::Validation(err))) => {
                    assert_eq!(err.field(), "media")
                }
                other => panic!("unexpected outcome for {media:?}: {other:?}"),
            }
        }

        assert_eq!(analyzer.gateway().calls.load(Ordering::SeqCst), 0);
        assert_eq!(analyzer.state(), SessionState::Capturing);
    }

    #[tokio::test]
    async fn invalid_activity_is_shown_with_the_field_name() {
        let analyzer = Analyzer::new(CountingGateway::default());

        let err = analyzer
            .analyze_now("deadlift", CaptureMode::Frame, ok_frame)
            .await
            .unwrap_err();

        assert!(matches!(err, AnalyzeError::Validation(ValidationError::Activity(_))));
        assert_eq!(analyzer.gateway().calls.load(Ordering::SeqCst), 0);
        match analyzer.latest().unwrap().verdict {
            Verdict::Error(message) => assert!(message.contains("activity"), "{message}"),
            other => panic!("unexpected verdict: {other:?}"),
        }
    }

    #[tokio::test]
    async fn clip_analysis_records_the_latest_result() {
        let analyzer = Analyzer::new(CountingGateway::default());
        assert!(analyzer.start_recording());
        assert_eq!(analyzer.state(), SessionState::Recording);
        analyzer.stop();

        let result = analyzer
            .analyze_now("desk_sitting", CaptureMode::Clip, || {
                Ok::<_, Infallible>("data:video/mp4;base64,AAAAIGZ0eXA=".to_string())
            })
            .await
            .unwrap();

        assert!(result.feedback.contains("desk_sitting"));
        assert_eq!(analyzer.latest().unwrap().verdict, Verdict::Result(result));
        assert_eq!(analyzer.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn capture_failure_is_unexpected_and_releases_the_session() {
        let analyzer = Analyzer::new(CountingGateway::default());
        assert!(analyzer.start_capture());

        let outcome = analyzer
            .on_tick("squat", || Err::<String, _>("camera unplugged"))
            .await;
        match outcome {
            TickOutcome::Completed(Err(err @ AnalyzeError::Unexpected(_))) => {
                assert_eq!(
                    err.user_message(),
                    "An unexpected error occurred. Please try again."
                );
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        assert!(matches!(
            analyzer.on_tick("squat", ok_frame).await,
            TickOutcome::Completed(Ok(_))
        ));
        assert_eq!(analyzer.gateway().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn inference_failure_shows_the_generic_message() {
        let analyzer = Analyzer::new(FailingGateway);
        assert!(analyzer.start_capture());

        assert!(matches!(
            analyzer.on_tick("squat", ok_frame).await,
            TickOutcome::Completed(Err(AnalyzeError::Inference(_)))
        ));
        assert_eq!(
            analyzer.latest().unwrap().verdict,
            Verdict::Error(INFERENCE_FAILURE_MESSAGE.to_string())
        );
        assert_eq!(analyzer.state(), SessionState::Capturing);
    }

    #[tokio::test]
    async fn ticks_are_ignored_unless_capturing() {
        let analyzer = Analyzer::new(CountingGateway::default());
        assert!(matches!(
            analyzer.on_tick("squat", ok_frame).await,
            TickOutcome::NotCapturing
        ));

        assert!(analyzer.start_capture());
        analyzer.stop();
        assert!(matches!(
            analyzer.on_tick("squat", ok_frame).await,
            TickOutcome::NotCapturing
        ));
        assert_eq!(analyzer.gateway().calls.load(Ordering::SeqCst), 0);
        assert!(analyzer.latest().is_none());
    }

    #[test]
    fn only_single_step_transitions_are_allowed() {
        let analyzer = Analyzer::new(CountingGateway::default());
        assert_eq!(analyzer.state(), SessionState::Idle);

        assert!(analyzer.start_capture());
        assert!(!analyzer.start_recording());
        assert!(!analyzer.start_capture());

        analyzer.stop();
        assert!(analyzer.start_recording());
        assert!(!analyzer.start_capture());
        assert_eq!(analyzer.state(), SessionState::Recording);
    }
}
