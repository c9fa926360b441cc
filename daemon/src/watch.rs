use chrono::Local;
use formcheck_core::{Activity, AnalysisResult, Analyzer, PostureAnalyzer, TickOutcome};
use log::{debug, info, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

use crate::capture::FrameDirectory;

/// Periodic frame capture until `shutdown` resolves.
///
/// Every tick spawns its own task so the timer keeps running while a request
/// is in flight; the analyzer drops ticks that land during one.
pub async fn run<G, S>(
    analyzer: Arc<Analyzer<G>>,
    frames: FrameDirectory,
    activity: Activity,
    period: Duration,
    shutdown: S,
) where
    G: PostureAnalyzer + 'static,
    S: Future<Output = ()>,
{
    if !analyzer.start_capture() {
        warn!(target: "watch", "Session is not idle ({:?}), not starting capture", analyzer.state());
        return;
    }
    info!(
        target: "watch",
        "Capturing {} frames from {} every {:?}",
        activity,
        frames.path().display(),
        period
    );

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                let analyzer = Arc::clone(&analyzer);
                let frames = frames.clone();
                tokio::spawn(async move {
                    let outcome = analyzer.on_tick(activity.as_str(), || frames.snapshot()).await;
                    report(outcome);
                });
            }
        }
    }

    analyzer.stop();
    info!(target: "watch", "Capture stopped");
}

fn report(outcome: TickOutcome) {
    let at = Local::now().format("%H:%M:%S");
    match outcome {
        TickOutcome::Completed(Ok(result)) => println!("[{at}] {}", render(&result)),
        TickOutcome::Completed(Err(err)) => println!("[{at}] {}", err.user_message()),
        TickOutcome::Dropped => debug!(target: "watch", "Tick dropped"),
        TickOutcome::NotCapturing => {}
    }
}

pub fn render(result: &AnalysisResult) -> String {
    let verdict = if result.is_correct {
        "✓ Correct posture"
    } else {
        "✗ Needs correction"
    };
    format!("{verdict}\n{}", result.feedback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use formcheck_core::{AnalysisRequest, InferenceError, SessionState};
    use image::{Rgba, RgbaImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct SlowGateway {
        calls: AtomicUsize,
        delay: Duration,
    }

    impl SlowGateway {
        fn new(delay: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay,
            }
        }
    }

    impl PostureAnalyzer for SlowGateway {
        async fn analyze(&self, _: &AnalysisRequest) -> Result<AnalysisResult, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(AnalysisResult {
                is_correct: true,
                feedback: "Good depth.".to_string(),
            })
        }
    }

    fn frame_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        RgbaImage::from_pixel(32, 24, Rgba([10, 200, 10, 255]))
            .save(dir.path().join("frame.png"))
            .unwrap();
        dir
    }

    #[tokio::test]
    async fn ticks_during_a_slow_request_are_dropped() {
        let dir = frame_dir();
        let analyzer = Arc::new(Analyzer::new(SlowGateway::new(Duration::from_secs(2))));

        run(
            Arc::clone(&analyzer),
            FrameDirectory::new(dir.path()),
            Activity::Squat,
            Duration::from_millis(10),
            tokio::time::sleep(Duration::from_millis(200)),
        )
        .await;

        assert_eq!(analyzer.gateway().calls.load(Ordering::SeqCst), 1);
        assert_eq!(analyzer.state(), SessionState::Analyzing);
    }

    #[tokio::test]
    async fn frames_keep_flowing_when_requests_are_fast() {
        let dir = frame_dir();
        let analyzer = Arc::new(Analyzer::new(SlowGateway::new(Duration::ZERO)));

        run(
            Arc::clone(&analyzer),
            FrameDirectory::new(dir.path()),
            Activity::DeskSitting,
            Duration::from_millis(20),
            tokio::time::sleep(Duration::from_millis(150)),
        )
        .await;

        assert!(analyzer.gateway().calls.load(Ordering::SeqCst) >= 2);
        assert!(analyzer.latest().is_some());
    }

    #[tokio::test]
    async fn a_busy_session_does_not_start_capturing() {
        let dir = frame_dir();
        let analyzer = Arc::new(Analyzer::new(SlowGateway::new(Duration::ZERO)));
        assert!(analyzer.start_recording());

        run(
            Arc::clone(&analyzer),
            FrameDirectory::new(dir.path()),
            Activity::Squat,
            Duration::from_millis(5),
            tokio::time::sleep(Duration::from_millis(50)),
        )
        .await;

        assert_eq!(analyzer.gateway().calls.load(Ordering::SeqCst), 0);
        assert_eq!(analyzer.state(), SessionState::Recording);
    }

    #[test]
    fn render_marks_the_verdict() {
        let good = AnalysisResult {
            is_correct: true,
            feedback: "Good form.".to_string(),
        };
        let bad = AnalysisResult {
            is_correct: false,
            feedback: "Knees caving in.".to_string(),
        };

        assert_eq!(render(&good), "✓ Correct posture\nGood form.");
        assert_eq!(render(&bad), "✗ Needs correction\nKnees caving in.");
    }
}
