use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant};

use crate::exam::controller::ExamController;
use crate::exam::state::{SessionPhase, TickOutcome};

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Background countdown for one exam attempt. Dropping it stops the loop.
pub(crate) struct Ticker {
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    pub(crate) fn spawn(
        controller: ExamController,
        ticks: Option<mpsc::UnboundedSender<TickOutcome>>,
    ) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(tick_loop(controller, ticks, shutdown_rx));
        Self { shutdown, handle: Some(handle) }
    }

    /// Signals the loop and waits for it to finish its current tick.
    pub(crate) async fn stop(mut self) {
        self.signal();
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                tracing::error!(error = %err, "Exam ticker join failed");
            }
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    fn signal(&self) {
        if self.shutdown.send(true).is_err() {
            tracing::debug!("Exam ticker already stopped");
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.signal();
    }
}

async fn tick_loop(
    controller: ExamController,
    ticks: Option<mpsc::UnboundedSender<TickOutcome>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
    let exam_id = controller.exam().id;
    tracing::debug!(exam_id, "Exam ticker started");

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = interval.tick() => {}
        }

        if *shutdown.borrow() {
            break;
        }

        let outcome = controller.tick().await;
        if let Some(ticks) = &ticks {
            // The view may already be gone; the countdown does not depend on it.
            let _ = ticks.send(outcome);
        }

        if outcome == TickOutcome::Expired || controller.phase().await == SessionPhase::Submitted {
            break;
        }
    }

    tracing::debug!(exam_id, "Exam ticker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::core::notify::Notifier;
    use crate::exam::autosave::RetryPolicy;
    use crate::exam::controller::ExamOptions;
    use crate::test_support::{sample_exam, FakeBackend};

    fn controller(backend: Arc<FakeBackend>, minutes: u32) -> ExamController {
        let (notifier, _rx) = Notifier::channel();
        ExamController::new(
            sample_exam(minutes),
            backend,
            notifier,
            ExamOptions {
                retry: RetryPolicy { max_retries: 0, base_delay: Duration::from_millis(1) },
                warning_seconds: 10,
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn counts_down_and_submits_on_expiry() {
        let backend = Arc::new(FakeBackend::new(2));
        let controller = controller(backend.clone(), 1);
        controller.start_session().await.expect("start");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let ticker = Ticker::spawn(controller.clone(), Some(tx));

        let mut seen = Vec::new();
        while let Some(outcome) = rx.recv().await {
            seen.push(outcome);
        }
        assert_eq!(seen.len(), 60);
        assert_eq!(seen.first(), Some(&TickOutcome::Running(59)));
        assert_eq!(seen.last(), Some(&TickOutcome::Expired));
        assert_eq!(backend.submit_calls(), 1);
        assert_eq!(controller.phase().await, SessionPhase::Submitted);
        ticker.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_ticker_never_submits() {
        let backend = Arc::new(FakeBackend::new(2));
        let controller = controller(backend.clone(), 1);
        controller.start_session().await.expect("start");

        let ticker = Ticker::spawn(controller.clone(), None);
        tokio::time::sleep(Duration::from_millis(10_500)).await;
        ticker.stop().await;
        let remaining = controller.remaining_seconds().await;
        assert_eq!(remaining, 50);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(controller.remaining_seconds().await, remaining);
        assert_eq!(backend.submit_calls(), 0);
        assert_eq!(controller.phase().await, SessionPhase::InProgress);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_ticker_stops_it() {
        let backend = Arc::new(FakeBackend::new(1));
        let controller = controller(backend.clone(), 1);
        controller.start_session().await.expect("start");

        drop(Ticker::spawn(controller.clone(), None));
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(backend.submit_calls(), 0);
        assert_eq!(controller.remaining_seconds().await, 60);
    }
}
