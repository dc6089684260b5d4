use tokio::sync::mpsc;

use crate::core::notify::Notifier;
use crate::exam::controller::ExamController;
use crate::exam::monitor::{AdvisoryMonitor, EnvironmentEvent};
use crate::exam::state::TickOutcome;
use crate::exam::timer::Ticker;
use crate::exam::ExamError;

/// Owns the moving parts of an attempt in progress: the countdown task and
/// the advisory monitor. Leaving (or dropping) the runner stops both.
pub(crate) struct ExamRunner {
    controller: ExamController,
    ticker: Option<Ticker>,
    monitor: AdvisoryMonitor,
}

impl ExamRunner {
    /// Starts the session; the countdown and monitor only exist once that succeeded.
    pub(crate) async fn start(
        controller: ExamController,
        notifier: Notifier,
    ) -> Result<(Self, mpsc::UnboundedReceiver<TickOutcome>), ExamError> {
        controller.start_session().await?;

        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        let ticker = Ticker::spawn(controller.clone(), Some(tick_tx));
        let mut monitor = AdvisoryMonitor::new(notifier);
        monitor.attach();

        Ok((Self { controller, ticker: Some(ticker), monitor }, tick_rx))
    }

    pub(crate) fn controller(&self) -> &ExamController {
        &self.controller
    }

    pub(crate) fn report(&mut self, event: EnvironmentEvent) -> Option<&'static str> {
        self.monitor.observe(event)
    }

    pub(crate) fn is_ticking(&self) -> bool {
        self.ticker.as_ref().is_some_and(|ticker| !ticker.is_finished())
    }

    pub(crate) async fn leave(mut self) {
        let was_ticking = self.is_ticking();
        let was_monitoring = self.monitor.is_attached();
        self.monitor.detach();
        if let Some(ticker) = self.ticker.take() {
            ticker.stop().await;
        }
        tracing::info!(
            exam_id = self.controller.exam().id,
            was_ticking,
            was_monitoring,
            warnings = self.monitor.warnings(),
            "Left exam view"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::exam::autosave::RetryPolicy;
    use crate::exam::controller::ExamOptions;
    use crate::exam::monitor::KeyChord;
    use crate::exam::state::SessionPhase;
    use crate::test_support::{sample_exam, FakeBackend};

    fn controller(backend: Arc<FakeBackend>, notifier: Notifier) -> ExamController {
        ExamController::new(
            sample_exam(1),
            backend,
            notifier,
            ExamOptions {
                retry: RetryPolicy { max_retries: 0, base_delay: Duration::from_millis(1) },
                warning_seconds: 10,
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn failed_start_spawns_nothing() {
        let backend = Arc::new(FakeBackend::new(1));
        backend.set_fail_start(true);
        let (notifier, _rx) = Notifier::channel();

        let controller = controller(backend.clone(), notifier.clone());
        let result = ExamRunner::start(controller, notifier).await;
        assert!(result.is_err());
        tokio::time::sleep(Duration::from_secs(90)).await;
        assert_eq!(backend.submit_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn leaving_stops_countdown_and_monitor() {
        let backend = Arc::new(FakeBackend::new(2));
        let (notifier, _rx) = Notifier::channel();
        let (mut runner, mut ticks) =
            ExamRunner::start(controller(backend.clone(), notifier.clone()), notifier)
                .await
                .expect("start");
        assert!(runner.is_ticking());

        assert_eq!(ticks.recv().await, Some(TickOutcome::Running(59)));
        assert!(runner.report(EnvironmentEvent::Shortcut(KeyChord::ctrl('p'))).is_some());

        let controller = runner.controller().clone();
        runner.leave().await;
        assert_eq!(ticks.recv().await, None);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(controller.phase().await, SessionPhase::InProgress);
        assert_eq!(controller.remaining_seconds().await, 59);
        assert_eq!(backend.submit_calls(), 0);
    }
}
