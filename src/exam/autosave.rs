use std::collections::HashMap;
use std::time::Duration;

use crate::api::errors::ApiError;
use crate::core::config::Settings;
use crate::exam::ExamBackend;
use crate::schemas::session::AnswerRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SaveStatus {
    Pending,
    Saved,
    Failed,
}

#[derive(Debug, Clone, Copy)]
struct SaveEntry {
    generation: u64,
    status: SaveStatus,
}

/// Per-question save status. Every selection gets a fresh generation, and
/// only the outcome for the latest generation of a question is recorded.
#[derive(Debug, Default)]
pub(crate) struct AutosaveTracker {
    entries: HashMap<i64, SaveEntry>,
    next_generation: u64,
}

impl AutosaveTracker {
    pub(crate) fn begin(&mut self, question_id: i64) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.entries.insert(question_id, SaveEntry { generation, status: SaveStatus::Pending });
        generation
    }

    /// Returns `false` when the outcome is stale and was ignored.
    pub(crate) fn finish(&mut self, question_id: i64, generation: u64, saved: bool) -> bool {
        match self.entries.get_mut(&question_id) {
            Some(entry) if entry.generation == generation => {
                entry.status = if saved { SaveStatus::Saved } else { SaveStatus::Failed };
                true
            }
            _ => false,
        }
    }

    pub(crate) fn status(&self, question_id: i64) -> Option<SaveStatus> {
        self.entries.get(&question_id).map(|entry| entry.status)
    }

    /// Questions whose latest answer is not confirmed by the server.
    pub(crate) fn unsaved(&self) -> Vec<i64> {
        let mut ids = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.status != SaveStatus::Saved)
            .map(|(question_id, _)| *question_id)
            .collect::<Vec<_>>();
        ids.sort_unstable();
        ids
    }

    pub(crate) fn retain(&mut self, mut keep: impl FnMut(i64) -> bool) {
        self.entries.retain(|question_id, _| keep(*question_id));
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    pub(crate) max_retries: u32,
    pub(crate) base_delay: Duration,
}

impl RetryPolicy {
    pub(crate) fn from_settings(settings: &Settings) -> Self {
        Self {
            max_retries: settings.exam().autosave_max_retries,
            base_delay: Duration::from_millis(settings.exam().autosave_backoff_ms),
        }
    }

    pub(crate) fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2_u32.saturating_pow(attempt))
    }
}

/// Sends one answer, retrying transient failures with exponential backoff.
pub(crate) async fn save_with_retry(
    backend: &dyn ExamBackend,
    session_id: i64,
    request: &AnswerRequest,
    policy: RetryPolicy,
) -> Result<(), ApiError> {
    let mut attempt = 0;
    loop {
        match backend.submit_answer(session_id, request).await {
            Ok(()) => return Ok(()),
            Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                let backoff = policy.delay_for(attempt);
                tracing::warn!(
                    session_id,
                    question_id = request.question_id,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "Autosave failed; retrying"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
