use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::core::config::Settings;
use crate::core::notify::Notifier;
use crate::core::time::format_countdown;
use crate::exam::autosave::{save_with_retry, RetryPolicy, SaveStatus};
use crate::exam::state::{
    AnswerEffect, Direction, ExamState, NavigatorStatus, SessionPhase, TickOutcome,
    TransitionError,
};
use crate::exam::{ExamBackend, ExamError};
use crate::schemas::exam::{Exam, OptionLetter, Question};
use crate::schemas::session::{AnswerRequest, ExamSession};

#[derive(Debug, Clone, Copy)]
pub(crate) struct ExamOptions {
    pub(crate) retry: RetryPolicy,
    pub(crate) warning_seconds: u64,
}

impl ExamOptions {
    pub(crate) fn from_settings(settings: &Settings) -> Self {
        Self {
            retry: RetryPolicy::from_settings(settings),
            warning_seconds: settings.exam().timer_warning_seconds,
        }
    }
}

#[derive(Debug)]
pub(crate) enum SubmitOutcome {
    Submitted(ExamSession),
    /// Another submission already holds the latch; nothing was sent.
    AlreadyInFlight,
}

/// Everything the exam view needs to draw one frame.
#[derive(Debug, Clone)]
pub(crate) struct ExamSnapshot {
    pub(crate) phase: SessionPhase,
    pub(crate) remaining_seconds: u64,
    pub(crate) low_time: bool,
    pub(crate) current_index: usize,
    pub(crate) total_questions: usize,
    pub(crate) current_question: Option<Question>,
    pub(crate) selected: Option<OptionLetter>,
    pub(crate) current_save: Option<SaveStatus>,
    pub(crate) navigator: Vec<NavigatorStatus>,
    pub(crate) answered_count: usize,
    pub(crate) unsaved_count: usize,
    pub(crate) submitting: bool,
}

struct Inner {
    state: ExamState,
    session_id: Option<i64>,
}

impl Inner {
    fn session_id(&self, action: &'static str) -> Result<i64, TransitionError> {
        self.session_id
            .ok_or(TransitionError::InvalidPhase { action, phase: self.state.phase() })
    }
}

/// Drives an [`ExamState`] against the server. Cheap to clone; clones share state.
#[derive(Clone)]
pub(crate) struct ExamController {
    exam: Arc<Exam>,
    backend: Arc<dyn ExamBackend>,
    notifier: Notifier,
    options: ExamOptions,
    inner: Arc<Mutex<Inner>>,
}

impl ExamController {
    pub(crate) fn new(
        exam: Exam,
        backend: Arc<dyn ExamBackend>,
        notifier: Notifier,
        options: ExamOptions,
    ) -> Self {
        Self {
            exam: Arc::new(exam),
            backend,
            notifier,
            options,
            inner: Arc::new(Mutex::new(Inner { state: ExamState::new(), session_id: None })),
        }
    }

    pub(crate) fn exam(&self) -> &Exam {
        &self.exam
    }

    /// Opens a server session, then loads the questions. A failed start leaves
    /// the controller untouched so the call can be repeated.
    pub(crate) async fn start_session(&self) -> Result<(), ExamError> {
        let exam_id = self.exam.id;
        {
            let mut inner = self.inner.lock().await;
            if inner.state.phase() != SessionPhase::NotStarted {
                return Err(TransitionError::InvalidPhase {
                    action: "start",
                    phase: inner.state.phase(),
                }
                .into());
            }
            if self.exam.duration_seconds() == 0 {
                tracing::warn!(exam_id, "Exam has no duration; not starting");
                self.notifier.error("This exam has no time allotted");
                return Err(TransitionError::NoTimeAllotted.into());
            }

            let session = match self.backend.start_exam(exam_id).await {
                Ok(session) => session,
                Err(err) => {
                    tracing::error!(exam_id, error = %err, "Failed to start exam");
                    self.notifier.error("Failed to start exam");
                    return Err(err.into());
                }
            };

            inner.state.begin(self.exam.duration_seconds())?;
            inner.session_id = Some(session.id);
            tracing::info!(
                exam_id,
                session_id = session.id,
                duration_minutes = self.exam.duration_minutes,
                "Exam session started"
            );
        }

        self.notifier.success("Exam started successfully!");
        if let Err(err) = self.reload_questions().await {
            tracing::warn!(exam_id, error = %err, "Exam started without questions");
        }
        Ok(())
    }

    pub(crate) async fn reload_questions(&self) -> Result<usize, ExamError> {
        let exam_id = self.exam.id;
        {
            let inner = self.inner.lock().await;
            if inner.state.phase() != SessionPhase::InProgress {
                return Err(TransitionError::InvalidPhase {
                    action: "load questions",
                    phase: inner.state.phase(),
                }
                .into());
            }
        }

        let questions = match self.backend.exam_questions(exam_id).await {
            Ok(questions) => questions,
            Err(err) => {
                tracing::error!(exam_id, error = %err, "Failed to load exam questions");
                self.notifier.error("Failed to load questions. Type 'r' to retry.");
                return Err(err.into());
            }
        };

        let count = questions.len();
        if let Err(err) = self.inner.lock().await.state.load_questions(questions) {
            tracing::info!(
                exam_id,
                error = %err,
                "Discarding questions fetched for a closed attempt"
            );
            return Err(err.into());
        }
        tracing::info!(exam_id, count, "Exam questions loaded");
        Ok(count)
    }

    /// Records the answer locally, then saves it in the background. The
    /// returned handle resolves once the save settles.
    pub(crate) async fn select_answer(
        &self,
        question_id: i64,
        option: OptionLetter,
    ) -> Result<JoinHandle<()>, ExamError> {
        let (effect, session_id) = {
            let mut inner = self.inner.lock().await;
            let session_id = inner.session_id("answer")?;
            (inner.state.select_answer(question_id, option)?, session_id)
        };

        let controller = self.clone();
        Ok(tokio::spawn(async move { controller.autosave(session_id, effect).await }))
    }

    /// Answers whichever question is on screen.
    pub(crate) async fn answer_current(
        &self,
        option: OptionLetter,
    ) -> Result<JoinHandle<()>, ExamError> {
        let question_id = {
            let inner = self.inner.lock().await;
            inner.state.current_question().map(|question| question.id)
        };
        match question_id {
            Some(question_id) => self.select_answer(question_id, option).await,
            None => Err(ExamError::NoQuestionsLoaded),
        }
    }

    async fn autosave(&self, session_id: i64, effect: AnswerEffect) {
        let request =
            AnswerRequest { question_id: effect.question_id, selected_answer: effect.option };
        let result =
            save_with_retry(self.backend.as_ref(), session_id, &request, self.options.retry).await;

        let latest = self.inner.lock().await.state.record_save(
            effect.question_id,
            effect.generation,
            result.is_ok(),
        );

        match result {
            Ok(()) => {
                tracing::debug!(session_id, question_id = effect.question_id, "Answer saved");
            }
            Err(err) => {
                tracing::error!(
                    session_id,
                    question_id = effect.question_id,
                    error = %err,
                    "Answer could not be saved"
                );
                if latest {
                    self.notifier.warning(format!(
                        "Your answer ({}) could not be saved and is marked unsaved.",
                        effect.option
                    ));
                }
            }
        }
    }

    pub(crate) async fn advance(&self, direction: Direction) -> usize {
        self.inner.lock().await.state.advance(direction)
    }

    pub(crate) async fn jump_to(&self, index: usize) -> usize {
        self.inner.lock().await.state.jump_to(index)
    }

    /// One second of countdown. Reaching zero submits, at most once.
    pub(crate) async fn tick(&self) -> TickOutcome {
        let outcome = self.inner.lock().await.state.tick();
        match outcome {
            TickOutcome::Running(remaining) if remaining == self.options.warning_seconds => {
                self.notifier.warning(format!("Only {} left!", format_countdown(remaining)));
            }
            TickOutcome::Expired => {
                tracing::info!(exam_id = self.exam.id, "Exam time expired; submitting");
                self.notifier.warning("Time is up! Submitting your exam.");
                if let Err(err) = self.submit_session().await {
                    tracing::warn!(exam_id = self.exam.id, error = %err, "Expiry submit failed");
                }
            }
            TickOutcome::Running(_) | TickOutcome::Idle => {}
        }
        outcome
    }

    /// Submits the attempt. A call made while another submission is in flight
    /// returns [`SubmitOutcome::AlreadyInFlight`] without touching the network.
    pub(crate) async fn submit_session(&self) -> Result<SubmitOutcome, ExamError> {
        let session_id = {
            let mut inner = self.inner.lock().await;
            match inner.state.try_begin_submit() {
                Ok(()) => {}
                Err(TransitionError::SubmitInFlight) => {
                    tracing::debug!(exam_id = self.exam.id, "Submission already in flight");
                    return Ok(SubmitOutcome::AlreadyInFlight);
                }
                Err(err) => return Err(err.into()),
            }
            match inner.session_id("submit") {
                Ok(session_id) => session_id,
                Err(err) => {
                    inner.state.finish_submit(false);
                    return Err(err.into());
                }
            }
        };

        let result = self.backend.submit_exam(session_id).await;
        self.inner.lock().await.state.finish_submit(result.is_ok());

        match result {
            Ok(session) => {
                tracing::info!(exam_id = self.exam.id, session_id, "Exam submitted");
                self.notifier.success("Exam submitted successfully!");
                Ok(SubmitOutcome::Submitted(session))
            }
            Err(err) => {
                tracing::error!(session_id, error = %err, "Failed to submit exam");
                self.notifier.error("Failed to submit exam");
                Err(err.into())
            }
        }
    }

    pub(crate) async fn phase(&self) -> SessionPhase {
        self.inner.lock().await.state.phase()
    }

    #[cfg(test)]
    pub(crate) async fn remaining_seconds(&self) -> u64 {
        self.inner.lock().await.state.remaining_seconds()
    }

    #[cfg(test)]
    pub(crate) async fn answers(&self) -> std::collections::BTreeMap<i64, OptionLetter> {
        self.inner.lock().await.state.answers().clone()
    }

    #[cfg(test)]
    pub(crate) async fn save_status(&self, question_id: i64) -> Option<SaveStatus> {
        self.inner.lock().await.state.save_status(question_id)
    }

    #[cfg(test)]
    pub(crate) async fn questions(&self) -> Vec<Question> {
        self.inner.lock().await.state.questions().to_vec()
    }

    pub(crate) async fn snapshot(&self) -> ExamSnapshot {
        let inner = self.inner.lock().await;
        let state = &inner.state;
        let current_question = state.current_question().cloned();
        let selected = current_question
            .as_ref()
            .and_then(|question| state.answers().get(&question.id).copied());
        let current_save =
            current_question.as_ref().and_then(|question| state.save_status(question.id));

        ExamSnapshot {
            phase: state.phase(),
            remaining_seconds: state.remaining_seconds(),
            low_time: state.remaining_seconds() <= self.options.warning_seconds,
            current_index: state.current_index(),
            total_questions: state.questions().len(),
            current_question,
            selected,
            current_save,
            navigator: state.navigator(),
            answered_count: state.answered_count(),
            unsaved_count: state.unsaved_questions().len(),
            submitting: state.is_submitting(),
        }
    }
}
