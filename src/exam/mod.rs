pub(crate) mod autosave;
pub(crate) mod controller;
pub(crate) mod monitor;
pub(crate) mod runner;
pub(crate) mod state;
pub(crate) mod timer;

use async_trait::async_trait;
use thiserror::Error;

use crate::api::errors::ApiError;
use crate::schemas::exam::Question;
use crate::schemas::session::{AnswerRequest, ExamSession};
use state::TransitionError;

/// The four server calls an exam attempt needs.
#[async_trait]
pub(crate) trait ExamBackend: Send + Sync {
    async fn start_exam(&self, exam_id: i64) -> Result<ExamSession, ApiError>;

    async fn exam_questions(&self, exam_id: i64) -> Result<Vec<Question>, ApiError>;

    async fn submit_answer(&self, session_id: i64, answer: &AnswerRequest)
        -> Result<(), ApiError>;

    async fn submit_exam(&self, session_id: i64) -> Result<ExamSession, ApiError>;
}

#[derive(Debug, Error)]
pub(crate) enum ExamError {
    #[error(transparent)]
    InvalidTransition(TransitionError),
    #[error("question {0} is not part of this exam")]
    UnknownQuestion(i64),
    #[error("no questions are loaded; type 'r' to reload them")]
    NoQuestionsLoaded,
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl From<TransitionError> for ExamError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::UnknownQuestion(question_id) => Self::UnknownQuestion(question_id),
            other => Self::InvalidTransition(other),
        }
    }
}
