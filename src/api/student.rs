use async_trait::async_trait;
use serde_json::Value;

use crate::api::client::{decode_list, ApiClient};
use crate::api::errors::ApiError;
use crate::exam::ExamBackend;
use crate::schemas::exam::{Exam, Question};
use crate::schemas::results::{ResultSummary, ResultsOverview};
use crate::schemas::session::{AnswerRequest, ExamSession, SessionDetail};

#[derive(Debug, Clone)]
pub(crate) struct StudentApi {
    client: ApiClient,
}

impl StudentApi {
    pub(crate) fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub(crate) async fn dashboard(&self) -> Result<Value, ApiError> {
        self.client.get("/student/dashboard").await
    }

    pub(crate) async fn available_exams(&self) -> Result<Vec<Exam>, ApiError> {
        self.client.get_list("/student/exams/available").await
    }

    pub(crate) async fn exam(&self, exam_id: i64) -> Result<Exam, ApiError> {
        self.client.get(&format!("/student/exams/{exam_id}")).await
    }

    pub(crate) async fn start_exam(&self, exam_id: i64) -> Result<ExamSession, ApiError> {
        self.client.post_empty(&format!("/student/exams/{exam_id}/start")).await
    }

    pub(crate) async fn exam_questions(&self, exam_id: i64) -> Result<Vec<Question>, ApiError> {
        self.client.get_list(&format!("/student/exams/{exam_id}/questions")).await
    }

    pub(crate) async fn session(&self, session_id: i64) -> Result<SessionDetail, ApiError> {
        self.client.get(&format!("/student/exam-sessions/{session_id}")).await
    }

    pub(crate) async fn submit_answer(
        &self,
        session_id: i64,
        answer: &AnswerRequest,
    ) -> Result<(), ApiError> {
        let _: Value =
            self.client.post(&format!("/student/exam-sessions/{session_id}/answers"), answer).await?;
        Ok(())
    }

    pub(crate) async fn submit_exam(&self, session_id: i64) -> Result<ExamSession, ApiError> {
        self.client.post_empty(&format!("/student/exam-sessions/{session_id}/submit")).await
    }

    /// The overview comes back either as a summary object or as a bare list.
    pub(crate) async fn results(&self) -> Result<ResultsOverview, ApiError> {
        let value: Value = self.client.get("/student/results").await?;
        if value.is_array() {
            let results: Vec<ResultSummary> = decode_list(value)?;
            return Ok(ResultsOverview {
                total_results: results.len() as u64,
                results,
                ..Default::default()
            });
        }
        serde_json::from_value(value).map_err(|err| {
            ApiError::decode(err, "results overview did not match the expected shape")
        })
    }

    pub(crate) async fn result(&self, result_id: i64) -> Result<Value, ApiError> {
        self.client.get(&format!("/student/results/{result_id}")).await
    }
}

#[async_trait]
impl ExamBackend for StudentApi {
    async fn start_exam(&self, exam_id: i64) -> Result<ExamSession, ApiError> {
        StudentApi::start_exam(self, exam_id).await
    }

    async fn exam_questions(&self, exam_id: i64) -> Result<Vec<Question>, ApiError> {
        StudentApi::exam_questions(self, exam_id).await
    }

    async fn submit_answer(&self, session_id: i64, answer: &AnswerRequest) -> Result<(), ApiError> {
        StudentApi::submit_answer(self, session_id, answer).await
    }

    async fn submit_exam(&self, session_id: i64) -> Result<ExamSession, ApiError> {
        StudentApi::submit_exam(self, session_id).await
    }
}
