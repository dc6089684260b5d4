use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::exam::{OptionLetter, Question};
use crate::core::time::deserialize_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum SessionStatus {
    InProgress,
    Submitted,
    Completed,
    Expired,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExamSession {
    pub(crate) id: i64,
    #[serde(default)]
    pub(crate) exam_id: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub(crate) start_time: Option<OffsetDateTime>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub(crate) end_time: Option<OffsetDateTime>,
    #[serde(default = "default_status")]
    pub(crate) status: SessionStatus,
    #[serde(default)]
    pub(crate) obtained_marks: Option<f64>,
}

fn default_status() -> SessionStatus {
    SessionStatus::InProgress
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnswerRequest {
    pub(crate) question_id: i64,
    pub(crate) selected_answer: OptionLetter,
}

/// A stored answer as echoed back by the server. The question it belongs to
/// is not part of the payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StudentAnswer {
    #[serde(default)]
    pub(crate) id: Option<i64>,
    #[serde(default)]
    pub(crate) selected_answer: Option<String>,
    #[serde(default)]
    pub(crate) is_correct: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SessionDetail {
    pub(crate) session: ExamSession,
    #[serde(default)]
    pub(crate) questions: Vec<Question>,
    #[serde(default)]
    pub(crate) answers: Vec<StudentAnswer>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_request_uses_wire_names() {
        let body = AnswerRequest {
            question_id: 7,
            selected_answer: OptionLetter::B,
        };
        let value = serde_json::to_value(&body).expect("json");
        assert_eq!(value, serde_json::json!({"questionId": 7, "selectedAnswer": "B"}));
    }

    #[test]
    fn session_decodes_with_sparse_fields() {
        let session: ExamSession = serde_json::from_value(serde_json::json!({
            "id": 42,
            "startTime": "2026-03-01T10:00:00",
            "status": "IN_PROGRESS"
        }))
        .expect("session");
        assert_eq!(session.id, 42);
        assert_eq!(session.status, SessionStatus::InProgress);
        assert!(session.start_time.is_some());
        assert!(session.end_time.is_none());
    }
}
