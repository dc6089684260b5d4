use reqwest::multipart::{Form, Part};
use serde_json::Value;
use validator::Validate;

use crate::api::client::{decode_list, ApiClient};
use crate::api::errors::ApiError;
use crate::schemas::admin::{
    BulkUploadResponse, Page, PageRequest, StatusUpdate, StudentPage, StudentStatus,
};
use crate::schemas::exam::{
    AdminQuestion, CategoryPayload, Exam, ExamCategory, ExamPayload, QuestionPayload,
};
use crate::services::question_import::SpreadsheetUpload;

/// Admin console operations. Payloads are validated before anything is sent.
#[derive(Debug, Clone)]
pub(crate) struct AdminApi {
    client: ApiClient,
}

impl AdminApi {
    pub(crate) fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub(crate) async fn dashboard_stats(&self) -> Result<Value, ApiError> {
        self.client.get("/admin/dashboard/stats").await
    }

    pub(crate) async fn recent_activity(&self) -> Result<Value, ApiError> {
        self.client.get("/admin/dashboard/recent-activity").await
    }

    pub(crate) async fn categories(&self) -> Result<Vec<ExamCategory>, ApiError> {
        self.client.get_list("/admin/exam-categories").await
    }

    pub(crate) async fn create_category(
        &self,
        payload: &CategoryPayload,
    ) -> Result<ExamCategory, ApiError> {
        payload.validate()?;
        let created: ExamCategory = self.client.post("/admin/exam-categories", payload).await?;
        tracing::info!(category_id = created.id, "Exam category created");
        Ok(created)
    }

    pub(crate) async fn update_category(
        &self,
        category_id: i64,
        payload: &CategoryPayload,
    ) -> Result<ExamCategory, ApiError> {
        payload.validate()?;
        self.client.put(&format!("/admin/exam-categories/{category_id}"), payload).await
    }

    pub(crate) async fn delete_category(&self, category_id: i64) -> Result<(), ApiError> {
        self.client.delete(&format!("/admin/exam-categories/{category_id}")).await?;
        tracing::info!(category_id, "Exam category deleted");
        Ok(())
    }

    /// Page of exams; a bare list is folded into a single page.
    pub(crate) async fn exams(&self, page: PageRequest) -> Result<Page<Exam>, ApiError> {
        let value: Value = self
            .client
            .get_with_query("/admin/exams", &[("page", page.page), ("size", page.size)])
            .await?;

        if value.get("content").is_some() {
            return serde_json::from_value(value)
                .map_err(|err| ApiError::decode(err, "exam page did not match the expected shape"));
        }

        let content: Vec<Exam> = decode_list(value)?;
        let total = content.len() as u64;
        Ok(Page {
            content,
            total_elements: total,
            total_pages: 1,
            number: 0,
            size: total,
        })
    }

    pub(crate) async fn create_exam(&self, payload: &ExamPayload) -> Result<Exam, ApiError> {
        payload.validate()?;
        let created: Exam = self.client.post("/admin/exams", payload).await?;
        tracing::info!(exam_id = created.id, "Exam created");
        Ok(created)
    }

    pub(crate) async fn update_exam(
        &self,
        exam_id: i64,
        payload: &ExamPayload,
    ) -> Result<Exam, ApiError> {
        payload.validate()?;
        self.client.put(&format!("/admin/exams/{exam_id}"), payload).await
    }

    pub(crate) async fn delete_exam(&self, exam_id: i64) -> Result<(), ApiError> {
        self.client.delete(&format!("/admin/exams/{exam_id}")).await?;
        tracing::info!(exam_id, "Exam deleted");
        Ok(())
    }

    pub(crate) async fn questions(&self, exam_id: i64) -> Result<Vec<AdminQuestion>, ApiError> {
        self.client.get_list(&format!("/admin/questions/exam/{exam_id}")).await
    }

    pub(crate) async fn create_question(
        &self,
        payload: &QuestionPayload,
    ) -> Result<AdminQuestion, ApiError> {
        payload.validate()?;
        self.client.post("/admin/questions", payload).await
    }

    pub(crate) async fn update_question(
        &self,
        question_id: i64,
        payload: &QuestionPayload,
    ) -> Result<AdminQuestion, ApiError> {
        payload.validate()?;
        self.client.put(&format!("/admin/questions/{question_id}"), payload).await
    }

    pub(crate) async fn delete_question(&self, question_id: i64) -> Result<(), ApiError> {
        self.client.delete(&format!("/admin/questions/{question_id}")).await
    }

    pub(crate) async fn bulk_import(
        &self,
        exam_id: i64,
        upload: SpreadsheetUpload,
    ) -> Result<BulkUploadResponse, ApiError> {
        upload.validate()?;
        let mime = upload.mime_type();
        let file_name = upload.file_name.clone();
        let size = upload.bytes.len();

        let part = Part::bytes(upload.bytes)
            .file_name(file_name.clone())
            .mime_str(mime)
            .map_err(ApiError::Transport)?;
        let form = Form::new().part("file", part).text("examId", exam_id.to_string());

        let response: BulkUploadResponse =
            self.client.post_multipart("/admin/questions/bulk", form).await?;
        if let Some(error) = response.error.clone() {
            return Err(ApiError::Validation { status: 200, message: error });
        }

        tracing::info!(
            exam_id,
            file = %file_name,
            size,
            questions_added = response.questions_added,
            "Bulk question import accepted"
        );
        Ok(response)
    }

    pub(crate) async fn download_template(&self) -> Result<Vec<u8>, ApiError> {
        let bytes = self.client.get_bytes("/admin/questions/template").await?;
        if bytes.is_empty() {
            return Err(ApiError::Decode("question template was empty".to_string()));
        }
        Ok(bytes)
    }

    pub(crate) async fn students(
        &self,
        page: PageRequest,
        status: Option<StudentStatus>,
    ) -> Result<StudentPage, ApiError> {
        let mut query = vec![("page", page.page.to_string()), ("size", page.size.to_string())];
        if let Some(status) = status {
            query.push(("status", status.as_str().to_string()));
        }
        self.client.get_with_query("/admin/students", &query).await
    }

    pub(crate) async fn update_student_status(
        &self,
        student_id: i64,
        status: StudentStatus,
    ) -> Result<String, ApiError> {
        let message = self
            .client
            .put_text(&format!("/admin/students/{student_id}/status"), &StatusUpdate { status })
            .await?;
        tracing::info!(student_id, status = status.as_str(), "Student status updated");
        Ok(message)
    }

    pub(crate) async fn result_statistics(&self) -> Result<Value, ApiError> {
        self.client.get("/admin/results/statistics").await
    }

    /// Anything other than a list is treated as "no data".
    pub(crate) async fn exam_wise_results(&self) -> Result<Vec<Value>, ApiError> {
        let value: Value = self.client.get("/admin/results/exam-wise").await?;
        Ok(match value {
            Value::Array(items) => items,
            _ => Vec::new(),
        })
    }

    pub(crate) async fn recent_results(&self, limit: u32) -> Result<Value, ApiError> {
        self.client.get_with_query("/admin/results/recent", &[("limit", limit)]).await
    }

    pub(crate) async fn exam_results(&self, exam_id: i64) -> Result<Value, ApiError> {
        self.client.get(&format!("/admin/results/exam/{exam_id}")).await
    }
}
