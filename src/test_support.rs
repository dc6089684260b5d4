use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{Multipart, Path as UrlPath, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::{oneshot, Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::api::client::ApiClient;
use crate::api::errors::ApiError;
use crate::auth::credentials::StoredCredentials;
use crate::core::config::Settings;
use crate::exam::ExamBackend;
use crate::schemas::auth::{Role, UserProfile};
use crate::schemas::exam::{Exam, Question};
use crate::schemas::session::{AnswerRequest, ExamSession, SessionStatus};

pub(crate) const STUDENT_TOKEN: &str = "student-test-token";
pub(crate) const ADMIN_TOKEN: &str = "admin-test-token";
const SESSION_ID: i64 = 77;

const ENV_KEYS: [&str; 14] = [
    "EXAM_PORTAL_ENV",
    "ENVIRONMENT",
    "EXAM_PORTAL_STRICT_CONFIG",
    "EXAM_PORTAL_API_URL",
    "EXAM_PORTAL_CONNECT_TIMEOUT_SECONDS",
    "EXAM_PORTAL_REQUEST_TIMEOUT_SECONDS",
    "EXAM_PORTAL_CREDENTIALS_PATH",
    "EXAM_PORTAL_AUTOSAVE_MAX_RETRIES",
    "EXAM_PORTAL_AUTOSAVE_BACKOFF_MS",
    "EXAM_PORTAL_TIMER_WARNING_SECONDS",
    "EXAM_PORTAL_LOG_LEVEL",
    "EXAM_PORTAL_LOG_JSON",
    "RUST_LOG",
    "NO_COLOR",
];

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn clear_env() {
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
}

pub(crate) fn temp_dir() -> PathBuf {
    std::env::temp_dir().join(format!("exam-portal-test-{}", Uuid::new_v4()))
}

pub(crate) fn temp_credentials_path() -> PathBuf {
    temp_dir().join("credentials.json")
}

/// Removes the per-test directory that holds `file`.
pub(crate) async fn remove_temp_dir(file: &Path) {
    if let Some(dir) = file.parent() {
        tokio::fs::remove_dir_all(dir).await.ok();
    }
}

pub(crate) fn exam_json(duration_minutes: u32) -> Value {
    json!({
        "id": 1,
        "title": "Sample Quiz",
        "description": "Arithmetic warm-up",
        "categoryId": 1,
        "categoryName": "Mathematics",
        "durationMinutes": duration_minutes,
        "totalMarks": 10,
        "passingMarks": 4,
        "instructions": "Answer every question.",
        "isActive": true
    })
}

pub(crate) fn questions_json(count: usize) -> Value {
    let questions = (0..count)
        .map(|index| {
            json!({
                "id": 101 + index as i64,
                "examId": 1,
                "questionText": format!("What is {index} + 1?"),
                "optionA": format!("{}", index),
                "optionB": format!("{}", index + 1),
                "optionC": format!("{}", index + 2),
                "optionD": format!("{}", index + 3),
                "correctAnswer": "B",
                "marks": 2,
                "difficultyLevel": "EASY"
            })
        })
        .collect::<Vec<_>>();
    Value::Array(questions)
}

pub(crate) fn sample_exam(duration_minutes: u32) -> Exam {
    serde_json::from_value(exam_json(duration_minutes)).expect("sample exam")
}

pub(crate) fn sample_questions(count: usize) -> Vec<Question> {
    serde_json::from_value(questions_json(count)).expect("sample questions")
}

fn session(status: SessionStatus) -> ExamSession {
    ExamSession {
        id: SESSION_ID,
        exam_id: Some(1),
        start_time: None,
        end_time: None,
        status,
        obtained_marks: None,
    }
}

/// In-memory [`ExamBackend`] with failure switches and call counters.
pub(crate) struct FakeBackend {
    question_count: AtomicUsize,
    start_calls: AtomicUsize,
    question_calls: AtomicUsize,
    answer_calls: AtomicUsize,
    submit_calls: AtomicUsize,
    fail_start: AtomicBool,
    fail_questions: AtomicBool,
    fail_submit: AtomicBool,
    answer_failures_left: AtomicU32,
    submit_delay: std::sync::Mutex<Duration>,
    questions_delay: std::sync::Mutex<Duration>,
    answers: std::sync::Mutex<Vec<AnswerRequest>>,
}

impl FakeBackend {
    pub(crate) fn new(question_count: usize) -> Self {
        Self {
            question_count: AtomicUsize::new(question_count),
            start_calls: AtomicUsize::new(0),
            question_calls: AtomicUsize::new(0),
            answer_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            fail_start: AtomicBool::new(false),
            fail_questions: AtomicBool::new(false),
            fail_submit: AtomicBool::new(false),
            answer_failures_left: AtomicU32::new(0),
            submit_delay: std::sync::Mutex::new(Duration::ZERO),
            questions_delay: std::sync::Mutex::new(Duration::ZERO),
            answers: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn set_fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_questions(&self, fail: bool) {
        self.fail_questions.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_submit(&self, fail: bool) {
        self.fail_submit.store(fail, Ordering::SeqCst);
    }

    /// The next `times` answer saves fail with a 500; `u32::MAX` fails forever.
    pub(crate) fn fail_answers_times(&self, times: u32) {
        self.answer_failures_left.store(times, Ordering::SeqCst);
    }

    pub(crate) fn set_submit_delay(&self, delay: Duration) {
        *self.submit_delay.lock().expect("submit delay") = delay;
    }

    pub(crate) fn set_questions_delay(&self, delay: Duration) {
        *self.questions_delay.lock().expect("questions delay") = delay;
    }

    /// Size of the question set served by later fetches.
    pub(crate) fn set_question_count(&self, count: usize) {
        self.question_count.store(count, Ordering::SeqCst);
    }

    pub(crate) fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn question_calls(&self) -> usize {
        self.question_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn answer_calls(&self) -> usize {
        self.answer_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn answers(&self) -> Vec<AnswerRequest> {
        self.answers.lock().expect("answers").clone()
    }
}

#[async_trait]
impl ExamBackend for FakeBackend {
    async fn start_exam(&self, _exam_id: i64) -> Result<ExamSession, ApiError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(ApiError::Server { status: 500 });
        }
        Ok(session(SessionStatus::InProgress))
    }

    async fn exam_questions(&self, _exam_id: i64) -> Result<Vec<Question>, ApiError> {
        self.question_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.questions_delay.lock().expect("questions delay");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_questions.load(Ordering::SeqCst) {
            return Err(ApiError::Server { status: 503 });
        }
        Ok(sample_questions(self.question_count.load(Ordering::SeqCst)))
    }

    async fn submit_answer(&self, _session_id: i64, answer: &AnswerRequest) -> Result<(), ApiError> {
        self.answer_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .answer_failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                0 => None,
                u32::MAX => Some(u32::MAX),
                left => Some(left - 1),
            })
            .is_ok();
        if failing {
            return Err(ApiError::Server { status: 500 });
        }
        self.answers.lock().expect("answers").push(answer.clone());
        Ok(())
    }

    async fn submit_exam(&self, _session_id: i64) -> Result<ExamSession, ApiError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.submit_delay.lock().expect("submit delay");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(ApiError::Server { status: 500 });
        }
        Ok(session(SessionStatus::Submitted))
    }
}

pub(crate) async fn login_as_student(client: &ApiClient) {
    store_login(client, STUDENT_TOKEN, 2, "student@examportal.com", Role::Student).await;
}

pub(crate) async fn login_as_admin(client: &ApiClient) {
    store_login(client, ADMIN_TOKEN, 1, "admin@examportal.com", Role::Admin).await;
}

async fn store_login(client: &ApiClient, token: &str, id: i64, email: &str, role: Role) {
    let credentials = StoredCredentials {
        token: token.to_string(),
        refresh_token: None,
        user: UserProfile { id, email: email.to_string(), name: "Test User".to_string(), role },
    };
    client.credentials().save(&credentials).await.expect("store credentials");
}

#[derive(Default)]
struct Recorded {
    hits: HashMap<String, usize>,
    last_authorization: Option<String>,
    last_query: Option<String>,
    last_body: Option<Value>,
    answers: Vec<Value>,
    submit_count: usize,
    last_upload: Option<(String, String, usize)>,
    bare_results: bool,
}

#[derive(Clone, Default)]
struct MockState {
    recorded: Arc<Mutex<Recorded>>,
}

/// The exam platform's REST API, faked with axum on an ephemeral port.
pub(crate) struct MockBackend {
    base_url: String,
    credentials_path: PathBuf,
    state: MockState,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockBackend {
    pub(crate) async fn spawn() -> Self {
        let state = MockState::default();
        let app = mock_router(state.clone());

        let listener =
            tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind mock backend");
        let address = listener.local_addr().expect("mock backend address");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("mock backend");
        });

        Self {
            base_url: format!("http://{address}/api"),
            credentials_path: temp_credentials_path(),
            state,
            shutdown: Some(shutdown_tx),
        }
    }

    pub(crate) fn settings(&self) -> Settings {
        Settings::for_tests(&self.base_url, self.credentials_path.clone())
    }

    /// A fresh client; all clients of one backend share the credential file.
    pub(crate) fn client(&self) -> ApiClient {
        ApiClient::from_settings(&self.settings()).expect("api client")
    }

    pub(crate) async fn hits(&self, path: &str) -> usize {
        let recorded = self.state.recorded.lock().await;
        recorded.hits.get(&format!("/api{path}")).copied().unwrap_or(0)
    }

    pub(crate) async fn last_authorization(&self) -> Option<String> {
        self.state.recorded.lock().await.last_authorization.clone()
    }

    pub(crate) async fn last_query(&self) -> Option<String> {
        self.state.recorded.lock().await.last_query.clone()
    }

    pub(crate) async fn last_body(&self) -> Option<Value> {
        self.state.recorded.lock().await.last_body.clone()
    }

    pub(crate) async fn answers(&self) -> Vec<Value> {
        self.state.recorded.lock().await.answers.clone()
    }

    pub(crate) async fn submit_count(&self) -> usize {
        self.state.recorded.lock().await.submit_count
    }

    pub(crate) async fn last_upload(&self) -> Option<(String, String, usize)> {
        self.state.recorded.lock().await.last_upload.clone()
    }

    pub(crate) async fn set_bare_results(&self, bare: bool) {
        self.state.recorded.lock().await.bare_results = bare;
    }

    pub(crate) async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            tx.send(()).ok();
        }
        remove_temp_dir(&self.credentials_path).await;
    }
}

fn mock_router(state: MockState) -> Router {
    let api = Router::new()
        .route("/auth/login", post(student_login))
        .route("/auth/admin/login", post(admin_login))
        .route("/auth/student/register", post(register))
        .route("/auth/admin/register", post(register))
        .route("/admin/exam-categories", get(categories))
        .route("/admin/exams", get(exam_page).post(echo_created))
        .route("/admin/questions", post(create_question))
        .route("/admin/questions/bulk", post(bulk_upload))
        .route("/admin/questions/template", get(template))
        .route("/admin/students", get(students))
        .route("/admin/students/:id/status", put(student_status))
        .route("/student/exams/available", get(available_exams))
        .route("/student/exams/:id", get(exam))
        .route("/student/exams/:id/start", post(start_exam))
        .route("/student/exams/:id/questions", get(exam_questions))
        .route("/student/exam-sessions/:id/answers", post(submit_answer))
        .route("/student/exam-sessions/:id/submit", post(submit_exam))
        .route("/student/results", get(results))
        .route("/test/unauthorized", get(|| async { status_with_message(401, "Unauthorized") }))
        .route("/test/forbidden", get(|| async { status_with_message(403, "Forbidden") }))
        .route("/test/server-error", get(|| async { status_with_message(500, "boom") }))
        .route("/test/bad-request", get(|| async { status_with_message(400, "Exam is not active") }))
        .route("/test/not-json", get(|| async { "<html>maintenance</html>" }));

    Router::new()
        .nest("/api", api)
        .layer(middleware::from_fn_with_state(state.clone(), record_request))
        .with_state(state)
}

async fn record_request(State(state): State<MockState>, request: Request, next: Next) -> Response {
    {
        let mut recorded = state.recorded.lock().await;
        *recorded.hits.entry(request.uri().path().to_string()).or_default() += 1;
        recorded.last_authorization = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        recorded.last_query = request.uri().query().map(str::to_string);
    }
    next.run(request).await
}

fn status_with_message(status: u16, message: &str) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({ "message": message }))).into_response()
}

fn auth_body(token: &str, id: i64, email: &str, role: &str, name: &str) -> Value {
    json!({
        "token": token,
        "refreshToken": format!("refresh-{}", role.trim_start_matches("ROLE_").to_lowercase()),
        "type": "Bearer",
        "id": id,
        "email": email,
        "role": role,
        "name": name
    })
}

async fn student_login(Json(body): Json<Value>) -> Response {
    if body["email"] == "student@examportal.com" && body["password"] == "student123" {
        Json(auth_body(STUDENT_TOKEN, 2, "student@examportal.com", "ROLE_STUDENT", "Student User"))
            .into_response()
    } else {
        status_with_message(401, "Bad credentials")
    }
}

async fn admin_login(Json(body): Json<Value>) -> Response {
    if body["email"] == "admin@examportal.com" && body["password"] == "admin123" {
        Json(auth_body(ADMIN_TOKEN, 1, "admin@examportal.com", "ROLE_ADMIN", "Admin User"))
            .into_response()
    } else {
        status_with_message(401, "Bad credentials")
    }
}

async fn register(State(state): State<MockState>, Json(body): Json<Value>) -> Json<Value> {
    state.recorded.lock().await.last_body = Some(body);
    Json(json!({ "message": "Registration successful" }))
}

async fn categories() -> Json<Value> {
    Json(json!({
        "data": [
            { "id": 1, "name": "Mathematics", "description": "Numbers" },
            { "id": 2, "name": "Science", "description": null }
        ]
    }))
}

async fn exam_page() -> Json<Value> {
    Json(json!({
        "content": [exam_json(30)],
        "totalElements": 1,
        "totalPages": 1,
        "number": 0,
        "size": 10
    }))
}

async fn echo_created(State(state): State<MockState>, Json(mut body): Json<Value>) -> Json<Value> {
    state.recorded.lock().await.last_body = Some(body.clone());
    body["id"] = json!(10);
    Json(body)
}

async fn create_question(
    State(state): State<MockState>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.recorded.lock().await.last_body = Some(body.clone());
    let mut created = body.clone();
    created["id"] = json!(500);
    created["examId"] = body["exam"]["id"].clone();
    Json(created)
}

async fn bulk_upload(State(state): State<MockState>, mut multipart: Multipart) -> Response {
    let mut file = None;
    let mut exam_id = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("file") => {
                let name = field.file_name().unwrap_or_default().to_string();
                let size = field.bytes().await.map(|bytes| bytes.len()).unwrap_or(0);
                file = Some((name, size));
            }
            Some("examId") => exam_id = field.text().await.ok(),
            _ => {}
        }
    }

    let (Some((name, size)), Some(exam_id)) = (file, exam_id) else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "Please select a file to upload" })))
            .into_response();
    };
    state.recorded.lock().await.last_upload = Some((name, exam_id, size));
    Json(json!({
        "message": "Successfully uploaded 3 questions",
        "questionsAdded": 3,
        "examTitle": "Sample Quiz"
    }))
    .into_response()
}

async fn template() -> Response {
    (
        [(
            header::CONTENT_TYPE,
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        )],
        b"PK\x03\x04template".to_vec(),
    )
        .into_response()
}

async fn students() -> Json<Value> {
    Json(json!({
        "students": [{
            "id": 5,
            "email": "asha@example.com",
            "fullName": "Asha Rao",
            "phone": "9876543210",
            "dateOfBirth": "2001-04-09",
            "status": "ACTIVE"
        }],
        "totalElements": 1,
        "totalPages": 1,
        "currentPage": 0,
        "statistics": { "totalStudents": 1, "activeStudents": 1 }
    }))
}

async fn student_status(
    State(state): State<MockState>,
    UrlPath(_id): UrlPath<i64>,
    Json(body): Json<Value>,
) -> &'static str {
    state.recorded.lock().await.last_body = Some(body);
    "Student status updated successfully"
}

async fn available_exams() -> Json<Value> {
    Json(json!([exam_json(1)]))
}

async fn exam(UrlPath(id): UrlPath<i64>) -> Response {
    if id == 1 {
        Json(exam_json(1)).into_response()
    } else {
        status_with_message(404, "Exam not found")
    }
}

async fn start_exam(UrlPath(_id): UrlPath<i64>) -> Json<Value> {
    Json(json!({
        "id": SESSION_ID,
        "startTime": "2026-03-01T10:00:00",
        "endTime": null,
        "status": "IN_PROGRESS",
        "obtainedMarks": null
    }))
}

async fn exam_questions(UrlPath(_id): UrlPath<i64>) -> Json<Value> {
    Json(questions_json(3))
}

async fn submit_answer(
    State(state): State<MockState>,
    UrlPath(_session_id): UrlPath<i64>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let selected = body["selectedAnswer"].clone();
    state.recorded.lock().await.answers.push(body);
    Json(json!({ "id": 1, "selectedAnswer": selected }))
}

async fn submit_exam(
    State(state): State<MockState>,
    UrlPath(session_id): UrlPath<i64>,
) -> Json<Value> {
    state.recorded.lock().await.submit_count += 1;
    Json(json!({
        "id": session_id,
        "startTime": "2026-03-01T10:00:00",
        "endTime": "2026-03-01T10:01:00",
        "status": "COMPLETED",
        "obtainedMarks": 4
    }))
}

async fn results(State(state): State<MockState>) -> Json<Value> {
    let summary = json!({
        "id": SESSION_ID,
        "examTitle": "Sample Quiz",
        "examCategory": "Mathematics",
        "obtainedMarks": 8.0,
        "totalMarks": 10.0,
        "passingMarks": 4.0,
        "percentage": 80.0,
        "status": "PASSED",
        "completedAt": "2026-03-01 10:01",
        "duration": "1 min"
    });

    if state.recorded.lock().await.bare_results {
        return Json(json!([summary]));
    }
    Json(json!({
        "results": [summary],
        "totalResults": 1,
        "averagePercentage": 80.0,
        "passedExams": 1,
        "failedExams": 0,
        "passRate": 100.0
    }))
}
