use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use time::OffsetDateTime;

use crate::api::admin::AdminApi;
use crate::api::auth::AuthApi;
use crate::api::client::ApiClient;
use crate::api::errors::ApiError;
use crate::api::student::StudentApi;
use crate::auth::guards::{authorize, home_for, Access, Route};
use crate::auth::token::peek_claims;
use crate::cli::{exam_view, AdminCommand, Command, ExamFields, QuestionFields, USAGE};
use crate::core::config::Settings;
use crate::core::time::format_offset;
use crate::schemas::auth::{
    AdminRegistration, LoginRequest, Portal, StudentRegistration, UserProfile,
};
use crate::schemas::exam::{CategoryPayload, Exam, ExamPayload, ExamRef, QuestionPayload};
use crate::services::question_import::{save_template, SpreadsheetUpload, TEMPLATE_COLUMNS};

pub(crate) async fn execute(command: Command, settings: &Settings) -> Result<()> {
    let client = ApiClient::from_settings(settings).context("Failed to build API client")?;
    dispatch(command, settings, client).await
}

pub(crate) async fn dispatch(command: Command, settings: &Settings, client: ApiClient) -> Result<()> {
    match command {
        Command::Help => {
            println!("{USAGE}");
            Ok(())
        }
        Command::Login { admin, email, password } => {
            let portal = if admin { Portal::Admin } else { Portal::Student };
            let profile = AuthApi::new(client)
                .login(portal, &LoginRequest { email, password })
                .await
                .map_err(user_facing)?;
            println!("Logged in as {} <{}>", profile.name, profile.email);
            println!("Home: {}", home_for(Some(&profile)));
            Ok(())
        }
        Command::Logout => {
            AuthApi::new(client).logout().await.map_err(user_facing)?;
            println!("Logged out.");
            Ok(())
        }
        Command::WhoAmI => whoami(&client).await,
        Command::RegisterStudent { full_name, email, password, phone, date_of_birth } => {
            tracing::debug!(route = %Route::StudentRegister, "Submitting registration");
            let created = AuthApi::new(client)
                .register_student(&StudentRegistration {
                    full_name,
                    email,
                    password,
                    phone,
                    date_of_birth,
                })
                .await
                .map_err(user_facing)?;
            println!("{}", server_message(&created, "Registration successful! Please login."));
            println!("Continue at {}", Route::StudentLogin);
            Ok(())
        }
        Command::RegisterAdmin { name, email, password, organization, admin_code, phone } => {
            tracing::debug!(route = %Route::AdminRegister, "Submitting registration");
            let created = AuthApi::new(client)
                .register_admin(&AdminRegistration {
                    name,
                    email,
                    password,
                    phone,
                    organization,
                    admin_code,
                })
                .await
                .map_err(user_facing)?;
            println!("{}", server_message(&created, "Admin registration successful!"));
            println!("Continue at {}", Route::AdminLogin);
            Ok(())
        }
        Command::Dashboard => {
            require(&client, Route::StudentDashboard).await?;
            let dashboard = StudentApi::new(client).dashboard().await.map_err(user_facing)?;
            print_json(&dashboard)
        }
        Command::Exams => {
            require(&client, Route::StudentDashboard).await?;
            let exams = StudentApi::new(client).available_exams().await.map_err(user_facing)?;
            if exams.is_empty() {
                println!("No exams available right now.");
            }
            for exam in &exams {
                print_exam(exam);
            }
            Ok(())
        }
        Command::Take { exam_id } => {
            require(&client, Route::ExamView(exam_id)).await?;
            exam_view::take(settings, client, exam_id).await
        }
        Command::Review { session_id } => {
            require(&client, Route::StudentDashboard).await?;
            review(&StudentApi::new(client), session_id).await
        }
        Command::Results { result_id } => {
            require(&client, Route::StudentDashboard).await?;
            results(&StudentApi::new(client), result_id).await
        }
        Command::Admin(command) => {
            require(&client, Route::AdminConsole).await?;
            admin(&AdminApi::new(client), command).await
        }
    }
}

/// Evaluates the route guard for the stored session. A token whose `exp`
/// has passed counts as logged out and is discarded.
pub(crate) async fn require(client: &ApiClient, route: Route) -> Result<UserProfile> {
    let user = signed_in_user(client).await?;
    match (authorize(route, user.as_ref()), user) {
        (Access::Granted, Some(user)) => Ok(user),
        (Access::Granted, None) => Err(anyhow!("{route} needs a signed-in account")),
        (Access::Redirect(target), _) => {
            tracing::info!(requested = %route, redirect = %target, "Route guard redirected");
            Err(anyhow!("{}", redirect_hint(route, target)))
        }
    }
}

fn redirect_hint(route: Route, target: Route) -> String {
    match target {
        Route::StudentLogin => {
            format!("{route} needs a student login: exam-portal login <email> <password>")
        }
        Route::AdminLogin => {
            format!("{route} needs an admin login: exam-portal login --admin <email> <password>")
        }
        other => format!("{route} is not available for this account; continue at {other}"),
    }
}

async fn signed_in_user(client: &ApiClient) -> Result<Option<UserProfile>> {
    let store = client.credentials();
    let Some(credentials) = store.load().await.context("Failed to read credentials")? else {
        return Ok(None);
    };

    let expired = peek_claims(&credentials.token)
        .is_some_and(|claims| claims.is_expired(OffsetDateTime::now_utc()));
    if expired {
        tracing::info!(user_id = credentials.user.id, "Stored token expired; clearing session");
        store.clear().await.context("Failed to clear expired credentials")?;
        eprintln!("{}", ApiError::Unauthorized.notification());
        return Ok(None);
    }

    Ok(Some(credentials.user))
}

async fn whoami(client: &ApiClient) -> Result<()> {
    let Some(credentials) =
        client.credentials().load().await.context("Failed to read credentials")?
    else {
        println!("Not logged in.");
        return Ok(());
    };

    let user = &credentials.user;
    println!("{} <{}>", user.name, user.email);
    println!("role: {}", user.role.as_str());
    println!("home: {}", home_for(Some(user)));
    match peek_claims(&credentials.token).and_then(|claims| claims.expires_at()) {
        Some(expires_at) if expires_at <= OffsetDateTime::now_utc() => {
            println!("token: expired at {}", format_offset(expires_at));
        }
        Some(expires_at) => println!("token: valid until {}", format_offset(expires_at)),
        None => println!("token: opaque"),
    }
    println!("stored in: {}", client.credentials().path().display());
    Ok(())
}

async fn review(api: &StudentApi, session_id: i64) -> Result<()> {
    let detail = api.session(session_id).await.map_err(user_facing)?;
    let session = &detail.session;
    println!("Session #{} ({:?})", session.id, session.status);
    if let Some(start) = session.start_time {
        println!("started:   {}", format_offset(start));
    }
    if let Some(end) = session.end_time {
        println!("ended:     {}", format_offset(end));
    }
    if let Some(marks) = session.obtained_marks {
        println!("marks:     {marks}");
    }

    let answered =
        detail.answers.iter().filter(|answer| answer.selected_answer.is_some()).count();
    let correct = detail.answers.iter().filter(|answer| answer.is_correct == Some(true)).count();
    println!("answered:  {answered}/{}", detail.questions.len());
    if session.obtained_marks.is_some() {
        println!("correct:   {correct}");
    }
    for (index, question) in detail.questions.iter().enumerate() {
        println!("{:>3}. {} ({} marks)", index + 1, question.question_text, question.marks);
    }
    Ok(())
}

async fn results(api: &StudentApi, result_id: Option<i64>) -> Result<()> {
    if let Some(result_id) = result_id {
        let result = api.result(result_id).await.map_err(user_facing)?;
        return print_json(&result);
    }

    let overview = api.results().await.map_err(user_facing)?;
    println!(
        "{} result(s), average {:.1}%, passed {}, failed {}, pass rate {:.1}%",
        overview.total_results,
        overview.average_percentage,
        overview.passed_exams,
        overview.failed_exams,
        overview.pass_rate
    );
    for result in &overview.results {
        println!(
            "#{:<5} {:<30} {:>6.1}/{:<6.1} {:>5.1}%  {}  {}",
            result.id,
            result.exam_title,
            result.obtained_marks,
            result.total_marks,
            result.percentage,
            result.status.as_str(),
            result.completed_at.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

async fn admin(api: &AdminApi, command: AdminCommand) -> Result<()> {
    match command {
        AdminCommand::Stats => {
            let stats = api.dashboard_stats().await.map_err(user_facing)?;
            print_json(&stats)?;
            let activity = api.recent_activity().await.map_err(user_facing)?;
            print_json(&activity)
        }
        AdminCommand::Categories => {
            for category in api.categories().await.map_err(user_facing)? {
                println!(
                    "#{:<4} {}  {}",
                    category.id,
                    category.name,
                    category.description.as_deref().unwrap_or("")
                );
            }
            Ok(())
        }
        AdminCommand::CategoryAdd { name, description } => {
            let created = api
                .create_category(&CategoryPayload { name, description })
                .await
                .map_err(user_facing)?;
            println!("Category created: #{} {}", created.id, created.name);
            Ok(())
        }
        AdminCommand::CategoryUpdate { category_id, name, description } => {
            let updated = api
                .update_category(category_id, &CategoryPayload { name, description })
                .await
                .map_err(user_facing)?;
            println!("Category updated: #{} {}", updated.id, updated.name);
            Ok(())
        }
        AdminCommand::CategoryDelete { category_id } => {
            api.delete_category(category_id).await.map_err(user_facing)?;
            println!("Category deleted.");
            Ok(())
        }
        AdminCommand::Exams { page } => {
            let exams = api.exams(page).await.map_err(user_facing)?;
            for exam in &exams.content {
                print_exam(exam);
            }
            println!(
                "page {} of {} ({} exams)",
                exams.number + 1,
                exams.total_pages.max(1),
                exams.total_elements
            );
            Ok(())
        }
        AdminCommand::ExamAdd(fields) => {
            let created = api.create_exam(&exam_payload(fields)).await.map_err(user_facing)?;
            println!("Exam created successfully: #{} {}", created.id, created.title);
            Ok(())
        }
        AdminCommand::ExamUpdate { exam_id, fields } => {
            let updated =
                api.update_exam(exam_id, &exam_payload(fields)).await.map_err(user_facing)?;
            println!("Exam updated successfully: #{} {}", updated.id, updated.title);
            Ok(())
        }
        AdminCommand::ExamDelete { exam_id } => {
            api.delete_exam(exam_id).await.map_err(user_facing)?;
            println!("Exam deleted successfully.");
            Ok(())
        }
        AdminCommand::Questions { exam_id } => {
            let questions = api.questions(exam_id).await.map_err(user_facing)?;
            for question in &questions {
                println!(
                    "#{:<5} [{} | {} marks | answer {}] {}",
                    question.id,
                    question.difficulty_level.as_str(),
                    question.marks,
                    question.correct_answer,
                    question.question_text
                );
            }
            println!("{} question(s)", questions.len());
            Ok(())
        }
        AdminCommand::QuestionAdd(fields) => {
            let created =
                api.create_question(&question_payload(fields)).await.map_err(user_facing)?;
            println!("Question created: #{}", created.id);
            Ok(())
        }
        AdminCommand::QuestionUpdate { question_id, fields } => {
            let updated = api
                .update_question(question_id, &question_payload(fields))
                .await
                .map_err(user_facing)?;
            println!("Question updated: #{}", updated.id);
            Ok(())
        }
        AdminCommand::QuestionDelete { question_id } => {
            api.delete_question(question_id).await.map_err(user_facing)?;
            println!("Question deleted.");
            Ok(())
        }
        AdminCommand::Import { exam_id, file } => {
            let upload = SpreadsheetUpload::read(&file).await.map_err(user_facing)?;
            let response = api.bulk_import(exam_id, upload).await.map_err(user_facing)?;
            println!(
                "{} ({} question(s) added to {})",
                response.message.as_deref().unwrap_or("Questions uploaded successfully"),
                response.questions_added,
                response.exam_title.as_deref().unwrap_or("the exam")
            );
            Ok(())
        }
        AdminCommand::Template { output } => {
            let bytes = api.download_template().await.map_err(user_facing)?;
            let written = save_template(&output, &bytes)
                .await
                .with_context(|| format!("Failed to write template to {}", output.display()))?;
            println!("Template saved to {}", written.display());
            println!("Columns: {}", TEMPLATE_COLUMNS.join(", "));
            Ok(())
        }
        AdminCommand::Students { page, status } => {
            let students = api.students(page, status).await.map_err(user_facing)?;
            for student in &students.students {
                println!(
                    "#{:<5} {:<24} {:<30} {:<10} {:<10} {}",
                    student.id,
                    student.full_name,
                    student.email,
                    student.phone.as_deref().unwrap_or("-"),
                    student.date_of_birth.as_deref().unwrap_or("-"),
                    student.status
                );
            }
            println!(
                "page {} of {} ({} students)",
                students.current_page + 1,
                students.total_pages.max(1),
                students.total_elements
            );
            Ok(())
        }
        AdminCommand::StudentStatus { student_id, status } => {
            let message =
                api.update_student_status(student_id, status).await.map_err(user_facing)?;
            println!("{message}");
            Ok(())
        }
        AdminCommand::Results { exam_id: Some(exam_id), .. } => {
            let results = api.exam_results(exam_id).await.map_err(user_facing)?;
            print_json(&results)
        }
        AdminCommand::Results { exam_id: None, limit } => {
            print_json(&api.result_statistics().await.map_err(user_facing)?)?;
            for row in api.exam_wise_results().await.map_err(user_facing)? {
                print_json(&row)?;
            }
            print_json(&api.recent_results(limit).await.map_err(user_facing)?)
        }
    }
}

fn exam_payload(fields: ExamFields) -> ExamPayload {
    ExamPayload {
        title: fields.title,
        description: fields.description,
        category_id: fields.category_id,
        duration_minutes: fields.duration_minutes,
        total_marks: fields.total_marks,
        passing_marks: fields.passing_marks,
        instructions: fields.instructions,
        is_active: fields.is_active,
    }
}

fn question_payload(fields: QuestionFields) -> QuestionPayload {
    let [option_a, option_b, option_c, option_d] = fields.options;
    QuestionPayload {
        exam: ExamRef { id: fields.exam_id },
        question_text: fields.text,
        option_a,
        option_b,
        option_c,
        option_d,
        correct_answer: fields.correct_answer,
        marks: fields.marks,
        difficulty_level: fields.difficulty,
    }
}

fn print_exam(exam: &Exam) {
    println!(
        "#{:<4} {} [{}] {} min, {} marks (pass {}){}",
        exam.id,
        exam.title,
        exam.category_name.as_deref().unwrap_or("uncategorized"),
        exam.duration_minutes,
        exam.total_marks,
        exam.passing_marks,
        if exam.is_active { "" } else { " inactive" }
    );
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("Failed to render response")?);
    Ok(())
}

fn server_message<'a>(value: &'a Value, fallback: &'a str) -> &'a str {
    value.get("message").and_then(Value::as_str).unwrap_or(fallback)
}

/// Collapses an API failure to the message shown to the person at the keyboard.
pub(crate) fn user_facing(err: ApiError) -> anyhow::Error {
    tracing::debug!(error = %err, "Command failed");
    anyhow!("{}", err.notification())
}
