use std::fmt;

use crate::schemas::auth::{Role, UserProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Route {
    Landing,
    StudentLogin,
    StudentRegister,
    AdminLogin,
    AdminRegister,
    StudentDashboard,
    ExamView(i64),
    AdminConsole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Audience {
    Public,
    Student,
    Admin,
}

impl Route {
    fn audience(self) -> Audience {
        match self {
            Self::Landing
            | Self::StudentLogin
            | Self::StudentRegister
            | Self::AdminLogin
            | Self::AdminRegister => Audience::Public,
            Self::StudentDashboard | Self::ExamView(_) => Audience::Student,
            Self::AdminConsole => Audience::Admin,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Landing => f.write_str("/"),
            Self::StudentLogin => f.write_str("/student/login"),
            Self::StudentRegister => f.write_str("/student/register"),
            Self::AdminLogin => f.write_str("/admin/login"),
            Self::AdminRegister => f.write_str("/admin/register"),
            Self::StudentDashboard => f.write_str("/student/dashboard"),
            Self::ExamView(exam_id) => write!(f, "/student/exam/{exam_id}"),
            Self::AdminConsole => f.write_str("/admin/dashboard"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Access {
    Granted,
    Redirect(Route),
}

/// Decides whether `user` may open `route`, and where to send them if not.
pub(crate) fn authorize(route: Route, user: Option<&UserProfile>) -> Access {
    match (route.audience(), user.map(|user| user.role)) {
        (Audience::Public, _) => Access::Granted,

        (Audience::Student, None) => Access::Redirect(Route::StudentLogin),
        (Audience::Student, Some(Role::Student)) => Access::Granted,
        (Audience::Student, Some(Role::Admin)) => Access::Redirect(Route::AdminConsole),
        (Audience::Student, Some(Role::Unknown)) => Access::Redirect(Route::StudentLogin),

        (Audience::Admin, None) => Access::Redirect(Route::AdminLogin),
        (Audience::Admin, Some(Role::Admin)) => Access::Granted,
        (Audience::Admin, Some(Role::Student)) => Access::Redirect(Route::StudentDashboard),
        (Audience::Admin, Some(Role::Unknown)) => Access::Redirect(Route::AdminLogin),
    }
}

pub(crate) fn home_for(user: Option<&UserProfile>) -> Route {
    match user.map(|user| user.role) {
        Some(Role::Admin) => Route::AdminConsole,
        Some(Role::Student) => Route::StudentDashboard,
        Some(Role::Unknown) | None => Route::Landing,
    }
}
