use serde::{Deserialize, Serialize};
use time::macros::format_description;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum Role {
    #[serde(rename = "ROLE_ADMIN")]
    Admin,
    #[serde(rename = "ROLE_STUDENT")]
    Student,
    #[serde(other)]
    Unknown,
}

impl Role {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ROLE_ADMIN",
            Self::Student => "ROLE_STUDENT",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Which login endpoint a credential exchange goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Portal {
    Student,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct UserProfile {
    pub(crate) id: i64,
    pub(crate) email: String,
    pub(crate) name: String,
    pub(crate) role: Role,
}

#[derive(Debug, Serialize, Validate)]
pub(crate) struct LoginRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub(crate) email: String,
    #[validate(length(min = 1, message = "password must not be empty"))]
    pub(crate) password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AuthResponse {
    pub(crate) token: String,
    #[serde(default)]
    pub(crate) refresh_token: Option<String>,
    #[serde(rename = "type", default)]
    pub(crate) token_type: Option<String>,
    pub(crate) id: i64,
    pub(crate) email: String,
    pub(crate) role: Role,
    pub(crate) name: String,
}

impl AuthResponse {
    pub(crate) fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
        }
    }
}

#[derive(Debug, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StudentRegistration {
    #[validate(length(min = 1, message = "full name must not be empty"))]
    pub(crate) full_name: String,
    #[validate(email(message = "email must be a valid address"))]
    pub(crate) email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub(crate) password: String,
    #[validate(custom(function = validate_phone))]
    pub(crate) phone: Option<String>,
    #[validate(custom(function = validate_date_of_birth))]
    pub(crate) date_of_birth: Option<String>,
}

#[derive(Debug, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AdminRegistration {
    #[validate(length(min = 2, message = "Name must be at least 2 characters"))]
    pub(crate) name: String,
    #[validate(email(message = "Invalid email format"))]
    pub(crate) email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub(crate) password: String,
    #[validate(custom(function = validate_phone))]
    pub(crate) phone: Option<String>,
    #[validate(length(min = 2, message = "Organization must be at least 2 characters"))]
    pub(crate) organization: String,
    #[validate(length(min = 1, message = "Admin registration code is required"))]
    pub(crate) admin_code: String,
}

fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if phone.len() == 10 && phone.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::new("phone").with_message("Phone number must be 10 digits".into()))
    }
}

fn validate_date_of_birth(value: &str) -> Result<(), ValidationError> {
    time::Date::parse(value, format_description!("[year]-[month]-[day]"))
        .map(|_| ())
        .map_err(|_| {
            ValidationError::new("date_of_birth")
                .with_message("date of birth must be YYYY-MM-DD".into())
        })
}
