use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub(crate) enum StudentStatus {
    Active,
    Inactive,
    Suspended,
    Pending,
}

impl StudentStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
            Self::Suspended => "SUSPENDED",
            Self::Pending => "PENDING",
        }
    }
}

impl fmt::Display for StudentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StudentStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(Self::Active),
            "INACTIVE" => Ok(Self::Inactive),
            "SUSPENDED" => Ok(Self::Suspended),
            "PENDING" => Ok(Self::Pending),
            other => Err(format!("unknown student status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Student {
    pub(crate) id: i64,
    pub(crate) email: String,
    pub(crate) full_name: String,
    #[serde(default)]
    pub(crate) phone: Option<String>,
    #[serde(default)]
    pub(crate) date_of_birth: Option<String>,
    pub(crate) status: StudentStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StudentPage {
    #[serde(default)]
    pub(crate) students: Vec<Student>,
    #[serde(default)]
    pub(crate) total_elements: u64,
    #[serde(default)]
    pub(crate) total_pages: u64,
    #[serde(default)]
    pub(crate) current_page: u64,
    #[serde(default)]
    pub(crate) statistics: Option<serde_json::Value>,
}

/// Paged listing in the server's page envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Page<T> {
    #[serde(default = "Vec::new")]
    pub(crate) content: Vec<T>,
    #[serde(default)]
    pub(crate) total_elements: u64,
    #[serde(default)]
    pub(crate) total_pages: u64,
    #[serde(default)]
    pub(crate) number: u64,
    #[serde(default)]
    pub(crate) size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PageRequest {
    pub(crate) page: u32,
    pub(crate) size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 0, size: 10 }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct StatusUpdate {
    pub(crate) status: StudentStatus,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BulkUploadResponse {
    #[serde(default)]
    pub(crate) message: Option<String>,
    #[serde(default)]
    pub(crate) questions_added: u32,
    #[serde(default)]
    pub(crate) exam_title: Option<String>,
    #[serde(default)]
    pub(crate) error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn student_status_round_trips_through_text() {
        assert_eq!("suspended".parse::<StudentStatus>(), Ok(StudentStatus::Suspended));
        assert!("BANNED".parse::<StudentStatus>().is_err());
        let body = serde_json::to_value(StatusUpdate {
            status: StudentStatus::Inactive,
        })
        .expect("json");
        assert_eq!(body, serde_json::json!({"status": "INACTIVE"}));
    }

    #[test]
    fn exam_page_decodes_spring_envelope() {
        let page: Page<serde_json::Value> = serde_json::from_value(serde_json::json!({
            "content": [{"id": 1}, {"id": 2}],
            "totalElements": 12,
            "totalPages": 2,
            "number": 0,
            "size": 10
        }))
        .expect("page");
        assert_eq!(page.content.len(), 2);
        assert_eq!(page.total_pages, 2);
    }
}
