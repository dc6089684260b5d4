use std::path::{Path, PathBuf};

use crate::api::errors::ApiError;

pub(crate) const TEMPLATE_FILE_NAME: &str = "questions_template.xlsx";

pub(crate) const TEMPLATE_COLUMNS: [&str; 8] = [
    "Question Text",
    "Option A",
    "Option B",
    "Option C",
    "Option D",
    "Correct Answer",
    "Marks",
    "Difficulty Level",
];

const ALLOWED_EXTENSIONS: [&str; 2] = ["xlsx", "xls"];

/// A spreadsheet read from disk and checked before it is sent for import.
#[derive(Debug, Clone)]
pub(crate) struct SpreadsheetUpload {
    pub(crate) file_name: String,
    pub(crate) bytes: Vec<u8>,
}

impl SpreadsheetUpload {
    pub(crate) async fn read(path: &Path) -> Result<Self, ApiError> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| ApiError::InvalidInput("Please select a file first".to_string()))?;

        validate_extension(&file_name)?;

        let bytes = tokio::fs::read(path).await.map_err(|err| {
            ApiError::InvalidInput(format!("Failed to read {}: {err}", path.display()))
        })?;

        let upload = Self { file_name, bytes };
        upload.validate()?;
        Ok(upload)
    }

    pub(crate) fn validate(&self) -> Result<(), ApiError> {
        validate_extension(&self.file_name)?;
        if self.bytes.is_empty() {
            return Err(ApiError::InvalidInput("Please select a file to upload".to_string()));
        }
        Ok(())
    }

    pub(crate) fn mime_type(&self) -> &'static str {
        if extension_of(&self.file_name).as_deref() == Some("xls") {
            "application/vnd.ms-excel"
        } else {
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        }
    }
}

fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

fn validate_extension(file_name: &str) -> Result<(), ApiError> {
    let valid = extension_of(file_name)
        .is_some_and(|extension| ALLOWED_EXTENSIONS.contains(&extension.as_str()));
    if valid {
        Ok(())
    } else {
        Err(ApiError::InvalidInput("Please select an Excel file (.xlsx or .xls)".to_string()))
    }
}

/// Writes the downloaded template. A directory target gets the default file name.
pub(crate) async fn save_template(target: &Path, bytes: &[u8]) -> std::io::Result<PathBuf> {
    let destination = if tokio::fs::metadata(target).await.is_ok_and(|meta| meta.is_dir()) {
        target.join(TEMPLATE_FILE_NAME)
    } else {
        target.to_path_buf()
    };

    if let Some(parent) = destination.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&destination, bytes).await?;
    tracing::info!(path = %destination.display(), size = bytes.len(), "Question template saved");
    Ok(destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[test]
    fn only_excel_files_are_accepted() {
        assert!(validate_extension("questions.xlsx").is_ok());
        assert!(validate_extension("LEGACY.XLS").is_ok());
        assert!(validate_extension("questions.csv").is_err());
        assert!(validate_extension("questions").is_err());
    }

    #[test]
    fn empty_upload_is_rejected() {
        let upload = SpreadsheetUpload { file_name: "q.xlsx".to_string(), bytes: Vec::new() };
        let err = upload.validate().expect_err("empty");
        assert_eq!(err.notification(), "Please select a file to upload");
    }

    #[test]
    fn mime_follows_extension() {
        let xls = SpreadsheetUpload { file_name: "q.xls".to_string(), bytes: vec![1] };
        assert_eq!(xls.mime_type(), "application/vnd.ms-excel");
        let xlsx = SpreadsheetUpload { file_name: "q.xlsx".to_string(), bytes: vec![1] };
        assert!(xlsx.mime_type().contains("spreadsheetml"));
    }

    #[tokio::test]
    async fn read_rejects_missing_and_wrong_files() {
        let dir = test_support::temp_dir();
        tokio::fs::create_dir_all(&dir).await.expect("dir");

        let csv = dir.join("questions.csv");
        tokio::fs::write(&csv, b"a,b").await.expect("write");
        assert!(SpreadsheetUpload::read(&csv).await.is_err());

        let empty = dir.join("questions.xlsx");
        tokio::fs::write(&empty, b"").await.expect("write");
        assert!(SpreadsheetUpload::read(&empty).await.is_err());

        tokio::fs::write(&empty, b"PK\x03\x04").await.expect("write");
        let upload = SpreadsheetUpload::read(&empty).await.expect("valid");
        assert_eq!(upload.file_name, "questions.xlsx");

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn template_lands_in_directory_with_default_name() {
        let dir = test_support::temp_dir();
        tokio::fs::create_dir_all(&dir).await.expect("dir");

        let saved = save_template(&dir, b"PK").await.expect("save");
        assert_eq!(saved, dir.join(TEMPLATE_FILE_NAME));

        let explicit = dir.join("nested").join("mine.xlsx");
        let saved = save_template(&explicit, b"PK").await.expect("save");
        assert_eq!(saved, explicit);
        assert_eq!(tokio::fs::read(&saved).await.expect("read"), b"PK");

        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
