use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::config::Settings;
use crate::schemas::auth::{AuthResponse, UserProfile};

/// What a successful login leaves behind on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoredCredentials {
    pub(crate) token: String,
    #[serde(default)]
    pub(crate) refresh_token: Option<String>,
    pub(crate) user: UserProfile,
}

impl From<&AuthResponse> for StoredCredentials {
    fn from(response: &AuthResponse) -> Self {
        Self {
            token: response.token.clone(),
            refresh_token: response.refresh_token.clone(),
            user: response.profile(),
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum CredentialError {
    #[error("credential file io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode credentials: {0}")]
    Encode(#[from] serde_json::Error),
}

/// File-backed session store: bearer token, refresh token and profile.
#[derive(Debug, Clone)]
pub(crate) struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub(crate) fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.credentials().path.clone())
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `None` when logged out. A file that does not decode is removed
    /// and treated as logged out.
    pub(crate) async fn load(&self) -> Result<Option<StoredCredentials>, CredentialError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_slice::<StoredCredentials>(&raw) {
            Ok(credentials) => Ok(Some(credentials)),
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    path = %self.path.display(),
                    "Discarding unreadable credentials file"
                );
                self.clear().await?;
                Ok(None)
            }
        }
    }

    pub(crate) async fn save(&self, credentials: &StoredCredentials) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let encoded = serde_json::to_vec_pretty(credentials)?;
        tokio::fs::write(&self.path, encoded).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .await?;
        }

        tracing::debug!(user_id = credentials.user.id, "Credentials stored");
        Ok(())
    }

    pub(crate) async fn clear(&self) -> Result<(), CredentialError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::auth::Role;
    use crate::test_support;

    fn sample() -> StoredCredentials {
        StoredCredentials {
            token: "header.payload.sig".to_string(),
            refresh_token: Some("refresh".to_string()),
            user: UserProfile {
                id: 2,
                email: "student@examportal.com".to_string(),
                name: "Student User".to_string(),
                role: Role::Student,
            },
        }
    }

    #[tokio::test]
    async fn save_load_and_clear() {
        let store = CredentialStore::new(test_support::temp_credentials_path());
        assert_eq!(store.load().await.expect("load"), None);

        store.save(&sample()).await.expect("save");
        assert_eq!(store.load().await.expect("load"), Some(sample()));

        store.clear().await.expect("clear");
        assert_eq!(store.load().await.expect("load"), None);
        store.clear().await.expect("clearing twice is fine");
        test_support::remove_temp_dir(store.path()).await;
    }

    #[tokio::test]
    async fn corrupt_file_is_treated_as_logged_out() {
        let store = CredentialStore::new(test_support::temp_credentials_path());
        store.save(&sample()).await.expect("save");
        tokio::fs::write(store.path(), b"{not json").await.expect("corrupt");

        assert_eq!(store.load().await.expect("load"), None);
        assert!(!store.path().exists());
        test_support::remove_temp_dir(store.path()).await;
    }
}
