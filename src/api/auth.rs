use serde_json::Value;
use validator::Validate;

use crate::api::client::ApiClient;
use crate::api::errors::ApiError;
use crate::auth::credentials::StoredCredentials;
use crate::schemas::auth::{
    AdminRegistration, AuthResponse, LoginRequest, Portal, StudentRegistration, UserProfile,
};

/// Credential exchange and account registration.
#[derive(Debug, Clone)]
pub(crate) struct AuthApi {
    client: ApiClient,
}

impl AuthApi {
    pub(crate) fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Exchanges email and password for a token and persists the session.
    pub(crate) async fn login(
        &self,
        portal: Portal,
        request: &LoginRequest,
    ) -> Result<UserProfile, ApiError> {
        request.validate()?;

        let endpoint = match portal {
            Portal::Student => "/auth/login",
            Portal::Admin => "/auth/admin/login",
        };
        let response: AuthResponse =
            self.client.post(endpoint, request).await.map_err(|err| match err {
                ApiError::Unauthorized => ApiError::Validation {
                    status: 401,
                    message: "Invalid credentials".to_string(),
                },
                other => other,
            })?;
        if response.token.trim().is_empty() {
            return Err(ApiError::Validation {
                status: 200,
                message: "Invalid credentials".to_string(),
            });
        }

        self.client
            .credentials()
            .save(&StoredCredentials::from(&response))
            .await
            .map_err(|err| ApiError::InvalidInput(format!("could not store credentials: {err}")))?;

        let profile = response.profile();
        tracing::info!(user_id = profile.id, role = profile.role.as_str(), "Logged in");
        Ok(profile)
    }

    pub(crate) async fn logout(&self) -> Result<(), ApiError> {
        self.client
            .credentials()
            .clear()
            .await
            .map_err(|err| ApiError::InvalidInput(format!("could not clear credentials: {err}")))?;
        tracing::info!("Logged out");
        Ok(())
    }

    pub(crate) async fn register_student(
        &self,
        registration: &StudentRegistration,
    ) -> Result<Value, ApiError> {
        registration.validate()?;
        let created = self.client.post("/auth/student/register", registration).await?;
        tracing::info!("Student registration accepted");
        Ok(created)
    }

    pub(crate) async fn register_admin(
        &self,
        registration: &AdminRegistration,
    ) -> Result<Value, ApiError> {
        registration.validate()?;
        let created = self.client.post("/auth/admin/register", registration).await?;
        tracing::info!("Admin registration accepted");
        Ok(created)
    }
}
