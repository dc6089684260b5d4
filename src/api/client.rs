use std::time::Duration;

use reqwest::multipart::Form;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::api::errors::ApiError;
use crate::auth::credentials::CredentialStore;
use crate::core::config::Settings;

/// Thin JSON wrapper over the REST API: bearer auth from the credential
/// store, uniform status mapping, and list unwrapping.
#[derive(Debug, Clone)]
pub(crate) struct ApiClient {
    client: Client,
    base_url: String,
    credentials: CredentialStore,
}

impl ApiClient {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(settings.api().connect_timeout_seconds))
            .timeout(Duration::from_secs(settings.api().request_timeout_seconds))
            .build()
            .map_err(ApiError::Transport)?;

        Ok(Self {
            client,
            base_url: settings.api().base_url().to_string(),
            credentials: CredentialStore::from_settings(settings),
        })
    }

    pub(crate) fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(self.request(Method::GET, path)).await?;
        read_json(response).await
    }

    pub(crate) async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let response = self.send(self.request(Method::GET, path).query(query)).await?;
        read_json(response).await
    }

    /// Fetches a collection that may come back bare or wrapped in
    /// `data`, `results` or `content`.
    pub(crate) async fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ApiError> {
        let value: Value = self.get(path).await?;
        decode_list(value)
    }

    pub(crate) async fn get_bytes(&self, path: &str) -> Result<Vec<u8>, ApiError> {
        let response = self.send(self.request(Method::GET, path)).await?;
        let bytes = response.bytes().await.map_err(ApiError::Transport)?;
        Ok(bytes.to_vec())
    }

    pub(crate) async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(self.request(Method::POST, path).json(body)).await?;
        read_json(response).await
    }

    pub(crate) async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(self.request(Method::POST, path)).await?;
        read_json(response).await
    }

    pub(crate) async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: Form,
    ) -> Result<T, ApiError> {
        let response = self.send(self.request(Method::POST, path).multipart(form)).await?;
        read_json(response).await
    }

    pub(crate) async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(self.request(Method::PUT, path).json(body)).await?;
        read_json(response).await
    }

    /// For endpoints that acknowledge with a plain-text sentence.
    pub(crate) async fn put_text<B>(&self, path: &str, body: &B) -> Result<String, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let response = self.send(self.request(Method::PUT, path).json(body)).await?;
        response.text().await.map_err(ApiError::Transport)
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(self.request(Method::DELETE, path)).await?;
        Ok(())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, format!("{}{}", self.base_url, path))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let request = match self.credentials.load().await {
            Ok(Some(credentials)) => request.bearer_auth(credentials.token),
            Ok(None) => request,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to read credentials; sending anonymously");
                request
            }
        };

        let response = request.send().await.map_err(|err| {
            tracing::warn!(error = %err, "API request failed");
            ApiError::Transport(err)
        })?;

        let status = response.status();
        let path = response.url().path().to_string();
        tracing::debug!(status = status.as_u16(), path = %path, "API response");

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let parsed = serde_json::from_str::<Value>(&body).ok();
        let err = ApiError::from_status(status.as_u16(), parsed.as_ref());

        if matches!(err, ApiError::Unauthorized) {
            tracing::warn!(path = %path, "API rejected credentials; clearing stored session");
            if let Err(clear_err) = self.credentials.clear().await {
                tracing::error!(error = %clear_err, "Failed to clear stored credentials");
            }
        } else {
            tracing::warn!(status = status.as_u16(), path = %path, error = %err, "API error");
        }

        Err(err)
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let body = response.text().await.map_err(ApiError::Transport)?;
    let value = if body.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str::<Value>(&body)
            .map_err(|err| ApiError::decode(err, "API returned a non-JSON body"))?
    };

    serde_json::from_value(value)
        .map_err(|err| ApiError::decode(err, "API response did not match the expected shape"))
}

pub(crate) fn decode_list<T: DeserializeOwned>(value: Value) -> Result<Vec<T>, ApiError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => ["data", "results", "content"]
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .ok_or_else(|| ApiError::Decode("expected a list response".to_string()))?,
        Value::Null => Vec::new(),
        _ => return Err(ApiError::Decode("expected a list response".to_string())),
    };

    items
        .into_iter()
        .map(|item| {
            serde_json::from_value(item)
                .map_err(|err| ApiError::decode(err, "list item did not match the expected shape"))
        })
        .collect()
}
