//! Access to the catalog's external location endpoints.
//!
//! [`CatalogApi`] is what the rest of the crate talks to; [`HttpCatalogApi`]
//! implements it over HTTP. Tests substitute their own implementation.

use anyhow::{bail, Context};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::external_location::{
    CreateExternalLocation, ExternalLocationInfo, UpdateExternalLocation,
};

/// Maximum length of response body to log
const MAX_LOG_BODY_LENGTH: usize = 200;

const EXTERNAL_LOCATIONS_PATH: [&str; 4] = ["api", "2.1", "unity-catalog", "external-locations"];

/// An error reported by the catalog service.
///
/// Displays as the service's message only, so that callers can match on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RemoteError {
    pub error_code: String,
    pub message: String,
    pub status: u16,
}

impl RemoteError {
    /// Interpret a non-success response.
    pub fn from_response(status: StatusCode, body: &str) -> RemoteError {
        #[derive(Deserialize)]
        struct ErrorBody {
            #[serde(default)]
            error_code: Option<String>,
            #[serde(default)]
            message: Option<String>,
        }

        let parsed = serde_json::from_str::<ErrorBody>(body).ok();
        let (error_code, message) = match parsed {
            Some(ErrorBody { error_code, message }) => (error_code, message),
            None => (None, None),
        };
        RemoteError {
            error_code: error_code.unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("UNKNOWN")
                    .to_uppercase()
                    .replace(' ', "_")
            }),
            message: message.unwrap_or_else(|| {
                if body.trim().is_empty() {
                    format!("API request failed: {}", status)
                } else {
                    sanitize_for_log(body)
                }
            }),
            status: status.as_u16(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND.as_u16()
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("Failed to send request: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Failed to parse response JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Remote(e) if e.is_not_found())
    }
}

/// The operations the provider needs from the catalog.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn create_external_location(
        &self,
        request: &CreateExternalLocation,
    ) -> Result<ExternalLocationInfo, ApiError>;

    /// Fetch the current state, including the owner.
    async fn read_external_location(&self, name: &str)
        -> Result<ExternalLocationInfo, ApiError>;

    /// Apply a partial update. Fields absent from `request` are left as is.
    async fn update_external_location(
        &self,
        name: &str,
        request: &UpdateExternalLocation,
    ) -> Result<ExternalLocationInfo, ApiError>;
}

/// Where and how to reach the catalog.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: Url,
    pub token: Option<String>,
}

/// [`CatalogApi`] over the catalog's REST endpoints.
#[derive(Clone)]
pub struct HttpCatalogApi {
    client: Client,
    collection: Url,
    token: Option<String>,
}

impl HttpCatalogApi {
    pub fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let mut collection = config.host.clone();
        match collection.path_segments_mut() {
            Ok(mut segments) => {
                segments.pop_if_empty().extend(EXTERNAL_LOCATIONS_PATH);
            }
            Err(()) => bail!("Catalog host is not a base URL: {}", config.host),
        }

        let client = Client::builder()
            .user_agent(concat!("catalog-resources-unity/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            collection,
            token: config.token,
        })
    }

    fn location_url(&self, name: &str) -> Url {
        let mut url = self.collection.clone();
        // new() made sure the URL can have path segments
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(name);
        }
        url
    }

    async fn send(&self, request: RequestBuilder) -> Result<ExternalLocationInfo, ApiError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(RemoteError::from_response(status, &body).into());
        }

        // PATCH may answer with an empty body
        if body.trim().is_empty() {
            return Ok(ExternalLocationInfo::default());
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl CatalogApi for HttpCatalogApi {
    async fn create_external_location(
        &self,
        request: &CreateExternalLocation,
    ) -> Result<ExternalLocationInfo, ApiError> {
        tracing::debug!("POST {}", self.collection);
        self.send(self.client.post(self.collection.clone()).json(request))
            .await
    }

    async fn read_external_location(
        &self,
        name: &str,
    ) -> Result<ExternalLocationInfo, ApiError> {
        let url = self.location_url(name);
        tracing::debug!("GET {}", url);
        self.send(self.client.get(url)).await
    }

    async fn update_external_location(
        &self,
        name: &str,
        request: &UpdateExternalLocation,
    ) -> Result<ExternalLocationInfo, ApiError> {
        let url = self.location_url(name);
        tracing::debug!("PATCH {}", url);
        self.send(self.client.patch(url).json(request)).await
    }
}

/// Truncate a response body and strip control characters before it goes
/// into a log line or error message.
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!(
            "{}... [truncated, {} bytes total]",
            &body[..end],
            body.len()
        )
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| c.is_control(), "")
}
