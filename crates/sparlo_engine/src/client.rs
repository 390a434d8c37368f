use std::time::Duration;

use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::{ApiError, FailureKind};

pub const DEFAULT_BASE_URL: &str = "https://sparlo-production.up.railway.app";
pub const BENCHMARK_KEY_HEADER: &str = "x-benchmark-api-key";

/// How requests identify themselves to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ApiAuth {
    #[default]
    Anonymous,
    Bearer(String),
    BenchmarkKey(String),
}

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub auth: ApiAuth,
    pub connect_timeout: Duration,
    /// Whole-request limit for plain JSON calls.
    pub request_timeout: Duration,
    /// Longest silence tolerated between two chunks of a chat stream.
    pub stream_idle_timeout: Duration,
    /// Upper bound on a single undelimited stream line.
    pub max_line_bytes: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            auth: ApiAuth::Anonymous,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(120),
            stream_idle_timeout: Duration::from_secs(60),
            max_line_bytes: 1024 * 1024,
        }
    }
}

/// Shared reqwest client bound to one backend.
#[derive(Debug, Clone)]
pub struct HttpClient {
    settings: ClientSettings,
    base: Url,
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(settings: ClientSettings) -> Result<Self, ApiError> {
        let base = Url::parse(&settings.base_url)
            .map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::new(
                FailureKind::InvalidUrl,
                format!("{} cannot be used as a base url", settings.base_url),
            ));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .read_timeout(settings.stream_idle_timeout)
            .build()
            .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            settings,
            base,
            client,
        })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Appends path segments to the base url, escaping each one.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::new(FailureKind::InvalidUrl, "base url has no path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.settings.auth {
            ApiAuth::Anonymous => builder,
            ApiAuth::Bearer(token) => builder.header(AUTHORIZATION, format!("Bearer {token}")),
            ApiAuth::BenchmarkKey(key) => builder.header(BENCHMARK_KEY_HEADER, key),
        }
    }

    /// Sends a bounded JSON request and decodes the body.
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = builder
            .timeout(self.settings.request_timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let response = check_status(response).await?;
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        serde_json::from_slice(&body).map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))
    }

    /// Sends a bounded request whose body is irrelevant beyond its status.
    pub(crate) async fn send_unit(&self, builder: reqwest::RequestBuilder) -> Result<(), ApiError> {
        let response = builder
            .timeout(self.settings.request_timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        check_status(response).await.map(|_| ())
    }
}

/// Passes 2xx responses through and turns everything else into an [`ApiError`].
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_retry_after);
        return Err(ApiError::new(
            FailureKind::RateLimited { retry_after_secs },
            status.to_string(),
        ));
    }

    let body = response.text().await.unwrap_or_default();
    Err(ApiError::new(
        FailureKind::HttpStatus(status.as_u16()),
        error_detail(&body).unwrap_or_else(|| status.to_string()),
    ))
}

/// `Retry-After` in delta-seconds form. HTTP-date values are not honoured.
pub(crate) fn parse_retry_after(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok()
}

fn error_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(message) = value
            .get("error")
            .or_else(|| value.get("message"))
            .and_then(serde_json::Value::as_str)
        {
            return Some(message.to_string());
        }
    }
    Some(trimmed.chars().take(200).collect())
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return ApiError::new(FailureKind::Decode, err.to_string());
    }
    ApiError::new(FailureKind::Network, err.to_string())
}
