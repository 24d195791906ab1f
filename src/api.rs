//! Client for the local backend API
//!
//! Every call resolves to an [`ApiResponse`] envelope. Transport failures,
//! unreadable bodies and invalid JSON are all folded into
//! `{success: false, error: <message>}`; nothing is retried and nothing
//! propagates to the caller.

use crate::constants::{API_BASE, DEFAULT_HOST, DEFAULT_PORT};
use crate::types::{ApiResponse, SaveImageRequest, SavedFile, ServerStatus};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

/// Per-call options for [`ApiClient::request`]
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    /// Raw request body, sent as-is
    pub body: Option<String>,
    /// Extra headers, applied over the default `Content-Type`
    pub headers: Vec<(String, String)>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            body: None,
            headers: Vec::new(),
        }
    }
}

impl RequestOptions {
    pub fn method(method: Method) -> Self {
        Self {
            method,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base: String,
    http: reqwest::Client,
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new(format!("http://{}:{}{}", DEFAULT_HOST, DEFAULT_PORT, API_BASE))
    }
}

/// Render an error with its source chain, e.g. `error sending request: connection refused`
fn error_message(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

impl ApiClient {
    /// `base` is prepended verbatim to every endpoint, e.g. `http://127.0.0.1:8765/api`
    pub fn new(base: impl Into<String>) -> Self {
        Self::with_client(base, reqwest::Client::new())
    }

    pub fn with_client(base: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base: base.into(),
            http,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn headers(extra: &[(String, String)]) -> Result<HeaderMap, String> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in extra {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| e.to_string())?;
            let value = HeaderValue::from_str(value).map_err(|e| e.to_string())?;
            headers.insert(name, value);
        }
        Ok(headers)
    }

    async fn try_request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>, String> {
        let url = format!("{}{}", self.base, endpoint);
        let mut builder = self
            .http
            .request(options.method.clone(), &url)
            .headers(Self::headers(&options.headers)?);
        if let Some(body) = options.body {
            builder = builder.body(body);
        }

        debug!(method = %options.method, url = %url, "API request");
        let response = builder.send().await.map_err(|e| error_message(&e))?;
        debug!(status = %response.status(), url = %url, "API response");
        response
            .json::<ApiResponse<T>>()
            .await
            .map_err(|e| error_message(&e))
    }

    /// Send one request to `{base}{endpoint}` and return the parsed envelope
    pub async fn request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> ApiResponse<T> {
        match self.try_request(endpoint, options).await {
            Ok(response) => response,
            Err(e) => {
                warn!(endpoint, error = %e, "API request failed");
                ApiResponse::failure(e)
            }
        }
    }

    async fn request_with_body<T, B>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
    ) -> ApiResponse<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = match body.map(serde_json::to_string).transpose() {
            Ok(body) => body,
            Err(e) => return ApiResponse::failure(e.to_string()),
        };
        self.request(
            endpoint,
            RequestOptions {
                method,
                body,
                headers: Vec::new(),
            },
        )
        .await
    }

    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> ApiResponse<T> {
        self.request(endpoint, RequestOptions::method(Method::GET)).await
    }

    /// POST with `body` serialized as JSON; no body is sent for `None`
    pub async fn post<T, B>(&self, endpoint: &str, body: Option<&B>) -> ApiResponse<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request_with_body(Method::POST, endpoint, body).await
    }

    /// PUT with `body` serialized as JSON; no body is sent for `None`
    pub async fn put<T, B>(&self, endpoint: &str, body: Option<&B>) -> ApiResponse<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request_with_body(Method::PUT, endpoint, body).await
    }

    pub async fn del<T: DeserializeOwned>(&self, endpoint: &str) -> ApiResponse<T> {
        self.request(endpoint, RequestOptions::method(Method::DELETE)).await
    }

    async fn save_image(
        &self,
        endpoint: &str,
        image_data: &str,
        filename: Option<&str>,
    ) -> ApiResponse<SavedFile> {
        let body = SaveImageRequest {
            image_data: image_data.to_string(),
            filename: filename.map(str::to_string),
        };
        self.post(endpoint, Some(&body)).await
    }

    /// Save an image into the backend's output directory
    pub async fn save_output_image(
        &self,
        image_data: &str,
        filename: Option<&str>,
    ) -> ApiResponse<SavedFile> {
        self.save_image("/files/save-output", image_data, filename).await
    }

    /// Save an image into the backend's input directory
    pub async fn save_input_image(
        &self,
        image_data: &str,
        filename: Option<&str>,
    ) -> ApiResponse<SavedFile> {
        self.save_image("/files/save-input", image_data, filename).await
    }

    /// Save an image onto the user's desktop; `extra["desktop_path"]` names the folder
    pub async fn save_desktop_image(
        &self,
        image_data: &str,
        filename: Option<&str>,
    ) -> ApiResponse<SavedFile> {
        self.save_image("/files/save-desktop", image_data, filename).await
    }

    pub async fn get_server_status(&self) -> ApiResponse<ServerStatus> {
        self.get("/status").await
    }
}
