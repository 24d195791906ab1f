//! Common types and data structures

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Uniform response envelope returned by every API call.
///
/// `data` is only meaningful when `success` is true, and `error` is
/// populated when it is false. Neither is enforced by the type.
/// Top-level fields beyond the four standard ones (e.g. `imported`,
/// `skipped`) are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T = Value> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
            extra: Map::new(),
        }
    }

    pub fn ok_message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            error: None,
            message: Some(message.into()),
            extra: Map::new(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            message: None,
            extra: Map::new(),
        }
    }

    pub fn with_extra(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }
}

/// Payload of `GET /status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub status: String,
    pub version: String,
    pub mode: String,
    pub input_dir: String,
    pub output_dir: String,
}

/// Body of the image save endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveImageRequest {
    #[serde(rename = "imageData")]
    pub image_data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Result of a successful image save
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedFile {
    pub filename: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Entry of a directory listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
    pub created: f64,
    pub modified: f64,
}

/// Where an uploaded image ends up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageTarget {
    Input,
    Output,
    Desktop,
}

impl ImageTarget {
    /// URL prefix the backend serves this target from, if any
    pub fn url_prefix(self) -> Option<&'static str> {
        match self {
            ImageTarget::Input => Some("/files/input"),
            ImageTarget::Output => Some("/files/output"),
            ImageTarget::Desktop => None,
        }
    }
}
