use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error envelope the EMR API sends alongside a non-2xx status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Error)]
#[error("api request failed with status {status}: {}", .message.as_deref().unwrap_or("no reason given"))]
pub struct ApiException {
    pub status: u16,
    pub message: Option<String>,
}

impl ApiException {
    pub fn new(status: u16, message: Option<String>) -> Self {
        Self { status, message }
    }
}
