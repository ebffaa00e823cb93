//! Response envelope

use crate::error::CropDxError;
use serde::{Deserialize, Serialize};

/// `{ success, data | error, timestamp }` envelope returned by every operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// RFC 3339 UTC timestamp
    pub timestamp: String,
    /// Status code for the transport; not serialized
    #[serde(skip)]
    pub status: u16,
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl<T> ApiResponse<T> {
    #[must_use]
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: now(),
            status: 200,
        }
    }

    #[must_use]
    pub fn from_error(error: &CropDxError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            timestamp: now(),
            status: error.status_code(),
        }
    }

    /// Failed envelope that still carries `data`, for degraded status reports
    #[must_use]
    pub fn unavailable(data: T) -> Self {
        Self {
            success: false,
            data: Some(data),
            error: None,
            timestamp: now(),
            status: 503,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.success
    }
}

impl<T> From<crate::error::Result<T>> for ApiResponse<T> {
    fn from(result: crate::error::Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::from_error(&e),
        }
    }
}
