pub mod dispatch;
/// HTTP handlers for the alert service API
pub mod preferences;
pub mod subscriptions;

use serde::{Deserialize, Serialize};

pub use dispatch::register_routes as register_dispatch;
pub use preferences::register_routes as register_preferences;
pub use subscriptions::register_routes as register_subscriptions;

/// Standard JSON envelope for API responses
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}
