/// VAPID configuration for Web Push request signing
#[derive(Debug, Clone)]
pub struct VapidConfig {
    /// Contact URI included as the `sub` claim, e.g. `mailto:ops@example.org`
    pub subject: String,
    /// URL-safe base64 encoded P-256 private key, no padding
    pub private_key: String,
}

impl VapidConfig {
    /// Create new VAPID configuration
    pub fn new(subject: String, private_key: String) -> Self {
        Self {
            subject,
            private_key,
        }
    }
}
