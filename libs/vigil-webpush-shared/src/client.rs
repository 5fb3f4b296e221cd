use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};
use web_push::{
    ContentEncoding, IsahcWebPushClient, SubscriptionInfo, VapidSignatureBuilder, WebPushClient,
    WebPushError, WebPushMessageBuilder,
};

use crate::config::VapidConfig;

/// Error type for Web Push delivery
#[derive(Debug, Error)]
pub enum PushError {
    /// The push service reported the endpoint as permanently invalid.
    /// The subscription behind it should not be used again.
    #[error("push endpoint no longer valid: {0}")]
    Gone(String),

    /// The push service is rate limiting or temporarily unavailable.
    #[error("push service throttled, retry after {0:?}")]
    Throttled(Option<Duration>),

    /// Any other transport-level failure.
    #[error("push delivery failed: {0}")]
    Transport(String),

    /// The transport itself is misconfigured (VAPID key, TLS setup).
    #[error("push transport configuration error: {0}")]
    Config(String),
}

/// Delivery urgency hint forwarded to the push service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Normal,
    High,
}

/// A single encrypted-and-addressed push delivery.
#[derive(Debug, Clone)]
pub struct PushMessage {
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    /// Serialized notification payload, encrypted by the transport.
    pub payload: Vec<u8>,
    pub ttl_secs: u32,
    pub urgency: Urgency,
}

/// Trait for push delivery transports
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Delivers one message to one endpoint.
    ///
    /// # Returns
    /// `Ok(())` on acceptance by the push service, `Err(PushError)` with the
    /// failure classified for the caller's lifecycle handling.
    async fn deliver(&self, message: PushMessage) -> Result<(), PushError>;
}

/// Production Web Push transport backed by the `web-push` crate
pub struct WebPushTransport {
    client: IsahcWebPushClient,
    vapid: VapidConfig,
}

impl WebPushTransport {
    /// Creates a new Web Push transport
    ///
    /// # Arguments
    /// * `vapid` - VAPID subject and private key used to sign every request
    pub fn new(vapid: VapidConfig) -> Result<Self, PushError> {
        let client = IsahcWebPushClient::new()
            .map_err(|e| PushError::Config(format!("failed to build web push client: {e}")))?;

        debug!("Initialized Web Push transport for subject {}", vapid.subject);

        Ok(Self { client, vapid })
    }
}

#[async_trait]
impl PushTransport for WebPushTransport {
    async fn deliver(&self, message: PushMessage) -> Result<(), PushError> {
        let subscription =
            SubscriptionInfo::new(&message.endpoint, &message.p256dh, &message.auth);

        let mut signature = VapidSignatureBuilder::from_base64(
            &self.vapid.private_key,
            web_push::URL_SAFE_NO_PAD,
            &subscription,
        )
        .map_err(|e| PushError::Config(format!("invalid VAPID private key: {e}")))?;
        signature.add_claim("sub", self.vapid.subject.as_str());

        let mut builder = WebPushMessageBuilder::new(&subscription);
        builder.set_payload(ContentEncoding::Aes128Gcm, &message.payload);
        builder.set_ttl(message.ttl_secs);
        builder.set_urgency(match message.urgency {
            Urgency::High => web_push::Urgency::High,
            Urgency::Normal => web_push::Urgency::Normal,
        });
        builder.set_vapid_signature(
            signature
                .build()
                .map_err(|e| PushError::Config(format!("VAPID signing failed: {e}")))?,
        );

        let push_message = builder
            .build()
            .map_err(|e| PushError::Transport(format!("failed to build push message: {e}")))?;

        match self.client.send(push_message).await {
            Ok(()) => {
                debug!(
                    "Push accepted by service for endpoint {}",
                    endpoint_label(&message.endpoint)
                );
                Ok(())
            }
            Err(e) => Err(classify(&message.endpoint, e)),
        }
    }
}

/// Maps `web-push` errors onto the delivery taxonomy.
fn classify(endpoint: &str, err: WebPushError) -> PushError {
    match err {
        WebPushError::EndpointNotFound | WebPushError::EndpointNotValid => {
            warn!(
                "Push endpoint {} reported gone by service",
                endpoint_label(endpoint)
            );
            PushError::Gone(endpoint_label(endpoint))
        }
        WebPushError::InvalidUri => PushError::Gone(endpoint_label(endpoint)),
        WebPushError::ServerError(retry_after) => PushError::Throttled(retry_after),
        other => PushError::Transport(other.to_string()),
    }
}

/// Endpoint URLs embed per-subscription tokens; log only a prefix.
fn endpoint_label(endpoint: &str) -> String {
    endpoint.chars().take(40).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_permanent_failures() {
        let gone = classify("https://push.example.org/ep/abc", WebPushError::EndpointNotFound);
        assert!(matches!(gone, PushError::Gone(_)));

        let invalid = classify("https://push.example.org/ep/abc", WebPushError::EndpointNotValid);
        assert!(matches!(invalid, PushError::Gone(_)));
    }

    #[test]
    fn test_classify_transient_failures() {
        let throttled = classify(
            "https://push.example.org/ep/abc",
            WebPushError::ServerError(Some(Duration::from_secs(30))),
        );
        match throttled {
            PushError::Throttled(retry_after) => {
                assert_eq!(retry_after, Some(Duration::from_secs(30)));
            }
            other => panic!("expected Throttled, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_unknown_failures_stay_transport() {
        let unclassified = classify("https://push.example.org/ep/abc", WebPushError::Unauthorized);
        assert!(matches!(unclassified, PushError::Transport(_)));
    }

    #[test]
    fn test_endpoint_label_truncates() {
        let long = format!("https://push.example.org/{}", "x".repeat(200));
        assert_eq!(endpoint_label(&long).chars().count(), 40);
    }
}
