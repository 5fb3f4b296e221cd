/// Vigil Web Push Shared Library
///
/// This library provides a unified Web Push transport for delivering alert
/// notifications to subscribed browsers.
///
/// It handles:
/// - VAPID key loading and request signing
/// - aes128gcm payload encryption (delegated to the `web-push` crate)
/// - TTL and urgency delivery options
/// - Classification of transport failures into permanent / transient buckets
pub mod client;
pub mod config;

pub use client::{PushError, PushMessage, PushTransport, Urgency, WebPushTransport};
pub use config::VapidConfig;
