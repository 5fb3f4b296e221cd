use std::sync::Arc;

use actix_web::{web, HttpResponse, Result as ActixResult};
use serde::{Deserialize, Serialize};

use super::ApiResponse;
use crate::models::{NotificationPreferences, SubscriptionKeys};
use crate::repository::SubscriptionRepository;

/// Subscribe request from the browser client
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SubscribePayload {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
    pub user_id: String,
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Initial preference set; omitted on plain resubscribes
    #[serde(default)]
    pub preferences: Option<NotificationPreferences>,
}

/// Unsubscribe request
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UnsubscribePayload {
    pub endpoint: String,
}

/// Register a push subscription
///
/// POST /api/v1/push/subscribe
pub async fn subscribe(
    repository: web::Data<Arc<dyn SubscriptionRepository>>,
    req: web::Json<SubscribePayload>,
) -> ActixResult<HttpResponse> {
    let payload = req.into_inner();

    if payload.endpoint.trim().is_empty() {
        return Ok(HttpResponse::BadRequest()
            .json(ApiResponse::<String>::err("endpoint cannot be empty")));
    }

    match repository
        .store(
            &payload.endpoint,
            payload.keys,
            &payload.user_id,
            payload.user_agent,
            payload.preferences.unwrap_or_default(),
        )
        .await
    {
        Ok(()) => Ok(HttpResponse::Ok().json(ApiResponse::ok(serde_json::json!({
            "subscribed": true
        })))),
        Err(e) => {
            Ok(HttpResponse::InternalServerError()
                .json(ApiResponse::<String>::err(e.to_string())))
        }
    }
}

/// Remove a push subscription
///
/// POST /api/v1/push/unsubscribe
pub async fn unsubscribe(
    repository: web::Data<Arc<dyn SubscriptionRepository>>,
    req: web::Json<UnsubscribePayload>,
) -> ActixResult<HttpResponse> {
    match repository.remove(&req.endpoint).await {
        Ok(removed) => Ok(HttpResponse::Ok().json(ApiResponse::ok(serde_json::json!({
            "removed": removed
        })))),
        Err(e) => {
            Ok(HttpResponse::InternalServerError()
                .json(ApiResponse::<String>::err(e.to_string())))
        }
    }
}

/// Register routes
pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/v1/push/subscribe", web::post().to(subscribe))
        .route("/api/v1/push/unsubscribe", web::post().to(unsubscribe));
}
