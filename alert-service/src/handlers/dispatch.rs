use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use tracing::warn;

use super::ApiResponse;
use crate::config::Config;
use crate::models::NotificationPayload;
use crate::services::DispatchEngine;

/// Checks the shared-secret bearer token the ingestion worker presents.
fn authorized(req: &HttpRequest, expected_secret: &str) -> bool {
    req.headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token == expected_secret)
        .unwrap_or(false)
}

/// Ingestion entrypoint: match one event against all subscriptions and fan
/// out push deliveries.
///
/// POST /api/v1/push/send
pub async fn send(
    req: HttpRequest,
    engine: web::Data<Arc<DispatchEngine>>,
    config: web::Data<Config>,
    payload: web::Json<NotificationPayload>,
) -> ActixResult<HttpResponse> {
    if !authorized(&req, &config.push.api_secret) {
        warn!("Rejected dispatch request with missing or invalid bearer token");
        return Ok(
            HttpResponse::Unauthorized().json(ApiResponse::<String>::err("unauthorized"))
        );
    }

    match engine.dispatch(&payload).await {
        Ok(result) => Ok(HttpResponse::Ok().json(ApiResponse::ok(result))),
        Err(e) => {
            Ok(HttpResponse::InternalServerError()
                .json(ApiResponse::<String>::err(e.to_string())))
        }
    }
}

/// Register routes
pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/v1/push/send", web::post().to(send));
}
