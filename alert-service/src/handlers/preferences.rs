use std::sync::Arc;

use actix_web::{web, HttpResponse, Result as ActixResult};
use serde::{Deserialize, Serialize};

use super::ApiResponse;
use crate::models::NotificationPreferences;
use crate::repository::SubscriptionRepository;

/// Preference replacement request
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UpdatePreferencesPayload {
    pub endpoint: String,
    pub preferences: NotificationPreferences,
}

/// Replace the preference set stored with a subscription
///
/// PUT /api/v1/push/preferences
pub async fn update_preferences(
    repository: web::Data<Arc<dyn SubscriptionRepository>>,
    req: web::Json<UpdatePreferencesPayload>,
) -> ActixResult<HttpResponse> {
    let payload = req.into_inner();

    match repository
        .update_preferences(&payload.endpoint, payload.preferences)
        .await
    {
        Ok(true) => Ok(HttpResponse::Ok().json(ApiResponse::ok(serde_json::json!({
            "updated": true
        })))),
        Ok(false) => Ok(HttpResponse::NotFound()
            .json(ApiResponse::<String>::err("subscription not found"))),
        Err(e) => {
            Ok(HttpResponse::InternalServerError()
                .json(ApiResponse::<String>::err(e.to_string())))
        }
    }
}

/// Register routes
pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/api/v1/push/preferences",
        web::put().to(update_preferences),
    );
}
