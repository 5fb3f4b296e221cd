use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, TextEncoder};

use crate::models::DispatchResult;

static DISPATCH_RUNS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "alert_service_dispatch_runs_total",
        "Dispatch calls processed by alert-service",
    )
    .expect("failed to create alert_service_dispatch_runs_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register alert_service_dispatch_runs_total");
    counter
});

static PUSH_DELIVERIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "alert_service_push_deliveries_total",
            "Push delivery outcomes by classification",
        ),
        &["outcome"],
    )
    .expect("failed to create alert_service_push_deliveries_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register alert_service_push_deliveries_total");
    counter
});

static SUBSCRIPTIONS_REMOVED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "alert_service_subscriptions_removed_total",
        "Subscriptions removed after permanent delivery failures",
    )
    .expect("failed to create alert_service_subscriptions_removed_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register alert_service_subscriptions_removed_total");
    counter
});

pub fn observe_dispatch(result: &DispatchResult) {
    DISPATCH_RUNS_TOTAL.inc();
    PUSH_DELIVERIES_TOTAL
        .with_label_values(&["success"])
        .inc_by(u64::from(result.success));
    PUSH_DELIVERIES_TOTAL
        .with_label_values(&["failed"])
        .inc_by(u64::from(result.failed));
    SUBSCRIPTIONS_REMOVED_TOTAL.inc_by(u64::from(result.removed));
}

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
