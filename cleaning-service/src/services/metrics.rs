//! Prometheus metrics for cleaning-service.

use axum::{extract::Request, middleware::Next, response::Response};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// Invoice counter by status.
pub static INVOICES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "cleaning_invoices_total",
        "Total number of invoices by status",
        &["status"] // pending, paid, canceled, overdue
    )
    .expect("Failed to register invoices_total")
});

/// Payment counter by method.
pub static PAYMENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "cleaning_payments_total",
        "Total number of payments by method",
        &["method"]
    )
    .expect("Failed to register payments_total")
});

/// Commission counter by status.
pub static COMMISSIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "cleaning_commissions_total",
        "Total number of commissions by status",
        &["status"]
    )
    .expect("Failed to register commissions_total")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "cleaning_errors_total",
        "Total number of errors by type",
        &["error_type"]
    )
    .expect("Failed to register errors_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "cleaning_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&INVOICES_TOTAL);
    Lazy::force(&PAYMENTS_TOTAL);
    Lazy::force(&COMMISSIONS_TOTAL);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}

/// Bump the error counter for every 4xx/5xx response, so alerting sees
/// validation failures and server errors regardless of which handler
/// produced them.
pub async fn error_metrics_middleware(req: Request, next: Next) -> Response {
    let response = next.run(req).await;

    let status = response.status();
    if status.is_client_error() {
        ERRORS_TOTAL.with_label_values(&["client_error"]).inc();
    } else if status.is_server_error() {
        ERRORS_TOTAL.with_label_values(&["server_error"]).inc();
    }

    response
}

#[cfg(test)]
mod tests {
    use super::{error_metrics_middleware, ERRORS_TOTAL};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        middleware::from_fn,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/boom", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
            .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
            .route("/ok", get(|| async { StatusCode::OK }))
            .layer(from_fn(error_metrics_middleware))
    }

    async fn hit(path: &str) -> StatusCode {
        let response = app()
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        response.status()
    }

    #[tokio::test]
    async fn error_responses_bump_the_error_counter() {
        let server_before = ERRORS_TOTAL.with_label_values(&["server_error"]).get();
        let client_before = ERRORS_TOTAL.with_label_values(&["client_error"]).get();

        assert_eq!(hit("/boom").await, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(hit("/missing").await, StatusCode::NOT_FOUND);
        assert_eq!(hit("/ok").await, StatusCode::OK);

        let server_after = ERRORS_TOTAL.with_label_values(&["server_error"]).get();
        let client_after = ERRORS_TOTAL.with_label_values(&["client_error"]).get();
        assert_eq!(server_after - server_before, 1.0);
        assert_eq!(client_after - client_before, 1.0);
    }
}
