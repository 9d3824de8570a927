pub mod billing;
pub mod config;
pub mod handlers;
pub mod models;
pub mod services;

use axum::middleware::from_fn;
use axum::{
    routing::{get, patch, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::middleware::{metrics::metrics_middleware, tracing::request_id_middleware};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use config::Config;
use services::{Database, DateSequenceNumbering, GatewayClient, InvoiceNumbering};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub gateway: GatewayClient,
    pub numbering: Arc<dyn InvoiceNumbering>,
}

pub struct Application {
    port: u16,
    router: Router,
}

impl Application {
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let db = Database::new(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await?;

        db.run_migrations().await?;

        let gateway = GatewayClient::new(config.gateway.clone());
        if gateway.is_configured() {
            tracing::info!("Payment gateway client initialized");
        } else {
            tracing::warn!("Gateway credentials not configured - online payments will be limited");
        }

        let state = AppState {
            db,
            config: config.clone(),
            gateway,
            numbering: Arc::new(DateSequenceNumbering),
        };

        let router = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/metrics", get(handlers::metrics))
            // Clients
            .route("/clients", post(handlers::clients::create_client))
            .route("/clients", get(handlers::clients::list_clients))
            .route("/clients/:id", get(handlers::clients::get_client))
            // Agents and commission types
            .route("/agents", post(handlers::agents::create_agent))
            .route("/agents", get(handlers::agents::list_agents))
            .route("/agents/:id", get(handlers::agents::get_agent))
            .route(
                "/agents/:id/commissions",
                get(handlers::commissions::list_agent_commissions),
            )
            .route(
                "/commission-types",
                post(handlers::agents::create_commission_type),
            )
            .route(
                "/commission-types",
                get(handlers::agents::list_commission_types),
            )
            .route(
                "/commission-types/:id/default",
                post(handlers::agents::set_default_commission_type),
            )
            // Catalog
            .route("/carpet-types", post(handlers::catalog::create_carpet_type))
            .route("/carpet-types", get(handlers::catalog::list_carpet_types))
            .route(
                "/addon-services",
                post(handlers::catalog::create_addon_service),
            )
            .route(
                "/addon-services",
                get(handlers::catalog::list_addon_services),
            )
            .route("/tax-settings", post(handlers::catalog::create_tax_setting))
            .route("/tax-settings", get(handlers::catalog::list_tax_settings))
            // Orders and carpets
            .route("/orders", post(handlers::orders::create_order))
            .route("/orders", get(handlers::orders::list_orders))
            .route("/orders/:id", get(handlers::orders::get_order))
            .route(
                "/orders/:id/status",
                patch(handlers::orders::update_order_status),
            )
            .route("/orders/:id/carpets", post(handlers::orders::add_carpet))
            .route("/carpets/:id/addons", post(handlers::orders::attach_addon))
            .route("/carpets/:id/cancel", post(handlers::orders::cancel_carpet))
            // Invoices
            .route(
                "/orders/:id/invoice",
                post(handlers::invoices::generate_invoice),
            )
            .route(
                "/invoices/:id/regenerate",
                post(handlers::invoices::regenerate_invoice),
            )
            .route("/invoices", get(handlers::invoices::list_invoices))
            .route("/invoices/:id", get(handlers::invoices::get_invoice))
            // Payments
            .route(
                "/invoices/:id/payments",
                post(handlers::payments::create_payment),
            )
            .route("/payments/:id", get(handlers::payments::get_payment))
            .route(
                "/payments/:id/complete",
                post(handlers::payments::complete_payment),
            )
            .route("/webhooks/gateway", post(handlers::payments::webhook))
            // Commissions
            .route(
                "/commissions/:id",
                get(handlers::commissions::get_commission),
            )
            .route(
                "/commissions/:id/pay",
                post(handlers::commissions::pay_commission),
            )
            .route(
                "/commissions/:id/cancel",
                post(handlers::commissions::cancel_commission),
            )
            .layer(from_fn(services::metrics::error_metrics_middleware))
            .layer(from_fn(metrics_middleware))
            .layer(from_fn(request_id_middleware))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("-");

                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                        version = ?request.version(),
                    )
                }),
            )
            .with_state(state);

        Ok(Self {
            port: config.server.port,
            router,
        })
    }

    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        tracing::info!("Listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router).await?;

        Ok(())
    }
}
