use crate::api::{handlers, AppState};
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the main API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        // Escalation rules
        .route("/v1/rules", get(handlers::list_rules))
        .route("/v1/rules/reload", post(handlers::reload_rules))
        // Tickets
        .route("/v1/tickets", post(handlers::create_ticket))
        .route("/v1/tickets", get(handlers::list_tickets))
        .route("/v1/tickets/:id", get(handlers::get_ticket))
        .route("/v1/tickets/:id/status", put(handlers::update_ticket_status))
        .route("/v1/tickets/:id/escalate", post(handlers::escalate_ticket))
        .route("/v1/tickets/:id/sla", get(handlers::get_ticket_sla))
        .route(
            "/v1/tickets/:id/escalation-path",
            get(handlers::get_escalation_path),
        )
        // Escalation
        .route(
            "/v1/escalation/levels/:level/next",
            get(handlers::next_level),
        )
        .route("/v1/escalation/evaluate", post(handlers::evaluate_now))
        // Add state
        .with_state(state)
        // Add middleware
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
}
