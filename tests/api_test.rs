mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::Duration;
use common::{technical_p1_rule, Harness};
use facility_sla_engine::{
    api::{build_router, AppState},
    escalation::Clock,
    models::{EscalationLevel, Priority},
    rules::{RawRuleRecord, StaticRuleSource},
    state::TicketStore,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app(harness: &Harness) -> Router {
    let state = AppState::new(
        harness.rules.clone(),
        harness.store.clone(),
        harness.engine.clone(),
    );
    build_router(state)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn create(app: &Router, harness: &Harness, minutes_ago: i64) -> String {
    let created_at = harness.clock.now() - Duration::minutes(minutes_ago);
    let (status, body) = send(
        app,
        "POST",
        "/v1/tickets",
        Some(json!({
            "category": "Technical",
            "subcategory": "HVAC",
            "description": "AC not cooling",
            "priority": "P1",
            "ticket_type": "Reactive",
            "issue_type": "Client Complaint",
            "created_at": created_at,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let harness = Harness::new(vec![technical_p1_rule()]);
    let app = app(&harness);

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["rules_loaded"], 1);
}

#[tokio::test]
async fn test_create_and_fetch_ticket() {
    let harness = Harness::new(vec![technical_p1_rule()]);
    let app = app(&harness);

    let id = create(&app, &harness, 90).await;

    let (status, body) = send(&app, "GET", &format!("/v1/tickets/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Open");
    assert_eq!(body["assigned_level"], "L0");
    assert_eq!(body["breached"], true);
    assert_eq!(body["sla_status"]["status"], "Critical");

    let (status, body) = send(&app, "GET", "/v1/tickets?active_only=true", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn test_create_rejects_empty_category() {
    let harness = Harness::new(Vec::new());
    let app = app(&harness);

    let (status, body) = send(
        &app,
        "POST",
        "/v1/tickets",
        Some(json!({ "category": "", "priority": "P2" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_ticket_sla_and_path() {
    let harness = Harness::new(vec![technical_p1_rule()]);
    let app = app(&harness);
    let id = create(&app, &harness, 20).await;

    let (status, body) = send(&app, "GET", &format!("/v1/tickets/{}/sla", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["match_tier"], "exact");
    assert_eq!(body["sla"]["assignee"], "Technician");
    assert_eq!(body["breached"], false);
    assert_eq!(body["should_auto_escalate"], true);

    let (status, body) = send(
        &app,
        "GET",
        &format!("/v1/tickets/{}/escalation-path", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current_level"], "L0");
    assert_eq!(body["steps"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn test_manual_escalation_endpoint() {
    let harness = Harness::new(vec![technical_p1_rule()]);
    let app = app(&harness);
    let id = create(&app, &harness, 5).await;

    let uri = format!("/v1/tickets/{}/escalate", id);
    let (status, body) = send(&app, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ticket"]["assigned_level"], "L1");
    assert_eq!(body["ticket"]["priority"], "P2");
    assert_eq!(body["at_ceiling"], false);

    for _ in 0..5 {
        send(&app, "POST", &uri, None).await;
    }
    let (status, body) = send(&app, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ticket"]["assigned_level"], "L4");
    assert_eq!(body["at_ceiling"], true);
}

#[tokio::test]
async fn test_status_transitions() {
    let harness = Harness::new(vec![technical_p1_rule()]);
    let app = app(&harness);
    let id = create(&app, &harness, 5).await;
    let uri = format!("/v1/tickets/{}/status", id);

    let (status, body) = send(&app, "PUT", &uri, Some(json!({ "status": "Closed" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_STATE_TRANSITION");

    let (status, _) = send(&app, "PUT", &uri, Some(json!({ "status": "WIP" }))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, "PUT", &uri, Some(json!({ "status": "Resolved" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["breached"], false);

    // resolved tickets cannot be escalated
    let (status, _) = send(&app, "POST", &format!("/v1/tickets/{}/escalate", id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_status_update_keeps_escalation() {
    let harness = Harness::new(Vec::new());
    let app = app(&harness);
    let ticket = harness.ticket_aged(5 * 60, "Civil", Priority::P4);
    harness.store.save_ticket(&ticket).await.unwrap();

    // a status request that read the ticket before the cycle ran
    let uri = format!("/v1/tickets/{}", ticket.id);
    let (_, before) = send(&app, "GET", &uri, None).await;
    assert_eq!(before["assigned_level"], "L0");

    let (_, report) = send(&app, "POST", "/v1/escalation/evaluate", None).await;
    assert_eq!(report["escalated"], 1);

    let (status, body) = send(
        &app,
        "PUT",
        &format!("{}/status", uri),
        Some(json!({ "status": "WIP" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "WIP");
    assert_eq!(body["assigned_level"], "L1");
    assert_eq!(body["priority"], "P3");

    let stored = harness.store.get_ticket(&ticket.id).await.unwrap().unwrap();
    assert_eq!(stored.assigned_level, EscalationLevel::L1);
    assert_eq!(stored.status, facility_sla_engine::models::TicketStatus::Wip);
}

#[tokio::test]
async fn test_next_level_lookup() {
    let harness = Harness::new(Vec::new());
    let app = app(&harness);

    let (status, body) = send(&app, "GET", "/v1/escalation/levels/l2/next", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["level"], "L2");
    assert_eq!(body["next"], "L3");

    let (_, body) = send(&app, "GET", "/v1/escalation/levels/L5/next", None).await;
    assert_eq!(body["next"], "L5");

    let (status, body) = send(&app, "GET", "/v1/escalation/levels/L9/next", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_evaluate_runs_cycle() {
    let harness = Harness::new(vec![technical_p1_rule()]);
    let app = app(&harness);
    let old = create(&app, &harness, 9 * 60).await;
    create(&app, &harness, 30).await;

    let (status, body) = send(&app, "POST", "/v1/escalation/evaluate", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["evaluated"], 2);
    assert_eq!(body["escalated"], 1);

    let (_, body) = send(&app, "GET", &format!("/v1/tickets/{}", old), None).await;
    assert_eq!(body["assigned_level"], "L2");
}

#[tokio::test]
async fn test_unknown_ticket_is_404() {
    let harness = Harness::new(Vec::new());
    let app = app(&harness);
    let missing = uuid::Uuid::new_v4();

    for uri in [
        format!("/v1/tickets/{}", missing),
        format!("/v1/tickets/{}/sla", missing),
        format!("/v1/tickets/{}/escalation-path", missing),
    ] {
        let (status, body) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    let (status, _) = send(&app, "POST", &format!("/v1/tickets/{}/escalate", missing), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rules_listing_and_reload() {
    let harness = Harness::new(vec![technical_p1_rule()]);

    let (status, _) = send(&app(&harness), "POST", "/v1/rules/reload", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let replacement =
        technical_p1_rule().with_level(EscalationLevel::L0, 10, 30, "Night Technician");
    let civil: RawRuleRecord = serde_json::from_value(json!({
        "category": "Civil",
        "priority": "P3",
        "l0ResolutionTime": 600,
    }))
    .unwrap();
    let source = StaticRuleSource::new(vec![RawRuleRecord::from(&replacement), civil]);
    let state = AppState::new(
        harness.rules.clone(),
        harness.store.clone(),
        harness.engine.clone(),
    )
    .with_rule_source(Arc::new(source));
    let app = build_router(state);

    let (status, body) = send(&app, "POST", "/v1/rules/reload", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["loaded"], 2);

    let (status, body) = send(&app, "GET", "/v1/rules?category=Technical", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["rules"][0]["levels"][0]["assignee"], "Night Technician");
}
