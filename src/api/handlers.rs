use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::escalation::{next_escalation_level, CycleReport, MANUAL_ESCALATION_CEILING};
use crate::models::*;
use crate::rules::{LoadReport, MatchTier};
use crate::state::TicketFilter;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        rules_loaded: state.rules.len(),
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub rules_loaded: usize,
}

/// List escalation rules
pub async fn list_rules(
    State(state): State<AppState>,
    Query(params): Query<ListRulesQuery>,
) -> Result<Json<ListRulesResponse>> {
    let rules = if params.active_only.unwrap_or(false)
        || params.category.is_some()
        || params.sub_category.is_some()
        || params.issue.is_some()
    {
        state.rules.find_by_category(
            params.category.as_deref(),
            params.sub_category.as_deref(),
            params.issue.as_deref(),
        )
    } else {
        state.rules.snapshot().to_vec()
    };

    Ok(Json(ListRulesResponse {
        total: rules.len(),
        rules,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ListRulesQuery {
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub issue: Option<String>,
    pub active_only: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ListRulesResponse {
    pub rules: Vec<EscalationRule>,
    pub total: usize,
}

/// Reload rules from the configured source
pub async fn reload_rules(State(state): State<AppState>) -> Result<Json<LoadReport>> {
    let source = state
        .rule_source
        .as_ref()
        .ok_or_else(|| AppError::Configuration("No rule source configured".to_string()))?;

    let report = state.rules.reload(source.as_ref()).await?;
    Ok(Json(report))
}

/// Create a ticket
pub async fn create_ticket(
    State(state): State<AppState>,
    Json(request): Json<CreateTicketRequest>,
) -> Result<(StatusCode, Json<TicketResponse>)> {
    request.validate()?;

    let mut ticket = Ticket::new(
        request.category,
        request.subcategory,
        request.description,
        request.priority,
    );
    ticket.ticket_type = request.ticket_type;
    ticket.issue_type = request.issue_type;
    if let Some(created_at) = request.created_at {
        ticket.created_at = Some(created_at);
    }

    state.store.save_ticket(&ticket).await?;

    tracing::info!(
        ticket_id = %ticket.id,
        category = %ticket.category,
        priority = %ticket.priority,
        "Ticket created"
    );

    Ok((StatusCode::CREATED, Json(TicketResponse::build(&state, ticket))))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTicketRequest {
    #[validate(length(min = 1, max = 255))]
    pub category: String,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub subcategory: String,
    #[serde(default)]
    #[validate(length(max = 4000))]
    pub description: String,
    pub priority: Priority,
    pub ticket_type: Option<String>,
    pub issue_type: Option<String>,
    /// Backdated creation time for imported tickets
    pub created_at: Option<DateTime<Utc>>,
}

/// Get a ticket by ID
pub async fn get_ticket(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TicketResponse>> {
    let ticket = fetch_ticket(&state, &id).await?;
    Ok(Json(TicketResponse::build(&state, ticket)))
}

/// List tickets
pub async fn list_tickets(
    State(state): State<AppState>,
    Query(params): Query<ListTicketsQuery>,
) -> Result<Json<ListTicketsResponse>> {
    let filter = TicketFilter {
        statuses: params.status.into_iter().collect(),
        priorities: params.priority.into_iter().collect(),
        levels: params.level.into_iter().collect(),
        categories: params.category.into_iter().collect(),
        active_only: params.active_only.unwrap_or(false),
    };

    let page = params.page.unwrap_or(0);
    let page_size = params.page_size.unwrap_or(20).clamp(1, 100);

    let tickets = state.store.list_tickets(&filter, page, page_size).await?;
    let total = state.store.count_tickets(&filter).await?;

    Ok(Json(ListTicketsResponse {
        tickets: tickets
            .into_iter()
            .map(|t| TicketResponse::build(&state, t))
            .collect(),
        total,
        page,
        page_size,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ListTicketsQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub status: Option<TicketStatus>,
    pub priority: Option<Priority>,
    pub level: Option<EscalationLevel>,
    pub category: Option<String>,
    pub active_only: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ListTicketsResponse {
    pub tickets: Vec<TicketResponse>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

/// Move a ticket to a new lifecycle status
pub async fn update_ticket_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<TicketResponse>> {
    let now = state.calculator().now();
    let target = request.status;
    let mut previous: Option<TicketStatus> = None;

    // decided against the stored value so a concurrent escalation is kept
    let committed = state
        .store
        .modify_ticket(
            &id,
            Box::new(|current: &Ticket| -> Result<Option<Ticket>> {
                previous = Some(current.status);
                let updated = current.with_status(target, now)?;
                Ok((updated.status != current.status).then_some(updated))
            }),
        )
        .await?;

    let ticket = match committed {
        Some(updated) => {
            if let Some(from_status) = previous {
                tracing::info!(
                    ticket_id = %id,
                    from_status = %from_status,
                    to_status = %updated.status,
                    "Ticket status changed"
                );
            }
            updated
        }
        None => fetch_ticket(&state, &id).await?,
    };

    Ok(Json(TicketResponse::build(&state, ticket)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: TicketStatus,
}

/// Manual one-step escalation
pub async fn escalate_ticket(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EscalateResponse>> {
    let ticket = state.engine.escalate_manually(&id).await?;

    Ok(Json(EscalateResponse {
        at_ceiling: ticket.assigned_level >= MANUAL_ESCALATION_CEILING,
        ticket: TicketResponse::build(&state, ticket),
    }))
}

#[derive(Debug, Serialize)]
pub struct EscalateResponse {
    pub ticket: TicketResponse,
    /// Further manual escalation has no effect
    pub at_ceiling: bool,
}

/// SLA details for a ticket
pub async fn get_ticket_sla(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TicketSlaResponse>> {
    let ticket = fetch_ticket(&state, &id).await?;
    let calculator = state.calculator();
    let detector = state.engine.breach_detector();
    let now = calculator.now();

    let matcher = calculator.matcher();
    let matched = matcher.find_rule(&ticket);

    Ok(Json(TicketSlaResponse {
        ticket_id: ticket.id,
        level: ticket.assigned_level,
        rule_id: matched.map(|m| m.rule.id),
        match_tier: matched.map(|m| m.tier),
        sla: calculator.sla_for_ticket(&ticket),
        status: calculator.calculate_sla_status_at(&ticket, now),
        breached: detector.is_sla_breached_at(&ticket, now),
        should_auto_escalate: detector.should_auto_escalate_at(&ticket, now),
    }))
}

#[derive(Debug, Serialize)]
pub struct TicketSlaResponse {
    pub ticket_id: Uuid,
    pub level: EscalationLevel,
    pub rule_id: Option<Uuid>,
    pub match_tier: Option<MatchTier>,
    pub sla: Option<SlaConfig>,
    pub status: SlaStatus,
    pub breached: bool,
    pub should_auto_escalate: bool,
}

/// Per-level SLA timeline for a ticket
pub async fn get_escalation_path(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EscalationPathResponse>> {
    let ticket = fetch_ticket(&state, &id).await?;
    let steps = state.calculator().escalation_path(&ticket);

    Ok(Json(EscalationPathResponse {
        ticket_id: ticket.id,
        current_level: ticket.assigned_level,
        steps,
    }))
}

#[derive(Debug, Serialize)]
pub struct EscalationPathResponse {
    pub ticket_id: Uuid,
    pub current_level: EscalationLevel,
    pub steps: Vec<EscalationStep>,
}

/// Successor of an escalation level
pub async fn next_level(Path(level): Path<String>) -> Result<Json<NextLevelResponse>> {
    let level: EscalationLevel = level
        .trim()
        .parse()
        .map_err(|_| AppError::Validation(format!("Unknown escalation level: {}", level)))?;

    Ok(Json(NextLevelResponse {
        level,
        next: next_escalation_level(level),
    }))
}

#[derive(Debug, Serialize)]
pub struct NextLevelResponse {
    pub level: EscalationLevel,
    pub next: EscalationLevel,
}

/// Run one automatic escalation cycle immediately
pub async fn evaluate_now(State(state): State<AppState>) -> Result<Json<CycleReport>> {
    let report = state.engine.run_cycle().await?;
    Ok(Json(report))
}

/// Prometheus metrics endpoint
///
/// Returns metrics in Prometheus text exposition format
pub async fn metrics() -> (StatusCode, String) {
    let metrics = crate::metrics::gather_metrics();
    (StatusCode::OK, metrics)
}

async fn fetch_ticket(state: &AppState, id: &Uuid) -> Result<Ticket> {
    state
        .store
        .get_ticket(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Ticket {} not found", id)))
}

/// Ticket with its current SLA status
#[derive(Debug, Serialize)]
pub struct TicketResponse {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub sla_status: SlaStatus,
    pub breached: bool,
}

impl TicketResponse {
    fn build(state: &AppState, ticket: Ticket) -> Self {
        let now = state.calculator().now();
        Self {
            sla_status: state.calculator().calculate_sla_status_at(&ticket, now),
            breached: state.engine.breach_detector().is_sla_breached_at(&ticket, now),
            ticket,
        }
    }
}
