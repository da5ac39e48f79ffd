use crate::error::{AppError, Result};
use crate::escalation::clock::Ticker;
use crate::escalation::state::{
    auto_escalation, manual_escalation, AutoEscalationPolicy, EscalationIntent, EscalationTrigger,
};
use crate::metrics::{
    ESCALATION_CYCLES_TOTAL, ESCALATION_CYCLE_DURATION_SECONDS, SLA_BREACHED_TICKETS,
    TICKETS_ESCALATED_TOTAL, TICKETS_SKIPPED_TOTAL,
};
use crate::models::Ticket;
use crate::sla::{BreachDetector, SlaCalculator};
use crate::state::{TicketStore, TicketUpdateHandler};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use strum::Display;
use uuid::Uuid;

/// Why a ticket was left out of an evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SkipReason {
    MissingCreatedAt,
    FutureCreatedAt,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedTicket {
    pub ticket_id: Uuid,
    pub reason: SkipReason,
}

/// Outcome of evaluating a batch of tickets at one instant
#[derive(Debug, Clone, Default, Serialize)]
pub struct Evaluation {
    pub evaluated: usize,
    pub breached: usize,
    pub intents: Vec<EscalationIntent>,
    pub skipped: Vec<SkippedTicket>,
}

/// Result of one automatic escalation cycle
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub evaluated_at: Option<DateTime<Utc>>,
    pub evaluated: usize,
    pub escalated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub breached: usize,
    pub escalated_ticket_ids: Vec<Uuid>,
}

/// Escalation engine statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct EscalationStats {
    pub cycles_run: u64,
    pub auto_escalations: u64,
    pub manual_escalations: u64,
    pub last_cycle: Option<CycleReport>,
}

/// Drives time-based and manual escalation over the ticket store.
///
/// Decisions are recomputed from timestamps on every cycle; the only state
/// kept here is statistics. Every write is decided against the stored value
/// inside [`TicketStore::modify_ticket`].
pub struct EscalationEngine {
    calculator: Arc<SlaCalculator>,
    breach: BreachDetector,
    store: Arc<dyn TicketStore>,
    updater: Option<Arc<dyn TicketUpdateHandler>>,
    policy: AutoEscalationPolicy,
    stats: RwLock<EscalationStats>,
}

impl EscalationEngine {
    pub fn new(calculator: Arc<SlaCalculator>, store: Arc<dyn TicketStore>) -> Self {
        Self {
            breach: BreachDetector::new(calculator.clone()),
            calculator,
            store,
            updater: None,
            policy: AutoEscalationPolicy::default(),
            stats: RwLock::new(EscalationStats::default()),
        }
    }

    /// Notify `handler` with every committed escalation
    pub fn with_update_handler(mut self, handler: Arc<dyn TicketUpdateHandler>) -> Self {
        self.updater = Some(handler);
        self
    }

    /// Override the automatic escalation thresholds
    pub fn with_policy(mut self, policy: AutoEscalationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &AutoEscalationPolicy {
        &self.policy
    }

    pub fn breach_detector(&self) -> &BreachDetector {
        &self.breach
    }

    pub fn calculator(&self) -> &Arc<SlaCalculator> {
        &self.calculator
    }

    pub fn evaluate(&self, tickets: &[Ticket]) -> Evaluation {
        self.evaluate_at(tickets, self.calculator.now())
    }

    /// Decide escalations for `tickets` at `now` without touching the store.
    ///
    /// Terminal tickets are ignored. Tickets whose creation time is missing or
    /// lies in the future are reported as skipped.
    pub fn evaluate_at(&self, tickets: &[Ticket], now: DateTime<Utc>) -> Evaluation {
        let mut evaluation = Evaluation::default();

        for ticket in tickets.iter().filter(|t| !t.is_terminal()) {
            let reason = match ticket.created_at {
                None => Some(SkipReason::MissingCreatedAt),
                Some(created) if created > now => Some(SkipReason::FutureCreatedAt),
                Some(_) => None,
            };

            if let Some(reason) = reason {
                evaluation.skipped.push(SkippedTicket {
                    ticket_id: ticket.id,
                    reason,
                });
                continue;
            }

            evaluation.evaluated += 1;

            if self.breach.is_sla_breached_at(ticket, now) {
                evaluation.breached += 1;
            }

            if let Some(intent) = auto_escalation(ticket, &self.policy, now) {
                evaluation.intents.push(intent);
            }
        }

        evaluation
    }

    /// Run one automatic escalation cycle over the active tickets.
    ///
    /// A failure on one ticket is logged and counted; it never aborts the
    /// rest of the batch.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let timer = ESCALATION_CYCLE_DURATION_SECONDS.start_timer();
        let now = self.calculator.now();

        let tickets = self.store.active_tickets().await?;
        let evaluation = self.evaluate_at(&tickets, now);

        for skipped in &evaluation.skipped {
            TICKETS_SKIPPED_TOTAL
                .with_label_values(&[&skipped.reason.to_string()])
                .inc();
            tracing::warn!(
                ticket_id = %skipped.ticket_id,
                reason = %skipped.reason,
                "Skipping ticket during escalation evaluation"
            );
        }

        let mut report = CycleReport {
            evaluated_at: Some(now),
            evaluated: evaluation.evaluated,
            skipped: evaluation.skipped.len(),
            breached: evaluation.breached,
            ..Default::default()
        };

        for intent in &evaluation.intents {
            match self.apply_auto(&intent.ticket_id, now).await {
                Ok(Some(ticket)) => {
                    report.escalated += 1;
                    report.escalated_ticket_ids.push(ticket.id);
                }
                Ok(None) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        ticket_id = %intent.ticket_id,
                        error = %e,
                        "Failed to apply automatic escalation"
                    );
                }
            }
        }

        SLA_BREACHED_TICKETS.set(report.breached as i64);
        ESCALATION_CYCLES_TOTAL.inc();
        timer.observe_duration();

        {
            let mut stats = self.stats.write();
            stats.cycles_run += 1;
            stats.auto_escalations += report.escalated as u64;
            stats.last_cycle = Some(report.clone());
        }

        if report.escalated > 0 || report.failed > 0 {
            tracing::info!(
                evaluated = report.evaluated,
                escalated = report.escalated,
                skipped = report.skipped,
                failed = report.failed,
                breached = report.breached,
                "Escalation cycle completed"
            );
        } else {
            tracing::debug!(
                evaluated = report.evaluated,
                skipped = report.skipped,
                breached = report.breached,
                "Escalation cycle completed"
            );
        }

        Ok(report)
    }

    /// Apply the automatic decision against the stored ticket.
    ///
    /// The ticket may have been resolved or escalated since the snapshot was
    /// taken, so the decision is recomputed under the store's write lock.
    async fn apply_auto(&self, ticket_id: &Uuid, now: DateTime<Utc>) -> Result<Option<Ticket>> {
        let policy = &self.policy;
        let mut decided: Option<EscalationIntent> = None;

        let committed = self
            .store
            .modify_ticket(
                ticket_id,
                Box::new(|current: &Ticket| -> Result<Option<Ticket>> {
                    let Some(intent) = auto_escalation(current, policy, now) else {
                        return Ok(None);
                    };
                    let escalated = intent.apply(current);
                    decided = Some(intent);
                    Ok(Some(escalated))
                }),
            )
            .await;

        let escalated = match committed {
            Ok(Some(ticket)) => ticket,
            Ok(None) => return Ok(None),
            Err(AppError::NotFound(_)) => {
                tracing::debug!(ticket_id = %ticket_id, "Ticket vanished before escalation");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let Some(intent) = decided else {
            return Ok(None);
        };

        TICKETS_ESCALATED_TOTAL
            .with_label_values(&[&EscalationTrigger::Auto.to_string(), &intent.to_level.to_string()])
            .inc();

        tracing::info!(
            ticket_id = %escalated.id,
            from_level = %intent.from_level,
            to_level = %intent.to_level,
            priority = %escalated.priority,
            priority_changed = intent.priority_changed(),
            "Ticket escalated automatically"
        );

        self.notify(&escalated).await;
        Ok(Some(escalated))
    }

    /// Escalate a ticket one level on user request.
    ///
    /// At the manual ceiling the stored ticket is returned unchanged.
    pub async fn escalate_manually(&self, ticket_id: &Uuid) -> Result<Ticket> {
        let now = self.calculator.now();
        let mut decided: Option<EscalationIntent> = None;

        let committed = self
            .store
            .modify_ticket(
                ticket_id,
                Box::new(|current: &Ticket| -> Result<Option<Ticket>> {
                    let Some(intent) = manual_escalation(current, now)? else {
                        return Ok(None);
                    };
                    let escalated = intent.apply(current);
                    decided = Some(intent);
                    Ok(Some(escalated))
                }),
            )
            .await?;

        let (Some(escalated), Some(intent)) = (committed, decided) else {
            let ticket = self
                .store
                .get_ticket(ticket_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Ticket {} not found", ticket_id)))?;
            tracing::info!(
                ticket_id = %ticket_id,
                level = %ticket.assigned_level,
                "Ticket already at manual escalation ceiling"
            );
            return Ok(ticket);
        };

        TICKETS_ESCALATED_TOTAL
            .with_label_values(&[&EscalationTrigger::Manual.to_string(), &intent.to_level.to_string()])
            .inc();
        self.stats.write().manual_escalations += 1;

        tracing::info!(
            ticket_id = %ticket_id,
            from_level = %intent.from_level,
            to_level = %intent.to_level,
            previous_priority = %intent.previous_priority,
            "Ticket escalated manually"
        );

        self.notify(&escalated).await;
        Ok(escalated)
    }

    /// A failing handler does not undo the committed escalation
    async fn notify(&self, ticket: &Ticket) {
        let Some(handler) = &self.updater else {
            return;
        };

        if let Err(e) = handler.on_update_ticket(ticket.clone()).await {
            tracing::warn!(ticket_id = %ticket.id, error = %e, "Ticket update handler failed");
        }
    }

    /// Run escalation cycles on every tick until the ticker finishes
    pub async fn run_monitor<T: Ticker>(self: Arc<Self>, mut ticker: T) {
        tracing::info!(
            l0_to_l1_hours = self.policy.l0_to_l1_hours,
            l1_to_l2_hours = self.policy.l1_to_l2_hours,
            l2_to_l3_hours = self.policy.l2_to_l3_hours,
            "Starting escalation monitor"
        );

        while ticker.tick().await {
            if let Err(e) = self.run_cycle().await {
                tracing::error!(error = %e, "Escalation cycle failed");
            }
        }

        tracing::info!("Escalation monitor stopped");
    }

    pub fn get_stats(&self) -> EscalationStats {
        self.stats.read().clone()
    }
}
