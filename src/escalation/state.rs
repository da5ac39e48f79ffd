//! Escalation level transitions.
//!
//! Every decision is a pure function of a ticket and an instant. It yields
//! an [`EscalationIntent`] which, applied to a ticket, produces a new ticket
//! value; nothing is mutated in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{EscalationLevel, Priority, Ticket};

/// Highest level the manual escalate action can reach
pub const MANUAL_ESCALATION_CEILING: EscalationLevel = EscalationLevel::L4;

/// Time-driven escalation thresholds, in hours since ticket creation.
///
/// Independent of the response times carried by escalation rules. Levels
/// above L3 are never reached automatically.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutoEscalationPolicy {
    pub l0_to_l1_hours: f64,
    pub l1_to_l2_hours: f64,
    pub l2_to_l3_hours: f64,
}

impl Default for AutoEscalationPolicy {
    fn default() -> Self {
        Self {
            l0_to_l1_hours: 4.0,
            l1_to_l2_hours: 8.0,
            l2_to_l3_hours: 16.0,
        }
    }
}

impl AutoEscalationPolicy {
    fn thresholds(&self) -> [(EscalationLevel, f64); 3] {
        [
            (EscalationLevel::L1, self.l0_to_l1_hours),
            (EscalationLevel::L2, self.l1_to_l2_hours),
            (EscalationLevel::L3, self.l2_to_l3_hours),
        ]
    }

    /// Highest level whose threshold has elapsed, L0 when none has
    pub fn target_level(&self, hours_elapsed: f64) -> EscalationLevel {
        self.thresholds()
            .into_iter()
            .filter(|(_, threshold)| hours_elapsed >= *threshold)
            .map(|(level, _)| level)
            .max()
            .unwrap_or(EscalationLevel::L0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EscalationTrigger {
    Auto,
    Manual,
}

/// "Move ticket X to level Y" decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationIntent {
    pub ticket_id: Uuid,
    pub from_level: EscalationLevel,
    pub to_level: EscalationLevel,
    pub previous_priority: Priority,
    pub new_priority: Priority,
    pub trigger: EscalationTrigger,
    pub decided_at: DateTime<Utc>,
}

impl EscalationIntent {
    /// New ticket value with the decision applied. Status is never touched.
    pub fn apply(&self, ticket: &Ticket) -> Ticket {
        let mut escalated = ticket.clone();
        escalated.assigned_level = self.to_level;
        escalated.priority = self.new_priority.clone();
        escalated.last_escalated_at = Some(self.decided_at);
        escalated.updated_at = self.decided_at;
        escalated
    }

    pub fn priority_changed(&self) -> bool {
        self.previous_priority != self.new_priority
    }
}

/// P4 moves up one step on automatic escalation; everything else stays
fn auto_priority(priority: &Priority) -> Priority {
    match priority {
        Priority::P4 => Priority::P3,
        other => other.clone(),
    }
}

/// Time-driven decision for an active ticket.
///
/// The ticket moves straight to the highest level whose threshold has
/// elapsed rather than one step per tick, so a 10h old L0 ticket lands on L2
/// in a single cycle.
///
/// `None` for terminal tickets, unknown creation times and tickets already at
/// or beyond the target level, so repeated evaluation never double-escalates.
pub fn auto_escalation(
    ticket: &Ticket,
    policy: &AutoEscalationPolicy,
    now: DateTime<Utc>,
) -> Option<EscalationIntent> {
    if ticket.is_terminal() {
        return None;
    }

    let elapsed_minutes = ticket.elapsed_minutes(now)?;
    let target = policy.target_level(elapsed_minutes / 60.0);

    if target <= ticket.assigned_level {
        return None;
    }

    Some(EscalationIntent {
        ticket_id: ticket.id,
        from_level: ticket.assigned_level,
        to_level: target,
        previous_priority: ticket.priority.clone(),
        new_priority: auto_priority(&ticket.priority),
        trigger: EscalationTrigger::Auto,
        decided_at: now,
    })
}

/// User-initiated one-step escalation, forcing priority to P2.
///
/// Returns `Ok(None)` once the ticket sits at the manual ceiling.
pub fn manual_escalation(ticket: &Ticket, now: DateTime<Utc>) -> Result<Option<EscalationIntent>> {
    if ticket.is_terminal() {
        return Err(AppError::InvalidStateTransition(format!(
            "ticket {} is {} and cannot be escalated",
            ticket.id, ticket.status
        )));
    }

    if ticket.assigned_level >= MANUAL_ESCALATION_CEILING {
        return Ok(None);
    }

    Ok(Some(EscalationIntent {
        ticket_id: ticket.id,
        from_level: ticket.assigned_level,
        to_level: ticket.assigned_level.next(),
        previous_priority: ticket.priority.clone(),
        new_priority: Priority::P2,
        trigger: EscalationTrigger::Manual,
        decided_at: now,
    }))
}

/// Pure successor lookup used by timeline views; L5 maps onto itself
pub fn next_escalation_level(level: EscalationLevel) -> EscalationLevel {
    level.next()
}
