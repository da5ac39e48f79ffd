use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::models::Ticket;
use crate::rules::RuleMatch;
use crate::sla::calculator::SlaCalculator;
use crate::sla::defaults::default_sla_hours;

/// Breach and auto-escalation predicates over the SLA calculator.
///
/// Both measure elapsed time from ticket creation, not from the start of
/// the current level.
#[derive(Clone)]
pub struct BreachDetector {
    calculator: Arc<SlaCalculator>,
}

impl BreachDetector {
    pub fn new(calculator: Arc<SlaCalculator>) -> Self {
        Self { calculator }
    }

    pub fn calculator(&self) -> &Arc<SlaCalculator> {
        &self.calculator
    }

    pub fn is_sla_breached(&self, ticket: &Ticket) -> bool {
        self.is_sla_breached_at(ticket, self.calculator.now())
    }

    /// Whether the resolution target has been exceeded. Terminal tickets
    /// and tickets without a creation time are never breached.
    pub fn is_sla_breached_at(&self, ticket: &Ticket, now: DateTime<Utc>) -> bool {
        if ticket.is_terminal() {
            return false;
        }

        let Some(elapsed) = ticket.elapsed_minutes(now) else {
            return false;
        };

        match self.calculator.sla_for_ticket(ticket) {
            Some(sla) => elapsed > sla.resolution_time_minutes as f64,
            None => elapsed / 60.0 > default_sla_hours(&ticket.priority) as f64,
        }
    }

    pub fn should_auto_escalate(&self, ticket: &Ticket) -> bool {
        self.should_auto_escalate_at(ticket, self.calculator.now())
    }

    /// Whether the matched rule's response target at the current level has
    /// passed. No rule, no auto escalation.
    pub fn should_auto_escalate_at(&self, ticket: &Ticket, now: DateTime<Utc>) -> bool {
        if ticket.is_terminal() {
            return false;
        }

        let Some(elapsed) = ticket.elapsed_minutes(now) else {
            return false;
        };

        let matcher = self.calculator.matcher();
        match matcher.find_rule(ticket) {
            Some(RuleMatch { rule, .. }) => {
                elapsed > rule.target(ticket.assigned_level).response_time_minutes as f64
            }
            None => false,
        }
    }
}
