use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::escalation::clock::Clock;
use crate::models::{
    EscalationLevel, EscalationRule, EscalationStep, SlaConfig, SlaHealth, SlaSource, SlaStatus,
    Ticket,
};
use crate::rules::{RuleMatch, RuleMatcher, RuleRepository};
use crate::sla::defaults::{default_sla_hours, DEFAULT_WARNING_THRESHOLD_PERCENT};

/// Minutes to hours, rounded to one decimal
fn hours(minutes: f64) -> f64 {
    (minutes / 60.0 * 10.0).round() / 10.0
}

/// Turns a ticket and its matched rule into time metrics.
///
/// Nothing is cached: every call re-reads the rule snapshot and the clock.
pub struct SlaCalculator {
    rules: Arc<RuleRepository>,
    clock: Arc<dyn Clock>,
    warning_threshold_percent: u32,
}

impl SlaCalculator {
    pub fn new(rules: Arc<RuleRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            rules,
            clock,
            warning_threshold_percent: DEFAULT_WARNING_THRESHOLD_PERCENT,
        }
    }

    pub fn with_warning_threshold(mut self, percent: u32) -> Self {
        self.warning_threshold_percent = percent;
        self
    }

    pub fn rules(&self) -> &Arc<RuleRepository> {
        &self.rules
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Matcher over the current rule snapshot
    pub fn matcher(&self) -> RuleMatcher {
        RuleMatcher::new(self.rules.snapshot())
    }

    /// SLA parameters of `rule` at `level`
    pub fn sla_for_level(rule: &EscalationRule, level: EscalationLevel) -> SlaConfig {
        let target = rule.target(level);

        SlaConfig {
            level: Some(level),
            response_time_minutes: target.response_time_minutes,
            resolution_time_minutes: target.resolution_time_minutes,
            response_time_hours: hours(target.response_time_minutes as f64),
            resolution_time_hours: hours(target.resolution_time_minutes as f64),
            assignee: target.assignee.clone(),
        }
    }

    /// Like [`Self::sla_for_level`] for a level given as text. Unknown levels
    /// yield the zeroed "Unassigned" config instead of an error.
    pub fn sla_for_level_name(rule: &EscalationRule, level: &str) -> SlaConfig {
        match level.trim().parse::<EscalationLevel>() {
            Ok(level) => Self::sla_for_level(rule, level),
            Err(_) => {
                tracing::debug!(level = %level, "Unknown escalation level, using unassigned SLA");
                SlaConfig::unassigned()
            }
        }
    }

    /// SLA of the matched rule at the ticket's current level
    pub fn sla_for_ticket(&self, ticket: &Ticket) -> Option<SlaConfig> {
        let matcher = self.matcher();
        matcher
            .find_rule(ticket)
            .map(|RuleMatch { rule, .. }| Self::sla_for_level(rule, ticket.assigned_level))
    }

    pub fn calculate_sla_status(&self, ticket: &Ticket) -> SlaStatus {
        self.calculate_sla_status_at(ticket, self.now())
    }

    /// SLA status at an explicit instant. Tickets without a creation time
    /// count as just created.
    pub fn calculate_sla_status_at(&self, ticket: &Ticket, now: DateTime<Utc>) -> SlaStatus {
        let elapsed = ticket.elapsed_minutes(now).unwrap_or(0.0).max(0.0);

        let (sla_minutes, source) = match self.sla_for_ticket(ticket) {
            Some(sla) => (sla.resolution_time_minutes as f64, SlaSource::Rule),
            None => (
                default_sla_hours(&ticket.priority) as f64 * 60.0,
                SlaSource::Default,
            ),
        };

        let remaining = sla_minutes - elapsed;
        let percentage_used = if sla_minutes > 0.0 {
            (elapsed / sla_minutes * 100.0).round().min(100.0) as u32
        } else {
            100
        };

        let status = if remaining <= 0.0 {
            SlaHealth::Critical
        } else if percentage_used >= self.warning_threshold_percent {
            SlaHealth::Warning
        } else {
            SlaHealth::OnTrack
        };

        let remaining_clamped = remaining.max(0.0);

        SlaStatus {
            breached: remaining < 0.0 && !ticket.is_terminal(),
            elapsed_minutes: elapsed,
            remaining_minutes: remaining_clamped,
            remaining_hours: hours(remaining_clamped),
            resolution_target_hours: hours(sla_minutes),
            percentage_used,
            status,
            source,
        }
    }

    /// Every level's SLA for the matched rule, for timeline views. Empty when
    /// no rule matches.
    pub fn escalation_path(&self, ticket: &Ticket) -> Vec<EscalationStep> {
        self.escalation_path_at(ticket, self.now())
    }

    pub fn escalation_path_at(&self, ticket: &Ticket, now: DateTime<Utc>) -> Vec<EscalationStep> {
        let matcher = self.matcher();
        let Some(RuleMatch { rule, .. }) = matcher.find_rule(ticket) else {
            return Vec::new();
        };

        let elapsed_at_level = ticket
            .level_started_at()
            .map(|started| ((now - started).num_milliseconds() as f64 / 60_000.0).max(0.0));

        EscalationLevel::all()
            .map(|level| {
                let current = level == ticket.assigned_level;
                EscalationStep {
                    level,
                    sla: Self::sla_for_level(rule, level),
                    reached: level <= ticket.assigned_level,
                    current,
                    elapsed_at_level_minutes: if current { elapsed_at_level } else { None },
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escalation::clock::ManualClock;
    use crate::models::Priority;
    use chrono::Duration;

    fn technical_rule() -> EscalationRule {
        EscalationRule::new("Reactive", "Client Complaint", "Technical", "HVAC", "AC not cooling", Priority::P1)
            .with_level(EscalationLevel::L0, 15, 60, "Technician")
            .with_level(EscalationLevel::L1, 30, 125, "Supervisor")
            .with_level(EscalationLevel::L2, 60, 240, "Facility Manager")
    }

    fn calculator(clock: &ManualClock) -> SlaCalculator {
        SlaCalculator::new(
            Arc::new(RuleRepository::from_rules(vec![technical_rule()])),
            Arc::new(clock.clone()),
        )
    }

    #[test]
    fn test_sla_for_level_rounds_hours() {
        let config = SlaCalculator::sla_for_level(&technical_rule(), EscalationLevel::L1);

        assert_eq!(config.level, Some(EscalationLevel::L1));
        assert_eq!(config.resolution_time_minutes, 125);
        assert_eq!(config.resolution_time_hours, 2.1);
        assert_eq!(config.response_time_hours, 0.5);
        assert_eq!(config.assignee, "Supervisor");
    }

    #[test]
    fn test_unknown_level_name_is_unassigned() {
        let config = SlaCalculator::sla_for_level_name(&technical_rule(), "L9");
        assert_eq!(config, SlaConfig::unassigned());

        let known = SlaCalculator::sla_for_level_name(&technical_rule(), "l2");
        assert_eq!(known.assignee, "Facility Manager");
    }

    #[test]
    fn test_status_from_matched_rule() {
        let clock = ManualClock::default();
        let calc = calculator(&clock);
        let ticket = Ticket::new("Technical", "HVAC", "AC not cooling", Priority::P1)
            .with_created_at(clock.now() - Duration::minutes(30));

        let status = calc.calculate_sla_status(&ticket);
        assert_eq!(status.source, SlaSource::Rule);
        assert_eq!(status.percentage_used, 50);
        assert_eq!(status.remaining_minutes, 30.0);
        assert_eq!(status.resolution_target_hours, 1.0);
        assert_eq!(status.status, SlaHealth::OnTrack);
        assert!(!status.breached);
    }

    #[test]
    fn test_warning_threshold() {
        let clock = ManualClock::default();
        let calc = calculator(&clock);
        let ticket = Ticket::new("Technical", "HVAC", "AC not cooling", Priority::P1)
            .with_created_at(clock.now() - Duration::minutes(45));

        let status = calc.calculate_sla_status(&ticket);
        assert_eq!(status.percentage_used, 75);
        assert_eq!(status.status, SlaHealth::Warning);
    }

    #[test]
    fn test_critical_when_window_spent() {
        let clock = ManualClock::default();
        let calc = calculator(&clock);
        let ticket = Ticket::new("Technical", "HVAC", "AC not cooling", Priority::P1)
            .with_created_at(clock.now() - Duration::minutes(90));

        let status = calc.calculate_sla_status(&ticket);
        assert_eq!(status.status, SlaHealth::Critical);
        assert_eq!(status.percentage_used, 100);
        assert_eq!(status.remaining_minutes, 0.0);
        assert!(status.breached);
    }

    #[test]
    fn test_default_window_when_no_rule() {
        let clock = ManualClock::default();
        let calc = calculator(&clock);
        let ticket = Ticket::new("Soft Services", "Cleaning", "Spill", Priority::P3)
            .with_created_at(clock.now() - Duration::hours(6));

        assert!(calc.sla_for_ticket(&ticket).is_none());
        let status = calc.calculate_sla_status(&ticket);
        assert_eq!(status.source, SlaSource::Default);
        assert_eq!(status.resolution_target_hours, 24.0);
        assert_eq!(status.percentage_used, 25);
        assert_eq!(status.remaining_hours, 18.0);
    }

    #[test]
    fn test_missing_created_at_counts_as_new() {
        let clock = ManualClock::default();
        let calc = calculator(&clock);
        let mut ticket = Ticket::new("Soft Services", "Cleaning", "Spill", Priority::P2);
        ticket.created_at = None;

        let status = calc.calculate_sla_status(&ticket);
        assert_eq!(status.elapsed_minutes, 0.0);
        assert_eq!(status.percentage_used, 0);
        assert_eq!(status.status, SlaHealth::OnTrack);
    }

    #[test]
    fn test_status_is_recomputed_as_time_moves() {
        let clock = ManualClock::default();
        let calc = calculator(&clock);
        let ticket = Ticket::new("Technical", "HVAC", "AC not cooling", Priority::P1)
            .with_created_at(clock.now());

        assert_eq!(calc.calculate_sla_status(&ticket).status, SlaHealth::OnTrack);
        clock.advance(Duration::minutes(61));
        assert_eq!(calc.calculate_sla_status(&ticket).status, SlaHealth::Critical);
    }

    #[test]
    fn test_escalation_path() {
        let clock = ManualClock::default();
        let calc = calculator(&clock);
        let mut ticket = Ticket::new("Technical", "HVAC", "AC not cooling", Priority::P1)
            .with_created_at(clock.now() - Duration::hours(5));
        ticket.assigned_level = EscalationLevel::L1;
        ticket.last_escalated_at = Some(clock.now() - Duration::minutes(20));

        let path = calc.escalation_path(&ticket);
        assert_eq!(path.len(), EscalationLevel::COUNT);
        assert!(path[0].reached && !path[0].current);
        assert!(path[1].current);
        assert_eq!(path[1].elapsed_at_level_minutes, Some(20.0));
        assert!(!path[2].reached);
        assert_eq!(path[2].sla.assignee, "Facility Manager");

        let unmatched = Ticket::new("Civil", "Roof", "Leak", Priority::P4);
        assert!(calc.escalation_path(&unmatched).is_empty());
    }
}
