use serde::Serialize;
use std::sync::Arc;
use strum::Display;

use crate::metrics::RULE_MATCHES_TOTAL;
use crate::models::{EscalationRule, Ticket};

/// Which fallback tier produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MatchTier {
    /// Type, issue type, category, sub-category, issue and priority
    Exact,
    /// Category and priority
    CategoryPriority,
    /// Ticket type and priority
    TypePriority,
}

/// A rule selected for a ticket
#[derive(Debug, Clone, Copy)]
pub struct RuleMatch<'a> {
    pub rule: &'a EscalationRule,
    pub tier: MatchTier,
}

/// Resolves the single rule applicable to a ticket.
///
/// Tiers are tried in order (exact, category+priority, type+priority) and
/// only ACTIVE rules take part. Within a tier the first rule in snapshot
/// order wins.
#[derive(Debug, Clone)]
pub struct RuleMatcher {
    rules: Arc<Vec<EscalationRule>>,
}

fn same(rule_field: &str, ticket_field: &str) -> bool {
    rule_field.trim() == ticket_field.trim()
}

/// Absent ticket attributes never match
fn same_opt(rule_field: &str, ticket_field: Option<&str>) -> bool {
    ticket_field.is_some_and(|value| same(rule_field, value))
}

impl RuleMatcher {
    pub fn new(rules: Arc<Vec<EscalationRule>>) -> Self {
        Self { rules }
    }

    pub fn find_rule(&self, ticket: &Ticket) -> Option<RuleMatch<'_>> {
        let found = self
            .first(MatchTier::Exact, ticket)
            .or_else(|| self.first(MatchTier::CategoryPriority, ticket))
            .or_else(|| self.first(MatchTier::TypePriority, ticket));

        match &found {
            Some(m) => {
                RULE_MATCHES_TOTAL.with_label_values(&[&m.tier.to_string()]).inc();
                tracing::trace!(
                    ticket_id = %ticket.id,
                    rule_id = %m.rule.id,
                    tier = %m.tier,
                    "Matched escalation rule"
                );
            }
            None => {
                RULE_MATCHES_TOTAL.with_label_values(&["none"]).inc();
                tracing::trace!(ticket_id = %ticket.id, "No escalation rule matched");
            }
        }

        found
    }

    fn first(&self, tier: MatchTier, ticket: &Ticket) -> Option<RuleMatch<'_>> {
        self.rules
            .iter()
            .filter(|rule| rule.is_active() && rule.priority == ticket.priority)
            .find(|rule| Self::matches_tier(rule, tier, ticket))
            .map(|rule| RuleMatch { rule, tier })
    }

    fn matches_tier(rule: &EscalationRule, tier: MatchTier, ticket: &Ticket) -> bool {
        match tier {
            MatchTier::Exact => {
                same_opt(&rule.ticket_type, ticket.ticket_type.as_deref())
                    && same_opt(&rule.issue_type, ticket.issue_type.as_deref())
                    && same(&rule.category, &ticket.category)
                    && same(&rule.sub_category, &ticket.subcategory)
                    && same(&rule.issue, &ticket.description)
            }
            MatchTier::CategoryPriority => same(&rule.category, &ticket.category),
            MatchTier::TypePriority => same_opt(&rule.ticket_type, ticket.ticket_type.as_deref()),
        }
    }
}
