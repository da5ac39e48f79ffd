//! Shared fixtures for integration tests
#![allow(dead_code)]

use chrono::Duration;
use facility_sla_engine::{
    escalation::{Clock, EscalationEngine, ManualClock},
    models::{EscalationLevel, EscalationRule, Priority, Ticket},
    rules::RuleRepository,
    sla::SlaCalculator,
    state::InMemoryStore,
};
use std::sync::Arc;

pub struct Harness {
    pub clock: ManualClock,
    pub rules: Arc<RuleRepository>,
    pub store: Arc<InMemoryStore>,
    pub calculator: Arc<SlaCalculator>,
    pub engine: Arc<EscalationEngine>,
}

impl Harness {
    pub fn new(rules: Vec<EscalationRule>) -> Self {
        let clock = ManualClock::default();
        let rules = Arc::new(RuleRepository::from_rules(rules));
        let store = Arc::new(InMemoryStore::new());
        let calculator = Arc::new(SlaCalculator::new(rules.clone(), Arc::new(clock.clone())));
        let engine = Arc::new(EscalationEngine::new(calculator.clone(), store.clone()));

        Self {
            clock,
            rules,
            store,
            calculator,
            engine,
        }
    }

    /// Ticket created `minutes` ago by the harness clock
    pub fn ticket_aged(&self, minutes: i64, category: &str, priority: Priority) -> Ticket {
        Ticket::new(category, "HVAC", "AC not cooling", priority)
            .with_created_at(self.clock.now() - Duration::minutes(minutes))
    }
}

/// Technical/P1 rule with a one hour L0 resolution target
pub fn technical_p1_rule() -> EscalationRule {
    EscalationRule::new(
        "Reactive",
        "Client Complaint",
        "Technical",
        "HVAC",
        "AC not cooling",
        Priority::P1,
    )
    .with_level(EscalationLevel::L0, 15, 60, "Technician")
    .with_level(EscalationLevel::L1, 30, 120, "Supervisor")
    .with_level(EscalationLevel::L2, 60, 240, "Facility Manager")
    .with_level(EscalationLevel::L3, 120, 480, "Cluster Head")
    .with_level(EscalationLevel::L4, 240, 960, "Regional Head")
    .with_level(EscalationLevel::L5, 480, 1440, "Client Director")
}
