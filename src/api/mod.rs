pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::escalation::EscalationEngine;
use crate::rules::{RuleRepository, RuleSource};
use crate::sla::SlaCalculator;
use crate::state::TicketStore;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub rules: Arc<RuleRepository>,
    pub store: Arc<dyn TicketStore>,
    pub engine: Arc<EscalationEngine>,
    pub rule_source: Option<Arc<dyn RuleSource>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        rules: Arc<RuleRepository>,
        store: Arc<dyn TicketStore>,
        engine: Arc<EscalationEngine>,
    ) -> Self {
        Self {
            rules,
            store,
            engine,
            rule_source: None,
            started_at: Instant::now(),
        }
    }

    /// Set the source used by `POST /v1/rules/reload`
    pub fn with_rule_source(mut self, source: Arc<dyn RuleSource>) -> Self {
        self.rule_source = Some(source);
        self
    }

    pub fn calculator(&self) -> &Arc<SlaCalculator> {
        self.engine.calculator()
    }
}
