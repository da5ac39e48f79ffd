//! SLA and escalation engine for facility-management helpdesks.
//!
//! Tickets are matched against an escalation rule table to derive per-level
//! response and resolution targets, SLA health and breach state. A periodic
//! monitor escalates tickets automatically as they age; users can escalate
//! manually through the HTTP API.

pub mod api;
pub mod config;
pub mod error;
pub mod escalation;
pub mod metrics;
pub mod models;
pub mod rules;
pub mod sla;
pub mod state;

pub use error::{AppError, Result};
pub use escalation::{Clock, EscalationEngine, ManualClock, SystemClock};
pub use models::{EscalationLevel, EscalationRule, Priority, Ticket, TicketStatus};
pub use rules::{RuleMatcher, RuleRepository};
pub use sla::{BreachDetector, SlaCalculator};
