use serde::{Deserialize, Serialize};
use strum::Display;

use super::ticket::EscalationLevel;

/// Resolved SLA parameters for a ticket at one escalation level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaConfig {
    /// Level name, `None` for the neutral config returned on unknown levels
    pub level: Option<EscalationLevel>,
    pub response_time_minutes: u32,
    pub resolution_time_minutes: u32,
    pub response_time_hours: f64,
    pub resolution_time_hours: f64,
    pub assignee: String,
}

impl SlaConfig {
    pub const UNASSIGNED: &'static str = "Unassigned";

    /// Zeroed config used when a level cannot be resolved
    pub fn unassigned() -> Self {
        Self {
            level: None,
            response_time_minutes: 0,
            resolution_time_minutes: 0,
            response_time_hours: 0.0,
            resolution_time_hours: 0.0,
            assignee: Self::UNASSIGNED.to_string(),
        }
    }
}

/// Three-valued health of an SLA window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum SlaHealth {
    #[serde(rename = "On Track")]
    #[strum(serialize = "On Track")]
    OnTrack,
    Warning,
    Critical,
}

/// Where the SLA window of a status came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum SlaSource {
    /// Matched escalation rule at the ticket's current level
    Rule,
    /// Priority default table
    Default,
}

/// Point-in-time SLA metrics for a ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaStatus {
    pub breached: bool,
    pub elapsed_minutes: f64,
    /// Clamped at zero
    pub remaining_minutes: f64,
    pub remaining_hours: f64,
    pub resolution_target_hours: f64,
    /// 0..=100
    pub percentage_used: u32,
    pub status: SlaHealth,
    pub source: SlaSource,
}

/// One level of a ticket's escalation timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationStep {
    pub level: EscalationLevel,
    pub sla: SlaConfig,
    /// The ticket is at or beyond this level
    pub reached: bool,
    pub current: bool,
    /// Time spent at the current level, measured from the last escalation
    /// (or creation). Only set on the current step.
    pub elapsed_at_level_minutes: Option<f64>,
}
