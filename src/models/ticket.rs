use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Escalation level of a ticket, from first line (L0) to executive (L5)
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumString,
    Display,
    EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum EscalationLevel {
    L0,
    L1,
    L2,
    L3,
    L4,
    L5,
}

impl EscalationLevel {
    /// Number of escalation levels carried by every rule
    pub const COUNT: usize = 6;

    /// Zero-based position of the level
    pub fn index(&self) -> usize {
        match self {
            EscalationLevel::L0 => 0,
            EscalationLevel::L1 => 1,
            EscalationLevel::L2 => 2,
            EscalationLevel::L3 => 3,
            EscalationLevel::L4 => 4,
            EscalationLevel::L5 => 5,
        }
    }

    /// Level following this one. L5 maps onto itself.
    pub fn next(&self) -> EscalationLevel {
        match self {
            EscalationLevel::L0 => EscalationLevel::L1,
            EscalationLevel::L1 => EscalationLevel::L2,
            EscalationLevel::L2 => EscalationLevel::L3,
            EscalationLevel::L3 => EscalationLevel::L4,
            EscalationLevel::L4 => EscalationLevel::L5,
            EscalationLevel::L5 => EscalationLevel::L5,
        }
    }

    /// All levels in ascending order
    pub fn all() -> impl Iterator<Item = EscalationLevel> {
        EscalationLevel::iter()
    }
}

/// Ticket priority. P1 is the most urgent.
///
/// Parsing never fails: text that is not one of the known priorities is kept
/// verbatim in `Other`, and every SLA computation treats it leniently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Priority {
    P1,
    P2,
    P3,
    P4,
    Other(String),
}

impl Priority {
    /// Numeric rank (lower is more urgent); unrecognized priorities rank last
    pub fn rank(&self) -> u8 {
        match self {
            Priority::P1 => 1,
            Priority::P2 => 2,
            Priority::P3 => 3,
            Priority::P4 => 4,
            Priority::Other(_) => u8::MAX,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Priority::Other(_))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::P1 => f.write_str("P1"),
            Priority::P2 => f.write_str("P2"),
            Priority::P3 => f.write_str("P3"),
            Priority::P4 => f.write_str("P4"),
            Priority::Other(raw) => f.write_str(raw),
        }
    }
}

impl From<String> for Priority {
    fn from(raw: String) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "P1" => Priority::P1,
            "P2" => Priority::P2,
            "P3" => Priority::P3,
            "P4" => Priority::P4,
            _ => Priority::Other(trimmed.to_string()),
        }
    }
}

impl From<&str> for Priority {
    fn from(raw: &str) -> Self {
        Priority::from(raw.to_string())
    }
}

impl From<Priority> for String {
    fn from(priority: Priority) -> Self {
        priority.to_string()
    }
}

/// Lifecycle status of a ticket
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, Display)]
#[strum(ascii_case_insensitive)]
pub enum TicketStatus {
    Open,
    #[serde(rename = "WIP")]
    #[strum(serialize = "WIP")]
    Wip,
    Resolved,
    Closed,
    Lapsed,
}

impl TicketStatus {
    /// Resolved and Closed tickets are exempt from breach detection and
    /// automatic escalation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Resolved | TicketStatus::Closed)
    }

    /// Whether the status may move to `next`. Resolved -> WIP is the explicit
    /// push-back path used by approval flows.
    pub fn can_transition_to(&self, next: TicketStatus) -> bool {
        use TicketStatus::*;
        matches!(
            (self, next),
            (Open, Wip)
                | (Wip, Resolved)
                | (Resolved, Closed)
                | (Resolved, Wip)
                | (Open, Lapsed)
                | (Wip, Lapsed)
                | (Lapsed, Wip)
        )
    }
}

/// A helpdesk work item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    /// Unique identifier
    pub id: Uuid,

    pub category: String,

    #[serde(default)]
    pub subcategory: String,

    /// Free text; doubles as the "issue" key during rule matching
    #[serde(default)]
    pub description: String,

    pub priority: Priority,

    pub status: TicketStatus,

    pub assigned_level: EscalationLevel,

    /// Creation time. Missing or unparsable values deserialize to `None`.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub ticket_type: Option<String>,

    #[serde(default)]
    pub issue_type: Option<String>,

    /// When the current escalation level began
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_escalated_at: Option<DateTime<Utc>>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// Create a new ticket at L0 in status Open
    pub fn new(
        category: impl Into<String>,
        subcategory: impl Into<String>,
        description: impl Into<String>,
        priority: Priority,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            category: category.into(),
            subcategory: subcategory.into(),
            description: description.into(),
            priority,
            status: TicketStatus::Open,
            assigned_level: EscalationLevel::L0,
            created_at: Some(now),
            ticket_type: None,
            issue_type: None,
            last_escalated_at: None,
            updated_at: now,
        }
    }

    pub fn with_ticket_type(mut self, ticket_type: impl Into<String>) -> Self {
        self.ticket_type = Some(ticket_type.into());
        self
    }

    pub fn with_issue_type(mut self, issue_type: impl Into<String>) -> Self {
        self.issue_type = Some(issue_type.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Minutes since creation, `None` when the creation time is unknown
    pub fn elapsed_minutes(&self, now: DateTime<Utc>) -> Option<f64> {
        self.created_at
            .map(|created| (now - created).num_milliseconds() as f64 / 60_000.0)
    }

    /// When the current level began: the last escalation, or creation
    pub fn level_started_at(&self) -> Option<DateTime<Utc>> {
        self.last_escalated_at.or(self.created_at)
    }

    /// Produce a copy of the ticket in status `next`.
    pub fn with_status(&self, next: TicketStatus, now: DateTime<Utc>) -> Result<Ticket> {
        if self.status == next {
            return Ok(self.clone());
        }

        if !self.status.can_transition_to(next) {
            return Err(AppError::InvalidStateTransition(format!(
                "ticket {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }

        let mut updated = self.clone();
        updated.status = next;
        updated.updated_at = now;
        Ok(updated)
    }
}

fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;

    Ok(raw.and_then(|value| match value {
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        // epoch milliseconds
        serde_json::Value::Number(n) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    }))
}
