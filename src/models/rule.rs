use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use super::ticket::{EscalationLevel, Priority};

/// SLA targets for a single escalation level
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelTarget {
    /// Response-time target in minutes
    pub response_time_minutes: u32,

    /// Resolution-time target in minutes
    pub resolution_time_minutes: u32,

    /// Display label of whoever owns the ticket at this level
    #[serde(default)]
    pub assignee: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum RuleStatus {
    #[default]
    Active,
    Inactive,
}

/// SLA policy for a class of tickets. Read-only once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationRule {
    pub id: Uuid,
    pub ticket_type: String,
    pub issue_type: String,
    pub category: String,
    pub sub_category: String,
    pub issue: String,
    pub priority: Priority,

    /// Targets for L0..L5, indexed by `EscalationLevel::index`
    pub levels: [LevelTarget; EscalationLevel::COUNT],

    #[serde(default)]
    pub status: RuleStatus,

    #[serde(default)]
    pub client_escalation: bool,

    #[serde(default)]
    pub tenant_escalation: bool,
}

impl EscalationRule {
    /// Create an active rule with all level targets zeroed
    pub fn new(
        ticket_type: impl Into<String>,
        issue_type: impl Into<String>,
        category: impl Into<String>,
        sub_category: impl Into<String>,
        issue: impl Into<String>,
        priority: Priority,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            ticket_type: ticket_type.into(),
            issue_type: issue_type.into(),
            category: category.into(),
            sub_category: sub_category.into(),
            issue: issue.into(),
            priority,
            levels: Default::default(),
            status: RuleStatus::Active,
            client_escalation: false,
            tenant_escalation: false,
        }
    }

    /// Set the targets for one level
    pub fn with_level(
        mut self,
        level: EscalationLevel,
        response_time_minutes: u32,
        resolution_time_minutes: u32,
        assignee: impl Into<String>,
    ) -> Self {
        self.levels[level.index()] = LevelTarget {
            response_time_minutes,
            resolution_time_minutes,
            assignee: assignee.into(),
        };
        self
    }

    pub fn with_status(mut self, status: RuleStatus) -> Self {
        self.status = status;
        self
    }

    pub fn target(&self, level: EscalationLevel) -> &LevelTarget {
        &self.levels[level.index()]
    }

    pub fn is_active(&self) -> bool {
        self.status == RuleStatus::Active
    }

    /// A rule is usable when at least one level has a positive resolution target
    pub fn is_usable(&self) -> bool {
        self.levels.iter().any(|l| l.resolution_time_minutes > 0)
    }

    /// Levels whose resolution target is shorter than their response target
    pub fn inconsistent_levels(&self) -> Vec<EscalationLevel> {
        EscalationLevel::all()
            .filter(|level| {
                let target = self.target(*level);
                target.resolution_time_minutes < target.response_time_minutes
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_levels() {
        let rule = EscalationRule::new(
            "Reactive",
            "Client Complaint",
            "Technical",
            "HVAC",
            "AC not cooling",
            Priority::P1,
        )
        .with_level(EscalationLevel::L0, 15, 60, "Technician")
        .with_level(EscalationLevel::L1, 30, 120, "Supervisor");

        assert!(rule.is_active());
        assert!(rule.is_usable());
        assert_eq!(rule.target(EscalationLevel::L1).assignee, "Supervisor");
        assert_eq!(rule.target(EscalationLevel::L5).resolution_time_minutes, 0);
        assert!(rule.inconsistent_levels().is_empty());
    }

    #[test]
    fn test_unusable_rule() {
        let rule = EscalationRule::new("Reactive", "Observation", "Soft", "Cleaning", "", Priority::P4)
            .with_level(EscalationLevel::L0, 30, 0, "Housekeeping");

        assert!(!rule.is_usable());
        assert_eq!(rule.inconsistent_levels(), vec![EscalationLevel::L0]);
    }

    #[test]
    fn test_rule_status_wire_format() {
        assert_eq!(serde_json::to_string(&RuleStatus::Inactive).unwrap(), "\"INACTIVE\"");
        assert_eq!("active".parse::<RuleStatus>().unwrap(), RuleStatus::Active);
    }
}
