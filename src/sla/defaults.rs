use crate::models::Priority;

/// Resolution window in hours used when no escalation rule matches a ticket
pub const DEFAULT_SLA_HOURS: [(Priority, u32); 4] = [
    (Priority::P1, 4),
    (Priority::P2, 8),
    (Priority::P3, 24),
    (Priority::P4, 48),
];

/// Window for priorities outside the table. The most lenient value, so
/// unrecognized tickets are never flagged early.
pub const FALLBACK_SLA_HOURS: u32 = 48;

/// Share of the SLA window after which a ticket is in `Warning`
pub const DEFAULT_WARNING_THRESHOLD_PERCENT: u32 = 75;

pub fn default_sla_hours(priority: &Priority) -> u32 {
    DEFAULT_SLA_HOURS
        .iter()
        .find(|(p, _)| p == priority)
        .map(|(_, hours)| *hours)
        .unwrap_or(FALLBACK_SLA_HOURS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_hours() {
        assert_eq!(default_sla_hours(&Priority::P1), 4);
        assert_eq!(default_sla_hours(&Priority::P2), 8);
        assert_eq!(default_sla_hours(&Priority::P3), 24);
        assert_eq!(default_sla_hours(&Priority::P4), 48);
        assert_eq!(default_sla_hours(&Priority::from("Urgent")), FALLBACK_SLA_HOURS);
    }
}
