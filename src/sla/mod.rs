pub mod breach;
pub mod calculator;
pub mod defaults;

pub use breach::BreachDetector;
pub use calculator::SlaCalculator;
pub use defaults::{default_sla_hours, DEFAULT_SLA_HOURS, DEFAULT_WARNING_THRESHOLD_PERCENT};
