pub mod clock;
pub mod engine;
pub mod state;

pub use clock::{Clock, IntervalTicker, ManualClock, ManualTicker, SystemClock, TickHandle, Ticker};
pub use engine::{CycleReport, EscalationEngine, EscalationStats, Evaluation, SkipReason, SkippedTicket};
pub use state::{
    auto_escalation, manual_escalation, next_escalation_level, AutoEscalationPolicy,
    EscalationIntent, EscalationTrigger, MANUAL_ESCALATION_CEILING,
};
