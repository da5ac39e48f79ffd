//! Prometheus metrics for the SLA and escalation engine.
//!
//! All metrics live in a single process-wide registry and are exported in
//! text exposition format by [`gather_metrics`] (served at `GET /metrics`).
//!
//! # Example
//! ```no_run
//! use facility_sla_engine::metrics::{init_metrics, TICKETS_ESCALATED_TOTAL};
//!
//! init_metrics().ok();
//! TICKETS_ESCALATED_TOTAL
//!     .with_label_values(&["auto", "L1"])
//!     .inc();
//! ```

use lazy_static::lazy_static;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

const NAMESPACE: &str = "facility_sla";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    // ============================================================================
    // Escalation Metrics
    // ============================================================================

    /// Completed automatic evaluation cycles
    pub static ref ESCALATION_CYCLES_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("escalation_cycles_total", "Total number of automatic escalation evaluation cycles")
            .namespace(NAMESPACE)
    ).expect("Failed to create ESCALATION_CYCLES_TOTAL metric");

    /// Wall time of one evaluation cycle
    pub static ref ESCALATION_CYCLE_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "escalation_cycle_duration_seconds",
            "Duration of an automatic escalation evaluation cycle in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0])
    ).expect("Failed to create ESCALATION_CYCLE_DURATION_SECONDS metric");

    /// Tickets escalated
    ///
    /// Labels: trigger (auto|manual), to_level
    pub static ref TICKETS_ESCALATED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("tickets_escalated_total", "Total number of ticket escalations")
            .namespace(NAMESPACE),
        &["trigger", "to_level"]
    ).expect("Failed to create TICKETS_ESCALATED_TOTAL metric");

    /// Tickets skipped by the evaluator
    ///
    /// Labels: reason
    pub static ref TICKETS_SKIPPED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("tickets_skipped_total", "Tickets skipped during escalation evaluation")
            .namespace(NAMESPACE),
        &["reason"]
    ).expect("Failed to create TICKETS_SKIPPED_TOTAL metric");

    /// Active tickets past their resolution target at the last cycle
    pub static ref SLA_BREACHED_TICKETS: IntGauge = IntGauge::with_opts(
        Opts::new("sla_breached_tickets", "Active tickets in SLA breach at the last evaluation")
            .namespace(NAMESPACE)
    ).expect("Failed to create SLA_BREACHED_TICKETS metric");

    // ============================================================================
    // Rule Metrics
    // ============================================================================

    /// Rules in the current repository snapshot
    pub static ref RULES_LOADED: IntGauge = IntGauge::with_opts(
        Opts::new("rules_loaded", "Escalation rules in the current snapshot")
            .namespace(NAMESPACE)
    ).expect("Failed to create RULES_LOADED metric");

    /// Rule records rejected during normalization
    pub static ref RULE_RECORDS_REJECTED_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("rule_records_rejected_total", "Rule records rejected while loading")
            .namespace(NAMESPACE)
    ).expect("Failed to create RULE_RECORDS_REJECTED_TOTAL metric");

    /// Rule lookups by outcome
    ///
    /// Labels: tier (exact|category_priority|type_priority|none)
    pub static ref RULE_MATCHES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("rule_matches_total", "Rule lookups by matching tier")
            .namespace(NAMESPACE),
        &["tier"]
    ).expect("Failed to create RULE_MATCHES_TOTAL metric");
}

/// Register all metrics with the global registry.
///
/// Fails with `AlreadyReg` when called twice in the same process.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    PROMETHEUS_REGISTRY.register(Box::new(ESCALATION_CYCLES_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(ESCALATION_CYCLE_DURATION_SECONDS.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(TICKETS_ESCALATED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(TICKETS_SKIPPED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(SLA_BREACHED_TICKETS.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(RULES_LOADED.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(RULE_RECORDS_REJECTED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(RULE_MATCHES_TOTAL.clone()))?;

    tracing::debug!("Prometheus metrics registered");
    Ok(())
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}
