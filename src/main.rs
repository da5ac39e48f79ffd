use facility_sla_engine::{
    api::{build_router, AppState},
    config::Config,
    escalation::{EscalationEngine, IntervalTicker, SystemClock},
    rules::{FileRuleSource, RuleRepository, RuleSource},
    sla::SlaCalculator,
    state::InMemoryStore,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration before logging so json_logs can pick the layer
    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::embedded_defaults()?, Some(e)),
    };

    init_tracing(&config);

    if let Some(e) = config_error {
        tracing::warn!(error = %e, "Failed to load configuration, using embedded defaults");
    }

    tracing::info!(
        service = %config.observability.service_name,
        version = env!("CARGO_PKG_VERSION"),
        "Starting facility SLA engine"
    );

    // Initialize Prometheus metrics
    if config.observability.prometheus_enabled {
        if let Err(e) = facility_sla_engine::metrics::init_metrics() {
            tracing::warn!(error = %e, "Failed to initialize metrics, continuing without");
        } else {
            tracing::info!("Prometheus metrics initialized");
        }
    } else {
        tracing::info!("Prometheus metrics disabled in configuration");
    }

    // Load escalation rules. A broken rule file should not keep the
    // service down; tickets fall back to the default SLA table.
    let rules = Arc::new(RuleRepository::new());
    let rule_source: Option<Arc<dyn RuleSource>> = config
        .rules
        .source_path()
        .map(|path| Arc::new(FileRuleSource::new(path.clone())) as Arc<dyn RuleSource>);

    match &rule_source {
        Some(source) => {
            if let Err(e) = rules.reload(source.as_ref()).await {
                tracing::error!(
                    source = %source.name(),
                    error = %e,
                    "Failed to load escalation rules, starting with an empty rule set"
                );
            }
        }
        None => tracing::warn!("No rule source configured, every ticket uses default SLAs"),
    }

    let store = Arc::new(InMemoryStore::new());
    let calculator = Arc::new(
        SlaCalculator::new(rules.clone(), Arc::new(SystemClock))
            .with_warning_threshold(config.escalation.warning_threshold_percent),
    );
    let engine = Arc::new(
        EscalationEngine::new(calculator, store.clone())
            .with_policy(config.escalation.thresholds),
    );

    // Spawn escalation monitor
    if config.escalation.enabled {
        let ticker = IntervalTicker::new(config.escalation.check_interval());
        tokio::spawn(engine.clone().run_monitor(ticker));
        tracing::info!(
            interval_secs = config.escalation.check_interval_secs,
            "Escalation monitor started"
        );
    } else {
        tracing::info!("Automatic escalation disabled in configuration");
    }

    let mut app_state = AppState::new(rules, store, engine);
    if let Some(source) = rule_source {
        app_state = app_state.with_rule_source(source);
    }
    let app = build_router(app_state);

    // Start HTTP server
    let http_addr = format!("{}:{}", config.server.host, config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_addr).await?;

    tracing::info!(address = %http_addr, "HTTP API server listening");

    let http_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(http_listener, app).await {
            tracing::error!(error = %e, "HTTP server error");
        }
    });

    tokio::select! {
        _ = http_handle => {
            tracing::warn!("HTTP server stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    tracing::info!("Shutting down");
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "facility_sla_engine={level},tower_http={level}",
            level = config.observability.log_level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);

    if config.observability.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
