use milletchain_core::audit::{AuditEvent, AuditOutcome, AuditSink};
use milletchain_core::config::{AppConfig, LogFormat};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins over the configured level when it is set.
pub fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));
    let builder = tracing_subscriber::fmt().with_target(false).with_env_filter(filter);

    match config.logging.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Writes audit events to the structured log.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        let order_id = event.order_id.as_ref().map(|id| id.0.as_str()).unwrap_or("unknown");
        let metadata = event
            .metadata
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(" ");

        match event.outcome {
            AuditOutcome::Success => info!(
                event_name = %event.event_type,
                correlation_id = %event.correlation_id,
                order_id = %order_id,
                actor = %event.actor,
                category = ?event.category,
                metadata = %metadata,
                "audit"
            ),
            AuditOutcome::Rejected | AuditOutcome::Failed => warn!(
                event_name = %event.event_type,
                correlation_id = %event.correlation_id,
                order_id = %order_id,
                actor = %event.actor,
                category = ?event.category,
                outcome = ?event.outcome,
                metadata = %metadata,
                "audit"
            ),
        }
    }
}
