use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::config::ObservabilityConfig;
use crate::flow::types::FlowId;
use crate::operations::OperationKind;
use crate::protocol::Address;

/// Initialize structured logging.
///
/// `RUST_LOG` wins over the configured level. Output goes to stderr so it
/// never interleaves with command output on stdout.
pub fn init_telemetry(observability: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&observability.log_level))?;

    let registry = tracing_subscriber::registry().with(filter);
    if observability.json_logs {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()?;
    }

    tracing::debug!("Aruna telemetry initialized with structured logging");
    Ok(())
}

/// Generate a correlation ID for linking related operations
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span wrapping one transaction flow from open to terminal state
pub fn create_flow_span(
    operation: OperationKind,
    flow_id: &FlowId,
    account: Option<&Address>,
) -> tracing::Span {
    tracing::info_span!(
        "transaction_flow",
        operation = ?operation,
        flow.id = %flow_id,
        account = account.map(|a| a.as_str()),
        correlation.id = %generate_correlation_id(),
        otel.kind = "internal"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_ids_are_unique() {
        assert_ne!(generate_correlation_id(), generate_correlation_id());
    }

    #[test]
    fn flow_span_builds_without_subscriber() {
        let span = create_flow_span(OperationKind::ClaimYield, &FlowId::new(), None);
        let _entered = span.enter();
    }
}
