// Aruna transaction flow library
// Drives invoice and vault transactions through the approve / confirm /
// pending / success flow and exposes the pieces for testing and integration

pub mod capabilities;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod flow;
pub mod operations;
pub mod protocol;
pub mod reads;
pub mod sandbox;
pub mod telemetry;
pub mod validation;

// Re-export key types for easy access
pub use capabilities::{
    Capabilities, ContractCall, ContractGateway, GatewayError, Receipt, ReceiptOutput,
    ReceiptStatus, StateReader, WalletConnector, WriteOutcome,
};
pub use crate::config::{config, ArunaConfig};
pub use dashboard::{BusinessDashboard, InvestorDashboard, InvoiceRow, PublicGoodsSummary};
pub use flow::{
    classify, classify_message, CloseHandle, ErrorCategory, ExternalSignal, FlowController,
    FlowEvent, FlowFailure, FlowId, FlowSnapshot, FlowStep, Signal, SignalBus, SignalKind,
    SuccessPayload,
};
pub use operations::{InvoiceForm, Operation, OperationKind, PrepareError, PreparedOperation};
pub use reads::{CachedReader, Refresh, RefreshScope};
pub use sandbox::{Sandbox, SandboxFailure};
pub use telemetry::{create_flow_span, generate_correlation_id, init_telemetry};
pub use validation::ValidationError;
