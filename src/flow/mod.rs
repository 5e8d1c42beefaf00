pub mod bus;
pub mod controller;
pub mod errors;
pub mod state_machine;
pub mod types;

#[cfg(test)]
pub mod mocks;
#[cfg(test)]
mod tests;

pub use bus::{ExternalSignal, Signal, SignalBus, SignalKind};
pub use controller::{CloseHandle, FlowController};
pub use errors::{classify, classify_message, ErrorCategory, FlowFailure};
pub use state_machine::TransactionFlow;
pub use types::{FlowEvent, FlowId, FlowSnapshot, FlowStep, SuccessPayload};
