// Core types for the transaction flow state machine

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::flow::errors::FlowFailure;
use crate::operations::OperationKind;
use crate::protocol::{DistributionBreakdown, TokenId, TxHash, Usdc, VaultKind};

/// Identity of one user-initiated flow; a new id is minted every time the
/// modal opens so signals from an earlier flow can be told apart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowId(Uuid);

impl FlowId {
    pub fn new() -> Self {
        FlowId(Uuid::new_v4())
    }
}

impl Default for FlowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Presentation states of the transaction modal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowStep {
    #[default]
    Idle,
    Approving,
    Confirming,
    Pending,
    Success,
    Error,
}

impl FlowStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowStep::Idle => "idle",
            FlowStep::Approving => "approving",
            FlowStep::Confirming => "confirming",
            FlowStep::Pending => "pending",
            FlowStep::Success => "success",
            FlowStep::Error => "error",
        }
    }

    /// Modal subtitle for the step
    pub fn headline(&self) -> &'static str {
        match self {
            FlowStep::Idle => "",
            FlowStep::Approving => "Waiting for your approval",
            FlowStep::Confirming => "Confirming transaction",
            FlowStep::Pending => "Processing transaction",
            FlowStep::Success => "Transaction successful",
            FlowStep::Error => "Transaction failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowStep::Success | FlowStep::Error)
    }
}

impl fmt::Display for FlowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation-specific details shown once a flow succeeds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SuccessPayload {
    InvoiceSubmitted {
        customer_name: String,
        invoice_amount: Usdc,
        grant: Usdc,
        collateral: Usdc,
        token_id: Option<TokenId>,
    },
    Deposited {
        vault: VaultKind,
        amount: Usdc,
        shares_received: Option<Usdc>,
        apy: String,
        estimated_annual_yield: Usdc,
    },
    Withdrawn {
        vault: VaultKind,
        amount: Usdc,
    },
    Settled {
        token_id: TokenId,
        collateral_returned: Usdc,
    },
    Liquidated {
        token_id: TokenId,
        collateral_seized: Usdc,
    },
    YieldClaimed {
        amount: Usdc,
    },
    Harvested {
        vault: VaultKind,
        breakdown: DistributionBreakdown,
    },
}

/// Events that drive the state machine. External signals are translated into
/// these by the controller; user actions map onto them directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    /// Open the modal and ask the wallet for the token approval
    StartApproval {
        flow_id: FlowId,
        operation: OperationKind,
    },
    /// The approval transaction was mined
    ApprovalConfirmed { hash: Option<TxHash> },
    /// Hand the dependent call to the wallet
    StartSubmit {
        flow_id: FlowId,
        operation: OperationKind,
    },
    /// The wallet returned a hash for the dependent call
    SubmitPending { hash: TxHash },
    /// The dependent call was mined
    ReceiptConfirmed {
        hash: TxHash,
        payload: SuccessPayload,
    },
    /// Anything the wallet or gateway reported as a failure
    Failed { failure: FlowFailure },
    /// A local precondition failed before any external call
    LocalRejected { failure: FlowFailure },
    /// Modal closed
    Close,
}

impl FlowEvent {
    pub fn name(&self) -> &'static str {
        match self {
            FlowEvent::StartApproval { .. } => "start_approval",
            FlowEvent::ApprovalConfirmed { .. } => "approval_confirmed",
            FlowEvent::StartSubmit { .. } => "start_submit",
            FlowEvent::SubmitPending { .. } => "submit_pending",
            FlowEvent::ReceiptConfirmed { .. } => "receipt_confirmed",
            FlowEvent::Failed { .. } => "failed",
            FlowEvent::LocalRejected { .. } => "local_rejected",
            FlowEvent::Close => "close",
        }
    }
}

/// Read-only view of a flow for presentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowSnapshot {
    pub flow_id: Option<FlowId>,
    pub operation: Option<OperationKind>,
    pub step: FlowStep,
    pub approval_hash: Option<TxHash>,
    pub tx_hash: Option<TxHash>,
    pub error: Option<FlowFailure>,
    pub payload: Option<SuccessPayload>,
    pub approval_completed: bool,
}

impl FlowSnapshot {
    pub fn is_success(&self) -> bool {
        self.step == FlowStep::Success
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }
}
