use statig::prelude::*;

use crate::flow::errors::FlowFailure;
use crate::flow::types::{FlowEvent, FlowId, FlowSnapshot, FlowStep, SuccessPayload};
use crate::operations::OperationKind;
use crate::protocol::TxHash;

/// Per-flow state for an approve-then-act transaction.
///
/// `approval_completed` and `submit_triggered` are one-shot guards: each is
/// set at most once per flow and both are cleared on error or close, so a
/// duplicated approval confirmation can never cause a second submission.
#[derive(Debug, Default)]
pub struct TransactionFlow {
    flow_id: Option<FlowId>,
    operation: Option<OperationKind>,
    step: FlowStep,
    approval_hash: Option<TxHash>,
    tx_hash: Option<TxHash>,
    error: Option<FlowFailure>,
    payload: Option<SuccessPayload>,
    approval_completed: bool,
    submit_triggered: bool,
}

impl TransactionFlow {
    pub fn new() -> Self {
        Self::default()
    }

    fn begin(&mut self, flow_id: FlowId, operation: OperationKind) {
        self.clear();
        self.flow_id = Some(flow_id);
        self.operation = Some(operation);
    }

    fn clear(&mut self) {
        self.flow_id = None;
        self.operation = None;
        self.step = FlowStep::Idle;
        self.approval_hash = None;
        self.tx_hash = None;
        self.error = None;
        self.payload = None;
        self.approval_completed = false;
        self.submit_triggered = false;
    }

    fn fail(&mut self, failure: &FlowFailure) -> Outcome<State> {
        tracing::warn!(
            flow_id = ?self.flow_id,
            operation = ?self.operation,
            from = %self.step,
            category = ?failure.category,
            "Flow failed: {}",
            failure.message
        );
        self.step = FlowStep::Error;
        self.error = Some(failure.clone());
        self.approval_completed = false;
        self.submit_triggered = false;
        Transition(State::error())
    }

    fn close(&mut self) -> Outcome<State> {
        tracing::debug!(flow_id = ?self.flow_id, from = %self.step, "Flow closed");
        self.clear();
        Transition(State::idle())
    }
}

#[state_machine(initial = "State::idle()")]
impl TransactionFlow {
    #[state]
    fn idle(&mut self, event: &FlowEvent) -> Outcome<State> {
        match event {
            FlowEvent::StartApproval { flow_id, operation } => {
                self.begin(*flow_id, *operation);
                self.step = FlowStep::Approving;
                tracing::info!(flow_id = %flow_id, operation = ?operation, "Approval requested");
                Transition(State::approving())
            }
            FlowEvent::StartSubmit { flow_id, operation } => {
                // Single-phase operations skip the approval leg
                self.begin(*flow_id, *operation);
                self.submit_triggered = true;
                self.step = FlowStep::Confirming;
                tracing::info!(flow_id = %flow_id, operation = ?operation, "Submission requested");
                Transition(State::confirming())
            }
            FlowEvent::LocalRejected { failure } => self.fail(failure),
            FlowEvent::Close => {
                self.clear();
                Handled
            }
            _ => {
                tracing::debug!(event = event.name(), "Ignoring event while idle");
                Handled
            }
        }
    }

    #[state]
    fn approving(&mut self, event: &FlowEvent) -> Outcome<State> {
        match event {
            FlowEvent::ApprovalConfirmed { hash } => {
                if self.approval_completed {
                    return Handled;
                }
                self.approval_completed = true;
                self.approval_hash = hash.clone();
                self.step = FlowStep::Confirming;
                tracing::info!(
                    flow_id = ?self.flow_id,
                    approval_hash = ?hash,
                    "Approval confirmed"
                );
                Transition(State::confirming())
            }
            FlowEvent::Failed { failure } => self.fail(failure),
            FlowEvent::Close => self.close(),
            _ => Handled,
        }
    }

    #[state]
    fn confirming(&mut self, event: &FlowEvent) -> Outcome<State> {
        match event {
            FlowEvent::StartSubmit { flow_id, .. } => {
                if Some(*flow_id) != self.flow_id || self.submit_triggered || !self.approval_completed {
                    tracing::debug!(flow_id = %flow_id, "Duplicate submission ignored");
                    return Handled;
                }
                self.submit_triggered = true;
                self.step = FlowStep::Confirming;
                tracing::info!(flow_id = %flow_id, "Submitting dependent transaction");
                Handled
            }
            FlowEvent::SubmitPending { hash } => {
                if !self.submit_triggered {
                    return Handled;
                }
                self.tx_hash = Some(hash.clone());
                self.step = FlowStep::Pending;
                tracing::info!(flow_id = ?self.flow_id, tx_hash = %hash, "Transaction pending");
                Transition(State::pending())
            }
            FlowEvent::ApprovalConfirmed { .. } => {
                tracing::debug!(flow_id = ?self.flow_id, "Approval already confirmed");
                Handled
            }
            FlowEvent::Failed { failure } => self.fail(failure),
            FlowEvent::Close => self.close(),
            _ => Handled,
        }
    }

    #[state]
    fn pending(&mut self, event: &FlowEvent) -> Outcome<State> {
        match event {
            FlowEvent::ReceiptConfirmed { hash, payload } => {
                self.tx_hash = Some(hash.clone());
                self.payload = Some(payload.clone());
                self.step = FlowStep::Success;
                self.approval_completed = false;
                self.submit_triggered = false;
                tracing::info!(
                    flow_id = ?self.flow_id,
                    operation = ?self.operation,
                    tx_hash = %hash,
                    "Transaction confirmed"
                );
                Transition(State::success())
            }
            FlowEvent::Failed { failure } => self.fail(failure),
            FlowEvent::Close => self.close(),
            _ => Handled,
        }
    }

    #[state]
    fn success(&mut self, event: &FlowEvent) -> Outcome<State> {
        match event {
            FlowEvent::Close => self.close(),
            _ => Handled,
        }
    }

    #[state]
    fn error(&mut self, event: &FlowEvent) -> Outcome<State> {
        match event {
            FlowEvent::Close => self.close(),
            _ => Handled,
        }
    }
}

impl TransactionFlow {
    pub fn step(&self) -> FlowStep {
        self.step
    }

    pub fn flow_id(&self) -> Option<FlowId> {
        self.flow_id
    }

    pub fn approval_completed(&self) -> bool {
        self.approval_completed
    }

    pub fn submit_triggered(&self) -> bool {
        self.submit_triggered
    }

    /// True exactly once per flow: approval is in and nothing was submitted yet
    pub fn should_auto_submit(&self) -> bool {
        self.step == FlowStep::Confirming && self.approval_completed && !self.submit_triggered
    }

    pub fn snapshot(&self) -> FlowSnapshot {
        FlowSnapshot {
            flow_id: self.flow_id,
            operation: self.operation,
            step: self.step,
            approval_hash: self.approval_hash.clone(),
            tx_hash: self.tx_hash.clone(),
            error: self.error.clone(),
            payload: self.payload.clone(),
            approval_completed: self.approval_completed,
        }
    }
}
