// Subscription registry for external signals.
//
// Every flow subscribes to the signal kinds it expects under its own flow id.
// Signals are only turned into state machine events while the matching
// subscription is alive, so anything arriving for a closed or superseded
// flow is dropped here instead of reaching the machine.

use std::collections::HashSet;

use crate::flow::errors::FlowFailure;
use crate::flow::types::{FlowEvent, FlowId, SuccessPayload};
use crate::protocol::TxHash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    ApprovalConfirmed,
    SubmitPending,
    ReceiptConfirmed,
    Failed,
}

/// Something the wallet or gateway reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    ApprovalConfirmed { hash: Option<TxHash> },
    SubmitPending { hash: TxHash },
    ReceiptConfirmed { hash: TxHash, payload: SuccessPayload },
    Failed { failure: FlowFailure },
}

impl Signal {
    pub fn kind(&self) -> SignalKind {
        match self {
            Signal::ApprovalConfirmed { .. } => SignalKind::ApprovalConfirmed,
            Signal::SubmitPending { .. } => SignalKind::SubmitPending,
            Signal::ReceiptConfirmed { .. } => SignalKind::ReceiptConfirmed,
            Signal::Failed { .. } => SignalKind::Failed,
        }
    }

    fn into_event(self) -> FlowEvent {
        match self {
            Signal::ApprovalConfirmed { hash } => FlowEvent::ApprovalConfirmed { hash },
            Signal::SubmitPending { hash } => FlowEvent::SubmitPending { hash },
            Signal::ReceiptConfirmed { hash, payload } => FlowEvent::ReceiptConfirmed { hash, payload },
            Signal::Failed { failure } => FlowEvent::Failed { failure },
        }
    }
}

/// A signal addressed to a particular flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalSignal {
    pub flow_id: FlowId,
    pub signal: Signal,
}

impl ExternalSignal {
    pub fn new(flow_id: FlowId, signal: Signal) -> Self {
        Self { flow_id, signal }
    }
}

#[derive(Debug, Default)]
pub struct SignalBus {
    subscriptions: HashSet<(FlowId, SignalKind)>,
    dropped: u64,
}

impl SignalBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, flow_id: FlowId, kinds: &[SignalKind]) {
        for kind in kinds {
            self.subscriptions.insert((flow_id, *kind));
        }
    }

    pub fn unsubscribe(&mut self, flow_id: FlowId, kind: SignalKind) -> bool {
        self.subscriptions.remove(&(flow_id, kind))
    }

    /// Drop every subscription of a flow; returns how many were removed
    pub fn unsubscribe_flow(&mut self, flow_id: FlowId) -> usize {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|(id, _)| *id != flow_id);
        before - self.subscriptions.len()
    }

    pub fn is_subscribed(&self, flow_id: FlowId, kind: SignalKind) -> bool {
        self.subscriptions.contains(&(flow_id, kind))
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Signals discarded because nobody was subscribed
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Turn a signal into an event if its flow is still listening for it.
    /// Approval confirmations are one-shot: the subscription is consumed.
    pub fn route(&mut self, incoming: ExternalSignal) -> Option<FlowEvent> {
        let kind = incoming.signal.kind();
        if !self.is_subscribed(incoming.flow_id, kind) {
            self.dropped += 1;
            tracing::debug!(
                flow_id = %incoming.flow_id,
                signal = ?kind,
                "Dropping signal for inactive subscription"
            );
            return None;
        }
        if kind == SignalKind::ApprovalConfirmed {
            self.unsubscribe(incoming.flow_id, kind);
        }
        Some(incoming.signal.into_event())
    }
}
