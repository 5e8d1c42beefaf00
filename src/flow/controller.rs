// Drives one operation at a time through the transaction flow machine.
//
// The controller owns the machine and the signal bus. Every wait on the
// wallet or the chain is raced against the close handle; closing abandons
// observation of whatever is in flight and returns the machine to idle.

use chrono::Utc;
use statig::prelude::*;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

use crate::capabilities::{Capabilities, GatewayError, Receipt, ReceiptStatus};
use crate::config::ArunaConfig;
use crate::flow::bus::{ExternalSignal, Signal, SignalBus, SignalKind};
use crate::flow::errors::{classify, FlowFailure};
use crate::flow::state_machine::TransactionFlow;
use crate::flow::types::{FlowEvent, FlowId, FlowSnapshot, FlowStep};
use crate::operations::{Operation, PrepareError, PreparedOperation};
use crate::protocol::{Address, TxHash};
use crate::reads::{Refresh, RefreshScope};
use crate::telemetry;

const FLOW_SIGNALS: [SignalKind; 4] = [
    SignalKind::ApprovalConfirmed,
    SignalKind::SubmitPending,
    SignalKind::ReceiptConfirmed,
    SignalKind::Failed,
];

type StepObserver = Box<dyn Fn(&FlowSnapshot) + Send + Sync>;

/// Requests that the running flow be closed. Cloneable so it can be handed
/// to whatever presents the flow while `run` holds the controller.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    tx: Arc<watch::Sender<u64>>,
}

impl CloseHandle {
    pub fn close(&self) {
        self.tx.send_modify(|generation| *generation += 1);
    }
}

pub struct FlowController {
    caps: Capabilities,
    config: Arc<ArunaConfig>,
    machine: StateMachine<TransactionFlow>,
    bus: SignalBus,
    refresher: Option<Arc<dyn Refresh>>,
    close_tx: Arc<watch::Sender<u64>>,
    close_rx: watch::Receiver<u64>,
    observer: Option<StepObserver>,
    refresh_task: Option<JoinHandle<()>>,
}

impl FlowController {
    pub fn new(caps: Capabilities, config: Arc<ArunaConfig>) -> Self {
        let (close_tx, close_rx) = watch::channel(0);
        Self {
            caps,
            config,
            machine: TransactionFlow::new().state_machine(),
            bus: SignalBus::new(),
            refresher: None,
            close_tx: Arc::new(close_tx),
            close_rx,
            observer: None,
            refresh_task: None,
        }
    }

    /// Re-read chain state through `refresher` after each success
    pub fn with_refresher(mut self, refresher: Arc<dyn Refresh>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Called with a fresh snapshot whenever the step changes
    pub fn on_step<F>(&mut self, observer: F)
    where
        F: Fn(&FlowSnapshot) + Send + Sync + 'static,
    {
        self.observer = Some(Box::new(observer));
    }

    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle {
            tx: self.close_tx.clone(),
        }
    }

    pub fn snapshot(&self) -> FlowSnapshot {
        self.machine.inner().snapshot()
    }

    pub fn step(&self) -> FlowStep {
        self.machine.inner().step()
    }

    pub fn bus(&self) -> &SignalBus {
        &self.bus
    }

    /// Close the modal: back to idle, and stop listening for the flow
    pub fn close(&mut self) {
        if let Some(flow_id) = self.machine.inner().flow_id() {
            self.bus.unsubscribe_flow(flow_id);
        }
        self.apply(FlowEvent::Close);
    }

    /// Feed a signal from an external source. Signals for flows that are no
    /// longer subscribed are dropped.
    pub fn deliver(&mut self, signal: ExternalSignal) -> FlowStep {
        if let Some(event) = self.bus.route(signal) {
            self.apply(event);
        }
        self.step()
    }

    /// Run an operation from open to a terminal state (or until closed).
    ///
    /// Any previous flow is closed first. The returned snapshot is the state
    /// the modal would show; it is idle when the flow was closed mid-way.
    pub async fn run(&mut self, operation: Operation) -> FlowSnapshot {
        self.close();

        let flow_id = FlowId::new();
        let account = self.caps.account();
        let span = telemetry::create_flow_span(operation.kind(), &flow_id, account.as_ref());

        self.drive(flow_id, operation, account).instrument(span).await;
        self.bus.unsubscribe_flow(flow_id);
        self.snapshot()
    }

    /// Wait for the refresh scheduled by the last successful flow
    pub async fn wait_for_refresh(&mut self) {
        if let Some(task) = self.refresh_task.take() {
            if let Err(e) = task.await {
                warn!("Refresh task failed: {}", e);
            }
        }
    }

    async fn drive(&mut self, flow_id: FlowId, operation: Operation, account: Option<Address>) {
        let kind = operation.kind();
        let Some(account) = account else {
            self.apply(FlowEvent::LocalRejected {
                failure: FlowFailure::wallet_not_connected(),
            });
            return;
        };

        let mut close_rx = self.close_rx.clone();
        close_rx.borrow_and_update();

        let config = self.config.clone();
        let reader = self.caps.reader.clone();
        let prepare = operation.prepare(&account, reader.as_ref(), &config, Utc::now());
        let prepared = match until_closed(&mut close_rx, prepare).await {
            None => return self.abandon(flow_id),
            Some(Ok(prepared)) => prepared,
            Some(Err(PrepareError::Invalid(err))) => {
                self.apply(FlowEvent::LocalRejected { failure: err.into() });
                return;
            }
            Some(Err(PrepareError::Read(err))) => {
                let failure = classify(&err, self.config.flow.error_message_limit);
                self.apply(FlowEvent::LocalRejected { failure });
                return;
            }
        };

        self.bus.subscribe(flow_id, &FLOW_SIGNALS);

        if let Some(approval) = prepared.approval.clone() {
            self.apply(FlowEvent::StartApproval { flow_id, operation: kind });
            let signal = match until_closed(&mut close_rx, self.transact(approval)).await {
                None => return self.abandon(flow_id),
                Some(Ok(receipt)) => Signal::ApprovalConfirmed {
                    hash: Some(receipt.hash),
                },
                Some(Err(failure)) => Signal::Failed { failure },
            };
            self.deliver(ExternalSignal::new(flow_id, signal));

            if !self.machine.inner().should_auto_submit() {
                return;
            }
        }

        self.apply(FlowEvent::StartSubmit { flow_id, operation: kind });
        self.submit(flow_id, &prepared, &mut close_rx).await;
    }

    async fn submit(
        &mut self,
        flow_id: FlowId,
        prepared: &PreparedOperation,
        close_rx: &mut watch::Receiver<u64>,
    ) {
        let hash = match until_closed(close_rx, self.send(prepared.call.clone())).await {
            None => return self.abandon(flow_id),
            Some(Ok(hash)) => hash,
            Some(Err(failure)) => {
                self.deliver(ExternalSignal::new(flow_id, Signal::Failed { failure }));
                return;
            }
        };
        self.deliver(ExternalSignal::new(
            flow_id,
            Signal::SubmitPending { hash: hash.clone() },
        ));

        let signal = match until_closed(close_rx, self.confirm(&hash)).await {
            None => return self.abandon(flow_id),
            Some(Ok(receipt)) => Signal::ReceiptConfirmed {
                payload: prepared.success_payload(&receipt, &self.config),
                hash: receipt.hash,
            },
            Some(Err(failure)) => Signal::Failed { failure },
        };
        self.deliver(ExternalSignal::new(flow_id, signal));

        if self.step() == FlowStep::Success {
            self.schedule_refresh(prepared.kind.refresh_scopes());
        }
    }

    /// Hand a call to the wallet and wait until it is mined
    async fn transact(&self, call: crate::capabilities::ContractCall) -> Result<Receipt, FlowFailure> {
        let hash = self.send(call).await?;
        self.confirm(&hash).await
    }

    async fn send(&self, call: crate::capabilities::ContractCall) -> Result<TxHash, FlowFailure> {
        let function = call.function_name();
        debug!(function, "Requesting wallet signature");
        match self.caps.gateway.write(call).await {
            Ok(outcome) => match outcome.hash {
                Some(hash) => {
                    debug!(function, tx_hash = %hash, "Wallet returned transaction hash");
                    Ok(hash)
                }
                None => {
                    // No hash and no error: the wallet dropped the request
                    warn!(function, "Wallet returned neither hash nor error");
                    Err(FlowFailure::missing_hash())
                }
            },
            Err(err) => Err(self.classify(&err)),
        }
    }

    async fn confirm(&self, hash: &TxHash) -> Result<Receipt, FlowFailure> {
        let timeout = Duration::from_secs(self.config.flow.receipt_timeout_secs);
        let receipt = tokio::time::timeout(timeout, self.caps.gateway.wait_for_receipt(hash))
            .await
            .map_err(|_| self.classify(&GatewayError::Timeout))?
            .map_err(|err| self.classify(&err))?;

        match &receipt.status {
            ReceiptStatus::Success => Ok(receipt),
            ReceiptStatus::Reverted { reason } => Err(self.classify(&GatewayError::Reverted {
                reason: reason.clone(),
            })),
        }
    }

    fn classify(&self, err: &GatewayError) -> FlowFailure {
        classify(err, self.config.flow.error_message_limit)
    }

    fn apply(&mut self, event: FlowEvent) {
        let before = self.step();
        self.machine.handle(&event);
        let after = self.step();
        if before != after {
            debug!(event = event.name(), from = %before, to = %after, "Flow step changed");
            if let Some(observer) = &self.observer {
                observer(&self.machine.inner().snapshot());
            }
        }
    }

    fn abandon(&mut self, flow_id: FlowId) {
        info!(flow_id = %flow_id, from = %self.step(), "Flow closed while in flight; no longer observing it");
        self.bus.unsubscribe_flow(flow_id);
        self.apply(FlowEvent::Close);
    }

    fn schedule_refresh(&mut self, scopes: &'static [RefreshScope]) {
        let Some(refresher) = self.refresher.clone() else {
            return;
        };
        let delay = Duration::from_millis(self.config.flow.refresh_delay_ms);
        debug!(delay_ms = delay.as_millis() as u64, scopes = ?scopes, "Scheduling refresh");
        self.refresh_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            refresher.refresh(scopes).await;
        }));
    }
}

impl std::fmt::Debug for FlowController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowController")
            .field("caps", &self.caps)
            .field("snapshot", &self.snapshot())
            .field("bus", &self.bus)
            .finish()
    }
}

/// `None` when a close was requested before `fut` finished
async fn until_closed<F: Future>(close_rx: &mut watch::Receiver<u64>, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = close_rx.changed() => None,
        out = fut => Some(out),
    }
}
