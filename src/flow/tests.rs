use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;

use crate::capabilities::{Capabilities, ContractCall, GatewayError, ReceiptOutput, ReceiptStatus, WriteOutcome};
use crate::config::ArunaConfig;
use crate::flow::bus::{ExternalSignal, Signal};
use crate::flow::controller::FlowController;
use crate::flow::errors::{ErrorCategory, USER_REJECTED_MESSAGE, WALLET_NOT_CONNECTED_MESSAGE};
use crate::flow::mocks::{MockGateway, MockReader, MockWallet};
use crate::flow::types::{FlowSnapshot, FlowStep, SuccessPayload};
use crate::operations::{InvoiceForm, Operation};
use crate::protocol::{TxHash, Usdc, VaultKind};
use crate::reads::{MockRefresh, RefreshScope};

struct Harness {
    controller: FlowController,
    gateway: Arc<MockGateway>,
    reader: Arc<MockReader>,
    seen: Arc<Mutex<Vec<FlowSnapshot>>>,
}

impl Harness {
    fn new(wallet: MockWallet, reader: MockReader) -> Self {
        Self::with_config(wallet, reader, ArunaConfig::default())
    }

    fn with_config(wallet: MockWallet, reader: MockReader, config: ArunaConfig) -> Self {
        let gateway = Arc::new(MockGateway::new());
        let reader = Arc::new(reader);
        let caps = Capabilities::new(Arc::new(wallet), gateway.clone(), reader.clone());
        let mut controller = FlowController::new(caps, Arc::new(config));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        controller.on_step(move |snapshot| sink.lock().unwrap().push(snapshot.clone()));

        Self {
            controller,
            gateway,
            reader,
            seen,
        }
    }

    fn with_refresher(self, refresher: MockRefresh) -> Self {
        Self {
            controller: self.controller.with_refresher(Arc::new(refresher)),
            ..self
        }
    }

    fn steps(&self) -> Vec<FlowStep> {
        self.seen.lock().unwrap().iter().map(|s| s.step).collect()
    }
}

fn invoice(amount: &str, due_in_days: i64) -> Operation {
    let due = Utc::now() + chrono::Duration::days(due_in_days);
    Operation::SubmitInvoice(InvoiceForm {
        customer_name: "Acme Corporation".to_string(),
        amount: amount.to_string(),
        due_date: due.format("%Y-%m-%d").to_string(),
        description: Some("March consulting".to_string()),
    })
}

fn funded() -> MockReader {
    MockReader::new().with_balance(Usdc::from_whole(50))
}

#[tokio::test]
async fn test_invoice_approve_then_auto_submit() {
    let mut h = Harness::new(MockWallet::connected(), funded());
    h.gateway.set_output("submitInvoiceCommitment", ReceiptOutput::TokenId(1));

    let snapshot = h.controller.run(invoice("100", 1)).await;

    assert_eq!(snapshot.step, FlowStep::Success);
    let calls = h.gateway.get_executed_calls();
    assert_eq!(calls.len(), 2);
    match &calls[0] {
        ContractCall::ApproveUsdc { spender, amount } => {
            assert_eq!(amount.to_string(), "10");
            assert_eq!(spender, &ArunaConfig::default().contracts.aruna_core);
        }
        other => panic!("expected approval first, got {other:?}"),
    }
    match &calls[1] {
        ContractCall::SubmitInvoiceCommitment { invoice_amount, .. } => {
            assert_eq!(invoice_amount.to_string(), "100")
        }
        other => panic!("expected submission second, got {other:?}"),
    }

    match snapshot.payload {
        Some(SuccessPayload::InvoiceSubmitted { grant, collateral, token_id, .. }) => {
            assert_eq!(grant.to_fixed(2), "3.00");
            assert_eq!(collateral.to_fixed(2), "10.00");
            assert_eq!(token_id, Some(1));
        }
        other => panic!("unexpected payload {other:?}"),
    }
    assert_eq!(snapshot.approval_hash, Some(TxHash::from_sequence(1)));
    assert_eq!(snapshot.tx_hash, Some(TxHash::from_sequence(2)));
    assert_eq!(
        h.steps(),
        vec![FlowStep::Approving, FlowStep::Confirming, FlowStep::Pending, FlowStep::Success]
    );
}

#[tokio::test]
async fn test_wallet_not_connected_makes_no_calls() {
    let mut h = Harness::new(MockWallet::disconnected(), funded());

    let snapshot = h.controller.run(invoice("100", 1)).await;

    assert_eq!(snapshot.step, FlowStep::Error);
    assert_eq!(snapshot.error_message(), Some(WALLET_NOT_CONNECTED_MESSAGE));
    assert!(h.gateway.get_executed_calls().is_empty());
    assert_eq!(h.reader.read_count(), 0);
    assert_eq!(h.steps(), vec![FlowStep::Error]);
}

#[tokio::test]
async fn test_rejected_approval_then_retry() {
    let mut h = Harness::new(MockWallet::connected(), funded());
    h.gateway.push_write(Err(GatewayError::Provider(
        "MetaMask Tx Signature: User rejected the request.".to_string(),
    )));

    let failed = h.controller.run(invoice("100", 1)).await;
    assert_eq!(failed.step, FlowStep::Error);
    assert_eq!(failed.error_message(), Some(USER_REJECTED_MESSAGE));
    assert!(!failed.approval_completed);
    assert_eq!(h.gateway.executed_functions(), vec!["approve"]);

    let retried = h.controller.run(invoice("100", 1)).await;
    assert_eq!(retried.step, FlowStep::Success);
    assert_eq!(
        h.gateway.executed_functions(),
        vec!["approve", "approve", "submitInvoiceCommitment"]
    );
}

#[tokio::test]
async fn test_non_positive_amounts_never_reach_approving() {
    for amount in ["0", "-5", "0.000000", ""] {
        let mut h = Harness::new(MockWallet::connected(), funded());
        let snapshot = h.controller.run(invoice(amount, 1)).await;

        assert_eq!(snapshot.step, FlowStep::Error, "amount {amount:?}");
        assert_eq!(snapshot.error.as_ref().map(|e| &e.category), Some(&ErrorCategory::Validation));
        assert!(!h.steps().contains(&FlowStep::Approving));
        assert!(h.gateway.get_executed_calls().is_empty());
    }
}

#[tokio::test]
async fn test_due_date_must_be_in_the_future() {
    for days in [0, -3] {
        let mut h = Harness::new(MockWallet::connected(), funded());
        let snapshot = h.controller.run(invoice("100", days)).await;

        assert_eq!(snapshot.error_message(), Some("Due date must be in the future"));
        assert!(h.gateway.get_executed_calls().is_empty());
        assert_eq!(h.reader.read_count(), 0);
    }
}

#[tokio::test]
async fn test_missing_hash_reads_as_rejection() {
    let mut h = Harness::new(MockWallet::connected(), funded());
    h.gateway.push_write(Ok(WriteOutcome { hash: None }));

    let snapshot = h.controller.run(invoice("100", 1)).await;

    assert_eq!(snapshot.error_message(), Some(USER_REJECTED_MESSAGE));
    assert_eq!(snapshot.error.unwrap().category, ErrorCategory::UserRejected);
}

#[tokio::test]
async fn test_reverted_receipt_reports_reason() {
    let mut h = Harness::new(
        MockWallet::connected(),
        MockReader::new().with_claimable(Usdc::from_whole(4)),
    );
    h.gateway.push_receipt(Ok(ReceiptStatus::Reverted {
        reason: Some("Nothing to claim".to_string()),
    }));

    let snapshot = h.controller.run(Operation::ClaimYield).await;

    assert_eq!(snapshot.step, FlowStep::Error);
    assert_eq!(snapshot.error_message(), Some("Transaction failed: Nothing to claim"));
    assert_eq!(snapshot.tx_hash, Some(TxHash::from_sequence(1)));
}

#[tokio::test]
async fn test_single_phase_operation_skips_approval() {
    let mut h = Harness::new(
        MockWallet::connected(),
        MockReader::new().with_claimable(Usdc::from_whole(4)),
    );
    h.gateway.set_output("claimYield", ReceiptOutput::Amount(Usdc::from_units(4_250_000)));

    let snapshot = h.controller.run(Operation::ClaimYield).await;

    assert_eq!(h.steps(), vec![FlowStep::Confirming, FlowStep::Pending, FlowStep::Success]);
    assert_eq!(
        snapshot.payload,
        Some(SuccessPayload::YieldClaimed { amount: Usdc::from_units(4_250_000) })
    );
    assert_eq!(snapshot.approval_hash, None);
}

#[tokio::test(start_paused = true)]
async fn test_receipt_wait_times_out() {
    let mut h = Harness::new(MockWallet::connected(), funded());
    h.gateway.set_receipt_delay(Duration::from_secs(600));

    let snapshot = h
        .controller
        .run(Operation::VaultDeposit { vault: VaultKind::Aave, amount: "20".into() })
        .await;

    assert_eq!(snapshot.step, FlowStep::Error);
    assert_eq!(snapshot.error.unwrap().category, ErrorCategory::Timeout);
    assert_eq!(h.gateway.executed_functions(), vec!["approve"]);
}

#[tokio::test(start_paused = true)]
async fn test_close_mid_flight_returns_to_idle_and_drops_late_signals() {
    let mut h = Harness::new(MockWallet::connected(), funded());
    h.gateway.set_receipt_delay(Duration::from_secs(30));

    let close = h.controller.close_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        close.close();
    });

    let snapshot = h.controller.run(invoice("100", 1)).await;
    assert_eq!(snapshot.step, FlowStep::Idle);
    assert_eq!(snapshot.flow_id, None);
    assert_eq!(h.gateway.executed_functions(), vec!["approve"]);

    // The approval lands after the modal was closed
    let abandoned = h.seen.lock().unwrap()[0].flow_id.expect("approving snapshot has an id");
    let step = h.controller.deliver(ExternalSignal::new(
        abandoned,
        Signal::ApprovalConfirmed { hash: Some(TxHash::from_sequence(1)) },
    ));
    assert_eq!(step, FlowStep::Idle);
    assert_eq!(h.controller.bus().dropped(), 1);
    assert_eq!(h.controller.bus().subscription_count(), 0);
}

#[tokio::test]
async fn test_signals_after_completion_are_ignored() {
    let mut h = Harness::new(MockWallet::connected(), funded());
    let snapshot = h.controller.run(invoice("100", 1)).await;
    let flow_id = snapshot.flow_id.unwrap();

    let step = h.controller.deliver(ExternalSignal::new(
        flow_id,
        Signal::ApprovalConfirmed { hash: None },
    ));
    assert_eq!(step, FlowStep::Success);
    assert_eq!(h.gateway.get_executed_calls().len(), 2);

    h.controller.close();
    assert_eq!(h.controller.step(), FlowStep::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_success_schedules_one_delayed_refresh() {
    let fired_at = Arc::new(Mutex::new(Vec::new()));
    let record = fired_at.clone();

    let mut refresher = MockRefresh::new();
    refresher
        .expect_refresh()
        .withf(|scopes| scopes.contains(&RefreshScope::Invoices))
        .times(1)
        .returning(move |_| record.lock().unwrap().push(tokio::time::Instant::now()));

    let mut h = Harness::new(MockWallet::connected(), funded()).with_refresher(refresher);

    let snapshot = h.controller.run(invoice("100", 1)).await;
    assert!(snapshot.is_success());
    let finished = tokio::time::Instant::now();

    h.controller.wait_for_refresh().await;
    let fired = fired_at.lock().unwrap().clone();
    assert_eq!(fired.len(), 1);
    assert!(fired[0].duration_since(finished) >= Duration::from_millis(2_000));
}

#[tokio::test]
async fn test_failed_flow_schedules_no_refresh() {
    let mut refresher = MockRefresh::new();
    refresher.expect_refresh().times(0);

    let mut h = Harness::new(MockWallet::connected(), funded()).with_refresher(refresher);
    h.gateway.push_write(Err(GatewayError::UserRejected));

    let snapshot = h.controller.run(invoice("100", 1)).await;
    assert_eq!(snapshot.step, FlowStep::Error);
    h.controller.wait_for_refresh().await;
}

#[tokio::test]
async fn test_configured_minimum_deposit_is_enforced() {
    let mut config = ArunaConfig::default();
    config.vaults.min_deposit = Usdc::from_whole(100);
    let mut h = Harness::with_config(MockWallet::connected(), funded(), config);

    let snapshot = h
        .controller
        .run(Operation::VaultDeposit { vault: VaultKind::Morpho, amount: "50".into() })
        .await;

    assert_eq!(snapshot.error_message(), Some("Minimum deposit is 100 USDC"));
    assert!(h.gateway.get_executed_calls().is_empty());
}
