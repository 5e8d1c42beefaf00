// Mock capabilities for testing - no side effects

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::capabilities::{
    ContractCall, ContractGateway, GatewayError, Receipt, ReceiptOutput, ReceiptStatus, StateReader,
    WalletConnector, WriteOutcome,
};
use crate::protocol::{Address, Invoice, TokenId, TxHash, Usdc, VaultKind};

pub fn test_account() -> Address {
    "0x1111111111111111111111111111111111111111"
        .parse()
        .expect("test account is a valid address")
}

/// Wallet that is either connected to a fixed account or not at all
#[derive(Debug)]
pub struct MockWallet {
    pub account: Mutex<Option<Address>>,
}

impl MockWallet {
    pub fn connected() -> Self {
        Self {
            account: Mutex::new(Some(test_account())),
        }
    }

    pub fn disconnected() -> Self {
        Self {
            account: Mutex::new(None),
        }
    }
}

#[async_trait]
impl WalletConnector for MockWallet {
    fn account(&self) -> Option<Address> {
        self.account.lock().unwrap().clone()
    }

    async fn connect(&self) -> Result<Address, GatewayError> {
        let account = test_account();
        *self.account.lock().unwrap() = Some(account.clone());
        Ok(account)
    }

    async fn disconnect(&self) {
        *self.account.lock().unwrap() = None;
    }
}

/// Gateway that records every call and replays scripted outcomes
#[derive(Debug, Default)]
pub struct MockGateway {
    pub executed_calls: Mutex<Vec<ContractCall>>,
    pub write_script: Mutex<VecDeque<Result<WriteOutcome, GatewayError>>>,
    pub receipt_script: Mutex<VecDeque<Result<ReceiptStatus, GatewayError>>>,
    pub outputs: Mutex<HashMap<&'static str, ReceiptOutput>>,
    pub receipt_delay: Mutex<Option<Duration>>,
    submitted: Mutex<HashMap<TxHash, &'static str>>,
    sequence: Mutex<u64>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next write fails (or returns this outcome) instead of minting a hash
    pub fn push_write(&self, result: Result<WriteOutcome, GatewayError>) {
        self.write_script.lock().unwrap().push_back(result);
    }

    pub fn push_receipt(&self, result: Result<ReceiptStatus, GatewayError>) {
        self.receipt_script.lock().unwrap().push_back(result);
    }

    pub fn set_output(&self, function: &'static str, output: ReceiptOutput) {
        self.outputs.lock().unwrap().insert(function, output);
    }

    pub fn set_receipt_delay(&self, delay: Duration) {
        *self.receipt_delay.lock().unwrap() = Some(delay);
    }

    pub fn get_executed_calls(&self) -> Vec<ContractCall> {
        self.executed_calls.lock().unwrap().clone()
    }

    pub fn executed_functions(&self) -> Vec<&'static str> {
        self.get_executed_calls()
            .iter()
            .map(ContractCall::function_name)
            .collect()
    }
}

#[async_trait]
impl ContractGateway for MockGateway {
    async fn write(&self, call: ContractCall) -> Result<WriteOutcome, GatewayError> {
        let function = call.function_name();
        self.executed_calls.lock().unwrap().push(call);

        if let Some(scripted) = self.write_script.lock().unwrap().pop_front() {
            return scripted;
        }

        let mut sequence = self.sequence.lock().unwrap();
        *sequence += 1;
        let hash = TxHash::from_sequence(*sequence);
        self.submitted.lock().unwrap().insert(hash.clone(), function);
        Ok(WriteOutcome { hash: Some(hash) })
    }

    async fn wait_for_receipt(&self, hash: &TxHash) -> Result<Receipt, GatewayError> {
        let delay = *self.receipt_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let status = match self.receipt_script.lock().unwrap().pop_front() {
            Some(scripted) => scripted?,
            None => ReceiptStatus::Success,
        };
        let function = self.submitted.lock().unwrap().get(hash).copied();
        let output = function
            .and_then(|f| self.outputs.lock().unwrap().get(f).cloned())
            .unwrap_or(ReceiptOutput::None);

        Ok(Receipt {
            hash: hash.clone(),
            status,
            output,
        })
    }
}

/// Reader serving fixed values
#[derive(Debug, Default)]
pub struct MockReader {
    pub balance: Mutex<Usdc>,
    pub invoices: Mutex<HashMap<TokenId, Invoice>>,
    pub positions: Mutex<HashMap<VaultKind, (Usdc, Usdc)>>,
    pub claimable: Mutex<Usdc>,
    pub pending_harvest: Mutex<HashMap<VaultKind, Usdc>>,
    pub reads: Mutex<u32>,
}

impl MockReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(self, balance: Usdc) -> Self {
        *self.balance.lock().unwrap() = balance;
        self
    }

    pub fn with_invoice(self, invoice: Invoice) -> Self {
        self.invoices.lock().unwrap().insert(invoice.token_id, invoice);
        self
    }

    /// Position with 1:1 shares to assets
    pub fn with_position(self, vault: VaultKind, assets: Usdc, max_withdraw: Usdc) -> Self {
        self.positions.lock().unwrap().insert(vault, (assets, max_withdraw));
        self
    }

    pub fn with_claimable(self, amount: Usdc) -> Self {
        *self.claimable.lock().unwrap() = amount;
        self
    }

    pub fn with_pending_harvest(self, vault: VaultKind, amount: Usdc) -> Self {
        self.pending_harvest.lock().unwrap().insert(vault, amount);
        self
    }

    pub fn read_count(&self) -> u32 {
        *self.reads.lock().unwrap()
    }

    fn record(&self) {
        *self.reads.lock().unwrap() += 1;
    }
}

#[async_trait]
impl StateReader for MockReader {
    async fn usdc_balance(&self, _account: &Address) -> Result<Usdc, GatewayError> {
        self.record();
        Ok(*self.balance.lock().unwrap())
    }

    async fn user_invoices(&self, account: &Address) -> Result<Vec<TokenId>, GatewayError> {
        self.record();
        let mut ids: Vec<TokenId> = self
            .invoices
            .lock()
            .unwrap()
            .values()
            .filter(|inv| &inv.business == account)
            .map(|inv| inv.token_id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn invoice(&self, token_id: TokenId) -> Result<Option<Invoice>, GatewayError> {
        self.record();
        Ok(self.invoices.lock().unwrap().get(&token_id).cloned())
    }

    async fn reputation(&self, _account: &Address) -> Result<u64, GatewayError> {
        self.record();
        Ok(0)
    }

    async fn vault_shares(&self, vault: VaultKind, _account: &Address) -> Result<Usdc, GatewayError> {
        self.record();
        Ok(self
            .positions
            .lock()
            .unwrap()
            .get(&vault)
            .map(|(assets, _)| *assets)
            .unwrap_or(Usdc::ZERO))
    }

    async fn convert_to_assets(&self, _vault: VaultKind, shares: Usdc) -> Result<Usdc, GatewayError> {
        self.record();
        Ok(shares)
    }

    async fn max_withdraw(&self, vault: VaultKind, _account: &Address) -> Result<Usdc, GatewayError> {
        self.record();
        Ok(self
            .positions
            .lock()
            .unwrap()
            .get(&vault)
            .map(|(_, max)| *max)
            .unwrap_or(Usdc::ZERO))
    }

    async fn claimable_yield(&self, _account: &Address) -> Result<Usdc, GatewayError> {
        self.record();
        Ok(*self.claimable.lock().unwrap())
    }

    async fn pending_harvest(&self, vault: VaultKind) -> Result<Usdc, GatewayError> {
        self.record();
        Ok(self
            .pending_harvest
            .lock()
            .unwrap()
            .get(&vault)
            .copied()
            .unwrap_or(Usdc::ZERO))
    }

    async fn total_donated(&self) -> Result<Usdc, GatewayError> {
        self.record();
        Ok(Usdc::ZERO)
    }

    async fn business_contribution(&self, _account: &Address) -> Result<Usdc, GatewayError> {
        self.record();
        Ok(Usdc::ZERO)
    }
}
