// In-memory stand-in for the deployed contracts.
//
// One `Sandbox` implements the wallet, gateway and reader capabilities over a
// shared ledger so the CLI and integration tests can drive real flows without
// a node. Calls execute when they are written; the receipt becomes available
// after `receipt_delay`.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

use crate::capabilities::{
    Capabilities, ContractCall, ContractGateway, GatewayError, Receipt, ReceiptOutput, ReceiptStatus,
    StateReader, WalletConnector, WriteOutcome,
};
use crate::config::{ContractAddresses, ProtocolConfig};
use crate::protocol::{Address, DistributionBreakdown, Invoice, TokenId, TxHash, Usdc, VaultKind};

const DEFAULT_ACCOUNT: &str = "0x77c4a1cd22005b67eb9cceae7e9577188d7bca82";
const WALLET_REJECTION: &str = "MetaMask Tx Signature: User rejected the request.";
const ARITHMETIC_OVERFLOW: &str = "Panic: arithmetic overflow";

/// How a scripted call should misbehave
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxFailure {
    /// The wallet reports this error instead of signing
    Error(GatewayError),
    /// The wallet returns without a hash or an error
    NoHash,
}

#[derive(Debug, Default)]
struct VaultBook {
    total_assets: Usdc,
    total_shares: Usdc,
    shares: HashMap<Address, Usdc>,
    pending_yield: Usdc,
}

/// `value * numerator / denominator` rounded down, reverting on overflow
fn mul_div(value: Usdc, numerator: Usdc, denominator: Usdc) -> Result<Usdc, String> {
    value
        .units()
        .checked_mul(numerator.units())
        .map(|product| Usdc::from_units(product / denominator.units()))
        .ok_or_else(|| ARITHMETIC_OVERFLOW.to_string())
}

impl VaultBook {
    fn to_assets(&self, shares: Usdc) -> Result<Usdc, String> {
        if self.total_shares.is_zero() {
            return Ok(shares);
        }
        mul_div(shares, self.total_assets, self.total_shares)
    }

    fn to_shares(&self, assets: Usdc) -> Result<Usdc, String> {
        if self.total_shares.is_zero() || self.total_assets.is_zero() {
            return Ok(assets);
        }
        mul_div(assets, self.total_shares, self.total_assets)
    }

    /// Shares to burn for `assets`, rounded up
    fn shares_for_withdraw(&self, assets: Usdc) -> Result<Usdc, String> {
        if self.total_shares.is_zero() || self.total_assets.is_zero() {
            return Ok(assets);
        }
        let numerator = assets
            .units()
            .checked_mul(self.total_shares.units())
            .ok_or_else(|| ARITHMETIC_OVERFLOW.to_string())?;
        Ok(Usdc::from_units(numerator.div_ceil(self.total_assets.units())))
    }

    fn assets_of(&self, account: &Address) -> Result<Usdc, String> {
        self.to_assets(self.shares.get(account).copied().unwrap_or_default())
    }
}

#[derive(Debug, Default)]
struct Ledger {
    connected: Option<Address>,
    home: Option<Address>,
    balances: HashMap<Address, Usdc>,
    allowances: HashMap<(Address, Address), Usdc>,
    invoices: BTreeMap<TokenId, Invoice>,
    reputation: HashMap<Address, u64>,
    vaults: HashMap<VaultKind, VaultBook>,
    claimable: HashMap<Address, Usdc>,
    total_donated: Usdc,
    contributions: HashMap<Address, Usdc>,
    receipts: HashMap<TxHash, Receipt>,
    sequence: u64,
    reject_approvals: bool,
    failures: VecDeque<(&'static str, SandboxFailure)>,
    written: Vec<ContractCall>,
}

impl Ledger {
    fn balance(&self, account: &Address) -> Usdc {
        self.balances.get(account).copied().unwrap_or_default()
    }

    fn credit(&mut self, account: &Address, amount: Usdc) {
        let entry = self.balances.entry(account.clone()).or_default();
        *entry = *entry + amount;
    }

    fn debit(&mut self, account: &Address, amount: Usdc) -> Result<(), String> {
        let balance = self.balance(account);
        let rest = balance
            .checked_sub(amount)
            .ok_or_else(|| "ERC20: transfer amount exceeds balance".to_string())?;
        self.balances.insert(account.clone(), rest);
        Ok(())
    }

    fn spend_allowance(&mut self, owner: &Address, spender: &Address, amount: Usdc) -> Result<(), String> {
        let key = (owner.clone(), spender.clone());
        let allowed = self.allowances.get(&key).copied().unwrap_or_default();
        let rest = allowed
            .checked_sub(amount)
            .ok_or_else(|| "ERC20: insufficient allowance".to_string())?;
        self.allowances.insert(key, rest);
        Ok(())
    }

    fn take_failure(&mut self, function: &str) -> Option<SandboxFailure> {
        let position = self.failures.iter().position(|(f, _)| *f == function)?;
        self.failures.remove(position).map(|(_, failure)| failure)
    }
}

#[derive(Debug, Clone)]
pub struct Sandbox {
    ledger: Arc<Mutex<Ledger>>,
    contracts: ContractAddresses,
    protocol: ProtocolConfig,
    receipt_delay: Duration,
}

impl Sandbox {
    pub fn new(contracts: ContractAddresses, protocol: ProtocolConfig) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(Ledger::default())),
            contracts,
            protocol,
            receipt_delay: Duration::ZERO,
        }
    }

    pub fn default_account() -> Address {
        DEFAULT_ACCOUNT.parse().unwrap_or_else(|_| Address::zero())
    }

    /// Connect the default account and fund it
    pub fn with_funded_account(self, balance: Usdc) -> Self {
        let account = Self::default_account();
        {
            let mut ledger = self.lock();
            ledger.connected = Some(account.clone());
            ledger.home = Some(account.clone());
            ledger.balances.insert(account, balance);
        }
        self
    }

    pub fn with_receipt_delay(mut self, delay: Duration) -> Self {
        self.receipt_delay = delay;
        self
    }

    /// Every approval request is refused in the wallet
    pub fn reject_approvals(&self, reject: bool) {
        self.lock().reject_approvals = reject;
    }

    /// The next write of `function` misbehaves once
    pub fn fail_next(&self, function: &'static str, failure: SandboxFailure) {
        self.lock().failures.push_back((function, failure));
    }

    pub fn set_balance(&self, account: &Address, balance: Usdc) {
        self.lock().balances.insert(account.clone(), balance);
    }

    /// Simulate strategy returns accruing in a vault
    pub fn accrue_yield(&self, vault: VaultKind, amount: Usdc) {
        let mut ledger = self.lock();
        let book = ledger.vaults.entry(vault).or_default();
        book.pending_yield = book.pending_yield + amount;
    }

    /// Insert an invoice directly, e.g. one that is already overdue
    pub fn seed_invoice(&self, invoice: Invoice) {
        self.lock().invoices.insert(invoice.token_id, invoice);
    }

    pub fn next_token_id(&self) -> TokenId {
        self.lock().invoices.keys().next_back().copied().unwrap_or(0) + 1
    }

    /// Calls handed to the wallet so far, rejected ones included
    pub fn written_calls(&self) -> Vec<ContractCall> {
        self.lock().written.clone()
    }

    /// Give the connected account some history: an active and an overdue
    /// invoice, an Aave position with claimable yield, and unharvested
    /// returns in both vaults. The wallet balance is restored afterwards.
    pub async fn seed_demo(&self) -> Result<(), GatewayError> {
        let account = self.account().ok_or(GatewayError::Disconnected)?;
        let starting_balance = self.lock().balance(&account);
        let now = Utc::now().timestamp();
        let day = 86_400;

        self.set_balance(&account, Usdc::from_whole(1_000_000));
        let amount = Usdc::from_whole(5_000);
        self.seed_write(ContractCall::ApproveUsdc {
            spender: self.contracts.aruna_core.clone(),
            amount: amount.percent_bps(self.protocol.collateral_bps),
        })
        .await?;
        self.seed_write(ContractCall::SubmitInvoiceCommitment {
            customer_name: "Acme Corporation".to_string(),
            invoice_amount: amount,
            due_date: now + 30 * day,
        })
        .await?;

        let overdue_amount = Usdc::from_whole(2_000);
        self.seed_invoice(Invoice {
            token_id: self.next_token_id(),
            business: account.clone(),
            customer_name: "Globex Inc".to_string(),
            invoice_amount: overdue_amount,
            due_date: now - 5 * day,
            collateral_amount: overdue_amount.percent_bps(self.protocol.collateral_bps),
            grant_amount: overdue_amount.percent_bps(self.protocol.grant_bps),
            ipfs_hash: String::new(),
            is_settled: false,
            is_liquidated: false,
            created_at: now - 40 * day,
        });

        let deposit = Usdc::from_whole(1_000);
        self.seed_write(ContractCall::ApproveUsdc {
            spender: VaultKind::Aave.address(&self.contracts),
            amount: deposit,
        })
        .await?;
        self.seed_write(ContractCall::VaultDeposit {
            vault: VaultKind::Aave,
            amount: deposit,
            receiver: account.clone(),
        })
        .await?;
        self.accrue_yield(VaultKind::Aave, Usdc::from_whole(40));
        self.seed_write(ContractCall::Harvest { vault: VaultKind::Aave }).await?;

        self.accrue_yield(VaultKind::Aave, Usdc::from_whole(15));
        self.accrue_yield(VaultKind::Morpho, Usdc::from_whole(8));
        self.set_balance(&account, starting_balance);
        self.lock().written.clear();
        debug!(account = %account, "Sandbox seeded with demo state");
        Ok(())
    }

    async fn seed_write(&self, call: ContractCall) -> Result<(), GatewayError> {
        let function = call.function_name();
        let hash = self
            .write(call)
            .await?
            .hash
            .ok_or_else(|| GatewayError::Provider(format!("{function} returned no hash")))?;
        match self.wait_for_receipt(&hash).await?.status {
            ReceiptStatus::Success => Ok(()),
            ReceiptStatus::Reverted { reason } => Err(GatewayError::Reverted { reason }),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::new(
            Arc::new(self.clone()),
            Arc::new(self.clone()),
            Arc::new(self.clone()),
        )
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        // A poisoned ledger only means a test panicked mid-call
        self.ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn execute(&self, ledger: &mut Ledger, sender: &Address, call: &ContractCall) -> Result<ReceiptOutput, String> {
        match call {
            ContractCall::ApproveUsdc { spender, amount } => {
                ledger.allowances.insert((sender.clone(), spender.clone()), *amount);
                Ok(ReceiptOutput::None)
            }
            ContractCall::SubmitInvoiceCommitment {
                customer_name,
                invoice_amount,
                due_date,
            } => {
                let now = Utc::now().timestamp();
                if *due_date <= now {
                    return Err("Due date must be in future".to_string());
                }
                if invoice_amount.is_zero() {
                    return Err("Invoice amount must be greater than 0".to_string());
                }
                let collateral = invoice_amount.percent_bps(self.protocol.collateral_bps);
                let grant = invoice_amount.percent_bps(self.protocol.grant_bps);
                ledger.spend_allowance(sender, &self.contracts.aruna_core, collateral)?;
                ledger.debit(sender, collateral)?;
                ledger.credit(sender, grant);

                let token_id = ledger.invoices.keys().next_back().copied().unwrap_or(0) + 1;
                ledger.invoices.insert(
                    token_id,
                    Invoice {
                        token_id,
                        business: sender.clone(),
                        customer_name: customer_name.clone(),
                        invoice_amount: *invoice_amount,
                        due_date: *due_date,
                        collateral_amount: collateral,
                        grant_amount: grant,
                        ipfs_hash: String::new(),
                        is_settled: false,
                        is_liquidated: false,
                        created_at: now,
                    },
                );
                Ok(ReceiptOutput::TokenId(token_id))
            }
            ContractCall::SettleInvoice { token_id } => {
                let invoice = ledger
                    .invoices
                    .get_mut(token_id)
                    .ok_or_else(|| "Invoice does not exist".to_string())?;
                if &invoice.business != sender {
                    return Err("Not invoice owner".to_string());
                }
                if !invoice.is_open() {
                    return Err("Invoice already settled".to_string());
                }
                invoice.is_settled = true;
                let returned = invoice.collateral_return_preview();
                let business = invoice.business.clone();
                ledger.credit(&business, returned);
                *ledger.reputation.entry(business).or_default() += 1;
                Ok(ReceiptOutput::Amount(returned))
            }
            ContractCall::LiquidateInvoice { token_id } => {
                let now = Utc::now();
                let invoice = ledger
                    .invoices
                    .get_mut(token_id)
                    .ok_or_else(|| "Invoice does not exist".to_string())?;
                if !invoice.is_open() {
                    return Err("Invoice already settled".to_string());
                }
                if !invoice.is_overdue(now) {
                    return Err("Invoice not overdue".to_string());
                }
                invoice.is_liquidated = true;
                let seized = invoice.collateral_amount;
                let business = invoice.business.clone();
                if let Some(score) = ledger.reputation.get_mut(&business) {
                    *score = score.saturating_sub(1);
                }
                Ok(ReceiptOutput::Amount(seized))
            }
            ContractCall::VaultDeposit { vault, amount, receiver } => {
                let spender = vault.address(&self.contracts);
                let minted = ledger.vaults.entry(*vault).or_default().to_shares(*amount)?;
                ledger.spend_allowance(sender, &spender, *amount)?;
                ledger.debit(sender, *amount)?;
                let book = ledger.vaults.entry(*vault).or_default();
                book.total_assets = book.total_assets + *amount;
                book.total_shares = book.total_shares + minted;
                let held = book.shares.entry(receiver.clone()).or_default();
                *held = *held + minted;
                Ok(ReceiptOutput::Shares(minted))
            }
            ContractCall::VaultWithdraw {
                vault,
                amount,
                receiver,
                owner,
            } => {
                let book = ledger.vaults.entry(*vault).or_default();
                if *amount > book.assets_of(owner)? {
                    return Err("ERC4626: withdraw more than max".to_string());
                }
                let burned = book.shares_for_withdraw(*amount)?;
                let held = book.shares.entry(owner.clone()).or_default();
                *held = held.saturating_sub(burned);
                book.total_shares = book.total_shares.saturating_sub(burned);
                book.total_assets = book.total_assets.saturating_sub(*amount);
                ledger.credit(receiver, *amount);
                Ok(ReceiptOutput::Amount(*amount))
            }
            ContractCall::ClaimYield => {
                let amount = ledger.claimable.remove(sender).unwrap_or_default();
                if amount.is_zero() {
                    return Err("No yield to claim".to_string());
                }
                ledger.credit(sender, amount);
                Ok(ReceiptOutput::Amount(amount))
            }
            ContractCall::Harvest { vault } => {
                let book = ledger.vaults.entry(*vault).or_default();
                let harvested = book.pending_yield;
                if harvested.is_zero() {
                    return Err("Nothing to harvest".to_string());
                }
                let split = DistributionBreakdown::split(harvested, &self.protocol);

                let total_shares = book.total_shares;
                let mut credits = Vec::with_capacity(book.shares.len());
                if !total_shares.is_zero() {
                    for (holder, shares) in &book.shares {
                        credits.push((
                            holder.clone(),
                            mul_div(split.investors, *shares, total_shares)?,
                            mul_div(split.public_goods, *shares, total_shares)?,
                        ));
                    }
                }
                book.pending_yield = Usdc::ZERO;

                for (holder, investors, public_goods) in credits {
                    let claim = ledger.claimable.entry(holder.clone()).or_default();
                    *claim = *claim + investors;
                    let given = ledger.contributions.entry(holder).or_default();
                    *given = *given + public_goods;
                }
                ledger.total_donated = ledger.total_donated + split.public_goods;
                Ok(ReceiptOutput::Amount(harvested))
            }
        }
    }
}

#[async_trait]
impl WalletConnector for Sandbox {
    fn account(&self) -> Option<Address> {
        self.lock().connected.clone()
    }

    async fn connect(&self) -> Result<Address, GatewayError> {
        let mut ledger = self.lock();
        let account = ledger.home.clone().unwrap_or_else(Self::default_account);
        ledger.connected = Some(account.clone());
        Ok(account)
    }

    async fn disconnect(&self) {
        self.lock().connected = None;
    }
}

#[async_trait]
impl ContractGateway for Sandbox {
    async fn write(&self, call: ContractCall) -> Result<WriteOutcome, GatewayError> {
        let mut ledger = self.lock();
        let function = call.function_name();
        ledger.written.push(call.clone());

        let sender = ledger.connected.clone().ok_or(GatewayError::Disconnected)?;
        if ledger.reject_approvals && matches!(call, ContractCall::ApproveUsdc { .. }) {
            return Err(GatewayError::Provider(WALLET_REJECTION.to_string()));
        }
        match ledger.take_failure(function) {
            Some(SandboxFailure::Error(err)) => return Err(err),
            Some(SandboxFailure::NoHash) => return Ok(WriteOutcome { hash: None }),
            None => {}
        }

        ledger.sequence += 1;
        let hash = TxHash::from_sequence(ledger.sequence);
        let (status, output) = match self.execute(&mut ledger, &sender, &call) {
            Ok(output) => (ReceiptStatus::Success, output),
            Err(reason) => {
                debug!(function, reason = %reason, "Sandbox call reverted");
                (ReceiptStatus::Reverted { reason: Some(reason) }, ReceiptOutput::None)
            }
        };
        info!(function, tx_hash = %hash, "Sandbox accepted transaction");
        ledger.receipts.insert(
            hash.clone(),
            Receipt {
                hash: hash.clone(),
                status,
                output,
            },
        );
        Ok(WriteOutcome { hash: Some(hash) })
    }

    async fn wait_for_receipt(&self, hash: &TxHash) -> Result<Receipt, GatewayError> {
        if !self.receipt_delay.is_zero() {
            tokio::time::sleep(self.receipt_delay).await;
        }
        self.lock()
            .receipts
            .get(hash)
            .cloned()
            .ok_or_else(|| GatewayError::Provider(format!("transaction {hash} not found")))
    }
}

#[async_trait]
impl StateReader for Sandbox {
    async fn usdc_balance(&self, account: &Address) -> Result<Usdc, GatewayError> {
        Ok(self.lock().balance(account))
    }

    async fn user_invoices(&self, account: &Address) -> Result<Vec<TokenId>, GatewayError> {
        Ok(self
            .lock()
            .invoices
            .values()
            .filter(|inv| &inv.business == account)
            .map(|inv| inv.token_id)
            .collect())
    }

    async fn invoice(&self, token_id: TokenId) -> Result<Option<Invoice>, GatewayError> {
        Ok(self.lock().invoices.get(&token_id).cloned())
    }

    async fn reputation(&self, account: &Address) -> Result<u64, GatewayError> {
        Ok(self.lock().reputation.get(account).copied().unwrap_or(0))
    }

    async fn vault_shares(&self, vault: VaultKind, account: &Address) -> Result<Usdc, GatewayError> {
        Ok(self
            .lock()
            .vaults
            .get(&vault)
            .and_then(|book| book.shares.get(account).copied())
            .unwrap_or_default())
    }

    async fn convert_to_assets(&self, vault: VaultKind, shares: Usdc) -> Result<Usdc, GatewayError> {
        Ok(self
            .lock()
            .vaults
            .get(&vault)
            .map(|book| book.to_assets(shares))
            .unwrap_or(Ok(shares))
            .map_err(|reason| GatewayError::Reverted { reason: Some(reason) })?)
    }

    async fn max_withdraw(&self, vault: VaultKind, account: &Address) -> Result<Usdc, GatewayError> {
        Ok(self
            .lock()
            .vaults
            .get(&vault)
            .map(|book| book.assets_of(account))
            .unwrap_or(Ok(Usdc::ZERO))
            .map_err(|reason| GatewayError::Reverted { reason: Some(reason) })?)
    }

    async fn claimable_yield(&self, account: &Address) -> Result<Usdc, GatewayError> {
        Ok(self.lock().claimable.get(account).copied().unwrap_or_default())
    }

    async fn pending_harvest(&self, vault: VaultKind) -> Result<Usdc, GatewayError> {
        Ok(self
            .lock()
            .vaults
            .get(&vault)
            .map(|book| book.pending_yield)
            .unwrap_or_default())
    }

    async fn total_donated(&self) -> Result<Usdc, GatewayError> {
        Ok(self.lock().total_donated)
    }

    async fn business_contribution(&self, account: &Address) -> Result<Usdc, GatewayError> {
        Ok(self.lock().contributions.get(account).copied().unwrap_or_default())
    }
}
