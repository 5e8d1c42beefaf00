// Capability traits the flow controller is handed explicitly: wallet access,
// contract writes and contract reads. Nothing in the crate looks these up
// from ambient state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::protocol::{Address, Invoice, TokenId, TxHash, Usdc, VaultKind};

/// Errors reported by a wallet, gateway or reader.
///
/// Gateways that surface typed failures should use the structured variants;
/// `Provider` carries free text from providers that only return a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("User rejected the request")]
    UserRejected,
    #[error("insufficient funds for gas")]
    InsufficientFunds,
    #[error("transfer amount exceeds balance")]
    InsufficientBalance,
    #[error("nonce conflict")]
    NonceConflict,
    #[error("gas required exceeds allowance")]
    GasExceeded,
    #[error("execution reverted: {}", .reason.as_deref().unwrap_or("<no reason>"))]
    Reverted { reason: Option<String> },
    #[error("wallet disconnected")]
    Disconnected,
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("{0}")]
    Provider(String),
}

/// A state-changing contract call, described by intent rather than ABI bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractCall {
    ApproveUsdc {
        spender: Address,
        amount: Usdc,
    },
    SubmitInvoiceCommitment {
        customer_name: String,
        invoice_amount: Usdc,
        due_date: i64,
    },
    SettleInvoice {
        token_id: TokenId,
    },
    LiquidateInvoice {
        token_id: TokenId,
    },
    VaultDeposit {
        vault: VaultKind,
        amount: Usdc,
        receiver: Address,
    },
    VaultWithdraw {
        vault: VaultKind,
        amount: Usdc,
        receiver: Address,
        owner: Address,
    },
    ClaimYield,
    Harvest {
        vault: VaultKind,
    },
}

impl ContractCall {
    pub fn function_name(&self) -> &'static str {
        match self {
            ContractCall::ApproveUsdc { .. } => "approve",
            ContractCall::SubmitInvoiceCommitment { .. } => "submitInvoiceCommitment",
            ContractCall::SettleInvoice { .. } => "settleInvoice",
            ContractCall::LiquidateInvoice { .. } => "liquidateInvoice",
            ContractCall::VaultDeposit { .. } => "deposit",
            ContractCall::VaultWithdraw { .. } => "withdraw",
            ContractCall::ClaimYield => "claimYield",
            ContractCall::Harvest { .. } => "harvest",
        }
    }
}

/// Result of handing a call to the wallet. A missing hash without an error
/// means the wallet dropped the request (usually a silent rejection).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub hash: Option<TxHash>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptStatus {
    Success,
    Reverted { reason: Option<String> },
}

/// Decoded return value / event data the gateway extracted from a receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptOutput {
    None,
    TokenId(TokenId),
    Shares(Usdc),
    Amount(Usdc),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub hash: TxHash,
    pub status: ReceiptStatus,
    pub output: ReceiptOutput,
}

/// Wallet connection interface
#[async_trait]
pub trait WalletConnector: Send + Sync {
    /// Currently connected account
    fn account(&self) -> Option<Address>;

    /// Ask the wallet to connect
    async fn connect(&self) -> Result<Address, GatewayError>;

    /// Drop the connection
    async fn disconnect(&self);

    fn is_connected(&self) -> bool {
        self.account().is_some()
    }
}

/// Contract write interface
#[async_trait]
pub trait ContractGateway: Send + Sync {
    /// Submit a call for signing; resolves once the wallet returns a hash
    async fn write(&self, call: ContractCall) -> Result<WriteOutcome, GatewayError>;

    /// Wait until the transaction is mined
    async fn wait_for_receipt(&self, hash: &TxHash) -> Result<Receipt, GatewayError>;
}

/// Contract read interface (polled queries)
#[async_trait]
pub trait StateReader: Send + Sync {
    async fn usdc_balance(&self, account: &Address) -> Result<Usdc, GatewayError>;

    async fn user_invoices(&self, account: &Address) -> Result<Vec<TokenId>, GatewayError>;

    async fn invoice(&self, token_id: TokenId) -> Result<Option<Invoice>, GatewayError>;

    async fn reputation(&self, account: &Address) -> Result<u64, GatewayError>;

    async fn vault_shares(&self, vault: VaultKind, account: &Address) -> Result<Usdc, GatewayError>;

    async fn convert_to_assets(&self, vault: VaultKind, shares: Usdc) -> Result<Usdc, GatewayError>;

    async fn max_withdraw(&self, vault: VaultKind, account: &Address) -> Result<Usdc, GatewayError>;

    async fn claimable_yield(&self, account: &Address) -> Result<Usdc, GatewayError>;

    /// Yield accrued in a vault and not yet harvested
    async fn pending_harvest(&self, vault: VaultKind) -> Result<Usdc, GatewayError>;

    async fn total_donated(&self) -> Result<Usdc, GatewayError>;

    async fn business_contribution(&self, account: &Address) -> Result<Usdc, GatewayError>;
}

/// The capability object handed to a flow controller
#[derive(Clone)]
pub struct Capabilities {
    pub wallet: Arc<dyn WalletConnector>,
    pub gateway: Arc<dyn ContractGateway>,
    pub reader: Arc<dyn StateReader>,
}

impl Capabilities {
    pub fn new(
        wallet: Arc<dyn WalletConnector>,
        gateway: Arc<dyn ContractGateway>,
        reader: Arc<dyn StateReader>,
    ) -> Self {
        Self {
            wallet,
            gateway,
            reader,
        }
    }

    pub fn account(&self) -> Option<Address> {
        self.wallet.account()
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("account", &self.wallet.account())
            .finish()
    }
}
