// Error taxonomy for transaction flows.
//
// Classification only produces the message shown in the modal; it never
// changes what the flow does next.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use crate::capabilities::GatewayError;

pub const USER_REJECTED_MESSAGE: &str = "Transaction was rejected by user";
pub const WALLET_NOT_CONNECTED_MESSAGE: &str = "Please connect your wallet";
const WALLET_INTERRUPTED_MESSAGE: &str = "Wallet connection interrupted. Your transaction may still be processing. Please check your wallet or refresh the page.";
const JSON_RPC_MESSAGE: &str = "Network communication error. This could be due to insufficient balance, network issues, or wallet connection problems. Please check your USDC balance and try again.";
const INSUFFICIENT_FUNDS_MESSAGE: &str = "Insufficient funds for gas fees or token balance";
const NONCE_MESSAGE: &str = "Transaction nonce issue. Please try again.";
const GAS_MESSAGE: &str = "Gas limit exceeded. Try increasing gas limit.";
const REVERTED_MESSAGE: &str = "Transaction was reverted by the contract";
const NETWORK_MESSAGE: &str = "Network error. Please check your connection and try again.";
const TIMEOUT_MESSAGE: &str = "Transaction timeout. Please try again.";
const INSUFFICIENT_BALANCE_MESSAGE: &str =
    "Insufficient USDC balance. Please get testnet USDC from the faucet.";

static REVERT_REASON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"execution reverted: (.+?)(?:\n|$)").expect("revert reason pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    UserRejected,
    WalletDisconnected,
    WalletInterrupted,
    InsufficientFunds,
    InsufficientBalance,
    Nonce,
    GasExceeded,
    ContractRevert { reason: Option<String> },
    Network,
    Timeout,
    Validation,
    Unclassified,
}

/// A failure as presented to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowFailure {
    pub category: ErrorCategory,
    pub message: String,
}

impl FlowFailure {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Validation, message)
    }

    pub fn wallet_not_connected() -> Self {
        Self::new(ErrorCategory::WalletDisconnected, WALLET_NOT_CONNECTED_MESSAGE)
    }

    /// The wallet handed back neither a hash nor an error
    pub fn missing_hash() -> Self {
        Self::new(ErrorCategory::UserRejected, USER_REJECTED_MESSAGE)
    }
}

impl fmt::Display for FlowFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Map a gateway error onto the taxonomy. Typed variants map directly;
/// free-text provider errors go through [`classify_message`].
pub fn classify(error: &GatewayError, message_limit: usize) -> FlowFailure {
    match error {
        GatewayError::UserRejected => FlowFailure::new(ErrorCategory::UserRejected, USER_REJECTED_MESSAGE),
        GatewayError::InsufficientFunds => {
            FlowFailure::new(ErrorCategory::InsufficientFunds, INSUFFICIENT_FUNDS_MESSAGE)
        }
        GatewayError::InsufficientBalance => {
            FlowFailure::new(ErrorCategory::InsufficientBalance, INSUFFICIENT_BALANCE_MESSAGE)
        }
        GatewayError::NonceConflict => FlowFailure::new(ErrorCategory::Nonce, NONCE_MESSAGE),
        GatewayError::GasExceeded => FlowFailure::new(ErrorCategory::GasExceeded, GAS_MESSAGE),
        GatewayError::Reverted { reason } => revert_failure(reason.clone()),
        GatewayError::Disconnected => {
            FlowFailure::new(ErrorCategory::WalletInterrupted, WALLET_INTERRUPTED_MESSAGE)
        }
        GatewayError::Network(_) => FlowFailure::new(ErrorCategory::Network, NETWORK_MESSAGE),
        GatewayError::Timeout => FlowFailure::new(ErrorCategory::Timeout, TIMEOUT_MESSAGE),
        GatewayError::Provider(text) => classify_message(text, message_limit),
    }
}

/// String-matching fallback for providers that only return free text
pub fn classify_message(text: &str, message_limit: usize) -> FlowFailure {
    if text.contains("User rejected") || text.contains("user rejected") {
        return FlowFailure::new(ErrorCategory::UserRejected, USER_REJECTED_MESSAGE);
    }
    if text.contains("Port disconnected") || text.contains("port disconnected") {
        return FlowFailure::new(ErrorCategory::WalletInterrupted, WALLET_INTERRUPTED_MESSAGE);
    }
    if text.contains("Internal JSON-RPC error") {
        return FlowFailure::new(ErrorCategory::Network, JSON_RPC_MESSAGE);
    }
    if text.contains("insufficient funds") {
        return FlowFailure::new(ErrorCategory::InsufficientFunds, INSUFFICIENT_FUNDS_MESSAGE);
    }
    if text.contains("nonce") {
        return FlowFailure::new(ErrorCategory::Nonce, NONCE_MESSAGE);
    }
    if text.contains("gas required exceeds allowance") {
        return FlowFailure::new(ErrorCategory::GasExceeded, GAS_MESSAGE);
    }
    if text.contains("execution reverted") {
        let reason = REVERT_REASON
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string());
        return revert_failure(reason);
    }
    if text.contains("network") {
        return FlowFailure::new(ErrorCategory::Network, NETWORK_MESSAGE);
    }
    if text.contains("timeout") {
        return FlowFailure::new(ErrorCategory::Timeout, TIMEOUT_MESSAGE);
    }
    if text.contains("exceeds balance") || text.contains("insufficient balance") {
        return FlowFailure::new(ErrorCategory::InsufficientBalance, INSUFFICIENT_BALANCE_MESSAGE);
    }

    FlowFailure::new(ErrorCategory::Unclassified, truncate(text, message_limit))
}

fn revert_failure(reason: Option<String>) -> FlowFailure {
    let message = match &reason {
        Some(reason) => format!("Transaction failed: {reason}"),
        None => REVERTED_MESSAGE.to_string(),
    };
    FlowFailure::new(ErrorCategory::ContractRevert { reason }, message)
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() > limit {
        let head: String = text.chars().take(limit).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}
