// User-facing operations and how each one maps onto contract calls.
//
// An `Operation` is what the user asked for. `Operation::prepare` runs the
// local checks, reads whatever chain state they need and produces a
// `PreparedOperation`: the optional USDC approval, the dependent call and
// enough context to describe the outcome once the receipt arrives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

use crate::capabilities::{ContractCall, GatewayError, Receipt, ReceiptOutput, StateReader};
use crate::config::ArunaConfig;
use crate::flow::types::SuccessPayload;
use crate::protocol::{
    Address, DistributionBreakdown, InvoiceTerms, TokenId, Usdc, VaultKind, YieldEstimate,
};
use crate::reads::RefreshScope;
use crate::validation::{self, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    SubmitInvoice,
    VaultDeposit,
    VaultWithdraw,
    SettleInvoice,
    LiquidateInvoice,
    ClaimYield,
    Harvest,
}

impl OperationKind {
    /// Modal title
    pub fn title(&self) -> &'static str {
        match self {
            OperationKind::SubmitInvoice => "Submit Invoice Commitment",
            OperationKind::VaultDeposit => "Deposit to Vault",
            OperationKind::VaultWithdraw => "Withdraw from Vault",
            OperationKind::SettleInvoice => "Settle Invoice",
            OperationKind::LiquidateInvoice => "Liquidate Invoice",
            OperationKind::ClaimYield => "Claim Yield",
            OperationKind::Harvest => "Harvest Yield",
        }
    }

    /// Operations that move the caller's USDC need an allowance first
    pub fn needs_approval(&self) -> bool {
        matches!(self, OperationKind::SubmitInvoice | OperationKind::VaultDeposit)
    }

    pub fn refresh_scopes(&self) -> &'static [RefreshScope] {
        match self {
            OperationKind::SubmitInvoice => &[RefreshScope::Balances, RefreshScope::Invoices],
            OperationKind::SettleInvoice | OperationKind::LiquidateInvoice => &[
                RefreshScope::Balances,
                RefreshScope::Invoices,
                RefreshScope::Donations,
            ],
            OperationKind::VaultDeposit | OperationKind::VaultWithdraw => {
                &[RefreshScope::Balances, RefreshScope::Vaults]
            }
            OperationKind::ClaimYield => &[RefreshScope::Balances, RefreshScope::Yield],
            OperationKind::Harvest => &[RefreshScope::Yield, RefreshScope::Donations],
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Raw input of the invoice submission form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceForm {
    pub customer_name: String,
    /// Decimal USDC as typed by the user
    pub amount: String,
    /// Calendar day, `YYYY-MM-DD`
    pub due_date: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    SubmitInvoice(InvoiceForm),
    VaultDeposit { vault: VaultKind, amount: String },
    VaultWithdraw { vault: VaultKind, amount: String },
    SettleInvoice { token_id: TokenId },
    LiquidateInvoice { token_id: TokenId },
    ClaimYield,
    Harvest { vault: VaultKind },
}

#[derive(Debug, Error)]
pub enum PrepareError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("failed to read contract state: {0}")]
    Read(#[from] GatewayError),
}

/// What the success screen will need once the receipt is in
#[derive(Debug, Clone, PartialEq, Eq)]
enum Expected {
    Invoice { customer_name: String, terms: InvoiceTerms },
    Deposit { vault: VaultKind, amount: Usdc, estimate: YieldEstimate },
    Withdraw { vault: VaultKind, amount: Usdc },
    Settle { token_id: TokenId, collateral_returned: Usdc },
    Liquidate { token_id: TokenId, collateral: Usdc },
    Claim { amount: Usdc },
    Harvest { vault: VaultKind, pending: Usdc },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedOperation {
    pub kind: OperationKind,
    pub approval: Option<ContractCall>,
    pub call: ContractCall,
    expected: Expected,
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::SubmitInvoice(_) => OperationKind::SubmitInvoice,
            Operation::VaultDeposit { .. } => OperationKind::VaultDeposit,
            Operation::VaultWithdraw { .. } => OperationKind::VaultWithdraw,
            Operation::SettleInvoice { .. } => OperationKind::SettleInvoice,
            Operation::LiquidateInvoice { .. } => OperationKind::LiquidateInvoice,
            Operation::ClaimYield => OperationKind::ClaimYield,
            Operation::Harvest { .. } => OperationKind::Harvest,
        }
    }

    /// Form-level checks that need no chain access
    pub fn validate(&self, now: DateTime<Utc>, config: &ArunaConfig) -> Result<(), ValidationError> {
        match self {
            Operation::SubmitInvoice(form) => {
                validation::validate_customer_name(&form.customer_name)?;
                validation::parse_positive_amount(&form.amount, "invoice")?;
                validation::parse_due_date(&form.due_date, now)?;
            }
            Operation::VaultDeposit { amount, .. } => {
                let amount = validation::parse_positive_amount(amount, "deposit")?;
                validation::check_minimum_deposit(amount, config.vaults.min_deposit)?;
            }
            Operation::VaultWithdraw { amount, .. } => {
                validation::parse_positive_amount(amount, "withdrawal")?;
            }
            Operation::SettleInvoice { token_id } | Operation::LiquidateInvoice { token_id } => {
                validation::check_token_id(*token_id)?;
            }
            Operation::ClaimYield | Operation::Harvest { .. } => {}
        }
        Ok(())
    }

    /// Validate, read the state the checks depend on and build the calls
    pub async fn prepare(
        &self,
        account: &Address,
        reader: &dyn StateReader,
        config: &ArunaConfig,
        now: DateTime<Utc>,
    ) -> Result<PreparedOperation, PrepareError> {
        self.validate(now, config)?;
        let kind = self.kind();

        let prepared = match self {
            Operation::SubmitInvoice(form) => {
                let customer_name = validation::validate_customer_name(&form.customer_name)?;
                let invoice_amount = validation::parse_positive_amount(&form.amount, "invoice")?;
                let due_date = validation::parse_due_date(&form.due_date, now)?;
                let terms = InvoiceTerms::preview(invoice_amount, &config.protocol);

                let balance = reader.usdc_balance(account).await?;
                validation::check_balance(terms.collateral, balance)?;

                PreparedOperation {
                    kind,
                    approval: Some(ContractCall::ApproveUsdc {
                        spender: config.contracts.aruna_core.clone(),
                        amount: terms.collateral,
                    }),
                    call: ContractCall::SubmitInvoiceCommitment {
                        customer_name: customer_name.clone(),
                        invoice_amount,
                        due_date,
                    },
                    expected: Expected::Invoice { customer_name, terms },
                }
            }
            Operation::VaultDeposit { vault, amount } => {
                let amount = validation::parse_positive_amount(amount, "deposit")?;
                let balance = reader.usdc_balance(account).await?;
                validation::check_balance(amount, balance)?;
                let estimate =
                    YieldEstimate::for_deposit(amount, vault.apy_bps(&config.vaults), &config.protocol);

                PreparedOperation {
                    kind,
                    approval: Some(ContractCall::ApproveUsdc {
                        spender: vault.address(&config.contracts),
                        amount,
                    }),
                    call: ContractCall::VaultDeposit {
                        vault: *vault,
                        amount,
                        receiver: account.clone(),
                    },
                    expected: Expected::Deposit { vault: *vault, amount, estimate },
                }
            }
            Operation::VaultWithdraw { vault, amount } => {
                let amount = validation::parse_positive_amount(amount, "withdrawal")?;
                let shares = reader.vault_shares(*vault, account).await?;
                let assets = reader.convert_to_assets(*vault, shares).await?;
                let max_withdraw = reader.max_withdraw(*vault, account).await?;
                validation::check_withdrawal(amount, assets, max_withdraw)?;

                PreparedOperation {
                    kind,
                    approval: None,
                    call: ContractCall::VaultWithdraw {
                        vault: *vault,
                        amount,
                        receiver: account.clone(),
                        owner: account.clone(),
                    },
                    expected: Expected::Withdraw { vault: *vault, amount },
                }
            }
            Operation::SettleInvoice { token_id } => {
                let invoice = reader
                    .invoice(*token_id)
                    .await?
                    .ok_or(ValidationError::InvoiceNotFound(*token_id))?;
                if !invoice.is_open() {
                    return Err(closed(&invoice, now).into());
                }
                if &invoice.business != account {
                    return Err(ValidationError::NotInvoiceOwner(*token_id).into());
                }

                PreparedOperation {
                    kind,
                    approval: None,
                    call: ContractCall::SettleInvoice { token_id: *token_id },
                    expected: Expected::Settle {
                        token_id: *token_id,
                        collateral_returned: invoice.collateral_return_preview(),
                    },
                }
            }
            Operation::LiquidateInvoice { token_id } => {
                let invoice = reader
                    .invoice(*token_id)
                    .await?
                    .ok_or(ValidationError::InvoiceNotFound(*token_id))?;
                if !invoice.is_open() {
                    return Err(closed(&invoice, now).into());
                }
                if !invoice.can_liquidate(now) {
                    return Err(ValidationError::NotOverdue(*token_id).into());
                }

                PreparedOperation {
                    kind,
                    approval: None,
                    call: ContractCall::LiquidateInvoice { token_id: *token_id },
                    expected: Expected::Liquidate {
                        token_id: *token_id,
                        collateral: invoice.collateral_amount,
                    },
                }
            }
            Operation::ClaimYield => {
                let amount = reader.claimable_yield(account).await?;
                if amount.is_zero() {
                    return Err(ValidationError::NothingToClaim.into());
                }
                PreparedOperation {
                    kind,
                    approval: None,
                    call: ContractCall::ClaimYield,
                    expected: Expected::Claim { amount },
                }
            }
            Operation::Harvest { vault } => {
                let pending = reader.pending_harvest(*vault).await?;
                if pending.is_zero() {
                    return Err(ValidationError::NothingToHarvest(vault.display_name()).into());
                }
                PreparedOperation {
                    kind,
                    approval: None,
                    call: ContractCall::Harvest { vault: *vault },
                    expected: Expected::Harvest { vault: *vault, pending },
                }
            }
        };

        debug!(
            operation = ?kind,
            approval = prepared.approval.is_some(),
            call = prepared.call.function_name(),
            "Operation prepared"
        );
        Ok(prepared)
    }
}

fn closed(invoice: &crate::protocol::Invoice, now: DateTime<Utc>) -> ValidationError {
    ValidationError::InvoiceClosed {
        token_id: invoice.token_id,
        status: match invoice.status(now) {
            crate::protocol::InvoiceStatus::Liquidated => "liquidated",
            _ => "settled",
        },
    }
}

impl PreparedOperation {
    /// Amount the approval call allows, if there is one
    pub fn approval_amount(&self) -> Option<Usdc> {
        match &self.approval {
            Some(ContractCall::ApproveUsdc { amount, .. }) => Some(*amount),
            _ => None,
        }
    }

    /// Build the success screen from the receipt, preferring values the
    /// receipt reports over the ones estimated before submission
    pub fn success_payload(&self, receipt: &Receipt, config: &ArunaConfig) -> SuccessPayload {
        match &self.expected {
            Expected::Invoice { customer_name, terms } => SuccessPayload::InvoiceSubmitted {
                customer_name: customer_name.clone(),
                invoice_amount: terms.invoice_amount,
                grant: terms.grant,
                collateral: terms.collateral,
                token_id: match receipt.output {
                    ReceiptOutput::TokenId(id) => Some(id),
                    _ => None,
                },
            },
            Expected::Deposit { vault, amount, estimate } => SuccessPayload::Deposited {
                vault: *vault,
                amount: *amount,
                shares_received: match receipt.output {
                    ReceiptOutput::Shares(shares) => Some(shares),
                    _ => None,
                },
                apy: estimate.apy_label(),
                estimated_annual_yield: estimate.annual_yield,
            },
            Expected::Withdraw { vault, amount } => SuccessPayload::Withdrawn {
                vault: *vault,
                amount: *amount,
            },
            Expected::Settle { token_id, collateral_returned } => SuccessPayload::Settled {
                token_id: *token_id,
                collateral_returned: reported_amount(receipt).unwrap_or(*collateral_returned),
            },
            Expected::Liquidate { token_id, collateral } => SuccessPayload::Liquidated {
                token_id: *token_id,
                collateral_seized: reported_amount(receipt).unwrap_or(*collateral),
            },
            Expected::Claim { amount } => SuccessPayload::YieldClaimed {
                amount: reported_amount(receipt).unwrap_or(*amount),
            },
            Expected::Harvest { vault, pending } => SuccessPayload::Harvested {
                vault: *vault,
                breakdown: DistributionBreakdown::split(
                    reported_amount(receipt).unwrap_or(*pending),
                    &config.protocol,
                ),
            },
        }
    }
}

fn reported_amount(receipt: &Receipt) -> Option<Usdc> {
    match receipt.output {
        ReceiptOutput::Amount(amount) => Some(amount),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::ReceiptStatus;
    use crate::flow::mocks::MockReader;
    use crate::protocol::{Invoice, TxHash};
    use chrono::Duration;

    fn account() -> Address {
        "0x1111111111111111111111111111111111111111".parse().unwrap()
    }

    fn tomorrow(now: DateTime<Utc>) -> String {
        (now + Duration::days(1)).format("%Y-%m-%d").to_string()
    }

    fn receipt(output: ReceiptOutput) -> Receipt {
        Receipt {
            hash: TxHash::from_sequence(1),
            status: ReceiptStatus::Success,
            output,
        }
    }

    fn invoice_form(amount: &str, due_date: String) -> Operation {
        Operation::SubmitInvoice(InvoiceForm {
            customer_name: "Acme Corporation".to_string(),
            amount: amount.to_string(),
            due_date,
            description: None,
        })
    }

    #[tokio::test]
    async fn test_invoice_approves_ten_percent_collateral() {
        let now = Utc::now();
        let config = ArunaConfig::default();
        let reader = MockReader::new().with_balance(Usdc::from_whole(50));

        let prepared = invoice_form("100", tomorrow(now))
            .prepare(&account(), &reader, &config, now)
            .await
            .unwrap();

        assert_eq!(prepared.approval_amount().map(|a| a.to_string()), Some("10".to_string()));
        match &prepared.call {
            ContractCall::SubmitInvoiceCommitment { invoice_amount, customer_name, .. } => {
                assert_eq!(invoice_amount.to_string(), "100");
                assert_eq!(customer_name, "Acme Corporation");
            }
            other => panic!("unexpected call {other:?}"),
        }

        match prepared.success_payload(&receipt(ReceiptOutput::TokenId(4)), &config) {
            SuccessPayload::InvoiceSubmitted { grant, token_id, .. } => {
                assert_eq!(grant.to_fixed(2), "3.00");
                assert_eq!(token_id, Some(4));
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invoice_rejected_when_collateral_exceeds_balance() {
        let now = Utc::now();
        let reader = MockReader::new().with_balance(Usdc::from_whole(5));
        let err = invoice_form("100", tomorrow(now))
            .prepare(&account(), &reader, &ArunaConfig::default(), now)
            .await
            .unwrap_err();
        assert!(matches!(err, PrepareError::Invalid(ValidationError::InsufficientBalance { .. })));
    }

    #[test]
    fn test_form_validation_needs_no_reads() {
        let now = Utc::now();
        let config = ArunaConfig::default();
        assert!(invoice_form("0", tomorrow(now)).validate(now, &config).is_err());
        assert_eq!(
            invoice_form("100", now.format("%Y-%m-%d").to_string())
                .validate(now, &config)
                .unwrap_err(),
            ValidationError::DueDateNotInFuture
        );
        assert_eq!(
            Operation::SettleInvoice { token_id: 0 }.validate(now, &config),
            Err(ValidationError::InvalidTokenId)
        );
    }

    #[test]
    fn test_minimum_deposit_from_config() {
        let now = Utc::now();
        let mut config = ArunaConfig::default();
        let deposit = Operation::VaultDeposit { vault: VaultKind::Aave, amount: "50".into() };
        assert!(deposit.validate(now, &config).is_ok());

        config.vaults.min_deposit = Usdc::from_whole(100);
        assert_eq!(
            deposit.validate(now, &config).unwrap_err().to_string(),
            "Minimum deposit is 100 USDC"
        );
    }

    #[tokio::test]
    async fn test_settlement_uses_chain_values() {
        let now = Utc::now();
        let config = ArunaConfig::default();
        let invoice = Invoice {
            token_id: 3,
            business: account(),
            customer_name: "Globex".into(),
            invoice_amount: Usdc::from_whole(1_000),
            due_date: (now + Duration::days(10)).timestamp(),
            // chain figures that differ from the configured percentages
            collateral_amount: Usdc::from_whole(120),
            grant_amount: Usdc::from_whole(20),
            ipfs_hash: String::new(),
            is_settled: false,
            is_liquidated: false,
            created_at: now.timestamp(),
        };
        let reader = MockReader::new().with_invoice(invoice.clone());

        let prepared = Operation::SettleInvoice { token_id: 3 }
            .prepare(&account(), &reader, &config, now)
            .await
            .unwrap();
        assert!(prepared.approval.is_none());
        assert_eq!(
            prepared.success_payload(&receipt(ReceiptOutput::None), &config),
            SuccessPayload::Settled { token_id: 3, collateral_returned: Usdc::from_whole(100) }
        );

        let stranger: Address = "0x2222222222222222222222222222222222222222".parse().unwrap();
        let err = Operation::SettleInvoice { token_id: 3 }
            .prepare(&stranger, &reader, &config, now)
            .await
            .unwrap_err();
        assert!(matches!(err, PrepareError::Invalid(ValidationError::NotInvoiceOwner(3))));

        let err = Operation::LiquidateInvoice { token_id: 3 }
            .prepare(&stranger, &reader, &config, now)
            .await
            .unwrap_err();
        assert!(matches!(err, PrepareError::Invalid(ValidationError::NotOverdue(3))));
    }

    #[tokio::test]
    async fn test_withdraw_checks_position() {
        let now = Utc::now();
        let config = ArunaConfig::default();
        let reader = MockReader::new().with_position(VaultKind::Morpho, Usdc::from_whole(80), Usdc::from_whole(60));

        let err = Operation::VaultWithdraw { vault: VaultKind::Morpho, amount: "70".into() }
            .prepare(&account(), &reader, &config, now)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Maximum withdrawable amount is 60 USDC");

        let ok = Operation::VaultWithdraw { vault: VaultKind::Morpho, amount: "60".into() }
            .prepare(&account(), &reader, &config, now)
            .await
            .unwrap();
        assert_eq!(ok.kind, OperationKind::VaultWithdraw);
        assert!(!ok.kind.needs_approval());
    }

    #[tokio::test]
    async fn test_harvest_payload_splits_reported_amount() {
        let now = Utc::now();
        let config = ArunaConfig::default();
        let reader = MockReader::new().with_pending_harvest(VaultKind::Aave, Usdc::from_whole(10));

        let prepared = Operation::Harvest { vault: VaultKind::Aave }
            .prepare(&account(), &reader, &config, now)
            .await
            .unwrap();
        match prepared.success_payload(&receipt(ReceiptOutput::Amount(Usdc::from_whole(100))), &config) {
            SuccessPayload::Harvested { breakdown, .. } => {
                assert_eq!(breakdown.investors, Usdc::from_whole(70));
                assert_eq!(breakdown.public_goods, Usdc::from_whole(25));
                assert_eq!(breakdown.protocol_fee, Usdc::from_whole(5));
            }
            other => panic!("unexpected payload {other:?}"),
        }

        let err = Operation::ClaimYield
            .prepare(&account(), &reader, &config, now)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "No yield available to claim");
    }
}
