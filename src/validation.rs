// Local precondition checks run before anything is sent to the wallet

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::flow::errors::{ErrorCategory, FlowFailure};
use crate::protocol::{AmountError, TokenId, Usdc};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Customer name is required")]
    MissingCustomer,
    #[error("Invalid {field} amount: must be greater than 0")]
    NonPositiveAmount { field: &'static str },
    #[error("Invalid {field} amount: {reason}")]
    UnparsableAmount { field: &'static str, reason: String },
    #[error("Invalid due date '{0}': expected YYYY-MM-DD")]
    InvalidDueDate(String),
    #[error("Due date must be in the future")]
    DueDateNotInFuture,
    #[error("Minimum deposit is {minimum} USDC")]
    BelowMinimumDeposit { minimum: Usdc },
    #[error("Insufficient balance. You have {available} USDC")]
    ExceedsPosition { available: Usdc },
    #[error("Maximum withdrawable amount is {max} USDC")]
    ExceedsMaxWithdraw { max: Usdc },
    #[error("Insufficient USDC balance. You need {required} USDC but have {available} USDC")]
    InsufficientBalance { required: Usdc, available: Usdc },
    #[error("Invalid token ID")]
    InvalidTokenId,
    #[error("Invoice #{0} not found")]
    InvoiceNotFound(TokenId),
    #[error("Invoice #{token_id} is already {status}")]
    InvoiceClosed { token_id: TokenId, status: &'static str },
    #[error("Only the issuing business can settle invoice #{0}")]
    NotInvoiceOwner(TokenId),
    #[error("Invoice #{0} is not overdue yet")]
    NotOverdue(TokenId),
    #[error("No yield available to claim")]
    NothingToClaim,
    #[error("No pending yield to harvest in the {0} vault")]
    NothingToHarvest(&'static str),
}

impl From<ValidationError> for FlowFailure {
    fn from(err: ValidationError) -> Self {
        let category = match err {
            ValidationError::InsufficientBalance { .. } => ErrorCategory::InsufficientBalance,
            _ => ErrorCategory::Validation,
        };
        FlowFailure::new(category, err.to_string())
    }
}

/// Parse a user-entered amount that has to be strictly positive
pub fn parse_positive_amount(input: &str, field: &'static str) -> Result<Usdc, ValidationError> {
    match input.parse::<Usdc>() {
        Ok(amount) if amount.is_zero() => Err(ValidationError::NonPositiveAmount { field }),
        Ok(amount) => Ok(amount),
        Err(AmountError::Negative) => Err(ValidationError::NonPositiveAmount { field }),
        Err(err) => Err(ValidationError::UnparsableAmount {
            field,
            reason: err.to_string(),
        }),
    }
}

pub fn validate_customer_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingCustomer);
    }
    Ok(trimmed.to_string())
}

/// Due dates are calendar days interpreted as midnight UTC and must lie
/// strictly after `now`. Returns unix seconds.
pub fn parse_due_date(input: &str, now: DateTime<Utc>) -> Result<i64, ValidationError> {
    let date = NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDueDate(input.to_string()))?;
    let due = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| ValidationError::InvalidDueDate(input.to_string()))?
        .and_utc()
        .timestamp();
    if due <= now.timestamp() {
        return Err(ValidationError::DueDateNotInFuture);
    }
    Ok(due)
}

/// A minimum of zero disables the check
pub fn check_minimum_deposit(amount: Usdc, minimum: Usdc) -> Result<(), ValidationError> {
    if !minimum.is_zero() && amount < minimum {
        return Err(ValidationError::BelowMinimumDeposit { minimum });
    }
    Ok(())
}

pub fn check_withdrawal(amount: Usdc, assets: Usdc, max_withdraw: Usdc) -> Result<(), ValidationError> {
    if amount > assets {
        return Err(ValidationError::ExceedsPosition { available: assets });
    }
    if amount > max_withdraw {
        return Err(ValidationError::ExceedsMaxWithdraw { max: max_withdraw });
    }
    Ok(())
}

pub fn check_balance(required: Usdc, available: Usdc) -> Result<(), ValidationError> {
    if available < required {
        return Err(ValidationError::InsufficientBalance { required, available });
    }
    Ok(())
}

pub fn check_token_id(token_id: TokenId) -> Result<(), ValidationError> {
    if token_id == 0 {
        return Err(ValidationError::InvalidTokenId);
    }
    Ok(())
}
