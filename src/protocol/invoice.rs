// Read-only projection of an on-chain invoice commitment

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ProtocolConfig;
use crate::protocol::address::Address;
use crate::protocol::amount::Usdc;

pub type TokenId = u64;

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub token_id: TokenId,
    pub business: Address,
    pub customer_name: String,
    pub invoice_amount: Usdc,
    /// Unix seconds
    pub due_date: i64,
    pub collateral_amount: Usdc,
    pub grant_amount: Usdc,
    #[serde(default)]
    pub ipfs_hash: String,
    pub is_settled: bool,
    pub is_liquidated: bool,
    /// Unix seconds
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Active,
    Overdue,
    Settled,
    Liquidated,
}

impl InvoiceStatus {
    pub fn label(&self) -> &'static str {
        match self {
            InvoiceStatus::Active => "Active",
            InvoiceStatus::Overdue => "Overdue",
            InvoiceStatus::Settled => "Settled",
            InvoiceStatus::Liquidated => "Liquidated",
        }
    }
}

impl Invoice {
    pub fn due_date_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.due_date, 0).single()
    }

    pub fn status(&self, now: DateTime<Utc>) -> InvoiceStatus {
        if self.is_settled {
            InvoiceStatus::Settled
        } else if self.is_liquidated {
            InvoiceStatus::Liquidated
        } else if self.is_overdue(now) {
            InvoiceStatus::Overdue
        } else {
            InvoiceStatus::Active
        }
    }

    pub fn is_open(&self) -> bool {
        !self.is_settled && !self.is_liquidated
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() > self.due_date
    }

    /// Whole days past the due date; zero when not yet due
    pub fn days_overdue(&self, now: DateTime<Utc>) -> i64 {
        ((now.timestamp() - self.due_date) / SECONDS_PER_DAY).max(0)
    }

    /// Whole days until the due date; negative once overdue
    pub fn days_until_due(&self, now: DateTime<Utc>) -> i64 {
        (self.due_date - now.timestamp()).div_euclid(SECONDS_PER_DAY)
    }

    /// Collateral handed back on settlement: the chain-reported collateral
    /// minus the grant already paid out
    pub fn collateral_return_preview(&self) -> Usdc {
        self.collateral_amount.saturating_sub(self.grant_amount)
    }

    pub fn can_settle(&self) -> bool {
        self.is_open()
    }

    pub fn can_liquidate(&self, now: DateTime<Utc>) -> bool {
        self.is_open() && self.is_overdue(now)
    }
}

/// Figures shown on the submission form before anything reaches the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTerms {
    pub invoice_amount: Usdc,
    pub collateral: Usdc,
    pub grant: Usdc,
    pub net_collateral: Usdc,
}

impl InvoiceTerms {
    pub fn preview(invoice_amount: Usdc, protocol: &ProtocolConfig) -> Self {
        let collateral = invoice_amount.percent_bps(protocol.collateral_bps);
        let grant = invoice_amount.percent_bps(protocol.grant_bps);
        Self {
            invoice_amount,
            collateral,
            grant,
            net_collateral: collateral.saturating_sub(grant),
        }
    }
}
