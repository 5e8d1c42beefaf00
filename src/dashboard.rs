// Business, investor and public-goods views composed from contract reads

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::capabilities::{GatewayError, StateReader};
use crate::protocol::{Address, Invoice, InvoiceStatus, TokenId, Usdc, VaultKind, VaultPosition};

/// One row of the business invoice table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceRow {
    pub token_id: TokenId,
    pub customer_name: String,
    pub invoice_amount: Usdc,
    pub grant: Usdc,
    pub collateral: Usdc,
    pub due_date: String,
    pub status: InvoiceStatus,
    pub days_overdue: i64,
    pub collateral_return: Usdc,
    pub can_settle: bool,
    pub can_liquidate: bool,
}

impl InvoiceRow {
    pub fn from_invoice(invoice: &Invoice, now: DateTime<Utc>) -> Self {
        Self {
            token_id: invoice.token_id,
            customer_name: invoice.customer_name.clone(),
            invoice_amount: invoice.invoice_amount,
            grant: invoice.grant_amount,
            collateral: invoice.collateral_amount,
            due_date: invoice
                .due_date_utc()
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "-".to_string()),
            status: invoice.status(now),
            days_overdue: invoice.days_overdue(now),
            collateral_return: invoice.collateral_return_preview(),
            can_settle: invoice.can_settle(),
            can_liquidate: invoice.can_liquidate(now),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusinessDashboard {
    pub account: Address,
    pub usdc_balance: Usdc,
    pub reputation: u64,
    pub invoices: Vec<InvoiceRow>,
    pub active_count: usize,
    pub total_grants: Usdc,
    pub collateral_locked: Usdc,
}

impl BusinessDashboard {
    pub async fn load(
        reader: &dyn StateReader,
        account: &Address,
        now: DateTime<Utc>,
    ) -> Result<Self, GatewayError> {
        let ids = reader.user_invoices(account).await?;
        let mut invoices = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(invoice) = reader.invoice(id).await? {
                invoices.push(InvoiceRow::from_invoice(&invoice, now));
            }
        }

        let open = |row: &&InvoiceRow| {
            matches!(row.status, InvoiceStatus::Active | InvoiceStatus::Overdue)
        };
        let active_count = invoices.iter().filter(open).count();
        let collateral_locked = invoices
            .iter()
            .filter(open)
            .fold(Usdc::ZERO, |acc, row| acc + row.collateral);
        let total_grants = invoices.iter().fold(Usdc::ZERO, |acc, row| acc + row.grant);

        Ok(Self {
            account: account.clone(),
            usdc_balance: reader.usdc_balance(account).await?,
            reputation: reader.reputation(account).await?,
            invoices,
            active_count,
            total_grants,
            collateral_locked,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvestorDashboard {
    pub account: Address,
    pub usdc_balance: Usdc,
    pub positions: Vec<VaultPosition>,
    pub total_deposited: Usdc,
    pub claimable_yield: Usdc,
}

impl InvestorDashboard {
    pub async fn load(reader: &dyn StateReader, account: &Address) -> Result<Self, GatewayError> {
        let mut positions = Vec::with_capacity(VaultKind::ALL.len());
        for vault in VaultKind::ALL {
            positions.push(load_position(reader, vault, account).await?);
        }
        let total_deposited = positions.iter().fold(Usdc::ZERO, |acc, p| acc + p.assets);

        Ok(Self {
            account: account.clone(),
            usdc_balance: reader.usdc_balance(account).await?,
            positions,
            total_deposited,
            claimable_yield: reader.claimable_yield(account).await?,
        })
    }
}

pub async fn load_position(
    reader: &dyn StateReader,
    vault: VaultKind,
    account: &Address,
) -> Result<VaultPosition, GatewayError> {
    let shares = reader.vault_shares(vault, account).await?;
    if shares.is_zero() {
        return Ok(VaultPosition::empty(vault));
    }
    Ok(VaultPosition {
        vault,
        shares,
        assets: reader.convert_to_assets(vault, shares).await?,
        max_withdraw: reader.max_withdraw(vault, account).await?,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicGoodsSummary {
    pub total_donated: Usdc,
    pub your_contribution: Usdc,
    pub pending_harvest: Vec<(VaultKind, Usdc)>,
}

impl PublicGoodsSummary {
    pub async fn load(reader: &dyn StateReader, account: &Address) -> Result<Self, GatewayError> {
        let mut pending_harvest = Vec::new();
        for vault in VaultKind::ALL {
            pending_harvest.push((vault, reader.pending_harvest(vault).await?));
        }
        Ok(Self {
            total_donated: reader.total_donated().await?,
            your_contribution: reader.business_contribution(account).await?,
            pending_harvest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::mocks::{test_account, MockReader};
    use chrono::Duration;

    fn invoice(token_id: TokenId, due_in_days: i64, now: DateTime<Utc>) -> Invoice {
        Invoice {
            token_id,
            business: test_account(),
            customer_name: format!("Customer {token_id}"),
            invoice_amount: Usdc::from_whole(1_000),
            due_date: (now + Duration::days(due_in_days)).timestamp(),
            collateral_amount: Usdc::from_whole(100),
            grant_amount: Usdc::from_whole(30),
            ipfs_hash: String::new(),
            is_settled: false,
            is_liquidated: false,
            created_at: now.timestamp(),
        }
    }

    #[tokio::test]
    async fn test_business_dashboard_rows() {
        let now = Utc::now();
        let mut settled = invoice(3, 5, now);
        settled.is_settled = true;
        let reader = MockReader::new()
            .with_balance(Usdc::from_whole(12))
            .with_invoice(invoice(1, 10, now))
            .with_invoice(invoice(2, -4, now))
            .with_invoice(settled);

        let dashboard = BusinessDashboard::load(&reader, &test_account(), now).await.unwrap();

        assert_eq!(dashboard.invoices.len(), 3);
        assert_eq!(dashboard.active_count, 2);
        assert_eq!(dashboard.collateral_locked, Usdc::from_whole(200));
        assert_eq!(dashboard.total_grants, Usdc::from_whole(90));

        let overdue = &dashboard.invoices[1];
        assert_eq!(overdue.status, InvoiceStatus::Overdue);
        assert_eq!(overdue.days_overdue, 4);
        assert!(overdue.can_liquidate);
        assert_eq!(overdue.collateral_return, Usdc::from_whole(70));

        assert_eq!(dashboard.invoices[2].status, InvoiceStatus::Settled);
        assert!(!dashboard.invoices[2].can_settle);
    }

    #[tokio::test]
    async fn test_investor_dashboard_totals() {
        let reader = MockReader::new()
            .with_position(VaultKind::Aave, Usdc::from_whole(250), Usdc::from_whole(250))
            .with_claimable(Usdc::from_units(1_500_000));

        let dashboard = InvestorDashboard::load(&reader, &test_account()).await.unwrap();

        assert_eq!(dashboard.positions.len(), 2);
        assert!(dashboard.positions[1].is_empty());
        assert_eq!(dashboard.total_deposited, Usdc::from_whole(250));
        assert_eq!(dashboard.claimable_yield.to_fixed(2), "1.50");
    }
}
