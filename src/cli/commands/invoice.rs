use anyhow::{Context, Result};
use chrono::Utc;

use crate::cli::commands::Session;
use crate::dashboard::{BusinessDashboard, InvoiceRow};
use crate::operations::{InvoiceForm, Operation};
use crate::protocol::{InvoiceStatus, InvoiceTerms, TokenId, Usdc};

pub struct SubmitInvoiceCommand {
    pub form: InvoiceForm,
}

impl SubmitInvoiceCommand {
    pub fn new(customer: String, amount: String, due_date: String) -> Self {
        Self {
            form: InvoiceForm {
                customer_name: customer,
                amount,
                due_date,
                description: None,
            },
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.form.description = description;
        self
    }

    pub async fn execute(&self, session: &mut Session) -> Result<()> {
        if !session.json {
            // Preview only; the flow validates the amount itself
            if let Ok(amount) = self.form.amount.trim().parse::<Usdc>() {
                let terms = InvoiceTerms::preview(amount, &session.config.protocol);
                println!(
                    "📋 {} USDC invoice: {} USDC grant now, {} USDC collateral locked",
                    amount.display(2),
                    terms.grant.to_fixed(2),
                    terms.collateral.to_fixed(2)
                );
            }
        }
        session
            .run_flow(Operation::SubmitInvoice(self.form.clone()))
            .await?;
        Ok(())
    }
}

pub struct SettleInvoiceCommand {
    pub token_id: TokenId,
}

impl SettleInvoiceCommand {
    pub fn new(token_id: TokenId) -> Self {
        Self { token_id }
    }

    pub async fn execute(&self, session: &mut Session) -> Result<()> {
        session
            .run_flow(Operation::SettleInvoice {
                token_id: self.token_id,
            })
            .await?;
        Ok(())
    }
}

pub struct LiquidateInvoiceCommand {
    pub token_id: TokenId,
}

impl LiquidateInvoiceCommand {
    pub fn new(token_id: TokenId) -> Self {
        Self { token_id }
    }

    pub async fn execute(&self, session: &mut Session) -> Result<()> {
        session
            .run_flow(Operation::LiquidateInvoice {
                token_id: self.token_id,
            })
            .await?;
        Ok(())
    }
}

pub struct ListInvoicesCommand;

impl ListInvoicesCommand {
    pub async fn execute(&self, session: &Session) -> Result<()> {
        let account = session.account()?;
        let dashboard = BusinessDashboard::load(session.reader.as_ref(), &account, Utc::now())
            .await
            .context("Failed to load invoices")?;

        if session.json {
            return session.print_json(&dashboard.invoices);
        }

        println!("📄 INVOICES ({} active)", dashboard.active_count);
        if dashboard.invoices.is_empty() {
            println!("   No invoices yet");
            println!("   💡 Commit one with: aruna invoice submit --customer <name> --amount <usdc> --due-date <YYYY-MM-DD>");
            return Ok(());
        }
        for row in &dashboard.invoices {
            print_row(row);
        }
        Ok(())
    }
}

pub(crate) fn print_row(row: &InvoiceRow) {
    let badge = match row.status {
        InvoiceStatus::Active => "🟢",
        InvoiceStatus::Overdue => "🔴",
        InvoiceStatus::Settled => "✅",
        InvoiceStatus::Liquidated => "⚫",
    };
    println!(
        "   {} #{} {} - {} USDC due {} ({})",
        badge,
        row.token_id,
        row.customer_name,
        row.invoice_amount.display(2),
        row.due_date,
        row.status.label()
    );
    if row.days_overdue > 0 && row.can_liquidate {
        println!("      ⚠️  {} days overdue, can be liquidated", row.days_overdue);
    } else if row.can_settle {
        println!(
            "      🔓 Settling returns {} USDC collateral",
            row.collateral_return.to_fixed(2)
        );
    }
}
