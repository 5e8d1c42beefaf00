use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use crate::cli::commands::donations::print_summary;
use crate::cli::commands::invoice::print_row;
use crate::cli::commands::Session;
use crate::dashboard::{BusinessDashboard, InvestorDashboard, PublicGoodsSummary};

#[derive(Debug, Serialize)]
struct StatusReport {
    network: String,
    business: BusinessDashboard,
    investor: InvestorDashboard,
    public_goods: PublicGoodsSummary,
}

pub struct StatusCommand;

impl StatusCommand {
    pub async fn execute(&self, session: &Session) -> Result<()> {
        let account = session.account()?;
        let reader = session.reader.as_ref();

        let report = StatusReport {
            network: session.config.chain.name.clone(),
            business: BusinessDashboard::load(reader, &account, Utc::now())
                .await
                .context("Failed to load business dashboard")?,
            investor: InvestorDashboard::load(reader, &account)
                .await
                .context("Failed to load investor dashboard")?,
            public_goods: PublicGoodsSummary::load(reader, &account)
                .await
                .context("Failed to load public goods totals")?,
        };

        if session.json {
            return session.print_json(&report);
        }

        println!("🌐 ARUNA STATUS ({})", report.network);
        println!("   👛 {}", account.shorten(4));
        println!("   💵 Balance: {} USDC", report.business.usdc_balance.display(2));
        println!("   ⭐ Reputation: {}", report.business.reputation);
        println!();

        println!(
            "📄 INVOICES ({} active, {} USDC collateral locked, {} USDC in grants)",
            report.business.active_count,
            report.business.collateral_locked.display(2),
            report.business.total_grants.display(2)
        );
        for row in &report.business.invoices {
            print_row(row);
        }
        println!();

        println!("🏦 VAULTS");
        for position in report.investor.positions.iter().filter(|p| !p.is_empty()) {
            println!(
                "   {} - {} USDC",
                position.vault.display_name(),
                position.assets.display(2)
            );
        }
        println!(
            "   💰 Claimable yield: {} USDC",
            report.investor.claimable_yield.to_fixed(2)
        );
        println!();

        print_summary(&report.public_goods);
        Ok(())
    }
}
