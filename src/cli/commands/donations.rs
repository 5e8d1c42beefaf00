use anyhow::{Context, Result};

use crate::cli::commands::Session;
use crate::dashboard::PublicGoodsSummary;

pub struct DonationsCommand;

impl DonationsCommand {
    pub async fn execute(&self, session: &Session) -> Result<()> {
        let account = session.account()?;
        let summary = PublicGoodsSummary::load(session.reader.as_ref(), &account)
            .await
            .context("Failed to load public goods totals")?;

        if session.json {
            return session.print_json(&summary);
        }
        print_summary(&summary);
        Ok(())
    }
}

pub(crate) fn print_summary(summary: &PublicGoodsSummary) {
    println!("🌍 PUBLIC GOODS");
    println!("   💚 Total donated: {} USDC", summary.total_donated.display(2));
    println!("   🙌 Your contribution: {} USDC", summary.your_contribution.display(2));
    for (vault, pending) in &summary.pending_harvest {
        if !pending.is_zero() {
            println!(
                "   🌾 {} has {} USDC waiting to be harvested",
                vault.display_name(),
                pending.display(2)
            );
        }
    }
}
