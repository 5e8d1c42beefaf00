use anyhow::{Context, Result};

use crate::cli::commands::Session;
use crate::dashboard::InvestorDashboard;
use crate::operations::Operation;
use crate::protocol::{Usdc, VaultKind, YieldEstimate};

pub struct DepositCommand {
    pub vault: VaultKind,
    pub amount: String,
}

impl DepositCommand {
    pub fn new(vault: VaultKind, amount: String) -> Self {
        Self { vault, amount }
    }

    pub async fn execute(&self, session: &mut Session) -> Result<()> {
        if !session.json {
            if let Ok(amount) = self.amount.trim().parse::<Usdc>() {
                let estimate = YieldEstimate::for_deposit(
                    amount,
                    self.vault.apy_bps(&session.config.vaults),
                    &session.config.protocol,
                );
                println!(
                    "📈 {} at {}: ~{} USDC a year, {} USDC of it to public goods",
                    self.vault.display_name(),
                    estimate.apy_label(),
                    estimate.annual_yield.to_fixed(2),
                    estimate.annual_public_goods.to_fixed(2)
                );
            }
        }
        session
            .run_flow(Operation::VaultDeposit {
                vault: self.vault,
                amount: self.amount.clone(),
            })
            .await?;
        Ok(())
    }
}

pub struct WithdrawCommand {
    pub vault: VaultKind,
    pub amount: String,
}

impl WithdrawCommand {
    pub fn new(vault: VaultKind, amount: String) -> Self {
        Self { vault, amount }
    }

    pub async fn execute(&self, session: &mut Session) -> Result<()> {
        session
            .run_flow(Operation::VaultWithdraw {
                vault: self.vault,
                amount: self.amount.clone(),
            })
            .await?;
        Ok(())
    }
}

pub struct PositionCommand;

impl PositionCommand {
    pub async fn execute(&self, session: &Session) -> Result<()> {
        let account = session.account()?;
        let dashboard = InvestorDashboard::load(session.reader.as_ref(), &account)
            .await
            .context("Failed to load vault positions")?;

        if session.json {
            return session.print_json(&dashboard);
        }

        println!("🏦 VAULT POSITIONS");
        for position in &dashboard.positions {
            if position.is_empty() {
                println!("   {} - no position", position.vault.display_name());
                continue;
            }
            println!(
                "   {} - {} USDC ({} withdrawable)",
                position.vault.display_name(),
                position.assets.display(2),
                position.max_withdraw.display(2)
            );
        }
        println!("   💵 Total deposited: {} USDC", dashboard.total_deposited.display(2));
        println!("   💰 Claimable yield: {} USDC", dashboard.claimable_yield.to_fixed(2));
        Ok(())
    }
}
