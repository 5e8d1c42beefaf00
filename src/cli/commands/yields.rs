use anyhow::{anyhow, Result};

use crate::cli::commands::Session;
use crate::operations::Operation;
use crate::protocol::{Usdc, VaultKind};

pub struct ClaimYieldCommand;

impl ClaimYieldCommand {
    pub async fn execute(&self, session: &mut Session) -> Result<()> {
        session.run_flow(Operation::ClaimYield).await?;
        Ok(())
    }
}

pub struct HarvestCommand {
    pub vault: VaultKind,
    pub accrued: Option<String>,
}

impl HarvestCommand {
    pub fn new(vault: VaultKind) -> Self {
        Self { vault, accrued: None }
    }

    /// Let the vault earn `accrued` USDC before harvesting
    pub fn with_accrued(mut self, accrued: Option<String>) -> Self {
        self.accrued = accrued;
        self
    }

    pub async fn execute(&self, session: &mut Session) -> Result<()> {
        if let Some(accrued) = &self.accrued {
            let amount: Usdc = accrued
                .trim()
                .parse()
                .map_err(|e| anyhow!("Invalid accrued amount '{}': {}", accrued, e))?;
            session.sandbox.accrue_yield(self.vault, amount);
            if !session.json {
                println!(
                    "🌱 {} earned {} USDC",
                    self.vault.display_name(),
                    amount.display(2)
                );
            }
        }
        session
            .run_flow(Operation::Harvest { vault: self.vault })
            .await?;
        Ok(())
    }
}
