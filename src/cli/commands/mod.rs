use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::capabilities::Capabilities;
use crate::config::ArunaConfig;
use crate::flow::{FlowController, FlowSnapshot, FlowStep, SuccessPayload};
use crate::operations::Operation;
use crate::protocol::{Address, Explorer, Usdc};
use crate::reads::CachedReader;
use crate::sandbox::Sandbox;

pub mod donations;
pub mod invoice;
pub mod status;
pub mod vault;
pub mod yields;

/// Simulated confirmation time for sandbox transactions
const SANDBOX_RECEIPT_DELAY: Duration = Duration::from_millis(150);

/// Knobs the global CLI flags turn on the sandbox wallet
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub balance: Usdc,
    pub reject_approval: bool,
    pub disconnected: bool,
    pub json: bool,
}

/// A seeded sandbox chain plus a flow controller wired to it
pub struct Session {
    pub sandbox: Sandbox,
    pub reader: Arc<CachedReader>,
    pub controller: FlowController,
    pub config: Arc<ArunaConfig>,
    pub json: bool,
}

impl Session {
    pub async fn open(options: &SessionOptions, config: ArunaConfig) -> Result<Self> {
        let config = Arc::new(config);
        let seeded = Sandbox::new(config.contracts.clone(), config.protocol.clone())
            .with_funded_account(options.balance);
        seeded
            .seed_demo()
            .await
            .context("Failed to seed the sandbox chain")?;

        let sandbox = seeded.with_receipt_delay(SANDBOX_RECEIPT_DELAY);
        sandbox.reject_approvals(options.reject_approval);
        if options.disconnected {
            crate::capabilities::WalletConnector::disconnect(&sandbox).await;
        }

        let reader = Arc::new(CachedReader::new(
            Arc::new(sandbox.clone()),
            Duration::from_secs(config.flow.read_cache_ttl_secs),
        ));
        let caps = Capabilities::new(Arc::new(sandbox.clone()), Arc::new(sandbox.clone()), reader.clone());
        let mut controller = FlowController::new(caps, config.clone()).with_refresher(reader.clone());

        if !options.json {
            controller.on_step(print_step);
        }

        Ok(Self {
            sandbox,
            reader,
            controller,
            config,
            json: options.json,
        })
    }

    pub fn account(&self) -> Result<Address> {
        crate::capabilities::WalletConnector::account(&self.sandbox)
            .ok_or_else(|| anyhow!("Please connect your wallet"))
    }

    pub fn explorer(&self) -> Explorer {
        Explorer::for_chain(self.config.chain.chain_id)
    }

    /// Run one operation through the flow and report the outcome.
    /// A failed flow is returned as an error so the process exits non-zero.
    pub async fn run_flow(&mut self, operation: Operation) -> Result<FlowSnapshot> {
        if !self.json {
            println!("🧾 {}", operation.kind().title());
        }
        let snapshot = self.controller.run(operation).await;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        } else {
            print_outcome(&snapshot, &self.explorer());
        }

        match snapshot.step {
            FlowStep::Success => {
                self.controller.wait_for_refresh().await;
                Ok(snapshot)
            }
            _ => Err(anyhow!(snapshot
                .error_message()
                .unwrap_or("Transaction did not complete")
                .to_string())),
        }
    }

    pub fn print_json<T: serde::Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

fn print_step(snapshot: &FlowSnapshot) {
    let icon = match snapshot.step {
        FlowStep::Approving => "✍️ ",
        FlowStep::Confirming => "🔐",
        FlowStep::Pending => "⏳",
        FlowStep::Success | FlowStep::Error | FlowStep::Idle => return,
    };
    match (&snapshot.step, &snapshot.tx_hash) {
        (FlowStep::Pending, Some(hash)) => {
            println!("   {} {} ({})", icon, snapshot.step.headline(), hash.shorten(8))
        }
        _ => println!("   {} {}", icon, snapshot.step.headline()),
    }
}

fn print_outcome(snapshot: &FlowSnapshot, explorer: &Explorer) {
    match snapshot.step {
        FlowStep::Success => {
            println!("✅ {}", FlowStep::Success.headline());
            if let Some(payload) = &snapshot.payload {
                for line in describe_payload(payload) {
                    println!("   {}", line);
                }
            }
            if let Some(hash) = &snapshot.tx_hash {
                println!("   🔗 {}", explorer.tx_url(hash));
            }
        }
        FlowStep::Error => {
            println!("❌ {}", FlowStep::Error.headline());
            if let Some(message) = snapshot.error_message() {
                println!("   {}", message);
            }
        }
        _ => println!("🚪 Flow closed before completion"),
    }
}

/// Success screen lines for each kind of payload
pub fn describe_payload(payload: &SuccessPayload) -> Vec<String> {
    match payload {
        SuccessPayload::InvoiceSubmitted {
            customer_name,
            invoice_amount,
            grant,
            collateral,
            token_id,
        } => {
            let mut lines = Vec::new();
            if let Some(id) = token_id {
                lines.push(format!("📄 Invoice #{id}"));
            }
            lines.push(format!("👤 Customer: {customer_name}"));
            lines.push(format!("💵 Amount: {} USDC", invoice_amount.display(2)));
            lines.push(format!("🎁 Grant: {} USDC", grant.to_fixed(2)));
            lines.push(format!("🔒 Collateral: {} USDC", collateral.to_fixed(2)));
            lines
        }
        SuccessPayload::Deposited {
            vault,
            amount,
            shares_received,
            apy,
            estimated_annual_yield,
        } => {
            let mut lines = vec![
                format!("🏦 Vault: {}", vault.display_name()),
                format!("💵 Deposited: {} USDC", amount.display(2)),
            ];
            if let Some(shares) = shares_received {
                lines.push(format!("🎟️  Shares received: {}", shares.display(6)));
            }
            lines.push(format!("📈 APY: {apy}"));
            lines.push(format!(
                "🌱 Estimated annual yield: {} USDC",
                estimated_annual_yield.to_fixed(2)
            ));
            lines
        }
        SuccessPayload::Withdrawn { vault, amount } => vec![
            format!("🏦 Vault: {}", vault.display_name()),
            format!("💵 Withdrawn: {} USDC", amount.display(2)),
        ],
        SuccessPayload::Settled {
            token_id,
            collateral_returned,
        } => vec![
            format!("📄 Invoice #{token_id} settled"),
            format!("🔓 Collateral returned: {} USDC", collateral_returned.to_fixed(2)),
        ],
        SuccessPayload::Liquidated {
            token_id,
            collateral_seized,
        } => vec![
            format!("📄 Invoice #{token_id} liquidated"),
            format!("⚠️  Collateral seized: {} USDC", collateral_seized.to_fixed(2)),
        ],
        SuccessPayload::YieldClaimed { amount } => {
            vec![format!("💰 Claimed: {} USDC", amount.to_fixed(2))]
        }
        SuccessPayload::Harvested { vault, breakdown } => vec![
            format!("🌾 Harvested {} USDC from {}", breakdown.total.to_fixed(2), vault.display_name()),
            format!("   👥 Investors: {} USDC", breakdown.investors.to_fixed(2)),
            format!("   🌍 Public goods: {} USDC", breakdown.public_goods.to_fixed(2)),
            format!("   🏛️  Protocol: {} USDC", breakdown.protocol_fee.to_fixed(2)),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::VaultKind;

    #[test]
    fn invoice_payload_lines_show_grant_with_two_decimals() {
        let lines = describe_payload(&SuccessPayload::InvoiceSubmitted {
            customer_name: "Acme".into(),
            invoice_amount: Usdc::from_whole(100),
            grant: Usdc::from_whole(3),
            collateral: Usdc::from_whole(10),
            token_id: Some(3),
        });
        assert!(lines.contains(&"🎁 Grant: 3.00 USDC".to_string()));
        assert_eq!(lines[0], "📄 Invoice #3");
    }

    #[test]
    fn withdraw_payload_names_the_vault() {
        let lines = describe_payload(&SuccessPayload::Withdrawn {
            vault: VaultKind::Morpho,
            amount: Usdc::from_units(12_500_000),
        });
        assert_eq!(lines, vec!["🏦 Vault: Morpho", "💵 Withdrawn: 12.5 USDC"]);
    }
}
