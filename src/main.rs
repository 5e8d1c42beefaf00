use anyhow::{anyhow, Result};
use clap::Parser;

use aruna_flow::cli::commands::donations::DonationsCommand;
use aruna_flow::cli::commands::invoice::{
    ListInvoicesCommand, LiquidateInvoiceCommand, SettleInvoiceCommand, SubmitInvoiceCommand,
};
use aruna_flow::cli::commands::status::StatusCommand;
use aruna_flow::cli::commands::vault::{DepositCommand, PositionCommand, WithdrawCommand};
use aruna_flow::cli::commands::yields::{ClaimYieldCommand, HarvestCommand};
use aruna_flow::cli::commands::{Session, SessionOptions};
use aruna_flow::cli::{Cli, Commands, InvoiceAction, VaultAction, YieldAction};
use aruna_flow::config::{config, ArunaConfig};
use aruna_flow::protocol::Usdc;
use aruna_flow::telemetry::init_telemetry;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut aruna_config = match &cli.config {
        Some(path) => ArunaConfig::load_from(path)?,
        None => config()?.clone(),
    };
    if !cli.verbose {
        // Keep command output readable unless asked for the flow logs
        aruna_config.observability.log_level = "warn".to_string();
    }
    init_telemetry(&aruna_config.observability)?;

    let options = SessionOptions {
        balance: cli
            .balance
            .trim()
            .parse::<Usdc>()
            .map_err(|e| anyhow!("Invalid --balance '{}': {}", cli.balance, e))?,
        reject_approval: cli.reject_approval,
        disconnected: cli.disconnected,
        json: cli.json,
    };

    tokio::runtime::Runtime::new()?.block_on(async move {
        match cli.command {
            // Default behavior: no subcommand, show where things stand
            None | Some(Commands::Status) => {
                let session = Session::open(&options, aruna_config).await?;
                StatusCommand.execute(&session).await
            }
            Some(Commands::Invoice { action }) => {
                let mut session = Session::open(&options, aruna_config).await?;
                match action {
                    InvoiceAction::Submit {
                        customer,
                        amount,
                        due_date,
                        description,
                    } => {
                        SubmitInvoiceCommand::new(customer, amount, due_date)
                            .with_description(description)
                            .execute(&mut session)
                            .await
                    }
                    InvoiceAction::Settle { token_id } => {
                        SettleInvoiceCommand::new(token_id).execute(&mut session).await
                    }
                    InvoiceAction::Liquidate { token_id } => {
                        LiquidateInvoiceCommand::new(token_id)
                            .execute(&mut session)
                            .await
                    }
                    InvoiceAction::List => ListInvoicesCommand.execute(&session).await,
                }
            }
            Some(Commands::Vault { action }) => {
                let mut session = Session::open(&options, aruna_config).await?;
                match action {
                    VaultAction::Deposit { vault, amount } => {
                        DepositCommand::new(vault, amount).execute(&mut session).await
                    }
                    VaultAction::Withdraw { vault, amount } => {
                        WithdrawCommand::new(vault, amount).execute(&mut session).await
                    }
                    VaultAction::Position => PositionCommand.execute(&session).await,
                }
            }
            Some(Commands::Yield { action }) => {
                let mut session = Session::open(&options, aruna_config).await?;
                match action {
                    YieldAction::Claim => ClaimYieldCommand.execute(&mut session).await,
                    YieldAction::Harvest { vault, accrued } => {
                        HarvestCommand::new(vault)
                            .with_accrued(accrued)
                            .execute(&mut session)
                            .await
                    }
                }
            }
            Some(Commands::Donations) => {
                let session = Session::open(&options, aruna_config).await?;
                DonationsCommand.execute(&session).await
            }
        }
    })
}
