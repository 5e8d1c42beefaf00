use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::protocol::{TokenId, VaultKind};

pub mod commands;

#[derive(Parser)]
#[command(name = "aruna")]
#[command(about = "Run Aruna invoice and vault transactions against a simulated chain")]
#[command(long_about = "Aruna lets businesses commit invoices for instant grants and lets investors \
                       deposit into yield vaults that fund public goods. This tool walks each transaction \
                       through the approve / confirm / pending / success flow against an in-memory chain \
                       seeded with a demo account.")]
pub struct Cli {
    /// Starting USDC balance of the demo wallet
    #[arg(long, global = true, default_value = "10000", help = "Starting USDC balance of the demo wallet")]
    pub balance: String,

    /// Refuse every token approval in the wallet
    #[arg(long, global = true, help = "Simulate the user rejecting every approval request")]
    pub reject_approval: bool,

    /// Run without a connected wallet
    #[arg(long, global = true, help = "Simulate a wallet that is not connected")]
    pub disconnected: bool,

    /// Print machine-readable output
    #[arg(long, global = true, help = "Print results as JSON")]
    pub json: bool,

    /// Configuration file to use instead of aruna.toml / environment
    #[arg(long, global = true, help = "Path to a TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Show flow logs on stderr
    #[arg(short, long, global = true, help = "Show transaction flow logs on stderr")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show wallet balance, invoices, vault positions and donations
    Status,
    /// Business invoice commitments
    Invoice {
        #[command(subcommand)]
        action: InvoiceAction,
    },
    /// Investor vault deposits and withdrawals
    Vault {
        #[command(subcommand)]
        action: VaultAction,
    },
    /// Yield claiming and harvesting
    Yield {
        #[command(subcommand)]
        action: YieldAction,
    },
    /// Public goods funding totals
    Donations,
}

#[derive(Subcommand)]
pub enum InvoiceAction {
    /// Commit an invoice and receive the instant grant
    Submit {
        #[arg(long, help = "Name of the customer being invoiced")]
        customer: String,
        #[arg(long, help = "Invoice amount in USDC, e.g. 2500 or 99.5")]
        amount: String,
        #[arg(long, help = "Due date as YYYY-MM-DD; must be in the future")]
        due_date: String,
        #[arg(long, help = "Free-form description kept with the form")]
        description: Option<String>,
    },
    /// Settle an invoice once the customer has paid
    Settle {
        #[arg(help = "Invoice token id")]
        token_id: TokenId,
    },
    /// Liquidate an overdue invoice
    Liquidate {
        #[arg(help = "Invoice token id")]
        token_id: TokenId,
    },
    /// List the account's invoices
    List,
}

#[derive(Subcommand)]
pub enum VaultAction {
    /// Deposit USDC into a vault
    Deposit {
        #[arg(help = "Vault: aave or morpho")]
        vault: VaultKind,
        #[arg(help = "Amount in USDC")]
        amount: String,
    },
    /// Withdraw USDC from a vault
    Withdraw {
        #[arg(help = "Vault: aave or morpho")]
        vault: VaultKind,
        #[arg(help = "Amount in USDC")]
        amount: String,
    },
    /// Show positions in every vault
    Position,
}

#[derive(Subcommand)]
pub enum YieldAction {
    /// Claim distributed investor yield
    Claim,
    /// Harvest a vault and split the yield
    Harvest {
        #[arg(help = "Vault: aave or morpho")]
        vault: VaultKind,
        #[arg(long, help = "Extra yield (USDC) to accrue in the vault before harvesting")]
        accrued: Option<String>,
    },
}
