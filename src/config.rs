use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::protocol::address::{Address, BASE_SEPOLIA_CHAIN_ID};
use crate::protocol::Usdc;

/// Main configuration structure for the Aruna client
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ArunaConfig {
    /// Network the client talks to
    pub chain: ChainConfig,
    /// Deployed contract addresses
    pub contracts: ContractAddresses,
    /// Preview percentages used before the chain reports real figures
    pub protocol: ProtocolConfig,
    /// Vault presentation settings
    pub vaults: VaultsConfig,
    /// Transaction flow timing
    pub flow: FlowConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainConfig {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    pub block_explorer: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContractAddresses {
    pub aruna_core: Address,
    pub aave_vault: Address,
    pub morpho_vault: Address,
    pub yield_router: Address,
    pub octant_module: Address,
    pub usdc: Address,
}

/// All percentages are basis points (1% = 100)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Instant grant paid against an invoice
    pub grant_bps: u32,
    /// Collateral the business deposits when committing an invoice
    pub collateral_bps: u32,
    /// Share of harvested yield routed to public goods
    pub public_goods_bps: u32,
    /// Share of harvested yield paid to investors
    pub investor_bps: u32,
    /// Share of harvested yield kept by the protocol treasury
    pub protocol_fee_bps: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VaultsConfig {
    pub aave_apy_bps: u32,
    pub morpho_apy_bps: u32,
    /// Minimum deposit in USDC; zero disables the check
    pub min_deposit: Usdc,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Delay before re-reading chain state after a successful transaction
    pub refresh_delay_ms: u64,
    /// Upper bound on waiting for a receipt before reporting a timeout
    pub receipt_timeout_secs: u64,
    /// How long polled reads stay cached
    pub read_cache_ttl_secs: u64,
    /// Unclassified provider errors are cut to this many characters
    pub error_message_limit: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level used when RUST_LOG is unset
    pub log_level: String,
    /// Emit JSON lines instead of human-readable output
    pub json_logs: bool,
}

fn address(literal: &str) -> Address {
    literal.parse().unwrap_or_else(|_| Address::zero())
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            name: "Base Sepolia".to_string(),
            chain_id: BASE_SEPOLIA_CHAIN_ID,
            rpc_url: "https://sepolia.base.org".to_string(),
            block_explorer: "https://sepolia.basescan.org".to_string(),
        }
    }
}

impl Default for ContractAddresses {
    fn default() -> Self {
        // Base Sepolia deployment
        Self {
            aruna_core: address("0x5ee04F6377e03b47F5e932968e87ad5599664Cf2"),
            aave_vault: address("0x8E9F6B3230800B781e461fce5F7F118152FeD969"),
            morpho_vault: address("0xc4388Fe5A3057eE1fc342a8018015f32f6aF6A7d"),
            yield_router: address("0x9721ee37de0F289A99f8EA2585293575AE2654CC"),
            octant_module: address("0xB745282F0FCe7a669F9EbD50B403e895090b1b24"),
            usdc: address("0x036CbD53842c5426634e7929541eC2318f3dCF7e"),
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            grant_bps: 300,
            collateral_bps: 1_000,
            public_goods_bps: 2_500,
            investor_bps: 7_000,
            protocol_fee_bps: 500,
        }
    }
}

impl Default for VaultsConfig {
    fn default() -> Self {
        Self {
            aave_apy_bps: 650,
            morpho_apy_bps: 820,
            min_deposit: Usdc::ZERO,
        }
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            refresh_delay_ms: 2_000,
            receipt_timeout_secs: 120,
            read_cache_ttl_secs: 15,
            error_message_limit: 200,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: true,
        }
    }
}

impl ArunaConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (aruna.toml, .aruna-rc)
    /// 3. Environment variables (prefixed with ARUNA_, `__` between sections)
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder();

        if Path::new("aruna.toml").exists() {
            builder = builder.add_source(File::with_name("aruna"));
        }

        if Path::new(".aruna-rc").exists() {
            builder = builder.add_source(File::with_name(".aruna-rc").format(config::FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("ARUNA")
                .separator("__")
                .try_parsing(true),
        );

        let mut aruna_config: ArunaConfig = builder
            .build()?
            .try_deserialize()
            .context("Invalid Aruna configuration")?;

        // Plain RPC override used by deployment scripts
        if let Ok(rpc_url) = std::env::var("ARUNA_RPC_URL") {
            aruna_config.chain.rpc_url = rpc_url;
        }

        Ok(aruna_config)
    }

    /// Load a single TOML file on top of the defaults
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config = Config::builder()
            .add_source(File::from(path).format(config::FileFormat::Toml))
            .build()
            .with_context(|| format!("Failed to read {}", path.display()))?;
        config
            .try_deserialize()
            .with_context(|| format!("Invalid Aruna configuration in {}", path.display()))
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<ArunaConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = ArunaConfig::load_env_file();
        ArunaConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static ArunaConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}
