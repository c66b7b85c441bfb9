//! Deserializable run configuration.

use serde::Deserialize;

/// Per-LST genesis parameters: seed reserves for its three AMMs, PSM fee
/// schedule, Vault reserve split, and rebasing yield rate.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub symbol: String,
    pub expiry_block: u64,

    pub initial_eth_reserve: f64,
    pub initial_lst_reserve: f64,
    pub initial_ct_eth_reserve: f64,
    pub initial_ct_reserve: f64,
    pub initial_ds_eth_reserve: f64,
    pub initial_ds_reserve: f64,

    pub lst_amm_fee: f64,
    pub ct_amm_fee: f64,
    pub ds_amm_fee: f64,
    pub ct_discount_rate: f64,
    pub ds_discount_rate: f64,

    pub psm_redemption_fee: f64,
    pub psm_repurchase_fee: f64,

    pub vault_reserve_ct_ratio: f64,

    /// Fractional rebase applied to every wallet's balance of this LST
    /// (and the LST/ETH pool's token reserve) each block.
    pub yield_per_block: f64,
    /// Starting LST balance minted to every registered agent.
    pub initial_agent_balance: f64,
}

/// Top-level engine configuration: run length, global ETH yield, RNG seed,
/// the registered tokens, and an optional event schedule file.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub num_blocks: u64,
    pub eth_yield_per_block: f64,
    pub seed: u64,
    pub tokens: Vec<TokenConfig>,
    #[serde(default)]
    pub events_path: Option<String>,
}

impl EngineConfig {
    pub fn from_json(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("reading config {}: {e}", path.as_ref().display()))?;
        serde_json::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("parsing config {}: {e}", path.as_ref().display()))
    }

    /// Convenience single-LST scenario for the CLI's `run`/`monte-carlo`
    /// commands when no `--scenario` file is given.
    pub fn single_token(symbol: impl Into<String>, num_blocks: u64, expiry_block: Option<u64>, seed: u64, eth_yield_per_block: f64) -> Self {
        let symbol = symbol.into();
        let expiry_block = expiry_block.unwrap_or(num_blocks);
        Self {
            num_blocks,
            eth_yield_per_block,
            seed,
            tokens: vec![TokenConfig {
                symbol,
                expiry_block,
                initial_eth_reserve: 1_000_000.0,
                initial_lst_reserve: 1_000_000.0,
                initial_ct_eth_reserve: 500_000.0,
                initial_ct_reserve: 500_000.0,
                initial_ds_eth_reserve: 200_000.0,
                initial_ds_reserve: 500_000.0,
                lst_amm_fee: 0.003,
                ct_amm_fee: 0.003,
                ds_amm_fee: 0.003,
                ct_discount_rate: 0.05,
                ds_discount_rate: 0.05,
                psm_redemption_fee: 0.001,
                psm_repurchase_fee: 0.05,
                vault_reserve_ct_ratio: 0.4,
                yield_per_block: 0.0001,
                initial_agent_balance: 0.0,
            }],
            events_path: None,
        }
    }
}
