//! Tidy per-block time series recorded over the course of a run, plus the
//! flat trade/action logs: one row per entity per block.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::engine::Engine;

#[derive(Debug, Clone, Serialize)]
pub struct AgentSnapshot {
    pub block: u64,
    pub wallet: String,
    pub strategy: String,
    pub eth: f64,
    pub tokens: BTreeMap<String, f64>,
}

/// One registered LST's rebase/expiry configuration for a given block.
/// Separate from `AmmSnapshot` since a token's `yield_per_block` is a
/// property of the token registry, not of any one pool.
#[derive(Debug, Clone, Serialize)]
pub struct TokenSnapshot {
    pub block: u64,
    pub symbol: String,
    pub yield_per_block: f64,
    pub expiry_block: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AmmSnapshot {
    pub block: u64,
    pub symbol: String,
    pub reserve_eth: f64,
    pub reserve_token: f64,
    pub price_eth: f64,
    pub total_lp_shares: f64,
    pub fee_ledger_eth: f64,
    pub fee_ledger_token: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PsmSnapshot {
    pub block: u64,
    pub symbol: String,
    pub eth_reserve: f64,
    pub token_reserve: f64,
    pub total_redemption_fee: f64,
    pub total_repurchase_fee: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct VaultSnapshot {
    pub block: u64,
    pub symbol: String,
    pub lp_token_supply: f64,
    pub lp_token_price: f64,
}

/// Total outstanding ETH borrow across all wallets, for one block. Kept as
/// its own series, separate from `borrowed_tokens`, since the two ledgers
/// on `Engine` are independent maps with independent invariants.
#[derive(Debug, Clone, Serialize)]
pub struct BorrowedEthSnapshot {
    pub block: u64,
    pub amount: f64,
}

/// Total outstanding borrow per token symbol across all wallets, for one
/// block.
#[derive(Debug, Clone, Serialize)]
pub struct BorrowedTokenSnapshot {
    pub block: u64,
    pub by_symbol: BTreeMap<String, f64>,
}

/// One completed swap/mint/redeem/flash-routine, flattened for export.
#[derive(Debug, Clone, Serialize)]
pub struct TradeRecord {
    pub block: u64,
    pub wallet: String,
    pub action: String,
    pub token: String,
    pub amount_in: f64,
    pub amount_out: f64,
}

/// The six tidy per-block series, plus the flat trade log.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatsRecorder {
    pub agents: Vec<AgentSnapshot>,
    pub tokens: Vec<TokenSnapshot>,
    pub amms: Vec<AmmSnapshot>,
    pub psms: Vec<PsmSnapshot>,
    pub vaults: Vec<VaultSnapshot>,
    pub borrowed_eth: Vec<BorrowedEthSnapshot>,
    pub borrowed_tokens: Vec<BorrowedTokenSnapshot>,
    pub trades: Vec<TradeRecord>,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_trade(&mut self, record: TradeRecord) {
        self.trades.push(record);
    }

    /// Snapshot every entity at the end of `block`.
    pub fn record(&mut self, block: u64, engine: &Engine) {
        for (wallet_id, owner, strategy) in engine.agent_wallets() {
            let wallet = engine.wallet(wallet_id);
            self.agents.push(AgentSnapshot {
                block,
                wallet: owner,
                strategy,
                eth: wallet.eth,
                tokens: wallet.token_balances.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            });
        }

        for symbol in engine.token_symbols() {
            self.tokens.push(TokenSnapshot {
                block,
                yield_per_block: engine.token_yield(&symbol),
                expiry_block: engine.token_expiry(&symbol).unwrap_or(0),
                symbol,
            });
        }

        for (symbol, amm) in engine.amms_iter() {
            self.amms.push(AmmSnapshot {
                block,
                symbol: symbol.clone(),
                reserve_eth: amm.reserve_eth,
                reserve_token: amm.reserve_token,
                price_eth: amm.price_of_one_token_in_eth(),
                total_lp_shares: amm.total_lp_shares,
                fee_ledger_eth: amm.fee_ledger_eth,
                fee_ledger_token: amm.fee_ledger_token,
            });
        }

        for (symbol, psm) in engine.psms_iter() {
            self.psms.push(PsmSnapshot {
                block,
                symbol: symbol.clone(),
                eth_reserve: psm.eth_reserve,
                token_reserve: psm.token_reserve,
                total_redemption_fee: psm.total_redemption_fee,
                total_repurchase_fee: psm.total_repurchase_fee,
            });
        }

        let vault_symbols: Vec<String> = engine.vaults_iter().map(|(s, _)| s.clone()).collect();
        for symbol in vault_symbols {
            let supply = engine.vaults_iter().find(|(s, _)| *s == &symbol).map(|(_, v)| v.lp_token_supply).unwrap_or(0.0);
            let price = crate::vault::get_lp_token_price(engine, &symbol).unwrap_or(0.0);
            self.vaults.push(VaultSnapshot {
                block,
                symbol,
                lp_token_supply: supply,
                lp_token_price: price,
            });
        }

        self.borrowed_eth.push(BorrowedEthSnapshot {
            block,
            amount: engine.total_outstanding_eth_debt(),
        });
        self.borrowed_tokens.push(BorrowedTokenSnapshot {
            block,
            by_symbol: engine.total_outstanding_token_debt_by_symbol(),
        });
    }
}
