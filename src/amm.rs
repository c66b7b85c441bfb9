//! Constant-product and YieldSpace automated market makers.
//!
//! Modeled as a tagged variant (`AmmKind`) sharing one reserve/fee/LP-share
//! struct (`Amm`) rather than a trait-object hierarchy per curve type.

use std::collections::BTreeMap;

use crate::error::SimError;
use crate::wallet::Wallet;

/// Swap direction, used by `expected_out` / `slippage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapDirection {
    EthToToken,
    TokenToEth,
}

/// The two supported pricing curves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AmmKind {
    /// UniswapV2-style constant product: `x * y = k`.
    ConstantProduct,
    /// Time-decaying curve used for CT/DS pools. `discount_rate` is the
    /// `d` term in `R^(1-d)` / `R^(1+d)`.
    YieldSpace { discount_rate: f64 },
}

/// One automated market maker pool, `symbol`/ETH.
#[derive(Debug, Clone)]
pub struct Amm {
    pub symbol: String,
    pub kind: AmmKind,
    pub reserve_eth: f64,
    pub reserve_token: f64,
    pub total_lp_shares: f64,
    /// Swap fee as a fraction, e.g. 0.003 for 30 bps.
    pub fee: f64,
    pub lp_holders: std::collections::HashMap<crate::wallet::WalletId, f64>,

    pub fee_ledger_eth: f64,
    pub fee_ledger_token: f64,
    fee_by_block_eth: BTreeMap<u64, f64>,
    fee_by_block_token: BTreeMap<u64, f64>,
}

impl Amm {
    pub fn new(symbol: impl Into<String>, kind: AmmKind, reserve_eth: f64, reserve_token: f64, fee: f64) -> Self {
        Self {
            symbol: symbol.into(),
            kind,
            reserve_eth,
            reserve_token,
            total_lp_shares: 0.0,
            fee,
            lp_holders: std::collections::HashMap::new(),
            fee_ledger_eth: 0.0,
            fee_ledger_token: 0.0,
            fee_by_block_eth: BTreeMap::new(),
            fee_by_block_token: BTreeMap::new(),
        }
    }

    fn require_reserves(&self) -> Result<(), SimError> {
        if self.reserve_eth <= 0.0 || self.reserve_token <= 0.0 {
            return Err(SimError::EmptyPool(self.symbol.clone()));
        }
        Ok(())
    }

    /// Raw AMM math: output amount for `amount_in` (already fee-adjusted)
    /// swapped from `reserve_in` into `reserve_out`.
    fn curve_out(&self, amount_in_with_fee: f64, reserve_in: f64, reserve_out: f64) -> f64 {
        match self.kind {
            AmmKind::ConstantProduct => {
                (amount_in_with_fee * reserve_out) / (reserve_in + amount_in_with_fee)
            }
            AmmKind::YieldSpace { discount_rate } => {
                let adj_in = reserve_in.powf(1.0 - discount_rate);
                let adj_out = reserve_out.powf(1.0 + discount_rate);
                adj_out - (adj_in * adj_out) / (adj_in + amount_in_with_fee)
            }
        }
    }

    /// Spot price of one token in ETH.
    pub fn price_of_one_token_in_eth(&self) -> f64 {
        let base = self.reserve_eth / self.reserve_token;
        match self.kind {
            AmmKind::ConstantProduct => base,
            AmmKind::YieldSpace { discount_rate } => base * (1.0 - discount_rate),
        }
    }

    pub fn expected_out(&self, amount_in: f64, direction: SwapDirection) -> Result<f64, SimError> {
        if amount_in <= 0.0 {
            return Err(SimError::BadAmount(amount_in));
        }
        self.require_reserves()?;
        let (reserve_in, reserve_out) = match direction {
            SwapDirection::EthToToken => (self.reserve_eth, self.reserve_token),
            SwapDirection::TokenToEth => (self.reserve_token, self.reserve_eth),
        };
        let amount_in_with_fee = amount_in * (1.0 - self.fee);
        Ok(self.curve_out(amount_in_with_fee, reserve_in, reserve_out))
    }

    /// Fractional slippage relative to swapping at the current spot price.
    pub fn slippage(&self, amount_in: f64, direction: SwapDirection) -> Result<f64, SimError> {
        let spot = self.price_of_one_token_in_eth();
        let price_for_direction = match direction {
            SwapDirection::EthToToken => 1.0 / spot,
            SwapDirection::TokenToEth => spot,
        };
        let expected_at_spot = amount_in * (1.0 - self.fee) * price_for_direction;
        let actual = self.expected_out(amount_in, direction)?;
        if expected_at_spot == 0.0 {
            return Ok(0.0);
        }
        Ok((expected_at_spot - actual) / expected_at_spot)
    }

    pub fn add_liquidity(
        &mut self,
        wallet_id: crate::wallet::WalletId,
        wallet: &mut Wallet,
        amount_eth: f64,
        amount_token: f64,
    ) -> Result<f64, SimError> {
        if amount_eth <= 0.0 || amount_token <= 0.0 {
            return Err(SimError::BadAmount(amount_eth.min(amount_token)));
        }
        wallet.withdraw_eth(amount_eth)?;
        wallet.withdraw_token(&self.symbol, amount_token)?;

        let shares = if self.total_lp_shares == 0.0 {
            (amount_eth * amount_token).sqrt()
        } else {
            (amount_eth / self.reserve_eth).min(amount_token / self.reserve_token) * self.total_lp_shares
        };

        self.reserve_eth += amount_eth;
        self.reserve_token += amount_token;
        self.total_lp_shares += shares;
        *self.lp_holders.entry(wallet_id).or_insert(0.0) += shares;
        wallet.deposit_lp(&self.symbol, shares)?;
        Ok(shares)
    }

    pub fn remove_liquidity(
        &mut self,
        wallet_id: crate::wallet::WalletId,
        wallet: &mut Wallet,
        shares: f64,
    ) -> Result<(f64, f64), SimError> {
        if shares <= 0.0 {
            return Err(SimError::BadAmount(shares));
        }
        if self.total_lp_shares <= 0.0 {
            return Err(SimError::EmptyPool(self.symbol.clone()));
        }
        let frac = shares / self.total_lp_shares;
        let out_eth = frac * self.reserve_eth;
        let out_token = frac * self.reserve_token;

        wallet.withdraw_lp(&self.symbol, shares)?;
        self.reserve_eth -= out_eth;
        self.reserve_token -= out_token;
        self.total_lp_shares -= shares;
        if let Some(h) = self.lp_holders.get_mut(&wallet_id) {
            *h -= shares;
        }

        wallet.deposit_eth(out_eth)?;
        wallet.deposit_token(&self.symbol, out_token)?;
        Ok((out_eth, out_token))
    }

    pub fn swap_eth_for_token(
        &mut self,
        wallet: &mut Wallet,
        amount_eth: f64,
        current_block: u64,
    ) -> Result<f64, SimError> {
        if amount_eth <= 0.0 {
            return Err(SimError::BadAmount(amount_eth));
        }
        self.require_reserves()?;
        let amount_out = self.expected_out(amount_eth, SwapDirection::EthToToken)?;

        wallet.withdraw_eth(amount_eth)?;
        wallet.deposit_token(&self.symbol, amount_out)?;

        self.reserve_eth += amount_eth;
        self.reserve_token -= amount_out;

        let fee = amount_eth * self.fee;
        self.fee_ledger_eth += fee;
        *self.fee_by_block_eth.entry(current_block).or_insert(0.0) += fee;
        Ok(amount_out)
    }

    pub fn swap_token_for_eth(
        &mut self,
        wallet: &mut Wallet,
        amount_token: f64,
        current_block: u64,
    ) -> Result<f64, SimError> {
        if amount_token <= 0.0 {
            return Err(SimError::BadAmount(amount_token));
        }
        self.require_reserves()?;
        let amount_out = self.expected_out(amount_token, SwapDirection::TokenToEth)?;

        wallet.withdraw_token(&self.symbol, amount_token)?;
        wallet.deposit_eth(amount_out)?;

        self.reserve_token += amount_token;
        self.reserve_eth -= amount_out;

        let fee = amount_token * self.fee;
        self.fee_ledger_token += fee;
        *self.fee_by_block_token.entry(current_block).or_insert(0.0) += fee;
        Ok(amount_out)
    }

    /// Sum of ETH-side fees accrued in `[start, end]` (inclusive).
    pub fn eth_fees_between(&self, start: u64, end: u64) -> f64 {
        self.fee_by_block_eth.range(start..=end).map(|(_, v)| v).sum()
    }

    pub fn token_fees_between(&self, start: u64, end: u64) -> f64 {
        self.fee_by_block_token.range(start..=end).map(|(_, v)| v).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::WalletId;

    fn cp_pool(e: f64, t: f64, fee: f64) -> Amm {
        Amm::new("X", AmmKind::ConstantProduct, e, t, fee)
    }

    #[test]
    fn first_liquidity_mints_geometric_mean() {
        let mut pool = cp_pool(0.0, 0.0, 0.0);
        let mut w = Wallet::new("lp");
        w.deposit_eth(100.0).unwrap();
        w.deposit_token("X", 400.0).unwrap();
        let shares = pool.add_liquidity(WalletId(0), &mut w, 100.0, 400.0).unwrap();
        assert!((shares - (100.0_f64 * 400.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn cp_swap_preserves_k_after_fee_retained() {
        let mut pool = cp_pool(1_000_000.0, 1_000_000.0, 0.003);
        let mut w = Wallet::new("trader");
        w.deposit_eth(1_000.0).unwrap();
        let k_before = pool.reserve_eth * pool.reserve_token;
        pool.swap_eth_for_token(&mut w, 1_000.0, 1).unwrap();
        let k_after = pool.reserve_eth * pool.reserve_token;
        assert!(k_after >= k_before);
    }

    #[test]
    fn zero_fee_cp_price_matches_spot_after_small_swap() {
        let mut pool = cp_pool(1_000_000.0, 1_000_000.0, 0.0);
        assert!((pool.price_of_one_token_in_eth() - 1.0).abs() < 1e-9);
        let mut w = Wallet::new("trader");
        w.deposit_eth(10.0).unwrap();
        pool.swap_eth_for_token(&mut w, 10.0, 1).unwrap();
        assert!((pool.price_of_one_token_in_eth() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn add_then_remove_liquidity_round_trips() {
        let mut pool = cp_pool(0.0, 0.0, 0.0);
        let mut w = Wallet::new("lp");
        w.deposit_eth(100.0).unwrap();
        w.deposit_token("X", 100.0).unwrap();
        let shares = pool.add_liquidity(WalletId(0), &mut w, 100.0, 100.0).unwrap();
        let (eth_out, tok_out) = pool.remove_liquidity(WalletId(0), &mut w, shares).unwrap();
        assert!((eth_out - 100.0).abs() < 1e-9);
        assert!((tok_out - 100.0).abs() < 1e-9);
    }

    #[test]
    fn empty_pool_rejects_swap() {
        let mut pool = cp_pool(0.0, 0.0, 0.0);
        let mut w = Wallet::new("trader");
        w.deposit_eth(1.0).unwrap();
        assert!(matches!(
            pool.swap_eth_for_token(&mut w, 1.0, 1).unwrap_err(),
            SimError::EmptyPool(_)
        ));
    }

    #[test]
    fn negative_amount_is_bad_amount() {
        let mut pool = cp_pool(100.0, 100.0, 0.0);
        let mut w = Wallet::new("trader");
        assert!(matches!(
            pool.swap_eth_for_token(&mut w, -1.0, 1).unwrap_err(),
            SimError::BadAmount(_)
        ));
    }

    #[test]
    fn yield_space_price_applies_discount() {
        let pool = Amm::new(
            "CT_X",
            AmmKind::YieldSpace { discount_rate: 0.1 },
            90.0,
            100.0,
            0.003,
        );
        let price = pool.price_of_one_token_in_eth();
        assert!((price - 0.9 * 0.9).abs() < 1e-9);
    }
}
