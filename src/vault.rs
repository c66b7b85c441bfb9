//! Vault: recursive ETH->CT/DS conversion and the DS flash-loan routines.
//!
//! The Vault's state lives inside `Engine::vaults`, but every operation
//! that moves value also touches the PSM, one or more AMMs, the Vault's
//! own wallet, and the borrow ledger — all of which are likewise owned by
//! `Engine`. A `&mut self` method on `Vault` that also needed `&mut Engine`
//! would alias `engine.vaults`. So these routines are free functions
//! taking `&mut Engine` instead: short-lived borrows of `Vault`'s
//! scalar config are copied out, the heavy lifting runs through Engine's
//! disjoint-field accessors, and the Vault's mutable ledger (LP supply,
//! LP holders) is written back through a final `engine.vault_mut(..)`.

use std::collections::HashMap;

use crate::amm::{Amm, SwapDirection};
use crate::engine::Engine;
use crate::error::{SimError, SimResult};
use crate::psm::Psm;
use crate::wallet::{Wallet, WalletId};

/// Minimum ETH remaining before `recursive_conversion` stops splitting.
const CONVERSION_DUST: f64 = 0.01;

#[derive(Debug, Clone)]
pub struct Vault {
    pub token_symbol: String,
    /// Fraction of each conversion pass routed straight to the PSM for CT
    /// reserve backing, rest goes to topping up the CT/ETH pool.
    pub reserve_ct_ratio: f64,
    pub wallet_id: WalletId,
    pub lp_token_supply: f64,
    pub lp_holders: HashMap<WalletId, f64>,
}

impl Vault {
    pub fn new(token_symbol: impl Into<String>, reserve_ct_ratio: f64, wallet_id: WalletId) -> Self {
        Self {
            token_symbol: token_symbol.into(),
            reserve_ct_ratio,
            wallet_id,
            lp_token_supply: 0.0,
            lp_holders: HashMap::new(),
        }
    }

    pub fn ct_symbol(&self) -> String {
        format!("CT_{}", self.token_symbol)
    }

    pub fn ds_symbol(&self) -> String {
        format!("DS_{}", self.token_symbol)
    }

    pub fn lp_symbol(&self) -> String {
        format!("V_{}", self.token_symbol)
    }
}

/// Deposit ETH, recursively convert it into CT/ETH liquidity plus PSM
/// reserve backing, and mint the depositor's LP share.
pub fn deposit_eth(engine: &mut Engine, lst_symbol: &str, investor: WalletId, amount_eth: f64) -> SimResult<()> {
    if amount_eth <= 0.0 {
        return Err(SimError::BadAmount(amount_eth));
    }
    let vault_wallet = vault_wallet_id(engine, lst_symbol)?;
    engine.wallet_withdraw_eth(investor, amount_eth)?;
    engine.wallet_deposit_eth(vault_wallet, amount_eth)?;

    recursive_conversion(engine, lst_symbol, amount_eth)?;
    issue_lp_tokens(engine, lst_symbol, investor, amount_eth)?;
    Ok(())
}

fn recursive_conversion(engine: &mut Engine, lst_symbol: &str, mut amount_eth: f64) -> SimResult<()> {
    let (vault_wallet, reserve_ct_ratio) = {
        let vault = engine.vault(lst_symbol).ok_or_else(|| SimError::UnknownToken(lst_symbol.to_string()))?;
        (vault.wallet_id, vault.reserve_ct_ratio)
    };
    let ct_symbol = format!("CT_{lst_symbol}");
    let ds_symbol = format!("DS_{lst_symbol}");

    while amount_eth >= CONVERSION_DUST {
        let reserve_ct = amount_eth * reserve_ct_ratio;
        engine.psm_deposit_eth(lst_symbol, vault_wallet, reserve_ct)?;
        let mut ds_tokens = reserve_ct;

        let remainder_eth = amount_eth - reserve_ct;
        if remainder_eth > 1e-12 {
            let (ct_reserve, ct_eth_reserve) = {
                let pool = engine.amm(&ct_symbol).ok_or_else(|| SimError::UnknownToken(ct_symbol.clone()))?;
                (pool.reserve_token, pool.reserve_eth)
            };
            let share_of_ct = ct_reserve / (ct_reserve + ct_eth_reserve);
            let share_of_eth = 1.0 - share_of_ct;

            let eth_for_amm = remainder_eth * share_of_eth;
            let ct_for_amm = remainder_eth - eth_for_amm;

            engine.psm_deposit_eth(lst_symbol, vault_wallet, ct_for_amm)?;
            engine.amm_add_liquidity(&ct_symbol, vault_wallet, eth_for_amm, ct_for_amm)?;
            ds_tokens += ct_for_amm;
        }

        amount_eth = if ds_tokens > 0.0 {
            let block = engine.current_block;
            engine.amm_swap_token_for_eth(&ds_symbol, vault_wallet, ds_tokens, block)?
        } else {
            0.0
        };
    }
    Ok(())
}

fn issue_lp_tokens(engine: &mut Engine, lst_symbol: &str, investor: WalletId, amount_eth: f64) -> SimResult<()> {
    let total_value = total_vault_value(engine, lst_symbol)?;
    let lp_symbol = format!("V_{lst_symbol}");

    let vault = engine.vault_mut(lst_symbol).ok_or_else(|| SimError::UnknownToken(lst_symbol.to_string()))?;
    let lp_tokens_to_mint = if vault.lp_token_supply == 0.0 {
        amount_eth
    } else {
        (amount_eth / total_value) * vault.lp_token_supply
    };
    vault.lp_token_supply += lp_tokens_to_mint;
    *vault.lp_holders.entry(investor).or_insert(0.0) += lp_tokens_to_mint;

    engine.wallet_deposit_lp(investor, &lp_symbol, lp_tokens_to_mint)
}

/// ETH + (DS at spot) + (CT/ETH LP position at spot) held by the vault's
/// own wallet.
fn total_vault_value(engine: &Engine, lst_symbol: &str) -> SimResult<f64> {
    let vault_wallet = vault_wallet_id(engine, lst_symbol)?;
    let ct_symbol = format!("CT_{lst_symbol}");
    let ds_symbol = format!("DS_{lst_symbol}");

    let eth_value = engine.wallet_eth_balance(vault_wallet);

    let ds_price = engine
        .amm(&ds_symbol)
        .ok_or_else(|| SimError::UnknownToken(ds_symbol.clone()))?
        .price_of_one_token_in_eth();
    let ds_value = ds_price * engine.wallet_balance_of(vault_wallet, &ds_symbol);

    let ct_pool = engine.amm(&ct_symbol).ok_or_else(|| SimError::UnknownToken(ct_symbol.clone()))?;
    let ct_lp_balance = engine.wallet(vault_wallet).lp_balance(&ct_symbol);
    let ct_lp_value = if ct_pool.total_lp_shares > 0.0 {
        (ct_pool.reserve_eth / ct_pool.total_lp_shares) * ct_lp_balance
    } else {
        0.0
    };

    Ok(eth_value + ds_value + ct_lp_value)
}

pub fn get_lp_token_price(engine: &Engine, lst_symbol: &str) -> SimResult<f64> {
    let vault = engine.vault(lst_symbol).ok_or_else(|| SimError::UnknownToken(lst_symbol.to_string()))?;
    if vault.lp_token_supply == 0.0 {
        return Ok(0.0);
    }
    Ok(total_vault_value(engine, lst_symbol)? / vault.lp_token_supply)
}

/// Burn `amount_lp`, withdrawing a proportional share of the vault's CT/ETH
/// LP position (converted to ETH) alongside its plain ETH holdings.
pub fn withdraw_lp_tokens(engine: &mut Engine, lst_symbol: &str, investor: WalletId, amount_lp: f64) -> SimResult<f64> {
    if amount_lp <= 0.0 {
        return Err(SimError::BadAmount(amount_lp));
    }
    let (vault_wallet, holder_balance, lp_supply) = {
        let vault = engine.vault(lst_symbol).ok_or_else(|| SimError::UnknownToken(lst_symbol.to_string()))?;
        (vault.wallet_id, vault.lp_holders.get(&investor).copied().unwrap_or(0.0), vault.lp_token_supply)
    };
    if amount_lp > holder_balance {
        return Err(SimError::InsufficientBalance {
            wallet: engine.wallet_owner(investor),
            token: format!("V_{lst_symbol}"),
            have: holder_balance,
            need: amount_lp,
        });
    }

    let share_of_assets = amount_lp / lp_supply;
    let total_value = total_vault_value(engine, lst_symbol)?;
    let user_share_value_in_eth = share_of_assets * total_value;

    let ct_symbol = format!("CT_{lst_symbol}");
    let ct_to_eth_price_ratio = engine
        .amm(&ct_symbol)
        .ok_or_else(|| SimError::UnknownToken(ct_symbol.clone()))?
        .price_of_one_token_in_eth();

    let eth_to_withdraw_directly = user_share_value_in_eth / (1.0 + ct_to_eth_price_ratio);
    let ct_to_withdraw = user_share_value_in_eth - eth_to_withdraw_directly;

    let (ct_received, eth_from_ct_lp) = engine.amm_remove_liquidity(&ct_symbol, vault_wallet, ct_to_withdraw)?;
    let block = engine.current_block;
    let eth_from_ct = engine.amm_swap_token_for_eth(&ct_symbol, vault_wallet, ct_received, block)?;

    let total_eth_to_return = eth_from_ct + eth_from_ct_lp;
    engine.wallet_withdraw_eth(vault_wallet, total_eth_to_return)?;
    engine.wallet_deposit_eth(investor, total_eth_to_return)?;

    let vault = engine.vault_mut(lst_symbol).unwrap();
    vault.lp_token_supply -= amount_lp;
    if let Some(h) = vault.lp_holders.get_mut(&investor) {
        *h -= amount_lp;
    }
    engine.wallet_withdraw_lp(investor, &format!("V_{lst_symbol}"), amount_lp)?;
    Ok(total_eth_to_return)
}

/// Read-only projection of `buy_ds`'s final payout, used both by the
/// routine itself as a pre-flight liquidity check and by agents deciding
/// whether a purchase is worth making.
pub fn calculate_buy_ds_outcome(engine: &Engine, lst_symbol: &str, amount_eth: f64) -> SimResult<f64> {
    if amount_eth <= 0.0 {
        return Err(SimError::BadAmount(amount_eth));
    }
    let ct_symbol = format!("CT_{lst_symbol}");
    let ds_symbol = format!("DS_{lst_symbol}");
    let ct_pool = engine.amm(&ct_symbol).ok_or_else(|| SimError::UnknownToken(ct_symbol.clone()))?;
    let ds_pool = engine.amm(&ds_symbol).ok_or_else(|| SimError::UnknownToken(ds_symbol.clone()))?;

    let ct_eth_price = ct_pool.price_of_one_token_in_eth();
    let ds_price = ds_pool.price_of_one_token_in_eth();
    let ct_fee = ct_pool.fee;
    let ds_fee = ds_pool.fee;

    let ds_to_give_investor = amount_eth / ds_price;
    let eth_to_borrow = ds_to_give_investor * ct_eth_price;
    let total_eth = amount_eth + eth_to_borrow;
    let ct_received = total_eth;
    let ds_received = total_eth;

    let ct_slippage = ct_pool.slippage(ct_received, SwapDirection::TokenToEth)?;
    let expected_eth_from_ct = ct_received * ct_eth_price * (1.0 - ct_fee) * (1.0 - ct_slippage);

    let shortfall_eth = eth_to_borrow - expected_eth_from_ct;
    let remaining_ds = if shortfall_eth > 0.0 {
        let ds_slippage = ds_pool.slippage(shortfall_eth / ds_price, SwapDirection::TokenToEth)?;
        let ds_to_sell = shortfall_eth / (ds_price * (1.0 - ds_fee) * (1.0 - ds_slippage));
        ds_received - ds_to_sell
    } else {
        ds_received
    };
    Ok(remaining_ds.max(0.0))
}

pub fn calculate_sell_ds_outcome(engine: &Engine, lst_symbol: &str, amount_ds: f64) -> SimResult<f64> {
    if amount_ds <= 0.0 {
        return Err(SimError::BadAmount(amount_ds));
    }
    let ct_symbol = format!("CT_{lst_symbol}");
    let ds_symbol = format!("DS_{lst_symbol}");
    let ct_pool = engine.amm(&ct_symbol).ok_or_else(|| SimError::UnknownToken(ct_symbol.clone()))?;
    let ds_pool = engine.amm(&ds_symbol).ok_or_else(|| SimError::UnknownToken(ds_symbol.clone()))?;

    let ct_eth_price = ct_pool.price_of_one_token_in_eth();
    let ds_price = ds_pool.price_of_one_token_in_eth();
    let ct_fee = ct_pool.fee;

    let ct_available = ct_pool.reserve_token;
    let eth_available = ds_pool.reserve_eth;
    let mut amount_ds = amount_ds;
    let max_ds_sellable = amount_ds.min(ct_available).min(eth_available / ds_price);
    if amount_ds > max_ds_sellable {
        amount_ds = max_ds_sellable;
    }

    let eth_from_psm = amount_ds;
    let eth_needed_for_repayment = amount_ds * ct_eth_price;
    let ct_slippage = ct_pool.slippage(eth_needed_for_repayment, SwapDirection::EthToToken)?;
    let eth_to_swap_for_ct = eth_needed_for_repayment / ((1.0 - ct_fee) * (1.0 - ct_slippage));

    Ok((eth_from_psm - eth_to_swap_for_ct).max(0.0))
}

/// Snapshot of every entity a `buy_ds`/`sell_ds` routine touches, taken
/// before the routine's first mutation. If the routine fails partway
/// through (most commonly: the repayment loop exhausts the vault's own
/// balance before fully repaying its loan), the caller restores from this
/// snapshot so the failed routine leaves no trace — borrowed ETH/CT is
/// never left outstanding to trip the end-of-block `OutstandingDebt` check.
struct RoutineSnapshot {
    investor_wallet: Wallet,
    vault_wallet: Wallet,
    ct_amm: Amm,
    ds_amm: Amm,
    psm: Psm,
    borrowed_eth: f64,
    borrowed_ct: f64,
}

impl RoutineSnapshot {
    fn capture(engine: &Engine, investor: WalletId, vault_wallet: WalletId, ct_symbol: &str, ds_symbol: &str, lst_symbol: &str) -> Self {
        Self {
            investor_wallet: engine.wallet(investor).clone(),
            vault_wallet: engine.wallet(vault_wallet).clone(),
            ct_amm: engine.amm(ct_symbol).unwrap().clone(),
            ds_amm: engine.amm(ds_symbol).unwrap().clone(),
            psm: engine.psm(lst_symbol).unwrap().clone(),
            borrowed_eth: engine.borrowed_eth_of(vault_wallet),
            borrowed_ct: engine.borrowed_token_of(vault_wallet, ct_symbol),
        }
    }

    fn restore(self, engine: &mut Engine, investor: WalletId, vault_wallet: WalletId, ct_symbol: &str, ds_symbol: &str, lst_symbol: &str) {
        *engine.wallet_mut(investor) = self.investor_wallet;
        *engine.wallet_mut(vault_wallet) = self.vault_wallet;
        *engine.amm_mut(ct_symbol).unwrap() = self.ct_amm;
        *engine.amm_mut(ds_symbol).unwrap() = self.ds_amm;
        *engine.psm_mut(lst_symbol).unwrap() = self.psm;
        engine.set_borrowed_eth_of(vault_wallet, self.borrowed_eth);
        engine.set_borrowed_token_of(vault_wallet, ct_symbol, self.borrowed_ct);
    }
}

/// Borrow ETH, mint CT+DS via the PSM, sell the CT (and if needed some DS)
/// to repay the loan, and hand the investor whatever DS remains. Atomic:
/// any failure (in particular, running out of DS to sell before the loan
/// is fully repaid) rolls the whole routine back and surfaces
/// `InsufficientLiquidity` rather than leaving debt outstanding.
pub fn buy_ds(engine: &mut Engine, lst_symbol: &str, investor: WalletId, amount_eth: f64) -> SimResult<f64> {
    if calculate_buy_ds_outcome(engine, lst_symbol, amount_eth)? <= 0.0 {
        return Err(SimError::InsufficientLiquidity);
    }
    let vault_wallet = vault_wallet_id(engine, lst_symbol)?;
    let ct_symbol = format!("CT_{lst_symbol}");
    let ds_symbol = format!("DS_{lst_symbol}");

    let snapshot = RoutineSnapshot::capture(engine, investor, vault_wallet, &ct_symbol, &ds_symbol, lst_symbol);
    match buy_ds_execute(engine, lst_symbol, &ct_symbol, &ds_symbol, investor, vault_wallet, amount_eth) {
        Ok(remaining_ds) => Ok(remaining_ds),
        Err(e) => {
            snapshot.restore(engine, investor, vault_wallet, &ct_symbol, &ds_symbol, lst_symbol);
            Err(e)
        }
    }
}

fn buy_ds_execute(
    engine: &mut Engine,
    lst_symbol: &str,
    ct_symbol: &str,
    ds_symbol: &str,
    investor: WalletId,
    vault_wallet: WalletId,
    mut amount_eth: f64,
) -> SimResult<f64> {
    let (ct_eth_price, ds_price, ds_fee) = {
        let ct_pool = engine.amm(ct_symbol).unwrap();
        let ds_pool = engine.amm(ds_symbol).unwrap();
        (ct_pool.price_of_one_token_in_eth(), ds_pool.price_of_one_token_in_eth(), ds_pool.fee)
    };

    let ds_available_in_eth = engine.amm(ds_symbol).unwrap().reserve_token * ds_price;
    if amount_eth > ds_available_in_eth {
        amount_eth = ds_available_in_eth;
    }

    engine.wallet_withdraw_eth(investor, amount_eth)?;
    engine.wallet_deposit_eth(vault_wallet, amount_eth)?;

    let eth_to_borrow = (amount_eth / ds_price) * ct_eth_price;
    engine.borrow_eth(vault_wallet, eth_to_borrow)?;

    let total_eth = amount_eth + eth_to_borrow;
    let block = engine.current_block;
    engine.psm_deposit_eth(lst_symbol, vault_wallet, total_eth)?;
    let ct_received = total_eth;
    let ds_received = total_eth;

    let eth_from_ct = engine.amm_swap_token_for_eth(ct_symbol, vault_wallet, ct_received, block)?;

    let eth_needed_for_repayment = (eth_to_borrow - eth_from_ct).max(0.0);
    let mut ds_to_sell = (eth_needed_for_repayment / ds_price) / (1.0 - ds_fee);
    let ds_balance = engine.wallet_balance_of(vault_wallet, ds_symbol);
    if ds_to_sell > ds_balance {
        ds_to_sell = ds_balance;
    }
    let mut eth_from_ds = engine.amm_swap_token_for_eth(ds_symbol, vault_wallet, ds_to_sell, block)?;

    let mut eth_accumulated = eth_from_ct + eth_from_ds;
    while eth_accumulated + 1e-9 < eth_to_borrow {
        let ds_balance = engine.wallet_balance_of(vault_wallet, ds_symbol);
        if ds_balance <= 1e-9 {
            return Err(SimError::InsufficientLiquidity);
        }
        let new_ds_price = engine.amm(ds_symbol).unwrap().price_of_one_token_in_eth();
        let more_ds_to_sell = (((eth_to_borrow - eth_accumulated) / new_ds_price) / (1.0 + ds_fee)).min(ds_balance);
        let new_eth_from_ds = engine.amm_swap_token_for_eth(ds_symbol, vault_wallet, more_ds_to_sell, block)?;
        eth_accumulated += new_eth_from_ds;
        ds_to_sell += more_ds_to_sell;
        eth_from_ds += new_eth_from_ds;
    }
    let _ = eth_from_ds;

    engine.repay_eth(vault_wallet, eth_to_borrow)?;

    let mut remaining_ds = ds_received - ds_to_sell;
    let ds_balance_final = engine.wallet_balance_of(vault_wallet, ds_symbol);
    if remaining_ds > ds_balance_final {
        remaining_ds = ds_balance_final;
    }
    if remaining_ds <= 0.0 {
        return Err(SimError::InsufficientLiquidity);
    }

    engine.wallet_withdraw_token(vault_wallet, ds_symbol, remaining_ds)?;
    engine.wallet_deposit_token(investor, ds_symbol, remaining_ds)?;
    Ok(remaining_ds)
}

/// Borrow CT, redeem it with the deposited DS via the PSM for ETH, swap
/// ETH back into CT to repay the loan, and hand the investor what's left.
/// Atomic in the same sense as `buy_ds`.
pub fn sell_ds(engine: &mut Engine, lst_symbol: &str, investor: WalletId, amount_ds: f64) -> SimResult<f64> {
    if calculate_sell_ds_outcome(engine, lst_symbol, amount_ds)? <= 0.0 {
        return Err(SimError::InsufficientLiquidity);
    }
    let vault_wallet = vault_wallet_id(engine, lst_symbol)?;
    let ct_symbol = format!("CT_{lst_symbol}");
    let ds_symbol = format!("DS_{lst_symbol}");

    let snapshot = RoutineSnapshot::capture(engine, investor, vault_wallet, &ct_symbol, &ds_symbol, lst_symbol);
    match sell_ds_execute(engine, lst_symbol, &ct_symbol, &ds_symbol, investor, vault_wallet, amount_ds) {
        Ok(payout) => Ok(payout),
        Err(e) => {
            snapshot.restore(engine, investor, vault_wallet, &ct_symbol, &ds_symbol, lst_symbol);
            Err(e)
        }
    }
}

fn sell_ds_execute(
    engine: &mut Engine,
    lst_symbol: &str,
    ct_symbol: &str,
    ds_symbol: &str,
    investor: WalletId,
    vault_wallet: WalletId,
    mut amount_ds: f64,
) -> SimResult<f64> {
    let (ct_eth_price, ds_price) = {
        let ct_pool = engine.amm(ct_symbol).unwrap();
        let ds_pool = engine.amm(ds_symbol).unwrap();
        (ct_pool.price_of_one_token_in_eth(), ds_pool.price_of_one_token_in_eth())
    };
    let (ct_available, eth_available) = {
        let ct_pool = engine.amm(ct_symbol).unwrap();
        let ds_pool = engine.amm(ds_symbol).unwrap();
        (ct_pool.reserve_token, ds_pool.reserve_eth)
    };
    if amount_ds > ct_available || amount_ds * ds_price > eth_available {
        amount_ds = ct_available.min(eth_available / ds_price);
    }

    engine.wallet_withdraw_token(investor, ds_symbol, amount_ds)?;
    engine.wallet_deposit_token(vault_wallet, ds_symbol, amount_ds)?;

    let ct_to_borrow = amount_ds;
    engine.borrow_token(vault_wallet, ct_symbol, ct_to_borrow)?;

    let eth_from_ds = engine.psm_redeem_with_ct_and_ds(lst_symbol, vault_wallet, ct_to_borrow)?;

    let ct_fee = engine.amm(ct_symbol).unwrap().fee;
    let block = engine.current_block;
    let initial_eth_to_swap = ((eth_from_ds * ct_eth_price) / (1.0 - ct_fee)).min(eth_from_ds);
    let mut ct_from_eth = engine.amm_swap_eth_for_token(ct_symbol, vault_wallet, initial_eth_to_swap, block)?;
    let mut remaining_eth_to_return = eth_from_ds - initial_eth_to_swap;

    while ct_from_eth + 1e-9 < ct_to_borrow {
        let eth_balance = engine.wallet_eth_balance(vault_wallet);
        if eth_balance <= 1e-9 {
            return Err(SimError::InsufficientLiquidity);
        }
        let new_ct_eth_price = engine.amm(ct_symbol).unwrap().price_of_one_token_in_eth();
        let needed_eth = ((ct_to_borrow - ct_from_eth) / new_ct_eth_price) * (1.0 + ct_fee);
        let eth_to_swap_for_ct = needed_eth.min(eth_balance);
        let more_ct = engine.amm_swap_eth_for_token(ct_symbol, vault_wallet, eth_to_swap_for_ct, block)?;
        ct_from_eth += more_ct;
        remaining_eth_to_return -= eth_to_swap_for_ct;
    }

    engine.repay_token(vault_wallet, ct_symbol, ct_to_borrow)?;

    let payout = remaining_eth_to_return.max(0.0);
    if payout > 0.0 {
        engine.wallet_withdraw_eth(vault_wallet, payout)?;
        engine.wallet_deposit_eth(investor, payout)?;
    }
    Ok(payout)
}

fn vault_wallet_id(engine: &Engine, lst_symbol: &str) -> SimResult<WalletId> {
    Ok(engine
        .vault(lst_symbol)
        .ok_or_else(|| SimError::UnknownToken(lst_symbol.to_string()))?
        .wallet_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, TokenConfig};

    fn test_engine() -> Engine {
        let config = EngineConfig {
            num_blocks: 10,
            eth_yield_per_block: 0.0,
            seed: 7,
            tokens: vec![TokenConfig {
                symbol: "X".into(),
                expiry_block: 1000,
                initial_eth_reserve: 1_000.0,
                initial_lst_reserve: 1_000.0,
                initial_ct_eth_reserve: 500.0,
                initial_ct_reserve: 500.0,
                initial_ds_eth_reserve: 200.0,
                initial_ds_reserve: 500.0,
                lst_amm_fee: 0.003,
                ct_amm_fee: 0.003,
                ds_amm_fee: 0.003,
                ct_discount_rate: 0.05,
                ds_discount_rate: 0.05,
                psm_redemption_fee: 0.001,
                psm_repurchase_fee: 0.05,
                vault_reserve_ct_ratio: 0.4,
                yield_per_block: 0.0,
                initial_agent_balance: 0.0,
            }],
            events_path: None,
        };
        Engine::new(&config)
    }

    #[test]
    fn deposit_eth_mints_lp_and_drains_investor() {
        let mut engine = test_engine();
        let investor = engine.new_wallet("investor");
        engine.wallet_deposit_eth(investor, 50.0).unwrap();

        deposit_eth(&mut engine, "X", investor, 20.0).unwrap();
        assert_eq!(engine.wallet_eth_balance(investor), 30.0);
        assert!(engine.wallet_lp_balance(investor, "X") > 0.0);
    }

    #[test]
    fn buy_ds_then_sell_ds_round_trips_without_leaving_debt() {
        let mut engine = test_engine();
        let investor = engine.new_wallet("investor");
        engine.wallet_deposit_eth(investor, 100.0).unwrap();

        let ds = buy_ds(&mut engine, "X", investor, 5.0).unwrap();
        assert!(ds > 0.0);
        assert_eq!(engine.total_outstanding_eth_debt(), 0.0);

        let eth_back = sell_ds(&mut engine, "X", investor, ds).unwrap();
        assert!(eth_back >= 0.0);
        assert_eq!(engine.total_outstanding_token_debt(), 0.0);
    }

    #[test]
    fn withdraw_lp_tokens_after_deposit_returns_eth() {
        let mut engine = test_engine();
        let investor = engine.new_wallet("investor");
        engine.wallet_deposit_eth(investor, 50.0).unwrap();
        deposit_eth(&mut engine, "X", investor, 20.0).unwrap();

        let lp_balance = engine.wallet_lp_balance(investor, "X");
        let returned = withdraw_lp_tokens(&mut engine, "X", investor, lp_balance).unwrap();
        assert!(returned > 0.0);
    }
}
