//! The `Agent` interface and the reference strategy catalogue.
//!
//! Agents never see `Engine` directly. Each dispatch hands them an
//! `AgentHandle` exposing exactly the six verbs a strategy needs (swap,
//! add/remove liquidity, buy/sell DS, deposit/redeem) plus read-only price
//! lookups.

use crate::amm::Amm;
use crate::engine::Engine;
use crate::error::SimResult;
use crate::psm::Psm;
use crate::stats::TradeRecord;
use crate::vault::{self, Vault};
use crate::wallet::WalletId;

pub trait Agent: Send {
    fn name(&self) -> &str;

    /// Called once, after genesis wallets/pools/vaults exist but before
    /// block 1. Default is a no-op; most strategies don't need it.
    fn on_after_genesis(&mut self, _handle: &mut AgentHandle) -> SimResult<()> {
        Ok(())
    }

    fn on_block_mined(&mut self, handle: &mut AgentHandle, block: u64) -> SimResult<()>;
}

/// Thin per-dispatch handle binding one agent's wallet to the engine for
/// the duration of a single `on_block_mined` call.
pub struct AgentHandle<'e> {
    pub(crate) engine: &'e mut Engine,
    pub(crate) wallet_id: WalletId,
}

impl<'e> AgentHandle<'e> {
    pub fn wallet_id(&self) -> WalletId {
        self.wallet_id
    }

    pub fn current_block(&self) -> u64 {
        self.engine.current_block
    }

    pub fn num_blocks(&self) -> u64 {
        self.engine.num_blocks
    }

    pub fn eth_balance(&self) -> f64 {
        self.engine.wallet_eth_balance(self.wallet_id)
    }

    pub fn balance_of(&self, symbol: &str) -> f64 {
        self.engine.wallet_balance_of(self.wallet_id, symbol)
    }

    pub fn lp_balance(&self, symbol: &str) -> f64 {
        self.engine.wallet_lp_balance(self.wallet_id, symbol)
    }

    pub fn amm(&self, symbol: &str) -> Option<&Amm> {
        self.engine.amm(symbol)
    }

    pub fn psm(&self, symbol: &str) -> Option<&Psm> {
        self.engine.psm(symbol)
    }

    pub fn vault(&self, symbol: &str) -> Option<&Vault> {
        self.engine.vault(symbol)
    }

    pub fn token_yield_per_block(&self, symbol: &str) -> f64 {
        self.engine.token_yield(symbol)
    }

    pub fn log_action(&mut self, msg: impl Into<String>) {
        self.engine.add_action(msg.into());
    }

    fn log_trade(&mut self, action: &str, token: &str, amount_in: f64, amount_out: f64) {
        let block = self.engine.current_block;
        let wallet = self.engine.wallet_owner(self.wallet_id);
        self.engine.stats.record_trade(TradeRecord {
            block,
            wallet,
            action: action.to_string(),
            token: token.to_string(),
            amount_in,
            amount_out,
        });
    }

    pub fn swap_eth_for_token(&mut self, symbol: &str, amount_eth: f64) -> SimResult<f64> {
        let block = self.engine.current_block;
        let out = self.engine.amm_swap_eth_for_token(symbol, self.wallet_id, amount_eth, block)?;
        self.log_trade("swap_eth_for_token", symbol, amount_eth, out);
        Ok(out)
    }

    pub fn swap_token_for_eth(&mut self, symbol: &str, amount_token: f64) -> SimResult<f64> {
        let block = self.engine.current_block;
        let out = self.engine.amm_swap_token_for_eth(symbol, self.wallet_id, amount_token, block)?;
        self.log_trade("swap_token_for_eth", symbol, amount_token, out);
        Ok(out)
    }

    pub fn add_liquidity(&mut self, symbol: &str, amount_eth: f64, amount_token: f64) -> SimResult<f64> {
        let shares = self.engine.amm_add_liquidity(symbol, self.wallet_id, amount_eth, amount_token)?;
        self.log_trade("add_liquidity", symbol, amount_eth, shares);
        Ok(shares)
    }

    pub fn remove_liquidity(&mut self, symbol: &str, shares: f64) -> SimResult<(f64, f64)> {
        let out = self.engine.amm_remove_liquidity(symbol, self.wallet_id, shares)?;
        self.log_trade("remove_liquidity", symbol, shares, out.0 + out.1);
        Ok(out)
    }

    pub fn buy_ds(&mut self, lst_symbol: &str, amount_eth: f64) -> SimResult<f64> {
        let out = vault::buy_ds(self.engine, lst_symbol, self.wallet_id, amount_eth)?;
        self.log_trade("buy_ds", &format!("DS_{lst_symbol}"), amount_eth, out);
        Ok(out)
    }

    pub fn sell_ds(&mut self, lst_symbol: &str, amount_ds: f64) -> SimResult<f64> {
        let out = vault::sell_ds(self.engine, lst_symbol, self.wallet_id, amount_ds)?;
        self.log_trade("sell_ds", &format!("DS_{lst_symbol}"), amount_ds, out);
        Ok(out)
    }

    pub fn calculate_buy_ds_outcome(&self, lst_symbol: &str, amount_eth: f64) -> SimResult<f64> {
        vault::calculate_buy_ds_outcome(self.engine, lst_symbol, amount_eth)
    }

    pub fn calculate_sell_ds_outcome(&self, lst_symbol: &str, amount_ds: f64) -> SimResult<f64> {
        vault::calculate_sell_ds_outcome(self.engine, lst_symbol, amount_ds)
    }

    pub fn vault_deposit_eth(&mut self, lst_symbol: &str, amount_eth: f64) -> SimResult<()> {
        vault::deposit_eth(self.engine, lst_symbol, self.wallet_id, amount_eth)?;
        self.log_trade("vault_deposit_eth", &format!("V_{lst_symbol}"), amount_eth, 0.0);
        Ok(())
    }

    pub fn vault_withdraw_lp(&mut self, lst_symbol: &str, amount_lp: f64) -> SimResult<f64> {
        let out = vault::withdraw_lp_tokens(self.engine, lst_symbol, self.wallet_id, amount_lp)?;
        self.log_trade("vault_withdraw_lp", &format!("V_{lst_symbol}"), amount_lp, out);
        Ok(out)
    }

    pub fn psm_deposit_eth(&mut self, lst_symbol: &str, amount_eth: f64) -> SimResult<()> {
        self.engine.psm_deposit_eth(lst_symbol, self.wallet_id, amount_eth)
    }

    pub fn psm_redeem_with_ct_and_ds(&mut self, lst_symbol: &str, n: f64) -> SimResult<f64> {
        let out = self.engine.psm_redeem_with_ct_and_ds(lst_symbol, self.wallet_id, n)?;
        self.log_trade("psm_redeem_with_ct_and_ds", lst_symbol, n, out);
        Ok(out)
    }

    pub fn psm_redeem_with_lst_and_ds(&mut self, lst_symbol: &str, n: f64) -> SimResult<f64> {
        let out = self.engine.psm_redeem_with_lst_and_ds(lst_symbol, self.wallet_id, n)?;
        self.log_trade("psm_redeem_with_lst_and_ds", lst_symbol, n, out);
        Ok(out)
    }

    pub fn psm_repurchase_lst_and_ds(&mut self, lst_symbol: &str, amount_eth: f64) -> SimResult<f64> {
        let out = self.engine.psm_repurchase_lst_and_ds(lst_symbol, self.wallet_id, amount_eth)?;
        self.log_trade("psm_repurchase_lst_and_ds", lst_symbol, amount_eth, out);
        Ok(out)
    }

    /// Direct access to the engine's borrow ledger. Reference strategies
    /// never call these — flash-loan routines borrow/repay internally —
    /// but the verbs are part of `Engine`'s public surface and a bespoke
    /// strategy (or a test harness exercising the end-of-block debt
    /// invariant) may call them directly.
    pub fn borrow_eth(&mut self, amount: f64) -> SimResult<()> {
        self.engine.borrow_eth(self.wallet_id, amount)
    }

    pub fn repay_eth(&mut self, amount: f64) -> SimResult<()> {
        self.engine.repay_eth(self.wallet_id, amount)
    }

    pub fn borrow_token(&mut self, symbol: &str, amount: f64) -> SimResult<()> {
        self.engine.borrow_token(self.wallet_id, symbol, amount)
    }

    pub fn repay_token(&mut self, symbol: &str, amount: f64) -> SimResult<()> {
        self.engine.repay_token(self.wallet_id, symbol, amount)
    }
}

/// Wire up one instance of every shipped reference strategy per registered
/// token, each funded with `initial_agent_balance` ETH. Used by the CLI's
/// `run`/`monte-carlo` commands when no bespoke agent roster is supplied.
pub fn build_reference_agents(engine: &mut Engine, initial_agent_balance: f64) -> SimResult<()> {
    for symbol in engine.token_symbols() {
        let w = engine.new_wallet(format!("DsLongTerm:{symbol}"));
        engine.wallet_deposit_eth(w, initial_agent_balance)?;
        engine.add_agent(w, "DsLongTermAgent", Box::new(DsLongTermAgent::new(format!("DsLongTerm:{symbol}"), &symbol, 0.5)));

        let w = engine.new_wallet(format!("DsSpeculation:{symbol}"));
        engine.wallet_deposit_eth(w, initial_agent_balance)?;
        engine.add_agent(w, "DsSpeculationAgent", Box::new(DsSpeculationAgent::new(&symbol, 0.01)));

        let w = engine.new_wallet(format!("CtLongTerm:{symbol}"));
        engine.wallet_deposit_eth(w, initial_agent_balance)?;
        engine.add_agent(w, "CtLongTermAgent", Box::new(CtLongTermAgent::new(format!("CtLongTerm:{symbol}"), &symbol, 0.02)));

        let w = engine.new_wallet(format!("LvDepositor:{symbol}"));
        engine.wallet_deposit_eth(w, initial_agent_balance)?;
        engine.add_agent(
            w,
            "LvDepositorAgent",
            Box::new(LvDepositorAgent::new(format!("LvDepositor:{symbol}"), &symbol, 0.05, 0.2)),
        );

        let w = engine.new_wallet(format!("Insurer:{symbol}"));
        engine.wallet_deposit_eth(w, initial_agent_balance)?;
        engine.add_agent(w, "InsurerAgent", Box::new(InsurerAgent::new(&symbol)));

        let w = engine.new_wallet(format!("RedemptionArb:{symbol}"));
        engine.wallet_deposit_eth(w, initial_agent_balance)?;
        engine.add_agent(
            w,
            "RedemptionArbitrageAgent",
            Box::new(RedemptionArbitrageAgent::new(format!("RedemptionArb:{symbol}"), &symbol)),
        );

        let w = engine.new_wallet(format!("RepurchaseArb:{symbol}"));
        engine.wallet_deposit_eth(w, initial_agent_balance)?;
        engine.add_agent(
            w,
            "RepurchaseArbitrageAgent",
            Box::new(RepurchaseArbitrageAgent::new(format!("RepurchaseArb:{symbol}"), &symbol)),
        );
    }
    Ok(())
}

fn buying_intent(margin: f64, base_volume: f64, threshold: f64, growth_rate: f64) -> f64 {
    base_volume * (growth_rate * (margin - threshold)).exp()
}

fn buying_intent_increasing_above_1(value: f64, growth_rate: f64) -> f64 {
    if value <= 1.0 {
        0.0
    } else {
        1.0 - (-growth_rate * (value - 1.0)).exp()
    }
}

fn buying_intent_increasing_below_1(margin: f64, threshold: f64, growth_rate: f64) -> f64 {
    if margin >= threshold {
        0.0
    } else {
        let intent = (growth_rate * (threshold - margin)).exp();
        1.0 - (1.0 / (1.0 + intent))
    }
}

/// Accumulates DS when its discount to the underlying LST's full-period
/// yield is attractive; phases out of the position if the LST stays
/// depegged for several consecutive blocks.
pub struct DsLongTermAgent {
    name: String,
    lst_symbol: String,
    buying_pressure: f64,
    k: f64,
    depeg_threshold: f64,
    lst_price_history: Vec<f64>,
}

impl DsLongTermAgent {
    pub fn new(name: impl Into<String>, lst_symbol: impl Into<String>, buying_pressure: f64) -> Self {
        Self {
            name: name.into(),
            lst_symbol: lst_symbol.into(),
            buying_pressure,
            k: 5.0,
            depeg_threshold: 0.98,
            lst_price_history: Vec::new(),
        }
    }

    fn consecutive_under_threshold(&self) -> u32 {
        let mut count = 0;
        for price in self.lst_price_history.iter().rev() {
            if *price < self.depeg_threshold {
                count += 1;
            } else {
                break;
            }
        }
        count
    }
}

impl Agent for DsLongTermAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_block_mined(&mut self, handle: &mut AgentHandle, _block: u64) -> SimResult<()> {
        let ds_symbol = format!("DS_{}", self.lst_symbol);
        let ds_price = handle.amm(&ds_symbol).map(|a| a.price_of_one_token_in_eth()).unwrap_or(0.0);
        let lst_yield_over_run = handle.token_yield_per_block(&self.lst_symbol) * handle.num_blocks() as f64;
        let lst_price = handle.amm(&self.lst_symbol).map(|a| a.price_of_one_token_in_eth()).unwrap_or(1.0);

        if lst_yield_over_run > 0.0 {
            let intent = (-self.k * (ds_price / lst_yield_over_run)).exp();
            let amount_eth = intent * handle.eth_balance() * self.buying_pressure;
            if amount_eth > 0.0 && handle.calculate_buy_ds_outcome(&self.lst_symbol, amount_eth).unwrap_or(0.0) > 0.0 {
                handle.log_action(format!("{}: buying DS with {amount_eth:.4} ETH (intent={intent:.4})", self.name));
                handle.buy_ds(&self.lst_symbol, amount_eth)?;
            }
        }

        self.lst_price_history.push(lst_price);
        if lst_price <= self.depeg_threshold {
            let ds_balance = handle.balance_of(&ds_symbol);
            let extended = self.consecutive_under_threshold() as f64;
            let amount_ds = (ds_balance * extended * 0.1).min(ds_balance);
            if amount_ds > 0.0 {
                handle.log_action(format!("{}: selling {amount_ds:.4} DS (depeg persists)", self.name));
                handle.sell_ds(&self.lst_symbol, amount_ds)?;
            }
        }
        Ok(())
    }
}

/// Momentum trader: buys DS on a sharp downward move in its annualized
/// risk premium, sells on a sharp upward move.
pub struct DsSpeculationAgent {
    name: String,
    lst_symbol: String,
    threshold: f64,
    arp_history: Vec<f64>,
}

impl DsSpeculationAgent {
    pub fn new(lst_symbol: impl Into<String>, threshold: f64) -> Self {
        let lst_symbol = lst_symbol.into();
        Self {
            name: format!("DsSpeculationAgent for {lst_symbol}"),
            lst_symbol,
            threshold,
            arp_history: Vec::new(),
        }
    }

    /// Exponentially-weighted slope of the last `n` ARP samples.
    fn ewa_slope(&self, n: usize, alpha: f64) -> f64 {
        let len = self.arp_history.len();
        let window = &self.arp_history[len.saturating_sub(n)..];
        if window.len() < 2 {
            return 0.0;
        }
        let mut ewa = window[0];
        let mut slope = 0.0;
        for pair in window.windows(2) {
            let next = alpha * pair[1] + (1.0 - alpha) * ewa;
            slope = next - ewa;
            ewa = next;
        }
        slope
    }
}

impl Agent for DsSpeculationAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_block_mined(&mut self, handle: &mut AgentHandle, _block: u64) -> SimResult<()> {
        let ds_symbol = format!("DS_{}", self.lst_symbol);
        let ds_price = handle.amm(&ds_symbol).map(|a| a.price_of_one_token_in_eth()).unwrap_or(0.0);
        let native_yield = handle.token_yield_per_block(&self.lst_symbol);
        let arp = if ds_price > 0.0 { (1.0 - ds_price) - native_yield * handle.num_blocks() as f64 } else { 0.0 };
        self.arp_history.push(arp);

        if self.arp_history.len() < 3 {
            return Ok(());
        }
        let slope = self.ewa_slope(10, 0.3);

        if slope < -self.threshold {
            let weighted_volume = 100.0 * -slope;
            let potential_eth = if ds_price > 0.0 { weighted_volume / ds_price } else { 0.0 };
            let amount = potential_eth.min(handle.eth_balance());
            if amount > 0.0 && handle.calculate_buy_ds_outcome(&self.lst_symbol, amount).unwrap_or(0.0) > 0.0 {
                handle.buy_ds(&self.lst_symbol, amount)?;
                handle.log_action(format!("{}: bought DS on sharp ARP decline (slope={slope:.4})", self.name));
            }
        } else if slope > self.threshold {
            let weighted_volume = if ds_price > 0.0 { 100.0 * slope / ds_price } else { 0.0 };
            let amount = weighted_volume.min(handle.balance_of(&ds_symbol));
            if amount > 0.0 && handle.calculate_sell_ds_outcome(&self.lst_symbol, amount).unwrap_or(0.0) > 0.0 {
                handle.sell_ds(&self.lst_symbol, amount)?;
                handle.log_action(format!("{}: sold DS on sharp ARP incline (slope={slope:.4})", self.name));
            }
        }
        Ok(())
    }
}

/// Buys CT whenever its implied fixed yield clears the underlying LST's
/// expected rebasing yield by `percentage_threshold`. Never sells — the
/// strategy is to hold CT to maturity.
pub struct CtLongTermAgent {
    name: String,
    lst_symbol: String,
    percentage_threshold: f64,
}

impl CtLongTermAgent {
    pub fn new(name: impl Into<String>, lst_symbol: impl Into<String>, percentage_threshold: f64) -> Self {
        Self {
            name: name.into(),
            lst_symbol: lst_symbol.into(),
            percentage_threshold,
        }
    }
}

impl Agent for CtLongTermAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_block_mined(&mut self, handle: &mut AgentHandle, _block: u64) -> SimResult<()> {
        let expected_lst_yield = handle.token_yield_per_block(&self.lst_symbol) * handle.num_blocks() as f64;
        let ct_symbol = format!("CT_{}", self.lst_symbol);
        let ct_price = handle.amm(&ct_symbol).map(|a| a.price_of_one_token_in_eth()).unwrap_or(1.0);
        let fixed_yield = 1.0 - ct_price;
        let risk_premium = fixed_yield - expected_lst_yield;

        if risk_premium > self.percentage_threshold {
            let weighted_volume = buying_intent(risk_premium, 1.0, self.percentage_threshold, 3.0);
            let volume = weighted_volume.min(handle.eth_balance());
            if volume > 0.0 {
                handle.swap_eth_for_token(&ct_symbol, volume)?;
                handle.log_action(format!("{}: bought CT with {volume:.4} ETH (ARP={risk_premium:.4})", self.name));
            }
        }
        Ok(())
    }
}

/// Deposits into the Vault's liquidity position when its yield clears the
/// underlying LST yield by `yield_margin_threshold`; withdraws when the
/// margin collapses below the LST's own yield.
pub struct LvDepositorAgent {
    name: String,
    lst_symbol: String,
    expected_apy: f64,
    yield_margin_threshold: f64,
}

impl LvDepositorAgent {
    pub fn new(name: impl Into<String>, lst_symbol: impl Into<String>, expected_apy: f64, yield_margin_threshold: f64) -> Self {
        Self {
            name: name.into(),
            lst_symbol: lst_symbol.into(),
            expected_apy,
            yield_margin_threshold,
        }
    }
}

impl Agent for LvDepositorAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_block_mined(&mut self, handle: &mut AgentHandle, _block: u64) -> SimResult<()> {
        let native_yield = handle.token_yield_per_block(&self.lst_symbol);
        let annualized_yield = native_yield * handle.num_blocks() as f64;
        if annualized_yield <= 0.0 {
            return Ok(());
        }
        let yield_margin = (self.expected_apy - annualized_yield) / annualized_yield;

        if yield_margin > self.yield_margin_threshold {
            let deposit_amount = buying_intent(yield_margin, 1.0, 0.25, 3.0).min(handle.eth_balance());
            if deposit_amount > 0.0 {
                handle.vault_deposit_eth(&self.lst_symbol, deposit_amount)?;
                handle.log_action(format!("{}: deposited {deposit_amount:.4} ETH into the vault", self.name));
            }
        }

        if yield_margin < native_yield {
            let redeem_amount = handle.lp_balance(&self.lst_symbol);
            if redeem_amount > 0.0 {
                handle.vault_withdraw_lp(&self.lst_symbol, redeem_amount)?;
                handle.log_action(format!("{}: redeemed {redeem_amount:.4} vault LP tokens", self.name));
            }
        }
        Ok(())
    }
}

/// Insures depeg risk away by continually converting its LST holdings to
/// ETH and depositing that ETH into the PSM.
pub struct InsurerAgent {
    name: String,
    lst_symbol: String,
}

impl InsurerAgent {
    pub fn new(lst_symbol: impl Into<String>) -> Self {
        let lst_symbol = lst_symbol.into();
        Self {
            name: format!("Insurer for {lst_symbol}"),
            lst_symbol,
        }
    }
}

impl Agent for InsurerAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_block_mined(&mut self, handle: &mut AgentHandle, _block: u64) -> SimResult<()> {
        let price = match handle.amm(&self.lst_symbol) {
            Some(amm) if amm.reserve_token > 0.0 && amm.reserve_eth > 0.0 => amm.price_of_one_token_in_eth(),
            _ => {
                handle.log_action(format!("{}: no more {}, would love to insure more", self.name, self.lst_symbol));
                return Ok(());
            }
        };
        let amount_lst = 1.0 / price;
        if handle.balance_of(&self.lst_symbol) < amount_lst {
            handle.log_action(format!("{}: no more {}, would love to insure more", self.name, self.lst_symbol));
            return Ok(());
        }
        handle.swap_token_for_eth(&self.lst_symbol, amount_lst)?;
        handle.log_action(format!("{}: bought 1 ETH swapping {amount_lst:.4} {}", self.name, self.lst_symbol));

        let eth_balance = handle.eth_balance();
        if eth_balance > 0.0 {
            handle.psm_deposit_eth(&self.lst_symbol, eth_balance)?;
            handle.log_action(format!("{}: deposited {eth_balance:.4} ETH into the PSM", self.name));
        }
        Ok(())
    }
}

/// Buys DS and LST in lockstep whenever `LST + DS < 1`, then immediately
/// redeems the pair at the PSM for a near-riskless spread.
pub struct RedemptionArbitrageAgent {
    name: String,
    lst_symbol: String,
}

impl RedemptionArbitrageAgent {
    pub fn new(name: impl Into<String>, lst_symbol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lst_symbol: lst_symbol.into(),
        }
    }
}

impl Agent for RedemptionArbitrageAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_block_mined(&mut self, handle: &mut AgentHandle, _block: u64) -> SimResult<()> {
        let ds_symbol = format!("DS_{}", self.lst_symbol);
        let ds_price = handle.amm(&ds_symbol).map(|a| a.price_of_one_token_in_eth()).unwrap_or(1.0);
        let lst_price = handle.amm(&self.lst_symbol).map(|a| a.price_of_one_token_in_eth()).unwrap_or(1.0);
        let redemption_fee = handle.psm(&self.lst_symbol).map(|p| p.redemption_fee).unwrap_or(0.0);

        let margin = lst_price + ds_price + redemption_fee;
        if margin >= 1.0 {
            return Ok(());
        }
        let intent = buying_intent_increasing_below_1(margin, 1.0, 3.0);
        let spend = (intent * 100.0 / 100.0) * handle.eth_balance();
        let combined_price = ds_price + lst_price;
        if combined_price <= 0.0 {
            return Ok(());
        }
        let token_count = (spend / combined_price).floor();
        if token_count <= 0.0 {
            return Ok(());
        }

        let ds_amount_in_eth = token_count * ds_price;
        if handle.calculate_buy_ds_outcome(&self.lst_symbol, ds_amount_in_eth).unwrap_or(0.0) <= 0.0 {
            return Ok(());
        }
        handle.buy_ds(&self.lst_symbol, ds_amount_in_eth)?;

        let lst_amount_in_eth = token_count * lst_price;
        handle.swap_eth_for_token(&self.lst_symbol, lst_amount_in_eth)?;

        let lst_balance = handle.balance_of(&self.lst_symbol);
        let ds_balance = handle.balance_of(&ds_symbol);
        let redemption_amount = lst_balance.min(ds_balance);
        if redemption_amount > 0.0 {
            handle.psm_redeem_with_lst_and_ds(&self.lst_symbol, redemption_amount)?;
            handle.log_action(format!(
                "{}: redemption arbitrage closed {redemption_amount:.4} LST+DS (margin={margin:.4})",
                self.name
            ));
        }
        Ok(())
    }
}

/// Mirror image of the redemption arbitrage: buys the LST+DS bundle from
/// the PSM's repurchase window whenever `LST + DS > 1 + fee` and sells the
/// pair back to the market.
pub struct RepurchaseArbitrageAgent {
    name: String,
    lst_symbol: String,
}

impl RepurchaseArbitrageAgent {
    pub fn new(name: impl Into<String>, lst_symbol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lst_symbol: lst_symbol.into(),
        }
    }
}

impl Agent for RepurchaseArbitrageAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_block_mined(&mut self, handle: &mut AgentHandle, _block: u64) -> SimResult<()> {
        let ds_symbol = format!("DS_{}", self.lst_symbol);
        let ds_price = handle.amm(&ds_symbol).map(|a| a.price_of_one_token_in_eth()).unwrap_or(1.0);
        let lst_price = handle.amm(&self.lst_symbol).map(|a| a.price_of_one_token_in_eth()).unwrap_or(1.0);
        let repurchase_fee = handle.psm(&self.lst_symbol).map(|p| p.repurchase_fee).unwrap_or(0.0);

        if lst_price + ds_price <= 1.0 + repurchase_fee {
            return Ok(());
        }
        let intent = buying_intent_increasing_above_1(lst_price + ds_price - repurchase_fee, 3.0);
        let potential = intent * handle.eth_balance();
        let token_reserve = handle.psm(&self.lst_symbol).map(|p| p.token_reserve).unwrap_or(0.0);
        let transaction_amount = potential.min(handle.eth_balance()).min(token_reserve);
        if transaction_amount <= 0.0 {
            return Ok(());
        }

        let received = handle.psm_repurchase_lst_and_ds(&self.lst_symbol, transaction_amount)?;
        if received > 0.0 {
            handle.sell_ds(&self.lst_symbol, received)?;
            handle.swap_token_for_eth(&self.lst_symbol, received)?;
            handle.log_action(format!(
                "{}: repurchase arbitrage closed {received:.4} LST+DS (spread={:.4})",
                self.name,
                lst_price + ds_price - 1.0
            ));
        }
        Ok(())
    }
}
