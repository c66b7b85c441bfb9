//! The `Engine`: genesis wiring, per-block yield distribution, event
//! application, shuffled agent dispatch, and the end-of-block borrow-ledger
//! check.
//!
//! `Engine` is the sole owner of every entity — wallets, AMMs, PSMs,
//! vaults, agents (see DESIGN.md). Composite operations that would
//! otherwise need two simultaneous `&mut` borrows into `Engine`'s own
//! fields go through the `let Engine { a, b, .. } = self;` destructuring
//! trick below; the Vault and EventManager routines that need the same
//! trick across module boundaries take `&mut Engine` directly instead
//! (see `vault.rs`, `events.rs`).

use std::collections::{BTreeMap, HashMap};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::agent::{Agent, AgentHandle};
use crate::amm::{Amm, AmmKind};
use crate::config::{EngineConfig, TokenConfig};
use crate::error::{SimError, SimResult};
use crate::events::EventManager;
use crate::psm::Psm;
use crate::stats::StatsRecorder;
use crate::vault::Vault;
use crate::wallet::{Wallet, WalletId};

#[derive(Debug, Clone, Copy)]
struct TokenInfo {
    yield_per_block: f64,
    expiry_block: u64,
    initial_agent_balance: f64,
}

/// ETH the genesis wallet deposits into a freshly registered token's PSM so
/// CT/DS supply exists before any agent can trade, mirroring the original's
/// `psm.deposit_eth(self.genesis_wallet, 100)`.
const PSM_GENESIS_SEED_ETH: f64 = 100.0;

struct AgentSlot {
    wallet_id: WalletId,
    strategy: String,
    agent: Box<dyn Agent>,
}

pub struct Engine {
    wallets: Vec<Wallet>,
    amms: HashMap<String, Amm>,
    psms: HashMap<String, Psm>,
    vaults: HashMap<String, Vault>,
    tokens: HashMap<String, TokenInfo>,
    agents: Vec<AgentSlot>,

    event_manager: EventManager,
    pub stats: StatsRecorder,

    pub current_block: u64,
    pub num_blocks: u64,
    pub eth_yield_per_block: f64,

    borrowed_eth: HashMap<WalletId, f64>,
    borrowed_tokens: HashMap<WalletId, HashMap<String, f64>>,

    genesis_wallet: WalletId,
    actions: Vec<String>,
    print_stats: bool,
    rng: StdRng,
}

impl Engine {
    pub fn new(config: &EngineConfig) -> Self {
        let mut engine = Self {
            wallets: Vec::new(),
            amms: HashMap::new(),
            psms: HashMap::new(),
            vaults: HashMap::new(),
            tokens: HashMap::new(),
            agents: Vec::new(),
            event_manager: EventManager::default(),
            stats: StatsRecorder::new(),
            current_block: 0,
            num_blocks: config.num_blocks,
            eth_yield_per_block: config.eth_yield_per_block,
            borrowed_eth: HashMap::new(),
            borrowed_tokens: HashMap::new(),
            genesis_wallet: WalletId(0),
            actions: Vec::new(),
            print_stats: false,
            rng: StdRng::seed_from_u64(config.seed),
        };

        let event_wallet = engine.new_wallet("EventManager");
        engine.event_manager = EventManager::new(Vec::new(), event_wallet);
        engine.genesis_wallet = engine.new_wallet("Genesis");

        for token_config in &config.tokens {
            engine.register_token(token_config);
        }
        engine
    }

    fn register_token(&mut self, tc: &TokenConfig) {
        self.tokens.insert(
            tc.symbol.clone(),
            TokenInfo {
                yield_per_block: tc.yield_per_block,
                expiry_block: tc.expiry_block,
                initial_agent_balance: tc.initial_agent_balance,
            },
        );

        self.amms.insert(
            tc.symbol.clone(),
            Amm::new(
                tc.symbol.clone(),
                AmmKind::ConstantProduct,
                tc.initial_eth_reserve,
                tc.initial_lst_reserve,
                tc.lst_amm_fee,
            ),
        );

        let ct_symbol = format!("CT_{}", tc.symbol);
        self.amms.insert(
            ct_symbol.clone(),
            Amm::new(
                ct_symbol,
                AmmKind::YieldSpace { discount_rate: tc.ct_discount_rate },
                tc.initial_ct_eth_reserve,
                tc.initial_ct_reserve,
                tc.ct_amm_fee,
            ),
        );

        let ds_symbol = format!("DS_{}", tc.symbol);
        self.amms.insert(
            ds_symbol.clone(),
            Amm::new(
                ds_symbol,
                AmmKind::YieldSpace { discount_rate: tc.ds_discount_rate },
                tc.initial_ds_eth_reserve,
                tc.initial_ds_reserve,
                tc.ds_amm_fee,
            ),
        );

        self.psms.insert(
            tc.symbol.clone(),
            Psm::new(tc.symbol.clone(), tc.expiry_block, tc.psm_redemption_fee, tc.psm_repurchase_fee),
        );

        // Seed the PSM from the genesis wallet so CT/DS supply exists before
        // any agent trades; otherwise eth_reserve/token_reserve start at 0
        // and the first redeem fails with InsufficientReserve.
        let genesis_wallet = self.genesis_wallet;
        self.fund_wallet_eth(genesis_wallet, PSM_GENESIS_SEED_ETH)
            .expect("crediting the genesis wallet cannot fail");
        self.psm_deposit_eth(&tc.symbol, genesis_wallet, PSM_GENESIS_SEED_ETH)
            .expect("genesis wallet was just funded with exactly this amount");

        let vault_wallet = self.new_wallet(format!("Vault:{}", tc.symbol));
        self.vaults
            .insert(tc.symbol.clone(), Vault::new(tc.symbol.clone(), tc.vault_reserve_ct_ratio, vault_wallet));
    }

    // ---- wallets ----------------------------------------------------

    pub fn new_wallet(&mut self, owner: impl Into<String>) -> WalletId {
        let id = WalletId(self.wallets.len());
        self.wallets.push(Wallet::new(owner));
        id
    }

    pub fn wallet(&self, id: WalletId) -> &Wallet {
        &self.wallets[id.0]
    }

    pub(crate) fn wallet_mut(&mut self, id: WalletId) -> &mut Wallet {
        &mut self.wallets[id.0]
    }

    pub fn wallet_owner(&self, id: WalletId) -> String {
        self.wallets[id.0].owner.clone()
    }

    pub fn wallet_eth_balance(&self, id: WalletId) -> f64 {
        self.wallets[id.0].eth
    }

    pub fn wallet_balance_of(&self, id: WalletId, symbol: &str) -> f64 {
        self.wallets[id.0].balance_of(symbol)
    }

    /// The investor's share of a Vault's LP tokens for `lst_symbol`
    /// (distinct from a raw AMM pool's LP shares, which are keyed by the
    /// pool's own symbol and read directly off `wallet()`).
    pub fn wallet_lp_balance(&self, id: WalletId, lst_symbol: &str) -> f64 {
        self.wallets[id.0].lp_balance(&format!("V_{lst_symbol}"))
    }

    pub fn wallet_deposit_eth(&mut self, id: WalletId, amount: f64) -> SimResult<()> {
        self.wallets[id.0].deposit_eth(amount)
    }

    pub fn wallet_withdraw_eth(&mut self, id: WalletId, amount: f64) -> SimResult<()> {
        self.wallets[id.0].withdraw_eth(amount)
    }

    pub fn wallet_deposit_token(&mut self, id: WalletId, symbol: &str, amount: f64) -> SimResult<()> {
        self.wallets[id.0].deposit_token(symbol, amount)
    }

    pub fn wallet_withdraw_token(&mut self, id: WalletId, symbol: &str, amount: f64) -> SimResult<()> {
        self.wallets[id.0].withdraw_token(symbol, amount)
    }

    pub fn wallet_deposit_lp(&mut self, id: WalletId, pool_id: &str, shares: f64) -> SimResult<()> {
        self.wallets[id.0].deposit_lp(pool_id, shares)
    }

    pub fn wallet_withdraw_lp(&mut self, id: WalletId, pool_id: &str, shares: f64) -> SimResult<()> {
        self.wallets[id.0].withdraw_lp(pool_id, shares)
    }

    /// Credit `id`'s balance directly, used by the EventManager to fund its
    /// own internal wallet before routing a depeg/repeg through a real swap.
    pub fn fund_wallet_eth(&mut self, id: WalletId, amount: f64) -> SimResult<()> {
        self.wallet_deposit_eth(id, amount)
    }

    pub fn fund_wallet_token(&mut self, id: WalletId, symbol: &str, amount: f64) -> SimResult<()> {
        self.wallet_deposit_token(id, symbol, amount)
    }

    // ---- token registry ----------------------------------------------

    pub fn has_token(&self, symbol: &str) -> bool {
        self.tokens.contains_key(symbol)
    }

    pub fn token_symbols(&self) -> Vec<String> {
        self.tokens.keys().cloned().collect()
    }

    pub fn token_yield(&self, symbol: &str) -> f64 {
        self.tokens.get(symbol).map(|t| t.yield_per_block).unwrap_or(0.0)
    }

    pub fn set_token_yield(&mut self, symbol: &str, rate: f64) {
        if let Some(t) = self.tokens.get_mut(symbol) {
            t.yield_per_block = rate;
        }
    }

    pub fn token_expiry(&self, symbol: &str) -> Option<u64> {
        self.tokens.get(symbol).map(|t| t.expiry_block)
    }

    // ---- AMMs ----------------------------------------------------------

    pub fn amm(&self, symbol: &str) -> Option<&Amm> {
        self.amms.get(symbol)
    }

    pub fn amm_mut(&mut self, symbol: &str) -> Option<&mut Amm> {
        self.amms.get_mut(symbol)
    }

    pub fn amms_iter(&self) -> impl Iterator<Item = (&String, &Amm)> {
        self.amms.iter()
    }

    pub fn amm_add_liquidity(&mut self, symbol: &str, wallet_id: WalletId, amount_eth: f64, amount_token: f64) -> SimResult<f64> {
        let Engine { amms, wallets, .. } = self;
        let amm = amms.get_mut(symbol).ok_or_else(|| SimError::UnknownToken(symbol.to_string()))?;
        let wallet = wallets.get_mut(wallet_id.0).ok_or(SimError::UnknownWallet(wallet_id))?;
        amm.add_liquidity(wallet_id, wallet, amount_eth, amount_token)
    }

    pub fn amm_remove_liquidity(&mut self, symbol: &str, wallet_id: WalletId, shares: f64) -> SimResult<(f64, f64)> {
        let Engine { amms, wallets, .. } = self;
        let amm = amms.get_mut(symbol).ok_or_else(|| SimError::UnknownToken(symbol.to_string()))?;
        let wallet = wallets.get_mut(wallet_id.0).ok_or(SimError::UnknownWallet(wallet_id))?;
        amm.remove_liquidity(wallet_id, wallet, shares)
    }

    pub fn amm_swap_eth_for_token(&mut self, symbol: &str, wallet_id: WalletId, amount_eth: f64, current_block: u64) -> SimResult<f64> {
        let Engine { amms, wallets, .. } = self;
        let amm = amms.get_mut(symbol).ok_or_else(|| SimError::UnknownToken(symbol.to_string()))?;
        let wallet = wallets.get_mut(wallet_id.0).ok_or(SimError::UnknownWallet(wallet_id))?;
        amm.swap_eth_for_token(wallet, amount_eth, current_block)
    }

    pub fn amm_swap_token_for_eth(&mut self, symbol: &str, wallet_id: WalletId, amount_token: f64, current_block: u64) -> SimResult<f64> {
        let Engine { amms, wallets, .. } = self;
        let amm = amms.get_mut(symbol).ok_or_else(|| SimError::UnknownToken(symbol.to_string()))?;
        let wallet = wallets.get_mut(wallet_id.0).ok_or(SimError::UnknownWallet(wallet_id))?;
        amm.swap_token_for_eth(wallet, amount_token, current_block)
    }

    // ---- PSMs ------------------------------------------------------------

    pub fn psm(&self, symbol: &str) -> Option<&Psm> {
        self.psms.get(symbol)
    }

    pub(crate) fn psm_mut(&mut self, symbol: &str) -> Option<&mut Psm> {
        self.psms.get_mut(symbol)
    }

    pub fn psms_iter(&self) -> impl Iterator<Item = (&String, &Psm)> {
        self.psms.iter()
    }

    pub fn psm_deposit_eth(&mut self, symbol: &str, wallet_id: WalletId, amount_eth: f64) -> SimResult<()> {
        let Engine { psms, wallets, .. } = self;
        let psm = psms.get_mut(symbol).ok_or_else(|| SimError::UnknownToken(symbol.to_string()))?;
        let wallet = wallets.get_mut(wallet_id.0).ok_or(SimError::UnknownWallet(wallet_id))?;
        psm.deposit_eth(wallet, amount_eth)
    }

    pub fn psm_redeem_with_ct_and_ds(&mut self, symbol: &str, wallet_id: WalletId, n: f64) -> SimResult<f64> {
        let block = self.current_block;
        let Engine { psms, wallets, .. } = self;
        let psm = psms.get_mut(symbol).ok_or_else(|| SimError::UnknownToken(symbol.to_string()))?;
        let wallet = wallets.get_mut(wallet_id.0).ok_or(SimError::UnknownWallet(wallet_id))?;
        psm.redeem_with_ct_and_ds(wallet, n, block)
    }

    pub fn psm_redeem_with_lst_and_ds(&mut self, symbol: &str, wallet_id: WalletId, n: f64) -> SimResult<f64> {
        let block = self.current_block;
        let Engine { psms, wallets, .. } = self;
        let psm = psms.get_mut(symbol).ok_or_else(|| SimError::UnknownToken(symbol.to_string()))?;
        let wallet = wallets.get_mut(wallet_id.0).ok_or(SimError::UnknownWallet(wallet_id))?;
        psm.redeem_with_lst_and_ds(wallet, n, block)
    }

    pub fn psm_redeem_with_ct_post_expiry(&mut self, symbol: &str, wallet_id: WalletId, n: f64) -> SimResult<f64> {
        let block = self.current_block;
        let Engine { psms, wallets, .. } = self;
        let psm = psms.get_mut(symbol).ok_or_else(|| SimError::UnknownToken(symbol.to_string()))?;
        let wallet = wallets.get_mut(wallet_id.0).ok_or(SimError::UnknownWallet(wallet_id))?;
        psm.redeem_with_ct_post_expiry(wallet, n, block)
    }

    pub fn psm_repurchase_lst_and_ds(&mut self, symbol: &str, wallet_id: WalletId, amount_eth: f64) -> SimResult<f64> {
        let Engine { psms, wallets, .. } = self;
        let psm = psms.get_mut(symbol).ok_or_else(|| SimError::UnknownToken(symbol.to_string()))?;
        let wallet = wallets.get_mut(wallet_id.0).ok_or(SimError::UnknownWallet(wallet_id))?;
        psm.repurchase_lst_and_ds(wallet, amount_eth)
    }

    // ---- Vaults ----------------------------------------------------------

    pub fn vault(&self, symbol: &str) -> Option<&Vault> {
        self.vaults.get(symbol)
    }

    pub fn vault_mut(&mut self, symbol: &str) -> Option<&mut Vault> {
        self.vaults.get_mut(symbol)
    }

    pub fn vaults_iter(&self) -> impl Iterator<Item = (&String, &Vault)> {
        self.vaults.iter()
    }

    // ---- borrow ledger -----------------------------------------------

    pub fn borrow_eth(&mut self, wallet_id: WalletId, amount: f64) -> SimResult<()> {
        if amount <= 0.0 {
            return Err(SimError::BadAmount(amount));
        }
        self.wallet_deposit_eth(wallet_id, amount)?;
        *self.borrowed_eth.entry(wallet_id).or_insert(0.0) += amount;
        Ok(())
    }

    pub fn repay_eth(&mut self, wallet_id: WalletId, amount: f64) -> SimResult<()> {
        if amount <= 0.0 {
            return Err(SimError::BadAmount(amount));
        }
        let owed = self.borrowed_eth.get(&wallet_id).copied().unwrap_or(0.0);
        if amount - owed > 1e-6 {
            return Err(SimError::OverRepay {
                wallet: self.wallet_owner(wallet_id),
                token: "ETH".to_string(),
                amount,
                borrowed: owed,
            });
        }
        self.wallet_withdraw_eth(wallet_id, amount)?;
        let remaining = self.borrowed_eth.entry(wallet_id).or_insert(0.0);
        *remaining -= amount;
        if remaining.abs() < 1e-9 {
            self.borrowed_eth.remove(&wallet_id);
        }
        Ok(())
    }

    pub fn borrow_token(&mut self, wallet_id: WalletId, symbol: &str, amount: f64) -> SimResult<()> {
        if amount <= 0.0 {
            return Err(SimError::BadAmount(amount));
        }
        self.wallet_deposit_token(wallet_id, symbol, amount)?;
        *self
            .borrowed_tokens
            .entry(wallet_id)
            .or_default()
            .entry(symbol.to_string())
            .or_insert(0.0) += amount;
        Ok(())
    }

    pub fn repay_token(&mut self, wallet_id: WalletId, symbol: &str, amount: f64) -> SimResult<()> {
        if amount <= 0.0 {
            return Err(SimError::BadAmount(amount));
        }
        let owed = self
            .borrowed_tokens
            .get(&wallet_id)
            .and_then(|m| m.get(symbol))
            .copied()
            .unwrap_or(0.0);
        if amount - owed > 1e-6 {
            return Err(SimError::OverRepay {
                wallet: self.wallet_owner(wallet_id),
                token: symbol.to_string(),
                amount,
                borrowed: owed,
            });
        }
        self.wallet_withdraw_token(wallet_id, symbol, amount)?;
        if let Some(map) = self.borrowed_tokens.get_mut(&wallet_id) {
            if let Some(entry) = map.get_mut(symbol) {
                *entry -= amount;
                if entry.abs() < 1e-9 {
                    map.remove(symbol);
                }
            }
            if map.is_empty() {
                self.borrowed_tokens.remove(&wallet_id);
            }
        }
        Ok(())
    }

    /// Read/write access to the raw borrow ledger, used by Vault routines to
    /// snapshot and restore state around a repayment loop that may fail
    /// partway through.
    pub(crate) fn borrowed_eth_of(&self, wallet_id: WalletId) -> f64 {
        self.borrowed_eth.get(&wallet_id).copied().unwrap_or(0.0)
    }

    pub(crate) fn set_borrowed_eth_of(&mut self, wallet_id: WalletId, amount: f64) {
        if amount.abs() < 1e-9 {
            self.borrowed_eth.remove(&wallet_id);
        } else {
            self.borrowed_eth.insert(wallet_id, amount);
        }
    }

    pub(crate) fn borrowed_token_of(&self, wallet_id: WalletId, symbol: &str) -> f64 {
        self.borrowed_tokens.get(&wallet_id).and_then(|m| m.get(symbol)).copied().unwrap_or(0.0)
    }

    pub(crate) fn set_borrowed_token_of(&mut self, wallet_id: WalletId, symbol: &str, amount: f64) {
        if amount.abs() < 1e-9 {
            if let Some(map) = self.borrowed_tokens.get_mut(&wallet_id) {
                map.remove(symbol);
                if map.is_empty() {
                    self.borrowed_tokens.remove(&wallet_id);
                }
            }
        } else {
            self.borrowed_tokens.entry(wallet_id).or_default().insert(symbol.to_string(), amount);
        }
    }

    pub fn total_outstanding_eth_debt(&self) -> f64 {
        self.borrowed_eth.values().sum()
    }

    pub fn total_outstanding_token_debt(&self) -> f64 {
        self.borrowed_tokens.values().flat_map(|m| m.values()).sum()
    }

    pub fn total_outstanding_token_debt_by_symbol(&self) -> BTreeMap<String, f64> {
        let mut out = BTreeMap::new();
        for by_symbol in self.borrowed_tokens.values() {
            for (symbol, amount) in by_symbol {
                *out.entry(symbol.clone()).or_insert(0.0) += amount;
            }
        }
        out
    }

    fn check_borrow_invariant(&self, block: u64) -> SimResult<()> {
        let eth = self.total_outstanding_eth_debt();
        let tokens: Vec<(String, f64)> = self
            .total_outstanding_token_debt_by_symbol()
            .into_iter()
            .filter(|(_, amount)| amount.abs() > 1e-9)
            .collect();
        if eth.abs() > 1e-9 || !tokens.is_empty() {
            return Err(SimError::OutstandingDebt { block, eth, tokens });
        }
        Ok(())
    }

    // ---- agents ------------------------------------------------------

    pub fn add_agent(&mut self, wallet_id: WalletId, strategy: impl Into<String>, agent: Box<dyn Agent>) {
        self.agents.push(AgentSlot { wallet_id, strategy: strategy.into(), agent });
    }

    pub fn agent_wallets(&self) -> Vec<(WalletId, String, String)> {
        self.agents
            .iter()
            .map(|slot| (slot.wallet_id, self.wallets[slot.wallet_id.0].owner.clone(), slot.strategy.clone()))
            .collect()
    }

    // ---- events / misc -------------------------------------------------

    pub fn event_manager_wallet(&self) -> WalletId {
        self.event_manager.wallet_id()
    }

    pub fn set_event_manager(&mut self, event_manager: EventManager) {
        self.event_manager = event_manager;
    }

    pub fn add_action(&mut self, msg: String) {
        if self.print_stats {
            println!("{msg}");
        }
        self.actions.push(msg);
    }

    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    // ---- the block loop ------------------------------------------------

    fn run_genesis(&mut self) -> SimResult<()> {
        let token_balances: Vec<(String, f64)> = self
            .tokens
            .iter()
            .filter(|(_, t)| t.initial_agent_balance > 0.0)
            .map(|(symbol, t)| (symbol.clone(), t.initial_agent_balance))
            .collect();
        let agent_wallets: Vec<WalletId> = self.agents.iter().map(|slot| slot.wallet_id).collect();
        for wallet_id in agent_wallets {
            for (symbol, amount) in &token_balances {
                self.wallet_deposit_token(wallet_id, symbol, *amount)?;
            }
        }

        let mut agents = std::mem::take(&mut self.agents);
        for slot in &mut agents {
            let mut handle = AgentHandle { engine: self, wallet_id: slot.wallet_id };
            slot.agent.on_after_genesis(&mut handle)?;
        }
        self.agents = agents;
        Ok(())
    }

    /// Rebase every wallet's ETH balance by the global yield rate, and
    /// every registered LST's wallet token balances by that token's own
    /// `yield_per_block`. Only wallet balances rebase — AMM pool reserves
    /// are untouched, so yield never drifts a pool's spot price. CT/DS do
    /// not rebase — they are fixed-maturity claims.
    fn distribute_yield(&mut self, block: u64) {
        let eth_rate = self.eth_yield_per_block;
        if eth_rate != 0.0 {
            for wallet in &mut self.wallets {
                wallet.eth *= 1.0 + eth_rate;
            }
        }

        let rates: Vec<(String, f64)> = self.tokens.iter().map(|(s, t)| (s.clone(), t.yield_per_block)).collect();
        for (symbol, rate) in rates {
            if rate == 0.0 {
                continue;
            }
            for wallet in &mut self.wallets {
                if let Some(balance) = wallet.token_balances.get_mut(&symbol) {
                    *balance *= 1.0 + rate;
                }
            }
        }
        self.add_action(format!("Block {block}: distributed yield (eth_rate={eth_rate:.6})."));
    }

    fn dispatch_agents(&mut self, block: u64) -> SimResult<()> {
        let mut order: Vec<usize> = (0..self.agents.len()).collect();
        order.shuffle(&mut self.rng);

        let mut agents = std::mem::take(&mut self.agents);
        for idx in order {
            let slot = &mut agents[idx];
            let mut handle = AgentHandle { engine: self, wallet_id: slot.wallet_id };
            slot.agent.on_block_mined(&mut handle, block)?;
        }
        self.agents = agents;
        Ok(())
    }

    /// Run the full simulation: genesis callbacks, then `num_blocks`
    /// rounds of yield distribution, scheduled events, shuffled agent
    /// dispatch, and the borrow-ledger check, snapshotting stats at the
    /// end of each block.
    pub fn start_mining(&mut self, print_stats: bool) -> SimResult<()> {
        self.print_stats = print_stats;
        self.run_genesis()?;
        self.stats.record(0, self);

        for block in 1..=self.num_blocks {
            self.current_block = block;
            self.distribute_yield(block);

            let event_manager = self.event_manager.clone();
            event_manager.apply(block, self)?;

            self.dispatch_agents(block)?;
            self.check_borrow_invariant(block)?;
            self.stats.record(block, self);
        }
        Ok(())
    }

    /// Fan out `runs` independent simulations over a `rayon` thread pool,
    /// each reusing `config` but with a distinct RNG seed, after letting
    /// `build` register that run's agents. Returns one result per run, in
    /// no particular order; a run that hits a fatal error (most likely
    /// `SimError::OutstandingDebt`) surfaces as `Err` rather than panicking
    /// the whole fan-out.
    pub fn monte_carlo<F>(config: &EngineConfig, runs: usize, build: F, progress: Option<&indicatif::ProgressBar>) -> Vec<SimResult<StatsRecorder>>
    where
        F: Fn(&mut Engine) + Sync,
    {
        (0..runs)
            .into_par_iter()
            .map(|i| {
                let mut run_config = config.clone();
                run_config.seed = config.seed.wrapping_add(i as u64);
                let mut engine = Engine::new(&run_config);
                build(&mut engine);
                let result = engine.start_mining(false).map(|_| engine.stats);
                if let Some(pb) = progress {
                    pb.inc(1);
                }
                result
            })
            .collect()
    }
}
