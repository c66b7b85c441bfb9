//! Time-indexed schedule of protocol perturbations.
//!
//! Dispatch goes through an enumerated `EventKind` rather than a string
//! tag, so an unrecognized kind is a compile error, not a silent no-op.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::Engine;
use crate::error::{SimError, SimResult};
use crate::wallet::WalletId;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Depeg,
    Repeg,
    YieldAdjust,
    EthYieldAdjust,
    SetPrice,
    InjectLiquidity,
}

/// One scheduled perturbation. Total order is by `block`; ties resolve by
/// the order events were inserted (schedule order).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Event {
    pub block: u64,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub token: String,
    /// `depeg` / `yield_adjustment` / `eth_yield_adjustment` payload.
    /// For `depeg`, `p in (0,1]` drops the token by `p`; negative `p`
    /// depegs upward. `repeg` ignores this field (always targets 1.0).
    #[serde(default)]
    pub percentage: Option<f64>,
    /// `set_price` / `inject_liquidity` payload: `-1 < delta < 0` is a
    /// fractional withdrawal of current reserves; otherwise absolute.
    #[serde(default)]
    pub delta: Option<f64>,
}

/// Raw wire shape of the event file: a JSON array of event objects.
#[derive(Debug, Deserialize)]
struct EventFile(Vec<Event>);

/// Holds the time-ordered event list and the internal wallet used to route
/// depeg/repeg perturbations through the normal swap path so fee
/// accounting and reserves update identically to an agent-driven trade.
#[derive(Debug, Clone, Default)]
pub struct EventManager {
    events: Vec<Event>,
    wallet_id: WalletId,
}

impl EventManager {
    pub fn new(events: Vec<Event>, wallet_id: WalletId) -> Self {
        Self { events, wallet_id }
    }

    pub fn from_json(path: impl AsRef<Path>, wallet_id: WalletId) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("reading events file {}: {e}", path.as_ref().display()))?;
        let EventFile(events) = serde_json::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("parsing events file {}: {e}", path.as_ref().display()))?;
        Ok(Self::new(events, wallet_id))
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn wallet_id(&self) -> WalletId {
        self.wallet_id
    }

    /// Apply every event scheduled for `block`, in schedule order.
    pub fn apply(&self, block: u64, engine: &mut Engine) -> SimResult<()> {
        for event in self.events.iter().filter(|e| e.block == block) {
            if !engine.has_token(&event.token) {
                continue;
            }
            match event.kind {
                EventKind::Depeg => {
                    let pct = event.percentage.unwrap_or(0.0);
                    self.depeg(engine, &event.token, pct)?;
                }
                EventKind::Repeg => {
                    self.repeg(engine, &event.token)?;
                }
                EventKind::SetPrice | EventKind::InjectLiquidity => {
                    let delta = event.delta.unwrap_or(0.0);
                    self.adjust_reserves(engine, &event.token, delta, event.kind)?;
                }
                EventKind::YieldAdjust => {
                    let pct = event.percentage.unwrap_or(0.0);
                    engine.set_token_yield(&event.token, pct);
                    engine.add_action(format!(
                        "Block {block}: adjusted yield for {} to {:.2}%.",
                        event.token,
                        pct * 100.0
                    ));
                }
                EventKind::EthYieldAdjust => {
                    let pct = event.percentage.unwrap_or(0.0);
                    engine.eth_yield_per_block = pct;
                    engine.add_action(format!("Block {block}: adjusted ETH yield to {:.2}%.", pct * 100.0));
                }
            }
        }
        Ok(())
    }

    /// Push the pool's reserves toward `target_price = spot * (1 - pct)` by
    /// solving `x' = sqrt(k * p*)`, `y' = sqrt(k / p*)` under the
    /// constant-product invariant, then executing the implied swap through
    /// the normal AMM path.
    fn depeg(&self, engine: &mut Engine, token: &str, pct: f64) -> SimResult<()> {
        let (current_price, k) = {
            let amm = engine.amm(token).ok_or_else(|| SimError::UnknownToken(token.to_string()))?;
            (amm.price_of_one_token_in_eth(), amm.reserve_eth * amm.reserve_token)
        };
        let target_price = current_price * (1.0 - pct);
        if target_price <= 0.0 {
            return Err(SimError::BadAmount(target_price));
        }
        let x_new = (k * target_price).sqrt();
        let y_new = (k / target_price).sqrt();
        self.swap_to_reserves(engine, token, x_new, y_new)?;
        let final_price = engine.amm(token).unwrap().price_of_one_token_in_eth();
        engine.add_action(format!(
            "Block {}: depegged {token} from {current_price:.4} ETH to {final_price:.4} ETH.",
            engine.current_block
        ));
        Ok(())
    }

    /// Push reserves back to a 1:1 price (x_new == y_new == sqrt(k)).
    fn repeg(&self, engine: &mut Engine, token: &str) -> SimResult<()> {
        let (current_price, k) = {
            let amm = engine.amm(token).ok_or_else(|| SimError::UnknownToken(token.to_string()))?;
            (amm.price_of_one_token_in_eth(), amm.reserve_eth * amm.reserve_token)
        };
        if (current_price - 1.0).abs() < 1e-6 {
            return Ok(());
        }
        let target = k.sqrt();
        self.swap_to_reserves(engine, token, target, target)?;
        let final_price = engine.amm(token).unwrap().price_of_one_token_in_eth();
        engine.add_action(format!(
            "Block {}: repegged {token} from {current_price:.4} ETH to {final_price:.4} ETH.",
            engine.current_block
        ));
        Ok(())
    }

    fn swap_to_reserves(&self, engine: &mut Engine, token: &str, x_new: f64, y_new: f64) -> SimResult<()> {
        let (reserve_eth, reserve_token) = {
            let amm = engine.amm(token).unwrap();
            (amm.reserve_eth, amm.reserve_token)
        };
        let delta_x = x_new - reserve_eth;
        let delta_y = y_new - reserve_token;
        let block = engine.current_block;

        if delta_y > 0.0 {
            // Token reserve must grow: swap delta_y tokens into the pool for ETH.
            engine.fund_wallet_token(self.wallet_id, token, delta_y)?;
            engine.amm_swap_token_for_eth(token, self.wallet_id, delta_y, block)?;
        } else if delta_x > 0.0 {
            // ETH reserve must grow: swap delta_x ETH into the pool for tokens.
            engine.fund_wallet_eth(self.wallet_id, delta_x)?;
            engine.amm_swap_eth_for_token(token, self.wallet_id, delta_x, block)?;
        }
        Ok(())
    }

    /// Direct reserve mutation for `SetPrice`/`InjectLiquidity`: negative
    /// `delta` in `(-1, 0)` is a fractional withdrawal of current
    /// reserves, otherwise an absolute ETH+token injection split 1:1 with
    /// the current spot price.
    fn adjust_reserves(&self, engine: &mut Engine, token: &str, delta: f64, kind: EventKind) -> SimResult<()> {
        let amm = engine
            .amm_mut(token)
            .ok_or_else(|| SimError::UnknownToken(token.to_string()))?;
        if delta > -1.0 && delta < 0.0 {
            let frac = -delta;
            amm.reserve_eth *= 1.0 - frac;
            amm.reserve_token *= 1.0 - frac;
        } else {
            let price = amm.price_of_one_token_in_eth();
            amm.reserve_eth += delta;
            amm.reserve_token += delta / price;
        }
        engine.add_action(format!(
            "Block {}: {:?} applied to {token} (delta={delta:.4}).",
            engine.current_block, kind
        ));
        Ok(())
    }
}

impl EventKind {
    pub fn label(self) -> &'static str {
        match self {
            EventKind::Depeg => "depeg",
            EventKind::Repeg => "repeg",
            EventKind::YieldAdjust => "yield_adjustment",
            EventKind::EthYieldAdjust => "eth_yield_adjustment",
            EventKind::SetPrice => "set_price",
            EventKind::InjectLiquidity => "inject_liquidity",
        }
    }
}
