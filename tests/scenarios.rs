//! Scenario-level coverage of the engine's end-to-end behavior.

use approx::assert_relative_eq;

use depeg_sim::agent::{Agent, AgentHandle, RedemptionArbitrageAgent};
use depeg_sim::config::{EngineConfig, TokenConfig};
use depeg_sim::error::SimError;
use depeg_sim::events::{Event, EventKind, EventManager};
use depeg_sim::vault;
use depeg_sim::Engine;

fn flat_token(symbol: &str, expiry_block: u64) -> TokenConfig {
    TokenConfig {
        symbol: symbol.to_string(),
        expiry_block,
        initial_eth_reserve: 1_000_000.0,
        initial_lst_reserve: 1_000_000.0,
        initial_ct_eth_reserve: 500_000.0,
        initial_ct_reserve: 500_000.0,
        initial_ds_eth_reserve: 200_000.0,
        initial_ds_reserve: 500_000.0,
        lst_amm_fee: 0.0,
        ct_amm_fee: 0.0,
        ds_amm_fee: 0.0,
        ct_discount_rate: 0.05,
        ds_discount_rate: 0.05,
        psm_redemption_fee: 0.001,
        psm_repurchase_fee: 0.05,
        vault_reserve_ct_ratio: 0.4,
        yield_per_block: 0.0,
        initial_agent_balance: 0.0,
    }
}

/// Scenario 1: empty events, no agents. Prices stay put, no trades, the
/// borrow ledger is empty after every block.
#[test]
fn empty_events_no_agents_holds_prices_flat() {
    let config = EngineConfig {
        num_blocks: 10,
        eth_yield_per_block: 0.0,
        seed: 1,
        tokens: vec![flat_token("X", 1000)],
        events_path: None,
    };
    let mut engine = Engine::new(&config);
    engine.start_mining(false).unwrap();

    for amm in engine.stats.amms.iter().filter(|a| a.symbol == "X") {
        assert_relative_eq!(amm.price_eth, 1.0, epsilon = 1e-9);
    }
    let spot_x = engine.amm("X").unwrap().price_of_one_token_in_eth();
    assert_relative_eq!(spot_x, 1.0, epsilon = 1e-9);
    assert!(engine.stats.trades.is_empty());
    assert_eq!(engine.total_outstanding_eth_debt(), 0.0);
}

/// Scenario 2: a single vault deposit mints LP 1:1 on the first provision
/// and leaves a residual DS balance in the vault's own wallet.
#[test]
fn single_deposit_mints_lp_and_leaves_residual_ds() {
    let config = EngineConfig {
        num_blocks: 10,
        eth_yield_per_block: 0.0,
        seed: 2,
        tokens: vec![flat_token("X", 1000)],
        events_path: None,
    };
    let mut engine = Engine::new(&config);
    let investor = engine.new_wallet("depositor");
    engine.wallet_deposit_eth(investor, 100.0).unwrap();

    vault::deposit_eth(&mut engine, "X", investor, 100.0).unwrap();

    assert_relative_eq!(engine.wallet_lp_balance(investor, "X"), 100.0, epsilon = 1e-6);
    let vault_wallet = engine.vault("X").unwrap().wallet_id;
    assert!(engine.wallet_balance_of(vault_wallet, "DS_X") > 0.0);
    assert_eq!(engine.total_outstanding_eth_debt(), 0.0);
}

/// Scenario 3: a single 10% depeg event pushes the LST/ETH spot price to
/// ~0.90 and nothing else moves on that block.
#[test]
fn depeg_event_moves_spot_price() {
    let config = EngineConfig {
        num_blocks: 6,
        eth_yield_per_block: 0.0,
        seed: 3,
        tokens: vec![flat_token("X", 1000)],
        events_path: None,
    };
    let mut engine = Engine::new(&config);
    let events = EventManager::new(
        vec![Event {
            block: 5,
            kind: EventKind::Depeg,
            token: "X".to_string(),
            percentage: Some(0.10),
            delta: None,
        }],
        engine.event_manager_wallet(),
    );
    engine.set_event_manager(events);
    engine.start_mining(false).unwrap();

    let price = engine.amm("X").unwrap().price_of_one_token_in_eth();
    assert_relative_eq!(price, 0.90, epsilon = 1e-6);
}

/// Scenario 4: reserves left over from an earlier depeg make
/// `lst_price + ds_price + redemption_fee < 1`; the redemption-arbitrage
/// agent should close the gap and end up with more ETH than it started,
/// leaving the borrow ledger empty.
#[test]
fn redemption_arbitrage_agent_profits_from_mispricing() {
    let mut token = flat_token("X", 1000);
    token.lst_amm_fee = 0.0;
    token.ds_amm_fee = 0.0;
    token.ds_discount_rate = 0.0;
    // LST/ETH pool priced at 0.8 and a cheap DS pool (price ~0.1) leave
    // lst_price + ds_price + redemption_fee comfortably below 1.
    token.initial_eth_reserve = 800_000.0;
    token.initial_lst_reserve = 1_000_000.0;
    token.initial_ds_eth_reserve = 100_000.0;
    token.initial_ds_reserve = 1_000_000.0;
    let config = EngineConfig {
        num_blocks: 3,
        eth_yield_per_block: 0.0,
        seed: 4,
        tokens: vec![token],
        events_path: None,
    };
    let mut engine = Engine::new(&config);

    let arb_wallet = engine.new_wallet("arb");
    engine.wallet_deposit_eth(arb_wallet, 10_000.0).unwrap();
    engine.add_agent(
        arb_wallet,
        "RedemptionArbitrageAgent",
        Box::new(RedemptionArbitrageAgent::new("arb", "X")),
    );

    engine.start_mining(false).unwrap();
    assert!(engine.wallet_eth_balance(arb_wallet) > 10_000.0);
    assert_eq!(engine.total_outstanding_eth_debt(), 0.0);
}

/// Scenario 5: on a thin DS pool, `buy_ds` with an amount whose dry run
/// returns 0 must fail atomically — no balance moves.
#[test]
fn buy_ds_rejects_when_dry_run_is_non_positive() {
    let mut token = flat_token("X", 1000);
    token.initial_ds_eth_reserve = 0.01;
    token.initial_ds_reserve = 0.01;
    let config = EngineConfig {
        num_blocks: 10,
        eth_yield_per_block: 0.0,
        seed: 5,
        tokens: vec![token],
        events_path: None,
    };
    let mut engine = Engine::new(&config);
    let investor = engine.new_wallet("investor");
    engine.wallet_deposit_eth(investor, 1_000_000.0).unwrap();

    let before = engine.wallet_eth_balance(investor);
    let err = vault::buy_ds(&mut engine, "X", investor, 1_000_000.0).unwrap_err();
    assert!(matches!(err, SimError::InsufficientLiquidity));
    assert_eq!(engine.wallet_eth_balance(investor), before);
}

struct GreedyBorrowerAgent;

impl Agent for GreedyBorrowerAgent {
    fn name(&self) -> &str {
        "GreedyBorrower"
    }

    fn on_block_mined(&mut self, handle: &mut AgentHandle, _block: u64) -> depeg_sim::error::SimResult<()> {
        handle.borrow_eth(1.0)
    }
}

/// Scenario 6: an agent that borrows ETH and never repays must fail the
/// block with `OutstandingDebt`.
#[test]
fn unrepaid_borrow_trips_outstanding_debt() {
    let config = EngineConfig {
        num_blocks: 3,
        eth_yield_per_block: 0.0,
        seed: 6,
        tokens: vec![flat_token("X", 1000)],
        events_path: None,
    };
    let mut engine = Engine::new(&config);
    let borrower = engine.new_wallet("greedy");
    engine.add_agent(borrower, "GreedyBorrowerAgent", Box::new(GreedyBorrowerAgent));

    let err = engine.start_mining(false).unwrap_err();
    assert!(matches!(err, SimError::OutstandingDebt { .. }));
}
