use anyhow::{Context, Result};
use clap::Parser;

use depeg_sim::agent;
use depeg_sim::cli::{self, Cli, Command, RunArgs};
use depeg_sim::config::EngineConfig;
use depeg_sim::events::EventManager;
use depeg_sim::{Engine, SimError};

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run(&args),
        Command::MonteCarlo(args) => monte_carlo(&args),
    }
}

fn load_config(args: &RunArgs) -> Result<EngineConfig> {
    match &args.scenario {
        Some(path) => EngineConfig::from_json(path).with_context(|| format!("loading scenario {}", path.display())),
        None => Ok(EngineConfig::single_token(
            args.symbol.clone(),
            args.num_blocks,
            args.psm_expiry_after_block,
            args.seed,
            args.eth_yield_per_block,
        )),
    }
}

fn build_engine(args: &RunArgs, config: &EngineConfig) -> Result<Engine> {
    let mut engine = Engine::new(config);

    if let Some(path) = &args.events {
        let event_manager = EventManager::from_json(path, engine.event_manager_wallet())
            .with_context(|| format!("loading events {}", path.display()))?;
        engine.set_event_manager(event_manager);
    }

    if !args.no_agents {
        agent::build_reference_agents(&mut engine, args.initial_agent_balance)
            .context("wiring reference agent catalogue")?;
    }
    Ok(engine)
}

fn run(args: &RunArgs) -> Result<()> {
    let config = load_config(args)?;
    let mut engine = build_engine(args, &config)?;

    match engine.start_mining(args.print_stats) {
        Ok(()) => {}
        Err(SimError::OutstandingDebt { block, eth, tokens }) => {
            anyhow::bail!("fatal: outstanding debt at end of block {block} (eth={eth}, tokens={tokens:?})");
        }
        Err(e) => return Err(e.into()),
    }

    print_summary(&engine);

    if let Some(output) = &args.output {
        let json = serde_json::to_string_pretty(&engine.stats).context("serializing stats")?;
        std::fs::write(output, json).with_context(|| format!("writing {}", output.display()))?;
        println!("\nwrote stats to {}", output.display());
    }
    Ok(())
}

fn print_summary(engine: &Engine) {
    println!("\n{}", "=".repeat(72));
    println!("  depeg-sim: {} blocks simulated", engine.num_blocks);
    println!("{}", "=".repeat(72));
    println!("  {:<12} {:>14} {:>14} {:>10}", "Pool", "Reserve ETH", "Reserve Tok", "Price");
    println!("  {}", "-".repeat(52));
    let mut amms: Vec<_> = engine.amms_iter().collect();
    amms.sort_by(|a, b| a.0.cmp(b.0));
    for (symbol, amm) in amms {
        println!(
            "  {:<12} {:>14.4} {:>14.4} {:>10.6}",
            symbol,
            amm.reserve_eth,
            amm.reserve_token,
            amm.price_of_one_token_in_eth()
        );
    }
    println!(
        "  outstanding debt: eth={:.6} tokens={:?}",
        engine.total_outstanding_eth_debt(),
        engine.total_outstanding_token_debt_by_symbol()
    );
}

fn monte_carlo(args: &cli::MonteCarloArgs) -> Result<()> {
    let config = load_config(&args.run)?;
    let events = match &args.run.events {
        Some(path) => Some(
            EventManager::from_json(path, depeg_sim::wallet::WalletId(0))
                .with_context(|| format!("loading events {}", path.display()))?,
        ),
        None => None,
    };
    let no_agents = args.run.no_agents;
    let initial_agent_balance = args.run.initial_agent_balance;

    let pb = indicatif::ProgressBar::new(args.simulations as u64);
    pb.set_style(
        indicatif::ProgressStyle::default_bar()
            .template("  Monte Carlo [{bar:40}] {pos}/{len} ({eta})")
            .unwrap(),
    );

    let results = Engine::monte_carlo(
        &config,
        args.simulations,
        move |engine| {
            if let Some(template) = &events {
                let wired = EventManager::new(template.events().to_vec(), engine.event_manager_wallet());
                engine.set_event_manager(wired);
            }
            if !no_agents {
                let _ = agent::build_reference_agents(engine, initial_agent_balance);
            }
        },
        Some(&pb),
    );
    pb.finish_and_clear();

    print_monte_carlo_table(&results);
    Ok(())
}

fn print_monte_carlo_table(results: &[Result<depeg_sim::stats::StatsRecorder, SimError>]) {
    let ok = results.iter().filter(|r| r.is_ok()).count();
    let failed = results.len() - ok;

    println!("\n{}", "=".repeat(72));
    println!("  Monte Carlo Results ({} runs, {ok} ok, {failed} failed)", results.len());
    println!("{}", "=".repeat(72));
    println!("  {:<6} {:>14} {:>10}", "Run", "Final ETH (first pool)", "Status");
    println!("  {}", "-".repeat(44));
    for (i, result) in results.iter().enumerate() {
        match result {
            Ok(stats) => {
                let last_amm = stats.amms.last();
                let eth = last_amm.map(|a| a.reserve_eth).unwrap_or(0.0);
                println!("  {:<6} {:>14.4} {:>10}", i, eth, "ok");
            }
            Err(e) => println!("  {:<6} {:>14} {:>10}", i, "-", format!("FAILED: {e}")),
        }
    }
}
