//! Command Line Interface for the vault yield simulator.
mod presets;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use presets::Preset;
use prettytable::{Table, format, row};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;
use vault_sim_simulation::prelude::*;

#[derive(Parser)]
#[command(name = "vault-sim")]
#[command(about = "Yield and fee-burden simulator for multi-strategy vaults", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compound a vault period by period with per-strategy fees
    Periodic {
        /// JSON file with a list of strategies
        #[arg(short, long)]
        strategies: Option<PathBuf>,

        /// Built-in strategy set used when no file is given
        #[arg(long, value_enum, default_value = "lending")]
        preset: Preset,

        /// Simulated years
        #[arg(short, long, default_value_t = 20)]
        years: u32,

        /// Periods per year
        #[arg(long, default_value_t = 12)]
        periods_per_year: u32,

        /// Initial vault assets
        #[arg(long, default_value_t = 10_000_000.0)]
        assets: f64,

        /// Share of assets kept idle
        #[arg(long, default_value_t = 0.30)]
        idle_ratio: f64,

        /// Vault performance fee in bps
        #[arg(long, default_value_t = 1_000)]
        perf_fee_bps: u32,

        /// Vault management fee in bps per year
        #[arg(long, default_value_t = 200)]
        mgmt_fee_bps: u32,

        /// Random seed
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Simulate the distribution of annual vault APY
    MonteCarlo {
        /// JSON file with a list of strategies
        #[arg(short, long)]
        strategies: Option<PathBuf>,

        /// Built-in strategy set used when no file is given
        #[arg(long, value_enum, default_value = "restaking")]
        preset: Preset,

        /// Number of simulated paths
        #[arg(short, long, default_value_t = 50_000)]
        paths: usize,

        /// Days per path
        #[arg(short, long, default_value_t = 365)]
        days: usize,

        /// Share of assets kept idle (defaults to the preset's, 0 for files)
        #[arg(long)]
        idle_ratio: Option<f64>,

        /// APY threshold for exceedance probabilities, repeatable
        #[arg(long = "threshold")]
        thresholds: Vec<f64>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Compare net APY across correlation scenarios
    Sensitivity {
        /// JSON file with a list of three strategies
        #[arg(short, long)]
        strategies: Option<PathBuf>,

        /// Built-in strategy set used when no file is given
        #[arg(long, value_enum, default_value = "restaking")]
        preset: Preset,

        /// Number of simulated paths per scenario
        #[arg(short, long, default_value_t = 10_000)]
        paths: usize,

        /// Share of assets kept idle (defaults to the preset's, 0 for files)
        #[arg(long)]
        idle_ratio: Option<f64>,

        /// Random seed
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Print the results as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Periodic {
            strategies,
            preset,
            years,
            periods_per_year,
            assets,
            idle_ratio,
            perf_fee_bps,
            mgmt_fee_bps,
            seed,
            json,
        } => {
            let (strategies, _) = resolve_strategies(strategies.as_deref(), *preset)?;
            let config = PeriodicConfig::default()
                .with_initial_assets(*assets)
                .with_idle_ratio(*idle_ratio)
                .with_horizon(*years, *periods_per_year)
                .with_vault_fees(*perf_fee_bps, *mgmt_fee_bps)
                .with_seed(*seed);

            let result = run_periodic_simulation(&strategies, &config)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }

            println!("\n📋 Strategies");
            print_strategy_table(&strategies);
            print_periodic_summary(&result, &config);
        }
        Commands::MonteCarlo {
            strategies,
            preset,
            paths,
            days,
            idle_ratio,
            thresholds,
            seed,
            json,
        } => {
            let (strategies, preset_idle) = resolve_strategies(strategies.as_deref(), *preset)?;
            let mut config = MonteCarloConfig::default()
                .with_paths(*paths)
                .with_steps(*days)
                .with_idle_ratio(idle_ratio.unwrap_or(preset_idle));
            if !thresholds.is_empty() {
                config = config.with_thresholds(thresholds.clone());
            }
            if let Some(seed) = seed {
                config = config.with_seed(*seed);
            }

            let result = run_monte_carlo_simulation(&strategies, &config)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }

            println!("\n📋 Strategies");
            print_strategy_table(&strategies);
            print_contributions(&strategies);
            print_monte_carlo_metrics(&result, &config);
        }
        Commands::Sensitivity {
            strategies,
            preset,
            paths,
            idle_ratio,
            seed,
            json,
        } => {
            let (strategies, preset_idle) = resolve_strategies(strategies.as_deref(), *preset)?;
            if strategies.len() != 3 {
                bail!(
                    "correlation scenarios cover three strategies, {} given",
                    strategies.len()
                );
            }
            let config = MonteCarloConfig::default()
                .with_paths(*paths)
                .with_idle_ratio(idle_ratio.unwrap_or(preset_idle))
                .with_seed(*seed);

            let results =
                run_correlation_sensitivity(&strategies, &config, &CorrelationMatrix::presets())?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&results)?);
                return Ok(());
            }

            print_sensitivity(&results);
        }
    }

    Ok(())
}

/// Strategies from a file or the preset, with the idle share to pair them
/// with when none is given.
fn resolve_strategies(path: Option<&Path>, preset: Preset) -> Result<(Vec<StrategySpec>, f64)> {
    match path {
        Some(path) => {
            let strategies = load_strategies(path)?;
            info!(count = strategies.len(), file = %path.display(), "Loaded strategies");
            Ok((strategies, 0.0))
        }
        None => {
            info!(?preset, "Using preset strategies");
            Ok((preset.strategies(), preset.idle_ratio()))
        }
    }
}

fn load_strategies(path: &Path) -> Result<Vec<StrategySpec>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading strategies from {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("parsing strategies from {}", path.display()))
}

fn new_table() -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    table
}

fn pct(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

fn print_strategy_table(strategies: &[StrategySpec]) {
    let mut table = new_table();
    table.set_titles(row!["Strategy", "Perf Fee", "Debt Ratio", "Mean Return", "Volatility"]);
    for s in strategies {
        table.add_row(row![
            s.name,
            format!("{:.2}%", s.perf_fee().as_percent()),
            format!("{:.2}%", s.debt_ratio().as_percent()),
            pct(s.mean_annual_return),
            pct(s.std_annual_return)
        ]);
    }
    table.printstd();
}

fn print_periodic_summary(result: &PeriodicSimulationResult, config: &PeriodicConfig) {
    let summary = &result.summary;
    let initial = config.initial_vault_assets;

    println!(
        "\n📊 Periodic Simulation ({} years × {} periods)",
        config.years, config.periods_per_year
    );
    let mut table = new_table();
    table.add_row(row!["Initial Assets", format!("${initial:.2}")]);
    table.add_row(row![
        "Final Value (Gross)",
        format!("${:.2}", summary.final_value_gross)
    ]);
    table.add_row(row![
        "Final Value (Net)",
        format!("${:.2}", summary.final_value_net)
    ]);
    table.add_row(row![
        "Total Fees Paid",
        format!("${:.2}", summary.total_fees_paid)
    ]);
    let fee_drag = summary
        .fee_drag_pct()
        .value()
        .map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}%"));
    table.add_row(row!["Fee Drag", fee_drag]);
    table.add_row(row![
        "Loss Probability",
        pct(summary.loss_probability)
    ]);
    table.add_row(row![
        "Avg Period Net Gain",
        format!("${:.2}", summary.avg_period_return)
    ]);
    table.add_row(row![
        "Std Period Net Gain",
        format!("${:.2}", summary.std_period_return)
    ]);
    table.add_row(row![
        "Annualized Sharpe",
        format!("{:.3}", summary.sharpe_annual)
    ]);
    table.printstd();

    println!("\n💸 Fees by Strategy");
    let mut fees = new_table();
    fees.set_titles(row!["Strategy", "Fees Paid", "Lowest Balance", "Final Balance"]);
    for (name, paid) in result.timeline.fees_by_strategy() {
        let series = result.timeline.strategy_series(&name).unwrap_or_default();
        let lowest = series
            .iter()
            .map(|record| record.balance)
            .fold(f64::INFINITY, f64::min);
        let last = series.last().map_or(0.0, |record| record.balance);
        fees.add_row(row![
            name,
            format!("${paid:.2}"),
            format!("${lowest:.2}"),
            format!("${last:.2}")
        ]);
    }
    fees.printstd();
}

fn print_contributions(strategies: &[StrategySpec]) {
    println!("\n🧮 Expected APY Contribution");
    let mut table = new_table();
    table.set_titles(row!["Strategy", "Contribution"]);
    let contributions = apy_contributions(strategies);
    let total: f64 = contributions.iter().map(|(_, c)| c).sum();
    for (name, contribution) in contributions {
        table.add_row(row![name, pct(contribution)]);
    }
    table.add_row(row!["Total", pct(total)]);
    table.printstd();
}

fn print_monte_carlo_metrics(result: &MonteCarloResult, config: &MonteCarloConfig) {
    println!(
        "\n🎲 Monte Carlo ({} paths × {} days, seed {})",
        config.path_count, config.step_count, result.seed
    );
    let (gross, net) = (&result.gross, &result.net);
    let mut table = new_table();
    table.set_titles(row!["Metric", "Gross", "Net"]);
    table.add_row(row!["Mean APY", pct(gross.mean_apy), pct(net.mean_apy)]);
    table.add_row(row!["Median APY", pct(gross.median_apy), pct(net.median_apy)]);
    table.add_row(row!["Std Dev", pct(gross.std_apy), pct(net.std_apy)]);
    table.add_row(row!["Min APY", pct(gross.min_apy), pct(net.min_apy)]);
    table.add_row(row!["Max APY", pct(gross.max_apy), pct(net.max_apy)]);
    table.add_row(row![
        "Sharpe",
        format!("{:.3}", gross.sharpe_ratio),
        format!("{:.3}", net.sharpe_ratio)
    ]);
    table.add_row(row!["VaR 95%", pct(gross.var_95), pct(net.var_95)]);
    table.add_row(row!["CVaR 95%", pct(gross.cvar_95), pct(net.cvar_95)]);
    for (g, n) in gross.prob_above.iter().zip(&net.prob_above) {
        table.add_row(row![
            format!("P(APY > {})", pct(g.threshold)),
            pct(g.probability),
            pct(n.probability)
        ]);
    }
    table.printstd();
    println!("Mean fee drag: {}", pct(result.mean_fee_drag()));
}

fn print_sensitivity(results: &[SensitivityResult]) {
    println!("\n🔗 Correlation Sensitivity (net)");
    let mut table = new_table();
    table.set_titles(row!["Scenario", "Mean APY", "Std Dev", "Sharpe", "VaR 95%"]);
    for result in results {
        table.add_row(row![
            result.scenario,
            pct(result.net.mean_apy),
            pct(result.net.std_apy),
            format!("{:.3}", result.net.sharpe_ratio),
            pct(result.net.var_95)
        ]);
    }
    table.printstd();
}
