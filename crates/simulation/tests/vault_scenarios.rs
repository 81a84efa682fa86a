//! End-to-end runs of both simulators over the lending and restaking vaults.

use vault_sim_simulation::prelude::*;

fn lending_vault() -> Vec<StrategySpec> {
    vec![
        StrategySpec::new("Compound", 1_000, 4_000, 0.06, 0.10),
        StrategySpec::new("Aave", 1_000, 3_000, 0.08, 0.12),
        StrategySpec::new("Curve", 1_500, 2_000, 0.04, 0.06),
    ]
}

fn restaking_vault() -> Vec<StrategySpec> {
    vec![
        StrategySpec::new("RestakeETH", 1_000, 5_000, 0.085, 0.03),
        StrategySpec::new("LRTBoost", 1_200, 3_000, 0.045, 0.02),
        StrategySpec::new("PendleYield", 1_500, 1_500, 0.035, 0.05),
    ]
}

#[test]
fn lending_vault_twenty_years() {
    let config = PeriodicConfig::default();
    let result = run_periodic_simulation(&lending_vault(), &config).unwrap();

    assert_eq!(result.timeline.len(), 20 * 12 + 1);
    let last = result.timeline.last().unwrap();
    assert!((result.summary.final_value_net - last.vault_value).abs() < 1e-6);
    assert!(result.summary.final_value_net <= result.summary.final_value_gross);
    assert!((result.summary.total_fees_paid - last.cumulative_fees).abs() < 1e-6);

    let per_strategy: f64 = result
        .timeline
        .fees_by_strategy()
        .iter()
        .map(|(_, fees)| fees)
        .sum();
    assert!((per_strategy - result.summary.total_fees_paid).abs() < 1e-3);

    for row in result.timeline.rows() {
        let balances: f64 = row.strategies.iter().map(|s| s.balance).sum();
        assert!((balances - row.state.deployed).abs() < 1e-3);
        assert!((row.state.idle + row.state.deployed - row.state.total_assets).abs() < 1e-3);
    }
}

#[test]
fn flat_single_strategy_keeps_its_value() {
    let strategies = vec![StrategySpec::new("Flat", 0, 10_000, 0.0, 0.0)];
    let config = PeriodicConfig::default()
        .with_horizon(1, 12)
        .with_vault_fees(0, 0);
    let result = run_periodic_simulation(&strategies, &config).unwrap();

    assert_eq!(result.summary.final_value_net, 10_000_000.0);
    assert_eq!(result.summary.total_fees_paid, 0.0);
    assert!(!result.summary.fee_efficiency.is_defined());
    assert!(!result.summary.sharpe_annual.is_defined());
}

#[test]
fn periodic_result_serializes_undefined_metrics_as_null() {
    let strategies = vec![StrategySpec::new("Flat", 0, 10_000, 0.0, 0.0)];
    let config = PeriodicConfig::default()
        .with_horizon(1, 4)
        .with_vault_fees(0, 0);
    let result = run_periodic_simulation(&strategies, &config).unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert!(json["summary"]["fee_efficiency"].is_null());
    assert_eq!(json["timeline"]["rows"].as_array().unwrap().len(), 5);
    assert_eq!(json["timeline"]["strategy_names"][0], "Flat");
}

#[test]
fn restaking_vault_monte_carlo() {
    let config = MonteCarloConfig::default()
        .with_paths(2_000)
        .with_idle_ratio(0.05)
        .with_seed(42);
    let result = run_monte_carlo_simulation(&restaking_vault(), &config).unwrap();

    // Expected gross APY is roughly Σ w·μ = 6.1%.
    assert!((result.gross.mean_apy - 0.061).abs() < 0.005);
    assert!(result.net.mean_apy < result.gross.mean_apy);
    assert!(result.net.var_95 < result.net.median_apy);

    let probs: Vec<f64> = config
        .thresholds
        .iter()
        .map(|t| result.net.prob_above(*t).unwrap())
        .collect();
    assert!(probs.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn monte_carlo_is_reproducible_across_thread_pools() {
    let config = MonteCarloConfig::default()
        .with_paths(300)
        .with_idle_ratio(0.05)
        .with_seed(11);
    let strategies = restaking_vault();

    let single = rayon::ThreadPoolBuilder::new()
        .num_threads(1)
        .build()
        .unwrap()
        .install(|| run_monte_carlo_simulation(&strategies, &config).unwrap());
    let parallel = run_monte_carlo_simulation(&strategies, &config).unwrap();

    assert_eq!(single, parallel);
}

#[test]
fn lending_vault_needs_full_allocation_for_monte_carlo() {
    // 90% deployed and nothing idle.
    let config = MonteCarloConfig::default().with_paths(10).with_seed(1);
    let err = run_monte_carlo_simulation(&lending_vault(), &config).unwrap_err();
    assert!(matches!(err, SimulationError::AllocationMismatch { .. }));

    let config = config.with_idle_ratio(0.10);
    assert!(run_monte_carlo_simulation(&lending_vault(), &config).is_ok());
}

#[test]
fn correlation_presets_over_restaking_vault() {
    let config = MonteCarloConfig::default()
        .with_paths(500)
        .with_idle_ratio(0.05)
        .with_seed(3);
    let results =
        run_correlation_sensitivity(&restaking_vault(), &config, &CorrelationMatrix::presets())
            .unwrap();

    let names: Vec<&str> = results.iter().map(|r| r.scenario.as_str()).collect();
    assert_eq!(
        names,
        [
            "Low Correlation (Diversified)",
            "Medium Correlation",
            "High Correlation (Risky)"
        ]
    );
    for result in &results {
        assert!(result.net.mean_apy > 0.0);
    }
}
