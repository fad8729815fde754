//! Optimize command implementation with progress tracking

use anyhow::Result;
use covered_call_backtest::export;
use covered_call_backtest::optimizer::{
    sort_results, GridMode, OptimizationResult, Optimizer, ParameterGrid, SortKey,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::info;

use super::{load_chain, load_config, load_series, parse_as_of};

pub struct OptimizeArgs {
    pub config: Option<PathBuf>,
    pub mode: String,
    pub sort_by: String,
    pub top: usize,
    pub entry_price: Option<f64>,
    pub as_of: Option<String>,
    pub export: bool,
    pub sequential: bool,
}

pub fn run(args: OptimizeArgs) -> Result<()> {
    info!("Starting optimization");

    let config = load_config(args.config.as_deref(), None)?;
    let sort_by: SortKey = args.sort_by.parse()?;

    let mode: GridMode = args.mode.parse()?;
    let grid = ParameterGrid::for_mode(mode, config.grid.as_ref())?;

    let configs = grid.combinations(&config.strategy);
    info!("Optimization mode: {}", mode);
    info!(
        "Parameter combinations: {} valid of {}",
        configs.len(),
        grid.total_combinations()
    );

    if configs.is_empty() {
        info!("No valid parameter combinations.");
        return Ok(());
    }

    let as_of = parse_as_of(args.as_of)?;
    let series = load_series(&config, None)?;
    let chain = load_chain(&config, None)?;

    println!("\n{}", "=".repeat(70));
    println!("OPTIMIZATION SUMMARY");
    println!("{}", "=".repeat(70));
    println!("  Symbol:        {}", config.symbol());
    println!("  Weeks:         {}", config.strategy.weeks_of_history);
    println!("  Parameters:    {} combinations", configs.len());
    println!("  Mode:          {}", if args.sequential { "sequential" } else { "parallel" });
    println!("{}\n", "=".repeat(70));

    let pb = ProgressBar::new(configs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("⚡ {percent:>3}%|{bar:40}| {pos}/{len} [{elapsed}<{eta}, {per_sec:.2}]")?
            .progress_chars("█░ "),
    );

    let optimizer = Optimizer::new(&series, chain.as_ref(), args.entry_price, as_of);
    let mut results = if args.sequential {
        optimizer.optimize_sequential(&configs, Some(&pb))
    } else {
        optimizer.optimize(&configs, Some(&pb))
    };
    pb.finish();
    println!();

    if results.is_empty() {
        info!("No valid results found.");
        return Ok(());
    }

    sort_results(&mut results, sort_by);
    info!("Total results: {}, sorted by: {}", results.len(), sort_by);

    print_results(&results, args.top, sort_by);

    if args.export {
        let path = export::result_path(&config.backtest.results_dir, &config.symbol(), "optimize", "csv")?;
        export::write_optimization_csv(path, &results)?;
    }

    info!("Optimization completed successfully");
    Ok(())
}

fn print_results(results: &[OptimizationResult], top: usize, sort_by: SortKey) {
    let display_count = top.min(results.len());
    println!("\n{}", "=".repeat(100));
    println!("TOP {} OPTIMIZATION RESULTS (sorted by {})", display_count, sort_by);
    println!("{}", "=".repeat(100));
    println!(
        "{:<4} {:>10} {:>10} {:>10} {:>9} {:>6} {:>7} | Parameters",
        "Rank", "AnnComb%", "AnnStock%", "Cumul%", "Premium", "Stops", "Held%"
    );
    println!("{}", "-".repeat(100));

    for (i, r) in results.iter().take(top).enumerate() {
        println!(
            "{:<4} {:>10.2} {:>10.2} {:>10.2} {:>9.2} {:>6} {:>7.1} | ATRx:{:.1} MaxLoss:{:.0}% Strike:{:.1}%",
            i + 1,
            r.annualized_combined_return * 100.0,
            r.annualized_stock_return * 100.0,
            r.cumulative_return * 100.0,
            r.total_premium,
            r.stop_loss_exits,
            r.held_ratio * 100.0,
            r.params.atr_multiplier,
            r.params.max_loss_fraction * 100.0,
            r.params.strike_pct * 100.0,
        );
    }
    println!("{}", "=".repeat(100));
}
