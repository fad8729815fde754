//! Stop-loss command implementation

use anyhow::Result;
use covered_call_backtest::backtest::Backtester;
use std::path::PathBuf;
use tracing::info;

use super::{load_config, load_series};

pub fn run(
    config_path: Option<PathBuf>,
    symbol: Option<String>,
    bars: Option<PathBuf>,
    entry_price: Option<f64>,
) -> Result<()> {
    let config = load_config(config_path.as_deref(), symbol)?;
    let series = load_series(&config, bars)?;

    let summary = Backtester::new(config.strategy.clone()).stop_loss_summary(&series, entry_price)?;

    println!("\n{}", "=".repeat(60));
    println!("STOP-LOSS ({})", config.symbol());
    println!("{}", "=".repeat(60));
    println!("Entry Price:        ${:.2}", summary.entry_price);
    println!(
        "ATR (14):           ${:.2} ({:.2}% of close)",
        summary.atr, summary.atr_pct
    );
    println!("Recommended Stop:   ${:.2}", summary.stop_loss);
    println!("Max Drawdown:       {:.2}%", summary.drawdown_pct);
    println!(
        "Bound By:           {}",
        if summary.atr_bound {
            format!("{}x ATR", config.strategy.atr_multiplier)
        } else {
            format!("{:.0}% hard stop", config.strategy.max_loss_fraction * 100.0)
        }
    );
    println!("{}", "=".repeat(60));

    info!("Stop-loss calculation completed");
    Ok(())
}
