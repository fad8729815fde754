//! Backtest command implementation

use anyhow::Result;
use covered_call_backtest::backtest::{BacktestReport, Backtester, PremiumOutcome};
use covered_call_backtest::export;
use std::path::PathBuf;
use tracing::info;

use super::{load_chain, load_config, load_series, parse_as_of};

pub struct BacktestArgs {
    pub config: Option<PathBuf>,
    pub symbol: Option<String>,
    pub bars: Option<PathBuf>,
    pub chain: Option<PathBuf>,
    pub entry_price: Option<f64>,
    pub as_of: Option<String>,
    pub max_loss: Option<f64>,
    pub atr_multiplier: Option<f64>,
    pub weeks: Option<usize>,
    pub strike_pct: Option<f64>,
    pub export: bool,
}

pub fn run(args: BacktestArgs) -> Result<()> {
    info!("Starting backtest");

    let mut config = load_config(args.config.as_deref(), args.symbol)?;

    if let Some(v) = args.max_loss {
        info!("Overriding max loss to: {}", v);
        config.strategy.max_loss_fraction = v;
    }
    if let Some(v) = args.atr_multiplier {
        info!("Overriding ATR multiplier to: {}", v);
        config.strategy.atr_multiplier = v;
    }
    if let Some(v) = args.weeks {
        info!("Overriding weeks of history to: {}", v);
        config.strategy.weeks_of_history = v;
    }
    if let Some(v) = args.strike_pct {
        info!("Overriding strike pct to: {}", v);
        config.strategy.strike_pct = v;
    }
    config.strategy.validate()?;

    let as_of = parse_as_of(args.as_of)?;
    let series = load_series(&config, args.bars)?;
    let chain = load_chain(&config, args.chain)?;

    let backtester = Backtester::new(config.strategy.clone());
    let report = backtester.run_series(&series, args.entry_price, chain.as_ref(), as_of)?;

    print_report(&report);

    if args.export {
        let symbol = config.symbol();
        let dir = &config.backtest.results_dir;
        export::write_outcomes_csv(export::result_path(dir, &symbol, "weeks", "csv")?, &report.outcomes)?;
        export::write_report_json(export::result_path(dir, &symbol, "report", "json")?, &report)?;
    }

    info!("Backtest completed successfully");
    Ok(())
}

fn print_report(report: &BacktestReport) {
    println!("\n{}", "=".repeat(60));
    println!("STOP-LOSS ({})", report.symbol);
    println!("{}", "=".repeat(60));
    println!(
        "Window:             {} to {} ({} bars)",
        report.first_date.map(|d| d.to_string()).unwrap_or_default(),
        report.last_date.map(|d| d.to_string()).unwrap_or_default(),
        report.bars_used
    );
    println!("Entry Price:        ${:.2}", report.entry_price);
    println!("ATR (14):           ${:.2}", report.atr);
    println!(
        "Baseline Stop:      ${:.2} ({:.2}%)",
        report.baseline_stop, report.baseline_drawdown_pct
    );
    println!("Max Weekly DD:      {:.2}%", report.max_weekly_drawdown_pct);

    println!("\n{}", "=".repeat(60));
    println!("OPTION PREMIUM");
    println!("{}", "=".repeat(60));
    match &report.premium {
        PremiumOutcome::Estimated(p) => {
            println!("Expiration:         {}", p.expiration);
            println!(
                "Strike:             ${:.2}{}",
                p.strike,
                if p.is_fallback() { " (fallback: highest available)" } else { "" }
            );
            println!("Bid:                ${:.2}", p.bid);
            println!("Premium ({} wks):   ${:.2}", p.weeks, p.total_premium);
            println!("Annualized Yield:   {:.2}%", p.annualized_yield_pct);
        }
        PremiumOutcome::Unavailable { reason } => {
            println!("No valid option:    {}", reason);
        }
    }

    println!("\n{}", "=".repeat(90));
    println!("WEEKLY OUTCOMES");
    println!("{}", "=".repeat(90));
    println!(
        "{:<9} {:>9} {:>9} {:>9} {:>9} {:>8} {:>8} | Exit",
        "Week", "Monday", "Friday", "Stop", "Sell", "Ret%", "Capital"
    );
    println!("{}", "-".repeat(90));
    for o in &report.outcomes {
        println!(
            "{:<9} {:>9.2} {:>9.2} {:>9.2} {:>9.2} {:>8.2} {:>8.4} | {}",
            o.week,
            o.monday_price,
            o.friday_price,
            o.stop_level,
            o.sell_price,
            o.return_pct(),
            o.capital_after,
            o.exit_reason
        );
    }
    println!("{}", "=".repeat(90));

    let agg = &report.aggregate;
    println!("\n{}", "=".repeat(60));
    println!("BACKTEST RESULTS");
    println!("{}", "=".repeat(60));
    println!("Weeks Simulated:    {}", agg.weeks_simulated);
    println!(
        "Stop-loss Exits:    {} (held {:.1}%)",
        report.exits.stop_loss_exits,
        report.exits.held_ratio * 100.0
    );
    println!("Cumulative Return:  {:.2}%", agg.cumulative_return * 100.0);
    println!("Final Capital:      ${:.2}", agg.final_capital_value);
    println!("Total Premium:      ${:.2}", agg.total_premium);
    println!("Combined Capital:   ${:.2}", agg.combined_capital_value);
    println!("Annualized Stock:   {:.2}%", agg.annualized_stock_return * 100.0);
    println!("Annualized w/ Prem: {:.2}%", agg.annualized_combined_return * 100.0);
    println!("{}", "=".repeat(60));
}
