//! Covered call backtest - main entry point
//!
//! This binary provides three subcommands:
//! - backtest: Simulate the weekly covered call strategy and report returns
//! - stop-loss: Compute the ATR-based stop for an entry price
//! - optimize: Sweep stop-loss and strike parameters

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "covered-call-backtest")]
#[command(about = "Weekly covered call backtesting with a dynamic ATR stop-loss", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the weekly covered call backtest
    Backtest {
        /// Path to configuration file (defaults apply when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Symbol (overrides config file)
        #[arg(short, long)]
        symbol: Option<String>,

        /// Daily bars CSV (overrides config file)
        #[arg(long)]
        bars: Option<PathBuf>,

        /// Option chain snapshot JSON (overrides config file)
        #[arg(long)]
        chain: Option<PathBuf>,

        /// Entry price (defaults to the last close)
        #[arg(long)]
        entry_price: Option<f64>,

        /// Valuation date for option expirations, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        as_of: Option<String>,

        /// Hard stop as a fraction, e.g. 0.10
        #[arg(long)]
        max_loss: Option<f64>,

        /// ATR multiplier, e.g. 2.0
        #[arg(long)]
        atr_multiplier: Option<f64>,

        /// Weeks of history
        #[arg(long)]
        weeks: Option<usize>,

        /// Strike markup as a fraction, e.g. 0.02
        #[arg(long)]
        strike_pct: Option<f64>,

        /// Write weekly CSV and report JSON to the results directory
        #[arg(long)]
        export: bool,
    },

    /// Compute the recommended stop-loss only
    StopLoss {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Symbol (overrides config file)
        #[arg(short, long)]
        symbol: Option<String>,

        /// Daily bars CSV (overrides config file)
        #[arg(long)]
        bars: Option<PathBuf>,

        /// Entry price (defaults to the last close)
        #[arg(long)]
        entry_price: Option<f64>,
    },

    /// Optimize stop-loss and strike parameters
    Optimize {
        /// Path to base configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Optimization mode (quick, full, or config to use the config grid)
        #[arg(short, long, default_value = "quick")]
        mode: String,

        /// Sort results by metric (combined, stock, cumulative, held_ratio)
        #[arg(long, default_value = "combined")]
        sort_by: String,

        /// Number of top results to show
        #[arg(short, long, default_value = "10")]
        top: usize,

        /// Entry price (defaults to the last close)
        #[arg(long)]
        entry_price: Option<f64>,

        /// Valuation date for option expirations, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        as_of: Option<String>,

        /// Write all results to the results directory as CSV
        #[arg(long)]
        export: bool,

        /// Run sequentially instead of parallel
        #[arg(long)]
        sequential: bool,
    },
}

fn setup_logging(verbose: bool, command_name: &str, file_only: bool) -> Result<()> {
    // Create logs directory
    std::fs::create_dir_all("logs")?;

    // Create log file with naming pattern: {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    let level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    if file_only {
        // Optimizer logs to file only so the progress bar owns the console
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    } else {
        let console_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(true);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        info!("Logging initialized");
        info!("Log file: {}", log_path.display());
    }

    Ok(())
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let (command_name, file_only) = match &cli.command {
        Commands::Backtest { .. } => ("backtest", false),
        Commands::StopLoss { .. } => ("stop_loss", false),
        Commands::Optimize { .. } => ("optimize", true),
    };

    setup_logging(cli.verbose, command_name, file_only)?;

    match cli.command {
        Commands::Backtest {
            config,
            symbol,
            bars,
            chain,
            entry_price,
            as_of,
            max_loss,
            atr_multiplier,
            weeks,
            strike_pct,
            export,
        } => commands::backtest::run(commands::backtest::BacktestArgs {
            config,
            symbol,
            bars,
            chain,
            entry_price,
            as_of,
            max_loss,
            atr_multiplier,
            weeks,
            strike_pct,
            export,
        }),

        Commands::StopLoss {
            config,
            symbol,
            bars,
            entry_price,
        } => commands::stop_loss::run(config, symbol, bars, entry_price),

        Commands::Optimize {
            config,
            mode,
            sort_by,
            top,
            entry_price,
            as_of,
            export,
            sequential,
        } => commands::optimize::run(commands::optimize::OptimizeArgs {
            config,
            mode,
            sort_by,
            top,
            entry_price,
            as_of,
            export,
            sequential,
        }),
    }
}
