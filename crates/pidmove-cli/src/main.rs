//! `pidmove` – command line entry point for the motion-control stack.
//!
//! ```text
//! pidmove init [--force]   write a default ~/.pidmove/config.toml
//! pidmove run [CONFIG]     run the simulated demo sequence
//! pidmove help             show usage
//! ```
//!
//! Ctrl-C cancels the running behavior; its motors are held before the
//! program exits.

mod config;
mod demo;

use colored::Colorize;
use std::path::PathBuf;
use tracing::warn;

use pidmove_motion::guard::CancelToken;
use pidmove_types::MotionError;

fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG selects the filter (default "info"); PIDMOVE_LOG_FORMAT=json
    // switches to newline-delimited JSON.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("PIDMOVE_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init();
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let code = match args.first().map(String::as_str) {
        None | Some("run") => cmd_run(args.get(1).map(PathBuf::from)),
        Some("init") => cmd_init(args.iter().any(|a| a == "--force")),
        Some("help" | "--help" | "-h") => {
            print_usage();
            0
        }
        Some(other) => {
            println!("{} '{}'", "Unknown command:".red(), other.yellow());
            print_usage();
            2
        }
    };
    std::process::exit(code);
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_init(force: bool) -> i32 {
    let path = config::config_path();
    if path.exists() && !force {
        println!(
            "  Config already exists at {}.  Use {} to overwrite it.",
            path.display().to_string().bold(),
            "--force".bold()
        );
        return 1;
    }
    match config::save_to(&config::Config::default(), &path) {
        Ok(()) => {
            println!(
                "  {} Config saved to {}",
                "✓".green().bold(),
                path.display().to_string().bold()
            );
            0
        }
        Err(e) => {
            println!("{}: {}", "Error saving config".red(), e);
            1
        }
    }
}

fn cmd_run(path: Option<PathBuf>) -> i32 {
    print_banner();

    let path = path.unwrap_or_else(config::config_path);
    let cfg = match config::load(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            return 1;
        }
    };
    if path.exists() {
        println!("  Config loaded from {}", path.display().to_string().bold());
    } else {
        println!("  {}", "No config file found; using built-in defaults.".dimmed());
    }

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let cancel = CancelToken::new();
    let cancel_on_signal = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping the current behavior …".yellow().bold());
        cancel_on_signal.cancel();
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; behaviors can only stop on their own");
    }

    println!();
    let robot = demo::robot(&cfg);
    let result = demo::run(&cfg, &robot, &cancel, |step| {
        println!(
            "  {} {:<24} {:>6} ticks   heading {:>4}   {}",
            "✓".green().bold(),
            step.name.bold(),
            step.ticks,
            step.heading,
            step.detail.dimmed()
        );
    });

    match result {
        Ok(()) => {
            println!("\n  {}", "Demo complete.".green().bold());
            0
        }
        Err(e @ MotionError::Cancelled { .. }) => {
            println!("\n  {} {}", "Cancelled:".yellow().bold(), e);
            130
        }
        Err(e) => {
            println!("\n  {} {}", "Failed:".red().bold(), e);
            1
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("  {} {}",
        "pidmove".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Closed-loop drive behaviors, simulated");
    println!();
}

fn print_usage() {
    println!();
    println!("  {}", "Usage:".bold());
    println!("    pidmove init [--force]   write a default {}", "~/.pidmove/config.toml".bold());
    println!("    pidmove run [CONFIG]     run the simulated demo sequence");
    println!("    pidmove help             show this message");
    println!();
}
