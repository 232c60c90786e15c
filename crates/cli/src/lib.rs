pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "kintai",
    about = "Kintai operator CLI",
    long_about = "Apply migrations, inspect configuration, and query attendance data without Slack.",
    after_help = "Examples:\n  kintai migrate\n  kintai report --user U012AB3CD --month 2024-05\n  kintai overview --days 14"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations")]
    Migrate,
    #[command(about = "Show effective configuration values with their source, secrets redacted")]
    Config,
    #[command(about = "Print one user's shifts and worked hours for a civil month")]
    Report {
        #[arg(long, help = "Slack user id")]
        user: String,
        #[arg(long, help = "Civil month as YYYY-MM (default: current month)")]
        month: Option<String>,
    },
    #[command(about = "Print the Tuesday/Friday attendance overview")]
    Overview {
        #[arg(long, help = "Days to look ahead (default: attendance.overview_window_days)")]
        days: Option<u32>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => commands::config::run(),
        Command::Report { user, month } => commands::report::run(&user, month.as_deref()),
        Command::Overview { days } => commands::overview::run(days),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
