pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rentdesk_core::config::{ConfigOverrides, LoadOptions};

use crate::commands::CommandContext;

#[derive(Debug, Parser)]
#[command(
    name = "rentdesk",
    about = "Rentdesk operator CLI",
    long_about = "Inspect configuration, maintain the availability file and smoke-test the booking assistant.",
    after_help = "Examples:\n  rentdesk config\n  rentdesk reconcile\n  rentdesk block car1 2024-06-10 2024-06-12\n  rentdesk calendar car1 --year 2024 --month 6 --start 2024-06-08\n  rentdesk smoke"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Config file to load instead of rentdesk.toml lookup")]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override the availability file path")]
    pub availability_path: Option<PathBuf>,
    #[arg(long, global = true, help = "Treat this date (YYYY-MM-DD) as today")]
    pub today: Option<NaiveDate>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[command(about = "Inspect effective configuration values with source attribution and redaction")]
    Config,
    #[command(about = "Extend every configured vehicle's availability to the horizon")]
    Reconcile,
    #[command(about = "Print a vehicle's availability window as JSON")]
    Availability {
        vehicle: String,
        #[arg(long, default_value_t = 30, help = "Number of days starting today")]
        days: u32,
    },
    #[command(about = "Render one calendar month for a vehicle as text")]
    Calendar {
        vehicle: String,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        month: Option<u32>,
        #[arg(long, help = "Selected start date; renders the end-date calendar")]
        start: Option<NaiveDate>,
    },
    #[command(about = "Mark an inclusive date range as unavailable")]
    Block { vehicle: String, from: NaiveDate, to: NaiveDate },
    #[command(about = "Mark an inclusive date range as available again")]
    Release { vehicle: String, from: NaiveDate, to: NaiveDate },
    #[command(about = "Run a scripted booking conversation against in-memory stores")]
    Smoke,
}

impl Cli {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                availability_path: self.availability_path.clone(),
                ..ConfigOverrides::default()
            },
        }
    }

    pub fn context(&self) -> CommandContext {
        CommandContext { load: self.load_options(), today: self.today }
    }
}

pub fn run() -> ExitCode {
    execute(Cli::parse())
}

pub fn execute(cli: Cli) -> ExitCode {
    let ctx = cli.context();

    let result = match cli.command {
        Command::Config => commands::config::run(&ctx),
        Command::Reconcile => commands::reconcile::run(&ctx),
        Command::Availability { vehicle, days } => commands::availability::run(&ctx, &vehicle, days),
        Command::Calendar { vehicle, year, month, start } => {
            commands::calendar::run(&ctx, &vehicle, year, month, start)
        }
        Command::Block { vehicle, from, to } => commands::mark::run(&ctx, &vehicle, from, to, false),
        Command::Release { vehicle, from, to } => commands::mark::run(&ctx, &vehicle, from, to, true),
        Command::Smoke => commands::smoke::run(&ctx),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
