//! typecfg CLI
//!
//! Command-line interface over rule-set files

use clap::{Parser, Subcommand, ValueEnum};
use typecfg_core::logging_facility::{init, Profile};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "typecfg")]
#[command(about = "typecfg - Environment-specific configuration rules", long_about = None)]
struct Cli {
    /// Log output on stderr (`RUST_LOG` sets the level)
    #[arg(long, value_enum, default_value_t = LogFormat::Off, global = true)]
    log: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Off,
    Pretty,
    Json,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the merged configuration of a module
    Select(commands::select::SelectArgs),
    /// List the rules stored for a module, least specific first
    Rules(commands::rules::RulesArgs),
}

fn main() {
    let cli = Cli::parse();

    match cli.log {
        LogFormat::Off => {}
        LogFormat::Pretty => init(Profile::Development),
        LogFormat::Json => init(Profile::Production),
    }

    let result = match cli.command {
        Commands::Select(args) => commands::select::execute(args),
        Commands::Rules(args) => commands::rules::execute(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
