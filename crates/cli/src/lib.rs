pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "palaver",
    about = "Palaver operator CLI",
    long_about = "Operate the Palaver support engine: one-shot chat turns, migrations, config inspection, and readiness checks.",
    after_help = "Examples:\n  palaver chat -m \"where is my order #12345\"\n  palaver doctor --json\n  palaver config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run one message through an in-memory decision engine")]
    Chat {
        #[arg(short, long, help = "Message text to classify and answer")]
        message: String,
        #[arg(long, default_value = "operator", help = "User id to attribute the turn to")]
        user: String,
        #[arg(long, help = "Session id; generated when omitted")]
        session: Option<String>,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Inspect effective configuration values with secrets redacted")]
    Config,
    #[command(about = "Validate config, classification table, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Chat { message, user, session } => commands::chat::run(&message, &user, session),
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
