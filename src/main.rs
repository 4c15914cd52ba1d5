//! vigil - health-check scheduler with alert escalation
//!
//! A command-line tool that watches host metrics and services, escalates
//! sustained problems and delivers alerts to chat, mail, webhook and
//! console channels.

use clap::Parser;
use vigil::cli::args::{generate_completions, Cli, Commands};
use vigil::commands::{run_check, run_config, run_engine, run_status, run_test_channel};
use vigil::error::{AppError, ChannelError, ConfigError};

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging; each -v raises the default level, RUST_LOG still wins
    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();

    // Run the appropriate command
    let result = run(&cli).await;

    if let Err(e) = result {
        log::error!("{}", e);
        print_error(&e);
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<(), AppError> {
    let config = cli.config.as_deref();

    match &cli.command {
        Commands::Run(args) => run_engine(args, cli.format, config).await,

        Commands::Check(args) => run_check(args, cli.format, config).await,

        Commands::Status { file } => run_status(file.as_deref(), cli.format, config),

        Commands::Config(args) => run_config(args, cli.format, config),

        Commands::TestChannel { channel } => run_test_channel(*channel, cli.format, config).await,

        Commands::Completions { shell } => {
            generate_completions(*shell);
            Ok(())
        }
    }
}

fn print_error(err: &AppError) {
    eprintln!("Error: {}", err);

    // Print helpful hints for common errors
    match err {
        AppError::Config(ConfigError::FileNotFound(_)) => {
            eprintln!();
            eprintln!("Hint: Create one with 'vigil config init' or pass --config <path>.");
        }
        AppError::Config(ConfigError::AlreadyExists(_)) => {
            eprintln!();
            eprintln!("Hint: Use --force to overwrite it.");
        }
        AppError::Channel(ChannelError::InvalidCredential(_)) => {
            eprintln!();
            eprintln!("Hint: Check the token or SMTP credentials under [channels] in the config.");
        }
        AppError::Channel(ChannelError::UnauthorizedRecipient(_)) => {
            eprintln!();
            eprintln!("Hint: Make sure the bot has been added to the chat and may post there.");
        }
        AppError::StatusUnavailable(_) => {
            eprintln!();
            eprintln!("Hint: Set engine.status_file and start the engine with 'vigil run'.");
        }
        _ => {}
    }
}
