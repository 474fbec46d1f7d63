//! usagectl CLI - Main entry point

use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing::error;
use usagectl_cli::{Cli, Commands, Config, ConfigCommand};
use usagectl_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};

#[tokio::main]
async fn main() {
    // Parse command-line arguments
    let cli = Cli::parse();

    // Initialize logging based on verbose flag and environment
    let log_config = if cli.verbose {
        // Verbose mode: log to console with debug level
        LogConfig::builder()
            .level(LogLevel::Debug)
            .output(LogOutput::Console)
            .log_file_prefix("usagectl".to_string())
            .build()
    } else {
        // Normal mode: only warnings and errors to console
        LogConfig::builder()
            .level(LogLevel::Warn)
            .output(LogOutput::Console)
            .log_file_prefix("usagectl".to_string())
            .build()
    };

    // Merge with environment variables (they take precedence)
    let log_config = LogConfig::from_env().unwrap_or(log_config);

    // Initialize logging (ignore errors as CLI should work without logging)
    let _ = init_logging(&log_config);

    // Execute command
    let result = execute_command(&cli).await;

    // Handle result
    if let Err(e) = result {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Execute the CLI command
async fn execute_command(cli: &Cli) -> usagectl_cli::Result<()> {
    let config_path: PathBuf = match cli.config {
        Some(ref path) => path.clone(),
        None => Config::default_path()?,
    };

    match &cli.command {
        Commands::Pull {
            dry_run,
            start_date,
            end_date,
        } => {
            usagectl_cli::commands::pull::run(&config_path, *dry_run, *start_date, *end_date)
                .await
        }

        Commands::Commit { dry_run } => {
            usagectl_cli::commands::commit::run(&config_path, *dry_run).await
        }

        Commands::Push {
            file,
            dry_run,
            force,
        } => {
            usagectl_cli::commands::push::run(&config_path, file.clone(), *dry_run, *force).await
        }

        Commands::Status => usagectl_cli::commands::status::run(&config_path).await,

        Commands::Config { command } => match command {
            ConfigCommand::Get { key } => {
                usagectl_cli::commands::config::get(&config_path, key).await
            }
            ConfigCommand::Set { key, value } => {
                usagectl_cli::commands::config::set(&config_path, key, value).await
            }
            ConfigCommand::Show => usagectl_cli::commands::config::show(&config_path).await,
        },
    }
}
