// SPDX-FileCopyrightText: © 2025 Castlink Contributors
//
// SPDX-License-Identifier: MPL-2.0

use clap::{Parser, Subcommand};
use schemars::schema_for;
use tracing::{error, info, warn};

use crate::config;

type LogInitFn = fn(
    &config::LogConfig,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "castlink.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Join a live stream and print chat and connection progress
    Watch {
        /// Stream to join
        stream_id: String,
        /// Viewer auth token (overrides `server.token`)
        #[arg(long)]
        token: Option<String>,
    },
    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate a default config file and print it to stdout
    Default,
    /// Generate a JSON schema for the config and print it to stdout
    Schema,
}

/// Handle the "watch" command.
/// Exits the process on error with status code 1
// Allow eprintln before logging is initialized (CLI output)
#[allow(clippy::disallowed_macros)]
async fn handle_watch_command(
    config_path: &str,
    stream_id: &str,
    token: Option<String>,
    init_logging: LogInitFn,
) {
    let config_result = match config::load(config_path) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        },
    };

    let _log_guard = match init_logging(&config_result.config.log) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            std::process::exit(1);
        },
    };

    if let Some(missing_file) = &config_result.file_missing {
        warn!(config_path = %missing_file, "Config file not found, using defaults");
    }

    let config = &config_result.config;
    info!(
        api_url = %config.server.api_url,
        signaling_url = %config.server.signaling_url,
        max_retries = config.connection.max_retries,
        ice_servers = config.ice.servers.len(),
        "Starting castlink viewer"
    );

    if let Err(e) = crate::watch::run(config, stream_id, token).await {
        error!(error = %e, "Viewer stopped");
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

/// Handle the "config default" command - print default config to stdout
// Allow println for CLI output to stdout (intentional)
#[allow(clippy::disallowed_macros)]
fn handle_config_default_command() {
    match config::generate_default() {
        Ok(toml_string) => {
            println!("# Default castlink configuration file");
            println!("{toml_string}");
        },
        Err(e) => {
            eprintln!("Failed to generate default config: {e}");
            std::process::exit(1);
        },
    }
}

/// Handle the "config schema" command - print JSON schema to stdout
// Allow println for CLI output to stdout (intentional)
#[allow(clippy::disallowed_macros)]
fn handle_config_schema_command() {
    let schema = schema_for!(config::Config);
    match serde_json::to_string_pretty(&schema) {
        Ok(json) => {
            println!("{json}");
        },
        Err(e) => {
            eprintln!("Failed to generate config schema: {e}");
            std::process::exit(1);
        },
    }
}

/// Handle CLI commands
pub async fn handle_command(cli: &Cli, init_logging: LogInitFn) {
    match &cli.command {
        Commands::Watch { stream_id, token } => {
            handle_watch_command(&cli.config, stream_id, token.clone(), init_logging).await;
        },
        Commands::Config(ConfigCommands::Default) => {
            handle_config_default_command();
        },
        Commands::Config(ConfigCommands::Schema) => {
            handle_config_schema_command();
        },
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_watch_arguments() {
        let cli = Cli::try_parse_from(["castlink", "-c", "other.toml", "watch", "stream-42", "--token", "t"])
            .unwrap();
        assert_eq!(cli.config, "other.toml");
        match cli.command {
            Commands::Watch { stream_id, token } => {
                assert_eq!(stream_id, "stream-42");
                assert_eq!(token.as_deref(), Some("t"));
            },
            Commands::Config(_) => panic!("expected watch"),
        }
    }

    #[test]
    fn test_config_subcommands() {
        let cli = Cli::try_parse_from(["castlink", "config", "schema"]).unwrap();
        assert_eq!(cli.config, "castlink.toml");
        assert!(matches!(cli.command, Commands::Config(ConfigCommands::Schema)));
    }
}
