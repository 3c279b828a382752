//! Command-line interface for cpolar-connect.
//!
//! The binary is a thin orchestrator over the `cpolar-connect` crate: it
//! parses arguments, initializes logging, sequences the library pipeline,
//! and maps outcomes to process exit codes. All protocol and file-format
//! logic lives in the library.

use clap::{Parser, Subcommand, ValueEnum};

mod commands;
mod logging;
mod prompts;

use commands::CliError;

/// Resolve the current cpolar TCP tunnel and keep SSH access working.
#[derive(Debug, Parser)]
#[command(name = "cpolar-connect", version, about)]
struct Cli {
    /// Answer yes to confirmation prompts.
    #[arg(short = 'y', long = "yes", global = true)]
    yes: bool,

    /// Output format for machine-readable commands.
    #[arg(short = 'f', long = "format", global = true, value_enum, default_value = "text")]
    format: Format,

    /// Suppress informational output (errors still print).
    #[arg(short = 'q', long = "quiet", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Human-readable text.
    Text,
    /// One JSON object on stdout.
    Json,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive first-run setup: credentials, server user, ports.
    Init {
        /// Overwrite an existing configuration.
        #[arg(long)]
        force: bool,
        /// Dashboard account name (prompted when omitted).
        #[arg(long)]
        username: Option<String>,
        /// Remote server login user (prompted when omitted).
        #[arg(long)]
        server_user: Option<String>,
        /// Comma-separated local forward ports (prompted when omitted).
        #[arg(long)]
        ports: Option<String>,
    },
    /// Resolve the current tunnel without connecting.
    Status,
    /// Inspect or edit the configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Print the full configuration.
    Show,
    /// Print one configuration value.
    Get {
        /// The configuration key.
        key: String,
    },
    /// Set one configuration value.
    Set {
        /// The configuration key.
        key: String,
        /// The new value.
        value: String,
    },
    /// Print the configuration file path.
    Path,
    /// Remove the stored dashboard password from the keychain.
    ClearPassword,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.quiet);

    let result = match cli.command {
        None => commands::connect::run(&commands::connect::ConnectOptions {
            assume_yes: cli.yes,
            quiet: cli.quiet,
        }),
        Some(Command::Init {
            force,
            username,
            server_user,
            ports,
        }) => commands::init::run(&commands::init::InitOptions {
            force,
            username,
            server_user,
            ports,
        })
        .map(|()| 0),
        Some(Command::Status) => commands::status::run(cli.format == Format::Json).map(|()| 0),
        Some(Command::Config { command }) => {
            commands::config::run(&command, cli.yes).map(|()| 0)
        }
    };

    let code = match result {
        Ok(code) => code,
        Err(CliError::Interrupted) => cpolar_connect::ssh::INTERRUPT_EXIT_CODE,
        Err(err) => {
            tracing::error!(%err, "command failed");
            eprintln!("error: {err}");
            1
        }
    };
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_connect() {
        let cli = Cli::parse_from(["cpolar-connect", "-y"]);
        assert!(cli.command.is_none());
        assert!(cli.yes);
    }

    #[test]
    fn status_accepts_json_format() {
        let cli = Cli::parse_from(["cpolar-connect", "status", "--format", "json"]);
        assert_eq!(cli.format, Format::Json);
        assert!(matches!(cli.command, Some(Command::Status)));
    }

    #[test]
    fn config_set_takes_key_and_value() {
        let cli = Cli::parse_from(["cpolar-connect", "config", "set", "ports", "9000"]);
        match cli.command {
            Some(Command::Config {
                command: ConfigCommand::Set { key, value },
            }) => {
                assert_eq!(key, "ports");
                assert_eq!(value, "9000");
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }
}
