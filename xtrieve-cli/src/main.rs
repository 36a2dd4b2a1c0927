//! xtrieve-cli - Command-line interface for xtrieve
//!
//! Provides both a REPL and one-shot command execution.

mod commands;
mod repl;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use xtrieve_client::{Client, ConnectionConfig};
use xtrieve_protocol::DEFAULT_PORT;

#[derive(Parser)]
#[command(name = "xtrieve-cli")]
#[command(about = "Command-line interface for the xtrieve record manager")]
#[command(version)]
struct Cli {
    /// Engine address (host or host:port)
    #[arg(short, long, env = "XTRIEVE_SERVER", default_value = "127.0.0.1:7419")]
    server: String,

    /// Connection timeout in seconds
    #[arg(long, default_value = "10")]
    timeout: u64,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start interactive REPL
    Repl,

    /// Create a file
    Create {
        /// File path on the engine
        path: String,

        /// File spec JSON (or @file.json to read from file)
        spec: String,
    },

    /// Show file statistics
    Stat {
        /// File path on the engine
        path: String,
    },

    /// Print every record of a file
    Dump {
        /// File path on the engine
        path: String,

        /// Walk this key's order instead of physical order
        #[arg(short, long)]
        key: Option<i16>,

        /// Stop after this many records
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Insert one record
    Insert {
        /// File path on the engine
        path: String,

        /// Record contents
        record: String,

        /// Record is hex rather than text
        #[arg(long)]
        hex: bool,
    },

    /// Fetch the record whose key equals the given value
    Get {
        /// File path on the engine
        path: String,

        /// Key value
        key: String,

        /// Key number
        #[arg(short = 'n', long, default_value = "0")]
        key_number: i16,

        /// Key is hex rather than text
        #[arg(long)]
        hex: bool,
    },
}

/// Splits `host[:port]`, defaulting the port.
fn split_server(server: &str) -> Result<(String, u16), String> {
    match server.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && !host.ends_with(':') => {
            let port = port
                .parse()
                .map_err(|_| format!("invalid port in server address: {}", server))?;
            Ok((host.trim_matches(|c| c == '[' || c == ']').to_string(), port))
        }
        _ => Ok((server.to_string(), DEFAULT_PORT)),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let (host, port) = split_server(&cli.server)?;
    let config = ConnectionConfig::new().with_connect_timeout(Duration::from_secs(cli.timeout));

    let mut client = Client::connect_with(&host, port, config)
        .await
        .map_err(|e| {
            eprintln!("{}: {}", "Connection failed".red(), e);
            e
        })?;
    tracing::debug!("Connected to {}:{}", host, port);

    match cli.command {
        Some(Commands::Repl) | None => {
            repl::run(client, &host, port).await?;
        }
        Some(cmd) => {
            let result = commands::execute(&mut client, cmd, cli.json).await;
            client.disconnect().await;

            match result {
                Ok(output) => {
                    println!("{}", output);
                }
                Err(e) => {
                    eprintln!("{}: {}", "Error".red(), e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
