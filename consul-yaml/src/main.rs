use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{debug, Level};

mod commands;

use commands::{LoginCommand, SchemaCommand};

#[derive(Parser)]
#[command(
    name = "consul-yaml",
    about = "Log in to Consul with the consul-yaml auth-login backends",
    version = env!("CARGO_PKG_VERSION"),
    author = "ktruck"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: Level,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and print the Consul ACL token
    Login(LoginCommand),
    /// Print the provider configuration schema as JSON
    Schema(SchemaCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout only carries the token or schema
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        cli.log_level
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Login(cmd) => {
            debug!("Reading provider configuration from {}", cmd.config.display());
            commands::login(cmd).await?;
        }
        Commands::Schema(cmd) => commands::schema(cmd)?,
    }

    Ok(())
}
