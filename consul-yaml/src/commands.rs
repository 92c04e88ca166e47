use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use consul_yaml::global_registry;
use consul_yaml::provider::{provider_schema, ProviderConfig};

#[derive(Parser, Debug, Clone)]
pub struct LoginCommand {
    /// Provider configuration file (YAML)
    #[arg(short, long, env = "CONSUL_YAML_CONFIG", default_value = "consul-yaml.yaml")]
    pub config: PathBuf,
}

#[derive(Parser, Debug, Clone)]
pub struct SchemaCommand {
    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,
}

pub async fn login(cmd: LoginCommand) -> Result<()> {
    let yaml = tokio::fs::read_to_string(&cmd.config)
        .await
        .with_context(|| format!("failed to read {}", cmd.config.display()))?;

    let registry = global_registry();
    let config = ProviderConfig::from_yaml_str(registry, &yaml)
        .with_context(|| format!("invalid configuration in {}", cmd.config.display()))?;

    match config.login(registry).await.context("Consul login failed")? {
        Some(token) => {
            info!("Consul login succeeded");
            println!("{}", token);
        }
        None => anyhow::bail!(
            "no auth login block configured in {}",
            cmd.config.display()
        ),
    }

    Ok(())
}

pub fn schema(cmd: SchemaCommand) -> Result<()> {
    let schema = provider_schema(global_registry());
    let output = if cmd.pretty {
        serde_json::to_string_pretty(&schema)?
    } else {
        serde_json::to_string(&schema)?
    };
    println!("{}", output);
    Ok(())
}
