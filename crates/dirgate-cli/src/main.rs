//! dirgate - REST admin gateway for LDAP directories
//!
//! Manages users, groups and group membership of an LDAP directory over a
//! JSON API, acting with the rights of the calling user.

use anyhow::Context;
use clap::{Parser, Subcommand};
use dirgate_api::ApiServer;
use dirgate_core::config::LoggingConfig;
use dirgate_core::DirgateConfig;
use dirgate_directory::{check_directory, LdapConnector};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "dirgate")]
#[command(version = dirgate_core::VERSION)]
#[command(about = "REST admin gateway for LDAP users and groups", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, global = true, env = "DIRGATE_CONF", default_value = "config.yaml")]
    conf: PathBuf,

    /// Bind host
    #[arg(long, global = true)]
    host: Option<String>,

    /// Port number
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve,

    /// Validate the configuration and bind with the service account
    Check,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Some(Commands::Version) = cli.command {
        println!("dirgate {}", dirgate_core::VERSION);
        return Ok(());
    }

    let config = load_config(&cli)?;
    init_logging(&config.logging);

    match cli.command {
        Some(Commands::Check) => run_check(config).await,
        _ => run_server(config).await,
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<DirgateConfig> {
    let mut config = DirgateConfig::from_file(&cli.conf)
        .with_context(|| format!("cannot load {}", cli.conf.display()))?;
    config.apply_env()?;

    // Override with CLI args
    if let Some(host) = &cli.host {
        config.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }

    config.validate()?;
    Ok(config)
}

/// `RUST_LOG` wins over the configured level
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}

async fn run_check(config: DirgateConfig) -> anyhow::Result<()> {
    let connector = LdapConnector::new(&config.ldap);
    check_directory(&connector, &config)
        .await
        .with_context(|| format!("directory check against {} failed", config.ldap.url))?;

    info!(url = %config.ldap.url, base_dn = %config.ldap.base_dn, "Directory reachable");
    println!("configuration OK, directory reachable");
    Ok(())
}

async fn run_server(config: DirgateConfig) -> anyhow::Result<()> {
    info!(version = dirgate_core::VERSION, "Starting dirgate");

    let connector = Arc::new(LdapConnector::new(&config.ldap));
    let server = ApiServer::new(config, connector);
    server.run().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses() {
        let cli = Cli::parse_from(["dirgate", "--conf", "/etc/dirgate.yaml", "--port", "9000", "check"]);
        assert_eq!(cli.conf, PathBuf::from("/etc/dirgate.yaml"));
        assert_eq!(cli.port, Some(9000));
        assert!(matches!(cli.command, Some(Commands::Check)));
    }

    #[test]
    fn test_serve_is_default() {
        let cli = Cli::parse_from(["dirgate"]);
        assert!(cli.command.is_none());
        assert!(cli.host.is_none());
    }
}
