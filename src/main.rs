//! rulegate CLI - a reverse proxy that filters requests against allow rules

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use rulegate::{Config, ProxyServer, RuleSet};

#[derive(Parser)]
#[command(name = "rulegate")]
#[command(about = "A reverse proxy that filters requests against allow rules")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the proxy server
    Run {
        /// Path to configuration file (.toml, .yaml or .yml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Upstream URL to forward allowed requests to (overrides config)
        #[arg(short, long)]
        target_url: Option<String>,

        /// Bind address (overrides config)
        #[arg(short, long)]
        bind: Option<String>,

        /// Log level (error, warn, info, debug, trace); overrides config
        #[arg(short, long)]
        log_level: Option<String>,
    },

    /// Validate a configuration file
    ValidateConfig {
        /// Path to configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            target_url,
            bind,
            log_level,
        } => {
            let mut cfg = match &config {
                Some(path) => Config::from_file(path)?,
                None => Config::parse("")?,
            };

            let level = log_level.unwrap_or_else(|| cfg.logging.level.clone());
            let filter =
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();

            match &config {
                Some(path) => tracing::info!(path = %path.display(), "Loaded configuration"),
                None => tracing::info!("Using default configuration"),
            }

            if let Some(url) = target_url {
                cfg.proxy.target_url = url;
            }
            if let Some(addr) = bind {
                cfg.proxy.bind_address = addr;
            }

            if cfg.rules.is_empty() {
                tracing::warn!("No rules configured, every request will be blocked");
            }
            for (i, rule) in cfg.rules.iter().enumerate() {
                tracing::info!(
                    rule = i + 1,
                    uri = %rule.uri,
                    method = %rule.method,
                    body = %rule.body,
                    header_key = %rule.headers.key,
                    header_value = %rule.headers.value,
                    "Rule"
                );
            }

            let server = ProxyServer::new(cfg)?;

            tracing::info!("Starting proxy server...");

            // Handle Ctrl+C
            let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                tracing::info!("Shutting down...");
                let _ = shutdown_tx.send(());
            });

            server.run_until_shutdown(shutdown_rx).await?;
        }

        Commands::ValidateConfig { config } => {
            println!("Validating configuration: {}", config.display());

            let cfg = Config::from_file(&config)?;
            let rules = RuleSet::new(&cfg.rules)?;

            println!("Configuration is valid!");
            println!();
            println!("  Bind address: {}", cfg.proxy.bind_address);
            println!("  Target URL: {}", cfg.proxy.target_url);
            match cfg.proxy.max_body_bytes {
                Some(limit) => println!("  Max body bytes: {}", limit),
                None => println!("  Max body bytes: unlimited"),
            }
            println!("  Log level: {}", cfg.logging.level);
            println!(
                "  Log allowed requests: {}",
                cfg.logging.log_allowed_requests
            );
            println!(
                "  Log blocked requests: {}",
                cfg.logging.log_blocked_requests
            );
            println!("  Rules: {}", cfg.rules.len());

            if !cfg.rules.is_empty() {
                println!();
                println!("Rules:");
                for (i, rule) in cfg.rules.iter().enumerate() {
                    println!(
                        "  {}. uri={} method={} body={} headers={}: {}",
                        i + 1,
                        rule.uri,
                        rule.method,
                        rule.body,
                        rule.headers.key,
                        rule.headers.value
                    );
                }
            }

            println!();
            println!("All {} rules compiled successfully.", rules.len());
        }
    }

    Ok(())
}
