use std::path::PathBuf;

use clap::Parser;
use miette::Result;
use tracing::info;
use uber_ads_core::{AdsConfig, load_config};
use uber_ads_mcp::AdsMcpServer;

#[derive(Parser)]
#[command(name = "uber-ads-mcp")]
#[command(about = "MCP server for the Uber Ads API")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Ads API base URL (overrides config and environment)
    #[arg(long)]
    base_url: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .rgb_colors(miette::RgbColors::Preferred)
                .with_cause_chain()
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }))?;
    miette::set_panic_hook();
    let cli = Cli::parse();

    use tracing_subscriber::{EnvFilter, fmt};

    // stdout carries the protocol, so logs go to stderr
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.debug {
            EnvFilter::new("uber_ads_core=debug,uber_ads_mcp=debug,warn")
        } else {
            EnvFilter::new("uber_ads_core=info,uber_ads_mcp=info,warn")
        }
    });

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_timer(tracing_subscriber::fmt::time::LocalTime::rfc_3339())
        .compact()
        .init();

    let mut config = if let Some(config_path) = &cli.config {
        info!("Loading config from: {:?}", config_path);
        load_config(config_path).await?
    } else {
        AdsConfig::default()
    };
    config.apply_process_env()?;

    if let Some(base_url) = cli.base_url {
        info!("Overriding base URL with: {}", base_url);
        config.base_url = base_url;
    }
    config.validate()?;

    AdsMcpServer::from_config(&config)?.serve_stdio().await?;
    Ok(())
}
