use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use r2_smith::{menu::Menu, Config, WalletManager};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv().ok();

    let file_appender = tracing_appender::rolling::daily("logs", "r2-smith.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(false))
        .with(fmt::layer().json().with_writer(file_writer))
        .init();

    info!("R2 Money Bot starting on Sepolia testnet");

    // Missing credentials halt here, before any network activity
    let config = Config::from_env()?;
    info!(
        proxies = config.proxies.len(),
        private_keys = config.signers.len(),
        "Configuration loaded"
    );

    let manager = WalletManager::connect(&config).await?;

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    Menu::new(&manager, stdin).run().await?;

    info!("Application exited.");
    Ok(())
}
