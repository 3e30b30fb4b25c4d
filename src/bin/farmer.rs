use anyhow::Context;
use spam_farmer::config::{mnemonic_from_env, Settings};
use spam_farmer::farmer::Farmer;
use spam_farmer::gateway::{ChainGateway, RpcGateway};
use spam_farmer::notify::Notifier;
use spam_farmer::types::FUNDING_ACCOUNT;
use spam_farmer::wallet::Keystore;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env().context("invalid configuration")?;
    let mnemonic = mnemonic_from_env()?;
    let keystore = Keystore::from_mnemonic(&mnemonic, settings.farm.account_count)
        .context("failed to derive fleet keys")?;
    drop(mnemonic);

    let gateway = RpcGateway::new(settings.rpc.clone(), keystore).context("failed to build rpc client")?;
    info!(
        rpc = %gateway.url(),
        funder = %gateway.address(FUNDING_ACCOUNT)?,
        accounts = settings.farm.account_count,
        "starting spam farmer"
    );

    let farmer = Farmer::new(gateway, settings.farm)
        .with_notifier(Notifier::from_webhook(settings.discord_webhook));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("ctrl-c received, finishing current tick");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for ctrl-c; stop the process to exit");
                // Keep the sender alive so the loop keeps running.
                std::future::pending::<()>().await;
                drop(shutdown_tx);
            }
        }
    });

    farmer.run(shutdown_rx).await;
    Ok(())
}
