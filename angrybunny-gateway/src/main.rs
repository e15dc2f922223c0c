//! Angry Bunny licensing gateway server.
//!
//! Runs the HTTP activation gateway for self-issued licenses and the daily
//! license reconciliation against the upstream authority.
//!
//! Usage:
//!   angrybunny-gateway --site-url https://shop.example --port 8787

use std::{path::PathBuf, sync::Arc, time::Duration};
use anyhow::{Context, Result};
use clap::Parser;
use angrybunny_gateway::{build_router, GatewayState};
use angrybunny_manager::{LicenseManager, LogNotifier, ManagerConfig};
use angrybunny_remote::{AuthorityClient, AuthorityConfig};
use angrybunny_store::EntitlementStore;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// One day, the reconciliation cadence.
const CHECK_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Parser, Debug)]
#[command(name = "angrybunny-gateway")]
#[command(about = "Angry Bunny license gateway and lifecycle daemon")]
struct Args {
    /// Path to the entitlement database
    #[arg(long, default_value = "angry-bunny.db")]
    db: PathBuf,

    /// Address to bind the HTTP gateway on
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Port for the HTTP gateway
    #[arg(short, long, default_value = "8787")]
    port: u16,

    /// This site's own URL, reported to the licensing authority
    #[arg(long)]
    site_url: String,

    /// Licensing authority endpoint
    #[arg(long, default_value = "https://updates.angry-bunny.example/edd-sl")]
    authority_url: String,

    /// Product item id at the authority
    #[arg(long, default_value = "123")]
    item_id: u32,

    /// Product item name at the authority
    #[arg(long, default_value = "Angry Bunny Security Scanner Pro")]
    item_name: String,

    /// Environment tag sent with authority calls
    #[arg(long, default_value = "production")]
    environment: String,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!("Angry Bunny gateway starting...");
    let db_path = args.db.to_string_lossy();
    let store = Arc::new(
        EntitlementStore::open(&db_path).context("failed to open entitlement store")?,
    );
    let api_key = store.api_key().context("failed to provision api key")?;

    let client = AuthorityClient::new(AuthorityConfig {
        endpoint: args.authority_url.clone(),
        item_id: args.item_id,
        item_name: args.item_name.clone(),
    })
    .context("failed to build authority client")?;

    let mut config = ManagerConfig::for_site(args.site_url.clone());
    config.environment = args.environment.clone();
    let manager = LicenseManager::new(
        Arc::clone(&store),
        client,
        Arc::new(LogNotifier),
        config,
    );

    // Daily reconciliation; the first tick fires immediately on startup.
    tokio::spawn(async move {
        let mut ticks = tokio::time::interval(CHECK_INTERVAL);
        loop {
            ticks.tick().await;
            let result = manager.check_license().await;
            if result.success {
                info!("daily license check completed");
            } else {
                warn!(message = %result.message, "daily license check failed");
            }
        }
    });

    let state = GatewayState::new(Arc::clone(&store)).context("failed to build gateway state")?;
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(format!("{}:{}", args.bind, args.port))
        .await
        .context("failed to bind gateway port")?;

    println!("\n========================================");
    println!("  Angry Bunny Gateway Running");
    println!("========================================");
    println!("  Bind:     {}:{}", args.bind, args.port);
    println!("  Store:    {}", db_path);
    println!("  API key:  {}", api_key);
    println!("========================================\n");

    axum::serve(listener, app).await.context("gateway server failed")?;
    Ok(())
}
