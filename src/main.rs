//! g2g_settlement - Commission & Balance Engine
//!
//! ```text
//! ┌──────────┐    ┌───────────────┐    ┌──────────┐    ┌──────────┐
//! │  Config  │───▶│ MarketService │───▶│  Store   │───▶│  Outbox  │──▶ Notifier
//! │  (YAML)  │    │ (split+ledger)│    │ (tx/PG)  │    │ (commit) │   (worker)
//! └──────────┘    └───────────────┘    └──────────┘    └──────────┘
//! ```
//!
//! Modes:
//! - default: start the service and wait for Ctrl+C
//! - `--demo`: seed an in-memory market, settle one order, print balances
//! - `--balance <party>`: recompute one party's balance and exit
//! - `--feed <party>`: print the listing feed as seen by a party and exit

use std::sync::Arc;

use anyhow::Context;
use rust_decimal::Decimal;

use g2g_settlement::config::AppConfig;
use g2g_settlement::db::Database;
use g2g_settlement::notify::{LogNotifier, Notifier, TelegramNotifier, notification_channel};
use g2g_settlement::pricing::{CachedQuoteProvider, StaticQuotes};
use g2g_settlement::{
    Buyer, CommissionRates, DeliveryMethod, ListingField, Market, MarketService, MemoryStore,
    NewOrder, Party, PartyId, RateAssignment, Store,
};

// ============================================================
// ARGUMENTS
// ============================================================

fn get_arg(names: &[&str]) -> Option<String> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if names.contains(&args[i].as_str()) && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }
    None
}

fn get_env() -> String {
    get_arg(&["--env", "-e"]).unwrap_or_else(|| "dev".to_string())
}

fn get_party_arg(name: &str) -> anyhow::Result<Option<PartyId>> {
    get_arg(&[name])
        .map(|v| v.parse().with_context(|| format!("{} expects a party id, got {}", name, v)))
        .transpose()
}

fn use_demo_mode() -> bool {
    std::env::args().any(|a| a == "--demo")
}

// ============================================================
// WIRING
// ============================================================

async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn Store>> {
    match &config.postgres_url {
        Some(url) => {
            let db = Database::connect(url, &config.database)
                .await
                .context("connecting to PostgreSQL")?;
            db.health_check().await.context("PostgreSQL health check")?;
            let store = db.open_store().await?;
            println!("✅ PostgreSQL store ready");
            Ok(Arc::new(store))
        }
        None => {
            println!("⚠️ No postgres_url configured, using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

fn build_notifier(config: &AppConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    match TelegramNotifier::from_config(&config.notifier)? {
        Some(telegram) => Ok(Arc::new(telegram)),
        None => Ok(Arc::new(LogNotifier)),
    }
}

/// Small demo market: one seller with a mentor, one external order
async fn run_demo(service: &MarketService) -> anyhow::Result<()> {
    let accounts = *service.accounts();
    service
        .register_party(&Party::new(accounts.owner, "owner"))
        .await?;
    service
        .register_party(&Party::new(accounts.technical, "technical"))
        .await?;
    service
        .register_party(&Party::new(10, "mentor").with_notify_handle("10"))
        .await?;
    service
        .register_party(
            &Party::new(11, "seller")
                .with_mentor(10)
                .with_notify_handle("11"),
        )
        .await?;
    service
        .register_market(&Market {
            id: 100,
            server_name: "Firemaw".into(),
            game_name: "WoW Classic".into(),
            region: "EU".into(),
            fraction: "Alliance".into(),
        })
        .await?;
    service
        .set_commission_rates(&CommissionRates {
            exchange: Decimal::from(7),
            owner: Decimal::from(5),
            technical: Decimal::from(5),
            mentor: Decimal::from(3),
            renter_lvl1: Decimal::ZERO,
            renter_lvl2: Decimal::ZERO,
            recruiter: Decimal::ZERO,
        })
        .await?;
    service
        .set_rate_assignment(&RateAssignment {
            party: 11,
            market: 100,
            interest_rate: 10,
            renter: None,
        })
        .await?;

    let listing = service.add_listing(11, 100).await?;
    service
        .update_listing_field(listing.id, ListingField::Stock(5_000))
        .await?;
    service
        .update_listing_field(listing.id, ListingField::Active(true))
        .await?;

    let order = service
        .create_order(NewOrder {
            buyer: Buyer::External("buyer@example.com".into()),
            seller: 11,
            market: 100,
            quantity: 1_000,
            unit_price: Decimal::ONE,
            delivery: DeliveryMethod::Mail,
            character_name: "Jaina".into(),
        })
        .await?;
    println!(
        "Order {} created: total {} seller net {}",
        order.order_number, order.total_amount, order.seller_net
    );

    let status = service
        .confirm_delivery(order.order_ref(), "proofs/demo.mp4", order.quantity)
        .await?;
    println!("{}", status.message);

    for party in [11, 10, accounts.owner, accounts.technical] {
        println!("Balance of {}: {}", party, service.get_balance(party).await?);
    }
    Ok(())
}

// ============================================================
// MAIN
// ============================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let app_config = AppConfig::load(&env).with_context(|| format!("loading {} config", env))?;
    let _log_guard = g2g_settlement::logging::init_logging(&app_config);

    println!("=== g2g_settlement ({}) ===", env!("GIT_HASH"));
    tracing::info!(env = %env, git = env!("GIT_HASH"), "Starting settlement service");

    let store = build_store(&app_config).await?;
    let notifier = build_notifier(&app_config)?;
    let (dispatcher, worker) = notification_channel(
        app_config.notifier.queue_size,
        notifier,
        app_config.notifier.supervisor_chat_ids.clone(),
    );
    let worker_handle = tokio::spawn(worker.run());

    // Quotes are pushed in by the pricing job; the table starts empty
    let quotes = Arc::new(CachedQuoteProvider::new(
        StaticQuotes::new(),
        app_config.pricing.cache_ttl_secs,
    ));
    let service = MarketService::new(
        store,
        quotes,
        dispatcher,
        app_config.platform.accounts(),
        app_config.platform.node_id,
    );

    if use_demo_mode() {
        run_demo(&service).await?;
    } else if let Some(party) = get_party_arg("--balance")? {
        println!("Balance of {}: {}", party, service.get_balance(party).await?);
    } else if let Some(viewer) = get_party_arg("--feed")? {
        for row in service.get_listing_feed(viewer).await? {
            let price = row
                .viewer_price
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "#{:<6} {:<32} {:<16} stock {:>8} {:<9} price {}",
                row.listing.id,
                row.market_label,
                row.seller_name,
                row.listing.stock,
                row.listing.strategy.as_str(),
                price
            );
        }
    } else {
        println!("Press Ctrl+C to shutdown\n");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown requested");
    }

    // Dropping the service closes the queue; the worker drains and stops
    drop(service);
    let _ = worker_handle.await;
    Ok(())
}
