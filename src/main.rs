use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use tracing::info;

use tg_storebot::catalog::Catalog;
use tg_storebot::config;
use tg_storebot::handlers::{self, Storefront};
use tg_storebot::messenger::TelegramMessenger;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))
        .with_context(|| format!("failed to load {}", args.config.display()))?;

    let catalog = Catalog::load_or_empty(&cfg.app.catalog_path());

    let bot = Bot::new(cfg.telegram.bot_token.clone());
    let me = bot.get_me().await.context("telegram rejected the bot token")?;
    info!(username = ?me.username, products = catalog.len(), "starting storefront bot");

    let messenger = Arc::new(TelegramMessenger::new(bot.clone(), cfg.telegram.admin_recipient()?));
    let shop = Arc::new(Storefront::new(&cfg, Arc::new(catalog), messenger)?);

    if let Some(ttl) = cfg.app.pending_order_ttl() {
        let shop = shop.clone();
        let every = ttl.to_std().unwrap_or(Duration::from_secs(60)).min(Duration::from_secs(60));
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(every).await;
                let purged = shop.orders().purge_expired().await;
                if purged > 0 {
                    info!(purged, "dropped expired pending orders");
                }
            }
        });
    }

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter(|msg: Message| msg.chat.is_private())
                .endpoint(handlers::handle_message),
        )
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![shop])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
