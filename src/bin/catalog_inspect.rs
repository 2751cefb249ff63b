use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use tg_storebot::catalog::Catalog;
use tg_storebot::config;
use tg_storebot::format;

#[derive(Parser, Debug)]
#[command(author, version, about = "Load the product catalog and optionally run a search")]
struct Args {
    /// Path to YAML config
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Read this catalog file instead of `app.catalog_path`
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Search query to run against the catalog
    #[arg(long)]
    query: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    let path = args.catalog.unwrap_or_else(|| cfg.app.catalog_path());
    let catalog = Catalog::load(&path)?;

    println!("Catalog: {} ({} products)", path.display(), catalog.len());
    let products: Vec<_> = match &args.query {
        Some(q) => catalog.search(q),
        None => catalog.products().iter().collect(),
    };
    if let Some(q) = &args.query {
        println!("Query {:?}: {} matches", q, products.len());
    }
    for p in products {
        println!(
            "  [{}] {} -> {}{}",
            p.id,
            p.title,
            format::price(p.price, &cfg.store.currency),
            if format::image_url(p).is_some() { " (photo)" } else { "" }
        );
    }
    Ok(())
}
