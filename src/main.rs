use clap::Parser;
use prompt_relay::api::{FileStore, MemoryCache, PromptRelay, PromptResolver};
use prompt_relay::cli::Cli;
use prompt_relay::commands;
use prompt_relay::core::config::{build_gateway, Settings};
use prompt_relay::core::logging;
use prompt_relay::core::storage::AppCtx;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("• {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let ctx = AppCtx::init(cli.home)?;
    let settings = Settings::load(&ctx.config_path).map_err(|e| e.to_string())?;

    let store = FileStore::open(&ctx.store_path, ctx.cipher.clone())
        .await
        .map_err(|e| e.to_string())?;
    let resolver = PromptResolver::new(
        Arc::new(store),
        Arc::new(MemoryCache::new()),
        settings.cache_ttl(),
    );
    let gateway = build_gateway(&settings.provider).map_err(|e| e.to_string())?;
    let relay = PromptRelay::new(resolver, gateway).with_encoder(settings.encoder());

    commands::dispatch(cli.command, &relay).await
}
