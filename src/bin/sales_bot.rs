use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use primitives_sales_bot::config::{AppConfig, CONFIG_PATH};
use primitives_sales_bot::discovery::ReservoirClient;
use primitives_sales_bot::engine::{next_poll_delay, select_unannounced};
use primitives_sales_bot::format::format_sale_message;
use primitives_sales_bot::media::ImageResolver;
use primitives_sales_bot::price::EthPriceOracle;
use primitives_sales_bot::publisher::TwitterClient;
use primitives_sales_bot::state::ProcessedSales;
use primitives_sales_bot::types::SaleRecord;
use primitives_sales_bot::{
    OPENSEA_API_BASE, RESERVOIR_API_BASE, TWITTER_API_BASE, TWITTER_UPLOAD_BASE,
};

#[derive(Parser)]
#[command(
    name = "sales-bot",
    about = "Announces NFT sales of the Primitives collection on Twitter/X"
)]
struct Args {
    /// Optional mode: "test" posts the most recent sale it can find
    /// (widening the lookback window), then exits
    #[arg(value_name = "MODE")]
    mode: Option<String>,
}

/// Everything one check needs, wired once at startup.
struct Bot {
    config: AppConfig,
    reservoir: ReservoirClient,
    oracle: EthPriceOracle,
    images: ImageResolver,
    twitter: TwitterClient,
    processed_path: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    dotenvy::dotenv().ok();
    let args = Args::parse();
    if let Some(mode) = args.mode.as_deref() {
        if mode != "test" {
            anyhow::bail!("Unknown mode {mode:?} — expected \"test\"");
        }
    }

    let config_path = Path::new(CONFIG_PATH);
    let mut config = AppConfig::load(config_path)?;
    config.apply_env_overrides();
    info!("Loaded config from {}", config_path.display());

    let data_dir = PathBuf::from(&config.settings.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;
    let processed_path = data_dir.join("processed_sales.json");
    ProcessedSales::ensure_exists(&processed_path)?;

    let reservoir = ReservoirClient::new(
        RESERVOIR_API_BASE,
        &config.reservoir.api_key,
        &config.reservoir.chain,
        &config.reservoir.contract_address,
    )?;
    let oracle = EthPriceOracle::new()?;
    let images = ImageResolver::new(OPENSEA_API_BASE, &data_dir)?;
    let twitter = TwitterClient::new(TWITTER_API_BASE, TWITTER_UPLOAD_BASE, config.twitter.clone())?;

    let bot = Bot {
        config,
        reservoir,
        oracle,
        images,
        twitter,
        processed_path,
    };

    if args.mode.as_deref() == Some("test") {
        return test_post_last_sale(&bot).await;
    }
    run_loop(&bot).await
}

/// Continuous polling: check, then sleep — a short cooldown after a cycle
/// that posted something, the longer idle interval otherwise. Ctrl+C exits
/// between cycles.
async fn run_loop(bot: &Bot) -> Result<()> {
    let settings = &bot.config.settings;
    info!(
        "Starting sales bot — target {}, idle interval {}s, post cooldown {}s",
        bot.reservoir.contract(),
        settings.idle_secs,
        settings.cooldown_secs,
    );

    loop {
        info!(
            "Checking for new sales at {}",
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S")
        );
        let published = match poll_cycle(bot).await {
            Ok(count) => count,
            Err(e) => {
                warn!("Poll cycle error: {e:#}");
                0
            }
        };

        let delay = next_poll_delay(published, settings);
        if published > 0 {
            info!(
                "Posted {published} sale(s) — cooling down for {}s",
                delay.as_secs()
            );
        } else {
            info!("Next check in {}s", delay.as_secs());
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }

    Ok(())
}

/// One check: reload the announced-id list, discover sales, announce the
/// ones not yet posted. Returns how many posts went out.
async fn poll_cycle(bot: &Bot) -> Result<usize> {
    let settings = &bot.config.settings;
    let mut processed = ProcessedSales::load(&bot.processed_path)?;
    info!("Loaded {} announced sale id(s)", processed.len());

    let sales = bot
        .reservoir
        .recent_sales(settings.lookback_days, settings.include_bids)
        .await;
    if sales.is_empty() {
        info!("No sales found in this check");
        return Ok(0);
    }

    let candidates = select_unannounced(&sales, &processed, bot.reservoir.contract());
    if candidates.is_empty() {
        info!("All {} discovered sale(s) already announced", sales.len());
        return Ok(0);
    }

    let mut published = 0;
    for sale in candidates {
        let label = if sale.order_hash.is_empty() {
            &sale.id
        } else {
            &sale.order_hash
        };
        info!("Processing new sale: {label}");
        match announce(bot, sale, &mut processed).await {
            Ok(()) => published += 1,
            Err(e) => {
                // not marked processed — discovery surfaces it again next cycle
                warn!("Failed to announce sale {label}: {e:#}");
            }
        }
    }

    info!("Posted {published} new sale(s) in this check");
    Ok(published)
}

/// Format, fetch image (best-effort), publish, and persist the id — in
/// that order, so an id is only recorded after a successful post.
async fn announce(bot: &Bot, sale: &SaleRecord, processed: &mut ProcessedSales) -> Result<()> {
    // rate is fetched fresh for every message, no caching
    let rate = bot.oracle.eth_usd().await;
    let message = format_sale_message(
        sale,
        Some(rate),
        bot.reservoir.contract(),
        bot.reservoir.chain(),
    )
    .context("record unusable for formatting")?;

    let image = match sale.token_id.as_deref() {
        Some(token_id) => bot.images.resolve(&bot.reservoir, token_id).await,
        None => None,
    };

    let tweet_id = bot.twitter.post(&message, image.as_deref()).await?;
    processed.mark(&sale.order_hash)?;
    info!("Announced sale as tweet {tweet_id}");
    Ok(())
}

/// One-shot test: widen the lookback until something turns up, then post
/// the first sale that formats and publishes cleanly.
async fn test_post_last_sale(bot: &Bot) -> Result<()> {
    const LOOKBACKS: [u32; 3] = [365, 730, 1095];

    info!("Testing: fetching last sale and posting to Twitter...");
    for (attempt, days) in LOOKBACKS.iter().enumerate() {
        info!(
            "Attempt {} of {} (looking back {days} days)",
            attempt + 1,
            LOOKBACKS.len()
        );
        let sales = bot
            .reservoir
            .recent_sales(*days, bot.config.settings.include_bids)
            .await;
        if sales.is_empty() {
            info!("No sales found in this attempt");
            if attempt + 1 < LOOKBACKS.len() {
                tokio::time::sleep(Duration::from_secs(10)).await;
            }
            continue;
        }

        info!("Found {} sale(s) to test with", sales.len());
        for (index, sale) in sales.iter().enumerate() {
            info!("Trying sale {} of {}", index + 1, sales.len());
            if !sale.matches_contract(bot.reservoir.contract()) {
                info!("Skipping sale {} for foreign contract", sale.id);
                continue;
            }
            let rate = bot.oracle.eth_usd().await;
            let Some(message) = format_sale_message(
                sale,
                Some(rate),
                bot.reservoir.contract(),
                bot.reservoir.chain(),
            ) else {
                warn!("Could not format sale {}, trying next", sale.id);
                continue;
            };
            let image = match sale.token_id.as_deref() {
                Some(token_id) => bot.images.resolve(&bot.reservoir, token_id).await,
                None => None,
            };
            match bot.twitter.post(&message, image.as_deref()).await {
                Ok(id) => {
                    match &image {
                        Some(path) => info!("Test successful: posted {id} with image {}", path.display()),
                        None => info!("Test successful: posted {id} without image"),
                    }
                    return Ok(());
                }
                Err(e) => warn!("Failed to post, trying next sale: {e:#}"),
            }
        }
        anyhow::bail!("tried all available sales but none could be posted");
    }

    anyhow::bail!("no sales found after {} attempts", LOOKBACKS.len())
}
