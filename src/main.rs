use std::sync::Arc;

use anyhow::{Context, Result};
use autofilter::bot::{self, AppState};
use autofilter::config::{BotConfig, LogFormat};
use autofilter::db::{MemoryStore, PgStore};
use autofilter::localization::init_localization;
use teloxide::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = BotConfig::from_env().context("Invalid configuration")?;
    init_logging(config.log_format);

    info!("Starting auto-filter bot");

    init_localization().context("Failed to load localization resources")?;

    let bot = Bot::new(config.bot_token.clone());
    let me = bot.get_me().await.context("Failed to fetch bot identity")?;
    let bot_username = me.username().to_string();
    info!(bot_username = %bot_username, "Bot identity resolved");

    let state = match config.database_url.clone() {
        Some(database_url) => {
            info!(media_table = %config.collection_name, "Connecting to PostgreSQL");
            let store = PgStore::connect(
                &database_url,
                &config.collection_name,
                config.default_tokens,
            )
            .await
            .context("Failed to initialize database")?;
            AppState::with_store(config, Arc::new(store), bot_username)
        }
        None => {
            warn!("DATABASE_URL is not set, using in-memory storage");
            let store = MemoryStore::new(config.default_tokens);
            AppState::with_store(config, Arc::new(store), bot_username)
        }
    };

    info!(
        indexed_chats = state.config.channels.len(),
        use_caption_filter = state.config.use_caption_filter,
        "Bot initialized, starting dispatcher"
    );

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(bot::message_handler))
        .branch(Update::filter_channel_post().endpoint(bot::channel_post_handler))
        .branch(Update::filter_callback_query().endpoint(bot::callback_handler))
        .branch(Update::filter_inline_query().endpoint(bot::inline_handler));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![Arc::new(state)])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
