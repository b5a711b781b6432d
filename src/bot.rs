use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{MessageEntity, MessageEntityKind, ParseMode};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::extractor::InboundMessage;
use crate::relay::{self, DeliveryMeta};

/// Shared application state
pub struct AppState {
    pub config: Config,
    /// Codes forwarded since startup. Process-lifetime only, reset on
    /// restart; bumped after a successful delivery, never by the pipeline.
    forwarded_codes: AtomicU64,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            forwarded_codes: AtomicU64::new(0),
        }
    }

    pub fn record_forwarded(&self, count: usize) {
        self.forwarded_codes.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn forwarded_total(&self) -> u64 {
        self.forwarded_codes.load(Ordering::Relaxed)
    }
}

/// Start the Telegram bot
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let bot = Bot::new(&state.config.telegram.bot_token);

    info!("Starting Telegram bot...");

    let source_ids = state.config.telegram.source_channel_ids.clone();
    let admin_ids = state.config.telegram.admin_user_ids.clone();

    let handler = dptree::entry()
        .branch(
            Update::filter_channel_post()
                .filter_map(move |msg: Message| {
                    source_ids.contains(&msg.chat.id.0).then_some(msg)
                })
                .endpoint(handle_channel_post),
        )
        .branch(
            Update::filter_message()
                .filter_map(move |msg: Message| {
                    let user = msg.from.as_ref()?;
                    if admin_ids.contains(&user.id.0) {
                        Some(msg)
                    } else {
                        None
                    }
                })
                .endpoint(handle_command),
        );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("relay"))
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_channel_post(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let target = state.config.telegram.target_channel_id;
    let inbound = inbound_from_message(&msg, target);
    let meta = delivery_meta(&msg);

    let outcome = match relay::process(&inbound, &state.config.relay, &meta) {
        Some(outcome) => outcome,
        None => return Ok(()),
    };

    info!(
        "Forwarding {} code(s) from chat {} to {}",
        outcome.codes.len(),
        msg.chat.id,
        target
    );

    // A failed delivery is logged and dropped; one bad message must never
    // take the dispatcher down.
    match bot
        .send_message(ChatId(target), &outcome.text)
        .parse_mode(ParseMode::MarkdownV2)
        .await
    {
        Ok(_) => state.record_forwarded(outcome.codes.len()),
        Err(e) => error!("Failed to deliver codes to {}: {}", target, e),
    }

    Ok(())
}

/// Detach the pipeline's view of a message from the platform types.
fn inbound_from_message(msg: &Message, target_chat_id: i64) -> InboundMessage {
    let text = msg.text().or_else(|| msg.caption()).map(str::to_string);
    let has_media = msg.photo().is_some()
        || msg.video().is_some()
        || msg.document().is_some()
        || msg.audio().is_some()
        || msg.animation().is_some()
        || msg.sticker().is_some()
        || msg.voice().is_some()
        || msg.video_note().is_some();
    let has_link_entity =
        contains_link(msg.entities()) || contains_link(msg.caption_entities());

    InboundMessage {
        text,
        has_media,
        has_link_entity,
        origin_chat_id: msg.chat.id.0,
        target_chat_id,
    }
}

fn contains_link(entities: Option<&[MessageEntity]>) -> bool {
    entities.map_or(false, |entities| {
        entities.iter().any(|e| {
            matches!(
                e.kind,
                MessageEntityKind::Url | MessageEntityKind::TextLink { .. }
            )
        })
    })
}

fn delivery_meta(msg: &Message) -> DeliveryMeta {
    DeliveryMeta {
        source_title: msg.chat.title().map(str::to_string),
        source_link: msg.url().map(|u| u.to_string()),
        timestamp: Some(msg.date),
    }
}

async fn handle_command(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let text = match msg.text() {
        Some(t) => t,
        None => return Ok(()),
    };

    let command = text
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_lowercase();

    match command.as_str() {
        "/start" => {
            bot.send_message(
                msg.chat.id,
                format!(
                    "Code relay bot is running!\n\
                     Watching {} source channel(s), relaying to {}.",
                    state.config.telegram.source_channel_ids.len(),
                    state.config.telegram.target_channel_id
                ),
            )
            .await?;
        }
        "/help" => {
            bot.send_message(
                msg.chat.id,
                "Available commands:\n\
                 /start - Check bot status\n\
                 /stats - Codes forwarded since startup\n\
                 /help - Show this help message",
            )
            .await?;
        }
        "/stats" => {
            bot.send_message(
                msg.chat.id,
                format!("Forwarded {} code(s) since startup.", state.forwarded_total()),
            )
            .await?;
        }
        _ => {}
    }

    Ok(())
}
