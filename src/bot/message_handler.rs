//! Message Handler module for processing incoming Telegram messages

use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::prelude::*;
use teloxide::types::{InputFile, ParseMode, ReplyParameters};
use teloxide::utils::html;
use teloxide::utils::render::RenderMessageTextHelper;
use tracing::{debug, error, info, warn};

use super::access::authorized_target;
use super::commands::{parse_command, parse_grant_args, Command};
use super::delivery::{plan_auto_reply, AutoReply};
use super::ui_builder::{
    file_choice_keyboard, filter_keyboard, format_filter_list, MAX_MESSAGE_LENGTH,
};
use super::AppState;
use crate::db::FilterRecord;
use crate::errors::StoreError;
use crate::filter_parser::{parse_html_reply, parse_text_reply, split_quotes};
use crate::localization::{t_args_lang, t_lang};
use crate::media::{save_file, IncomingMedia, SaveOutcome};

/// Entry point for messages in private chats and groups
pub async fn message_handler(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    if state.config.is_indexed_chat(msg.chat.id.0) && index_media(&state, &msg).await? {
        return Ok(());
    }

    let Some(text) = msg.text() else {
        return Ok(());
    };

    if let Some(command) = parse_command(text, &state.bot_username) {
        debug!(chat_id = %msg.chat.id, command = ?command, "Received command");
        return handle_command(&bot, &msg, &state, command).await;
    }

    if (msg.chat.is_group() || msg.chat.is_supergroup()) && !text.starts_with('/') {
        auto_filter(&bot, &msg, &state, text).await?;
    }

    Ok(())
}

/// Entry point for channel posts; only media indexing applies
pub async fn channel_post_handler(msg: Message, state: Arc<AppState>) -> Result<()> {
    if state.config.is_indexed_chat(msg.chat.id.0) {
        index_media(&state, &msg).await?;
    }
    Ok(())
}

/// Save the message's media to the catalog; `false` when it carries none
async fn index_media(state: &AppState, msg: &Message) -> Result<bool> {
    let Some(incoming) = IncomingMedia::from_message(msg) else {
        return Ok(false);
    };
    let outcome = save_file(state.media.as_ref(), incoming)
        .await
        .context("Failed to save indexed media")?;
    debug!(chat_id = %msg.chat.id, status = ?outcome.status(), "Indexed media message");
    Ok(true)
}

async fn handle_command(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    command: Command,
) -> Result<()> {
    let lang = msg.from.as_ref().and_then(|u| u.language_code.as_deref());

    match command {
        Command::Start | Command::Help => {
            let help = t_args_lang("help", &[("bot", &state.bot_username)], lang);
            bot.send_message(msg.chat.id, help)
                .parse_mode(ParseMode::Html)
                .await?;
        }
        Command::AddFilter(args) => add_filter(bot, msg, state, &args).await?,
        Command::ViewFilters => view_filters(bot, msg, state).await?,
        Command::DeleteFilter(args) => delete_filter(bot, msg, state, &args).await?,
        Command::Connect => connect(bot, msg, state).await?,
        Command::Disconnect => disconnect(bot, msg, state).await?,
        Command::Balance => {
            let Some(user) = msg.from.as_ref() else {
                return Ok(());
            };
            let tokens = state.ledger.get_tokens(user.id.0 as i64).await?;
            bot.send_message(
                msg.chat.id,
                t_args_lang("balance", &[("tokens", &tokens.to_string())], lang),
            )
            .parse_mode(ParseMode::Html)
            .await?;
        }
        Command::Grant(args) => grant(bot, msg, state, &args).await?,
    }

    Ok(())
}

async fn add_filter(bot: &Bot, msg: &Message, state: &AppState, args: &str) -> Result<()> {
    let lang = msg.from.as_ref().and_then(|u| u.language_code.as_deref());
    let Some(target) = authorized_target(bot, msg, state).await? else {
        return Ok(());
    };

    let extracted = split_quotes(args);
    let Some(keyword) = extracted.first().map(|k| k.to_lowercase()) else {
        bot.send_message(msg.chat.id, t_lang("command-incomplete", lang))
            .await?;
        return Ok(());
    };

    let reply = msg.reply_to_message();
    if reply.is_none() && extracted.len() < 2 {
        bot.send_message(msg.chat.id, t_lang("filter-needs-content", lang))
            .await?;
        return Ok(());
    }

    let mut file_id = None;
    let parsed = match reply {
        Some(replied) => {
            if let Some(incoming) = IncomingMedia::from_message(replied) {
                match save_file(state.media.as_ref(), incoming).await? {
                    SaveOutcome::Saved(id) | SaveOutcome::Duplicate(id) => file_id = Some(id),
                    SaveOutcome::Invalid => {
                        bot.send_message(msg.chat.id, t_lang("filter-attach-failed", lang))
                            .await?;
                        return Ok(());
                    }
                }
            }
            let markup = replied
                .html_text()
                .or_else(|| replied.html_caption())
                .unwrap_or_default();
            parse_html_reply(&markup, &keyword)
        }
        None => parse_text_reply(&extracted[1], &keyword),
    };

    if parsed.text.is_empty() && parsed.buttons.is_empty() && file_id.is_none() {
        bot.send_message(msg.chat.id, t_lang("filter-needs-text-or-buttons", lang))
            .await?;
        return Ok(());
    }

    let record = FilterRecord {
        chat_id: target.chat_id,
        keyword: keyword.clone(),
        reply_text: parsed.text,
        buttons: parsed.buttons,
        alerts: parsed.alerts,
        file_id,
    };
    state.filters.add_filter(&record).await?;
    info!(chat_id = %target.chat_id, keyword = %keyword, "Filter added");

    bot.send_message(
        msg.chat.id,
        t_args_lang(
            "filter-added",
            &[
                ("keyword", &html::escape(&keyword)),
                ("title", &html::escape(&target.title)),
            ],
            lang,
        ),
    )
    .parse_mode(ParseMode::Html)
    .reply_parameters(ReplyParameters::new(msg.id))
    .await?;
    Ok(())
}

async fn view_filters(bot: &Bot, msg: &Message, state: &AppState) -> Result<()> {
    let lang = msg.from.as_ref().and_then(|u| u.language_code.as_deref());
    let Some(target) = authorized_target(bot, msg, state).await? else {
        return Ok(());
    };

    let keywords: Vec<String> = state
        .filters
        .get_filters(target.chat_id)
        .await?
        .into_iter()
        .map(|f| f.keyword)
        .collect();

    if keywords.is_empty() {
        bot.send_message(
            msg.chat.id,
            t_args_lang("filters-none", &[("title", &html::escape(&target.title))], lang),
        )
        .parse_mode(ParseMode::Html)
        .await?;
        return Ok(());
    }

    let list = format_filter_list(&target.title, &keywords, lang);
    if list.chars().count() > MAX_MESSAGE_LENGTH {
        bot.send_document(
            msg.chat.id,
            InputFile::memory(list.into_bytes()).file_name("filters.txt"),
        )
        .reply_parameters(ReplyParameters::new(msg.id))
        .await?;
    } else {
        bot.send_message(msg.chat.id, list)
            .parse_mode(ParseMode::Html)
            .reply_parameters(ReplyParameters::new(msg.id))
            .await?;
    }
    Ok(())
}

async fn delete_filter(bot: &Bot, msg: &Message, state: &AppState, args: &str) -> Result<()> {
    let lang = msg.from.as_ref().and_then(|u| u.language_code.as_deref());
    let Some(target) = authorized_target(bot, msg, state).await? else {
        return Ok(());
    };

    let keyword = args.trim().to_lowercase();
    if keyword.is_empty() {
        bot.send_message(msg.chat.id, t_lang("del-usage", lang))
            .parse_mode(ParseMode::Html)
            .reply_parameters(ReplyParameters::new(msg.id))
            .await?;
        return Ok(());
    }

    let key = if state.filters.delete_filter(target.chat_id, &keyword).await? {
        info!(chat_id = %target.chat_id, keyword = %keyword, "Filter deleted");
        "filter-deleted"
    } else {
        "filter-not-found"
    };
    bot.send_message(
        msg.chat.id,
        t_args_lang(key, &[("keyword", &html::escape(&keyword))], lang),
    )
    .parse_mode(ParseMode::Html)
    .reply_parameters(ReplyParameters::new(msg.id))
    .await?;
    Ok(())
}

async fn connect(bot: &Bot, msg: &Message, state: &AppState) -> Result<()> {
    let lang = msg.from.as_ref().and_then(|u| u.language_code.as_deref());
    if msg.chat.is_private() {
        bot.send_message(msg.chat.id, t_lang("connect-use-in-group", lang))
            .await?;
        return Ok(());
    }

    let Some(target) = authorized_target(bot, msg, state).await? else {
        return Ok(());
    };
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };

    state
        .connections
        .add_connection(user.id.0 as i64, target.chat_id, &target.title)
        .await?;
    info!(user_id = %user.id, chat_id = %target.chat_id, "User connected to group");

    bot.send_message(
        msg.chat.id,
        t_args_lang("connected", &[("title", &html::escape(&target.title))], lang),
    )
    .parse_mode(ParseMode::Html)
    .await?;
    Ok(())
}

async fn disconnect(bot: &Bot, msg: &Message, state: &AppState) -> Result<()> {
    let lang = msg.from.as_ref().and_then(|u| u.language_code.as_deref());
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    if !msg.chat.is_private() {
        return Ok(());
    }

    let user_id = user.id.0 as i64;
    let Some(connection) = state.connections.active_connection(user_id).await? else {
        bot.send_message(msg.chat.id, t_lang("not-connected", lang))
            .await?;
        return Ok(());
    };

    state.connections.remove_connection(user_id).await?;
    info!(user_id = %user.id, chat_id = %connection.group_id, "User disconnected from group");
    bot.send_message(
        msg.chat.id,
        t_args_lang(
            "disconnected",
            &[("title", &html::escape(&connection.group_title))],
            lang,
        ),
    )
    .parse_mode(ParseMode::Html)
    .await?;
    Ok(())
}

async fn grant(bot: &Bot, msg: &Message, state: &AppState, args: &str) -> Result<()> {
    let lang = msg.from.as_ref().and_then(|u| u.language_code.as_deref());
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    if !state
        .config
        .is_admin(user.id.0 as i64, user.username.as_deref())
    {
        debug!(user_id = %user.id, "Ignoring /grant from non-admin");
        return Ok(());
    }

    let Some((target_user, amount)) = parse_grant_args(args) else {
        bot.send_message(msg.chat.id, t_lang("grant-usage", lang))
            .parse_mode(ParseMode::Html)
            .await?;
        return Ok(());
    };

    let balance = match state.ledger.add_tokens(target_user, amount).await {
        Ok(balance) => balance,
        Err(StoreError::BalanceOverflow { .. }) => {
            warn!(
                admin_id = %user.id,
                user_id = %target_user,
                amount,
                "Grant would overflow the balance"
            );
            bot.send_message(msg.chat.id, t_lang("grant-overflow", lang))
                .await?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    info!(admin_id = %user.id, user_id = %target_user, amount, balance, "Tokens granted");
    bot.send_message(
        msg.chat.id,
        t_args_lang(
            "grant-done",
            &[
                ("amount", &amount.to_string()),
                ("user", &target_user.to_string()),
                ("tokens", &balance.to_string()),
            ],
            lang,
        ),
    )
    .parse_mode(ParseMode::Html)
    .await?;
    Ok(())
}

async fn auto_filter(bot: &Bot, msg: &Message, state: &AppState, text: &str) -> Result<()> {
    let lang = msg.from.as_ref().and_then(|u| u.language_code.as_deref());
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };

    let plan = plan_auto_reply(
        state.ledger.as_ref(),
        state.filters.as_ref(),
        state.media.as_ref(),
        user.id.0 as i64,
        msg.chat.id.0,
        text,
    )
    .await?;

    let (files, replies) = match plan {
        AutoReply::NoTokens => {
            bot.send_message(msg.chat.id, t_lang("tokens-empty-reply", lang))
                .reply_parameters(ReplyParameters::new(msg.id))
                .await?;
            return Ok(());
        }
        AutoReply::Matches { files, replies } => (files, replies),
    };

    if !files.is_empty() {
        debug!(chat_id = %msg.chat.id, matches = files.len(), "Offering files");
        bot.send_message(msg.chat.id, t_lang("select-file", lang))
            .reply_markup(file_choice_keyboard(&files))
            .reply_parameters(ReplyParameters::new(msg.id))
            .await?;
    }

    for filter in replies {
        let text = if filter.reply_text.is_empty() {
            html::escape(&filter.keyword)
        } else {
            filter.reply_text.clone()
        };
        let mut request = bot
            .send_message(msg.chat.id, text)
            .parse_mode(ParseMode::Html)
            .reply_parameters(ReplyParameters::new(msg.id));
        if let Some(keyboard) = filter_keyboard(&filter.buttons) {
            request = request.reply_markup(keyboard);
        }
        if let Err(e) = request.await {
            error!(
                chat_id = %msg.chat.id,
                keyword = %filter.keyword,
                error = %e,
                "Failed to send filter reply"
            );
        }
    }

    Ok(())
}
