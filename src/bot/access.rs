//! Resolution of the group a filter command acts on, and admin checks

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::{debug, warn};

use super::AppState;
use crate::db::GroupConnection;
use crate::localization::t_lang;

/// Where a command was sent from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatScope {
    Private,
    Group { chat_id: i64, title: String },
    Other,
}

impl ChatScope {
    pub fn of(msg: &Message) -> Self {
        if msg.chat.is_private() {
            ChatScope::Private
        } else if msg.chat.is_group() || msg.chat.is_supergroup() {
            ChatScope::Group {
                chat_id: msg.chat.id.0,
                title: msg.chat.title().unwrap_or_default().to_string(),
            }
        } else {
            ChatScope::Other
        }
    }
}

/// The group a command operates on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetChat {
    pub chat_id: i64,
    pub title: String,
    /// Reached through a private-chat connection
    pub via_connection: bool,
}

/// Outcome of target resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Target(TargetChat),
    /// Message without a sender (anonymous group admin)
    Anonymous,
    /// Private chat without an active connection
    NotConnected,
    /// Channels and other chat kinds
    Ignore,
}

pub fn resolve_target(
    has_sender: bool,
    scope: ChatScope,
    connection: Option<GroupConnection>,
) -> Resolution {
    if !has_sender {
        return Resolution::Anonymous;
    }
    match scope {
        ChatScope::Private => match connection {
            Some(conn) => Resolution::Target(TargetChat {
                chat_id: conn.group_id,
                title: conn.group_title,
                via_connection: true,
            }),
            None => Resolution::NotConnected,
        },
        ChatScope::Group { chat_id, title } => Resolution::Target(TargetChat {
            chat_id,
            title,
            via_connection: false,
        }),
        ChatScope::Other => Resolution::Ignore,
    }
}

/// Whether the user may manage the chat's filters
///
/// Bot admins always may; everyone else must be an administrator or the owner.
pub async fn can_manage(
    bot: &Bot,
    state: &AppState,
    chat_id: i64,
    user: &teloxide::types::User,
) -> Result<bool> {
    if state.config.is_admin(user.id.0 as i64, user.username.as_deref()) {
        return Ok(true);
    }
    let member = bot.get_chat_member(ChatId(chat_id), user.id).await?;
    Ok(member.is_privileged())
}

/// Resolve and authorize the target of a filter command
///
/// Sends the relevant notice and returns `None` when the command must stop.
pub async fn authorized_target(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
) -> Result<Option<TargetChat>> {
    let lang = msg.from.as_ref().and_then(|u| u.language_code.as_deref());
    let scope = ChatScope::of(msg);

    let connection = match (&msg.from, &scope) {
        (Some(user), ChatScope::Private) => {
            state.connections.active_connection(user.id.0 as i64).await?
        }
        _ => None,
    };

    let target = match resolve_target(msg.from.is_some(), scope, connection) {
        Resolution::Target(target) => target,
        Resolution::Anonymous => {
            bot.send_message(msg.chat.id, t_lang("anonymous-admin", lang))
                .await?;
            return Ok(None);
        }
        Resolution::NotConnected => {
            bot.send_message(msg.chat.id, t_lang("not-connected", lang))
                .await?;
            return Ok(None);
        }
        Resolution::Ignore => return Ok(None),
    };

    let Some(user) = msg.from.as_ref() else {
        return Ok(None);
    };

    match can_manage(bot, state, target.chat_id, user).await {
        Ok(true) => Ok(Some(target)),
        Ok(false) => {
            debug!(user_id = %user.id, chat_id = %target.chat_id, "Ignoring filter command from non-admin");
            Ok(None)
        }
        Err(e) => {
            warn!(user_id = %user.id, chat_id = %target.chat_id, error = %e, "Failed to look up chat member");
            bot.send_message(msg.chat.id, t_lang("bot-not-in-group", lang))
                .parse_mode(ParseMode::Html)
                .await?;
            Ok(None)
        }
    }
}
