//! Store key layout
//!
//! Per-chat keys embed both halves of the [`ConversationKey`] so two accounts
//! running against one Redis never share state.

use crate::message::ConversationKey;

/// Bounded history list
pub fn history(key: &ConversationKey) -> String {
    format!("chat:history:{}:{}", key.account(), key.chat())
}

/// Unix time the real owner last wrote in this chat
pub fn owner_activity(key: &ConversationKey) -> String {
    format!("autoai:last_owner_msg:{}:{}", key.account(), key.chat())
}

/// Unix time the automation last announced presence or sent a reply
pub fn automation_activity(key: &ConversationKey) -> String {
    format!("autoai:last_activity:{}:{}", key.account(), key.chat())
}

/// Set of target patterns for an account
pub fn targets(account: &str) -> String {
    format!("autoai:targets_set:{}", account)
}

/// Selected generation mode ("1" or "2")
pub fn selected_model(account: &str) -> String {
    format!("autoai:selected_model:{}", account)
}

/// Engine switch; absent means enabled
pub fn engine_enabled(account: &str) -> String {
    format!("autoai:enabled:{}", account)
}
