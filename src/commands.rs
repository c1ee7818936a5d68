//! Operator commands
//!
//! Owner-authored messages of the form `<prefix>autoai <subcommand> [args]`.
//! They edit the roster, switch the generation mode and toggle the engine.
//! The engine answers each one with a short confirmation in the same chat.

use crate::generator::ModelMode;
use crate::roster::{AutomationTarget, Roster};
use crate::store::{keys, ConversationStore, StoreResult};
use std::sync::Arc;
use tracing::info;

const COMMAND_NAME: &str = "autoai";

/// Command parse errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("missing subcommand")]
    MissingSubcommand,

    #[error("`{0}` needs a target name")]
    MissingTarget(&'static str),

    #[error("unknown subcommand: {0}")]
    Unknown(String),
}

impl CommandError {
    /// Text sent back to the operator
    pub fn usage(&self) -> String {
        format!(
            "⚠️ {}\nUsage: autoai set <name> | off <name|all> | list | 1 | 2 | on | disable",
            self
        )
    }
}

/// Parsed `autoai` command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoAiCommand {
    Set(AutomationTarget),
    Off(AutomationTarget),
    OffAll,
    List,
    SelectModel(ModelMode),
    Enable,
    Disable,
}

/// `None` if `text` is not an autoai command at all
pub fn parse(text: &str, prefix: &str) -> Option<Result<AutoAiCommand, CommandError>> {
    let body = text.trim().strip_prefix(prefix)?;
    let mut words = body.split_whitespace();
    if !words.next()?.eq_ignore_ascii_case(COMMAND_NAME) {
        return None;
    }

    let Some(sub) = words.next() else {
        return Some(Err(CommandError::MissingSubcommand));
    };
    let rest = words.collect::<Vec<_>>().join(" ");

    let command = match sub.to_lowercase().as_str() {
        "set" => AutomationTarget::new(&rest)
            .map(AutoAiCommand::Set)
            .ok_or(CommandError::MissingTarget("set")),
        "off" if rest.eq_ignore_ascii_case("all") => Ok(AutoAiCommand::OffAll),
        "off" => AutomationTarget::new(&rest)
            .map(AutoAiCommand::Off)
            .ok_or(CommandError::MissingTarget("off")),
        "list" => Ok(AutoAiCommand::List),
        "1" => Ok(AutoAiCommand::SelectModel(ModelMode::CredentialChain)),
        "2" => Ok(AutoAiCommand::SelectModel(ModelMode::CustomFirst)),
        "on" | "enable" => Ok(AutoAiCommand::Enable),
        "disable" | "pause" => Ok(AutoAiCommand::Disable),
        other => Err(CommandError::Unknown(other.to_string())),
    };
    Some(command)
}

/// Applies parsed commands to the store
#[derive(Clone)]
pub struct CommandHandler {
    store: Arc<dyn ConversationStore>,
    roster: Roster,
}

impl CommandHandler {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self {
            roster: Roster::new(store.clone()),
            store,
        }
    }

    /// Apply `command` for `account` and return the confirmation text
    pub async fn execute(&self, account: &str, command: &AutoAiCommand) -> StoreResult<String> {
        info!("autoai command for {}: {:?}", account, command);
        let reply = match command {
            AutoAiCommand::Set(target) => {
                self.roster.add(account, target).await?;
                format!("✅ AI active for: {}", target)
            }
            AutoAiCommand::Off(target) => {
                if self.roster.remove(account, target).await? {
                    format!("🛑 Stopped for: {}", target)
                } else {
                    format!("Not a target: {}", target)
                }
            }
            AutoAiCommand::OffAll => {
                self.roster.clear(account).await?;
                "🛑 Stopped for everyone.".to_string()
            }
            AutoAiCommand::List => {
                let targets = self.roster.list(account).await?;
                if targets.is_empty() {
                    "No targets.".to_string()
                } else {
                    let names: Vec<String> = targets.iter().map(|t| t.to_string()).collect();
                    format!("Targets: {}", names.join(", "))
                }
            }
            AutoAiCommand::SelectModel(mode) => {
                self.store
                    .set(&keys::selected_model(account), mode.as_store_value(), None)
                    .await?;
                match mode {
                    ModelMode::CredentialChain => "🤖 Switched to Gemini (model 1)".to_string(),
                    ModelMode::CustomFirst => "🤖 Switched to custom API (model 2)".to_string(),
                }
            }
            AutoAiCommand::Enable => {
                self.store.delete(&keys::engine_enabled(account)).await?;
                "▶️ Auto-reply enabled.".to_string()
            }
            AutoAiCommand::Disable => {
                self.store
                    .set(&keys::engine_enabled(account), "0", None)
                    .await?;
                "⏸️ Auto-reply disabled.".to_string()
            }
        };
        Ok(reply)
    }

    /// Engine switch; absent or unreadable means enabled
    pub async fn is_enabled(&self, account: &str) -> bool {
        !matches!(
            self.store.get(&keys::engine_enabled(account)).await,
            Ok(Some(v)) if v.trim() == "0"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn target(name: &str) -> AutomationTarget {
        AutomationTarget::new(name).unwrap()
    }

    #[test]
    fn test_parse() {
        assert_eq!(parse("hello", "."), None);
        assert_eq!(parse(".menu", "."), None);
        assert_eq!(
            parse(".autoai set Ali Khan", "."),
            Some(Ok(AutoAiCommand::Set(target("Ali Khan"))))
        );
        assert_eq!(parse(".AutoAI OFF all", "."), Some(Ok(AutoAiCommand::OffAll)));
        assert_eq!(parse(".autoai off Ali", "."), Some(Ok(AutoAiCommand::Off(target("Ali")))));
        assert_eq!(parse("  .autoai list ", "."), Some(Ok(AutoAiCommand::List)));
        assert_eq!(
            parse(".autoai 2", "."),
            Some(Ok(AutoAiCommand::SelectModel(ModelMode::CustomFirst)))
        );
        assert_eq!(parse("!autoai on", "!"), Some(Ok(AutoAiCommand::Enable)));
        assert_eq!(parse(".autoai disable", "."), Some(Ok(AutoAiCommand::Disable)));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse(".autoai", "."), Some(Err(CommandError::MissingSubcommand)));
        assert_eq!(
            parse(".autoai set  ", "."),
            Some(Err(CommandError::MissingTarget("set")))
        );
        assert_eq!(
            parse(".autoai dance", "."),
            Some(Err(CommandError::Unknown("dance".to_string())))
        );
        assert!(CommandError::MissingSubcommand.usage().contains("Usage"));
    }

    #[tokio::test]
    async fn test_execute() {
        let store: Arc<dyn ConversationStore> = Arc::new(MemoryStore::new());
        let handler = CommandHandler::new(store.clone());

        let reply = handler
            .execute("acct", &AutoAiCommand::Set(target("Ali")))
            .await
            .unwrap();
        assert!(reply.contains("Ali"));
        handler
            .execute("acct", &AutoAiCommand::Set(target("Sara")))
            .await
            .unwrap();
        assert_eq!(
            handler.execute("acct", &AutoAiCommand::List).await.unwrap(),
            "Targets: Ali, Sara"
        );

        handler.execute("acct", &AutoAiCommand::OffAll).await.unwrap();
        assert_eq!(
            handler.execute("acct", &AutoAiCommand::List).await.unwrap(),
            "No targets."
        );

        handler
            .execute("acct", &AutoAiCommand::SelectModel(ModelMode::CustomFirst))
            .await
            .unwrap();
        assert_eq!(
            store.get(&keys::selected_model("acct")).await.unwrap().as_deref(),
            Some("2")
        );

        assert!(handler.is_enabled("acct").await);
        handler.execute("acct", &AutoAiCommand::Disable).await.unwrap();
        assert!(!handler.is_enabled("acct").await);
        handler.execute("acct", &AutoAiCommand::Enable).await.unwrap();
        assert!(handler.is_enabled("acct").await);
    }
}
