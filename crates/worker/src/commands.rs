//! Message commands from the page.
//!
//! The page posts `{ "type": "..." }` objects. Unknown types are ignored.

use serde::{Deserialize, Serialize};

/// A command the page can send to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    /// Activate now instead of waiting for every tab to close.
    SkipWaiting,
    /// Delete every cache generation, current one included.
    ClearCache,
    /// Refetch and store the page manifest.
    CachePages,
}

impl Command {
    /// Parse a posted message. Returns `None` for anything unrecognised.
    pub fn parse(message: &serde_json::Value) -> Option<Self> {
        match serde_json::from_value(message.clone()) {
            Ok(command) => Some(command),
            Err(e) => {
                tracing::debug!(error = %e, "ignoring unrecognised message");
                None
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::SkipWaiting => "SKIP_WAITING",
            Command::ClearCache => "CLEAR_CACHE",
            Command::CachePages => "CACHE_PAGES",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_known_commands() {
        assert_eq!(Command::parse(&json!({ "type": "SKIP_WAITING" })), Some(Command::SkipWaiting));
        assert_eq!(Command::parse(&json!({ "type": "CLEAR_CACHE" })), Some(Command::ClearCache));
        assert_eq!(Command::parse(&json!({ "type": "CACHE_PAGES" })), Some(Command::CachePages));
    }

    #[test]
    fn test_parse_ignores_extra_fields() {
        assert_eq!(Command::parse(&json!({ "type": "CLEAR_CACHE", "reason": "debug" })), Some(Command::ClearCache));
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(Command::parse(&json!({ "type": "PING" })), None);
        assert_eq!(Command::parse(&json!("SKIP_WAITING")), None);
        assert_eq!(Command::parse(&json!({})), None);
    }

    #[test]
    fn test_wire_name_matches_serde() {
        for command in [Command::SkipWaiting, Command::ClearCache, Command::CachePages] {
            let value = serde_json::to_value(command).unwrap();
            assert_eq!(value["type"], command.as_str());
        }
    }
}
