//! Manual trigger definitions and key name parsing

use serde::{Deserialize, Serialize};

/// Manual inputs that can stand in for the spoken phrase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ManualTrigger {
    /// A named key was pressed
    Key { name: String },
    /// A pointer click, on or off the mirror surface
    Click { on_mirror: bool },
    /// The on-screen debug trigger
    DebugButton,
}

/// Key name for one line of terminal input
///
/// A line made only of spaces is `Space`, an empty line is `Enter`,
/// anything else is its trimmed text.
pub fn key_from_line(line: &str) -> String {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        "Enter".to_string()
    } else if line.chars().all(|c| c == ' ') {
        "Space".to_string()
    } else {
        line.trim().to_string()
    }
}

/// Case-insensitive key name comparison
pub fn key_matches(pressed: &str, designated: &str) -> bool {
    pressed.trim().eq_ignore_ascii_case(designated.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_space_line() {
        assert_eq!(key_from_line("   \n"), "Space");
        assert_eq!(key_from_line(" "), "Space");
    }

    #[test]
    fn test_enter_line() {
        assert_eq!(key_from_line("\n"), "Enter");
        assert_eq!(key_from_line("\r\n"), "Enter");
    }

    #[test]
    fn test_named_key() {
        assert_eq!(key_from_line("  h \n"), "h");
        assert!(key_matches("SPACE", "Space"));
        assert!(!key_matches("Enter", "Space"));
    }

    #[test]
    fn test_trigger_serialization() {
        let json = serde_json::to_string(&ManualTrigger::Click { on_mirror: true }).unwrap();
        assert!(json.contains("\"type\":\"click\""));
        let trigger: ManualTrigger = serde_json::from_str(r#"{"type":"debug_button"}"#).unwrap();
        assert_eq!(trigger, ManualTrigger::DebugButton);
    }
}
