//! Transcript entry types.

use crate::identity::TimestampMs;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Speaker role of a transcript line, used as half of the reconciliation
/// dedup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputRole {
    User,
    Assistant,
}

/// One line of an agent session transcript.
///
/// `uuid` is present only for lines the backend has assigned a stable
/// identity; those can be deduplicated exactly. Lines without a uuid fall
/// back to the `(role, normalized text, time window)` heuristic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputEntry {
    pub text: String,
    pub timestamp: TimestampMs,
    #[serde(default)]
    pub is_streaming: bool,
    #[serde(default)]
    pub is_user_prompt: bool,
    #[serde(default)]
    pub is_delegation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
}

impl OutputEntry {
    /// A plain assistant line with no stable identity.
    pub fn assistant(text: impl Into<String>, timestamp: TimestampMs) -> Self {
        Self {
            text: text.into(),
            timestamp,
            is_streaming: false,
            is_user_prompt: false,
            is_delegation: false,
            uuid: None,
        }
    }

    /// A user prompt line, as synthesized when a command is issued.
    pub fn user(text: impl Into<String>, timestamp: TimestampMs) -> Self {
        Self {
            is_user_prompt: true,
            ..Self::assistant(text, timestamp)
        }
    }

    pub fn role(&self) -> OutputRole {
        if self.is_user_prompt {
            OutputRole::User
        } else {
            OutputRole::Assistant
        }
    }

    /// Text with line endings unified to `\n` and surrounding plus per-line
    /// trailing whitespace trimmed, so the same message rendered by
    /// different layers compares equal.
    pub fn normalized_text(&self) -> String {
        normalize_text(&self.text)
    }

    /// Key under which near-duplicate lines collide during reconciliation.
    pub fn dedup_key(&self) -> (OutputRole, String) {
        (self.role(), self.normalized_text())
    }
}

/// See [`OutputEntry::normalized_text`]. Line endings are unified first so a
/// trailing space hiding before a `\r\n` still trims away.
pub fn normalize_text(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    unified
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(text: &str, is_user_prompt: bool) -> OutputEntry {
        OutputEntry {
            text: text.to_string(),
            timestamp: 0,
            is_streaming: false,
            is_user_prompt,
            is_delegation: false,
            uuid: None,
        }
    }

    #[test]
    fn role_follows_user_prompt_flag() {
        assert_eq!(entry("hi", true).role(), OutputRole::User);
        assert_eq!(entry("hi", false).role(), OutputRole::Assistant);
    }

    #[test]
    fn normalization_trims_and_unifies_line_endings() {
        assert_eq!(normalize_text("  done \r\nnext\rlast  "), "done\nnext\nlast");
    }

    #[test]
    fn trailing_space_before_crlf_shares_a_dedup_key() {
        let history = entry("done \r\nnext", false);
        let live = entry("done\nnext", false);
        assert_eq!(history.dedup_key(), live.dedup_key());
    }

    #[test]
    fn same_text_different_roles_have_different_keys() {
        assert_ne!(entry("ok", true).dedup_key(), entry("ok", false).dedup_key());
    }

    #[test]
    fn missing_flags_default_to_false_on_decode() {
        let entry: OutputEntry =
            serde_json::from_str(r#"{"text":"x","timestamp":5}"#).unwrap();
        assert!(!entry.is_streaming);
        assert!(!entry.is_user_prompt);
        assert!(!entry.is_delegation);
        assert!(entry.uuid.is_none());
    }
}
