//! Classifier Reply Parser
//!
//! Turns the model's `key: value` line format into a lookup table.

use std::collections::HashMap;

/// Key/value pairs extracted from one classifier reply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedReply {
    fields: HashMap<String, String>,
}

impl ParsedReply {
    /// Parse a reply. Lines without a colon are ignored, the first colon
    /// splits key from value, and a repeated key keeps its last value.
    pub fn parse(text: &str) -> Self {
        let mut fields = HashMap::new();

        for line in text.trim().lines() {
            if let Some((key, value)) = line.split_once(':') {
                fields.insert(key.trim().to_string(), value.trim().to_string());
            }
        }

        Self { fields }
    }

    /// Raw value for a key (case-sensitive)
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Value for a key, treating an empty value as absent
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    /// Value for a key or the caller's fallback
    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    /// The `ACTION` key, uppercased
    pub fn action(&self) -> Option<String> {
        self.non_empty("ACTION").map(str::to_uppercase)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_colon_lines_yield_empty() {
        let parsed = ParsedReply::parse("SEND\nno separators here\n\n");
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_last_duplicate_wins() {
        let parsed = ParsedReply::parse("to: a@example.com\nto: b@example.com");
        assert_eq!(parsed.get("to"), Some("b@example.com"));
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn test_first_colon_splits() {
        let parsed = ParsedReply::parse("start: 2024-12-08T10:00:00");
        assert_eq!(parsed.get("start"), Some("2024-12-08T10:00:00"));
    }

    #[test]
    fn test_keys_and_values_trimmed() {
        let parsed = ParsedReply::parse("   ACTION :  send  \n  subject:Hi ");
        assert_eq!(parsed.get("ACTION"), Some("send"));
        assert_eq!(parsed.get("subject"), Some("Hi"));
        assert_eq!(parsed.action().as_deref(), Some("SEND"));
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        let parsed = ParsedReply::parse("action: list");
        assert_eq!(parsed.get("ACTION"), None);
        assert_eq!(parsed.action(), None);
    }

    #[test]
    fn test_empty_value_is_not_non_empty() {
        let parsed = ParsedReply::parse("message_id:");
        assert_eq!(parsed.get("message_id"), Some(""));
        assert_eq!(parsed.non_empty("message_id"), None);
        assert_eq!(parsed.get_or("subject", "No Subject"), "No Subject");
    }
}
