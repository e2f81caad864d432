use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Messages attached to one form field. The service sends a list for form
/// validation and a bare string for permission checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldMessages {
    One(String),
    Many(Vec<String>),
}

impl FieldMessages {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let items: Vec<&str> = match self {
            Self::One(message) => vec![message.as_str()],
            Self::Many(messages) => messages.iter().map(String::as_str).collect(),
        };
        items.into_iter()
    }
}

/// Body of a non-2xx response. Every field is optional because each endpoint
/// fills a different subset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, FieldMessages>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorPayload {
    pub fn has_field_errors(&self) -> bool {
        self.errors
            .as_ref()
            .is_some_and(|errors| errors.values().any(|messages| messages.iter().next().is_some()))
    }

    /// All field-level messages joined into a single user-facing line.
    pub fn consolidated(&self) -> Option<String> {
        let errors = self.errors.as_ref()?;
        let joined = errors
            .values()
            .flat_map(FieldMessages::iter)
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if joined.is_empty() {
            None
        } else {
            Some(joined)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consolidates_list_and_string_messages() {
        let payload: ErrorPayload = serde_json::from_str(
            r#"{"errors":{"min_price":["Must be positive."],"preference":"Staff only."}}"#,
        )
        .expect("payload");

        assert!(payload.has_field_errors());
        assert_eq!(
            payload.consolidated().as_deref(),
            Some("Must be positive. Staff only.")
        );
    }

    #[test]
    fn empty_error_map_is_not_structured() {
        let payload: ErrorPayload =
            serde_json::from_str(r#"{"errors":{"query":[]}}"#).expect("payload");
        assert!(!payload.has_field_errors());
        assert_eq!(payload.consolidated(), None);
    }
}
