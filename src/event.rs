use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// A child directory appeared.
    New,
    /// A child directory disappeared.
    Del,
}

/// A folder that appeared in or disappeared from the storage root since the
/// previous poll.
///
/// Serialized as `{"event":"new","folder_name":"<name>"}`.
///
/// # Examples
///
/// ```
/// use archdex::event::ChangeEvent;
///
/// let ev = ChangeEvent::new_folder("Ivanov_Dom5");
/// let line = ev.to_json_line().unwrap();
/// assert_eq!(line, r#"{"event":"new","folder_name":"Ivanov_Dom5"}"#);
/// assert_eq!(ChangeEvent::from_json(&line).unwrap(), ev);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub event: EventKind,
    pub folder_name: String,
}

impl ChangeEvent {
    pub fn new_folder(name: impl Into<String>) -> Self {
        Self {
            event: EventKind::New,
            folder_name: name.into(),
        }
    }

    pub fn deleted_folder(name: impl Into<String>) -> Self {
        Self {
            event: EventKind::Del,
            folder_name: name.into(),
        }
    }

    /// Encode as a single JSON line (no trailing newline).
    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
