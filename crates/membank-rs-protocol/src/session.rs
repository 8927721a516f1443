//! Sessions: append-only conversational logs used as generation input.

use crate::content::Content;
use crate::error::NameError;
use crate::names::SessionName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session resource.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
}

impl Session {
    pub fn session_name(&self) -> Result<SessionName, NameError> {
        self.name.parse()
    }
}

/// One event appended to a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionEvent {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub author: String,
    /// Identifies the turn the event belongs to.
    pub invocation_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
}

impl SessionEvent {
    /// Event stamped with the current time.
    pub fn new(
        author: impl Into<String>,
        invocation_id: impl Into<String>,
        content: Content,
    ) -> Self {
        Self {
            name: String::new(),
            author: author.into(),
            invocation_id: invocation_id.into(),
            timestamp: Utc::now(),
            content: Some(content),
        }
    }
}
