//! Request and list-response bodies for the memory endpoints.

use crate::content::Content;
use crate::filter::FilterGroup;
use crate::memory::{Memory, MemoryRevision, Metadata, Scope};
use crate::session::SessionEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Input for `memories:generate`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateMemoriesRequest {
    #[serde(flatten)]
    pub source: GenerationSource,
    /// Optional for session sources; the session's user id is used instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disable_consolidation: bool,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub revision_labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_ttl: Option<String>,
}

/// Where generation reads conversational input from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum GenerationSource {
    DirectContentsSource(DirectContentsSource),
    VertexSessionSource(VertexSessionSource),
}

impl GenerationSource {
    /// Inline events, one per content turn.
    pub fn direct(contents: impl IntoIterator<Item = Content>) -> Self {
        Self::DirectContentsSource(DirectContentsSource {
            events: contents
                .into_iter()
                .map(|content| DirectEvent { content })
                .collect(),
        })
    }

    /// A whole session.
    pub fn session(session: impl Into<String>) -> Self {
        Self::VertexSessionSource(VertexSessionSource {
            session: session.into(),
            start_time: None,
            end_time: None,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DirectContentsSource {
    pub events: Vec<DirectEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DirectEvent {
    pub content: Content,
}

/// Session input, optionally bounded in time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VertexSessionSource {
    pub session: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

/// Input for `memories:retrieve`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveMemoriesRequest {
    pub scope: Scope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_search_params: Option<SimilaritySearchParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simple_retrieval_params: Option<SimpleRetrievalParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter_groups: Vec<FilterGroup>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SimilaritySearchParams {
    pub search_query: String,
    pub top_k: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SimpleRetrievalParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveMemoriesResponse {
    #[serde(default)]
    pub retrieved_memories: Vec<RetrievedMemory>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub next_page_token: String,
}

/// A retrieved memory, with its distance when similarity search ran.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedMemory {
    pub memory: Memory,
    /// Euclidean distance to the query; smaller is more similar.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

/// Input for `memories:purge`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PurgeMemoriesRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter_groups: Vec<FilterGroup>,
    /// `false` only counts matching memories.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RollbackMemoryRequest {
    pub target_revision_id: String,
}

/// Page selection for list calls, sent as query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub page_size: Option<u32>,
    pub page_token: Option<String>,
    pub filter: Option<String>,
}

impl PageRequest {
    /// Query string pairs in wire naming.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(page_size) = self.page_size {
            pairs.push(("pageSize", page_size.to_string()));
        }
        if let Some(page_token) = &self.page_token {
            pairs.push(("pageToken", page_token.clone()));
        }
        if let Some(filter) = &self.filter {
            pairs.push(("filter", filter.clone()));
        }
        pairs
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListMemoriesResponse {
    #[serde(default)]
    pub memories: Vec<Memory>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub next_page_token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListRevisionsResponse {
    #[serde(default)]
    pub memory_revisions: Vec<MemoryRevision>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub next_page_token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListEventsResponse {
    #[serde(default)]
    pub session_events: Vec<SessionEvent>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub next_page_token: String,
}
