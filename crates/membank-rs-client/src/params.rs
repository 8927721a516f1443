//! Caller-facing arguments for the high-level client calls.

use crate::error::{MemoryBankError, Result};
use chrono::{DateTime, Utc};
use membank_rs_protocol::filter::{FilterGroup, SystemFilter};
use membank_rs_protocol::{
    Content, GenerateMemoriesRequest, GenerationSource, Memory, MemoryTopic, Metadata,
    MetadataValue, PurgeMemoriesRequest, RetrieveMemoriesRequest, Scope, SessionName,
    SimilaritySearchParams, duration_to_wire,
};
use std::collections::BTreeMap;
use std::time::Duration;

/// A memory written verbatim, without extraction or consolidation.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateMemory {
    pub fact: String,
    pub scope: Scope,
    pub metadata: Metadata,
    pub topics: Vec<MemoryTopic>,
    /// Retention for revisions of this memory; the service default is 365 days.
    pub revision_ttl: Option<Duration>,
}

impl CreateMemory {
    pub fn new(fact: impl Into<String>, scope: Scope) -> Self {
        Self {
            fact: fact.into(),
            scope,
            metadata: Metadata::new(),
            topics: Vec::new(),
            revision_ttl: None,
        }
    }

    pub fn metadata(mut self, key: impl Into<String>, value: MetadataValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn topic(mut self, topic: MemoryTopic) -> Self {
        self.topics.push(topic);
        self
    }

    pub fn revision_ttl(mut self, ttl: Duration) -> Self {
        self.revision_ttl = Some(ttl);
        self
    }

    pub(crate) fn into_memory(self) -> Result<Memory> {
        if self.fact.trim().is_empty() {
            return Err(MemoryBankError::invalid("fact must not be empty"));
        }
        require_scope(&self.scope)?;
        Ok(Memory {
            fact: self.fact,
            scope: self.scope,
            metadata: self.metadata,
            topics: self.topics,
            revision_ttl: self.revision_ttl.map(duration_to_wire),
            ..Memory::default()
        })
    }
}

/// Input for extraction and consolidation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateMemories {
    pub source: GenerationSource,
    /// Required for inline contents; derived from the session's user otherwise.
    pub scope: Option<Scope>,
    pub metadata: Metadata,
    /// Labels stamped on every revision this call produces.
    pub revision_labels: BTreeMap<String, String>,
    pub revision_ttl: Option<Duration>,
    /// Write each extracted fact as a new memory instead of merging.
    pub disable_consolidation: bool,
}

impl GenerateMemories {
    /// Extract from inline conversation turns under `scope`.
    pub fn from_contents(contents: impl IntoIterator<Item = Content>, scope: Scope) -> Self {
        Self::with_source(GenerationSource::direct(contents), Some(scope))
    }

    /// Extract from every event of a stored session.
    pub fn from_session(session: &SessionName) -> Self {
        Self::with_source(GenerationSource::session(session.to_string()), None)
    }

    fn with_source(source: GenerationSource, scope: Option<Scope>) -> Self {
        Self {
            source,
            scope,
            metadata: Metadata::new(),
            revision_labels: BTreeMap::new(),
            revision_ttl: None,
            disable_consolidation: false,
        }
    }

    /// Bound a session source to events in `[start, end)`. Ignored for inline contents.
    pub fn time_range(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        if let GenerationSource::VertexSessionSource(source) = &mut self.source {
            source.start_time = start;
            source.end_time = end;
        }
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: MetadataValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn revision_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.revision_labels.insert(key.into(), value.into());
        self
    }

    pub fn revision_ttl(mut self, ttl: Duration) -> Self {
        self.revision_ttl = Some(ttl);
        self
    }

    pub fn disable_consolidation(mut self) -> Self {
        self.disable_consolidation = true;
        self
    }

    pub(crate) fn into_request(self) -> Result<GenerateMemoriesRequest> {
        match &self.source {
            GenerationSource::DirectContentsSource(source) => {
                if source.events.is_empty() {
                    return Err(MemoryBankError::invalid(
                        "direct contents need at least one event",
                    ));
                }
                match &self.scope {
                    Some(scope) => require_scope(scope)?,
                    None => {
                        return Err(MemoryBankError::invalid(
                            "scope is required for direct contents",
                        ));
                    }
                }
            }
            GenerationSource::VertexSessionSource(source) => {
                if source.session.is_empty() {
                    return Err(MemoryBankError::invalid("session name must not be empty"));
                }
                if let (Some(start), Some(end)) = (source.start_time, source.end_time)
                    && start > end
                {
                    return Err(MemoryBankError::invalid(
                        "session start_time is after end_time",
                    ));
                }
            }
        }
        Ok(GenerateMemoriesRequest {
            source: self.source,
            scope: self.scope,
            disable_consolidation: self.disable_consolidation,
            metadata: self.metadata,
            revision_labels: self.revision_labels,
            revision_ttl: self.revision_ttl.map(duration_to_wire),
        })
    }
}

/// A retrieval query. Scope match is exact; filters AND together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Retrieve {
    pub scope: Scope,
    pub filter: Option<SystemFilter>,
    pub filter_groups: Vec<FilterGroup>,
    pub similarity: Option<SimilaritySearchParams>,
}

impl Retrieve {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            ..Self::default()
        }
    }

    pub fn filter(mut self, filter: SystemFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Metadata conditions in disjunctive normal form.
    pub fn filter_groups(mut self, groups: impl IntoIterator<Item = FilterGroup>) -> Self {
        self.filter_groups = groups.into_iter().collect();
        self
    }

    /// Rank by embedding distance to `query` and keep the nearest `top_k`.
    pub fn similar_to(mut self, query: impl Into<String>, top_k: u32) -> Self {
        self.similarity = Some(SimilaritySearchParams {
            search_query: query.into(),
            top_k,
        });
        self
    }

    pub(crate) fn into_request(self) -> Result<RetrieveMemoriesRequest> {
        require_scope(&self.scope)?;
        if let Some(similarity) = &self.similarity {
            if similarity.top_k == 0 {
                return Err(MemoryBankError::invalid("top_k must be at least 1"));
            }
            if similarity.search_query.trim().is_empty() {
                return Err(MemoryBankError::invalid("search_query must not be empty"));
            }
        }
        Ok(RetrieveMemoriesRequest {
            scope: self.scope,
            similarity_search_params: self.similarity,
            simple_retrieval_params: None,
            filter: self.filter.map(|filter| filter.render()),
            filter_groups: self.filter_groups,
        })
    }
}

/// A purge selection. Without `force` the call only counts matches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Purge {
    pub filter: Option<SystemFilter>,
    pub filter_groups: Vec<FilterGroup>,
    pub force: bool,
}

impl Purge {
    pub fn matching(filter: SystemFilter) -> Self {
        Self {
            filter: Some(filter),
            ..Self::default()
        }
    }

    pub fn matching_groups(groups: impl IntoIterator<Item = FilterGroup>) -> Self {
        Self {
            filter_groups: groups.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Also require the metadata groups to match.
    pub fn and_groups(mut self, groups: impl IntoIterator<Item = FilterGroup>) -> Self {
        self.filter_groups.extend(groups);
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub(crate) fn into_request(self) -> Result<PurgeMemoriesRequest> {
        if self.filter.is_none() && self.filter_groups.is_empty() {
            return Err(MemoryBankError::invalid(
                "purge needs a filter or filter groups",
            ));
        }
        // An empty group or an empty rendered filter selects every memory.
        if self.filter_groups.iter().any(|group| group.filters.is_empty()) {
            return Err(MemoryBankError::invalid(
                "purge filter groups must each have a condition",
            ));
        }
        let filter = self.filter.map(|filter| filter.render());
        if filter.as_deref().is_some_and(|rendered| rendered.trim().is_empty()) {
            return Err(MemoryBankError::invalid("purge filter must not be empty"));
        }
        Ok(PurgeMemoriesRequest {
            filter,
            filter_groups: self.filter_groups,
            force: self.force,
        })
    }
}

/// Result of a purge call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeOutcome {
    /// Memories matched (dry run) or deleted (forced).
    pub purge_count: i64,
    /// Whether deletion actually happened.
    pub executed: bool,
}

fn require_scope(scope: &Scope) -> Result<()> {
    if scope.is_empty() {
        return Err(MemoryBankError::invalid("scope must not be empty"));
    }
    if scope.iter().any(|(key, value)| key.is_empty() || value.is_empty()) {
        return Err(MemoryBankError::invalid(
            "scope keys and values must not be empty",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use membank_rs_protocol::filter::MetadataCondition;
    use membank_rs_protocol::{LocationName, user_scope};
    use pretty_assertions::assert_eq;

    #[test]
    fn direct_contents_require_scope() {
        let mut generate = GenerateMemories::from_contents(
            [Content::user_text("I prefer dark mode.")],
            user_scope("u"),
        );
        generate.scope = None;
        assert!(matches!(
            generate.into_request(),
            Err(MemoryBankError::InvalidRequest(_))
        ));
    }

    #[test]
    fn session_source_derives_scope_server_side() {
        let session = LocationName::new("p", "l").engine("1").session("s");
        let request = GenerateMemories::from_session(&session)
            .revision_label("data_source", "demo")
            .revision_ttl(Duration::from_secs(86_400))
            .into_request()
            .expect("request");
        assert_eq!(request.scope, None);
        assert_eq!(request.revision_ttl.as_deref(), Some("86400s"));
        assert_eq!(
            request.revision_labels.get("data_source").map(String::as_str),
            Some("demo")
        );
    }

    #[test]
    fn retrieve_validates_scope_and_top_k() {
        assert!(Retrieve::new(Scope::new()).into_request().is_err());
        assert!(
            Retrieve::new(user_scope("u"))
                .similar_to("editor", 0)
                .into_request()
                .is_err()
        );
        let request = Retrieve::new(user_scope("u"))
            .filter(SystemFilter::fact_contains("Python"))
            .similar_to("languages", 3)
            .into_request()
            .expect("request");
        assert_eq!(request.filter.as_deref(), Some(r#"fact=~".*Python.*""#));
        assert_eq!(request.similarity_search_params.map(|p| p.top_k), Some(3));
    }

    #[test]
    fn purge_requires_a_selection() {
        assert!(matches!(
            Purge::default().force(true).into_request(),
            Err(MemoryBankError::InvalidRequest(_))
        ));
        let request = Purge::matching_groups([FilterGroup::all([MetadataCondition::eq(
            "batch_id",
            MetadataValue::string("b1"),
        )])])
        .into_request()
        .expect("request");
        assert!(!request.force);
        assert_eq!(request.filter_groups.len(), 1);
    }

    #[test]
    fn purge_rejects_selections_that_match_everything() {
        assert!(matches!(
            Purge::matching_groups([FilterGroup::default()])
                .force(true)
                .into_request(),
            Err(MemoryBankError::InvalidRequest(_))
        ));
        assert!(matches!(
            Purge::matching(SystemFilter::And(Vec::new()))
                .force(true)
                .into_request(),
            Err(MemoryBankError::InvalidRequest(_))
        ));
        let batch = FilterGroup::all([MetadataCondition::eq(
            "batch_id",
            MetadataValue::string("b1"),
        )]);
        assert!(
            Purge::matching_groups([batch, FilterGroup::default()])
                .into_request()
                .is_err()
        );
    }
}
