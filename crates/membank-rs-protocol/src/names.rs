//! Fully-qualified resource names.
//!
//! Every resource is addressed by a slash-separated path of alternating
//! collection ids and resource ids, e.g.
//! `projects/p/locations/us-central1/reasoningEngines/123/memories/456`.

use crate::error::NameError;
use std::fmt;
use std::str::FromStr;

/// Split `value` into resource ids, checking that the collection segments
/// match `collections` exactly.
fn parse_ids<'a>(
    value: &'a str,
    collections: &[&str],
    kind: &'static str,
) -> Result<Vec<&'a str>, NameError> {
    let invalid = || NameError::Invalid {
        kind,
        value: value.to_string(),
    };
    let segments: Vec<&str> = value.split('/').collect();
    if segments.len() != collections.len() * 2 {
        return Err(invalid());
    }
    let mut ids = Vec::with_capacity(collections.len());
    for (pair, collection) in segments.chunks(2).zip(collections) {
        if pair[0] != *collection || pair[1].is_empty() {
            return Err(invalid());
        }
        ids.push(pair[1]);
    }
    Ok(ids)
}

/// `projects/{project}/locations/{location}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocationName {
    pub project: String,
    pub location: String,
}

impl LocationName {
    pub fn new(project: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            location: location.into(),
        }
    }

    /// Name of an engine living in this location.
    pub fn engine(&self, engine_id: impl Into<String>) -> EngineName {
        EngineName {
            location: self.clone(),
            engine_id: engine_id.into(),
        }
    }
}

impl fmt::Display for LocationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "projects/{}/locations/{}", self.project, self.location)
    }
}

impl FromStr for LocationName {
    type Err = NameError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let ids = parse_ids(value, &["projects", "locations"], "location")?;
        Ok(Self::new(ids[0], ids[1]))
    }
}

/// `projects/{project}/locations/{location}/reasoningEngines/{engine}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EngineName {
    pub location: LocationName,
    pub engine_id: String,
}

impl EngineName {
    /// Name of a memory inside this engine.
    pub fn memory(&self, memory_id: impl Into<String>) -> MemoryName {
        MemoryName {
            engine: self.clone(),
            memory_id: memory_id.into(),
        }
    }

    /// Name of a session inside this engine.
    pub fn session(&self, session_id: impl Into<String>) -> SessionName {
        SessionName {
            engine: self.clone(),
            session_id: session_id.into(),
        }
    }
}

impl fmt::Display for EngineName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/reasoningEngines/{}", self.location, self.engine_id)
    }
}

impl FromStr for EngineName {
    type Err = NameError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let ids = parse_ids(
            value,
            &["projects", "locations", "reasoningEngines"],
            "engine",
        )?;
        Ok(LocationName::new(ids[0], ids[1]).engine(ids[2]))
    }
}

/// `…/reasoningEngines/{engine}/memories/{memory}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemoryName {
    pub engine: EngineName,
    pub memory_id: String,
}

impl MemoryName {
    /// Name of one revision of this memory.
    pub fn revision(&self, revision_id: impl Into<String>) -> RevisionName {
        RevisionName {
            memory: self.clone(),
            revision_id: revision_id.into(),
        }
    }
}

impl fmt::Display for MemoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/memories/{}", self.engine, self.memory_id)
    }
}

impl FromStr for MemoryName {
    type Err = NameError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let ids = parse_ids(
            value,
            &["projects", "locations", "reasoningEngines", "memories"],
            "memory",
        )?;
        Ok(LocationName::new(ids[0], ids[1])
            .engine(ids[2])
            .memory(ids[3]))
    }
}

/// `…/memories/{memory}/revisions/{revision}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RevisionName {
    pub memory: MemoryName,
    pub revision_id: String,
}

impl fmt::Display for RevisionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/revisions/{}", self.memory, self.revision_id)
    }
}

impl FromStr for RevisionName {
    type Err = NameError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let ids = parse_ids(
            value,
            &[
                "projects",
                "locations",
                "reasoningEngines",
                "memories",
                "revisions",
            ],
            "revision",
        )?;
        Ok(LocationName::new(ids[0], ids[1])
            .engine(ids[2])
            .memory(ids[3])
            .revision(ids[4]))
    }
}

/// `…/reasoningEngines/{engine}/sessions/{session}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionName {
    pub engine: EngineName,
    pub session_id: String,
}

impl fmt::Display for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/sessions/{}", self.engine, self.session_id)
    }
}

impl FromStr for SessionName {
    type Err = NameError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let ids = parse_ids(
            value,
            &["projects", "locations", "reasoningEngines", "sessions"],
            "session",
        )?;
        Ok(LocationName::new(ids[0], ids[1])
            .engine(ids[2])
            .session(ids[3]))
    }
}

/// Last path segment of a resource name (the revision id for revisions).
pub fn last_segment(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}
