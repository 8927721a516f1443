use crate::extract;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use membank_rs_client::{MemoryBankApi, MemoryBankError, Result};
use membank_rs_protocol::filter::{SystemFilter, matches_any};
use membank_rs_protocol::{
    CustomTopic, DEFAULT_REVISION_TTL, DELETED_REVISION_WINDOW, Empty, EngineName,
    ExtractedMemory, GenerateMemoriesRequest, GenerateMemoriesResponse, GeneratedMemory,
    GenerationAction, GenerationSource, ListEventsResponse, ListMemoriesResponse,
    ListRevisionsResponse, LocationName, Memory, MemoryName, MemoryRevision, MemoryTopicConfig,
    Operation, PageRequest, PurgeMemoriesRequest, ReasoningEngine, RetrieveMemoriesRequest,
    RetrieveMemoriesResponse, RetrievedMemory, RevisionName, RollbackMemoryRequest, Scope,
    Session, SessionEvent, SessionName, Status, user_scope,
};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_PAGE_SIZE: usize = 50;

#[derive(Debug, Default)]
struct StoredOperation {
    outcome: Operation,
    polls_left: usize,
}

#[derive(Debug, Default)]
struct StoredSession {
    session: Session,
    events: Vec<SessionEvent>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    clock: Option<DateTime<Utc>>,
    engines: BTreeMap<String, ReasoningEngine>,
    sessions: BTreeMap<String, StoredSession>,
    memories: BTreeMap<String, Memory>,
    revisions: BTreeMap<String, Vec<MemoryRevision>>,
    operations: BTreeMap<String, StoredOperation>,
    pending_polls: usize,
    next_failure: Option<Status>,
    calls: usize,
    operation_polls: usize,
}

impl State {
    fn next_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }

    /// Wall-clock time, nudged forward so consecutive writes never share a
    /// timestamp.
    fn now(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let now = match self.clock {
            Some(last) if now <= last => last + TimeDelta::microseconds(1),
            _ => now,
        };
        self.clock = Some(now);
        now
    }

    fn start_operation(&mut self, location: &LocationName, response: impl Serialize) -> Operation {
        let outcome = Operation::completed(self.operation_name(location), response);
        self.track(outcome)
    }

    fn fail_operation(&mut self, location: &LocationName, status: Status) -> Operation {
        let outcome = Operation {
            name: self.operation_name(location),
            done: true,
            error: Some(status),
            ..Operation::default()
        };
        self.track(outcome)
    }

    fn operation_name(&mut self, location: &LocationName) -> String {
        format!("{location}/operations/{}", self.next_id())
    }

    fn track(&mut self, outcome: Operation) -> Operation {
        let polls_left = self.pending_polls;
        let snapshot = if polls_left == 0 {
            outcome.clone()
        } else {
            Operation {
                name: outcome.name.clone(),
                ..Operation::default()
            }
        };
        self.operations.insert(
            outcome.name.clone(),
            StoredOperation {
                outcome,
                polls_left,
            },
        );
        snapshot
    }

    fn engine(&self, engine: &EngineName) -> Result<&ReasoningEngine> {
        self.engines
            .get(&engine.to_string())
            .ok_or_else(|| MemoryBankError::NotFound(format!("engine {engine} not found")))
    }

    fn memory(&self, name: &MemoryName) -> Result<&Memory> {
        self.memories
            .get(&name.to_string())
            .ok_or_else(|| MemoryBankError::NotFound(format!("memory {name} not found")))
    }

    fn custom_topics(&self, engine: &EngineName) -> Vec<CustomTopic> {
        self.engines
            .get(&engine.to_string())
            .and_then(|engine| engine.context_spec.as_ref())
            .and_then(|spec| spec.memory_bank_config.as_ref())
            .map(|config| {
                config
                    .customization_configs
                    .iter()
                    .flat_map(|config| &config.memory_topics)
                    .filter_map(|topic| match topic {
                        MemoryTopicConfig::Custom(custom) => Some(custom.clone()),
                        MemoryTopicConfig::Managed(_) => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Memories of `engine`, oldest first.
    fn engine_memories(&self, engine: &EngineName) -> Vec<Memory> {
        let prefix = format!("{engine}/memories/");
        let mut memories: Vec<Memory> = self
            .memories
            .values()
            .filter(|memory| memory.name.starts_with(&prefix))
            .cloned()
            .collect();
        memories.sort_by_key(|memory| memory.create_time);
        memories
    }

    fn record_revision(
        &mut self,
        memory: &MemoryName,
        fact: &str,
        labels: &BTreeMap<String, String>,
        extracted: Option<&str>,
        ttl: Duration,
    ) -> String {
        let now = self.now();
        let name = memory.revision(self.next_id()).to_string();
        let revision = MemoryRevision {
            name: name.clone(),
            fact: fact.to_string(),
            create_time: Some(now),
            expire_time: expire_at(now, ttl),
            labels: labels.clone(),
            extracted_memories: extracted
                .map(|fact| {
                    vec![ExtractedMemory {
                        fact: fact.to_string(),
                    }]
                })
                .unwrap_or_default(),
        };
        self.revisions
            .entry(memory.to_string())
            .or_default()
            .push(revision);
        name
    }

    fn insert_memory(&mut self, engine: &EngineName, mut memory: Memory) -> Result<Memory> {
        let ttl = revision_ttl(memory.revision_ttl.as_deref())?;
        let now = self.now();
        let name = engine.memory(self.next_id());
        memory.name = name.to_string();
        memory.create_time = Some(now);
        memory.update_time = Some(now);
        memory.revision_ttl = None;
        self.memories.insert(memory.name.clone(), memory.clone());
        self.record_revision(&name, &memory.fact, &BTreeMap::new(), None, ttl);
        Ok(memory)
    }

    fn remove_memory(&mut self, name: &MemoryName, labels: &BTreeMap<String, String>) {
        if self.memories.remove(&name.to_string()).is_none() {
            return;
        }
        let now = self.now();
        if let (Some(window_end), Some(history)) = (
            expire_at(now, DELETED_REVISION_WINDOW),
            self.revisions.get_mut(&name.to_string()),
        ) {
            for revision in history {
                revision.expire_time = revision.expire_time.map(|at| at.min(window_end));
            }
        }
        self.record_revision(name, "", labels, None, DELETED_REVISION_WINDOW);
    }

    fn latest_revision(&self, name: &MemoryName) -> Option<String> {
        self.revisions
            .get(&name.to_string())
            .and_then(|history| history.last())
            .map(|revision| revision.name.clone())
    }

    fn generate(
        &mut self,
        engine: &EngineName,
        request: &GenerateMemoriesRequest,
    ) -> Result<GenerateMemoriesResponse> {
        let (facts, scope) = match &request.source {
            GenerationSource::DirectContentsSource(source) => {
                let scope = request.scope.clone().ok_or_else(|| {
                    MemoryBankError::InvalidRequest(
                        "scope is required for direct contents".to_string(),
                    )
                })?;
                let facts = extract::candidate_facts(
                    source.events.iter().map(|event| &event.content),
                );
                (facts, scope)
            }
            GenerationSource::VertexSessionSource(source) => {
                let stored = self.sessions.get(&source.session).ok_or_else(|| {
                    MemoryBankError::NotFound(format!("session {} not found", source.session))
                })?;
                let facts = extract::candidate_facts(
                    stored
                        .events
                        .iter()
                        .filter(|event| source.start_time.is_none_or(|at| event.timestamp >= at))
                        .filter(|event| source.end_time.is_none_or(|at| event.timestamp < at))
                        .filter_map(|event| event.content.as_ref()),
                );
                let scope = request
                    .scope
                    .clone()
                    .unwrap_or_else(|| user_scope(stored.session.user_id.clone()));
                (facts, scope)
            }
        };

        let ttl = revision_ttl(request.revision_ttl.as_deref())?;
        let custom_topics = self.custom_topics(engine);
        let mut generated = Vec::new();
        for fact in facts {
            if let Some(subject) = extract::forget_subject(&fact) {
                for memory in self.in_scope(engine, &scope) {
                    if extract::shares_keyword(&memory.fact, subject) {
                        let name = memory.memory_name()?;
                        self.remove_memory(&name, &request.revision_labels);
                        generated.push(generated_memory(&name, GenerationAction::Deleted, None));
                    }
                }
                continue;
            }

            let existing = self.in_scope(engine, &scope);
            if existing
                .iter()
                .any(|memory| memory.fact.eq_ignore_ascii_case(&fact))
            {
                continue;
            }

            let merge_target = (!request.disable_consolidation)
                .then(|| {
                    existing
                        .iter()
                        .find(|memory| extract::shares_keyword(&memory.fact, &fact))
                })
                .flatten();

            if let Some(target) = merge_target {
                let name = target.memory_name()?;
                let previous = self.latest_revision(&name);
                let merged = format!("{}; {}", target.fact, fact);
                let now = self.now();
                if let Some(memory) = self.memories.get_mut(&target.name) {
                    memory.fact = merged.clone();
                    memory.update_time = Some(now);
                    memory.metadata.extend(request.metadata.clone());
                }
                self.record_revision(&name, &merged, &request.revision_labels, Some(&fact), ttl);
                generated.push(generated_memory(&name, GenerationAction::Updated, previous));
            } else {
                let memory = Memory {
                    fact: fact.clone(),
                    scope: scope.clone(),
                    metadata: request.metadata.clone(),
                    topics: extract::topics(&fact, &custom_topics),
                    ..Memory::default()
                };
                let now = self.now();
                let name = engine.memory(self.next_id());
                let stored = Memory {
                    name: name.to_string(),
                    create_time: Some(now),
                    update_time: Some(now),
                    ..memory
                };
                self.memories.insert(stored.name.clone(), stored);
                self.record_revision(&name, &fact, &request.revision_labels, Some(&fact), ttl);
                generated.push(generated_memory(&name, GenerationAction::Created, None));
            }
        }
        Ok(GenerateMemoriesResponse {
            generated_memories: generated,
        })
    }

    fn in_scope(&self, engine: &EngineName, scope: &Scope) -> Vec<Memory> {
        self.engine_memories(engine)
            .into_iter()
            .filter(|memory| &memory.scope == scope)
            .collect()
    }
}

fn generated_memory(
    name: &MemoryName,
    action: GenerationAction,
    previous_revision: Option<String>,
) -> GeneratedMemory {
    GeneratedMemory {
        memory: Some(Memory {
            name: name.to_string(),
            ..Memory::default()
        }),
        action,
        previous_revision,
    }
}

fn expire_at(now: DateTime<Utc>, ttl: Duration) -> Option<DateTime<Utc>> {
    TimeDelta::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
}

/// Parse a protobuf JSON duration such as `"86400s"`.
fn revision_ttl(wire: Option<&str>) -> Result<Duration> {
    let Some(wire) = wire else {
        return Ok(DEFAULT_REVISION_TTL);
    };
    wire.strip_suffix('s')
        .and_then(|seconds| seconds.parse::<f64>().ok())
        .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
        .map(Duration::from_secs_f64)
        .ok_or_else(|| MemoryBankError::InvalidRequest(format!("invalid revision_ttl: {wire}")))
}

fn parse_filter(filter: Option<&str>) -> Result<Option<SystemFilter>> {
    filter
        .filter(|filter| !filter.trim().is_empty())
        .map(|filter| {
            SystemFilter::parse(filter)
                .map_err(|err| MemoryBankError::InvalidRequest(err.to_string()))
        })
        .transpose()
}

fn passes(filter: Option<&SystemFilter>, memory: &Memory) -> Result<bool> {
    match filter {
        Some(filter) => filter
            .matches(memory)
            .map_err(|err| MemoryBankError::InvalidRequest(err.to_string())),
        None => Ok(true),
    }
}

/// Offset-token pagination.
fn page<T: Clone>(items: &[T], page: &PageRequest) -> Result<(Vec<T>, String)> {
    page_at(
        items,
        page.page_size.map(|size| size as usize),
        page.page_token.as_deref(),
    )
}

fn page_at<T: Clone>(
    items: &[T],
    page_size: Option<usize>,
    page_token: Option<&str>,
) -> Result<(Vec<T>, String)> {
    let offset = match page_token.filter(|token| !token.is_empty()) {
        Some(token) => token.parse::<usize>().map_err(|_| {
            MemoryBankError::InvalidRequest(format!("invalid page token: {token}"))
        })?,
        None => 0,
    };
    let size = page_size
        .filter(|size| *size > 0)
        .unwrap_or(DEFAULT_PAGE_SIZE);
    let end = offset.saturating_add(size).min(items.len());
    let slice = items.get(offset..end).unwrap_or_default().to_vec();
    let next = if end < items.len() {
        end.to_string()
    } else {
        String::new()
    };
    Ok((slice, next))
}

/// In-process memory bank with the service's observable semantics.
///
/// Extraction and embeddings are replaced by word heuristics: each user
/// sentence is a candidate fact, candidates sharing a keyword with an
/// existing memory in the same scope are merged into it, and sentences
/// starting with "forget" delete matching memories. Every mutation records a
/// revision exactly like the service does.
///
/// Effects apply when the call is made. `set_pending_polls` only delays when
/// the returned operation reports `done`.
#[derive(Debug, Default)]
pub struct InMemoryBank {
    state: Mutex<State>,
}

impl InMemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an engine without going through an operation.
    pub fn seed_engine(&self, location: &LocationName) -> EngineName {
        let mut state = self.state.lock();
        let now = state.now();
        let name = location.engine(state.next_id());
        state.engines.insert(
            name.to_string(),
            ReasoningEngine {
                name: name.to_string(),
                display_name: Some("memory-bank".to_string()),
                create_time: Some(now),
                update_time: Some(now),
                context_spec: None,
            },
        );
        name
    }

    /// Operations started from now on report `done` only after `polls`
    /// `get_operation` calls. `usize::MAX` keeps them running forever.
    pub fn set_pending_polls(&self, polls: usize) {
        self.state.lock().pending_polls = polls;
    }

    /// The next mutating call starts an operation that fails with this status
    /// and leaves the bank unchanged.
    pub fn fail_next_operation(&self, code: i32, message: impl Into<String>) {
        self.state.lock().next_failure = Some(Status {
            code,
            message: message.into(),
        });
    }

    /// Total API calls received, including operation polls.
    pub fn call_count(&self) -> usize {
        self.state.lock().calls
    }

    pub fn operation_polls(&self) -> usize {
        self.state.lock().operation_polls
    }

    /// Every live memory across engines.
    pub fn memories(&self) -> Vec<Memory> {
        self.state.lock().memories.values().cloned().collect()
    }

    fn enter(&self) -> parking_lot::MutexGuard<'_, State> {
        let mut state = self.state.lock();
        state.calls += 1;
        state
    }
}

/// Short-circuits a mutation when a failure was scheduled.
macro_rules! fail_if_scheduled {
    ($state:expr, $location:expr) => {
        if let Some(status) = $state.next_failure.take() {
            return Ok($state.fail_operation($location, status));
        }
    };
}

#[async_trait]
impl MemoryBankApi for InMemoryBank {
    async fn create_engine(
        &self,
        location: &LocationName,
        engine: &ReasoningEngine,
    ) -> Result<Operation> {
        let mut state = self.enter();
        fail_if_scheduled!(state, location);
        let now = state.now();
        let name = location.engine(state.next_id());
        let created = ReasoningEngine {
            name: name.to_string(),
            create_time: Some(now),
            update_time: Some(now),
            ..engine.clone()
        };
        state.engines.insert(created.name.clone(), created.clone());
        Ok(state.start_operation(location, created))
    }

    async fn get_engine(&self, engine: &EngineName) -> Result<ReasoningEngine> {
        let state = self.enter();
        state.engine(engine).cloned()
    }

    async fn update_engine(
        &self,
        engine: &EngineName,
        patch: &ReasoningEngine,
        update_mask: &str,
    ) -> Result<Operation> {
        let mut state = self.enter();
        state.engine(engine)?;
        if update_mask != "contextSpec" {
            return Err(MemoryBankError::InvalidRequest(format!(
                "unsupported update mask: {update_mask}"
            )));
        }
        fail_if_scheduled!(state, &engine.location);
        let now = state.now();
        let mut updated = state.engine(engine)?.clone();
        updated.context_spec = patch.context_spec.clone();
        updated.update_time = Some(now);
        state.engines.insert(updated.name.clone(), updated.clone());
        Ok(state.start_operation(&engine.location, updated))
    }

    async fn create_session(&self, engine: &EngineName, session: &Session) -> Result<Operation> {
        let mut state = self.enter();
        state.engine(engine)?;
        if session.user_id.is_empty() {
            return Err(MemoryBankError::InvalidRequest(
                "user_id is required".to_string(),
            ));
        }
        fail_if_scheduled!(state, &engine.location);
        let now = state.now();
        let created = Session {
            name: engine.session(state.next_id()).to_string(),
            user_id: session.user_id.clone(),
            create_time: Some(now),
            update_time: Some(now),
        };
        state.sessions.insert(
            created.name.clone(),
            StoredSession {
                session: created.clone(),
                events: Vec::new(),
            },
        );
        Ok(state.start_operation(&engine.location, created))
    }

    async fn append_event(&self, session: &SessionName, event: &SessionEvent) -> Result<()> {
        let mut state = self.enter();
        let event_id = state.next_id();
        let now = state.now();
        let stored = state
            .sessions
            .get_mut(&session.to_string())
            .ok_or_else(|| MemoryBankError::NotFound(format!("session {session} not found")))?;
        stored.events.push(SessionEvent {
            name: format!("{session}/events/{event_id}"),
            ..event.clone()
        });
        stored.session.update_time = Some(now);
        Ok(())
    }

    async fn list_events(
        &self,
        session: &SessionName,
        request: &PageRequest,
    ) -> Result<ListEventsResponse> {
        let state = self.enter();
        let stored = state
            .sessions
            .get(&session.to_string())
            .ok_or_else(|| MemoryBankError::NotFound(format!("session {session} not found")))?;
        let (session_events, next_page_token) = page(&stored.events, request)?;
        Ok(ListEventsResponse {
            session_events,
            next_page_token,
        })
    }

    async fn create_memory(&self, engine: &EngineName, memory: &Memory) -> Result<Operation> {
        let mut state = self.enter();
        state.engine(engine)?;
        if memory.fact.trim().is_empty() || memory.scope.is_empty() {
            return Err(MemoryBankError::InvalidRequest(
                "fact and scope are required".to_string(),
            ));
        }
        fail_if_scheduled!(state, &engine.location);
        let created = state.insert_memory(engine, memory.clone())?;
        Ok(state.start_operation(&engine.location, created))
    }

    async fn generate_memories(
        &self,
        engine: &EngineName,
        request: &GenerateMemoriesRequest,
    ) -> Result<Operation> {
        let mut state = self.enter();
        state.engine(engine)?;
        fail_if_scheduled!(state, &engine.location);
        let response = state.generate(engine, request)?;
        Ok(state.start_operation(&engine.location, response))
    }

    async fn get_memory(&self, name: &MemoryName) -> Result<Memory> {
        let state = self.enter();
        state.memory(name).cloned()
    }

    async fn list_memories(
        &self,
        engine: &EngineName,
        request: &PageRequest,
    ) -> Result<ListMemoriesResponse> {
        let state = self.enter();
        state.engine(engine)?;
        let filter = parse_filter(request.filter.as_deref())?;
        let mut memories = Vec::new();
        for memory in state.engine_memories(engine) {
            if passes(filter.as_ref(), &memory)? {
                memories.push(memory);
            }
        }
        let (memories, next_page_token) = page(&memories, request)?;
        Ok(ListMemoriesResponse {
            memories,
            next_page_token,
        })
    }

    async fn retrieve_memories(
        &self,
        engine: &EngineName,
        request: &RetrieveMemoriesRequest,
    ) -> Result<RetrieveMemoriesResponse> {
        let state = self.enter();
        state.engine(engine)?;
        if request.scope.is_empty() {
            return Err(MemoryBankError::InvalidRequest(
                "scope is required".to_string(),
            ));
        }
        let filter = parse_filter(request.filter.as_deref())?;
        let mut candidates = Vec::new();
        for memory in state.in_scope(engine, &request.scope) {
            if matches_any(&request.filter_groups, &memory.metadata)
                && passes(filter.as_ref(), &memory)?
            {
                candidates.push(memory);
            }
        }

        if let Some(similarity) = &request.similarity_search_params {
            if similarity.top_k == 0 {
                return Err(MemoryBankError::InvalidRequest(
                    "top_k must be positive".to_string(),
                ));
            }
            let mut ranked: Vec<RetrievedMemory> = candidates
                .into_iter()
                .map(|memory| RetrievedMemory {
                    distance: Some(extract::distance(&similarity.search_query, &memory.fact)),
                    memory,
                })
                .collect();
            ranked.sort_by(|left, right| {
                left.distance
                    .partial_cmp(&right.distance)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| left.memory.name.cmp(&right.memory.name))
            });
            ranked.truncate(similarity.top_k as usize);
            return Ok(RetrieveMemoriesResponse {
                retrieved_memories: ranked,
                next_page_token: String::new(),
            });
        }

        let simple = request.simple_retrieval_params.clone().unwrap_or_default();
        let (memories, next_page_token) = page_at(
            &candidates,
            simple.page_size.map(|size| size as usize),
            simple.page_token.as_deref(),
        )?;
        Ok(RetrieveMemoriesResponse {
            retrieved_memories: memories
                .into_iter()
                .map(|memory| RetrievedMemory {
                    memory,
                    distance: None,
                })
                .collect(),
            next_page_token,
        })
    }

    async fn update_memory(
        &self,
        name: &MemoryName,
        patch: &Memory,
        update_mask: &str,
    ) -> Result<Operation> {
        let mut state = self.enter();
        state.memory(name)?;
        if update_mask != "metadata" {
            return Err(MemoryBankError::InvalidRequest(format!(
                "unsupported update mask: {update_mask}"
            )));
        }
        fail_if_scheduled!(state, &name.engine.location);
        let now = state.now();
        let mut updated = state.memory(name)?.clone();
        updated.metadata = patch.metadata.clone();
        updated.update_time = Some(now);
        state.memories.insert(updated.name.clone(), updated.clone());
        Ok(state.start_operation(&name.engine.location, updated))
    }

    async fn delete_memory(&self, name: &MemoryName) -> Result<Operation> {
        let mut state = self.enter();
        state.memory(name)?;
        fail_if_scheduled!(state, &name.engine.location);
        state.remove_memory(name, &BTreeMap::new());
        Ok(state.start_operation(&name.engine.location, Empty {}))
    }

    async fn purge_memories(
        &self,
        engine: &EngineName,
        request: &PurgeMemoriesRequest,
    ) -> Result<Operation> {
        let mut state = self.enter();
        state.engine(engine)?;
        if request.filter.is_none() && request.filter_groups.is_empty() {
            return Err(MemoryBankError::InvalidRequest(
                "filter or filter_groups is required".to_string(),
            ));
        }
        let filter = parse_filter(request.filter.as_deref())?;
        fail_if_scheduled!(state, &engine.location);
        let mut matched = Vec::new();
        for memory in state.engine_memories(engine) {
            if matches_any(&request.filter_groups, &memory.metadata)
                && passes(filter.as_ref(), &memory)?
            {
                matched.push(memory.memory_name()?);
            }
        }
        if request.force {
            for name in &matched {
                state.remove_memory(name, &BTreeMap::new());
            }
        }
        let response = json!({ "purgeCount": matched.len().to_string() });
        Ok(state.start_operation(&engine.location, response))
    }

    async fn list_revisions(
        &self,
        memory: &MemoryName,
        request: &PageRequest,
    ) -> Result<ListRevisionsResponse> {
        let state = self.enter();
        let history = state
            .revisions
            .get(&memory.to_string())
            .ok_or_else(|| MemoryBankError::NotFound(format!("memory {memory} not found")))?;
        let filter = parse_filter(request.filter.as_deref())?;
        let mut revisions = Vec::new();
        for revision in history.iter().rev() {
            let keep = match &filter {
                Some(filter) => filter
                    .matches(revision)
                    .map_err(|err| MemoryBankError::InvalidRequest(err.to_string()))?,
                None => true,
            };
            if keep {
                revisions.push(revision.clone());
            }
        }
        let (memory_revisions, next_page_token) = page(&revisions, request)?;
        Ok(ListRevisionsResponse {
            memory_revisions,
            next_page_token,
        })
    }

    async fn get_revision(&self, name: &RevisionName) -> Result<MemoryRevision> {
        let state = self.enter();
        let wanted = name.to_string();
        state
            .revisions
            .get(&name.memory.to_string())
            .and_then(|history| history.iter().find(|revision| revision.name == wanted))
            .cloned()
            .ok_or_else(|| MemoryBankError::NotFound(format!("revision {name} not found")))
    }

    async fn rollback_memory(
        &self,
        memory: &MemoryName,
        request: &RollbackMemoryRequest,
    ) -> Result<Operation> {
        let mut state = self.enter();
        state.memory(memory)?;
        let target = memory.revision(request.target_revision_id.clone()).to_string();
        let fact = state
            .revisions
            .get(&memory.to_string())
            .and_then(|history| history.iter().find(|revision| revision.name == target))
            .map(|revision| revision.fact.clone())
            .ok_or_else(|| MemoryBankError::NotFound(format!("revision {target} not found")))?;
        if fact.is_empty() {
            return Err(MemoryBankError::InvalidRequest(
                "cannot roll back to a deletion revision".to_string(),
            ));
        }
        fail_if_scheduled!(state, &memory.engine.location);
        let now = state.now();
        if let Some(stored) = state.memories.get_mut(&memory.to_string()) {
            stored.fact = fact.clone();
            stored.update_time = Some(now);
        }
        state.record_revision(
            memory,
            &fact,
            &BTreeMap::new(),
            None,
            DEFAULT_REVISION_TTL,
        );
        Ok(state.start_operation(&memory.engine.location, Empty {}))
    }

    async fn get_operation(&self, name: &str) -> Result<Operation> {
        let mut state = self.enter();
        state.operation_polls += 1;
        let stored = state
            .operations
            .get_mut(name)
            .ok_or_else(|| MemoryBankError::NotFound(format!("operation {name} not found")))?;
        if stored.polls_left != usize::MAX {
            stored.polls_left = stored.polls_left.saturating_sub(1);
        }
        if stored.polls_left == 0 {
            Ok(stored.outcome.clone())
        } else {
            Ok(Operation {
                name: name.to_string(),
                ..Operation::default()
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use membank_rs_protocol::{Content, DirectContentsSource, DirectEvent};
    use pretty_assertions::assert_eq;

    fn direct(texts: &[&str], scope: Scope) -> GenerateMemoriesRequest {
        GenerateMemoriesRequest {
            source: GenerationSource::DirectContentsSource(DirectContentsSource {
                events: texts
                    .iter()
                    .map(|text| DirectEvent {
                        content: Content::user_text(*text),
                    })
                    .collect(),
            }),
            scope: Some(scope),
            disable_consolidation: false,
            metadata: Default::default(),
            revision_labels: BTreeMap::new(),
            revision_ttl: None,
        }
    }

    #[test]
    fn pages_by_offset_token() {
        let items: Vec<u32> = (0..5).collect();
        let (first, next) = page_at(&items, Some(2), None).expect("page");
        assert_eq!(first, vec![0, 1]);
        assert_eq!(next, "2");
        let (last, next) = page_at(&items, Some(4), Some("2")).expect("page");
        assert_eq!(last, vec![2, 3, 4]);
        assert_eq!(next, "");
        assert!(page_at(&items, None, Some("x")).is_err());
        let (beyond, _) = page_at(&items, None, Some("9")).expect("page");
        assert!(beyond.is_empty());
    }

    #[test]
    fn parses_wire_ttl() {
        assert_eq!(
            revision_ttl(Some("86400s")).expect("ttl"),
            Duration::from_secs(86_400)
        );
        assert_eq!(revision_ttl(None).expect("ttl"), DEFAULT_REVISION_TTL);
        assert!(revision_ttl(Some("1d")).is_err());
    }

    #[tokio::test]
    async fn generation_merges_and_forgets() {
        let bank = InMemoryBank::new();
        let engine = bank.seed_engine(&LocationName::new("p", "l"));
        let scope = user_scope("u1");

        bank.generate_memories(&engine, &direct(&["I like Python"], scope.clone()))
            .await
            .expect("generate");
        let op = bank
            .generate_memories(
                &engine,
                &direct(&["I use Python for data science"], scope.clone()),
            )
            .await
            .expect("generate");
        let response: GenerateMemoriesResponse = op.decode_response().expect("response");
        assert_eq!(
            response.generated_memories[0].action,
            GenerationAction::Updated
        );
        assert!(response.generated_memories[0].previous_revision.is_some());
        assert_eq!(bank.memories().len(), 1);

        bank.generate_memories(&engine, &direct(&["Forget Python"], scope))
            .await
            .expect("generate");
        assert!(bank.memories().is_empty());
    }

    #[tokio::test]
    async fn pending_operations_finish_after_polls() {
        let bank = InMemoryBank::new();
        let location = LocationName::new("p", "l");
        bank.set_pending_polls(2);
        let op = bank
            .create_engine(&location, &ReasoningEngine::default())
            .await
            .expect("create");
        assert!(!op.done);
        assert!(!bank.get_operation(&op.name).await.expect("poll").done);
        assert!(bank.get_operation(&op.name).await.expect("poll").done);
        assert_eq!(bank.operation_polls(), 2);
        assert_eq!(bank.call_count(), 3);
    }
}
