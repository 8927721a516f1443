//! High-level memory bank client.

use crate::api::MemoryBankApi;
use crate::error::{MemoryBankError, Result};
use crate::http::HttpMemoryBank;
use crate::operation::{PendingOperation, PollOptions};
use crate::params::{CreateMemory, GenerateMemories, Purge, PurgeOutcome, Retrieve};
use log::{debug, info};
use membank_rs_config::MembankConfig;
use membank_rs_protocol::filter::SystemFilter;
use membank_rs_protocol::{
    ContextSpec, Empty, EngineName, GenerateMemoriesResponse, ListMemoriesResponse, LocationName,
    Memory, MemoryName, MemoryRevision, Metadata, PageRequest, PurgeMemoriesResponse,
    ReasoningEngine, RetrievedMemory, RevisionName, RollbackMemoryRequest, Session, SessionEvent,
    SessionName, SimpleRetrievalParams,
};
use serde::de::DeserializeOwned;
use std::cmp::Reverse;
use std::sync::Arc;

/// Page size used when collecting every page of a list call.
const COLLECT_PAGE_SIZE: u32 = 100;

/// Typed entry point for memory bank operations.
///
/// Mutations that the service runs as long-running operations are awaited
/// with the client's `PollOptions`, except `generate_memories`, which hands
/// the pending operation back to the caller.
#[derive(Clone)]
pub struct MemoryBankClient {
    api: Arc<dyn MemoryBankApi>,
    poll: PollOptions,
}

impl MemoryBankClient {
    pub fn new(api: Arc<dyn MemoryBankApi>) -> Self {
        Self {
            api,
            poll: PollOptions::default(),
        }
    }

    /// REST client with endpoint, credentials, and polling from `config`.
    pub fn from_config(config: &MembankConfig) -> Result<Self> {
        let api = HttpMemoryBank::from_config(config)?;
        Ok(Self::new(Arc::new(api)).with_poll_options(PollOptions::from(&config.polling)))
    }

    pub fn with_poll_options(mut self, poll: PollOptions) -> Self {
        self.poll = poll;
        self
    }

    pub fn poll_options(&self) -> PollOptions {
        self.poll
    }

    /// Underlying service handle.
    pub fn api(&self) -> &Arc<dyn MemoryBankApi> {
        &self.api
    }

    fn pending<T: DeserializeOwned>(
        &self,
        operation: membank_rs_protocol::Operation,
    ) -> PendingOperation<T> {
        PendingOperation::new(self.api.clone(), operation, self.poll)
    }

    // Engines and sessions.

    /// Create a reasoning engine and wait until it is provisioned.
    pub async fn create_engine(
        &self,
        location: &LocationName,
        engine: ReasoningEngine,
    ) -> Result<ReasoningEngine> {
        if let Some(spec) = &engine.context_spec {
            validate_context(spec)?;
        }
        info!("creating agent engine (location={location})");
        let operation = self.api.create_engine(location, &engine).await?;
        let created: ReasoningEngine = self.pending(operation).wait().await?;
        info!("agent engine ready (name={})", created.name);
        Ok(created)
    }

    pub async fn get_engine(&self, engine: &EngineName) -> Result<ReasoningEngine> {
        self.api.get_engine(engine).await
    }

    /// Replace the engine's memory bank context: embedding model and topics.
    /// Applies to every later generate and retrieve call.
    pub async fn update_engine_context(
        &self,
        engine: &EngineName,
        context_spec: ContextSpec,
    ) -> Result<ReasoningEngine> {
        validate_context(&context_spec)?;
        info!("updating engine context (engine={engine})");
        let patch = ReasoningEngine {
            context_spec: Some(context_spec),
            ..ReasoningEngine::default()
        };
        let operation = self
            .api
            .update_engine(engine, &patch, "contextSpec")
            .await?;
        self.pending(operation).wait().await
    }

    pub async fn create_session(&self, engine: &EngineName, user_id: &str) -> Result<Session> {
        if user_id.trim().is_empty() {
            return Err(MemoryBankError::invalid("user_id must not be empty"));
        }
        let session = Session {
            user_id: user_id.to_string(),
            ..Session::default()
        };
        let operation = self.api.create_session(engine, &session).await?;
        let created: Session = self.pending(operation).wait().await?;
        debug!(
            "session created (name={}, user_id={})",
            created.name, created.user_id
        );
        Ok(created)
    }

    pub async fn append_event(&self, session: &SessionName, event: SessionEvent) -> Result<()> {
        if event.author.trim().is_empty() {
            return Err(MemoryBankError::invalid("event author must not be empty"));
        }
        if event.invocation_id.trim().is_empty() {
            return Err(MemoryBankError::invalid(
                "event invocation_id must not be empty",
            ));
        }
        self.api.append_event(session, &event).await
    }

    /// Every event of a session, oldest first.
    pub async fn list_events(&self, session: &SessionName) -> Result<Vec<SessionEvent>> {
        let mut page = collect_page(None);
        let mut events = Vec::new();
        loop {
            let response = self.api.list_events(session, &page).await?;
            events.extend(response.session_events);
            if response.next_page_token.is_empty() {
                break;
            }
            page.page_token = Some(response.next_page_token);
        }
        Ok(events)
    }

    // Creation and generation.

    /// Store a fact verbatim and wait for the memory to exist.
    pub async fn create_memory(&self, engine: &EngineName, memory: CreateMemory) -> Result<Memory> {
        let memory = memory.into_memory()?;
        info!(
            "creating memory (engine={engine}, fact_len={})",
            memory.fact.len()
        );
        let operation = self.api.create_memory(engine, &memory).await?;
        self.pending(operation).wait().await
    }

    /// Start extraction and consolidation. The outcome is not deterministic;
    /// callers decide whether and how long to wait.
    pub async fn generate_memories(
        &self,
        engine: &EngineName,
        generate: GenerateMemories,
    ) -> Result<PendingOperation<GenerateMemoriesResponse>> {
        let request = generate.into_request()?;
        info!(
            "generating memories (engine={engine}, consolidate={})",
            !request.disable_consolidation
        );
        let operation = self.api.generate_memories(engine, &request).await?;
        Ok(self.pending(operation))
    }

    // Retrieval.

    /// Fetch one memory; `NotFound` when it does not exist.
    pub async fn get_memory(&self, name: &MemoryName) -> Result<Memory> {
        self.api.get_memory(name).await
    }

    /// One page of the engine's memories across all scopes.
    pub async fn list_memories_page(
        &self,
        engine: &EngineName,
        page: &PageRequest,
    ) -> Result<ListMemoriesResponse> {
        self.api.list_memories(engine, page).await
    }

    /// Every memory in the engine, following page tokens.
    pub async fn list_memories(&self, engine: &EngineName) -> Result<Vec<Memory>> {
        let mut page = collect_page(None);
        let mut memories = Vec::new();
        loop {
            let response = self.api.list_memories(engine, &page).await?;
            memories.extend(response.memories);
            if response.next_page_token.is_empty() {
                break;
            }
            page.page_token = Some(response.next_page_token);
        }
        Ok(memories)
    }

    /// Memories whose scope equals `retrieve.scope` exactly and that pass every
    /// filter. With similarity params the result is ranked by ascending
    /// distance and capped at `top_k`; otherwise all matches are returned.
    pub async fn retrieve_memories(
        &self,
        engine: &EngineName,
        retrieve: Retrieve,
    ) -> Result<Vec<RetrievedMemory>> {
        let mut request = retrieve.into_request()?;
        debug!(
            "retrieving memories (engine={engine}, similarity={}, filter={:?}, groups={})",
            request.similarity_search_params.is_some(),
            request.filter,
            request.filter_groups.len()
        );

        if request.similarity_search_params.is_some() {
            let response = self.api.retrieve_memories(engine, &request).await?;
            return Ok(response.retrieved_memories);
        }

        let mut retrieved = Vec::new();
        let mut page_token = None;
        loop {
            request.simple_retrieval_params = Some(SimpleRetrievalParams {
                page_size: Some(COLLECT_PAGE_SIZE),
                page_token,
            });
            let response = self.api.retrieve_memories(engine, &request).await?;
            retrieved.extend(response.retrieved_memories);
            if response.next_page_token.is_empty() {
                break;
            }
            page_token = Some(response.next_page_token);
        }
        Ok(retrieved)
    }

    // Deletion.

    /// Delete one memory. Its revisions stay listable for the retention window.
    pub async fn delete_memory(&self, name: &MemoryName) -> Result<()> {
        info!("deleting memory (name={name})");
        let operation = self.api.delete_memory(name).await?;
        let _: Empty = self.pending(operation).wait().await?;
        Ok(())
    }

    /// Count (dry run) or delete every memory matching the selection.
    pub async fn purge_memories(&self, engine: &EngineName, purge: Purge) -> Result<PurgeOutcome> {
        let request = purge.into_request()?;
        info!(
            "purge memories (engine={engine}, force={}, filter={:?}, groups={})",
            request.force,
            request.filter,
            request.filter_groups.len()
        );
        let executed = request.force;
        let operation = self.api.purge_memories(engine, &request).await?;
        let response: PurgeMemoriesResponse = self.pending(operation).wait().await?;
        info!(
            "purge finished (purge_count={}, executed={executed})",
            response.purge_count
        );
        Ok(PurgeOutcome {
            purge_count: response.purge_count,
            executed,
        })
    }

    // Revisions.

    /// All revisions of a memory, newest first. `labels` narrows by revision
    /// labels (e.g. `SystemFilter::label_eq`).
    pub async fn list_revisions(
        &self,
        memory: &MemoryName,
        labels: Option<&SystemFilter>,
    ) -> Result<Vec<MemoryRevision>> {
        let mut page = collect_page(labels.map(SystemFilter::render));
        let mut revisions = Vec::new();
        loop {
            let response = self.api.list_revisions(memory, &page).await?;
            revisions.extend(response.memory_revisions);
            if response.next_page_token.is_empty() {
                break;
            }
            page.page_token = Some(response.next_page_token);
        }
        revisions.sort_by_key(|revision| Reverse(revision.create_time));
        Ok(revisions)
    }

    pub async fn get_revision(&self, name: &RevisionName) -> Result<MemoryRevision> {
        self.api.get_revision(name).await
    }

    /// Restore the fact recorded by `revision_id`. The rollback itself is
    /// appended as a new revision.
    pub async fn rollback_memory(&self, memory: &MemoryName, revision_id: &str) -> Result<()> {
        if revision_id.trim().is_empty() {
            return Err(MemoryBankError::invalid("revision id must not be empty"));
        }
        info!("rolling back memory (name={memory}, revision={revision_id})");
        let request = RollbackMemoryRequest {
            target_revision_id: revision_id.to_string(),
        };
        let operation = self.api.rollback_memory(memory, &request).await?;
        let _: Empty = self.pending(operation).wait().await?;
        Ok(())
    }

    // Metadata.

    /// Replace a memory's metadata. The fact cannot be edited this way.
    pub async fn update_memory_metadata(
        &self,
        memory: &MemoryName,
        metadata: Metadata,
    ) -> Result<Memory> {
        debug!(
            "updating memory metadata (name={memory}, keys={})",
            metadata.len()
        );
        let patch = Memory {
            metadata,
            ..Memory::default()
        };
        let operation = self.api.update_memory(memory, &patch, "metadata").await?;
        self.pending(operation).wait().await
    }
}

fn collect_page(filter: Option<String>) -> PageRequest {
    PageRequest {
        page_size: Some(COLLECT_PAGE_SIZE),
        page_token: None,
        filter,
    }
}

fn validate_context(spec: &ContextSpec) -> Result<()> {
    if let Some(config) = &spec.memory_bank_config {
        config.validate().map_err(MemoryBankError::InvalidRequest)?;
    }
    Ok(())
}
