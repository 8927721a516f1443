//! Service seam: one method per REST call.

use crate::error::Result;
use async_trait::async_trait;
use membank_rs_protocol::{
    EngineName, GenerateMemoriesRequest, ListEventsResponse, ListMemoriesResponse,
    ListRevisionsResponse, LocationName, Memory, MemoryName, MemoryRevision, Operation,
    PageRequest, PurgeMemoriesRequest, ReasoningEngine, RetrieveMemoriesRequest,
    RetrieveMemoriesResponse, RevisionName, RollbackMemoryRequest, Session, SessionEvent,
    SessionName,
};

/// Raw memory bank API. Mutating calls return the long-running operation the
/// service started; callers wrap it in a `PendingOperation` to wait.
///
/// `HttpMemoryBank` talks to the real service; test doubles implement the
/// same trait.
#[async_trait]
pub trait MemoryBankApi: Send + Sync {
    async fn create_engine(
        &self,
        location: &LocationName,
        engine: &ReasoningEngine,
    ) -> Result<Operation>;

    async fn get_engine(&self, engine: &EngineName) -> Result<ReasoningEngine>;

    /// Patch the fields named by `update_mask` (comma-separated, camelCase).
    async fn update_engine(
        &self,
        engine: &EngineName,
        patch: &ReasoningEngine,
        update_mask: &str,
    ) -> Result<Operation>;

    async fn create_session(&self, engine: &EngineName, session: &Session) -> Result<Operation>;

    async fn append_event(&self, session: &SessionName, event: &SessionEvent) -> Result<()>;

    async fn list_events(
        &self,
        session: &SessionName,
        page: &PageRequest,
    ) -> Result<ListEventsResponse>;

    async fn create_memory(&self, engine: &EngineName, memory: &Memory) -> Result<Operation>;

    async fn generate_memories(
        &self,
        engine: &EngineName,
        request: &GenerateMemoriesRequest,
    ) -> Result<Operation>;

    async fn get_memory(&self, name: &MemoryName) -> Result<Memory>;

    async fn list_memories(
        &self,
        engine: &EngineName,
        page: &PageRequest,
    ) -> Result<ListMemoriesResponse>;

    async fn retrieve_memories(
        &self,
        engine: &EngineName,
        request: &RetrieveMemoriesRequest,
    ) -> Result<RetrieveMemoriesResponse>;

    /// Patch the fields named by `update_mask`.
    async fn update_memory(
        &self,
        name: &MemoryName,
        patch: &Memory,
        update_mask: &str,
    ) -> Result<Operation>;

    async fn delete_memory(&self, name: &MemoryName) -> Result<Operation>;

    async fn purge_memories(
        &self,
        engine: &EngineName,
        request: &PurgeMemoriesRequest,
    ) -> Result<Operation>;

    async fn list_revisions(
        &self,
        memory: &MemoryName,
        page: &PageRequest,
    ) -> Result<ListRevisionsResponse>;

    async fn get_revision(&self, name: &RevisionName) -> Result<MemoryRevision>;

    async fn rollback_memory(
        &self,
        memory: &MemoryName,
        request: &RollbackMemoryRequest,
    ) -> Result<Operation>;

    /// Fetch the latest snapshot of an operation by its full name.
    async fn get_operation(&self, name: &str) -> Result<Operation>;
}
