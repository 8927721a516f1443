//! Wire types for the Agent Engine memory bank API.
//!
//! Resources serialize with the service's camelCase JSON field names. Filters
//! are typed and render to the service's filter syntax.

mod content;
mod engine;
mod error;
pub mod filter;
mod memory;
pub mod names;
mod operation;
mod requests;
mod session;

pub use content::{Blob, Content, FileData, Part};
pub use engine::{
    ContextSpec, ContextSpecBuilder, CustomTopic, CustomizationConfig, ManagedTopicConfig,
    MemoryBankConfig, MemoryTopicConfig, ReasoningEngine, SimilaritySearchConfig,
    embedding_model_resource,
};
pub use error::{FilterError, NameError};
pub use memory::{
    DEFAULT_REVISION_TTL, DELETED_REVISION_WINDOW, ExtractedMemory, ManagedTopic, Memory,
    MemoryRevision, MemoryTopic, Metadata, MetadataValue, Scope, duration_to_wire, user_scope,
};
pub use names::{EngineName, LocationName, MemoryName, RevisionName, SessionName};
pub use operation::{
    Empty, GenerateMemoriesResponse, GeneratedMemory, GenerationAction, Operation,
    PurgeMemoriesResponse, Status,
};
pub use requests::{
    DirectContentsSource, DirectEvent, GenerateMemoriesRequest, GenerationSource,
    ListEventsResponse, ListMemoriesResponse, ListRevisionsResponse, PageRequest,
    PurgeMemoriesRequest, RetrieveMemoriesRequest, RetrieveMemoriesResponse, RetrievedMemory,
    RollbackMemoryRequest, SimilaritySearchParams, SimpleRetrievalParams, VertexSessionSource,
};
pub use session::{Session, SessionEvent};
