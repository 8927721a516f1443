//! Typed client for the Agent Engine memory bank.
//!
//! `MemoryBankClient` wraps a `MemoryBankApi` implementation (the REST
//! transport in production) and adds validation, pagination, and waiting on
//! long-running operations.

pub mod api;
pub mod auth;
pub mod client;
pub mod error;
pub mod http;
pub mod operation;
pub mod params;

/// Raw service seam.
pub use api::MemoryBankApi;
/// Access-token sources.
pub use auth::{
    ChainedToken, GcloudToken, MetadataServerToken, StaticToken, TokenProvider, token_provider,
};
/// High-level client.
pub use client::MemoryBankClient;
/// Client error type.
pub use error::{MemoryBankError, Result};
/// REST transport.
pub use http::HttpMemoryBank;
/// Long-running operation handling.
pub use operation::{PendingOperation, PollOptions};
/// Call arguments.
pub use params::{CreateMemory, GenerateMemories, Purge, PurgeOutcome, Retrieve};
