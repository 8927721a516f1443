//! Public SDK surface for the Agent Engine memory bank.
//!
//! This crate re-exports the client, config, and wire types, and provides a
//! small initialization helper to keep consumer setup consistent.

/// Re-export for convenience.
pub use membank_rs_client as client;
/// Re-export for convenience.
pub use membank_rs_config as config;
/// Re-export for convenience.
pub use membank_rs_protocol as protocol;

pub use membank_rs_client::{
    CreateMemory, GenerateMemories, MemoryBankClient, MemoryBankError, Purge, PurgeOutcome,
    Retrieve,
};

#[inline]
/// Initialize logging using env_logger if the "logging" feature is enabled.
///
/// This is a no-op if the feature is not enabled. Binaries are still expected
/// to call this early in startup to ensure log output is wired up.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::builder()
            .format_timestamp_millis()
            .parse_default_env()
            .try_init();
    }
}
