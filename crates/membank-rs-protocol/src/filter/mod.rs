//! Typed filters for retrieve, purge, and revision listing.
//!
//! Two mechanisms compose with a logical AND when both are supplied: metadata
//! filter groups (DNF over user metadata) and a system-field filter string.

mod eval;
mod metadata;
mod parser;
mod system;

pub use eval::FilterTarget;
pub use metadata::{FilterGroup, MetadataCondition, MetadataOp, matches_any};
pub use system::{CompareOp, Field, Literal, SystemFilter};
