//! Canonical record types for the data hub
//!
//! Provider-specific payloads are normalized to these types before storage.
//! Validation lives next to the types so every write path enforces the same
//! invariants.

mod actions;
mod bars;
mod quality;

pub use actions::*;
pub use bars::*;
pub use quality::*;
