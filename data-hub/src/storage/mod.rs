//! Storage layer for the data hub
//!
//! TimescaleDB storage for daily bars, corporate actions, and quality
//! findings: idempotent upserts, range scans, month-bucket aggregates, and
//! migrations. Each store is the sole writer of its table.

mod actions;
mod quality;
mod repository;
mod timescale;

pub use actions::*;
pub use quality::*;
pub use repository::*;
pub use timescale::*;
