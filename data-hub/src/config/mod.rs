//! Configuration for the data hub

mod settings;

pub use settings::*;
