//! Shared configuration types for regionflags.
//!
//! Everything here is plain data with serde support so the engine, the
//! replay tool and any embedding host agree on one configuration format.

pub mod config;
pub mod formatting;

pub use config::{EngineConfig, MessageCatalog};
