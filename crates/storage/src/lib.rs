//! Run log sinks for PolyTune.
//!
//! This crate provides a trait-based, append-only sink for per-generation
//! records with a JSON-lines file implementation.

#![warn(missing_docs)]

pub mod trait_;
pub mod jsonl_sink;
pub mod memory;

pub use trait_::{GenerationSink, SinkError, Result};
pub use jsonl_sink::{JsonlSink, read_records};
pub use memory::MemorySink;
