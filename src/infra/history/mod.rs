//! History sink backends. The in-memory sink lives in `core::history`.

pub mod jsonl;

pub use jsonl::JsonlHistorySink;
