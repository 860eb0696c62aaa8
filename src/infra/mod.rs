//! Infrastructure adapters: state stores, object stores and history sinks.

pub mod history;
pub mod object_store;
pub mod state;

pub use history::JsonlHistorySink;
pub use object_store::{FileSystemObjectStore, InMemoryObjectStore};
pub use state::{InMemoryStateStore, LocalStateStore, RemoteStateStore};
