//! Object store backends for the remote state tier.

pub mod filesystem;
pub mod memory;

pub use filesystem::FileSystemObjectStore;
pub use memory::InMemoryObjectStore;
