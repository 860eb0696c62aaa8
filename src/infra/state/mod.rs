//! Durable state store backends.

pub mod local;
pub mod memory;
pub mod remote;

pub use local::LocalStateStore;
pub use memory::InMemoryStateStore;
pub use remote::RemoteStateStore;
