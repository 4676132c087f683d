//! Infrastructure: stage queues and in-memory collaborators.

pub mod memory;
pub mod queue;

pub use memory::{InMemoryContentStore, InMemoryPreloadProvider};
pub use queue::StageQueues;
