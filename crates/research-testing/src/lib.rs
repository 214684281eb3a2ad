//! In-memory fakes for the research execution core's capability traits:
//! [`MockSearchProvider`], [`MockResearchLlm`], [`MockEmailSender`],
//! [`InMemoryProjectStore`], [`InMemoryQueue`]. Used by scheduler,
//! reconciler, and worker tests that would otherwise need a live
//! Postgres/Redis/vendor-API stack.

mod in_memory_queue;
mod in_memory_store;
mod mock_email;
mod mock_llm;
mod mock_search;

pub use in_memory_queue::InMemoryQueue;
pub use in_memory_store::InMemoryProjectStore;
pub use mock_email::MockEmailSender;
pub use mock_llm::MockResearchLlm;
pub use mock_search::MockSearchProvider;

/// Convenience re-exports for test modules that need several fakes at once.
pub mod prelude {
    pub use crate::{InMemoryProjectStore, InMemoryQueue, MockEmailSender, MockResearchLlm, MockSearchProvider};
}
