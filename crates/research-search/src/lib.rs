//! Search Provider Abstraction (§4.B) and Multi-Provider Orchestrator
//! (§4.E): a vendor-neutral `SearchProvider` trait, shared HTTP/retry/
//! rate-limit plumbing for vendor implementations, and the health-tracked
//! failover wrapper.

pub mod error;
pub mod filters;
pub mod http;
pub mod multi;
pub mod provider;
pub mod rate_limit;
pub mod result;
pub mod retry;

pub use error::SearchError;
pub use filters::{DateRange, Freshness, SafeSearch, SearchFilters};
pub use http::json_with_limit;
pub use multi::{MultiProvider, MultiProviderConfig};
pub use provider::SearchProvider;
pub use rate_limit::RateLimiter;
pub use result::{SearchResponse, SearchResultItem};
