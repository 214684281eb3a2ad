//! Project-store interface (§6.4): typed reads/writes by `(userId,
//! projectId)` plus the collection-wide predicate queries the scheduler
//! and reconciler drive their ticks from.

pub mod error;
pub mod postgres;
pub mod provider;

pub use error::StoreError;
pub use postgres::PostgresProjectStore;
pub use provider::ProjectStore;
