//! Scheduling clock (§4.G), research/delivery job handlers (§4.H/§4.I),
//! and Recovery Reconciler (§4.J) for the research execution core.

pub mod clock;
pub mod jobs;
pub mod reconciler;
pub mod tick;
pub mod worker;

pub use clock::calculate_next_run_at;
pub use reconciler::{run_once as reconcile_once, ReconcileReport};
pub use tick::{Scheduler, TickReport};
pub use worker::{handle_delivery_job, handle_research_job, WorkerContext};
