//! Shared data model, configuration, error taxonomy, and cancellation
//! primitives for the research execution core. No I/O lives here: every
//! other workspace crate depends on this one, never the other way around.

pub mod cancel;
pub mod config;
pub mod error;
pub mod model;

pub use cancel::CancellationToken;
pub use config::Config;
pub use error::{Error, Result};
