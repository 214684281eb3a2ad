//! Shared startup plumbing for the research execution core's worker
//! binaries (research worker, delivery worker, scheduler, reconciler,
//! admin). Each binary under `src/bin/` calls [`bootstrap::bootstrap`] and
//! then drives its own loop or server from the returned [`bootstrap::Bootstrap`].

pub mod bootstrap;
