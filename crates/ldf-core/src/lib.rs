//! Aggregator crate wiring forge discovery, the version cache, source
//! resolution, download planning/execution, access control, settings, and
//! audit logging into the orchestration functions the HTTP control plane
//! calls into.
//!
//! Generalizes the aggregator pattern of `shipper`'s crate root: plain
//! modules re-exporting their lower crates, plus a couple of small
//! orchestration functions (here, [`sync::run_sync`] and
//! [`enqueue::plan_distribution_downloads`]) that play the role
//! `shipper::engine`'s `run_preflight`/`run_publish` play for cargo
//! publishing — explicit dependencies in, `anyhow::Result` out, no hidden
//! global state.

mod enqueue;
mod sync;

pub use enqueue::{plan_distribution_downloads, EnqueuePlan, UnresolvedComponent};
pub use sync::{run_sync, SyncOutcome};

pub use ldf_access as access;
pub use ldf_audit as audit;
pub use ldf_download as download;
pub use ldf_filter as filter;
pub use ldf_forge as forge;
pub use ldf_retry as retry;
pub use ldf_settings as settings;
pub use ldf_source as source;
pub use ldf_storage as storage;
pub use ldf_types as types;
pub use ldf_version_cache as version_cache;
