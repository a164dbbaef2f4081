//! Download job planning and a worker-pool executor.
//!
//! [`plan`] turns a distribution's resolved artifact requests into a
//! deduplicated set of [`ldf_types::DownloadJob`]s, applying URL templating
//! and mirror rewrite. [`executor`] runs those jobs through a fixed worker
//! pool with per-job retry/backoff and cooperative cancellation.

mod executor;
mod plan;

pub use executor::{execute_job, spawn_worker_pool, CancellationRegistry, JobRepo};
pub use plan::{
    apply_mirror_rewrite, cancel_job, create_jobs_for_distribution, retry_job,
    substitute_template, ArtifactRequest, TemplateVars,
};
