//! Forge detection and upstream version discovery.
//!
//! A [`providers::Provider`] is polymorphic over detecting a forge from a
//! URL, parsing owner/repo, enumerating releases and tags, and deriving a
//! default URL template and version filter. [`registry::ForgeRegistry`]
//! holds every known provider in fixed priority order and tries each in
//! turn, the way `shipper-registry`'s `RegistryClient` wraps a single
//! upstream API behind a small typed client.
//!
//! # Example
//!
//! ```no_run
//! # async fn run() -> anyhow::Result<()> {
//! use ldf_forge::ForgeRegistry;
//!
//! let registry = ForgeRegistry::new();
//! let provider = registry.detect("https://github.com/torvalds/linux");
//! let repo = provider.parse_repo_info("https://github.com/torvalds/linux")?;
//! let versions = registry.discover_versions(provider.forge_type(), &repo).await?;
//! # Ok(())
//! # }
//! ```

mod providers;
mod registry;
mod version;

pub use providers::{
    DETECT_TIMEOUT, DiscoveredVersion, FilterSource, GenericProvider, GitHubProvider,
    GitLabProvider, GiteaFamilyProvider, PREVIEW_TIMEOUT, Provider, RepoInfo,
};
pub use registry::ForgeRegistry;
pub use version::{compare, extract_exclude_patterns, is_prerelease, normalize, sort_descending, FALLBACK_EXCLUDE_FILTER};
