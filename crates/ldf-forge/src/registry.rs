//! Forge detection registry: tries providers in fixed priority order.

use std::time::Duration;

use ldf_types::ForgeType;

use crate::providers::{
    DiscoveredVersion, FilterSource, GenericProvider, GitHubProvider, GitLabProvider,
    GiteaFamilyProvider, Provider, RepoInfo,
};

/// Holds every known provider in the priority order `detect` is tried in:
/// GitHub, Codeberg, GitLab, Gitea, Forgejo, then Generic as the catch-all.
pub struct ForgeRegistry {
    providers: Vec<Box<dyn Provider>>,
    client: reqwest::Client,
}

impl ForgeRegistry {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("ldf-forge/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            providers: vec![
                Box::new(GitHubProvider::default()),
                Box::new(GiteaFamilyProvider::codeberg()),
                Box::new(GitLabProvider::default()),
                Box::new(GiteaFamilyProvider::gitea()),
                Box::new(GiteaFamilyProvider::forgejo()),
                Box::new(GenericProvider::default()),
            ],
            client,
        }
    }

    /// Detects the forge for a URL by trying providers in priority order.
    /// Generic always matches last, so this never returns `None`.
    pub fn detect(&self, url: &str) -> &dyn Provider {
        self.providers
            .iter()
            .find(|p| p.detect(url))
            .map(|p| p.as_ref())
            .expect("GenericProvider::detect always returns true")
    }

    /// Looks a provider up by its persisted [`ForgeType`]. Unknown/unmapped
    /// types fall back to Generic rather than returning `None`.
    pub fn get_provider(&self, forge_type: ForgeType) -> &dyn Provider {
        self.providers
            .iter()
            .find(|p| p.forge_type() == forge_type)
            .map(|p| p.as_ref())
            .unwrap_or_else(|| {
                self.providers
                    .iter()
                    .find(|p| p.forge_type() == ForgeType::Generic)
                    .map(|p| p.as_ref())
                    .expect("generic provider is always registered")
            })
    }

    pub async fn discover_versions(
        &self,
        forge_type: ForgeType,
        repo: &RepoInfo,
    ) -> anyhow::Result<Vec<DiscoveredVersion>> {
        self.get_provider(forge_type)
            .discover_versions(&self.client, repo)
            .await
    }

    pub async fn get_defaults(
        &self,
        url: &str,
    ) -> anyhow::Result<(ForgeType, RepoInfo, String, String, FilterSource)> {
        let provider = self.detect(url);
        let (repo, template, filter, source) = provider.get_defaults(&self.client, url).await?;
        Ok((provider.forge_type(), repo, template, filter, source))
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

impl Default for ForgeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_prefers_codeberg_over_generic() {
        let registry = ForgeRegistry::new();
        let provider = registry.detect("https://codeberg.org/forgejo/forgejo");
        assert_eq!(provider.forge_type(), ForgeType::Codeberg);
    }

    #[test]
    fn detect_falls_back_to_generic() {
        let registry = ForgeRegistry::new();
        let provider = registry.detect("https://cdn.kernel.org/pub/linux/kernel/v6.x/");
        assert_eq!(provider.forge_type(), ForgeType::Generic);
    }

    #[test]
    fn get_provider_never_returns_a_missing_type() {
        let registry = ForgeRegistry::new();
        assert_eq!(registry.get_provider(ForgeType::GitHub).forge_type(), ForgeType::GitHub);
        assert_eq!(registry.get_provider(ForgeType::Generic).forge_type(), ForgeType::Generic);
    }
}
