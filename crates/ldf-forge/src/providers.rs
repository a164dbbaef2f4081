//! The `Provider` trait and its concrete forge implementations.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ldf_types::ForgeType;
use serde::Deserialize;

use crate::version;

/// Bound applied to forge discovery/default-resolution calls.
pub const DETECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Bound applied to the heavier "preview" discovery call a client can trigger.
pub const PREVIEW_TIMEOUT: Duration = Duration::from_secs(60);

const MAX_PAGES: u32 = 100;
const PER_PAGE: u32 = 100;

/// Owner/repo parsed out of an upstream URL, plus the host it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoInfo {
    pub owner: String,
    pub repo: String,
    pub host: String,
    pub base_url: String,
}

/// A single upstream version as seen by a provider, before it's persisted
/// as a `SourceVersion`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredVersion {
    pub tag: String,
    pub version: String,
    pub is_prerelease: bool,
    pub release_date: Option<DateTime<Utc>>,
}

/// Where a `default_version_filter` expression came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterSource {
    /// Built from prereleases actually observed on the upstream.
    Upstream,
    /// The fixed fallback expression, used when discovery failed.
    Default,
}

impl FilterSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterSource::Upstream => "upstream",
            FilterSource::Default => "default",
        }
    }
}

/// A forge a source's URL might point to.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;
    fn forge_type(&self) -> ForgeType;
    fn detect(&self, url: &str) -> bool;
    fn parse_repo_info(&self, url: &str) -> Result<RepoInfo>;
    fn default_url_template(&self, repo: &RepoInfo) -> String;

    async fn discover_versions(
        &self,
        client: &reqwest::Client,
        repo: &RepoInfo,
    ) -> Result<Vec<DiscoveredVersion>>;

    /// Resolves `{url_template, version_filter, filter_source}` for a freshly
    /// added source. Falls back to [`version::FALLBACK_EXCLUDE_FILTER`] with
    /// `filter_source = "default"` when discovery fails.
    async fn get_defaults(
        &self,
        client: &reqwest::Client,
        url: &str,
    ) -> Result<(RepoInfo, String, String, FilterSource)> {
        let repo = self.parse_repo_info(url)?;
        let template = self.default_url_template(&repo);

        match self.discover_versions(client, &repo).await {
            Ok(versions) => {
                let observed: Vec<String> = versions.iter().map(|v| v.tag.clone()).collect();
                match version::extract_exclude_patterns(&observed) {
                    Some(expr) => Ok((repo, template, expr, FilterSource::Upstream)),
                    None => Ok((
                        repo,
                        template,
                        version::FALLBACK_EXCLUDE_FILTER.to_string(),
                        FilterSource::Upstream,
                    )),
                }
            }
            Err(_) => Ok((
                repo,
                template,
                version::FALLBACK_EXCLUDE_FILTER.to_string(),
                FilterSource::Default,
            )),
        }
    }
}

fn url_host(url: &str) -> Result<String> {
    let parsed = url::Url::parse(url).context("invalid upstream URL")?;
    parsed
        .host_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("upstream URL has no host: {url}"))
}

fn base_url_of(url: &str) -> Result<String> {
    let parsed = url::Url::parse(url).context("invalid upstream URL")?;
    Ok(format!(
        "{}://{}",
        parsed.scheme(),
        parsed.host_str().unwrap_or_default()
    ))
}

fn parse_owner_repo(url: &str) -> Result<(String, String)> {
    let parsed = url::Url::parse(url).context("invalid upstream URL")?;
    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();
    if segments.len() < 2 {
        return Err(anyhow!("URL does not contain an owner/repo path: {url}"));
    }
    let owner = segments[0].to_string();
    let repo = segments[1].trim_end_matches(".git").to_string();
    Ok((owner, repo))
}

// ---------------------------------------------------------------------
// GitHub
// ---------------------------------------------------------------------

pub struct GitHubProvider {
    client_timeout: Duration,
}

impl Default for GitHubProvider {
    fn default() -> Self {
        Self {
            client_timeout: DETECT_TIMEOUT,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GithubRelease {
    tag_name: String,
    draft: bool,
    prerelease: bool,
    published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct GithubTag {
    name: String,
}

#[async_trait]
impl Provider for GitHubProvider {
    fn name(&self) -> &'static str {
        "github"
    }

    fn forge_type(&self) -> ForgeType {
        ForgeType::GitHub
    }

    fn detect(&self, url: &str) -> bool {
        url_host(url).map(|h| h.contains("github.com")).unwrap_or(false)
    }

    fn parse_repo_info(&self, url: &str) -> Result<RepoInfo> {
        let (owner, repo) = parse_owner_repo(url)?;
        Ok(RepoInfo {
            owner,
            repo,
            host: url_host(url)?,
            base_url: base_url_of(url)?,
        })
    }

    fn default_url_template(&self, repo: &RepoInfo) -> String {
        format!("{}/archive/refs/tags/{{tag}}.tar.gz", repo.base_url_path(&repo.owner, &repo.repo))
    }

    async fn discover_versions(
        &self,
        client: &reqwest::Client,
        repo: &RepoInfo,
    ) -> Result<Vec<DiscoveredVersion>> {
        let mut by_tag: std::collections::HashMap<String, DiscoveredVersion> =
            std::collections::HashMap::new();

        let mut page = 1u32;
        loop {
            if page > MAX_PAGES {
                break;
            }
            let url = format!(
                "https://api.github.com/repos/{}/{}/releases?per_page={PER_PAGE}&page={page}",
                repo.owner, repo.repo
            );
            let response = client
                .get(&url)
                .timeout(self.client_timeout)
                .send()
                .await
                .context("failed to fetch github releases")?;

            if response.status() == reqwest::StatusCode::FORBIDDEN {
                break;
            }
            if !response.status().is_success() {
                return Err(anyhow!("github releases returned {}", response.status()));
            }

            let releases: Vec<GithubRelease> =
                response.json().await.context("failed to parse github releases")?;
            let len = releases.len();

            for release in releases {
                if release.draft {
                    continue;
                }
                by_tag.insert(
                    release.tag_name.clone(),
                    DiscoveredVersion {
                        version: version::normalize(&release.tag_name).to_string(),
                        tag: release.tag_name.clone(),
                        is_prerelease: release.prerelease,
                        release_date: release.published_at,
                    },
                );
            }

            if (len as u32) < PER_PAGE {
                break;
            }
            page += 1;
        }

        let mut page = 1u32;
        loop {
            if page > MAX_PAGES {
                break;
            }
            let url = format!(
                "https://api.github.com/repos/{}/{}/tags?per_page={PER_PAGE}&page={page}",
                repo.owner, repo.repo
            );
            let response = client
                .get(&url)
                .timeout(self.client_timeout)
                .send()
                .await
                .context("failed to fetch github tags")?;

            if response.status() == reqwest::StatusCode::FORBIDDEN {
                break;
            }
            if !response.status().is_success() {
                return Err(anyhow!("github tags returned {}", response.status()));
            }

            let tags: Vec<GithubTag> =
                response.json().await.context("failed to parse github tags")?;
            let len = tags.len();

            for tag in tags {
                by_tag.entry(tag.name.clone()).or_insert_with(|| DiscoveredVersion {
                    version: version::normalize(&tag.name).to_string(),
                    is_prerelease: version::is_prerelease(&tag.name),
                    release_date: None,
                    tag: tag.name,
                });
            }

            if (len as u32) < PER_PAGE {
                break;
            }
            page += 1;
        }

        let mut versions: Vec<DiscoveredVersion> = by_tag.into_values().collect();
        let mut tags: Vec<String> = versions.iter().map(|v| v.tag.clone()).collect();
        version::sort_descending(&mut tags);
        versions.sort_by_key(|v| tags.iter().position(|t| t == &v.tag).unwrap_or(usize::MAX));
        Ok(versions)
    }
}

impl RepoInfo {
    /// `https://github.com/{owner}/{repo}`-shaped URL this repo lives at.
    pub fn base_url_path(&self, owner: &str, repo: &str) -> String {
        format!("{}/{}/{}", self.base_url, owner, repo)
    }
}

// ---------------------------------------------------------------------
// GitLab
// ---------------------------------------------------------------------

pub struct GitLabProvider {
    client_timeout: Duration,
}

impl Default for GitLabProvider {
    fn default() -> Self {
        Self {
            client_timeout: DETECT_TIMEOUT,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GitlabRelease {
    tag_name: String,
    upcoming_release: Option<bool>,
    released_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct GitlabTag {
    name: String,
}

#[async_trait]
impl Provider for GitLabProvider {
    fn name(&self) -> &'static str {
        "gitlab"
    }

    fn forge_type(&self) -> ForgeType {
        ForgeType::GitLab
    }

    fn detect(&self, url: &str) -> bool {
        url_host(url)
            .map(|h| h == "gitlab.com" || h.starts_with("gitlab."))
            .unwrap_or(false)
    }

    fn parse_repo_info(&self, url: &str) -> Result<RepoInfo> {
        let (owner, repo) = parse_owner_repo(url)?;
        Ok(RepoInfo {
            owner,
            repo,
            host: url_host(url)?,
            base_url: base_url_of(url)?,
        })
    }

    fn default_url_template(&self, repo: &RepoInfo) -> String {
        format!(
            "{}/{}/{}/-/archive/{{tag}}/{}-{{tag}}.tar.gz",
            repo.base_url, repo.owner, repo.repo, repo.repo
        )
    }

    async fn discover_versions(
        &self,
        client: &reqwest::Client,
        repo: &RepoInfo,
    ) -> Result<Vec<DiscoveredVersion>> {
        let project_path = urlencoding::encode(&format!("{}/{}", repo.owner, repo.repo)).into_owned();
        let mut by_tag: std::collections::HashMap<String, DiscoveredVersion> =
            std::collections::HashMap::new();

        let mut page = 1u32;
        loop {
            if page > MAX_PAGES {
                break;
            }
            let url = format!(
                "{}/api/v4/projects/{project_path}/releases?per_page={PER_PAGE}&page={page}",
                repo.base_url
            );
            let response = client
                .get(&url)
                .timeout(self.client_timeout)
                .send()
                .await
                .context("failed to fetch gitlab releases")?;

            if response.status() == reqwest::StatusCode::FORBIDDEN {
                break;
            }
            if !response.status().is_success() {
                return Err(anyhow!("gitlab releases returned {}", response.status()));
            }

            let releases: Vec<GitlabRelease> =
                response.json().await.context("failed to parse gitlab releases")?;
            let len = releases.len();

            for release in releases {
                by_tag.insert(
                    release.tag_name.clone(),
                    DiscoveredVersion {
                        version: version::normalize(&release.tag_name).to_string(),
                        is_prerelease: release.upcoming_release.unwrap_or(false),
                        release_date: release.released_at,
                        tag: release.tag_name,
                    },
                );
            }

            if (len as u32) < PER_PAGE {
                break;
            }
            page += 1;
        }

        let mut page = 1u32;
        loop {
            if page > MAX_PAGES {
                break;
            }
            let url = format!(
                "{}/api/v4/projects/{project_path}/repository/tags?per_page={PER_PAGE}&page={page}",
                repo.base_url
            );
            let response = client
                .get(&url)
                .timeout(self.client_timeout)
                .send()
                .await
                .context("failed to fetch gitlab tags")?;

            if response.status() == reqwest::StatusCode::FORBIDDEN {
                break;
            }
            if !response.status().is_success() {
                return Err(anyhow!("gitlab tags returned {}", response.status()));
            }

            let tags: Vec<GitlabTag> =
                response.json().await.context("failed to parse gitlab tags")?;
            let len = tags.len();

            for tag in tags {
                by_tag.entry(tag.name.clone()).or_insert_with(|| DiscoveredVersion {
                    version: version::normalize(&tag.name).to_string(),
                    is_prerelease: version::is_prerelease(&tag.name),
                    release_date: None,
                    tag: tag.name,
                });
            }

            if (len as u32) < PER_PAGE {
                break;
            }
            page += 1;
        }

        let mut versions: Vec<DiscoveredVersion> = by_tag.into_values().collect();
        let mut tags: Vec<String> = versions.iter().map(|v| v.tag.clone()).collect();
        version::sort_descending(&mut tags);
        versions.sort_by_key(|v| tags.iter().position(|t| t == &v.tag).unwrap_or(usize::MAX));
        Ok(versions)
    }
}

// ---------------------------------------------------------------------
// Gitea family (Gitea, Codeberg, Forgejo share the Gitea v1 API)
// ---------------------------------------------------------------------

pub struct GiteaFamilyProvider {
    provider_name: &'static str,
    forge_type: ForgeType,
    host_substrings: &'static [&'static str],
    client_timeout: Duration,
}

impl GiteaFamilyProvider {
    pub fn codeberg() -> Self {
        Self {
            provider_name: "codeberg",
            forge_type: ForgeType::Codeberg,
            host_substrings: &["codeberg.org"],
            client_timeout: DETECT_TIMEOUT,
        }
    }

    pub fn forgejo() -> Self {
        Self {
            provider_name: "forgejo",
            forge_type: ForgeType::Forgejo,
            host_substrings: &["forgejo"],
            client_timeout: DETECT_TIMEOUT,
        }
    }

    pub fn gitea() -> Self {
        Self {
            provider_name: "gitea",
            forge_type: ForgeType::Gitea,
            host_substrings: &["gitea"],
            client_timeout: DETECT_TIMEOUT,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GiteaRelease {
    tag_name: String,
    draft: bool,
    prerelease: bool,
    published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct GiteaTag {
    name: String,
}

#[async_trait]
impl Provider for GiteaFamilyProvider {
    fn name(&self) -> &'static str {
        self.provider_name
    }

    fn forge_type(&self) -> ForgeType {
        self.forge_type
    }

    fn detect(&self, url: &str) -> bool {
        url_host(url)
            .map(|h| self.host_substrings.iter().any(|s| h.contains(s)))
            .unwrap_or(false)
    }

    fn parse_repo_info(&self, url: &str) -> Result<RepoInfo> {
        let (owner, repo) = parse_owner_repo(url)?;
        Ok(RepoInfo {
            owner,
            repo,
            host: url_host(url)?,
            base_url: base_url_of(url)?,
        })
    }

    fn default_url_template(&self, repo: &RepoInfo) -> String {
        format!("{}/archive/{{tag}}.tar.gz", repo.base_url_path(&repo.owner, &repo.repo))
    }

    async fn discover_versions(
        &self,
        client: &reqwest::Client,
        repo: &RepoInfo,
    ) -> Result<Vec<DiscoveredVersion>> {
        let mut by_tag: std::collections::HashMap<String, DiscoveredVersion> =
            std::collections::HashMap::new();

        let mut page = 1u32;
        loop {
            if page > MAX_PAGES {
                break;
            }
            let url = format!(
                "{}/api/v1/repos/{}/{}/releases?limit={PER_PAGE}&page={page}",
                repo.base_url, repo.owner, repo.repo
            );
            let response = client
                .get(&url)
                .timeout(self.client_timeout)
                .send()
                .await
                .context("failed to fetch gitea releases")?;

            if response.status() == reqwest::StatusCode::FORBIDDEN {
                break;
            }
            if !response.status().is_success() {
                return Err(anyhow!("gitea releases returned {}", response.status()));
            }

            let releases: Vec<GiteaRelease> =
                response.json().await.context("failed to parse gitea releases")?;
            let len = releases.len();

            for release in releases {
                if release.draft {
                    continue;
                }
                by_tag.insert(
                    release.tag_name.clone(),
                    DiscoveredVersion {
                        version: version::normalize(&release.tag_name).to_string(),
                        is_prerelease: release.prerelease,
                        release_date: release.published_at,
                        tag: release.tag_name,
                    },
                );
            }

            if (len as u32) < PER_PAGE {
                break;
            }
            page += 1;
        }

        let mut page = 1u32;
        loop {
            if page > MAX_PAGES {
                break;
            }
            let url = format!(
                "{}/api/v1/repos/{}/{}/tags?limit={PER_PAGE}&page={page}",
                repo.base_url, repo.owner, repo.repo
            );
            let response = client
                .get(&url)
                .timeout(self.client_timeout)
                .send()
                .await
                .context("failed to fetch gitea tags")?;

            if response.status() == reqwest::StatusCode::FORBIDDEN {
                break;
            }
            if !response.status().is_success() {
                return Err(anyhow!("gitea tags returned {}", response.status()));
            }

            let tags: Vec<GiteaTag> =
                response.json().await.context("failed to parse gitea tags")?;
            let len = tags.len();

            for tag in tags {
                by_tag.entry(tag.name.clone()).or_insert_with(|| DiscoveredVersion {
                    version: version::normalize(&tag.name).to_string(),
                    is_prerelease: version::is_prerelease(&tag.name),
                    release_date: None,
                    tag: tag.name,
                });
            }

            if (len as u32) < PER_PAGE {
                break;
            }
            page += 1;
        }

        let mut versions: Vec<DiscoveredVersion> = by_tag.into_values().collect();
        let mut tags: Vec<String> = versions.iter().map(|v| v.tag.clone()).collect();
        version::sort_descending(&mut tags);
        versions.sort_by_key(|v| tags.iter().position(|t| t == &v.tag).unwrap_or(usize::MAX));
        Ok(versions)
    }
}

// ---------------------------------------------------------------------
// Generic (kernel.org directory scraping, or href-pattern scraping)
// ---------------------------------------------------------------------

pub struct GenericProvider {
    client_timeout: Duration,
}

impl Default for GenericProvider {
    fn default() -> Self {
        Self {
            client_timeout: PREVIEW_TIMEOUT,
        }
    }
}

fn href_version_regex() -> regex::Regex {
    regex::Regex::new(r#"href="[^"]*?v?(\d+\.\d+(?:\.\d+)?(?:-[A-Za-z0-9]+)?)\.(tar\.(?:gz|xz|bz2)|zip)""#)
        .expect("static regex is valid")
}

fn kernel_org_regex() -> regex::Regex {
    regex::Regex::new(r#"linux-(\d+\.\d+(?:\.\d+)?)\.tar\.xz"#).expect("static regex is valid")
}

#[async_trait]
impl Provider for GenericProvider {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn forge_type(&self) -> ForgeType {
        ForgeType::Generic
    }

    fn detect(&self, _url: &str) -> bool {
        // Fallback: always matches, tried last in the registry.
        true
    }

    fn parse_repo_info(&self, url: &str) -> Result<RepoInfo> {
        let host = url_host(url)?;
        let base_url = base_url_of(url)?;
        let (owner, repo) = parse_owner_repo(url).unwrap_or_else(|_| (host.clone(), host.clone()));
        Ok(RepoInfo {
            owner,
            repo,
            host,
            base_url,
        })
    }

    fn default_url_template(&self, repo: &RepoInfo) -> String {
        if repo.host.contains("kernel.org") {
            format!("{}/v{{major_x}}/linux-{{version}}.tar.xz", repo.base_url)
        } else {
            format!("{}/{}-{{version}}.tar.gz", repo.base_url, repo.repo)
        }
    }

    async fn discover_versions(
        &self,
        client: &reqwest::Client,
        repo: &RepoInfo,
    ) -> Result<Vec<DiscoveredVersion>> {
        let response = client
            .get(&repo.base_url)
            .timeout(self.client_timeout)
            .send()
            .await
            .context("failed to fetch generic directory listing")?;

        if !response.status().is_success() {
            return Err(anyhow!("generic listing returned {}", response.status()));
        }

        let body = response.text().await.context("failed to read generic listing body")?;

        let mut seen = std::collections::HashSet::new();
        let mut versions = Vec::new();

        if repo.host.contains("kernel.org") {
            for capture in kernel_org_regex().captures_iter(&body) {
                let version = capture[1].to_string();
                if seen.insert(version.clone()) {
                    versions.push(DiscoveredVersion {
                        is_prerelease: version::is_prerelease(&version),
                        tag: version.clone(),
                        version,
                        release_date: None,
                    });
                }
            }
        } else {
            for capture in href_version_regex().captures_iter(&body) {
                let version = capture[1].to_string();
                if seen.insert(version.clone()) {
                    versions.push(DiscoveredVersion {
                        is_prerelease: version::is_prerelease(&version),
                        tag: version.clone(),
                        version,
                        release_date: None,
                    });
                }
            }
        }

        let mut tags: Vec<String> = versions.iter().map(|v| v.tag.clone()).collect();
        version::sort_descending(&mut tags);
        versions.sort_by_key(|v| tags.iter().position(|t| t == &v.tag).unwrap_or(usize::MAX));
        Ok(versions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn github_detects_by_host() {
        let provider = GitHubProvider::default();
        assert!(provider.detect("https://github.com/torvalds/linux"));
        assert!(!provider.detect("https://gitlab.com/foo/bar"));
    }

    #[test]
    fn github_parses_owner_repo() {
        let provider = GitHubProvider::default();
        let repo = provider.parse_repo_info("https://github.com/torvalds/linux").unwrap();
        assert_eq!(repo.owner, "torvalds");
        assert_eq!(repo.repo, "linux");
    }

    #[test]
    fn github_template_uses_refs_tags() {
        let provider = GitHubProvider::default();
        let repo = provider.parse_repo_info("https://github.com/torvalds/linux").unwrap();
        let template = provider.default_url_template(&repo);
        assert_eq!(
            template,
            "https://github.com/torvalds/linux/archive/refs/tags/{tag}.tar.gz"
        );
    }

    #[test]
    fn gitlab_detects_self_hosted_wildcard() {
        let provider = GitLabProvider::default();
        assert!(provider.detect("https://gitlab.gnome.org/GNOME/gimp"));
        assert!(provider.detect("https://gitlab.com/gitlab-org/gitlab"));
        assert!(!provider.detect("https://github.com/foo/bar"));
    }

    #[test]
    fn gitlab_template_shape() {
        let provider = GitLabProvider::default();
        let repo = provider.parse_repo_info("https://gitlab.com/group/project").unwrap();
        let template = provider.default_url_template(&repo);
        assert_eq!(
            template,
            "https://gitlab.com/group/project/-/archive/{tag}/project-{tag}.tar.gz"
        );
    }

    #[test]
    fn codeberg_detects_by_host() {
        let provider = GiteaFamilyProvider::codeberg();
        assert!(provider.detect("https://codeberg.org/forgejo/forgejo"));
        assert!(!provider.detect("https://github.com/foo/bar"));
    }

    #[test]
    fn generic_kernel_org_template() {
        let provider = GenericProvider::default();
        let repo = provider.parse_repo_info("https://cdn.kernel.org/pub/linux/kernel/v6.x/").unwrap();
        let template = provider.default_url_template(&repo);
        assert_eq!(template, "https://cdn.kernel.org/v{major_x}/linux-{version}.tar.xz");
    }

    #[test]
    fn generic_fallback_template() {
        let provider = GenericProvider::default();
        let repo = provider.parse_repo_info("https://example.com/downloads/widget").unwrap();
        let template = provider.default_url_template(&repo);
        assert_eq!(template, "https://example.com/widget-{version}.tar.gz");
    }

    #[test]
    fn generic_always_detects() {
        let provider = GenericProvider::default();
        assert!(provider.detect("https://anything.example/at/all"));
    }

    // discover_versions is the only method on this trait that calls out
    // over HTTP; the tests below mock the forge APIs with wiremock rather
    // than hitting the real hosts. GitHub's provider hardcodes
    // `api.github.com` instead of reading it from `RepoInfo::base_url`, so
    // it can't be pointed at a mock server without changing that; GitLab,
    // Gitea and the generic scraper all build their request URL from
    // `repo.base_url`.

    fn mock_repo(base_url: &str) -> RepoInfo {
        RepoInfo {
            owner: "group".to_string(),
            repo: "project".to_string(),
            host: "mock.test".to_string(),
            base_url: base_url.to_string(),
        }
    }

    #[tokio::test]
    async fn gitlab_discover_versions_merges_releases_and_tags() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/api/v4/projects/group%2Fproject/releases"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"tag_name": "v1.2.0", "upcoming_release": false, "released_at": "2024-01-01T00:00:00Z"},
            ])))
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/api/v4/projects/group%2Fproject/repository/tags"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "v1.2.0"},
                {"name": "v1.1.0"},
            ])))
            .mount(&server)
            .await;

        let provider = GitLabProvider::default();
        let repo = mock_repo(&server.uri());
        let client = reqwest::Client::new();
        let versions = provider.discover_versions(&client, &repo).await.unwrap();

        assert_eq!(versions.len(), 2);
        let v120 = versions.iter().find(|v| v.tag == "v1.2.0").unwrap();
        assert!(v120.release_date.is_some(), "tag present in releases keeps its release date");
        let v110 = versions.iter().find(|v| v.tag == "v1.1.0").unwrap();
        assert!(v110.release_date.is_none(), "tag-only entry has no release date");
    }

    #[tokio::test]
    async fn gitlab_discover_versions_propagates_upstream_error() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/api/v4/projects/group%2Fproject/releases"))
            .respond_with(wiremock::ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let provider = GitLabProvider::default();
        let repo = mock_repo(&server.uri());
        let client = reqwest::Client::new();
        assert!(provider.discover_versions(&client, &repo).await.is_err());
    }

    #[tokio::test]
    async fn gitea_discover_versions_skips_drafts() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/api/v1/repos/group/project/releases"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"tag_name": "v2.0.0", "draft": false, "prerelease": false, "published_at": null},
                {"tag_name": "v2.1.0-rc1", "draft": true, "prerelease": true, "published_at": null},
            ])))
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/api/v1/repos/group/project/tags"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let provider = GiteaFamilyProvider::gitea();
        let repo = mock_repo(&server.uri());
        let client = reqwest::Client::new();
        let versions = provider.discover_versions(&client, &repo).await.unwrap();

        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].tag, "v2.0.0");
    }

    #[tokio::test]
    async fn generic_discover_versions_scrapes_href_links() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(
                r#"<a href="widget-1.4.0.tar.gz">widget-1.4.0.tar.gz</a>
                   <a href="widget-1.3.0.tar.gz">widget-1.3.0.tar.gz</a>"#,
            ))
            .mount(&server)
            .await;

        let provider = GenericProvider::default();
        let repo = mock_repo(&server.uri());
        let client = reqwest::Client::new();
        let versions = provider.discover_versions(&client, &repo).await.unwrap();

        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].tag, "1.4.0");
    }
}
