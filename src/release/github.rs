use super::{api_url, probe_status, send_json, ReleaseDraft, ReleasePublisher};
use crate::error::{BumpError, Result};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::ACCEPT;
use reqwest::Url;
use serde::{Deserialize, Serialize};

const MEDIA_TYPE: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";

#[derive(Debug, Deserialize)]
struct Repository {
    full_name: String,
}

#[derive(Debug, Serialize)]
struct CreateRelease<'a> {
    tag_name: &'a str,
    name: &'a str,
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct Release {
    html_url: String,
}

/// Publishes releases through the GitHub REST API (github.com or Enterprise)
pub struct GitHubPublisher {
    http: Client,
    api_base: Url,
    project_path: String,
    token: Option<String>,
}

impl GitHubPublisher {
    pub fn new(http: Client, api_base: Url, project_path: &str, token: Option<String>) -> Self {
        GitHubPublisher {
            http,
            api_base,
            project_path: project_path.to_string(),
            token,
        }
    }

    fn repo_url(&self, extra: &[&str]) -> Result<Url> {
        let mut segments = vec!["repos"];
        segments.extend(self.project_path.split('/').filter(|s| !s.is_empty()));
        segments.extend_from_slice(extra);
        api_url(&self.api_base, &segments)
    }

    fn request(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| BumpError::config("no GitHub token configured"))?;

        Ok(request
            .bearer_auth(token)
            .header(ACCEPT, MEDIA_TYPE)
            .header("X-GitHub-Api-Version", API_VERSION))
    }
}

impl ReleasePublisher for GitHubPublisher {
    fn name(&self) -> &str {
        "GitHub"
    }

    fn probe(&self) -> bool {
        match api_url(&self.api_base, &["meta"]) {
            Ok(url) => probe_status(self.http.get(url).header(ACCEPT, MEDIA_TYPE), self.name()),
            Err(_) => false,
        }
    }

    fn publish(&self, draft: &ReleaseDraft) -> Result<String> {
        let repository: Repository =
            send_json(self.request(self.http.get(self.repo_url(&[])?))?, "get repository")?;
        log::debug!("Creating release in {}", repository.full_name);

        let body = CreateRelease {
            tag_name: &draft.tag,
            name: &draft.name,
            body: &draft.notes,
        };
        let release: Release = send_json(
            self.request(self.http.post(self.repo_url(&["releases"])?))?
                .json(&body),
            "create release",
        )?;

        Ok(release.html_url)
    }
}
