use super::{api_url, probe_status, send_json, ReleaseDraft, ReleasePublisher};
use crate::error::{BumpError, Result};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Url;
use serde::{Deserialize, Serialize};

const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

#[derive(Debug, Deserialize)]
struct Project {
    id: u64,
}

#[derive(Debug, Serialize)]
struct CreateRelease<'a> {
    name: &'a str,
    tag_name: &'a str,
    description: &'a str,
}

#[derive(Debug, Deserialize)]
struct Release {
    #[serde(rename = "_links")]
    links: ReleaseLinks,
}

#[derive(Debug, Deserialize)]
struct ReleaseLinks {
    #[serde(rename = "self")]
    self_url: String,
}

/// Publishes releases through the GitLab REST API (v4)
pub struct GitLabPublisher {
    http: Client,
    api_base: Url,
    project_path: String,
    token: Option<String>,
}

impl GitLabPublisher {
    pub fn new(http: Client, api_base: Url, project_path: &str, token: Option<String>) -> Self {
        GitLabPublisher {
            http,
            api_base,
            project_path: project_path.to_string(),
            token,
        }
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| BumpError::config("no GitLab API key configured"))?;
        Ok(request.header(TOKEN_HEADER, token))
    }

    /// Numeric id of the project; also confirms it exists and is visible
    fn project_id(&self) -> Result<u64> {
        let url = api_url(&self.api_base, &["projects", &self.project_path])?;
        let project: Project = send_json(self.authorized(self.http.get(url))?, "get project")?;

        log::debug!("GitLab project {} has id {}", self.project_path, project.id);
        Ok(project.id)
    }
}

impl ReleasePublisher for GitLabPublisher {
    fn name(&self) -> &str {
        "GitLab"
    }

    fn probe(&self) -> bool {
        match api_url(&self.api_base, &["version"]) {
            Ok(url) => probe_status(self.http.get(url), self.name()),
            Err(_) => false,
        }
    }

    fn publish(&self, draft: &ReleaseDraft) -> Result<String> {
        let project_id = self.project_id()?.to_string();
        let url = api_url(&self.api_base, &["projects", &project_id, "releases"])?;

        let body = CreateRelease {
            name: &draft.name,
            tag_name: &draft.tag,
            description: &draft.notes,
        };
        let release: Release = send_json(
            self.authorized(self.http.post(url))?.json(&body),
            "create release",
        )?;

        Ok(release.links.self_url)
    }
}
