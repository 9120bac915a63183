//! Release notes publishing on hosted git services
//!
//! The origin remote decides which service is used. Each [`Backend`] is
//! probed in order, and the first one that recognises the host publishes.

pub mod github;
pub mod gitlab;

pub use github::GitHubPublisher;
pub use gitlab::GitLabPublisher;

use crate::config::CredentialStore;
use crate::domain::RemoteEndpoint;
use crate::error::{BumpError, OperationContext, Result};
use crate::ui::Operator;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Url;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub const USER_AGENT: &str = concat!("bumper/", env!("CARGO_PKG_VERSION"));

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// A release about to be created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseDraft {
    pub tag: String,
    /// Display name, "<project> <tag>"
    pub name: String,
    pub notes: String,
}

impl ReleaseDraft {
    pub fn new(project_name: &str, tag: &str, notes: &str) -> Self {
        ReleaseDraft {
            tag: tag.to_string(),
            name: format!("{} {}", project_name, tag),
            notes: notes.to_string(),
        }
    }
}

/// A hosted service that can publish release notes
pub trait ReleasePublisher {
    fn name(&self) -> &str;

    /// Whether the host actually runs this service.
    ///
    /// An unauthorised answer still counts: the server is right, the
    /// credential is missing or wrong.
    fn probe(&self) -> bool;

    /// Create the release and return its canonical URL
    fn publish(&self, draft: &ReleaseDraft) -> Result<String>;
}

/// Finds the publisher for a remote
pub trait PublisherResolver {
    fn resolve(&mut self, endpoint: &RemoteEndpoint) -> Result<Box<dyn ReleasePublisher>>;
}

/// Hosting service back end (GitLab, GitHub).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    GitLab,
    GitHub,
}

impl Backend {
    /// All back ends, in probing order.
    pub fn all() -> &'static [Backend] {
        &[Backend::GitLab, Backend::GitHub]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::GitLab => "GitLab",
            Self::GitHub => "GitHub",
        }
    }

    /// What the operator is asked for when no credential is stored
    pub fn credential_prompt(&self) -> &'static str {
        match self {
            Self::GitLab => "Please specify a GitLab API key with 'api' permission",
            Self::GitHub => "Please specify a GitHub token with 'contents: write' permission",
        }
    }

    /// API root for a host, e.g. `https://gitlab.example.com/api/v4`
    pub fn api_base(&self, scheme: &str, host: &str) -> Result<Url> {
        let base = match self {
            Self::GitLab => format!("{}://{}/api/v4", scheme, host),
            Self::GitHub if host.eq_ignore_ascii_case("github.com") => {
                "https://api.github.com".to_string()
            }
            Self::GitHub => format!("{}://{}/api/v3", scheme, host),
        };

        Url::parse(&base)
            .map_err(|e| BumpError::parse(format!("invalid API URL '{}': {}", base, e)))
    }

    pub fn publisher(
        &self,
        http: Client,
        api_base: Url,
        project_path: &str,
        token: Option<String>,
    ) -> Box<dyn ReleasePublisher> {
        match self {
            Self::GitLab => Box::new(GitLabPublisher::new(http, api_base, project_path, token)),
            Self::GitHub => Box::new(GitHubPublisher::new(http, api_base, project_path, token)),
        }
    }
}

/// HTTP client shared by all publishers
pub fn http_client() -> Result<Client> {
    Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .operation("build HTTP client")
}

/// Resolves publishers against the real hosted services, asking the operator
/// for a credential the first time one is needed.
pub struct HostedResolver<'a> {
    credentials: &'a mut dyn CredentialStore,
    operator: &'a dyn Operator,
    http: Client,
    scheme: String,
}

impl<'a> HostedResolver<'a> {
    pub fn new(credentials: &'a mut dyn CredentialStore, operator: &'a dyn Operator) -> Result<Self> {
        Ok(HostedResolver {
            credentials,
            operator,
            http: http_client()?,
            scheme: "https".to_string(),
        })
    }

    pub fn with_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    /// Talk plain HTTP instead of HTTPS (local test servers)
    pub fn with_scheme(mut self, scheme: &str) -> Self {
        self.scheme = scheme.to_string();
        self
    }

    fn credential(&mut self, backend: Backend) -> Result<String> {
        if let Some(key) = self.credentials.api_key(backend) {
            return Ok(key);
        }

        let key = self.operator.request_api_key(backend.credential_prompt())?;
        let key = key.trim();
        if key.is_empty() {
            return Err(BumpError::validation(format!(
                "no {} credential provided",
                backend.name()
            )));
        }

        self.credentials.store_api_key(backend, key)?;
        Ok(key.to_string())
    }
}

impl PublisherResolver for HostedResolver<'_> {
    fn resolve(&mut self, endpoint: &RemoteEndpoint) -> Result<Box<dyn ReleasePublisher>> {
        for backend in Backend::all() {
            let api_base = backend.api_base(&self.scheme, &endpoint.host)?;
            let candidate =
                backend.publisher(self.http.clone(), api_base.clone(), &endpoint.project_path, None);

            if !candidate.probe() {
                log::debug!("{} is not a {} server", endpoint.host, backend.name());
                continue;
            }

            log::debug!("Publishing releases through {} at {}", backend.name(), api_base);
            let token = self.credential(*backend)?;
            return Ok(backend.publisher(
                self.http.clone(),
                api_base,
                &endpoint.project_path,
                Some(token),
            ));
        }

        Err(BumpError::external(
            "resolve release publisher",
            format!("no supported release service found at {}", endpoint.host),
        ))
    }
}

/// `base` with extra path segments, each percent-encoded
pub(crate) fn api_url(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| BumpError::parse(format!("'{}' cannot be used as an API root", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Send a request and decode a successful JSON answer
pub(crate) fn send_json<T: DeserializeOwned>(request: RequestBuilder, operation: &str) -> Result<T> {
    let response = request.send().operation(operation)?;
    let status = response.status();

    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        let snippet: String = body.trim().chars().take(300).collect();
        return Err(BumpError::external(
            operation,
            format!("HTTP {}: {}", status, snippet),
        ));
    }

    response.json::<T>().operation(operation)
}

/// Shared probe rule: reachable and not 404 means the service is there
pub(crate) fn probe_status(request: RequestBuilder, service: &str) -> bool {
    match request.send() {
        Ok(response) => {
            let status = response.status();
            log::debug!("{} probe answered {}", service, status);
            status.is_success()
                || status == reqwest::StatusCode::UNAUTHORIZED
                || status == reqwest::StatusCode::FORBIDDEN
        }
        Err(e) => {
            log::debug!("{} probe failed: {}", service, e);
            false
        }
    }
}
