use crate::error::{BumpError, Result};
use regex::Regex;
use std::sync::OnceLock;

fn https_remote_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^https://([^/]+)/(.+?)(?:\.git)?/?$").expect("valid https remote regex")
    })
}

fn ssh_remote_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[^@\s/]+@([^:/\s]+):(.+?)(?:\.git)?/?$").expect("valid ssh remote regex")
    })
}

/// Hosting server and project path taken from the origin remote URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    pub host: String,
    pub project_path: String,
}

impl RemoteEndpoint {
    /// Parse `https://host/group/project(.git)` or `user@host:group/project(.git)`
    pub fn parse(remote_url: &str) -> Result<Self> {
        let url = remote_url.trim();
        let re = if url.starts_with("https://") {
            https_remote_re()
        } else {
            ssh_remote_re()
        };

        let captures = re
            .captures(url)
            .ok_or_else(|| BumpError::parse(format!("error parsing remote URL: {}", url)))?;

        Ok(RemoteEndpoint {
            host: captures[1].to_string(),
            project_path: captures[2].to_string(),
        })
    }
}
