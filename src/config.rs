use crate::error::{BumpError, Result};
use crate::release::Backend;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const CONFIG_DIR_NAME: &str = "bumper";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Represents the complete configuration for bumper.
///
/// Holds hosted-service credentials, branch naming and the project documents
/// the release touches. Every field has a default, so an absent file is valid.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gitlab_api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,

    #[serde(default = "default_remote")]
    pub remote: String,

    #[serde(default)]
    pub branches: BranchesConfig,

    #[serde(default)]
    pub files: FilesConfig,

    /// Where the configuration was loaded from and is saved back to
    #[serde(skip)]
    source: Option<PathBuf>,
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_trunk() -> String {
    "main".to_string()
}

fn default_development() -> String {
    "dev".to_string()
}

fn default_release_prefix() -> String {
    "release/".to_string()
}

fn default_changelog() -> String {
    "CHANGELOG.md".to_string()
}

fn default_readme() -> String {
    "README.md".to_string()
}

/// Branch names used by the release flow.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BranchesConfig {
    /// Branch releases are merged into and tagged on
    #[serde(default = "default_trunk")]
    pub trunk: String,

    /// Branch a bump must start from
    #[serde(default = "default_development")]
    pub development: String,

    #[serde(default = "default_release_prefix")]
    pub release_prefix: String,
}

impl Default for BranchesConfig {
    fn default() -> Self {
        BranchesConfig {
            trunk: default_trunk(),
            development: default_development(),
            release_prefix: default_release_prefix(),
        }
    }
}

/// Project documents, relative to the project directory.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FilesConfig {
    #[serde(default = "default_changelog")]
    pub changelog: String,

    #[serde(default = "default_readme")]
    pub readme: String,
}

impl Default for FilesConfig {
    fn default() -> Self {
        FilesConfig {
            changelog: default_changelog(),
            readme: default_readme(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            gitlab_api_key: None,
            github_token: None,
            remote: default_remote(),
            branches: BranchesConfig::default(),
            files: FilesConfig::default(),
            source: None,
        }
    }
}

impl Config {
    /// Bind the configuration to a file used by [`Config::save`]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Reject branch settings the release flow cannot work with
    pub fn validate(&self) -> Result<()> {
        let branches = &self.branches;

        if branches.trunk.trim().is_empty() || branches.development.trim().is_empty() {
            return Err(BumpError::config("branch names must not be empty"));
        }
        if branches.trunk == branches.development {
            return Err(BumpError::config(format!(
                "trunk and development branch are both '{}'",
                branches.trunk
            )));
        }
        if branches.release_prefix.trim().is_empty() {
            return Err(BumpError::config("release_prefix must not be empty"));
        }
        if self.remote.trim().is_empty() {
            return Err(BumpError::config("remote must not be empty"));
        }
        Ok(())
    }

    /// Write the configuration back to where it came from.
    ///
    /// On Unix the directory is created 0700 and the file written 0600,
    /// since it holds API credentials.
    pub fn save(&self) -> Result<()> {
        let path = self
            .source
            .clone()
            .or_else(default_path)
            .ok_or_else(|| BumpError::config("could not determine configuration directory"))?;

        let content = toml::to_string_pretty(self)
            .map_err(|e| BumpError::config(format!("failed to serialize configuration: {}", e)))?;

        write_private(&path, &content)?;
        log::debug!("Saved configuration to {}", path.display());
        Ok(())
    }
}

/// Stores API credentials for hosted release services.
pub trait CredentialStore {
    fn api_key(&self, backend: Backend) -> Option<String>;

    /// Remember a key and persist it
    fn store_api_key(&mut self, backend: Backend, key: &str) -> Result<()>;
}

impl CredentialStore for Config {
    fn api_key(&self, backend: Backend) -> Option<String> {
        let key = match backend {
            Backend::GitLab => &self.gitlab_api_key,
            Backend::GitHub => &self.github_token,
        };
        key.clone().filter(|key| !key.trim().is_empty())
    }

    fn store_api_key(&mut self, backend: Backend, key: &str) -> Result<()> {
        let key = Some(key.trim().to_string());
        match backend {
            Backend::GitLab => self.gitlab_api_key = key,
            Backend::GitHub => self.github_token = key,
        }
        self.save()
    }
}

/// `<config dir>/bumper/config.toml`, e.g. `~/.config/bumper/config.toml` on Linux
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Loads configuration from file or returns defaults.
///
/// Attempts to load configuration in the following order:
/// 1. Custom path provided as parameter
/// 2. `bumper/config.toml` in the user config directory
/// 3. Default configuration if no file found
///
/// A missing file is not an error; the returned configuration is still bound
/// to that path so credentials entered later are saved there.
///
/// # Returns
/// * `Ok(Config)` - Loaded or default configuration
/// * `Err` - If file exists but cannot be read, parsed or validated
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let path = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => default_path(),
    };

    let Some(path) = path else {
        log::debug!("No configuration directory; using defaults");
        return Ok(Config::default());
    };

    if !path.exists() {
        log::debug!("No configuration at {}; using defaults", path.display());
        return Ok(Config::default().with_path(path));
    }

    let content = fs::read_to_string(&path).map_err(|e| {
        BumpError::config(format!("failed to read {}: {}", path.display(), e))
    })?;
    let config: Config = toml::from_str(&content).map_err(|e| {
        BumpError::config(format!("failed to parse {}: {}", path.display(), e))
    })?;

    config.validate()?;
    log::debug!("Loaded configuration from {}", path.display());
    Ok(config.with_path(path))
}

fn write_private(path: &Path, content: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            let mut builder = fs::DirBuilder::new();
            builder.recursive(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::DirBuilderExt;
                builder.mode(0o700);
            }
            builder.create(parent)?;
        }
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(content.as_bytes())?;

    // The mode above only applies to newly created files
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
