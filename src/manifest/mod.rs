//! Ecosystem manifests carrying the project version
//!
//! Variants are tried in a fixed order. A manifest that exists but cannot be
//! read as its variant is skipped, not treated as an error.

pub mod npm;
pub mod pyproject;

use crate::domain::version::strip_prefix;
use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Manifest variant (Go module, pyproject, npm).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    GoModule,
    Pyproject,
    Npm,
}

impl ManifestKind {
    /// All variants, in detection order.
    pub fn all() -> &'static [ManifestKind] {
        &[ManifestKind::GoModule, ManifestKind::Pyproject, ManifestKind::Npm]
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            Self::GoModule => "go.mod",
            Self::Pyproject => "pyproject.toml",
            Self::Npm => "package.json",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::GoModule => "go mod",
            Self::Pyproject => "pyproject",
            Self::Npm => "npm",
        }
    }

    /// Check whether the project directory holds a usable manifest of this kind.
    pub fn detect(&self, project_dir: &Path) -> Option<ProjectManifest> {
        let path = project_dir.join(self.file_name());
        if !path.is_file() {
            return None;
        }

        let version = match self {
            // go.mod carries no version of its own
            Self::GoModule => Ok(None),
            Self::Pyproject => pyproject::read_version(&path).map(Some),
            Self::Npm => npm::read_version(&path).map(Some),
        }
        .and_then(|version| {
            self.check_rewritable(&path, version.as_deref())?;
            Ok(version)
        });

        match version {
            Ok(version) => Some(ProjectManifest {
                kind: *self,
                path,
                version,
            }),
            Err(e) => {
                log::debug!("Not a {} project ({}): {}", self.name(), path.display(), e);
                None
            }
        }
    }

    fn rewriter(&self) -> Option<fn(&str, &str) -> Result<String>> {
        match self {
            Self::GoModule => None,
            Self::Pyproject => Some(pyproject::rewrite_version),
            Self::Npm => Some(npm::rewrite_version),
        }
    }

    /// Dry-run the rewrite so a manifest we could read but not edit is
    /// rejected before anything is touched
    fn check_rewritable(&self, path: &Path, version: Option<&str>) -> Result<()> {
        match (self.rewriter(), version) {
            (Some(rewrite), Some(version)) => {
                let content = fs::read_to_string(path)?;
                rewrite(&content, version).map(|_| ())
            }
            _ => Ok(()),
        }
    }
}

/// Detected manifest for a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectManifest {
    kind: ManifestKind,
    path: PathBuf,
    version: Option<String>,
}

impl ProjectManifest {
    pub fn kind(&self) -> ManifestKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Version recorded in the manifest, without any tag prefix
    pub fn current_version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Whether the manifest agrees with a tag such as "v1.2.3".
    ///
    /// Manifests without a version agree with every tag.
    pub fn matches_tag(&self, tag: &str) -> bool {
        match &self.version {
            Some(version) => strip_prefix(version.trim()) == strip_prefix(tag.trim()),
            None => true,
        }
    }

    /// Whether bumping actually edits the file
    pub fn is_versioned(&self) -> bool {
        self.version.is_some()
    }

    /// Rewrite the version field in place, leaving every other byte untouched
    pub fn bump_version(&self, new_version: &str) -> Result<()> {
        let new_version = strip_prefix(new_version.trim());

        let Some(rewrite) = self.kind.rewriter() else {
            return Ok(());
        };

        let content = fs::read_to_string(&self.path)?;
        let updated = rewrite(&content, new_version)?;
        fs::write(&self.path, updated)?;

        log::debug!(
            "Updated {} to version {}",
            self.path.display(),
            new_version
        );
        Ok(())
    }
}

/// Find the first manifest variant the project uses.
pub fn detect(project_dir: &Path) -> Option<ProjectManifest> {
    ManifestKind::all()
        .iter()
        .find_map(|kind| kind.detect(project_dir))
}
