use crate::domain::Version;
use crate::error::{BumpError, Result};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

fn table_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*\[\[?\s*([^\[\]]+?)\s*\]\]?\s*(?:#.*)?$").expect("valid table header regex")
    })
}

fn version_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^(?P<lead>\s*version\s*=\s*)(?P<quote>["'])[^"']*["'](?P<rest>.*)$"#)
            .expect("valid version line regex")
    })
}

/// Table a pyproject.toml takes its version from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionTable {
    /// PEP 621 `[project]`
    Project,
    /// Poetry `[tool.poetry]`
    Poetry,
}

impl VersionTable {
    pub fn header(&self) -> &'static str {
        match self {
            VersionTable::Project => "project",
            VersionTable::Poetry => "tool.poetry",
        }
    }
}

/// Locate the version, preferring `[project]` over `[tool.poetry]`
pub fn locate_version(content: &str) -> Result<(VersionTable, String)> {
    let document: toml::Table = toml::from_str(content)
        .map_err(|e| BumpError::parse(format!("error parsing pyproject.toml: {}", e)))?;

    let project = document
        .get("project")
        .and_then(|project| project.get("version"))
        .and_then(toml::Value::as_str)
        .map(|version| (VersionTable::Project, version));

    let poetry = || {
        document
            .get("tool")
            .and_then(|tool| tool.get("poetry"))
            .and_then(|poetry| poetry.get("version"))
            .and_then(toml::Value::as_str)
            .map(|version| (VersionTable::Poetry, version))
    };

    project
        .or_else(poetry)
        .map(|(table, version)| (table, version.to_string()))
        .ok_or_else(|| BumpError::parse("unable to find version in pyproject.toml"))
}

pub fn read_version(path: &Path) -> Result<String> {
    let content = fs::read_to_string(path)?;
    let (_, version) = locate_version(&content)?;

    Version::parse(&version)?;
    Ok(version)
}

/// Replace the `version = "..."` line inside the table that owns the version.
///
/// Quote style, trailing comments and line endings are kept as they were.
pub fn rewrite_version(content: &str, new_version: &str) -> Result<String> {
    let (table, _) = locate_version(content)?;

    let mut updated = String::with_capacity(content.len() + new_version.len());
    let mut current_table = String::new();
    let mut replaced = false;

    for line in content.split_inclusive('\n') {
        if replaced {
            updated.push_str(line);
            continue;
        }

        let body = line.trim_end_matches(['\r', '\n']);
        let ending = &line[body.len()..];

        if let Some(caps) = table_header_re().captures(body) {
            current_table = caps[1].to_string();
        } else if current_table == table.header() {
            if let Some(caps) = version_line_re().captures(body) {
                updated.push_str(&caps["lead"]);
                updated.push_str(&caps["quote"]);
                updated.push_str(new_version);
                updated.push_str(&caps["quote"]);
                updated.push_str(&caps["rest"]);
                updated.push_str(ending);
                replaced = true;
                continue;
            }
        }

        updated.push_str(line);
    }

    if !replaced {
        return Err(BumpError::parse(format!(
            "no version line found in [{}] of pyproject.toml",
            table.header()
        )));
    }

    Ok(updated)
}
