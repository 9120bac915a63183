use crate::domain::Version;
use crate::error::{BumpError, Result};
use regex::Regex;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

fn version_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^([ \t]*)"version"([ \t]*:[ \t]*)"[^"\r\n]*""#)
            .expect("valid package.json version regex")
    })
}

/// Read the top-level `version` of a package.json
pub fn read_version(path: &Path) -> Result<String> {
    let content = fs::read_to_string(path)?;
    let document: Value = serde_json::from_str(&content)
        .map_err(|e| BumpError::parse(format!("error parsing package.json: {}", e)))?;

    let version = document
        .get("version")
        .and_then(Value::as_str)
        .ok_or_else(|| BumpError::parse("version not found in package.json"))?;

    Version::parse(version)?;
    Ok(version.to_string())
}

/// Replace the value of the top-level `"version"` key.
///
/// Only the least-indented `"version": "..."` line is touched, so nested
/// objects that also carry a version keep theirs.
pub fn rewrite_version(content: &str, new_version: &str) -> Result<String> {
    let captures = version_line_re()
        .captures_iter(content)
        .min_by_key(|caps| caps[1].len())
        .ok_or_else(|| BumpError::parse("no \"version\" line found in package.json"))?;

    let range = captures
        .get(0)
        .map(|m| m.range())
        .ok_or_else(|| BumpError::parse("no \"version\" line found in package.json"))?;

    let replacement = format!(
        "{}\"version\"{}\"{}\"",
        &captures[1], &captures[2], new_version
    );

    let mut updated = String::with_capacity(content.len() + new_version.len());
    updated.push_str(&content[..range.start]);
    updated.push_str(&replacement);
    updated.push_str(&content[range.end..]);
    Ok(updated)
}
