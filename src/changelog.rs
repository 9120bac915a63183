//! CHANGELOG.md editing
//!
//! The changelog keeps pending notes under a `## Unreleased` (or
//! `## Development`) heading. Releasing moves that body under a new dated
//! heading and leaves the unreleased heading in place with a placeholder.

use crate::error::{BumpError, Result};
use chrono::{Datelike, Local, NaiveDate};
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Marker left under the unreleased heading once its notes are moved
pub const EMPTY_SECTION_MARKER: &str = "–";

fn unreleased_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^## (Unreleased|Development)(\r?)$").expect("valid unreleased heading regex")
    })
}

fn any_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^## ").expect("valid heading regex"))
}

/// Reads and rewrites a project's changelog
#[derive(Debug, Clone)]
pub struct ChangelogEditor {
    path: PathBuf,
}

impl ChangelogEditor {
    pub fn new(project_dir: &Path, file_name: &str) -> Self {
        ChangelogEditor {
            path: project_dir.join(file_name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Move the unreleased notes under a heading for `tag`, dated today
    pub fn update(&self, tag: &str) -> Result<()> {
        self.update_on(tag, Local::now().date_naive())
    }

    pub fn update_on(&self, tag: &str, date: NaiveDate) -> Result<()> {
        let content = self.read()?;
        let updated = rewrite_unreleased(&content, tag, date)?;
        fs::write(&self.path, updated)?;

        log::debug!("Added {} section to {}", tag, self.path.display());
        Ok(())
    }

    /// Fail unless the changelog exists and has an unreleased heading to move
    pub fn ensure_releasable(&self) -> Result<()> {
        let content = self.read()?;
        if unreleased_heading_re().is_match(&content) {
            Ok(())
        } else {
            Err(missing_unreleased_heading())
        }
    }

    /// Notes recorded under the heading for `tag`
    pub fn version_notes(&self, tag: &str) -> Result<String> {
        let content = self.read()?;
        extract_version_notes(&content, tag)
    }

    fn read(&self) -> Result<String> {
        fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => BumpError::DocumentNotFound(self.path.clone()),
            _ => BumpError::Io(e),
        })
    }
}

fn missing_unreleased_heading() -> BumpError {
    BumpError::parse("no '## Unreleased' or '## Development' heading in changelog")
}

/// Rewrite the first unreleased heading into an emptied heading followed by
/// `## <tag> - <date>` and the body that was under it.
pub fn rewrite_unreleased(content: &str, tag: &str, date: NaiveDate) -> Result<String> {
    let caps = unreleased_heading_re()
        .captures(content)
        .ok_or_else(missing_unreleased_heading)?;

    let (Some(heading), Some(name)) = (caps.get(0), caps.get(1)) else {
        return Err(BumpError::parse("malformed unreleased heading in changelog"));
    };
    // The heading match swallows a trailing CR; keep CRLF files consistent
    let cr = caps.get(2).map_or("", |cr| cr.as_str());

    let replacement = format!(
        "## {name}{cr}\n{cr}\n{marker}{cr}\n{cr}\n## {tag} - {date}{cr}",
        name = name.as_str(),
        cr = cr,
        marker = EMPTY_SECTION_MARKER,
        tag = tag,
        date = format_release_date(date),
    );

    let mut updated = String::with_capacity(content.len() + replacement.len());
    updated.push_str(&content[..heading.start()]);
    updated.push_str(&replacement);
    updated.push_str(&content[heading.end()..]);
    Ok(updated)
}

/// Text between the heading for `tag` and the next heading, trimmed
pub fn extract_version_notes(content: &str, tag: &str) -> Result<String> {
    let heading_re = Regex::new(&format!(r"(?m)^## {}(?:[ \t].*)?\r?$", regex::escape(tag)))
        .map_err(|e| BumpError::parse(format!("invalid version heading pattern: {}", e)))?;

    let heading = heading_re
        .find(content)
        .ok_or_else(|| BumpError::SectionNotFound(format!("## {}", tag)))?;

    let rest = &content[heading.end()..];
    let body = match any_heading_re().find(rest) {
        Some(next) => &rest[..next.start()],
        None => rest,
    };

    Ok(body.trim().to_string())
}

/// Date as used in version headings, e.g. "1st January 2024"
pub fn format_release_date(date: NaiveDate) -> String {
    let day = date.day();
    format!("{}{} {}", day, ordinal_suffix(day), date.format("%B %Y"))
}

fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}
