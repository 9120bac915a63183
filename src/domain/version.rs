use crate::error::{BumpError, Result};
use std::fmt;
use std::str::FromStr;

/// Semantic version representation
///
/// Pre-release and build metadata are carried through for display but are
/// dropped by every increment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Option<String>,
    pub build: Option<String>,
}

impl Version {
    /// Create a new version
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Version {
            major,
            minor,
            patch,
            pre: None,
            build: None,
        }
    }

    /// Parse version from a tag string (e.g., "v1.2.3" -> Version(1,2,3))
    pub fn parse(tag: &str) -> Result<Self> {
        let clean_tag = strip_prefix(tag.trim());

        let parsed = semver::Version::parse(clean_tag).map_err(|e| {
            BumpError::parse(format!(
                "Invalid version format: '{}' - expected X.Y.Z ({})",
                tag, e
            ))
        })?;

        Ok(Version {
            major: parsed.major,
            minor: parsed.minor,
            patch: parsed.patch,
            pre: (!parsed.pre.is_empty()).then(|| parsed.pre.to_string()),
            build: (!parsed.build.is_empty()).then(|| parsed.build.to_string()),
        })
    }

    pub fn inc_major(&self) -> Result<Self> {
        Ok(Version::new(increment(self.major, "major")?, 0, 0))
    }

    pub fn inc_minor(&self) -> Result<Self> {
        Ok(Version::new(self.major, increment(self.minor, "minor")?, 0))
    }

    pub fn inc_patch(&self) -> Result<Self> {
        Ok(Version::new(self.major, self.minor, increment(self.patch, "patch")?))
    }

    /// Bump version according to bump type
    pub fn bump(&self, bump_type: BumpKind) -> Result<Self> {
        match bump_type {
            BumpKind::Major => self.inc_major(),
            BumpKind::Minor => self.inc_minor(),
            BumpKind::Patch => self.inc_patch(),
        }
    }

    /// The three candidate next versions, in major/minor/patch order
    pub fn candidates(&self) -> Result<BumpCandidates> {
        Ok(BumpCandidates {
            major: self.inc_major()?,
            minor: self.inc_minor()?,
            patch: self.inc_patch()?,
        })
    }
}

fn increment(component: u64, name: &str) -> Result<u64> {
    component.checked_add(1).ok_or_else(|| {
        BumpError::validation(format!("{} version {} cannot be incremented", name, component))
    })
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre {
            write!(f, "-{}", pre)?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{}", build)?;
        }
        Ok(())
    }
}

/// Leading prefix of a tag before the numeric version ("v", "V" or "")
pub fn tag_prefix(tag: &str) -> &str {
    let tag = tag.trim();
    &tag[..tag.len() - strip_prefix(tag).len()]
}

/// Drops a leading `v`/`V` so tags compare against bare manifest versions
pub fn strip_prefix(version: &str) -> &str {
    version
        .strip_prefix('v')
        .or_else(|| version.strip_prefix('V'))
        .unwrap_or(version)
}

/// Version bump kind; exactly one is active per run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BumpKind {
    Major,
    Minor,
    Patch,
}

impl BumpKind {
    pub const ALL: [BumpKind; 3] = [BumpKind::Major, BumpKind::Minor, BumpKind::Patch];

    /// Map a selection index (as presented by [`BumpCandidates::labels`]) to a kind
    pub fn from_index(index: usize) -> Result<Self> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or_else(|| BumpError::validation("invalid version bump selection"))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BumpKind::Major => "major",
            BumpKind::Minor => "minor",
            BumpKind::Patch => "patch",
        }
    }
}

impl FromStr for BumpKind {
    type Err = BumpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "major" => Ok(BumpKind::Major),
            "minor" => Ok(BumpKind::Minor),
            "patch" => Ok(BumpKind::Patch),
            other => Err(BumpError::validation(format!(
                "invalid bump type '{}' (expected major, minor or patch)",
                other
            ))),
        }
    }
}

impl fmt::Display for BumpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Candidate versions offered to the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BumpCandidates {
    pub major: Version,
    pub minor: Version,
    pub patch: Version,
}

impl BumpCandidates {
    pub fn get(&self, kind: BumpKind) -> &Version {
        match kind {
            BumpKind::Major => &self.major,
            BumpKind::Minor => &self.minor,
            BumpKind::Patch => &self.patch,
        }
    }

    /// Selection labels such as "Minor (v1.3.0)", indexed like [`BumpKind::ALL`]
    pub fn labels(&self, prefix: &str) -> Vec<String> {
        BumpKind::ALL
            .iter()
            .map(|kind| {
                let name = match kind {
                    BumpKind::Major => "Major",
                    BumpKind::Minor => "Minor",
                    BumpKind::Patch => "Patch",
                };
                format!("{} ({}{})", name, prefix, self.get(*kind))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parse() {
        let v = Version::parse("v1.2.3").unwrap();
        assert_eq!(v.major, 1);
        assert_eq!(v.minor, 2);
        assert_eq!(v.patch, 3);
    }

    #[test]
    fn test_version_parse_without_v() {
        let v = Version::parse("1.2.3").unwrap();
        assert_eq!(v, Version::new(1, 2, 3));
    }

    #[test]
    fn test_version_parse_uppercase_v() {
        let v = Version::parse("V1.2.3").unwrap();
        assert_eq!(v, Version::new(1, 2, 3));
    }

    #[test]
    fn test_version_parse_invalid() {
        assert!(Version::parse("1.2").is_err());
        assert!(Version::parse("v1.2.3.4").is_err());
        assert!(Version::parse("release").is_err());
    }

    #[test]
    fn test_version_parse_keeps_metadata() {
        let v = Version::parse("v2.0.0-rc.1+build.5").unwrap();
        assert_eq!(v.pre.as_deref(), Some("rc.1"));
        assert_eq!(v.build.as_deref(), Some("build.5"));
        assert_eq!(v.to_string(), "2.0.0-rc.1+build.5");
    }

    #[test]
    fn test_candidates() {
        let c = Version::new(1, 2, 3).candidates().unwrap();
        assert_eq!(c.major, Version::new(2, 0, 0));
        assert_eq!(c.minor, Version::new(1, 3, 0));
        assert_eq!(c.patch, Version::new(1, 2, 4));
    }

    #[test]
    fn test_increments_drop_metadata() {
        let v = Version::parse("1.2.3-beta.2").unwrap();
        assert_eq!(v.inc_patch().unwrap(), Version::new(1, 2, 4));
        assert_eq!(v.inc_minor().unwrap().to_string(), "1.3.0");
    }

    #[test]
    fn test_version_bump() {
        let v = Version::new(0, 9, 9);
        assert_eq!(v.bump(BumpKind::Major).unwrap(), Version::new(1, 0, 0));
        assert_eq!(v.bump(BumpKind::Minor).unwrap(), Version::new(0, 10, 0));
        assert_eq!(v.bump(BumpKind::Patch).unwrap(), Version::new(0, 9, 10));
    }

    #[test]
    fn test_increment_overflow_is_rejected() {
        let v = Version::parse("v1.2.18446744073709551615").unwrap();
        assert!(matches!(
            v.bump(BumpKind::Patch),
            Err(BumpError::Validation(_))
        ));
        assert!(v.candidates().is_err());
        // Other components are unaffected
        assert_eq!(v.bump(BumpKind::Minor).unwrap(), Version::new(1, 3, 0));

        let v = Version::new(u64::MAX, 0, 0);
        assert!(v.inc_major().is_err());
    }

    #[test]
    fn test_bump_kind_from_str() {
        assert_eq!("major".parse::<BumpKind>().unwrap(), BumpKind::Major);
        assert_eq!("Minor".parse::<BumpKind>().unwrap(), BumpKind::Minor);
        assert_eq!(" PATCH ".parse::<BumpKind>().unwrap(), BumpKind::Patch);
        assert!(matches!(
            "huge".parse::<BumpKind>(),
            Err(BumpError::Validation(_))
        ));
    }

    #[test]
    fn test_bump_kind_from_index() {
        assert_eq!(BumpKind::from_index(0).unwrap(), BumpKind::Major);
        assert_eq!(BumpKind::from_index(2).unwrap(), BumpKind::Patch);
        assert!(matches!(
            BumpKind::from_index(3),
            Err(BumpError::Validation(_))
        ));
    }

    #[test]
    fn test_tag_prefix() {
        assert_eq!(tag_prefix("v1.2.3"), "v");
        assert_eq!(tag_prefix("V1.2.3"), "V");
        assert_eq!(tag_prefix("1.2.3"), "");
    }

    #[test]
    fn test_candidate_labels() {
        let labels = Version::new(1, 2, 3).candidates().unwrap().labels("v");
        assert_eq!(
            labels,
            vec!["Major (v2.0.0)", "Minor (v1.3.0)", "Patch (v1.2.4)"]
        );
    }
}
