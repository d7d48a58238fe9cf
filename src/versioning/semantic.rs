//! Semantic version parsing and ordering.
//!
//! Accepts `major.minor.patch[-prerelease]`, optionally prefixed with `v`.
//! Build metadata is rejected. A pre-release sorts below its release;
//! pre-release tags compare lexicographically as whole strings.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use semver::Version;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SemanticVersion(Version);

impl SemanticVersion {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(Version::new(major, minor, patch))
    }

    /// Parse a version string.
    ///
    /// - "1.2.3" → (1, 2, 3)
    /// - "v1.2.3-beta.1" → (1, 2, 3, "beta.1")
    /// - "1.2", "1.2.x", "1.2.3-", "1.2.3+build" → None
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let s = s.strip_prefix('v').unwrap_or(s);

        let version = Version::parse(s).ok()?;
        if !version.build.is_empty() {
            return None;
        }
        Some(Self(version))
    }

    pub fn major(&self) -> u64 {
        self.0.major
    }

    pub fn minor(&self) -> u64 {
        self.0.minor
    }

    pub fn patch(&self) -> u64 {
        self.0.patch
    }

    pub fn prerelease(&self) -> Option<&str> {
        (!self.0.pre.is_empty()).then(|| self.0.pre.as_str())
    }

    pub fn is_prerelease(&self) -> bool {
        !self.0.pre.is_empty()
    }

    /// Same major, minor and patch
    pub fn same_release(&self, other: &Self) -> bool {
        (self.major(), self.minor(), self.patch()) == (other.major(), other.minor(), other.patch())
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SemanticVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid semantic version: {}", s))
    }
}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Not `Version`'s own order: its pre-release identifiers compare
// numerically, here the whole tag compares as a string.
impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major()
            .cmp(&other.major())
            .then(self.minor().cmp(&other.minor()))
            .then(self.patch().cmp(&other.patch()))
            .then_with(|| match (self.prerelease(), other.prerelease()) {
                (None, None) => Ordering::Equal,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

/// Order two version strings by semver.
///
/// Unparseable strings sort below every valid version, and among
/// themselves by plain string order.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (SemanticVersion::parse(a), SemanticVersion::parse(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}
