// SPDX-License-Identifier: MPL-2.0

//! Trait for versions and a semantic version implementation.

use std::cmp::Ordering;
use std::fmt::{self, Debug, Display};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use thiserror::Error;

/// Trait for package versions.
///
/// The solver only requires a total order: two versions are "the same"
/// exactly when the ordering reports them equal. It is automatically
/// implemented for any type that fits, such as `u32`, `String` (lexical
/// ordering) or [`SemanticVersion`].
pub trait Version: Clone + Ord + Debug + Display {}

impl<T: Clone + Ord + Debug + Display> Version for T {}

/// A semantic version: `major.minor.patch` with optional prerelease and
/// build metadata.
///
/// Precedence follows the semver rules: numeric fields compare numerically,
/// a prerelease sorts below the corresponding release, and dotted
/// prerelease identifiers compare piecewise with numeric identifiers below
/// alphanumeric ones. Build metadata never affects ordering, so it is also
/// ignored by equality and hashing.
#[derive(Debug, Clone, Default)]
pub struct SemanticVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: Option<String>,
    pub build: Option<String>,
}

impl SemanticVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        SemanticVersion {
            major,
            minor,
            patch,
            prerelease: None,
            build: None,
        }
    }

    pub fn with_prerelease(major: u64, minor: u64, patch: u64, prerelease: &str) -> Self {
        SemanticVersion {
            major,
            minor,
            patch,
            prerelease: Some(prerelease.to_string()),
            build: None,
        }
    }
}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => compare_prerelease(a, b),
            })
    }
}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SemanticVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SemanticVersion {}

impl Hash for SemanticVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.major.hash(state);
        self.minor.hash(state);
        self.patch.hash(state);
        self.prerelease.hash(state);
    }
}

/// Compare dotted prerelease identifiers.
///
/// Identifiers are compared pairwise: numeric against numeric compares
/// numerically, numeric sorts below alphanumeric, and alphanumeric pairs
/// compare lexically. When all shared identifiers tie, the shorter list
/// has lower precedence.
fn compare_prerelease(a: &str, b: &str) -> Ordering {
    let a_parts: Vec<&str> = a.split('.').collect();
    let b_parts: Vec<&str> = b.split('.').collect();

    for (a_part, b_part) in a_parts.iter().zip(b_parts.iter()) {
        let ordering = match (a_part.parse::<u64>(), b_part.parse::<u64>()) {
            (Ok(a_num), Ok(b_num)) => a_num.cmp(&b_num),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => a_part.cmp(b_part),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    a_parts.len().cmp(&b_parts.len())
}

impl Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(prerelease) = &self.prerelease {
            write!(f, "-{prerelease}")?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{build}")?;
        }
        Ok(())
    }
}

/// Error returned when a semantic version string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid semantic version `{input}`")]
pub struct InvalidVersion {
    input: String,
}

impl FromStr for SemanticVersion {
    type Err = InvalidVersion;

    /// Parses strings like `1.2.3`, `1.2`, `1.2.3-alpha.1` or `1.2.3+build`.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidVersion {
            input: input.to_string(),
        };

        let (version_part, build) = match input.split_once('+') {
            Some((version, build)) => (version, Some(build.to_string())),
            None => (input, None),
        };
        let (core, prerelease) = match version_part.split_once('-') {
            Some((core, prerelease)) => (core, Some(prerelease.to_string())),
            None => (version_part, None),
        };

        let mut numbers = core.split('.');
        let mut next_number = |required: bool| -> Result<u64, InvalidVersion> {
            match numbers.next() {
                Some(part) => part.parse().map_err(|_| invalid()),
                None if required => Err(invalid()),
                None => Ok(0),
            }
        };

        let major = next_number(true)?;
        let minor = next_number(false)?;
        let patch = next_number(false)?;
        if numbers.next().is_some() {
            return Err(invalid());
        }

        Ok(SemanticVersion {
            major,
            minor,
            patch,
            prerelease,
            build,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> SemanticVersion {
        s.parse().unwrap()
    }

    #[test]
    fn parses_core_versions() {
        assert_eq!(v("1.2.3"), SemanticVersion::new(1, 2, 3));
        assert_eq!(v("2"), SemanticVersion::new(2, 0, 0));
        assert_eq!(v("2.1"), SemanticVersion::new(2, 1, 0));
        assert!("".parse::<SemanticVersion>().is_err());
        assert!("1.2.3.4".parse::<SemanticVersion>().is_err());
        assert!("a.b.c".parse::<SemanticVersion>().is_err());
    }

    #[test]
    fn parses_prerelease_and_build() {
        let version = v("1.2.3-alpha.1+build.5");
        assert_eq!(version.prerelease.as_deref(), Some("alpha.1"));
        assert_eq!(version.build.as_deref(), Some("build.5"));
        assert_eq!(version.to_string(), "1.2.3-alpha.1+build.5");
    }

    #[test]
    fn orders_numeric_fields() {
        assert!(v("1.0.0") < v("2.0.0"));
        assert!(v("2.0.0") < v("2.1.0"));
        assert!(v("2.1.0") < v("2.1.1"));
        assert!(v("2.10.1") > v("2.9.9"));
    }

    #[test]
    fn prerelease_sorts_below_release() {
        assert!(v("1.0.0-alpha") < v("1.0.0"));
        assert!(v("1.0.0-alpha") < v("1.0.0-beta"));
        assert!(v("1.0.0-alpha.1") < v("1.0.0-alpha.2"));
        assert!(v("1.0.0-alpha.2") < v("1.0.0-alpha.10"));
        assert!(v("1.0.0-1") < v("1.0.0-alpha"));
        assert!(v("1.0.0-alpha") < v("1.0.0-alpha.1"));
    }

    #[test]
    fn build_metadata_is_ignored() {
        assert_eq!(v("1.0.0+linux"), v("1.0.0+darwin"));
        assert_eq!(v("1.0.0+linux").cmp(&v("1.0.0")), Ordering::Equal);
    }
}
