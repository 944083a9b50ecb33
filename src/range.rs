// SPDX-License-Identifier: MPL-2.0

//! Parsing of version range strings into interval sets.

use std::str::FromStr;

use thiserror::Error;
use version_interval::IntervalSet;

use crate::version::Version;

/// Error returned when a range string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeParseError {
    #[error("empty constraint in `{0}`")]
    EmptyConstraint(String),
    #[error("invalid version `{0}` in range")]
    InvalidVersion(String),
}

/// Parses a version range string.
///
/// Supported syntax:
/// - comparison operators `>=`, `>`, `<=`, `<`, `==`, `!=`, `=`
/// - comma-separated conjunctions: `">=1.0.0, <2.0.0"`
/// - `||`-separated disjunctions: `">=1.0.0 || >=3.0.0"`
/// - `"*"` (or an empty string) for any version
/// - a bare version as shorthand for equality
///
/// ```
/// use depsolve::{parse_range, IntervalSet, SemanticVersion};
///
/// let range: IntervalSet<SemanticVersion> = parse_range(">=1.0.0, <2.0.0").unwrap();
/// assert!(range.contains(&"1.5.0".parse().unwrap()));
/// assert!(!range.contains(&"2.0.0".parse().unwrap()));
/// ```
pub fn parse_range<V>(input: &str) -> Result<IntervalSet<V>, RangeParseError>
where
    V: Version + FromStr,
{
    let input = input.trim();
    if input.is_empty() || input == "*" {
        return Ok(IntervalSet::full());
    }

    let mut result = IntervalSet::empty();
    for branch in input.split("||") {
        let branch = branch.trim();
        if branch.is_empty() {
            return Err(RangeParseError::EmptyConstraint(input.to_string()));
        }

        let mut current = IntervalSet::full();
        for token in branch.split(',') {
            let token = token.trim();
            if token.is_empty() {
                return Err(RangeParseError::EmptyConstraint(branch.to_string()));
            }
            current = current.intersection(&parse_expression(token)?);
            if current.is_empty() {
                break;
            }
        }

        result = result.union(&current);
    }

    Ok(result)
}

/// Parses a single expression like `>=1.0.0` or `!=2.0.0`.
fn parse_expression<V>(expression: &str) -> Result<IntervalSet<V>, RangeParseError>
where
    V: Version + FromStr,
{
    let parse_version = |raw: &str| -> Result<V, RangeParseError> {
        let raw = raw.trim();
        raw.parse()
            .map_err(|_| RangeParseError::InvalidVersion(raw.to_string()))
    };

    type Builder<V> = fn(V) -> IntervalSet<V>;
    let operators: [(&str, Builder<V>); 7] = [
        (">=", IntervalSet::higher_than),
        (">", IntervalSet::strictly_higher_than),
        ("<=", IntervalSet::lower_than),
        ("<", IntervalSet::strictly_lower_than),
        ("==", IntervalSet::singleton),
        ("!=", |v| IntervalSet::singleton(v).complement()),
        ("=", IntervalSet::singleton),
    ];

    for (prefix, build) in operators {
        if let Some(rest) = expression.strip_prefix(prefix) {
            return Ok(build(parse_version(rest)?));
        }
    }

    // No operator: an exact version.
    Ok(IntervalSet::singleton(parse_version(expression)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::SemanticVersion;

    fn semver(s: &str) -> SemanticVersion {
        s.parse().unwrap()
    }

    #[test]
    fn wildcard_and_empty() {
        assert_eq!(parse_range::<u32>("*").unwrap(), IntervalSet::full());
        assert_eq!(parse_range::<u32>("  ").unwrap(), IntervalSet::full());
    }

    #[test]
    fn single_operators() {
        assert_eq!(parse_range::<u32>(">=3").unwrap(), IntervalSet::higher_than(3));
        assert_eq!(
            parse_range::<u32>(">3").unwrap(),
            IntervalSet::strictly_higher_than(3)
        );
        assert_eq!(parse_range::<u32>("<=3").unwrap(), IntervalSet::lower_than(3));
        assert_eq!(
            parse_range::<u32>("<3").unwrap(),
            IntervalSet::strictly_lower_than(3)
        );
        assert_eq!(parse_range::<u32>("==3").unwrap(), IntervalSet::singleton(3));
        assert_eq!(parse_range::<u32>("=3").unwrap(), IntervalSet::singleton(3));
        assert_eq!(parse_range::<u32>("3").unwrap(), IntervalSet::singleton(3));
        assert_eq!(
            parse_range::<u32>("!=3").unwrap(),
            IntervalSet::singleton(3).complement()
        );
    }

    #[test]
    fn conjunction() {
        let range = parse_range::<SemanticVersion>(">=1.0.0, <2.0.0").unwrap();
        assert!(range.contains(&semver("1.0.0")));
        assert!(range.contains(&semver("1.9.9")));
        assert!(!range.contains(&semver("2.0.0")));
        assert!(!range.contains(&semver("0.9.0")));
    }

    #[test]
    fn disjunction() {
        let range = parse_range::<SemanticVersion>("<1.0.0 || >=2.0.0").unwrap();
        assert!(range.contains(&semver("0.5.0")));
        assert!(!range.contains(&semver("1.5.0")));
        assert!(range.contains(&semver("2.0.0")));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            parse_range::<u32>(">=1 || "),
            Err(RangeParseError::EmptyConstraint(_))
        ));
        assert!(matches!(
            parse_range::<u32>(">=1,,<2"),
            Err(RangeParseError::EmptyConstraint(_))
        ));
        assert!(matches!(
            parse_range::<u32>(">=abc"),
            Err(RangeParseError::InvalidVersion(_))
        ));
    }
}
