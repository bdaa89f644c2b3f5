//! Release version strings (`42.0a1`, `1.1pre2`, `38.0.5`, `1.*`)
//!
//! A version is a `.`-separated list of parts. Each part matches
//! `(-?\d+)(\D+)?(-?\d+)?(\D+)?`, compared component by component:
//! numbers numerically, strings lexically, and a present string sorts before
//! an absent one (`1.1b` < `1.1`). `*` is greater than any number, an empty
//! or missing part reads as `0`, and `N+` means `(N+1)pre`.

use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("Invalid version part: {0:?}")]
    InvalidPart(String),

    #[error("Version has no numeric major: {0:?}")]
    NoMajor(String),
}

pub type Result<T> = std::result::Result<T, VersionError>;

/// One `.`-separated component of a version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionPart {
    /// `*`
    Any,
    Parsed {
        number: i64,
        suffix: Option<String>,
        sub_number: i64,
        sub_suffix: Option<String>,
    },
}

fn part_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(-?[0-9]+)(?:([^0-9]+)(?:(-?[0-9]+)([^0-9]+)?)?)?")
            .expect("version part pattern is valid")
    })
}

impl VersionPart {
    fn zero() -> Self {
        VersionPart::Parsed {
            number: 0,
            suffix: None,
            sub_number: 0,
            sub_suffix: None,
        }
    }

    /// Parse a single part; an empty part is `0`
    pub fn parse(part: &str) -> Result<Self> {
        if part.is_empty() {
            return Ok(Self::zero());
        }
        if part == "*" {
            return Ok(VersionPart::Any);
        }

        let invalid = || VersionError::InvalidPart(part.to_string());
        let caps = part_regex().captures(part).ok_or_else(invalid)?;
        let number: i64 = caps[1].parse().map_err(|_| invalid())?;
        let suffix = caps.get(2).map(|m| m.as_str().to_string());
        let sub_number = match caps.get(3) {
            Some(m) => m.as_str().parse().map_err(|_| invalid())?,
            None => 0,
        };
        let sub_suffix = caps.get(4).map(|m| m.as_str().to_string());

        if suffix.as_deref() == Some("+") {
            return Ok(VersionPart::Parsed {
                number: number.checked_add(1).ok_or_else(invalid)?,
                suffix: Some("pre".to_string()),
                sub_number,
                sub_suffix,
            });
        }

        Ok(VersionPart::Parsed {
            number,
            suffix,
            sub_number,
            sub_suffix,
        })
    }

    fn number(&self) -> Option<i64> {
        match self {
            VersionPart::Any => None,
            VersionPart::Parsed { number, .. } => Some(*number),
        }
    }
}

fn compare_suffix(a: &Option<String>, b: &Option<String>) -> Ordering {
    match (a, b) {
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (a, b) => a.cmp(b),
    }
}

impl Ord for VersionPart {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (VersionPart::Any, VersionPart::Any) => Ordering::Equal,
            (VersionPart::Any, VersionPart::Parsed { .. }) => Ordering::Greater,
            (VersionPart::Parsed { .. }, VersionPart::Any) => Ordering::Less,
            (
                VersionPart::Parsed {
                    number: n1,
                    suffix: s1,
                    sub_number: m1,
                    sub_suffix: t1,
                },
                VersionPart::Parsed {
                    number: n2,
                    suffix: s2,
                    sub_number: m2,
                    sub_suffix: t2,
                },
            ) => n1
                .cmp(n2)
                .then_with(|| compare_suffix(s1, s2))
                .then_with(|| m1.cmp(m2))
                .then_with(|| compare_suffix(t1, t2)),
        }
    }
}

impl PartialOrd for VersionPart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for VersionPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionPart::Any => write!(f, "*"),
            VersionPart::Parsed {
                number,
                suffix,
                sub_number,
                sub_suffix,
            } => {
                write!(f, "{}", number)?;
                if let Some(suffix) = suffix {
                    write!(f, "{}", suffix)?;
                    if *sub_number != 0 || sub_suffix.is_some() {
                        write!(f, "{}", sub_number)?;
                        if let Some(sub_suffix) = sub_suffix {
                            write!(f, "{}", sub_suffix)?;
                        }
                    }
                }
                Ok(())
            }
        }
    }
}

fn parse_parts(version: &str) -> Result<Vec<VersionPart>> {
    version.trim().split('.').map(VersionPart::parse).collect()
}

fn join_parts(parts: &[VersionPart]) -> String {
    parts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// Compare two version strings; missing trailing parts read as `0`
///
/// ```
/// use cerberus::versions::version_compare;
/// use std::cmp::Ordering;
///
/// assert_eq!(version_compare("1.0", "1.0.0").unwrap(), Ordering::Equal);
/// assert_eq!(version_compare("1.1b", "1.1").unwrap(), Ordering::Less);
/// assert_eq!(version_compare("1.10", "1.*").unwrap(), Ordering::Less);
/// ```
pub fn version_compare(a: &str, b: &str) -> Result<Ordering> {
    let a = parse_parts(a)?;
    let b = parse_parts(b)?;
    let zero = VersionPart::zero();

    for i in 0..a.len().max(b.len()) {
        let ordering = a.get(i).unwrap_or(&zero).cmp(b.get(i).unwrap_or(&zero));
        if ordering != Ordering::Equal {
            return Ok(ordering);
        }
    }
    Ok(Ordering::Equal)
}

/// Major number of a version; for `a; b` alternatives the last one counts
pub fn version_get_major(version: &str) -> Result<i64> {
    let last = version.trim().split(';').last().unwrap_or_default().trim();
    let major = last.split('.').next().unwrap_or_default();
    VersionPart::parse(major)?
        .number()
        .ok_or_else(|| VersionError::NoMajor(version.to_string()))
}

/// Add `amount` to the major number, keeping every other component
pub fn version_add_major(version: &str, amount: i64) -> Result<String> {
    let mut parts = parse_parts(version)?;
    match parts.first_mut() {
        Some(VersionPart::Parsed { number, .. }) => {
            *number = number
                .checked_add(amount)
                .ok_or_else(|| VersionError::InvalidPart(version.to_string()))?;
        }
        _ => return Err(VersionError::NoMajor(version.to_string())),
    }
    Ok(join_parts(&parts))
}

/// Name the nightly build that first carries a release version
///
/// `N` and `N.0` become `N.0a1`; anything else is returned unchanged (two-part
/// versions are re-rendered in canonical form).
pub fn version_normalize_nightly(version: &str) -> Result<String> {
    let mut parts = parse_parts(version)?;
    match parts.len() {
        1 => Ok(format!("{}.0a1", version)),
        2 => {
            if matches!(
                &parts[1],
                VersionPart::Parsed { number: 0, suffix: None, .. }
            ) {
                parts[1] = VersionPart::Parsed {
                    number: 0,
                    suffix: Some("a".to_string()),
                    sub_number: 1,
                    sub_suffix: None,
                };
            }
            Ok(join_parts(&parts))
        }
        _ => Ok(version.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_ordered_chain() {
        // Each version is less than or equal to the next
        let chain = [
            ("1.-1", "1", Ordering::Less),
            ("1", "1.", Ordering::Equal),
            ("1.", "1.0", Ordering::Equal),
            ("1.0", "1.0.0", Ordering::Equal),
            ("1.0.0", "1.1a", Ordering::Less),
            ("1.1a", "1.1aa", Ordering::Less),
            ("1.1aa", "1.1ab", Ordering::Less),
            ("1.1ab", "1.1b", Ordering::Less),
            ("1.1b", "1.1c", Ordering::Less),
            ("1.1c", "1.1pre", Ordering::Less),
            ("1.1pre", "1.1pre0", Ordering::Equal),
            ("1.1pre0", "1.0+", Ordering::Equal),
            ("1.0+", "1.1pre1a", Ordering::Less),
            ("1.1pre1a", "1.1pre1aa", Ordering::Less),
            ("1.1pre1aa", "1.1pre1b", Ordering::Less),
            ("1.1pre1b", "1.1pre1", Ordering::Less),
            ("1.1pre1", "1.1pre2", Ordering::Less),
            ("1.1pre2", "1.1pre10", Ordering::Less),
            ("1.1pre10", "1.1.-1", Ordering::Less),
            ("1.1.-1", "1.1", Ordering::Less),
            ("1.1", "1.1.0", Ordering::Equal),
            ("1.1.0", "1.1.00", Ordering::Equal),
            ("1.1.00", "1.10", Ordering::Less),
            ("1.10", "1.*", Ordering::Less),
            ("1.*", "1.*.1", Ordering::Less),
            ("1.*.1", "2.0", Ordering::Less),
        ];

        for (a, b, expected) in chain {
            assert_eq!(version_compare(a, b).unwrap(), expected, "{} vs {}", a, b);
            assert_eq!(
                version_compare(b, a).unwrap(),
                expected.reverse(),
                "{} vs {}",
                b,
                a
            );
        }
    }

    #[test]
    fn test_compare_rejects_garbage() {
        assert_eq!(
            version_compare("abc", "1"),
            Err(VersionError::InvalidPart("abc".to_string()))
        );
    }

    #[test]
    fn test_plus_suffix_at_numeric_limit_rejected() {
        let part = format!("{}+", i64::MAX);
        assert_eq!(
            VersionPart::parse(&part),
            Err(VersionError::InvalidPart(part.clone()))
        );
        assert!(version_compare(&part, "1").is_err());
        assert!(version_add_major(&i64::MAX.to_string(), 1).is_err());
    }

    #[test]
    fn test_add_major() {
        assert_eq!(version_add_major("42.0.1", 1).unwrap(), "43.0.1");
        assert_eq!(version_add_major("42", 1000).unwrap(), "1042");
        assert_eq!(version_add_major("42.0", 1).unwrap(), "43.0");
        assert_eq!(version_add_major("0.0.0", 1).unwrap(), "1.0.0");
        assert_eq!(version_add_major("42.0a", 1).unwrap(), "43.0a");
        assert_eq!(version_add_major("42.0a1", 1).unwrap(), "43.0a1");
        assert_eq!(version_add_major("42.0a1b", 1).unwrap(), "43.0a1b");
        assert_eq!(version_add_major("1a2b.3c4d.5e6f", 1).unwrap(), "2a2b.3c4d.5e6f");
    }

    #[test]
    fn test_get_major() {
        assert_eq!(version_get_major("42.0.1").unwrap(), 42);
        assert_eq!(version_get_major("42").unwrap(), 42);
        assert_eq!(version_get_major("42.0").unwrap(), 42);
        assert_eq!(version_get_major("0.0.0").unwrap(), 0);
        assert_eq!(version_get_major("42.0a").unwrap(), 42);
        assert_eq!(version_get_major("42.0a1b").unwrap(), 42);
        assert_eq!(version_get_major("1a2b.3c4d.5e6f").unwrap(), 1);
        assert_eq!(version_get_major("52.9; 60.1").unwrap(), 60);
        assert!(version_get_major("*").is_err());
    }

    #[test]
    fn test_normalize_nightly() {
        assert_eq!(version_normalize_nightly("42").unwrap(), "42.0a1");
        assert_eq!(version_normalize_nightly("42.0").unwrap(), "42.0a1");
        assert_eq!(version_normalize_nightly("42.0a").unwrap(), "42.0a");
        assert_eq!(version_normalize_nightly("42.0a1").unwrap(), "42.0a1");
        assert_eq!(version_normalize_nightly("42.1").unwrap(), "42.1");
        assert_eq!(version_normalize_nightly("38.0.5").unwrap(), "38.0.5");
    }
}
