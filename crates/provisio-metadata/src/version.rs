//! Structured versions (`major.minor.micro[.qualifier]`) and version ranges.

use crate::MetadataError;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A comparable four-segment version.
///
/// Missing numeric segments default to zero, so `"1.2"` parses as `1.2.0`.
/// Versions order numerically by segment and then by qualifier, with the
/// empty qualifier sorting first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Version {
    major: u32,
    minor: u32,
    micro: u32,
    qualifier: String,
}

impl Version {
    pub fn new(major: u32, minor: u32, micro: u32) -> Self {
        Self {
            major,
            minor,
            micro,
            qualifier: String::new(),
        }
    }

    pub fn with_qualifier(
        major: u32,
        minor: u32,
        micro: u32,
        qualifier: impl Into<String>,
    ) -> Result<Self, MetadataError> {
        let qualifier = qualifier.into();
        validate_qualifier(&qualifier, &qualifier)?;
        Ok(Self {
            major,
            minor,
            micro,
            qualifier,
        })
    }

    /// The `0.0.0` version.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn parse(input: &str) -> Result<Self, MetadataError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(Self::empty());
        }

        let mut segments = trimmed.splitn(4, '.');
        let mut numeric = [0u32; 3];
        for slot in &mut numeric {
            match segments.next() {
                Some(segment) => {
                    *slot = segment
                        .parse()
                        .map_err(|_| MetadataError::InvalidVersion(input.to_owned()))?;
                }
                None => break,
            }
        }
        let qualifier = segments.next().unwrap_or("").to_owned();
        validate_qualifier(input, &qualifier)?;

        Ok(Self {
            major: numeric[0],
            minor: numeric[1],
            micro: numeric[2],
            qualifier,
        })
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    pub fn micro(&self) -> u32 {
        self.micro
    }

    pub fn qualifier(&self) -> &str {
        &self.qualifier
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::empty()
    }
}

fn validate_qualifier(input: &str, qualifier: &str) -> Result<(), MetadataError> {
    if qualifier
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    {
        Ok(())
    } else {
        Err(MetadataError::InvalidVersion(input.to_owned()))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.micro.cmp(&other.micro))
            .then_with(|| self.qualifier.cmp(&other.qualifier))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if !self.qualifier.is_empty() {
            write!(f, ".{}", self.qualifier)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// An interval of versions, written `[1.0.0,2.0.0)` or as a bare minimum `1.0.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRange {
    min: Version,
    include_min: bool,
    max: Option<Version>,
    include_max: bool,
}

impl VersionRange {
    /// The range matching every version.
    pub fn any() -> Self {
        Self {
            min: Version::empty(),
            include_min: true,
            max: None,
            include_max: false,
        }
    }

    /// The range `[version, version]`.
    pub fn exact(version: Version) -> Self {
        Self {
            min: version.clone(),
            include_min: true,
            max: Some(version),
            include_max: true,
        }
    }

    pub fn new(
        min: Version,
        include_min: bool,
        max: Option<Version>,
        include_max: bool,
    ) -> Result<Self, MetadataError> {
        if let Some(ref upper) = max {
            if *upper < min {
                return Err(MetadataError::InvalidRange(format!(
                    "upper bound {upper} is below lower bound {min}"
                )));
            }
        }
        Ok(Self {
            min,
            include_min,
            max,
            include_max,
        })
    }

    pub fn parse(input: &str) -> Result<Self, MetadataError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(Self::any());
        }

        let include_min = match trimmed.as_bytes()[0] {
            b'[' => true,
            b'(' => false,
            _ => {
                let min = Version::parse(trimmed)
                    .map_err(|_| MetadataError::InvalidRange(input.to_owned()))?;
                return Self::new(min, true, None, false);
            }
        };
        let include_max = match trimmed.as_bytes()[trimmed.len() - 1] {
            b']' => true,
            b')' => false,
            _ => return Err(MetadataError::InvalidRange(input.to_owned())),
        };

        let inner = &trimmed[1..trimmed.len() - 1];
        let Some((lower, upper)) = inner.split_once(',') else {
            return Err(MetadataError::InvalidRange(input.to_owned()));
        };
        let min =
            Version::parse(lower).map_err(|_| MetadataError::InvalidRange(input.to_owned()))?;
        if upper.trim().is_empty() {
            return Self::new(min, include_min, None, false);
        }
        let max =
            Version::parse(upper).map_err(|_| MetadataError::InvalidRange(input.to_owned()))?;
        Self::new(min, include_min, Some(max), include_max)
    }

    pub fn min(&self) -> &Version {
        &self.min
    }

    pub fn max(&self) -> Option<&Version> {
        self.max.as_ref()
    }

    pub fn includes_min(&self) -> bool {
        self.include_min
    }

    pub fn includes_max(&self) -> bool {
        self.include_max
    }

    pub fn includes(&self, version: &Version) -> bool {
        let above_min = if self.include_min {
            *version >= self.min
        } else {
            *version > self.min
        };
        let below_max = match self.max {
            None => true,
            Some(ref max) if self.include_max => version <= max,
            Some(ref max) => version < max,
        };
        above_min && below_max
    }
}

impl Default for VersionRange {
    fn default() -> Self {
        Self::any()
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            None if self.include_min => write!(f, "{}", self.min),
            None => write!(f, "({},)", self.min),
            Some(ref max) => write!(
                f,
                "{}{},{}{}",
                if self.include_min { '[' } else { '(' },
                self.min,
                max,
                if self.include_max { ']' } else { ')' }
            ),
        }
    }
}

impl FromStr for VersionRange {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn parse_fills_missing_segments() {
        assert_eq!(v("1"), Version::new(1, 0, 0));
        assert_eq!(v("1.2"), Version::new(1, 2, 0));
        assert_eq!(v("1.2.3"), Version::new(1, 2, 3));
        assert_eq!(v("1.2.3.v2024").qualifier(), "v2024");
        assert!(v("").is_empty());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Version::parse("one.two").is_err());
        assert!(Version::parse("1.2.3.bad.qual").is_err());
        assert!(Version::parse("1.-2").is_err());
    }

    #[test]
    fn qualifier_sorts_after_bare_version() {
        assert!(v("1.0.0") < v("1.0.0.a"));
        assert!(v("1.0.0.a") < v("1.0.0.b"));
        assert!(v("1.0.0.zzz") < v("1.0.1"));
        assert!(v("1.10.0") > v("1.9.0"));
    }

    #[test]
    fn display_roundtrips() {
        assert_eq!(v("3.4").to_string(), "3.4.0");
        assert_eq!(v("3.4.5.I2009").to_string(), "3.4.5.I2009");
    }

    #[test]
    fn range_bare_version_is_open_ended() {
        let r = VersionRange::parse("1.0.0").unwrap();
        assert!(r.includes(&v("1.0.0")));
        assert!(r.includes(&v("99.0.0")));
        assert!(!r.includes(&v("0.9.9")));
        assert_eq!(r.to_string(), "1.0.0");
    }

    #[test]
    fn range_bounds_are_respected() {
        let r = VersionRange::parse("[1.0.0,2.0.0)").unwrap();
        assert!(r.includes(&v("1.0.0")));
        assert!(r.includes(&v("1.9.9.q")));
        assert!(!r.includes(&v("2.0.0")));

        let r = VersionRange::parse("(1.0.0,2.0.0]").unwrap();
        assert!(!r.includes(&v("1.0.0")));
        assert!(r.includes(&v("2.0.0")));
        assert_eq!(r.to_string(), "(1.0.0,2.0.0]");
    }

    #[test]
    fn range_rejects_malformed_input() {
        assert!(VersionRange::parse("[1.0.0").is_err());
        assert!(VersionRange::parse("[1.0.0 2.0.0]").is_err());
        assert!(VersionRange::parse("[2.0.0,1.0.0]").is_err());
    }

    #[test]
    fn empty_range_matches_everything() {
        let r = VersionRange::parse("").unwrap();
        assert_eq!(r, VersionRange::any());
        assert!(r.includes(&Version::empty()));
    }

    #[test]
    fn exact_range_matches_one_version() {
        let r = VersionRange::exact(v("1.2.3"));
        assert!(r.includes(&v("1.2.3")));
        assert!(!r.includes(&v("1.2.3.a")));
    }
}
