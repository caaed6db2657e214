use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// An app or OS version as a `(major, minor, patch, build)` tuple.
///
/// Parsing is permissive past the major component: a missing or non-numeric
/// minor, patch, or build segment reads as `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub build: u64,
}

impl Version {
    #[must_use]
    pub fn new(major: u64, minor: u64, patch: u64, build: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            build,
        }
    }

    /// Parse `"<major>[.<minor>[.<patch>]][-<build>]"`.
    ///
    /// # Errors
    /// Returns [`VersionParseError::InvalidFormat`] for an empty input and
    /// [`VersionParseError::InvalidMajor`] when the major component is not an
    /// unsigned integer.
    pub fn parse(input: &str) -> Result<Self, VersionParseError> {
        let trimmed = input.trim();
        let (core, build) = match trimmed.split_once('-') {
            Some((core, build)) => (core, Some(build)),
            None => (trimmed, None),
        };

        if core.is_empty() {
            return Err(VersionParseError::InvalidFormat {
                input: input.to_string(),
            });
        }

        let mut parts = core.split('.');
        let major_str = parts.next().unwrap_or_default();
        let major = major_str
            .bytes()
            .all(|byte| byte.is_ascii_digit())
            .then(|| major_str.parse().ok())
            .flatten()
            .ok_or_else(|| VersionParseError::InvalidMajor {
                value: major_str.to_string(),
            })?;

        Ok(Self {
            major,
            minor: lenient_component(parts.next()),
            patch: lenient_component(parts.next()),
            build: lenient_component(build),
        })
    }

    /// The greater of two versions.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        std::cmp::max(self, other)
    }
}

fn lenient_component(part: Option<&str>) -> u64 {
    part.and_then(|value| value.trim().parse().ok())
        .unwrap_or_default()
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then(self.build.cmp(&other.build))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}-{}",
            self.major, self.minor, self.patch, self.build
        )
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionParseError {
    #[error("Expected <major>[.<minor>[.<patch>]][-<build>], got: {input:?}")]
    InvalidFormat { input: String },
    #[error("Invalid major version: {value:?}")]
    InvalidMajor { value: String },
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct VersionVisitor;

impl Visitor<'_> for VersionVisitor {
    type Value = Version;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a version string such as \"1.2.3-4\"")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Version, E> {
        Version::parse(value).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(VersionVisitor)
    }
}
