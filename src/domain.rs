use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

static SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_+][A-Za-z0-9._+\-]*$").unwrap());

/// Checks that `value` can be joined onto a URL as a single relative segment.
///
/// Anything with a slash, a colon or a leading dot is rejected, so a join can
/// never replace the base with an absolute or parent reference.
pub fn validate_segment(kind: &'static str, value: &str) -> Result<(), FetchError> {
    if SEGMENT.is_match(value) {
        Ok(())
    } else {
        Err(FetchError::InvalidSegment {
            kind,
            value: value.to_string(),
        })
    }
}

/// Group ids are dotted; each dotted part must be a valid segment.
pub fn validate_group(group: &str) -> Result<(), FetchError> {
    let valid = !group.is_empty() && group.split('.').all(|part| SEGMENT.is_match(part));
    if valid {
        Ok(())
    } else {
        Err(FetchError::InvalidSegment {
            kind: "group",
            value: group.to_string(),
        })
    }
}

/// Platform token of the running host, in repository classifier spelling.
pub fn detect_platform() -> &'static str {
    match std::env::consts::OS {
        "macos" => "mac",
        "windows" => "win",
        "linux" => "linux",
        other => other,
    }
}

/// A platform variant of an artifact.
///
/// Two classifiers are equal when they resolve to the same token, so
/// `Detect` on a Linux host is the same classifier as `Linux`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Classifier {
    Mac,
    Windows,
    Linux,
    Named(String),
    Detect,
}

impl Classifier {
    pub fn all() -> [Classifier; 3] {
        [Classifier::Mac, Classifier::Windows, Classifier::Linux]
    }

    pub fn token(&self) -> Cow<'_, str> {
        match self {
            Classifier::Mac => Cow::Borrowed("mac"),
            Classifier::Windows => Cow::Borrowed("win"),
            Classifier::Linux => Cow::Borrowed("linux"),
            Classifier::Named(name) => Cow::Borrowed(name.as_str()),
            Classifier::Detect => Cow::Borrowed(detect_platform()),
        }
    }
}

impl PartialEq for Classifier {
    fn eq(&self, other: &Self) -> bool {
        self.token() == other.token()
    }
}

impl Eq for Classifier {}

impl Hash for Classifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.token().hash(state);
    }
}

impl PartialOrd for Classifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Classifier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.token().cmp(&other.token())
    }
}

impl fmt::Display for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}

impl FromStr for Classifier {
    type Err = FetchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        match normalized.as_str() {
            "mac" | "macos" | "osx" => Ok(Classifier::Mac),
            "win" | "windows" => Ok(Classifier::Windows),
            "linux" => Ok(Classifier::Linux),
            "detect" | "auto" => Ok(Classifier::Detect),
            _ => {
                validate_segment("classifier", &normalized)
                    .map_err(|_| FetchError::InvalidClassifier(value.to_string()))?;
                Ok(Classifier::Named(normalized))
            }
        }
    }
}

impl TryFrom<String> for Classifier {
    type Error = FetchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Classifier> for String {
    fn from(value: Classifier) -> Self {
        match value {
            Classifier::Detect => "detect".to_string(),
            other => other.token().into_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    #[default]
    Jar,
    Zip,
    Gzip,
}

impl ArchiveFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ArchiveFormat::Jar => "jar",
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Gzip => "gz",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveFormat::Jar => write!(f, "jar"),
            ArchiveFormat::Zip => write!(f, "zip"),
            ArchiveFormat::Gzip => write!(f, "gzip"),
        }
    }
}

impl FromStr for ArchiveFormat {
    type Err = FetchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "jar" => Ok(ArchiveFormat::Jar),
            "zip" => Ok(ArchiveFormat::Zip),
            "gz" | "gzip" => Ok(ArchiveFormat::Gzip),
            _ => Err(FetchError::InvalidFormat(value.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn detect_equals_host_platform() {
        let host: Classifier = detect_platform().parse().unwrap();
        assert_eq!(Classifier::Detect, host);

        let set: HashSet<Classifier> = [Classifier::Detect, host].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn parse_classifier_aliases() {
        assert_eq!("Windows".parse::<Classifier>().unwrap(), Classifier::Windows);
        assert_eq!("osx".parse::<Classifier>().unwrap(), Classifier::Mac);
        assert_matches!("auto".parse::<Classifier>().unwrap(), Classifier::Detect);
        assert_eq!(
            "linux-aarch64".parse::<Classifier>().unwrap().token(),
            "linux-aarch64"
        );
    }

    #[test]
    fn parse_classifier_invalid() {
        let err = "../win".parse::<Classifier>().unwrap_err();
        assert_matches!(err, FetchError::InvalidClassifier(_));
    }

    #[test]
    fn segments_reject_references() {
        assert!(validate_segment("version", "18-ea+3").is_ok());
        assert!(validate_segment("version", "..").is_err());
        assert!(validate_segment("project", "http:").is_err());
        assert!(validate_segment("project", "/etc").is_err());
        assert!(validate_group("org.openjfx").is_ok());
        assert!(validate_group("org..openjfx").is_err());
        assert!(validate_group("").is_err());
    }
}
