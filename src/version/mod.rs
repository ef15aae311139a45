// src/version/mod.rs

//! Date-based package versions
//!
//! Packages built from an unreleased tree are versioned by the date of the
//! source they were built from: `0.pre+date=YYYY-MM-DD`. The date comes from
//! a compact timestamp (`YYYYMMDD...`, e.g. `20240115103000`), so two builds
//! on different calendar days always order correctly while two builds on
//! the same day share a version.

use crate::error::{Error, Result};
use crate::source::SourceTree;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Layout used when rendering a timestamp for [`derive_version`]
pub const COMPACT_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Date fields sliced from a build timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VersionInfo {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

impl VersionInfo {
    /// Version info for the calendar date of `datetime`
    pub fn from_datetime(datetime: DateTime<Utc>) -> Self {
        let date = datetime.date_naive();
        Self {
            year: date.year() as u16,
            month: date.month() as u8,
            day: date.day() as u8,
        }
    }

    /// The date as `YYYY-MM-DD`
    pub fn date(&self) -> String {
        format!("{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }

    /// Strict semver rendering for tools that reject `0.pre`
    ///
    /// `0.pre+date=2024-01-15` becomes `0.0.0-pre+date.2024-01-15`.
    pub fn to_semver(&self) -> Result<semver::Version> {
        let rendered = format!("0.0.0-pre+date.{}", self.date());
        semver::Version::parse(&rendered)
            .map_err(|e| Error::ParseError(format!("Invalid semver '{}': {}", rendered, e)))
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0.pre+date={}", self.date())
    }
}

/// Derive the package version from a compact timestamp
///
/// year = chars `[0..4]`, month = `[4..6]`, day = `[6..8]`; anything after the
/// first eight characters is ignored.
pub fn derive_version(timestamp: &str) -> Result<VersionInfo> {
    let malformed = |reason: String| Error::MalformedTimestamp {
        timestamp: timestamp.to_string(),
        reason,
    };

    let head: Vec<char> = timestamp.chars().take(8).collect();
    if head.len() < 8 {
        return Err(malformed(format!(
            "expected at least 8 characters (YYYYMMDD), got {}",
            head.len()
        )));
    }
    if let Some(bad) = head.iter().find(|c| !c.is_ascii_digit()) {
        return Err(malformed(format!("non-digit '{}' in date prefix", bad)));
    }

    // All eight are ASCII digits, so byte offsets equal char offsets here.
    let year: u16 = parse_digits(&timestamp[0..4]);
    let month: u8 = parse_digits(&timestamp[4..6]) as u8;
    let day: u8 = parse_digits(&timestamp[6..8]) as u8;

    if NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32).is_none() {
        return Err(malformed(format!(
            "{:04}-{:02}-{:02} is not a calendar date",
            year, month, day
        )));
    }

    Ok(VersionInfo { year, month, day })
}

fn parse_digits(digits: &str) -> u16 {
    digits
        .bytes()
        .fold(0u16, |acc, b| acc * 10 + u16::from(b - b'0'))
}

/// Render `datetime` in the layout [`derive_version`] accepts
pub fn compact_timestamp(datetime: DateTime<Utc>) -> String {
    datetime.format(COMPACT_TIMESTAMP_FORMAT).to_string()
}

/// Compact timestamp of the newest entry in a filtered source tree
pub fn source_timestamp(tree: &SourceTree) -> Option<String> {
    tree.last_modified().map(compact_timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_derive_version_scenario() {
        let version = derive_version("20240115T103000").unwrap();
        assert_eq!(version.to_string(), "0.pre+date=2024-01-15");
        assert_eq!(
            version,
            VersionInfo {
                year: 2024,
                month: 1,
                day: 15
            }
        );
    }

    #[test]
    fn test_source_timestamp_round_trips_through_derive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.rs"), "fn main() {}\n").unwrap();
        let tree =
            crate::source::filter_source(dir.path(), &crate::source::ExcludeRules::default())
                .unwrap();

        let stamp = source_timestamp(&tree).unwrap();
        assert_eq!(stamp.len(), 14);
        let version = derive_version(&stamp).unwrap();
        assert_eq!(
            version,
            VersionInfo::from_datetime(tree.last_modified().unwrap())
        );
    }

    #[test]
    fn test_exactly_eight_characters() {
        let version = derive_version("19991231").unwrap();
        assert_eq!(version.to_string(), "0.pre+date=1999-12-31");
    }

    #[test]
    fn test_short_timestamp_is_malformed() {
        for input in ["", "2024", "2024011"] {
            let err = derive_version(input).unwrap_err();
            assert!(
                matches!(err, Error::MalformedTimestamp { .. }),
                "{:?} should be malformed",
                input
            );
        }
    }

    #[test]
    fn test_non_digit_prefix_is_malformed() {
        assert!(matches!(
            derive_version("2024-01-15").unwrap_err(),
            Error::MalformedTimestamp { .. }
        ));
        assert!(matches!(
            derive_version("2024011é5").unwrap_err(),
            Error::MalformedTimestamp { .. }
        ));
    }

    #[test]
    fn test_impossible_date_is_malformed() {
        assert!(derive_version("20241301").is_err());
        assert!(derive_version("20230229").is_err());
        assert!(derive_version("20240229").is_ok());
    }

    #[test]
    fn test_ordering_across_days() {
        let earlier = derive_version("20231231235959").unwrap();
        let later = derive_version("20240101000000").unwrap();
        assert!(earlier < later);

        let morning = derive_version("20240101000000").unwrap();
        let evening = derive_version("20240101235959").unwrap();
        assert_eq!(morning, evening);
    }

    #[test]
    fn test_semver_rendering() {
        let version = derive_version("20240115").unwrap();
        let semver = version.to_semver().unwrap();
        assert_eq!(semver.major, 0);
        assert_eq!(semver.pre.as_str(), "pre");
        assert_eq!(semver.build.as_str(), "date.2024-01-15");
    }

    #[test]
    fn test_from_datetime_round_trips_through_compact() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(compact_timestamp(dt), "20240115103000");
        assert_eq!(
            derive_version(&compact_timestamp(dt)).unwrap(),
            VersionInfo::from_datetime(dt)
        );
    }
}
