//! Maven version ordering and timestamped snapshot builds.

use crate::constants::{SNAPSHOT_SUFFIX, SNAPSHOT_TIMESTAMP_FORMAT};
use crate::layout::maven::is_snapshot_version;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Item {
    /// Digits with leading zeros stripped; compared by length, then lexically.
    Number(String),
    Qualifier(String),
}

/// Well-known qualifiers in ascending order. The empty qualifier is a release.
const QUALIFIERS: [&str; 7] = ["alpha", "beta", "milestone", "rc", "snapshot", "", "sp"];

fn qualifier_rank(qualifier: &str) -> (usize, &str) {
    match QUALIFIERS.iter().position(|q| *q == qualifier) {
        Some(rank) => (rank, ""),
        None => (QUALIFIERS.len(), qualifier),
    }
}

fn canonical_qualifier(raw: &str, followed_by_digit: bool) -> String {
    let lower = raw.to_ascii_lowercase();
    match lower.as_str() {
        "a" if followed_by_digit => "alpha".into(),
        "b" if followed_by_digit => "beta".into(),
        "m" if followed_by_digit => "milestone".into(),
        "cr" => "rc".into(),
        "ga" | "final" | "release" => String::new(),
        _ => lower,
    }
}

fn compare_items(a: Option<&Item>, b: Option<&Item>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (Some(a), None) => compare_with_nothing(a),
        (None, Some(b)) => compare_with_nothing(b).reverse(),
        (Some(Item::Number(x)), Some(Item::Number(y))) => {
            x.len().cmp(&y.len()).then_with(|| x.cmp(y))
        }
        (Some(Item::Number(_)), Some(Item::Qualifier(_))) => Ordering::Greater,
        (Some(Item::Qualifier(_)), Some(Item::Number(_))) => Ordering::Less,
        (Some(Item::Qualifier(x)), Some(Item::Qualifier(y))) => {
            qualifier_rank(x).cmp(&qualifier_rank(y))
        }
    }
}

/// Compares an item against a missing one (`1.0` vs `1.0.1`, `1.0` vs `1.0-beta`).
fn compare_with_nothing(item: &Item) -> Ordering {
    match item {
        Item::Number(n) if n.is_empty() => Ordering::Equal,
        Item::Number(_) => Ordering::Greater,
        Item::Qualifier(q) => qualifier_rank(q).cmp(&qualifier_rank("")),
    }
}

/// A version string with Maven's ordering.
///
/// Numeric segments compare numerically, qualifiers rank
/// `alpha < beta < milestone < rc < snapshot < (release) < sp`, and unknown qualifiers sort
/// after `sp` lexically. Trailing zero segments are insignificant, so `1.0 == 1.0.0`.
#[derive(Debug, Clone)]
pub struct MavenVersion {
    raw: String,
    items: Vec<Item>,
}

impl MavenVersion {
    pub fn parse(version: &str) -> Self {
        let raw = version.trim().to_owned();
        let chars: Vec<char> = raw.chars().collect();
        let mut items = Vec::new();
        let mut token = String::new();
        let mut digits = false;

        let mut flush = |token: &mut String, digits: bool, next: Option<char>| {
            if digits {
                items.push(Item::Number(token.trim_start_matches('0').to_owned()));
            } else {
                let followed_by_digit = next.is_some_and(|c| c.is_ascii_digit());
                items.push(Item::Qualifier(canonical_qualifier(token, followed_by_digit)));
            }
            token.clear();
        };

        for (idx, c) in chars.iter().copied().enumerate() {
            if c == '.' || c == '-' || c == '_' {
                flush(&mut token, digits, chars.get(idx + 1).copied());
                digits = false;
                continue;
            }
            let is_digit = c.is_ascii_digit();
            if !token.is_empty() && is_digit != digits {
                flush(&mut token, digits, Some(c));
            }
            digits = is_digit;
            token.push(c);
        }
        flush(&mut token, digits, None);

        // Drop trailing null items so that 1.0, 1.0.0 and 1-ga compare equal.
        while items.last().is_some_and(|item| match item {
            Item::Number(n) => n.is_empty(),
            Item::Qualifier(q) => q.is_empty(),
        }) {
            items.pop();
        }

        Self { raw, items }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_snapshot(&self) -> bool {
        is_snapshot_version(&self.raw) || SnapshotBuild::parse(&self.raw).is_some()
    }
}

impl PartialEq for MavenVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MavenVersion {}

impl PartialOrd for MavenVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MavenVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.items.len().max(other.items.len());
        for idx in 0..len {
            let ordering = compare_items(self.items.get(idx), other.items.get(idx));
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

impl fmt::Display for MavenVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Sorts versions ascending by Maven ordering and removes duplicates.
pub fn sort_versions(versions: &mut Vec<String>) {
    versions.sort_by(|a, b| {
        MavenVersion::parse(a)
            .cmp(&MavenVersion::parse(b))
            .then_with(|| a.cmp(b))
    });
    versions.dedup();
}

/// Highest version, optionally ignoring snapshots.
pub fn max_version<'a, I>(versions: I, releases_only: bool) -> Option<String>
where
    I: IntoIterator<Item = &'a String>,
{
    versions
        .into_iter()
        .map(|v| MavenVersion::parse(v))
        .filter(|v| !releases_only || !v.is_snapshot())
        .max()
        .map(|v| v.raw)
}

/// A timestamped snapshot build: `<base>-<yyyyMMdd.HHmmss>-<buildNumber>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotBuild {
    /// Version without the `-SNAPSHOT` suffix, e.g. `1.0`.
    pub base_version: String,
    pub timestamp: NaiveDateTime,
    pub build_number: u32,
}

impl SnapshotBuild {
    /// Parses a timestamped version. Returns `None` if `value` does not have that shape.
    pub fn parse(value: &str) -> Option<Self> {
        let (rest, build) = value.rsplit_once('-')?;
        if build.is_empty() || !build.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let build_number = build.parse().ok()?;

        let (base_version, stamp) = rest.rsplit_once('-')?;
        if base_version.is_empty() || stamp.len() != 15 {
            return None;
        }
        let timestamp = NaiveDateTime::parse_from_str(stamp, SNAPSHOT_TIMESTAMP_FORMAT).ok()?;

        Some(Self {
            base_version: base_version.to_owned(),
            timestamp,
            build_number,
        })
    }

    pub fn new(base_version: impl Into<String>, timestamp: NaiveDateTime, build_number: u32) -> Self {
        Self {
            base_version: base_version.into(),
            timestamp,
            build_number,
        }
    }

    /// `yyyyMMdd.HHmmss`
    pub fn timestamp_string(&self) -> String {
        self.timestamp.format(SNAPSHOT_TIMESTAMP_FORMAT).to_string()
    }

    /// Full timestamped version, e.g. `1.0-20240102.030405-7`.
    pub fn value(&self) -> String {
        format!(
            "{}-{}-{}",
            self.base_version,
            self.timestamp_string(),
            self.build_number
        )
    }

    /// Version directory this build lives in, e.g. `1.0-SNAPSHOT`.
    pub fn snapshot_version(&self) -> String {
        format!("{}-{}", self.base_version, SNAPSHOT_SUFFIX)
    }

    pub fn timestamp_utc(&self) -> DateTime<Utc> {
        self.timestamp.and_utc()
    }
}

impl PartialOrd for SnapshotBuild {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SnapshotBuild {
    fn cmp(&self, other: &Self) -> Ordering {
        self.build_number
            .cmp(&other.build_number)
            .then_with(|| self.timestamp.cmp(&other.timestamp))
            .then_with(|| self.base_version.cmp(&other.base_version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> MavenVersion {
        MavenVersion::parse(s)
    }

    #[test]
    fn test_numeric_segments_compare_numerically() {
        assert!(v("1.2") < v("1.10"));
        assert!(v("1.9.9") < v("1.10"));
        assert!(v("2") > v("1.99.99"));
        assert_eq!(v("1.0"), v("1.0.0"));
        assert_eq!(v("1"), v("1.0-ga"));
        assert_eq!(v("1.01"), v("1.1"));
    }

    #[test]
    fn test_qualifier_order() {
        let ordered = [
            "1.0-alpha-1",
            "1.0-beta-2",
            "1.0-milestone-1",
            "1.0-rc1",
            "1.0-SNAPSHOT",
            "1.0",
            "1.0-sp1",
            "1.0-zeta",
            "1.0.1",
        ];
        for pair in ordered.windows(2) {
            assert!(v(pair[0]) < v(pair[1]), "{} < {}", pair[0], pair[1]);
        }
        assert_eq!(v("1.0-a1"), v("1.0-alpha1"));
        assert_eq!(v("1.0-CR2"), v("1.0-rc2"));
    }

    #[test]
    fn test_sort_and_max() {
        let mut versions = vec![
            "1.10".to_string(),
            "1.2".to_string(),
            "1.2".to_string(),
            "1.11-SNAPSHOT".to_string(),
        ];
        sort_versions(&mut versions);
        assert_eq!(versions, vec!["1.2", "1.10", "1.11-SNAPSHOT"]);
        assert_eq!(max_version(&versions, false).as_deref(), Some("1.11-SNAPSHOT"));
        assert_eq!(max_version(&versions, true).as_deref(), Some("1.10"));
        assert_eq!(max_version(&Vec::<String>::new(), true), None);
    }

    #[test]
    fn test_snapshot_build_parse() {
        let build = SnapshotBuild::parse("1.0-20240102.030405-12").unwrap();
        assert_eq!(build.base_version, "1.0");
        assert_eq!(build.build_number, 12);
        assert_eq!(build.timestamp_string(), "20240102.030405");
        assert_eq!(build.value(), "1.0-20240102.030405-12");
        assert_eq!(build.snapshot_version(), "1.0-SNAPSHOT");

        assert!(SnapshotBuild::parse("1.0-SNAPSHOT").is_none());
        assert!(SnapshotBuild::parse("1.0-20241302.030405-1").is_none());
        assert!(SnapshotBuild::parse("1.0-20240102.0304-1").is_none());
        assert!(SnapshotBuild::parse("20240102.030405-1").is_none());
    }

    #[test]
    fn test_snapshot_build_order() {
        let older = SnapshotBuild::parse("1.0-20240102.030405-2").unwrap();
        let newer = SnapshotBuild::parse("1.0-20240101.000000-10").unwrap();
        assert!(older < newer);
        assert!(v("1.0-20240102.030405-2").is_snapshot());
    }
}
