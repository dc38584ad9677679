//! Version resolution.
//!
//! Maps the raw tag list from the upstream repository onto semantic
//! versions and picks the maximum release satisfying the requested range.
//! Tags that don't look like versions (release candidates aside, upstream
//! has carried tags like `test-branch`) are silently dropped; they never
//! fail resolution on their own.

use semver::{Version, VersionReq};

use super::error::ProvisionError;

/// The release selected for this job: the original tag plus its parsed
/// version. All downstream cache keys and download URLs derive from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVersion {
    pub tag: String,
    pub version: Version,
}

impl ResolvedVersion {
    /// Dotted version string without tag decoration, e.g. "4.8.2".
    pub fn version_string(&self) -> String {
        self.version.to_string()
    }
}

/// Leniently coerce a tag into a semantic version.
///
/// Accepts a leading `v`, partial versions (`4`, `4.8`), and trailing
/// junk after the numeric core (`4.8.2-pre1`, `4.8.2rc1`); pre-release and
/// build suffixes are discarded so range matching follows release
/// precedence only.
pub fn coerce(tag: &str) -> Option<Version> {
    // Find the first digit; everything before it is decoration.
    let start = tag.find(|c: char| c.is_ascii_digit())?;
    let rest = &tag[start..];

    let mut parts = [0u64; 3];
    let mut idx = 0;
    let mut current = String::new();

    for c in rest.chars() {
        if c.is_ascii_digit() {
            current.push(c);
        } else if c == '.' && !current.is_empty() && idx < 2 {
            parts[idx] = current.parse().ok()?;
            idx += 1;
            current.clear();
        } else {
            break;
        }
    }

    if current.is_empty() {
        // Tag ended on a separator, e.g. "v4."; use what was collected.
        if idx == 0 {
            return None;
        }
    } else {
        parts[idx] = current.parse().ok()?;
    }

    Some(Version::new(parts[0], parts[1], parts[2]))
}

/// Select the maximum coercible version among `tags` satisfying `range`.
///
/// Ties between tags coercing to the same maximal version break toward the
/// earliest tag in input order.
pub fn resolve(tags: &[String], range: &VersionReq) -> Result<ResolvedVersion, ProvisionError> {
    let candidates: Vec<ResolvedVersion> = tags
        .iter()
        .filter_map(|tag| {
            coerce(tag).map(|version| ResolvedVersion {
                tag: tag.clone(),
                version,
            })
        })
        .collect();

    candidates
        .into_iter()
        .filter(|c| range.matches(&c.version))
        .max_by(|a, b| {
            // max_by keeps the later element on Equal; invert so the first
            // tag in input order wins ties.
            match a.version.cmp(&b.version) {
                std::cmp::Ordering::Equal => std::cmp::Ordering::Greater,
                other => other,
            }
        })
        .ok_or_else(|| ProvisionError::NoSatisfyingVersion {
            range: range.to_string(),
        })
}
