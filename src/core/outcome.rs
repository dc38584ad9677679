//! Acquisition outcome.

/// Which tier satisfied the binary acquisition, and whether that result is
/// worth persisting to the binary cache. A cache hit is already cached; only
/// a fresh download or source build warrants a new entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionOutcome {
    /// Restored from the binary cache and verified working.
    CacheHit,
    /// Downloaded a prebuilt release archive and verified working.
    DownloadHit,
    /// Built from a checked-out source tag and verified working.
    BuiltFromSource,
    /// No tier produced a functional binary.
    Failed,
}

impl AcquisitionOutcome {
    /// Whether a fresh binary-cache entry should be saved.
    pub fn wants_binary_cache_save(&self) -> bool {
        match self {
            Self::DownloadHit | Self::BuiltFromSource => true,
            Self::CacheHit | Self::Failed => false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::CacheHit => "binary cache",
            Self::DownloadHit => "prebuilt download",
            Self::BuiltFromSource => "source build",
            Self::Failed => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_eligibility() {
        assert!(!AcquisitionOutcome::CacheHit.wants_binary_cache_save());
        assert!(AcquisitionOutcome::DownloadHit.wants_binary_cache_save());
        assert!(AcquisitionOutcome::BuiltFromSource.wants_binary_cache_save());
        assert!(!AcquisitionOutcome::Failed.wants_binary_cache_save());
    }
}
