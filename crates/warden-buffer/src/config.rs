//! Buffer pool configuration parameters.

/// Configuration for the shared buffer pool.
///
/// Controls segment sizing and total capacity. Validated at
/// construction; all values are immutable after creation.
#[derive(Clone, Debug)]
pub struct BufferConfig {
    /// Maximum size of a single segment in bytes.
    ///
    /// Default: 256MB. A 3000×3000 float64 grid (72MB) fits with room
    /// to spare.
    pub max_segment_bytes: usize,

    /// Total capacity across all live segments in bytes.
    ///
    /// Default: 1GB. Allocation beyond this fails with
    /// `BufferError::CapacityExceeded` rather than growing unbounded.
    pub max_total_bytes: usize,
}

impl BufferConfig {
    /// Default per-segment size limit: 256MB.
    pub const DEFAULT_MAX_SEGMENT_BYTES: usize = 256 * 1024 * 1024;

    /// Default total pool capacity: 1GB.
    pub const DEFAULT_MAX_TOTAL_BYTES: usize = 1024 * 1024 * 1024;

    /// Create a config with the default limits.
    pub fn new() -> Self {
        Self {
            max_segment_bytes: Self::DEFAULT_MAX_SEGMENT_BYTES,
            max_total_bytes: Self::DEFAULT_MAX_TOTAL_BYTES,
        }
    }

    /// Create a config with explicit limits, for tests and small hosts.
    pub fn with_limits(max_segment_bytes: usize, max_total_bytes: usize) -> Self {
        Self {
            max_segment_bytes,
            max_total_bytes,
        }
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits() {
        let config = BufferConfig::default();
        assert_eq!(config.max_segment_bytes, 256 * 1024 * 1024);
        assert_eq!(config.max_total_bytes, 1024 * 1024 * 1024);
    }
}
