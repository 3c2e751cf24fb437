//! Reader configuration

use std::time::Duration;

use crate::protocol::NUR_MAX_RCV_SZ;

/// Timeouts and buffer sizes used by [`crate::NurReader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Deadline for ordinary commands
    pub default_timeout: Duration,
    /// Deadline for inventory and tag memory operations
    pub long_timeout: Duration,
    /// Deadline for antenna tuning
    pub tune_timeout: Duration,
    /// Added on top of the module-side timeout of a single scan
    pub scan_margin: Duration,
    /// Size of a single transport read
    pub rx_chunk_size: usize,
    /// Largest frame the assembler accepts, header included
    pub rx_capacity: usize,
    /// Attempts per flash page and per validation during firmware programming
    pub program_retries: u32,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_millis(3000),
            long_timeout: Duration::from_millis(10_000),
            tune_timeout: Duration::from_millis(25_000),
            scan_margin: Duration::from_millis(1000),
            rx_chunk_size: 256,
            rx_capacity: NUR_MAX_RCV_SZ,
            program_retries: 5,
        }
    }
}

impl ReaderConfig {
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_long_timeout(mut self, timeout: Duration) -> Self {
        self.long_timeout = timeout;
        self
    }

    pub fn with_rx_chunk_size(mut self, size: usize) -> Self {
        self.rx_chunk_size = size.max(1);
        self
    }
}
