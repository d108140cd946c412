//! Probe Configuration
//!
//! Timing and concurrency knobs for a probe run. These are fixed constants
//! supplied by the caller at construction time; there is no environment or
//! per-invocation surface in the engine itself.

use std::time::Duration;

/// Settings for one probe run.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Idle timeout for a single receive.
    pub recv_timeout: Duration,
    /// Total wall-clock budget of the filtering probe, which waits for up
    /// to three sender identities.
    pub filter_budget: Duration,
    /// Total wall-clock budget per allocation probe, which waits for a
    /// single reply.
    pub mapping_budget: Duration,
    /// Send attempts per probe while no response has been collected.
    pub max_retries: usize,
    /// Number of filter+allocation rounds run concurrently.
    pub rounds: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            recv_timeout: Duration::from_secs(10),
            filter_budget: Duration::from_secs(20),
            mapping_budget: Duration::from_secs(10),
            max_retries: 3,
            rounds: 2,
        }
    }
}
