//! Behavior Detector
//!
//! Top of the engine: runs several probe rounds concurrently against the
//! configured topology, merges their verdicts with the leniency-biased
//! merge, and tears down every socket the run opened.

use crate::config::ProbeConfig;
use crate::round::run_round;
use crate::topology::{ServerTopology, TopologyError};
use crate::tracker::SocketTracker;
use crate::types::Classification;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// NAT behavior detector.
///
/// Owns the socket registry for its runs; sockets opened by a run are
/// closed in one sweep after every round of that run has finished, and
/// each run starts from an empty registry.
pub struct BehaviorDetector {
    topology: ServerTopology,
    config: ProbeConfig,
    tracker: SocketTracker,
}

impl BehaviorDetector {
    /// Create a detector for the given topology and settings.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError`] if the topology violates the ordering
    /// assumptions the classifiers rely on.
    pub fn new(topology: ServerTopology, config: ProbeConfig) -> Result<Self, TopologyError> {
        topology.validate()?;
        Ok(Self {
            topology,
            config,
            tracker: SocketTracker::new(),
        })
    }

    /// Run the configured number of concurrent rounds and merge them.
    ///
    /// Round results are folded in arrival order; the merge is associative
    /// and commutative, so completion order cannot change the outcome. A
    /// run in which every round came up empty yields a classification with
    /// both fields absent, which is distinct from a lenient verdict.
    pub async fn detect(&self) -> Classification {
        let mut rounds = JoinSet::new();
        for _ in 0..self.config.rounds {
            rounds.spawn(run_round(
                self.tracker.clone(),
                self.topology.clone(),
                self.config.clone(),
            ));
        }

        let mut merged = Classification::default();
        while let Some(joined) = rounds.join_next().await {
            match joined {
                Ok(result) => merged = merged.merge(result),
                Err(e) => warn!(error = %e, "probe round task failed"),
            }
        }

        let closed = self.tracker.close_all();
        debug!(closed, "probe run complete, sockets torn down");

        merged
    }

    /// Sockets still tracked from the current or last run.
    #[must_use]
    pub fn open_sockets(&self) -> usize {
        self.tracker.open_count()
    }

    /// The topology this detector probes.
    #[must_use]
    pub fn topology(&self) -> &ServerTopology {
        &self.topology
    }
}
