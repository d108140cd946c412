//! Probe Round
//!
//! One round runs the filtering and allocation tests concurrently, each on
//! its own socket, and assembles whatever verdicts they produced. A round
//! never fails as a whole; a classifier that errors out only leaves its
//! own field absent.

use crate::config::ProbeConfig;
use crate::filter::classify_filtering;
use crate::mapping::classify_mapping;
use crate::topology::ServerTopology;
use crate::tracker::SocketTracker;
use crate::types::Classification;
use tracing::warn;

/// Run one filter+allocation round to completion.
///
/// The two classifiers are joined as sibling futures and return their
/// verdicts by value; there is no shared result object to synchronize.
/// Every wait inside is bounded, so the round always terminates.
pub async fn run_round(
    tracker: SocketTracker,
    topology: ServerTopology,
    config: ProbeConfig,
) -> Classification {
    let (filtering, mapping) = tokio::join!(
        classify_filtering(&tracker, &topology, &config),
        classify_mapping(&tracker, &topology, &config),
    );

    let filtering = match filtering {
        Ok(behavior) => Some(behavior),
        Err(e) => {
            warn!(error = %e, "filtering test failed this round");
            None
        }
    };
    let mapping = match mapping {
        Ok(report) => report,
        Err(e) => {
            warn!(error = %e, "allocation test failed this round");
            None
        }
    };

    Classification { filtering, mapping }
}
