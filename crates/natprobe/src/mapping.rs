//! Allocation Classification
//!
//! Three probes from one local socket to three destinations chosen so that
//! consecutive pairs isolate first a destination-port change and then a
//! destination-host change. Each server echoes back the external port it
//! saw; comparing the echoes classifies the gateway's port allocation.

use crate::config::ProbeConfig;
use crate::topology::ServerTopology;
use crate::tracker::SocketTracker;
use crate::transport::{ProbeError, ProbeTransport};
use crate::types::{MappingBehavior, MappingReport};
use tracing::{debug, warn};

/// Run the allocation test and classify the gateway's port mapping.
///
/// All three destinations are probed through the same socket so the
/// external mapping stays comparable across them. Fewer than three echoes
/// is a soft failure (`Ok(None)`); the merge step recovers the verdict
/// from sibling rounds. The socket is deliberately left open and torn
/// down with the rest of the run.
///
/// # Errors
///
/// Returns [`ProbeError`] if the socket cannot be bound or probe I/O fails.
pub async fn classify_mapping(
    tracker: &SocketTracker,
    topology: &ServerTopology,
    config: &ProbeConfig,
) -> Result<Option<MappingReport>, ProbeError> {
    let transport = ProbeTransport::bind(tracker, config).await?;
    let local_port = transport.local_addr()?.port();

    let mut observed = Vec::with_capacity(topology.mapping_targets.len());
    for destination in topology.mapping_targets {
        let responses = transport
            .probe(destination, config.mapping_budget, 1)
            .await?;
        debug!(local_port, %destination, ?responses, "allocation probe");
        observed.extend(responses.into_values());
    }

    if observed.len() < topology.mapping_targets.len() {
        warn!(
            local_port,
            collected = observed.len(),
            "allocation test under-responded, abandoning this round"
        );
        return Ok(None);
    }
    if observed.len() > topology.mapping_targets.len() {
        // Each destination echoes once; anything beyond that is noise.
        warn!(
            local_port,
            collected = observed.len(),
            "allocation test over-responded"
        );
    }

    Ok(Some(interpret_mapping([
        observed[0],
        observed[1],
        observed[2],
    ])))
}

/// Derive the mapping verdict from the three observed external ports.
///
/// The progression estimate takes the computed delta with the smaller
/// magnitude: a large delta is more likely contaminated by unrelated
/// flows consuming external ports on the same gateway.
fn interpret_mapping(observed: [u16; 3]) -> MappingReport {
    let [first, second, third] = observed.map(i32::from);

    if first != second {
        let delta_port = second - first;
        let delta_host = third - second;
        MappingReport {
            behavior: MappingBehavior::AddressAndPortDependent,
            progression: smaller_magnitude(delta_port, delta_host),
        }
    } else if second != third {
        MappingReport {
            behavior: MappingBehavior::AddressDependent,
            progression: third - second,
        }
    } else {
        MappingReport {
            behavior: MappingBehavior::EndpointIndependent,
            progression: 0,
        }
    }
}

/// Absolute ties keep the first-computed delta.
fn smaller_magnitude(first: i32, second: i32) -> i32 {
    if second.unsigned_abs() < first.unsigned_abs() {
        second
    } else {
        first
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_ports_are_endpoint_independent() {
        let report = interpret_mapping([40100, 40100, 40100]);

        assert_eq!(report.behavior, MappingBehavior::EndpointIndependent);
        assert_eq!(report.progression, 0);
    }

    #[test]
    fn test_port_change_on_destination_port() {
        // Port changed between the first pair, stayed put across the host
        // change: the zero host-delta is the cleaner estimate.
        let report = interpret_mapping([100, 105, 105]);

        assert_eq!(report.behavior, MappingBehavior::AddressAndPortDependent);
        assert_eq!(report.progression, 0);
    }

    #[test]
    fn test_port_change_with_consistent_progression() {
        let report = interpret_mapping([40100, 40105, 40117]);

        assert_eq!(report.behavior, MappingBehavior::AddressAndPortDependent);
        assert_eq!(report.progression, 5);
    }

    #[test]
    fn test_port_change_on_destination_host_only() {
        let report = interpret_mapping([100, 100, 130]);

        assert_eq!(report.behavior, MappingBehavior::AddressDependent);
        assert_eq!(report.progression, 30);
    }

    #[test]
    fn test_negative_progression_survives() {
        let report = interpret_mapping([40100, 40098, 40096]);

        assert_eq!(report.behavior, MappingBehavior::AddressAndPortDependent);
        assert_eq!(report.progression, -2);
    }

    #[test]
    fn test_smaller_magnitude_tie_keeps_first() {
        assert_eq!(smaller_magnitude(5, -5), 5);
        assert_eq!(smaller_magnitude(-5, 5), -5);
        assert_eq!(smaller_magnitude(7, 3), 3);
        assert_eq!(smaller_magnitude(-2, 9), -2);
    }
}
