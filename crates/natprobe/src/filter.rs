//! Filtering Classification
//!
//! One probe to the filtering-test server, which replies from up to three
//! sender identities. Which of those identities make it back through the
//! local gateway reveals how strictly inbound packets are filtered.

use crate::config::ProbeConfig;
use crate::topology::ServerTopology;
use crate::tracker::SocketTracker;
use crate::transport::{ProbeError, ProbeTransport};
use crate::types::FilteringBehavior;
use std::collections::HashMap;
use std::net::SocketAddr;
use tracing::warn;

/// The server replies from at most three identities.
const FILTER_MAX_RESPONSES: usize = 3;

/// Run the filtering test and classify the gateway's inbound filtering.
///
/// The probe socket is single-use and is closed before returning, whether
/// or not any replies arrived.
///
/// Zero replies classify as the strictest behavior. That is ambiguous by
/// construction: a gateway that drops all three identities looks the same
/// as a probe that never reached the server.
///
/// # Errors
///
/// Returns [`ProbeError`] if the socket cannot be bound or probe I/O fails.
pub async fn classify_filtering(
    tracker: &SocketTracker,
    topology: &ServerTopology,
    config: &ProbeConfig,
) -> Result<FilteringBehavior, ProbeError> {
    let transport = ProbeTransport::bind(tracker, config).await?;
    let outcome = transport
        .probe(topology.filter_target, config.filter_budget, FILTER_MAX_RESPONSES)
        .await;
    transport.close();

    let responses = outcome?;
    if responses.is_empty() {
        warn!(
            destination = %topology.filter_target,
            "no filtering-test replies; strict verdict is indistinguishable from probe failure"
        );
    }

    Ok(interpret_filtering(&responses, topology))
}

/// Map the set of reply sender identities to a filtering verdict,
/// most lenient possibility first.
fn interpret_filtering(
    responses: &HashMap<SocketAddr, u16>,
    topology: &ServerTopology,
) -> FilteringBehavior {
    if responses.contains_key(&topology.filter_alt_host) {
        FilteringBehavior::EndpointIndependent
    } else if responses.contains_key(&topology.filter_alt_port) {
        FilteringBehavior::AddressDependent
    } else {
        FilteringBehavior::AddressAndPortDependent
    }
}
