//! Echo Server Topology
//!
//! The probing protocol runs against a fixed pair of cooperating echo
//! servers. This module describes that topology and validates, at
//! configuration time, the ordering assumptions the classifiers rely on.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use thiserror::Error;

/// Primary echo server of the well-known deployment.
const DEFAULT_PRIMARY: IpAddr = IpAddr::V4(Ipv4Addr::new(52, 27, 15, 59));

/// Secondary echo server of the well-known deployment.
const DEFAULT_SECONDARY: IpAddr = IpAddr::V4(Ipv4Addr::new(52, 26, 32, 86));

/// Port the filtering test is addressed to.
const FILTER_PORT: u16 = 3000;

/// Ports of the three allocation-test destinations.
const MAPPING_PORTS: [u16; 3] = [2000, 2001, 2002];

/// Topology validation error, one variant per violated ordering rule.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// The first two mapping targets must isolate a destination-port change.
    #[error("mapping targets {first} and {second} must share a host and differ in port")]
    MappingPortPair {
        /// First mapping target.
        first: SocketAddr,
        /// Second mapping target.
        second: SocketAddr,
    },

    /// The last two mapping targets must isolate a destination-host change.
    #[error("mapping targets {second} and {third} must be on different hosts")]
    MappingHostPair {
        /// Second mapping target.
        second: SocketAddr,
        /// Third mapping target.
        third: SocketAddr,
    },

    /// The alternate-port marker must differ from the filter target only in port.
    #[error("marker {marker} must share the host of filter target {target} on another port")]
    FilterAltPort {
        /// Configured alternate-port marker.
        marker: SocketAddr,
        /// Filtering-test destination.
        target: SocketAddr,
    },

    /// The alternate-host marker must live on a different host than the filter target.
    #[error("marker {marker} must not share the host of filter target {target}")]
    FilterAltHost {
        /// Configured alternate-host marker.
        marker: SocketAddr,
        /// Filtering-test destination.
        target: SocketAddr,
    },
}

/// Addresses of the cooperating echo servers.
///
/// The filtering test sends to `filter_target` and inspects which sender
/// identities the local gateway lets back in; the two markers name the
/// alternate identities the server replies from. The allocation test walks
/// `mapping_targets` in order, and the classifier's pairwise comparisons
/// assume that order isolates first a destination-port change, then a
/// destination-host change. [`ServerTopology::validate`] checks exactly
/// that coupling so it cannot silently rot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerTopology {
    /// Destination of the filtering-test probe.
    pub filter_target: SocketAddr,
    /// Same-host, alternate-port sender identity a reply may arrive from.
    pub filter_alt_port: SocketAddr,
    /// Different-host sender identity a reply may arrive from.
    pub filter_alt_host: SocketAddr,
    /// Allocation-test destinations, in probe order.
    pub mapping_targets: [SocketAddr; 3],
}

impl ServerTopology {
    /// Standard port layout over a primary and a secondary server host.
    #[must_use]
    pub fn new(primary: IpAddr, secondary: IpAddr) -> Self {
        let mapping_targets = [
            SocketAddr::new(primary, MAPPING_PORTS[0]),
            SocketAddr::new(primary, MAPPING_PORTS[1]),
            SocketAddr::new(secondary, MAPPING_PORTS[2]),
        ];

        Self {
            filter_target: SocketAddr::new(primary, FILTER_PORT),
            filter_alt_port: mapping_targets[1],
            filter_alt_host: mapping_targets[2],
            mapping_targets,
        }
    }

    /// Check the ordering assumptions the classifiers depend on.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule:
    /// - mapping targets 0 and 1 share a host and differ in port,
    /// - mapping targets 1 and 2 are on different hosts,
    /// - the alternate-port marker shares the filter target's host but not
    ///   its port,
    /// - the alternate-host marker is on a different host.
    pub fn validate(&self) -> Result<(), TopologyError> {
        let [first, second, third] = self.mapping_targets;

        if first.ip() != second.ip() || first.port() == second.port() {
            return Err(TopologyError::MappingPortPair { first, second });
        }
        if second.ip() == third.ip() {
            return Err(TopologyError::MappingHostPair { second, third });
        }
        if self.filter_alt_port.ip() != self.filter_target.ip()
            || self.filter_alt_port.port() == self.filter_target.port()
        {
            return Err(TopologyError::FilterAltPort {
                marker: self.filter_alt_port,
                target: self.filter_target,
            });
        }
        if self.filter_alt_host.ip() == self.filter_target.ip() {
            return Err(TopologyError::FilterAltHost {
                marker: self.filter_alt_host,
                target: self.filter_target,
            });
        }

        Ok(())
    }
}

impl Default for ServerTopology {
    fn default() -> Self {
        Self::new(DEFAULT_PRIMARY, DEFAULT_SECONDARY)
    }
}
