//! Classification Verdicts
//!
//! This module defines the verdict types produced by the probing engine and
//! the leniency-biased merge that reconciles verdicts from concurrent probe
//! rounds into a single classification.

use serde::Serialize;
use std::cmp::Ordering;

/// Inbound filtering behavior of the local gateway.
///
/// Classifies how closely an inbound packet's sender must match a
/// previously contacted destination before the gateway admits it.
/// Variants are ordered from strictest to most lenient; the order is
/// exposed through [`FilteringBehavior::leniency`] rather than relied on
/// implicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilteringBehavior {
    /// Replies are admitted only from the exact address:port contacted.
    AddressAndPortDependent,
    /// Replies are admitted from the contacted host on any port.
    AddressDependent,
    /// Replies are admitted from any host and port.
    EndpointIndependent,
}

impl FilteringBehavior {
    /// Leniency rank: strictly increasing from the strictest behavior.
    ///
    /// Merging favors the greater rank, since a spuriously strict verdict
    /// is far more likely to be an artifact of a dropped reply than a
    /// spuriously lenient one is to be a false positive - leniency requires
    /// a reply to have actually been sent and received.
    #[must_use]
    pub fn leniency(self) -> u8 {
        match self {
            Self::AddressAndPortDependent => 0,
            Self::AddressDependent => 1,
            Self::EndpointIndependent => 2,
        }
    }
}

impl std::fmt::Display for FilteringBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AddressAndPortDependent => write!(f, "address and port dependent"),
            Self::AddressDependent => write!(f, "address dependent"),
            Self::EndpointIndependent => write!(f, "endpoint independent"),
        }
    }
}

/// External port allocation behavior of the local gateway.
///
/// Classifies whether the gateway assigns a new external port per
/// destination port, per destination host, or keeps one stable mapping.
/// A port-sensitive allocation is assumed to also be host-sensitive; the
/// probe protocol does not re-verify that independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MappingBehavior {
    /// The external port changes per distinct destination port.
    AddressAndPortDependent,
    /// The external port changes per distinct destination host.
    AddressDependent,
    /// The external port is stable across destinations.
    EndpointIndependent,
}

impl MappingBehavior {
    /// Leniency rank: strictly increasing from the strictest behavior.
    #[must_use]
    pub fn leniency(self) -> u8 {
        match self {
            Self::AddressAndPortDependent => 0,
            Self::AddressDependent => 1,
            Self::EndpointIndependent => 2,
        }
    }
}

impl std::fmt::Display for MappingBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AddressAndPortDependent => write!(f, "address and port dependent"),
            Self::AddressDependent => write!(f, "address dependent"),
            Self::EndpointIndependent => write!(f, "endpoint independent"),
        }
    }
}

/// Mapping verdict together with its port progression estimate.
///
/// `progression` is the signed delta the gateway appears to apply to the
/// external port per new flow, used for port prediction during traversal.
/// It only exists alongside a mapping verdict, so the pair travels as one
/// value instead of a verdict plus a sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MappingReport {
    /// Observed allocation behavior.
    pub behavior: MappingBehavior,
    /// Estimated external-port increment per new flow.
    pub progression: i32,
}

/// Outcome of one probe round, or of a whole merged run.
///
/// Absent fields mean the corresponding test produced no verdict (packet
/// loss, bind failure); this is distinct from a lenient
/// endpoint-independent verdict, which requires replies to have arrived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    /// Filtering verdict, if the filtering test produced one.
    pub filtering: Option<FilteringBehavior>,
    /// Mapping verdict and progression, if the allocation test completed.
    pub mapping: Option<MappingReport>,
}

impl Classification {
    /// Merge two round results, biased toward leniency.
    ///
    /// For each field: an absent verdict yields to a present one, and of
    /// two present verdicts the more lenient wins. Equal mapping verdicts
    /// keep the progression with the smaller magnitude - a larger observed
    /// delta is more likely contaminated by unrelated flows through the
    /// same gateway. The merge is associative and commutative, so the
    /// final outcome does not depend on round completion order.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            filtering: merge_filtering(self.filtering, other.filtering),
            mapping: merge_mapping(self.mapping, other.mapping),
        }
    }

    /// Fold any number of round results into one classification.
    #[must_use]
    pub fn merge_all(results: impl IntoIterator<Item = Self>) -> Self {
        results
            .into_iter()
            .fold(Self::default(), |merged, next| merged.merge(next))
    }
}

fn merge_filtering(
    ours: Option<FilteringBehavior>,
    theirs: Option<FilteringBehavior>,
) -> Option<FilteringBehavior> {
    match (ours, theirs) {
        (Some(a), Some(b)) => Some(if b.leniency() > a.leniency() { b } else { a }),
        (a, b) => a.or(b),
    }
}

fn merge_mapping(
    ours: Option<MappingReport>,
    theirs: Option<MappingReport>,
) -> Option<MappingReport> {
    match (ours, theirs) {
        (Some(a), Some(b)) => Some(match a.behavior.leniency().cmp(&b.behavior.leniency()) {
            Ordering::Less => b,
            Ordering::Greater => a,
            // Equal verdicts: smaller magnitude wins; exact magnitude ties
            // break on the signed value to keep the merge commutative.
            Ordering::Equal => {
                let key = |report: &MappingReport| {
                    (report.progression.unsigned_abs(), report.progression)
                };
                if key(&b) < key(&a) { b } else { a }
            }
        }),
        (a, b) => a.or(b),
    }
}
