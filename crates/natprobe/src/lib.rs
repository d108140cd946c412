//! # natprobe
//!
//! Classifies the local gateway's NAT behavior by probing a pair of
//! cooperating UDP echo servers.
//!
//! This crate provides:
//! - Inbound filtering classification (which sender identities the
//!   gateway lets back in)
//! - Port allocation classification (how external ports vary across
//!   destinations), with a signed port-progression estimate for port
//!   prediction
//! - Concurrent probe rounds with a leniency-biased, order-independent
//!   merge that tolerates packet loss
//!
//! ## Probe protocol
//!
//! Probes are zero-length UDP datagrams. The filtering server replies
//! from up to three pre-agreed sender identities; only which identities
//! arrive matters. Each allocation server replies once, from the address
//! it was contacted on, with the observed external port as decimal ASCII.
//!
//! ## Example
//!
//! ```rust,no_run
//! use natprobe::{BehaviorDetector, ProbeConfig, ServerTopology};
//!
//! # async fn example() -> Result<(), natprobe::TopologyError> {
//! let detector = BehaviorDetector::new(ServerTopology::default(), ProbeConfig::default())?;
//! let classification = detector.detect().await;
//! match classification.filtering {
//!     Some(behavior) => println!("filtering: {behavior}"),
//!     None => println!("filtering: undetermined"),
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod detector;
pub mod filter;
pub mod mapping;
pub mod round;
pub mod topology;
pub mod tracker;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use config::ProbeConfig;
pub use detector::BehaviorDetector;
pub use filter::classify_filtering;
pub use mapping::classify_mapping;
pub use round::run_round;
pub use topology::{ServerTopology, TopologyError};
pub use tracker::SocketTracker;
pub use transport::{ProbeError, ProbeTransport};
pub use types::{Classification, FilteringBehavior, MappingBehavior, MappingReport};
