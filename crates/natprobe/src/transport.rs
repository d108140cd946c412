//! Probe Transport
//!
//! One ephemeral UDP socket per classifier, used to send zero-length probe
//! datagrams and collect distinct-sender responses under a time and count
//! budget. UDP is inherently lossy; the transport compensates with bounded
//! retries and leaves interpretation of partial results to the classifiers.

use crate::config::ProbeConfig;
use crate::tracker::{SocketId, SocketTracker};
use rand::Rng;
use std::collections::HashMap;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::debug;

/// Receive buffer size; replies are short decimal strings.
const RECV_BUF_SIZE: usize = 2048;

/// Ephemeral local ports are drawn from this range, clear of well-known
/// and registered ports.
const EPHEMERAL_PORTS: std::ops::Range<u16> = 10000..65000;

/// Random bind candidates tried before giving up.
const MAX_BIND_ATTEMPTS: usize = 8;

/// Transport-level probe error.
///
/// Timeouts and under-response are not errors; they surface as an empty or
/// undersized response map.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// No usable local ephemeral port could be bound.
    #[error("failed to bind a local probe socket: {0}")]
    Bind(#[source] io::Error),

    /// A datagram send or receive failed.
    #[error("probe I/O error: {0}")]
    Io(#[from] io::Error),
}

/// UDP socket driving one classifier's probes.
pub struct ProbeTransport {
    socket: Arc<UdpSocket>,
    id: SocketId,
    tracker: SocketTracker,
    recv_timeout: Duration,
    max_retries: usize,
}

impl ProbeTransport {
    /// Bind a probe socket on a randomly chosen ephemeral port.
    ///
    /// The socket is built through socket2 so address reuse can be enabled
    /// before binding, then registered with the tracker for deferred bulk
    /// teardown.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Bind`] when no candidate port can be bound.
    pub async fn bind(tracker: &SocketTracker, config: &ProbeConfig) -> Result<Self, ProbeError> {
        let mut last_error = None;

        for _ in 0..MAX_BIND_ATTEMPTS {
            let port = rand::thread_rng().gen_range(EPHEMERAL_PORTS);
            let addr = SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), port);

            match Self::bind_socket(addr) {
                Ok(socket) => {
                    let socket = Arc::new(socket);
                    let id = tracker.register(socket.clone());
                    debug!(port, "bound probe socket");
                    return Ok(Self {
                        socket,
                        id,
                        tracker: tracker.clone(),
                        recv_timeout: config.recv_timeout,
                        max_retries: config.max_retries,
                    });
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(ProbeError::Bind(last_error.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AddrInUse, "no ephemeral port available")
        })))
    }

    fn bind_socket(addr: SocketAddr) -> io::Result<UdpSocket> {
        let socket = socket2::Socket::new(
            socket2::Domain::IPV4,
            socket2::Type::DGRAM,
            Some(socket2::Protocol::UDP),
        )?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;

        let std_socket: std::net::UdpSocket = socket.into();
        UdpSocket::from_std(std_socket)
    }

    /// Local address the probe socket is bound to.
    ///
    /// # Errors
    ///
    /// Returns an error if the local address cannot be determined.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Send a zero-length probe to `destination` and collect replies.
    ///
    /// Receives until `max_responses` distinct senders have replied or
    /// `total_budget` has elapsed, idling at most the configured receive
    /// timeout per read. Reply payloads are parsed as decimal ASCII port
    /// numbers; payloads that do not parse are discarded without counting
    /// toward the response budget. A cycle that collects nothing re-sends
    /// the probe, up to the configured retry limit.
    ///
    /// An empty map is a legitimate outcome, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Io`] if a send or receive fails outright.
    pub async fn probe(
        &self,
        destination: SocketAddr,
        total_budget: Duration,
        max_responses: usize,
    ) -> Result<HashMap<SocketAddr, u16>, ProbeError> {
        let mut responses = HashMap::new();

        for attempt in 1..=self.max_retries.max(1) {
            self.socket.send_to(&[], destination).await?;
            self.collect(&mut responses, total_budget, max_responses)
                .await?;

            if !responses.is_empty() {
                break;
            }
            debug!(%destination, attempt, "probe collected nothing, retrying");
        }

        debug!(%destination, count = responses.len(), "probe finished");
        Ok(responses)
    }

    async fn collect(
        &self,
        responses: &mut HashMap<SocketAddr, u16>,
        total_budget: Duration,
        max_responses: usize,
    ) -> Result<(), ProbeError> {
        let mut buf = [0u8; RECV_BUF_SIZE];
        let deadline = Instant::now() + total_budget;

        while responses.len() < max_responses {
            let (len, from) = match timeout(self.recv_timeout, self.socket.recv_from(&mut buf)).await
            {
                Ok(Ok(received)) => received,
                Ok(Err(e)) => return Err(ProbeError::Io(e)),
                // Idle timeout: nothing more is coming this cycle.
                Err(_) => break,
            };

            match parse_port(&buf[..len]) {
                Some(observed) => {
                    responses.insert(from, observed);
                }
                None => debug!(%from, len, "discarding reply with non-numeric payload"),
            }

            if Instant::now() >= deadline {
                break;
            }
        }

        Ok(())
    }

    /// Close this socket now instead of at the end-of-run teardown.
    ///
    /// Used for single-use sockets; everything else stays open until the
    /// detector drains the tracker.
    pub fn close(self) {
        self.tracker.release(self.id);
    }
}

fn parse_port(payload: &[u8]) -> Option<u16> {
    std::str::from_utf8(payload).ok()?.parse().ok()
}
