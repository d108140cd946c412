//! Open Socket Tracking
//!
//! Probe sockets are closed in bulk at the end of a run, not as each round
//! finishes, so a late reply never lands on a recycled port. The tracker is
//! an explicit handle owned by the detector and passed to every transport;
//! it replaces any notion of process-global socket state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::UdpSocket;
use tracing::trace;

/// Identity of a tracked socket, handed out by [`SocketTracker::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketId(u64);

#[derive(Debug, Default)]
struct Registry {
    next_id: u64,
    open: HashMap<u64, Arc<UdpSocket>>,
}

/// Shared registry of sockets opened during one probe run.
///
/// Cloning the tracker clones the handle, not the registry. The tracker
/// holds one reference to each registered socket; once the owning
/// transport is gone, dropping that reference is what actually closes the
/// descriptor. [`SocketTracker::close_all`] is therefore the single
/// teardown point for every socket that was not explicitly released.
#[derive(Debug, Clone, Default)]
pub struct SocketTracker {
    inner: Arc<Mutex<Registry>>,
}

impl SocketTracker {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a freshly bound socket until released or drained.
    pub(crate) fn register(&self, socket: Arc<UdpSocket>) -> SocketId {
        let mut registry = self.inner.lock().unwrap();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.open.insert(id, socket);
        SocketId(id)
    }

    /// Drop a single socket ahead of the bulk teardown.
    ///
    /// Releasing an id twice is a no-op; a socket is closed at most once.
    pub(crate) fn release(&self, id: SocketId) {
        let released = self.inner.lock().unwrap().open.remove(&id.0);
        if released.is_some() {
            trace!(id = id.0, "released probe socket");
        }
    }

    /// Drain the registry, closing every socket still tracked.
    ///
    /// Returns how many sockets were dropped. The registry is empty
    /// afterwards, so the next run starts from scratch.
    pub fn close_all(&self) -> usize {
        let drained = std::mem::take(&mut self.inner.lock().unwrap().open);
        drained.len()
    }

    /// Number of sockets currently tracked.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.inner.lock().unwrap().open.len()
    }
}
