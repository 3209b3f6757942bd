//! In-process transport pair
//!
//! Two linked endpoints passing datagrams over channels, for wiring sessions
//! together without sockets. An optional filter drops outgoing datagrams to
//! simulate loss.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tracing::trace;

use super::{Datagram, RtpTransport};
use crate::error::Error;
use crate::Result;

/// Predicate deciding whether an outgoing datagram is dropped
pub type DropFilter = Box<dyn FnMut(&Datagram) -> bool + Send>;

/// One end of a linked in-memory transport pair
pub struct MemoryTransport {
    local_addr: SocketAddr,
    outgoing: mpsc::UnboundedSender<Datagram>,
    incoming: tokio::sync::Mutex<mpsc::UnboundedReceiver<Datagram>>,
    drop_filter: Mutex<Option<DropFilter>>,
    closed: AtomicBool,
    shutdown: Notify,
}

impl MemoryTransport {
    /// Create two endpoints, each receiving what the other sends
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (
            Self::new(SocketAddr::from(([127, 0, 0, 1], 10000)), a_tx, b_rx),
            Self::new(SocketAddr::from(([127, 0, 0, 1], 10002)), b_tx, a_rx),
        )
    }

    fn new(
        local_addr: SocketAddr,
        outgoing: mpsc::UnboundedSender<Datagram>,
        incoming: mpsc::UnboundedReceiver<Datagram>,
    ) -> Self {
        Self {
            local_addr,
            outgoing,
            incoming: tokio::sync::Mutex::new(incoming),
            drop_filter: Mutex::new(None),
            closed: AtomicBool::new(false),
            shutdown: Notify::new(),
        }
    }

    /// Drop outgoing datagrams for which `filter` returns true
    pub fn set_drop_filter(&self, filter: impl FnMut(&Datagram) -> bool + Send + 'static) {
        *self.drop_filter.lock() = Some(Box::new(filter));
    }

    pub fn clear_drop_filter(&self) {
        *self.drop_filter.lock() = None;
    }

    /// Next datagram if one is already queued
    pub fn try_recv(&self) -> Option<Datagram> {
        self.incoming.try_lock().ok()?.try_recv().ok()
    }

    fn send(&self, datagram: Datagram) -> Result<()> {
        if self.is_closed() {
            return Err(Error::TransportClosed);
        }

        if let Some(filter) = self.drop_filter.lock().as_mut() {
            if filter(&datagram) {
                trace!("Dropping {} outgoing bytes", datagram.as_bytes().len());
                return Ok(());
            }
        }

        // A vanished peer looks like a lossy network
        let _ = self.outgoing.send(datagram);
        Ok(())
    }
}

#[async_trait]
impl RtpTransport for MemoryTransport {
    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.local_addr)
    }

    async fn send_rtp(&self, data: Bytes) -> Result<()> {
        self.send(Datagram::Rtp(data))
    }

    async fn send_rtcp(&self, data: Bytes) -> Result<()> {
        self.send(Datagram::Rtcp(data))
    }

    async fn recv(&self) -> Result<Datagram> {
        let shutdown = self.shutdown.notified();
        if self.is_closed() {
            return Err(Error::TransportClosed);
        }

        let mut incoming = self.incoming.lock().await;
        tokio::select! {
            _ = shutdown => Err(Error::TransportClosed),
            datagram = incoming.recv() => datagram.ok_or(Error::TransportClosed),
        }
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.shutdown.notify_waiters();
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_delivers_both_ways() {
        let (a, b) = MemoryTransport::pair();

        a.send_rtp(Bytes::from_static(b"to b")).await.unwrap();
        b.send_rtcp(Bytes::from_static(b"to a")).await.unwrap();

        assert_eq!(b.recv().await.unwrap(), Datagram::Rtp(Bytes::from_static(b"to b")));
        assert_eq!(a.recv().await.unwrap(), Datagram::Rtcp(Bytes::from_static(b"to a")));
    }

    #[tokio::test]
    async fn test_drop_filter() {
        let (a, b) = MemoryTransport::pair();
        a.set_drop_filter(|datagram| !datagram.is_rtcp());

        a.send_rtp(Bytes::from_static(b"lost")).await.unwrap();
        a.send_rtcp(Bytes::from_static(b"kept")).await.unwrap();

        assert_eq!(b.recv().await.unwrap(), Datagram::Rtcp(Bytes::from_static(b"kept")));
        assert!(b.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_closed_transport() {
        let (a, b) = MemoryTransport::pair();
        a.close().await.unwrap();

        assert!(matches!(a.recv().await, Err(Error::TransportClosed)));
        assert!(matches!(
            a.send_rtp(Bytes::from_static(b"x")).await,
            Err(Error::TransportClosed)
        ));

        // Peer channel closes once the other end is dropped
        drop(a);
        assert!(matches!(b.recv().await, Err(Error::TransportClosed)));
    }
}
