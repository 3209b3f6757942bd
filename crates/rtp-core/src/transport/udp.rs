use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::Notify;
use tracing::{debug, info, trace, warn};

use super::{Datagram, RtpTransport, RtpTransportConfig};
use crate::error::Error;
use crate::packet::rtcp::RTCP_HEADER_SIZE;
use crate::{Result, DEFAULT_MAX_PACKET_SIZE};

/// UDP transport carrying RTP and RTCP on one socket
pub struct UdpRtpTransport {
    socket: UdpSocket,

    /// Remote address, from signaling or latched from the first datagram
    remote_addr: Mutex<Option<SocketAddr>>,

    symmetric_rtp: bool,

    closed: AtomicBool,

    /// Wakes pending receivers on close
    shutdown: Notify,
}

impl UdpRtpTransport {
    /// Bind a new UDP transport
    pub async fn new(config: RtpTransportConfig) -> Result<Self> {
        let socket = UdpSocket::bind(config.local_addr)
            .await
            .map_err(|e| Error::Transport(format!("Failed to bind RTP socket: {}", e)))?;

        debug!(
            "Bound RTP socket on {:?} (remote {:?})",
            socket.local_addr().ok(),
            config.remote_addr
        );

        Ok(Self {
            socket,
            remote_addr: Mutex::new(config.remote_addr),
            symmetric_rtp: config.symmetric_rtp,
            closed: AtomicBool::new(false),
            shutdown: Notify::new(),
        })
    }

    /// Current remote address
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        *self.remote_addr.lock()
    }

    /// Set the remote address from signaling
    pub fn set_remote_addr(&self, addr: SocketAddr) {
        *self.remote_addr.lock() = Some(addr);
    }

    async fn send_to_remote(&self, data: &[u8]) -> Result<()> {
        if self.is_closed() {
            return Err(Error::TransportClosed);
        }
        let remote = self
            .remote_addr()
            .ok_or_else(|| Error::Transport("Remote address not known yet".to_string()))?;

        self.socket.send_to(data, remote).await?;
        Ok(())
    }

    fn latch(&self, source: SocketAddr) {
        let mut remote = self.remote_addr.lock();
        if remote.is_none() {
            info!("Latched remote RTP address {}", source);
            *remote = Some(source);
        }
    }
}

#[async_trait]
impl RtpTransport for UdpRtpTransport {
    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    async fn send_rtp(&self, data: Bytes) -> Result<()> {
        trace!("Sending {} RTP bytes", data.len());
        self.send_to_remote(&data).await
    }

    async fn send_rtcp(&self, data: Bytes) -> Result<()> {
        trace!("Sending {} RTCP bytes", data.len());
        self.send_to_remote(&data).await
    }

    async fn recv(&self) -> Result<Datagram> {
        let mut buffer = vec![0u8; DEFAULT_MAX_PACKET_SIZE];

        loop {
            let shutdown = self.shutdown.notified();
            if self.is_closed() {
                return Err(Error::TransportClosed);
            }

            let (size, source) = tokio::select! {
                _ = shutdown => return Err(Error::TransportClosed),
                received = self.socket.recv_from(&mut buffer) => received?,
            };

            if size < RTCP_HEADER_SIZE {
                warn!("Received packet too small: {} bytes from {}", size, source);
                continue;
            }

            if self.symmetric_rtp {
                self.latch(source);
            }

            return Ok(Datagram::classify(Bytes::copy_from_slice(&buffer[..size])));
        }
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("Closing RTP transport");
            self.shutdown.notify_waiters();
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
