//! RTP Session Management
//!
//! An `RtpSession` owns one send pipeline and one receive pipeline for a
//! single media line. The send path stamps outgoing packets, keeps copies for
//! retransmission and writes them out. The receive path unprotects, parses and
//! routes datagrams: RTP to the loss tracker and jitter buffer, RTCP to the
//! feedback handlers. Sender reports drive round-trip-time estimation, which
//! in turn tunes NACK gating and the jitter buffer wait.
//!
//! Locking: the send path holds an async mutex across stamping, caching and
//! writing. Shared session state and receive state sit behind short-lived
//! synchronous locks that are never held across an await. When more than one
//! is needed they are taken in the order send, state, recv.

mod config;
mod feedback;
mod listener;
pub mod source;

pub use config::{
    FullRefreshMode, RtpMap, SessionConfig, DEFAULT_FULL_REFRESH_WINDOW, DEFAULT_REPORT_INTERVAL,
};
pub use listener::SessionListener;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::buffer::jitter::{JitterBuffer, JitterBufferStats};
use crate::buffer::retransmission::RetransmissionCache;
use crate::congestion::CongestionController;
use crate::error::Error;
use crate::packet::rtcp::{
    NtpTimestamp, Remb, RtcpCompoundPacket, RtcpGoodbye, RtcpPacket, RtcpPayloadFeedback,
    RtcpReceiverReport, RtcpRtpFeedback, RtcpSenderReport, RtcpSourceDescription,
};
use crate::packet::{hex_dump, CodecId, ExtensionType, RtpPacket};
use crate::security::SrtpContext;
use crate::stats::loss::LossTracker;
use crate::stats::rtt::RttEstimator;
use crate::time::abs_send_time_from_millis;
use crate::transport::{Datagram, RtpTransport};
use crate::{Result, RtpSsrc};

use source::{IncomingSource, OutgoingSource};

/// NACK is only used while the round trip time stays below this
pub const NACK_RTT_LIMIT: Duration = Duration::from_millis(240);

/// Jitter buffer wait before adding the round trip time
const JITTER_BASE_WAIT: Duration = Duration::from_millis(60);

/// Upper bound of the jitter buffer wait
const JITTER_MAX_WAIT: Duration = Duration::from_millis(300);

/// Repeated NACKs for old gaps are spaced at least this far apart
const MIN_NACK_INTERVAL: Duration = Duration::from_millis(20);

/// Counters exposed to the media pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MediaStatistics {
    pub is_sending: bool,
    pub is_receiving: bool,
    pub num_send_packets: u64,
    pub num_recv_packets: u64,
    pub total_send_bytes: u64,
    pub total_recv_bytes: u64,
    /// Cumulative loss of the current remote source
    pub lost_recv_packets: u64,
    /// Inbound datagrams dropped as undecodable or unexpected
    pub dropped_packets: u64,
    pub nacks_sent: u64,
    pub retransmissions_sent: u64,
    pub full_refreshes_requested: u64,
    /// Last round trip time applied with `set_rtt`
    pub rtt: Option<Duration>,
}

/// State guarded by the send mutex
struct SendState {
    source: OutgoingSource,
    cache: RetransmissionCache,
}

/// Shared session state
struct SessionState {
    running: bool,
    ended: bool,

    local_map: Option<Arc<RtpMap>>,
    remote_map: Option<Arc<RtpMap>>,
    sending_codec: Option<CodecId>,

    rtt: Duration,
    nack_enabled: bool,
    rtt_estimator: RttEstimator,

    /// Last PLI/FIR we sent, gates NACKs
    last_full_refresh: Option<Instant>,
    /// Start of the window suppressing repeated refresh requests
    refresh_window_start: Option<Instant>,
    last_nack: Option<Instant>,
    last_report: Option<Instant>,
    fir_seq: u8,

    /// A TMMBR is awaiting its TMMBN
    pending_tmmbr: bool,
    /// A full refresh was requested while the TMMBR was pending
    queued_refresh: bool,

    stats: MediaStatistics,
}

/// State of the receive pipeline
struct RecvState {
    media: IncomingSource,
    rtx: IncomingSource,
    loss: LossTracker,
    /// Sequence number of the last FIR addressed to us
    last_fir_seq: Option<u8>,
}

/// RTP/RTCP session for one media line
pub struct RtpSession {
    config: SessionConfig,
    ssrc: RtpSsrc,
    rtx_ssrc: Option<RtpSsrc>,

    transport: Arc<dyn RtpTransport>,
    security: Option<Arc<dyn SrtpContext>>,
    congestion: Option<Arc<dyn CongestionController>>,
    listener: Option<Arc<dyn SessionListener>>,

    jitter: JitterBuffer,
    send: tokio::sync::Mutex<SendState>,
    state: Mutex<SessionState>,
    recv: Mutex<RecvState>,
}

impl RtpSession {
    /// Create a session writing to `transport`
    pub fn new(config: SessionConfig, transport: Arc<dyn RtpTransport>) -> Self {
        let mut rng = rand::thread_rng();
        let ssrc = config.ssrc.unwrap_or_else(|| rng.gen());

        let cache = match config.use_rtx {
            Some(rtx) => RetransmissionCache::with_rtx(rtx.ssrc.unwrap_or_else(|| rng.gen()), rng.gen()),
            None => RetransmissionCache::new(),
        };
        let rtx_ssrc = cache.rtx_ssrc();

        let state = SessionState {
            running: false,
            ended: false,
            local_map: None,
            remote_map: None,
            sending_codec: None,
            rtt: Duration::ZERO,
            nack_enabled: config.use_nack,
            rtt_estimator: RttEstimator::new(),
            last_full_refresh: None,
            refresh_window_start: None,
            last_nack: None,
            last_report: None,
            fir_seq: 0,
            pending_tmmbr: false,
            queued_refresh: false,
            stats: MediaStatistics::default(),
        };

        let recv = RecvState {
            media: IncomingSource::new(),
            rtx: IncomingSource::new(),
            loss: LossTracker::new(config.loss_window),
            last_fir_seq: None,
        };

        debug!(
            "Created {:?} RTP session with SSRC {:#010x} (rtx {:?})",
            config.media, ssrc, rtx_ssrc
        );

        Self {
            jitter: JitterBuffer::new(config.jitter.clone()),
            send: tokio::sync::Mutex::new(SendState {
                source: OutgoingSource::new(ssrc, rng.gen()),
                cache,
            }),
            state: Mutex::new(state),
            recv: Mutex::new(recv),
            config,
            ssrc,
            rtx_ssrc,
            transport,
            security: None,
            congestion: None,
            listener: None,
        }
    }

    /// Receive refresh and bandwidth callbacks
    pub fn with_listener(mut self, listener: Arc<dyn SessionListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Feed arrivals to `controller` and advertise its estimate in REMB
    pub fn with_congestion_controller(mut self, controller: Arc<dyn CongestionController>) -> Self {
        self.congestion = Some(controller);
        self
    }

    /// Protect and unprotect every datagram with `context`
    pub fn with_security(mut self, context: Arc<dyn SrtpContext>) -> Self {
        self.security = Some(context);
        self
    }

    pub fn ssrc(&self) -> RtpSsrc {
        self.ssrc
    }

    pub fn rtx_ssrc(&self) -> Option<RtpSsrc> {
        self.rtx_ssrc
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// SSRC of the remote media source currently bound
    pub fn remote_ssrc(&self) -> Option<RtpSsrc> {
        self.recv.lock().media.ssrc()
    }

    /// Start the session. Calling it again is a no-op.
    pub fn init(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.ended {
            return Err(Error::NotReady("session has ended".to_string()));
        }
        if !state.running {
            state.running = true;
            info!("RTP session {:#010x} started", self.ssrc);
        }
        Ok(())
    }

    /// Stop the session: say goodbye, flush the jitter buffer and close the
    /// transport. Calling it again is a no-op.
    pub async fn end(&self) -> Result<()> {
        let was_running = {
            let mut state = self.state.lock();
            if state.ended {
                return Ok(());
            }
            state.ended = true;
            std::mem::replace(&mut state.running, false)
        };

        self.jitter.cancel();

        if was_running && !self.transport.is_closed() {
            let bye = vec![
                self.empty_receiver_report(),
                RtcpPacket::Goodbye(RtcpGoodbye::new(self.ssrc)),
            ];
            if let Err(e) = self.send_rtcp(bye).await {
                debug!("Failed to send BYE: {}", e);
            }
        }

        self.send.lock().await.cache.clear();
        self.transport.close().await?;

        info!("RTP session {:#010x} ended", self.ssrc);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Payload types we send with
    pub fn set_local_rtp_map(&self, map: RtpMap) {
        debug!("Local RTP map set: {:?}", map);
        self.state.lock().local_map = Some(Arc::new(map));
    }

    /// Payload types the peer sends with
    pub fn set_remote_rtp_map(&self, map: RtpMap) {
        debug!("Remote RTP map set: {:?}", map);
        self.state.lock().remote_map = Some(Arc::new(map));
    }

    /// Codec used for packets that don't name one
    pub fn set_sending_codec(&self, codec: CodecId) -> Result<()> {
        let mut state = self.state.lock();
        let negotiated = state
            .local_map
            .as_ref()
            .map(|map| map.type_for_codec(codec).is_some())
            .ok_or_else(|| Error::NotReady("local RTP map not set".to_string()))?;

        if !negotiated {
            return Err(Error::NotReady(format!(
                "codec {:?} not in local RTP map",
                codec
            )));
        }

        debug!("Sending codec set to {:?}", codec);
        state.sending_codec = Some(codec);
        Ok(())
    }

    /// Stamp and send a media packet.
    ///
    /// The packet's codec (or the sending codec) picks the payload type; the
    /// session fills in SSRC and sequence number and keeps a copy for
    /// retransmission when NACK is negotiated.
    pub async fn send_packet(&self, mut packet: RtpPacket) -> Result<()> {
        if self.transport.is_closed() {
            return Err(Error::TransportClosed);
        }

        let (payload_type, codec, rtt) = {
            let state = self.state.lock();
            if !state.running {
                return Err(Error::NotReady("session not started".to_string()));
            }
            let map = state
                .local_map
                .as_ref()
                .ok_or_else(|| Error::NotReady("local RTP map not set".to_string()))?;
            let codec = packet
                .codec
                .or(state.sending_codec)
                .ok_or_else(|| Error::NotReady("no sending codec selected".to_string()))?;
            let payload_type = map.type_for_codec(codec).ok_or_else(|| {
                Error::NotReady(format!("codec {:?} not in local RTP map", codec))
            })?;
            (payload_type, codec, state.rtt)
        };

        let payload_len = packet.payload.len();
        let mut send = self.send.lock().await;
        let now = Instant::now();

        let (seq, extended) = send.source.next_sequence();
        packet.media = self.config.media;
        packet.codec = Some(codec);
        packet.header.payload_type = payload_type;
        packet.header.ssrc = self.ssrc;
        packet.header.sequence_number = seq;
        packet.header.padding = false;
        packet.extended_seq = extended;
        packet.send_time = Some(now);
        if self
            .config
            .extension_map
            .id_of(ExtensionType::AbsoluteSendTime)
            .is_some()
        {
            packet.header.extensions.abs_send_time = Some(abs_send_time_from_millis(wall_clock_millis()));
        }

        let data = self.protect_rtp(packet.to_bytes(&self.config.extension_map)?)?;
        let size = data.len();

        send.source.on_sent(payload_len, packet.timestamp(), now);
        trace!(
            "Sending packet seq={} ext={} pt={} ts={}",
            seq,
            extended,
            payload_type,
            packet.timestamp()
        );
        if self.config.use_nack {
            send.cache.set_rtt(rtt);
            send.cache.retain(packet);
        }

        let result = self.transport.send_rtp(data).await;
        drop(send);
        self.check_transport(result)?;

        {
            let mut state = self.state.lock();
            state.stats.is_sending = true;
            state.stats.num_send_packets += 1;
            state.stats.total_send_bytes += size as u64;
        }

        self.maybe_send_report(now).await
    }

    /// Handle one received RTP datagram.
    ///
    /// Undecodable or unexpected packets are dropped and counted; only a
    /// closed transport (while sending feedback) is reported as an error.
    pub async fn on_rtp_packet(&self, data: &[u8]) -> Result<()> {
        let now = Instant::now();

        let remote_map = {
            let mut state = self.state.lock();
            if !state.running {
                trace!("Ignoring RTP packet, session not running");
                return Ok(());
            }
            state.stats.is_receiving = true;
            state.stats.num_recv_packets += 1;
            state.stats.total_recv_bytes += data.len() as u64;
            state.remote_map.clone()
        };

        let Some(remote_map) = remote_map else {
            self.drop_packet(format_args!("remote RTP map not set"));
            return Ok(());
        };

        let data = match self.unprotect_rtp(data) {
            Ok(data) => data,
            Err(e) => {
                self.drop_packet(format_args!("failed to unprotect RTP: {}", e));
                return Ok(());
            }
        };

        let mut packet = match RtpPacket::parse(&data, &self.config.extension_map) {
            Ok(packet) => packet,
            Err(e) => {
                trace!("Undecodable RTP: {}", hex_dump(&data));
                self.drop_packet(format_args!("failed to parse RTP: {}", e));
                return Ok(());
            }
        };
        packet.media = self.config.media;
        packet.arrival_time = Some(now);

        let retransmission = match remote_map.apt_for_rtx(packet.payload_type()) {
            Some(apt) => {
                let media_ssrc = {
                    let mut recv = self.recv.lock();
                    if recv.rtx.ssrc() != Some(packet.ssrc()) {
                        recv.rtx.reset(packet.ssrc());
                    }
                    recv.rtx.update(&packet, now, self.config.clock_rate, true);
                    recv.media.ssrc()
                };
                let Some(media_ssrc) = media_ssrc else {
                    self.drop_packet(format_args!("RTX packet before any media"));
                    return Ok(());
                };
                packet = match packet.from_rtx(media_ssrc, apt) {
                    Ok(packet) => packet,
                    Err(e) => {
                        self.drop_packet(format_args!("failed to unwrap RTX: {}", e));
                        return Ok(());
                    }
                };
                true
            }
            None => false,
        };

        let Some(codec) = remote_map.codec_for_type(packet.payload_type()) else {
            self.drop_packet(format_args!("unknown payload type {}", packet.payload_type()));
            return Ok(());
        };
        packet.codec = Some(codec);

        let ssrc = packet.ssrc();
        let (rebound, lost, gap) = {
            let mut recv = self.recv.lock();
            let rebound = recv.media.ssrc() != Some(ssrc);
            if rebound {
                match recv.media.ssrc() {
                    Some(old) => info!("Remote SSRC changed {:#010x} -> {:#010x}", old, ssrc),
                    None => debug!("Bound remote SSRC {:#010x}", ssrc),
                }
                recv.media.reset(ssrc);
                recv.loss.reset();
            }
            packet.extended_seq = recv
                .media
                .update(&packet, now, self.config.clock_rate, retransmission);
            recv.loss.observe(packet.extended_seq);
            (rebound, recv.loss.lost(), recv.loss.last_gap())
        };

        if rebound {
            // Reset clears cancellation, so it must not run after `end`
            let state = self.state.lock();
            if !state.running {
                trace!("Session ended while rebinding {:#010x}", ssrc);
                return Ok(());
            }
            self.jitter.reset();
        }

        if let Some(controller) = &self.congestion {
            controller.update(ssrc, &packet);
            if gap > 0 {
                controller.update_lost(ssrc, gap as u32);
            }
        }

        trace!("Received {:?}{}", packet, if retransmission { " (rtx)" } else { "" });
        if !self.jitter.add(packet) {
            trace!("Packet not accepted by jitter buffer");
        }

        if lost > 0 {
            self.maybe_send_nack(now, gap > 0).await?;
        }

        self.maybe_send_report(now).await
    }

    /// Wait for the next media packet in order.
    ///
    /// Returns `None` once the session ends.
    pub async fn next_packet(&self) -> Option<RtpPacket> {
        self.jitter.wait().await
    }

    /// Next media packet if one can be released now
    pub fn try_next_packet(&self) -> Option<RtpPacket> {
        self.jitter.get_ordered()
    }

    /// Apply a round trip time: NACK is enabled only below 240ms and the
    /// jitter buffer waits `min(60ms + rtt, 300ms)`
    pub fn set_rtt(&self, rtt: Duration) {
        let enabled = self.config.use_nack && rtt < NACK_RTT_LIMIT;
        let max_wait = (JITTER_BASE_WAIT + rtt).min(JITTER_MAX_WAIT);

        let remote_ssrc = {
            let mut state = self.state.lock();
            if state.nack_enabled != enabled {
                info!(
                    "NACK {} at rtt {:?}",
                    if enabled { "enabled" } else { "disabled" },
                    rtt
                );
            }
            state.nack_enabled = enabled;
            state.rtt = rtt;
            state.stats.rtt = Some(rtt);
            self.recv.lock().media.ssrc()
        };

        debug!("RTT set to {:?}, jitter buffer wait {:?}", rtt, max_wait);
        self.jitter.set_max_wait_time(max_wait);

        if let (Some(controller), Some(ssrc)) = (&self.congestion, remote_ssrc) {
            controller.update_rtt(ssrc, rtt);
        }
    }

    pub fn rtt(&self) -> Duration {
        self.state.lock().rtt
    }

    pub fn is_nack_enabled(&self) -> bool {
        self.state.lock().nack_enabled
    }

    /// Current jitter buffer wait
    pub fn max_wait_time(&self) -> Duration {
        self.jitter.max_wait_time()
    }

    pub fn stats(&self) -> MediaStatistics {
        let mut stats = self.state.lock().stats.clone();
        stats.lost_recv_packets = self.recv.lock().media.lost() as u64;
        stats
    }

    pub fn jitter_stats(&self) -> JitterBufferStats {
        self.jitter.stats()
    }

    /// Read datagrams from the transport until it closes.
    ///
    /// Always ends with `Error::TransportClosed`.
    pub async fn run(&self) -> Result<()> {
        loop {
            let result = match self.transport.recv().await {
                Ok(Datagram::Rtp(data)) => self.on_rtp_packet(&data).await,
                Ok(Datagram::Rtcp(data)) => self.on_rtcp_packet(&data).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => {}
                Err(Error::TransportClosed) => {
                    self.teardown();
                    info!("RTP session {:#010x} receive loop finished", self.ssrc);
                    return Err(Error::TransportClosed);
                }
                Err(e) => warn!("Error in receive loop: {}", e),
            }
        }
    }

    /// Send a sender report if the report interval has passed
    async fn maybe_send_report(&self, now: Instant) -> Result<()> {
        {
            let mut state = self.state.lock();
            if !state.running {
                return Ok(());
            }
            if matches!(state.last_report, Some(last)
                if now.saturating_duration_since(last) < self.config.report_interval)
            {
                return Ok(());
            }
            state.last_report = Some(now);
        }

        self.send_report(now).await
    }

    /// SR (or RR before anything was sent) with a block about the remote
    /// source, our CNAME and the current REMB estimate
    async fn send_report(&self, now: Instant) -> Result<()> {
        let send = self.send.lock().await;
        let block = self.recv.lock().media.report_block(now);
        let remote_ssrc = block.as_ref().map(|block| block.ssrc);

        let mut packets = Vec::with_capacity(3);
        if send.source.packets > 0 {
            let ntp = NtpTimestamp::now();
            let mut sr = RtcpSenderReport::new(self.ssrc);
            sr.ntp_timestamp = ntp;
            sr.rtp_timestamp = send.source.rtp_timestamp_at(now, self.config.clock_rate);
            sr.sender_packet_count = send.source.packets;
            sr.sender_octet_count = send.source.octets;
            sr.report_blocks.extend(block);

            self.state.lock().rtt_estimator.record_sr_sent(ntp.to_u32(), now);
            packets.push(RtcpPacket::SenderReport(sr));
        } else {
            let mut rr = RtcpReceiverReport::new(self.ssrc);
            rr.report_blocks.extend(block);
            packets.push(RtcpPacket::ReceiverReport(rr));
        }

        packets.push(RtcpPacket::SourceDescription(
            RtcpSourceDescription::with_cname(self.ssrc, &self.config.cname),
        ));

        if let (Some(controller), Some(remote_ssrc)) = (&self.congestion, remote_ssrc) {
            let bitrate = controller.estimated_bitrate();
            if bitrate > 0 {
                packets.push(RtcpPacket::PayloadFeedback(RtcpPayloadFeedback::remb(
                    self.ssrc,
                    Remb::new(bitrate, vec![remote_ssrc]),
                )));
            }
        }

        trace!("Sending report with {} sub-packets", packets.len());
        let result = self.send_rtcp(packets).await;
        drop(send);
        result
    }

    /// Send a NACK for every gap in the loss window when allowed.
    ///
    /// NACKs need NACK enabled, a last key frame request older than half the
    /// round trip time, and either a new gap or the resend interval passed.
    async fn maybe_send_nack(&self, now: Instant, new_gap: bool) -> Result<()> {
        let (fields, media_ssrc) = {
            let mut state = self.state.lock();
            if !state.nack_enabled {
                return Ok(());
            }
            if matches!(state.last_full_refresh, Some(refresh)
                if now.saturating_duration_since(refresh) <= state.rtt / 2)
            {
                return Ok(());
            }
            let interval = state.rtt.max(MIN_NACK_INTERVAL);
            if !new_gap
                && matches!(state.last_nack, Some(last)
                    if now.saturating_duration_since(last) < interval)
            {
                return Ok(());
            }

            let recv = self.recv.lock();
            let Some(media_ssrc) = recv.media.ssrc() else {
                return Ok(());
            };
            let fields = recv.loss.build_nack_fields();
            if fields.is_empty() {
                return Ok(());
            }

            state.last_nack = Some(now);
            state.stats.nacks_sent += 1;
            (fields, media_ssrc)
        };

        debug!(
            "Sending NACK for {:#010x}: {:?}",
            media_ssrc,
            fields.iter().map(|field| field.pid).collect::<Vec<_>>()
        );
        self.send_rtcp(vec![
            self.empty_receiver_report(),
            RtcpPacket::RtpFeedback(RtcpRtpFeedback::nack(self.ssrc, media_ssrc, fields)),
        ])
        .await
    }

    /// Serialize, protect and write an RTCP compound packet
    async fn send_rtcp(&self, packets: Vec<RtcpPacket>) -> Result<()> {
        let compound = RtcpCompoundPacket::with_packets(packets);
        let data = compound.to_bytes()?;
        let data = match &self.security {
            Some(security) => security.protect_rtcp(&data)?,
            None => data,
        };

        let result = self.transport.send_rtcp(data).await;
        self.check_transport(result)
    }

    /// First sub-packet of feedback-only compounds
    fn empty_receiver_report(&self) -> RtcpPacket {
        RtcpPacket::ReceiverReport(RtcpReceiverReport::new(self.ssrc))
    }

    fn protect_rtp(&self, data: Bytes) -> Result<Bytes> {
        match &self.security {
            Some(security) => security.protect_rtp(&data),
            None => Ok(data),
        }
    }

    fn unprotect_rtp(&self, data: &[u8]) -> Result<Bytes> {
        match &self.security {
            Some(security) => security.unprotect_rtp(data),
            None => Ok(Bytes::copy_from_slice(data)),
        }
    }

    fn unprotect_rtcp(&self, data: &[u8]) -> Result<Bytes> {
        match &self.security {
            Some(security) => security.unprotect_rtcp(data),
            None => Ok(Bytes::copy_from_slice(data)),
        }
    }

    fn drop_packet(&self, reason: fmt::Arguments<'_>) {
        debug!("Dropping inbound packet: {}", reason);
        self.state.lock().stats.dropped_packets += 1;
    }

    /// Tear the session down once the transport reports closure
    fn check_transport(&self, result: Result<()>) -> Result<()> {
        if matches!(result, Err(Error::TransportClosed)) {
            self.teardown();
        }
        result
    }

    fn teardown(&self) {
        {
            let mut state = self.state.lock();
            if state.running {
                warn!("Transport closed, stopping RTP session {:#010x}", self.ssrc);
                state.running = false;
            }
        }
        self.jitter.cancel();
    }
}

fn wall_clock_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
