//! RTCP feedback handling
//!
//! Reacts to the sub-packets of received compounds and issues the
//! session-initiated requests: full refresh (PLI/FIR) and TMMBR/TMMBN.

use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::{FullRefreshMode, RtpSession};
use crate::buffer::retransmission::Resend;
use crate::error::Error;
use crate::packet::hex_dump;
use crate::packet::rtcp::{
    NackField, PayloadFeedbackFci, RtcpCompoundPacket, RtcpPacket, RtcpPayloadFeedback,
    RtcpReportBlock, RtcpRtpFeedback, RtpFeedbackFci, TmmbItem,
};
use crate::{Result, RtpSequenceNumber};

impl RtpSession {
    /// Handle one received RTCP compound datagram.
    ///
    /// Undecodable compounds are dropped and counted. Errors come only from
    /// writing responses (retransmissions, key frame requests).
    pub async fn on_rtcp_packet(&self, data: &[u8]) -> Result<()> {
        let now = Instant::now();
        if !self.is_running() {
            trace!("Ignoring RTCP packet, session not running");
            return Ok(());
        }

        let data = match self.unprotect_rtcp(data) {
            Ok(data) => data,
            Err(e) => {
                self.drop_packet(format_args!("failed to unprotect RTCP: {}", e));
                return Ok(());
            }
        };

        let compound = match RtcpCompoundPacket::parse(&data) {
            Ok(compound) => compound,
            Err(e) => {
                trace!("Undecodable RTCP: {}", hex_dump(&data));
                self.drop_packet(format_args!("failed to parse RTCP: {}", e));
                return Ok(());
            }
        };

        for packet in compound.packets {
            self.process_rtcp(packet, now).await?;
        }

        self.maybe_send_report(now).await
    }

    async fn process_rtcp(&self, packet: RtcpPacket, now: Instant) -> Result<()> {
        match packet {
            RtcpPacket::SenderReport(sr) => {
                trace!("SR from {:#010x}: {} packets", sr.ssrc, sr.sender_packet_count);
                {
                    let mut recv = self.recv.lock();
                    if recv.media.ssrc() == Some(sr.ssrc) {
                        recv.media.on_sender_report(sr.ntp_timestamp.to_u32(), now);
                    }
                }
                self.handle_report_blocks(&sr.report_blocks, now);
            }
            RtcpPacket::ReceiverReport(rr) => {
                self.handle_report_blocks(&rr.report_blocks, now);
            }
            RtcpPacket::SourceDescription(sdes) => {
                for chunk in &sdes.chunks {
                    if let Some(cname) = sdes.cname(chunk.ssrc) {
                        trace!("CNAME of {:#010x} is {}", chunk.ssrc, cname);
                    }
                }
            }
            RtcpPacket::Goodbye(bye) => {
                info!("Remote sources {:08x?} left: {:?}", bye.sources, bye.reason);
            }
            RtcpPacket::ApplicationDefined(app) => {
                trace!("Ignoring APP packet {:?}", app.name);
            }
            RtcpPacket::RtpFeedback(feedback) => self.handle_rtp_feedback(feedback).await?,
            RtcpPacket::PayloadFeedback(feedback) => self.handle_payload_feedback(feedback),
            RtcpPacket::LegacyFir(fir) => {
                debug!("Legacy FIR from {:#010x}", fir.ssrc);
                self.notify_full_refresh();
            }
            RtcpPacket::LegacyNack(nack) => {
                let field = NackField::new(nack.fsn, nack.blp);
                self.retransmit(field.lost_sequence_numbers().collect()).await?;
            }
        }
        Ok(())
    }

    /// Feed report blocks about our stream to the RTT estimator
    fn handle_report_blocks(&self, blocks: &[RtcpReportBlock], now: Instant) {
        for block in blocks.iter().filter(|block| block.ssrc == self.ssrc) {
            trace!(
                "Report for us: fraction lost {}/256, cumulative {}",
                block.fraction_lost,
                block.cumulative_lost
            );
            let sample = self.state.lock().rtt_estimator.process_report_block(block, now);
            if let Some(rtt) = sample {
                self.set_rtt(rtt);
            }
        }
    }

    async fn handle_rtp_feedback(&self, feedback: RtcpRtpFeedback) -> Result<()> {
        match feedback.fci {
            RtpFeedbackFci::Nack(fields) => {
                let lost = fields
                    .iter()
                    .flat_map(|field| field.lost_sequence_numbers())
                    .collect();
                self.retransmit(lost).await?;
            }
            RtpFeedbackFci::Tmmbr(items) => {
                for item in items.iter().filter(|item| item.ssrc == self.ssrc) {
                    debug!(
                        "TMMBR from {:#010x}: {} bps, overhead {}",
                        feedback.sender_ssrc,
                        item.bitrate(),
                        item.overhead
                    );
                    if let Some(listener) = &self.listener {
                        listener.on_temp_max_media_stream_bitrate_request(item.bitrate(), item.overhead);
                    }
                }
            }
            RtpFeedbackFci::Tmmbn(_) => {
                let fire = {
                    let mut state = self.state.lock();
                    state.pending_tmmbr = false;
                    state.refresh_window_start = None;
                    std::mem::take(&mut state.queued_refresh)
                };
                debug!("TMMBN from {:#010x}, queued refresh: {}", feedback.sender_ssrc, fire);
                if fire {
                    self.request_full_refresh().await?;
                }
            }
            RtpFeedbackFci::Other { fmt, .. } => {
                trace!("Ignoring RTP feedback format {}", fmt);
            }
        }
        Ok(())
    }

    fn handle_payload_feedback(&self, feedback: RtcpPayloadFeedback) {
        match feedback.fci {
            PayloadFeedbackFci::PictureLossIndication => {
                if feedback.media_ssrc == self.ssrc {
                    debug!("PLI from {:#010x}", feedback.sender_ssrc);
                    self.notify_full_refresh();
                }
            }
            PayloadFeedbackFci::FullIntraRequest(entries) => {
                for entry in entries.iter().filter(|entry| entry.ssrc == self.ssrc) {
                    // Repeated FIRs carry the same sequence number
                    let fresh = {
                        let mut recv = self.recv.lock();
                        let fresh = recv.last_fir_seq != Some(entry.seq);
                        recv.last_fir_seq = Some(entry.seq);
                        fresh
                    };
                    if fresh {
                        debug!("FIR #{} from {:#010x}", entry.seq, feedback.sender_ssrc);
                        self.notify_full_refresh();
                    }
                }
            }
            PayloadFeedbackFci::ReceiverEstimatedMaxBitrate(remb) => {
                trace!("REMB {} bps for {:08x?}", remb.bitrate(), remb.ssrcs);
                if let Some(listener) = &self.listener {
                    listener.on_receiver_estimated_max_bitrate(remb.bitrate());
                }
            }
            PayloadFeedbackFci::ApplicationLayer(_) | PayloadFeedbackFci::Other { .. } => {
                trace!("Ignoring payload feedback format {}", feedback.fmt());
            }
        }
    }

    /// Resend NACKed packets, in order.
    ///
    /// The first packet no longer cached ends recovery: the cache is dropped
    /// and the listener asked for a key frame instead.
    async fn retransmit(&self, lost: Vec<RtpSequenceNumber>) -> Result<()> {
        let local_map = self.state.lock().local_map.clone();
        let mut send = self.send.lock().await;

        for seq in lost {
            let extended = send.source.extend(seq);
            let rtx_type = match (&local_map, send.cache.get(extended)) {
                (Some(map), Some(original)) => map.rtx_for_apt(original.payload_type()),
                _ => None,
            };

            match send.cache.resend(extended, rtx_type) {
                Resend::Packet(packet) => {
                    trace!(
                        "Retransmitting {} as seq {} on {:#010x}",
                        extended,
                        packet.sequence_number(),
                        packet.ssrc()
                    );
                    let data = self.protect_rtp(packet.to_bytes(&self.config.extension_map)?)?;
                    let result = self.transport.send_rtp(data).await;
                    self.check_transport(result)?;
                    self.state.lock().stats.retransmissions_sent += 1;
                }
                Resend::Miss => {
                    warn!("Packet {} no longer cached, falling back to key frame", extended);
                    send.cache.clear();
                    drop(send);
                    self.notify_full_refresh();
                    return Ok(());
                }
            }
        }

        Ok(())
    }

    fn notify_full_refresh(&self) {
        if let Some(listener) = &self.listener {
            listener.on_full_refresh_requested();
        }
    }

    /// Ask the remote sender for a key frame with PLI or FIR.
    ///
    /// Requests within the refresh window of the previous one are dropped and
    /// requests made while a TMMBR is pending are held until its TMMBN.
    /// The jitter buffer stops waiting for missing packets.
    pub async fn request_full_refresh(&self) -> Result<()> {
        let now = Instant::now();
        let request = {
            let mut state = self.state.lock();
            if !state.running {
                return Err(Error::NotReady("session not started".to_string()));
            }
            if state.pending_tmmbr {
                debug!("Full refresh queued behind pending TMMBR");
                state.queued_refresh = true;
                return Ok(());
            }
            if matches!(state.refresh_window_start, Some(start)
                if now.saturating_duration_since(start) < self.config.full_refresh_window)
            {
                debug!("Full refresh suppressed, previous request still pending");
                return Ok(());
            }

            state.refresh_window_start = Some(now);
            state.last_full_refresh = Some(now);
            state.stats.full_refreshes_requested += 1;

            let media_ssrc = self.recv.lock().media.ssrc().unwrap_or_default();
            match self.config.full_refresh_mode {
                FullRefreshMode::Pli => RtcpPayloadFeedback::pli(self.ssrc, media_ssrc),
                FullRefreshMode::Fir => {
                    state.fir_seq = state.fir_seq.wrapping_add(1);
                    RtcpPayloadFeedback::fir(self.ssrc, media_ssrc, state.fir_seq)
                }
            }
        };

        info!("Requesting full refresh with {:?}", self.config.full_refresh_mode);
        self.jitter.hurry_up();

        self.send_rtcp(vec![
            self.empty_receiver_report(),
            RtcpPacket::PayloadFeedback(request),
        ])
        .await
    }

    /// Ask the remote sender to cap its bitrate (TMMBR).
    ///
    /// Full refresh requests are held back until the matching TMMBN arrives.
    pub async fn request_temp_max_media_stream_bitrate(&self, bitrate: u64) -> Result<()> {
        let media_ssrc = {
            let mut state = self.state.lock();
            if !state.running {
                return Err(Error::NotReady("session not started".to_string()));
            }
            state.pending_tmmbr = true;
            self.recv.lock().media.ssrc().unwrap_or_default()
        };

        debug!("Sending TMMBR {} bps to {:#010x}", bitrate, media_ssrc);
        self.send_rtcp(vec![
            self.empty_receiver_report(),
            RtcpPacket::RtpFeedback(RtcpRtpFeedback::tmmbr(
                self.ssrc,
                TmmbItem::new(media_ssrc, bitrate, 0),
            )),
        ])
        .await
    }

    /// Acknowledge a TMMBR with the bound we apply (TMMBN)
    pub async fn send_temp_max_media_stream_bitrate_notification(
        &self,
        bitrate: u64,
        overhead: u16,
    ) -> Result<()> {
        if !self.is_running() {
            return Err(Error::NotReady("session not started".to_string()));
        }

        debug!("Sending TMMBN {} bps, overhead {}", bitrate, overhead);
        self.send_rtcp(vec![
            self.empty_receiver_report(),
            RtcpPacket::RtpFeedback(RtcpRtpFeedback::tmmbn(
                self.ssrc,
                vec![TmmbItem::new(self.ssrc, bitrate, overhead)],
            )),
        ])
        .await
    }
}
