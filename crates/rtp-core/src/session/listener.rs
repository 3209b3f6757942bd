/// Callbacks from a session to the media pipeline that owns it.
///
/// Invoked from the receive path with no session lock held, so
/// implementations may call back into the session.
pub trait SessionListener: Send + Sync {
    /// The peer needs a key frame from us, either because it asked (PLI,
    /// FIR) or because a NACKed packet was no longer cached
    fn on_full_refresh_requested(&self) {}

    /// The peer's receiver estimated maximum bitrate (REMB) in bits per second
    fn on_receiver_estimated_max_bitrate(&self, _bitrate: u64) {}

    /// The peer asked us to cap our media bitrate (TMMBR)
    fn on_temp_max_media_stream_bitrate_request(&self, _bitrate: u64, _overhead: u16) {}
}
