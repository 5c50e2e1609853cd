use std::sync::Arc;

use tokio::sync::watch;
use webrtc::{
    api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8},
    rtp_transceiver::rtp_codec::RTCRtpCodecCapability,
    track::track_local::{track_local_static_sample::TrackLocalStaticSample, TrackLocal},
};

pub type LocalTrack = Arc<dyn TrackLocal + Send + Sync>;

const STREAM_ID: &str = "duet-local";

/// What the session needs from local capture. The session never starts
/// capture itself; it only attaches whatever tracks exist.
pub trait MediaSource: Send + Sync {
    /// At least one active track.
    fn is_ready(&self) -> bool;
    fn tracks(&self) -> Vec<LocalTrack>;
    fn watch_ready(&self) -> watch::Receiver<bool>;
}

pub fn silent_audio_track() -> LocalTrack {
    Arc::new(TrackLocalStaticSample::new(
        RTCRtpCodecCapability {
            mime_type: MIME_TYPE_OPUS.to_owned(),
            clock_rate: 48_000,
            channels: 2,
            ..Default::default()
        },
        "audio".to_owned(),
        STREAM_ID.to_owned(),
    ))
}

pub fn blank_video_track() -> LocalTrack {
    Arc::new(TrackLocalStaticSample::new(
        RTCRtpCodecCapability {
            mime_type: MIME_TYPE_VP8.to_owned(),
            clock_rate: 90_000,
            ..Default::default()
        },
        "video".to_owned(),
        STREAM_ID.to_owned(),
    ))
}

/// A local stream whose tracks are supplied by whoever owns capture.
pub struct LocalStream {
    tracks: watch::Sender<Vec<LocalTrack>>,
    ready: watch::Sender<bool>,
}

impl LocalStream {
    pub fn new() -> Self {
        Self {
            tracks: watch::Sender::new(vec![]),
            ready: watch::Sender::new(false),
        }
    }

    /// Placeholder tracks for the enabled kinds, for hosts without capture.
    pub fn with_placeholder_tracks(audio: bool, video: bool) -> Self {
        let stream = Self::new();
        if audio {
            stream.add_track(silent_audio_track());
        }
        if video {
            stream.add_track(blank_video_track());
        }
        stream
    }

    pub fn add_track(&self, track: LocalTrack) {
        self.tracks.send_modify(|tracks| tracks.push(track));
        self.ready.send_replace(true);
    }
}

impl Default for LocalStream {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaSource for LocalStream {
    fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    fn tracks(&self) -> Vec<LocalTrack> {
        self.tracks.borrow().clone()
    }

    fn watch_ready(&self) -> watch::Receiver<bool> {
        self.ready.subscribe()
    }
}
