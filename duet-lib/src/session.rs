use std::fmt;

use serde::Serialize;
use webrtc::{
    ice_transport::ice_connection_state::RTCIceConnectionState,
    peer_connection::peer_connection_state::RTCPeerConnectionState,
};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    #[default]
    Unassigned,
    Initiator,
    Responder,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    #[default]
    Disconnected,
    Failed,
    Closed,
}

impl ConnectionState {
    pub fn from_rtc(state: RTCPeerConnectionState) -> Option<Self> {
        Some(match state {
            RTCPeerConnectionState::New => Self::New,
            RTCPeerConnectionState::Connecting => Self::Connecting,
            RTCPeerConnectionState::Connected => Self::Connected,
            RTCPeerConnectionState::Disconnected => Self::Disconnected,
            RTCPeerConnectionState::Failed => Self::Failed,
            RTCPeerConnectionState::Closed => Self::Closed,
            RTCPeerConnectionState::Unspecified => return None,
        })
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::New => "new",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
            Self::Closed => "closed",
        })
    }
}

/// Informational only; nothing in the session logic branches on it.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IceState {
    #[default]
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

impl IceState {
    pub fn from_rtc(state: RTCIceConnectionState) -> Option<Self> {
        Some(match state {
            RTCIceConnectionState::New => Self::New,
            RTCIceConnectionState::Checking => Self::Checking,
            RTCIceConnectionState::Connected => Self::Connected,
            RTCIceConnectionState::Completed => Self::Completed,
            RTCIceConnectionState::Disconnected => Self::Disconnected,
            RTCIceConnectionState::Failed => Self::Failed,
            RTCIceConnectionState::Closed => Self::Closed,
            RTCIceConnectionState::Unspecified => return None,
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RemoteTrack {
    pub kind: String,
    pub ssrc: u32,
}

/// One connection attempt. `Default` is the initial state every teardown
/// returns to.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Session {
    pub role: Role,
    pub connection_state: ConnectionState,
    pub ice_state: IceState,
    /// Empty until candidate gathering completes.
    pub local_token: String,
    pub remote_raw: String,
    pub creating_offer: bool,
    pub creating_answer: bool,
    pub remote_tracks: Vec<RemoteTrack>,
    /// Shareable link for `local_token`; empty while there is none.
    pub share_url: String,
}

impl Session {
    pub fn can_retry(&self) -> bool {
        matches!(
            self.connection_state,
            ConnectionState::Failed | ConnectionState::Disconnected
        )
    }

    pub fn has_remote(&self) -> bool {
        !self.remote_raw.is_empty()
    }

    pub fn has_local_token(&self) -> bool {
        !self.local_token.is_empty()
    }
}
