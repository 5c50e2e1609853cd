use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::{debug, trace};
use webrtc::{
    api::{
        interceptor_registry::register_default_interceptors, media_engine::MediaEngine,
        setting_engine::SettingEngine, APIBuilder,
    },
    ice_transport::ice_server::RTCIceServer,
    interceptor::registry::Registry,
    peer_connection::{
        configuration::RTCConfiguration, policy::ice_transport_policy::RTCIceTransportPolicy,
        RTCPeerConnection,
    },
};

use crate::{
    config::Config,
    descriptor::Descriptor,
    media::LocalTrack,
    session::{ConnectionState, IceState, RemoteTrack},
};

use super::{Engine, EngineEvent, EnginePeer, EventSink};

/// [`Engine`] backed by webrtc-rs.
#[derive(Clone, Debug)]
pub struct WebrtcEngine {
    ice_servers: Vec<String>,
    ice_disconnected_timeout: Duration,
    ice_failed_timeout: Duration,
}

impl WebrtcEngine {
    pub fn new(config: &Config) -> Self {
        Self {
            ice_servers: config.ice_servers.clone(),
            ice_disconnected_timeout: config.ice_disconnected_timeout(),
            ice_failed_timeout: config.ice_failed_timeout(),
        }
    }

    fn rtc_config(&self) -> RTCConfiguration {
        let ice_servers = if self.ice_servers.is_empty() {
            vec![]
        } else {
            vec![RTCIceServer {
                urls: self.ice_servers.clone(),
                ..Default::default()
            }]
        };
        RTCConfiguration {
            ice_servers,
            ice_transport_policy: RTCIceTransportPolicy::All,
            ..Default::default()
        }
    }

    async fn create_peer_connection(&self) -> Result<RTCPeerConnection> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;
        let mut setting_engine = SettingEngine::default();
        setting_engine.set_ice_timeouts(
            Some(self.ice_disconnected_timeout),
            Some(self.ice_failed_timeout),
            None,
        );
        Ok(APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .with_setting_engine(setting_engine)
            .build()
            .new_peer_connection(self.rtc_config())
            .await?)
    }
}

impl Default for WebrtcEngine {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

#[async_trait]
impl Engine for WebrtcEngine {
    async fn connect(&self, events: EventSink) -> Result<Box<dyn EnginePeer>> {
        let rtc = Arc::new(self.create_peer_connection().await?);
        attach_handlers(&rtc, events);
        Ok(Box::new(WebrtcPeer { rtc }))
    }
}

fn attach_handlers(rtc: &RTCPeerConnection, events: EventSink) {
    let tx = events.clone();
    rtc.on_ice_candidate(Box::new(move |candidate| {
        let event = match candidate {
            Some(candidate) => {
                trace!("local candidate {:?} {}", candidate.typ, candidate.address);
                EngineEvent::Candidate(candidate.address)
            }
            None => EngineEvent::GatheringComplete,
        };
        let _ = tx.send(event);
        Box::pin(async {})
    }));
    let tx = events.clone();
    rtc.on_peer_connection_state_change(Box::new(move |state| {
        debug!("on_peer_connection_state_change {}", state);
        if let Some(state) = ConnectionState::from_rtc(state) {
            let _ = tx.send(EngineEvent::ConnectionState(state));
        }
        Box::pin(async {})
    }));
    let tx = events.clone();
    rtc.on_ice_connection_state_change(Box::new(move |state| {
        trace!("on_ice_connection_state_change {}", state);
        if let Some(state) = IceState::from_rtc(state) {
            let _ = tx.send(EngineEvent::IceConnectionState(state));
        }
        Box::pin(async {})
    }));
    let tx = events;
    rtc.on_track(Box::new(move |track, _receiver, _transceiver| {
        let _ = tx.send(EngineEvent::Track(RemoteTrack {
            kind: track.kind().to_string(),
            ssrc: track.ssrc(),
        }));
        Box::pin(async {})
    }));
}

struct WebrtcPeer {
    rtc: Arc<RTCPeerConnection>,
}

impl Drop for WebrtcPeer {
    fn drop(&mut self) {
        trace!("drop connection");
        let rtc = self.rtc.clone();
        // NOTE: An established connection is not torn down by drop alone.
        if let Ok(rt) = tokio::runtime::Handle::try_current() {
            rt.spawn(async move {
                let _ = rtc.close().await;
                trace!("connection closed");
            });
        }
    }
}

#[async_trait]
impl EnginePeer for WebrtcPeer {
    async fn add_track(&self, track: LocalTrack) -> Result<()> {
        let rtp_sender = self.rtc.add_track(track).await?;
        // RTCP has to be drained for the interceptors to run.
        tokio::spawn(async move {
            let mut rtcp_buf = vec![0u8; 1500];
            while rtp_sender.read(&mut rtcp_buf).await.is_ok() {}
        });
        Ok(())
    }

    async fn create_offer(&self) -> Result<Descriptor> {
        let offer = self.rtc.create_offer(None).await?;
        Descriptor::from_rtc(&offer).ok_or_else(|| anyhow!("unexpected sdp type"))
    }

    async fn create_answer(&self) -> Result<Descriptor> {
        let answer = self.rtc.create_answer(None).await?;
        Descriptor::from_rtc(&answer).ok_or_else(|| anyhow!("unexpected sdp type"))
    }

    async fn set_local_description(&self, desc: Descriptor) -> Result<()> {
        self.rtc.set_local_description(desc.to_rtc()?).await?;
        Ok(())
    }

    async fn set_remote_description(&self, desc: Descriptor) -> Result<()> {
        self.rtc.set_remote_description(desc.to_rtc()?).await?;
        Ok(())
    }

    async fn local_description(&self) -> Option<Descriptor> {
        self.rtc
            .local_description()
            .await
            .and_then(|desc| Descriptor::from_rtc(&desc))
    }

    fn detach_handlers(&self) {
        self.rtc
            .on_ice_candidate(Box::new(|_candidate| Box::pin(async {})));
        self.rtc
            .on_peer_connection_state_change(Box::new(|_state| Box::pin(async {})));
        self.rtc
            .on_ice_connection_state_change(Box::new(|_state| Box::pin(async {})));
        self.rtc.on_track(Box::new(|_track, _receiver, _transceiver| {
            Box::pin(async {})
        }));
    }

    async fn close(&self) -> Result<()> {
        Ok(self.rtc.close().await?)
    }
}
