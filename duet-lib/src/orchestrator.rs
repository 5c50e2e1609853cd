use std::{future::pending, sync::Arc, time::Duration};

use anyhow::{bail, Context};
use derive_new::new;
use getset::{Getters, MutGetters};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use crate::{
    codec,
    descriptor::{Descriptor, DescriptorError, DescriptorKind},
    engine::{Engine, EngineEvent, EnginePeer},
    error::SessionError,
    media::MediaSource,
    notifier::Notifier,
    session::{ConnectionState, IceState, Role, Session},
    transport::AddressBar,
};

/// Owns the single live connection and the [`Session`] describing it.
/// Nothing else holds the connection; everything goes through these
/// operations or through [`Orchestrator::handle_event`].
#[derive(Getters, MutGetters, new)]
pub struct Orchestrator {
    engine: Arc<dyn Engine>,
    media: Arc<dyn MediaSource>,
    notifier: Arc<dyn Notifier>,
    #[getset(get = "pub", get_mut = "pub")]
    address_bar: AddressBar,
    #[new(default)]
    #[get = "pub"]
    session: Session,
    #[new(default)]
    peer: Option<Box<dyn EnginePeer>>,
    #[new(default)]
    events_rx: Option<mpsc::UnboundedReceiver<EngineEvent>>,
    /// Whether `session.remote_raw` has been handed to the engine.
    #[new(default)]
    remote_applied: bool,
    #[new(default)]
    gathered_candidates: usize,
}

impl Orchestrator {
    pub fn has_connection(&self) -> bool {
        self.peer.is_some()
    }

    pub fn media_ready(&self) -> bool {
        self.media.is_ready()
    }

    pub fn watch_media_ready(&self) -> watch::Receiver<bool> {
        self.media.watch_ready()
    }

    pub async fn create_offer(&mut self) -> Result<(), SessionError> {
        if self.session.creating_offer || self.session.role != Role::Unassigned {
            debug!("create_offer ignored, role is {:?}", self.session.role);
            return Ok(());
        }
        self.session.creating_offer = true;
        if let Err(err) = self.initialize_connection(Role::Initiator).await {
            self.session.creating_offer = false;
            self.report(&err);
            return Err(err);
        }
        self.apply_pending_remote().await
    }

    /// Takes the responder role. The local answer only comes into existence
    /// once a remote offer is applied.
    pub async fn create_answer(&mut self) -> Result<(), SessionError> {
        if self.session.creating_answer || self.session.role != Role::Unassigned {
            debug!("create_answer ignored, role is {:?}", self.session.role);
            return Ok(());
        }
        self.session.creating_answer = true;
        if let Err(err) = self.initialize_connection(Role::Responder).await {
            self.session.creating_answer = false;
            self.report(&err);
            return Err(err);
        }
        self.apply_pending_remote().await
    }

    async fn initialize_connection(&mut self, role: Role) -> Result<(), SessionError> {
        // Assigned before the first await so every later caller sees it.
        self.session.role = role;
        self.release_connection().await;
        self.session.connection_state = ConnectionState::default();
        self.session.ice_state = IceState::default();
        info!("initializing connection as {:?}", role);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let peer = self
            .engine
            .connect(events_tx)
            .await
            .context("Failed to create connection")
            .map_err(SessionError::ConnectionInitFailure)?;
        self.peer = Some(peer);
        self.events_rx = Some(events_rx);
        self.prepare_local(role)
            .await
            .map_err(SessionError::ConnectionInitFailure)
    }

    async fn prepare_local(&self, role: Role) -> anyhow::Result<()> {
        let Some(peer) = &self.peer else {
            bail!("connection was released");
        };
        for track in self.media.tracks() {
            peer.add_track(track)
                .await
                .context("Failed to attach local track")?;
        }
        if role == Role::Initiator {
            let offer = peer.create_offer().await.context("Failed to create offer")?;
            peer.set_local_description(offer)
                .await
                .context("Failed to set local description")?;
        }
        Ok(())
    }

    /// Records a received descriptor. Delivering the value already held is a
    /// no-op; a new value is applied as soon as a connection exists.
    pub async fn set_remote_descriptor(&mut self, raw: &str) -> Result<(), SessionError> {
        let raw = raw.trim();
        if raw == self.session.remote_raw {
            trace!("remote descriptor unchanged");
            return Ok(());
        }
        self.session.remote_raw = raw.to_owned();
        self.remote_applied = false;
        self.apply_pending_remote().await
    }

    async fn apply_pending_remote(&mut self) -> Result<(), SessionError> {
        if self.remote_applied || !self.session.has_remote() || self.peer.is_none() {
            return Ok(());
        }
        self.remote_applied = true;
        let raw = self.session.remote_raw.clone();
        self.apply_remote_descriptor(&raw).await
    }

    /// Accepts a compressed token or a plain JSON descriptor. Validation
    /// failures leave the session untouched so the input can be corrected.
    pub async fn apply_remote_descriptor(&mut self, raw: &str) -> Result<(), SessionError> {
        let result = self.try_apply_remote_descriptor(raw).await;
        if let Err(err) = &result {
            if self.session.role == Role::Responder && !self.session.has_local_token() {
                self.session.creating_answer = false;
            }
            self.report(err);
        }
        result
    }

    async fn try_apply_remote_descriptor(&self, raw: &str) -> Result<(), SessionError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(DescriptorError::Empty.into());
        }
        let Some(peer) = &self.peer else {
            return Err(DescriptorError::NoConnection.into());
        };
        let text = match codec::decompress(raw) {
            Ok(text) => text,
            Err(err) => {
                debug!("not a compressed token ({}), reading as plain JSON", err);
                raw.to_owned()
            }
        };
        let desc = Descriptor::validate(&text)?;
        info!("applying remote {}", desc.kind);

        let kind = desc.kind;
        peer.set_remote_description(desc)
            .await
            .context("Failed to set remote description")
            .map_err(SessionError::ApplyFailure)?;
        // Driven by the descriptor's type, not by our role alone: an answer
        // arriving at a responder must not produce another answer.
        if kind == DescriptorKind::Offer && self.session.role != Role::Initiator {
            let answer = peer
                .create_answer()
                .await
                .context("Failed to create answer")
                .map_err(SessionError::ApplyFailure)?;
            peer.set_local_description(answer)
                .await
                .context("Failed to set local description")
                .map_err(SessionError::ApplyFailure)?;
        }
        Ok(())
    }

    /// Idempotent full teardown.
    pub async fn hangup(&mut self) {
        info!("hangup");
        self.release_connection().await;
        self.session = Session::default();
        self.remote_applied = false;
        self.address_bar.clear_params();
    }

    /// Tears down a session stuck in `connecting` and leaves it `failed`.
    pub async fn fail_with_timeout(&mut self, after: Duration) {
        warn!("connection stayed connecting for {:?}", after);
        self.hangup().await;
        self.session.connection_state = ConnectionState::Failed;
        self.report(&SessionError::Timeout(after));
    }

    /// Detaches every handler before the connection is closed, and drops
    /// the event receiver so nothing already queued is applied afterwards.
    async fn release_connection(&mut self) {
        self.events_rx = None;
        if let Some(peer) = self.peer.take() {
            peer.detach_handlers();
            if let Err(err) = peer.close().await {
                warn!("Failed to close connection: {:#}", err);
            }
        }
        self.gathered_candidates = 0;
        self.session.remote_tracks.clear();
    }

    /// The next engine event, in the order the engine raised them. Pending
    /// forever while no connection exists.
    pub async fn next_event(&mut self) -> Option<EngineEvent> {
        match self.events_rx.as_mut() {
            Some(events_rx) => events_rx.recv().await,
            None => pending().await,
        }
    }

    pub async fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Candidate(address) => {
                self.gathered_candidates += 1;
                trace!("candidate #{} {}", self.gathered_candidates, address);
            }
            EngineEvent::GatheringComplete => self.publish_local_descriptor().await,
            EngineEvent::ConnectionState(state) => {
                debug!("connection state {}", state);
                self.session.connection_state = state;
                if state == ConnectionState::Failed {
                    self.notifier.report("Connection failed");
                }
            }
            EngineEvent::IceConnectionState(state) => {
                trace!("ice connection state {:?}", state);
                self.session.ice_state = state;
            }
            EngineEvent::Track(track) => {
                debug!("remote {} track {}", track.kind, track.ssrc);
                self.session.remote_tracks.push(track);
            }
        }
    }

    async fn publish_local_descriptor(&mut self) {
        if self.session.has_local_token() {
            trace!("local descriptor already published");
            return;
        }
        let Some(peer) = &self.peer else {
            return;
        };
        let Some(desc) = peer.local_description().await else {
            warn!("gathering completed without a local description");
            return;
        };
        let token = match encode_token(&desc) {
            Ok(token) => token,
            Err(err) => {
                warn!("{:#}", err);
                self.notifier.report(&format!("{:#}", err));
                return;
            }
        };
        info!(
            "{} ready with {} candidates, token length {}",
            desc.kind,
            self.gathered_candidates,
            token.len()
        );
        self.session.share_url = self
            .address_bar
            .build_shareable_url(&token, desc.kind)
            .to_string();
        self.session.local_token = token;
        self.session.creating_offer = false;
        self.session.creating_answer = false;
        self.notifier.report(match desc.kind {
            DescriptorKind::Offer => "Offer generated",
            DescriptorKind::Answer => "Answer generated",
        });
        self.notifier.report("Link ready");
    }

    fn report(&self, err: &SessionError) {
        warn!("{}", err);
        self.notifier.report(&err.to_string());
    }
}

fn encode_token(desc: &Descriptor) -> anyhow::Result<String> {
    let json = desc.to_json().context("Failed to serialize local descriptor")?;
    codec::compress(&json).context("Failed to compress local descriptor")
}
