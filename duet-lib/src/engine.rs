//! The surface through which the session drives the real-time-communication
//! engine. Only the orchestrator holds an [`EnginePeer`].

#[cfg(test)]
pub(crate) mod loopback;
mod webrtc_engine;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    descriptor::Descriptor,
    media::LocalTrack,
    session::{ConnectionState, IceState, RemoteTrack},
};

pub use webrtc_engine::WebrtcEngine;

#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    /// An intermediate candidate. Accumulated by the engine, never surfaced.
    Candidate(String),
    /// The "no more candidates" sentinel.
    GatheringComplete,
    ConnectionState(ConnectionState),
    IceConnectionState(IceState),
    Track(RemoteTrack),
}

pub type EventSink = mpsc::UnboundedSender<EngineEvent>;

#[async_trait]
pub trait Engine: Send + Sync {
    /// Allocates a connection with one handler per event kind, each
    /// forwarding into `events` in the order the engine raises them.
    async fn connect(&self, events: EventSink) -> Result<Box<dyn EnginePeer>>;
}

#[async_trait]
pub trait EnginePeer: Send + Sync {
    async fn add_track(&self, track: LocalTrack) -> Result<()>;
    async fn create_offer(&self) -> Result<Descriptor>;
    async fn create_answer(&self) -> Result<Descriptor>;
    async fn set_local_description(&self, desc: Descriptor) -> Result<()>;
    async fn set_remote_description(&self, desc: Descriptor) -> Result<()>;
    /// The committed local description, including every candidate gathered
    /// so far.
    async fn local_description(&self) -> Option<Descriptor>;
    /// After this returns no handler forwards anything.
    fn detach_handlers(&self);
    async fn close(&self) -> Result<()>;
}
