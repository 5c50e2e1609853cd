//! An in-process engine for tests. Peers created by engines that share a
//! [`Switchboard`] connect to each other once each holds the other's local
//! description as its remote description.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use super::{Engine, EngineEvent, EnginePeer, EventSink};
use crate::{
    descriptor::{Descriptor, DescriptorKind},
    media::LocalTrack,
    session::{ConnectionState, IceState, RemoteTrack},
};

#[derive(Clone, Debug, Default)]
pub struct Stats {
    pub connects: usize,
    pub closes: usize,
    pub detaches: usize,
    pub tracks_added: usize,
    pub answers_created: usize,
    pub remote_descriptions: Vec<Descriptor>,
}

#[derive(Default)]
struct Slot {
    events: Option<EventSink>,
    track_kinds: Vec<String>,
    local: Option<Descriptor>,
    remote: Option<Descriptor>,
    gathered: bool,
    connected: bool,
    closed: bool,
}

#[derive(Default)]
pub struct Switchboard {
    slots: Mutex<Vec<Slot>>,
}

impl Switchboard {
    fn connect_pairs(&self) {
        let mut slots = self.slots.lock().unwrap();
        let len = slots.len();
        for a in 0..len {
            for b in (a + 1)..len {
                if slots[a].connected || slots[b].connected {
                    continue;
                }
                if !(holds_remote_of(&slots[a], b) && holds_remote_of(&slots[b], a)) {
                    continue;
                }
                for (me, other) in [(a, b), (b, a)] {
                    slots[me].connected = true;
                    let kinds = slots[other].track_kinds.clone();
                    let Some(events) = &slots[me].events else {
                        continue;
                    };
                    let _ = events.send(EngineEvent::ConnectionState(ConnectionState::Connecting));
                    let _ = events.send(EngineEvent::IceConnectionState(IceState::Checking));
                    for (i, kind) in kinds.into_iter().enumerate() {
                        let _ = events.send(EngineEvent::Track(RemoteTrack {
                            kind,
                            ssrc: 1000 + i as u32,
                        }));
                    }
                    let _ = events.send(EngineEvent::IceConnectionState(IceState::Connected));
                    let _ = events.send(EngineEvent::ConnectionState(ConnectionState::Connected));
                }
            }
        }
    }
}

fn holds_remote_of(slot: &Slot, other: usize) -> bool {
    !slot.closed
        && slot.local.is_some()
        && slot
            .remote
            .as_ref()
            .and_then(|remote| origin_id(&remote.sdp))
            == Some(other)
}

fn origin_id(sdp: &str) -> Option<usize> {
    sdp.lines()
        .find_map(|line| line.strip_prefix("o=- "))
        .and_then(|rest| rest.split(' ').next())
        .and_then(|id| id.parse().ok())
}

fn sdp(id: usize, kinds: &[String]) -> String {
    let mut sdp = format!("v=0\r\no=- {id} 0 IN IP4 127.0.0.1\r\ns=-\r\n");
    for kind in kinds {
        sdp += &format!("m={kind} 9 UDP/TLS/RTP/SAVPF 96\r\n");
    }
    sdp
}

#[derive(Default)]
pub struct LoopbackEngine {
    switchboard: Arc<Switchboard>,
    stats: Arc<Mutex<Stats>>,
    fail_connect: AtomicBool,
    latest: Mutex<Option<usize>>,
}

impl LoopbackEngine {
    pub fn pair() -> (Arc<Self>, Arc<Self>) {
        let switchboard = Arc::new(Switchboard::default());
        let engine = || {
            Arc::new(Self {
                switchboard: switchboard.clone(),
                ..Default::default()
            })
        };
        (engine(), engine())
    }

    pub fn stats(&self) -> Stats {
        self.stats.lock().unwrap().clone()
    }

    pub fn fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// The sink of the most recent peer, while its handlers are attached.
    pub fn latest_sink(&self) -> Option<EventSink> {
        let id = (*self.latest.lock().unwrap())?;
        self.switchboard.slots.lock().unwrap()[id].events.clone()
    }

    /// Raises `event` on the most recent peer. `false` once detached.
    pub fn inject(&self, event: EngineEvent) -> bool {
        self.latest_sink()
            .map(|events| events.send(event).is_ok())
            .unwrap_or(false)
    }
}

#[async_trait]
impl Engine for LoopbackEngine {
    async fn connect(&self, events: EventSink) -> Result<Box<dyn EnginePeer>> {
        if self.fail_connect.load(Ordering::SeqCst) {
            bail!("loopback refused connection");
        }
        self.stats.lock().unwrap().connects += 1;
        let id = {
            let mut slots = self.switchboard.slots.lock().unwrap();
            slots.push(Slot {
                events: Some(events),
                ..Default::default()
            });
            slots.len() - 1
        };
        *self.latest.lock().unwrap() = Some(id);
        Ok(Box::new(LoopbackPeer {
            id,
            switchboard: self.switchboard.clone(),
            stats: self.stats.clone(),
        }))
    }
}

struct LoopbackPeer {
    id: usize,
    switchboard: Arc<Switchboard>,
    stats: Arc<Mutex<Stats>>,
}

impl LoopbackPeer {
    fn with_slot<T>(&self, f: impl FnOnce(&mut Slot) -> T) -> T {
        f(&mut self.switchboard.slots.lock().unwrap()[self.id])
    }
}

#[async_trait]
impl EnginePeer for LoopbackPeer {
    async fn add_track(&self, track: LocalTrack) -> Result<()> {
        self.stats.lock().unwrap().tracks_added += 1;
        self.with_slot(|slot| slot.track_kinds.push(track.kind().to_string()));
        Ok(())
    }

    async fn create_offer(&self) -> Result<Descriptor> {
        Ok(Descriptor::offer(
            self.with_slot(|slot| sdp(self.id, &slot.track_kinds)),
        ))
    }

    async fn create_answer(&self) -> Result<Descriptor> {
        let sdp = self.with_slot(|slot| match &slot.remote {
            Some(remote) if remote.kind == DescriptorKind::Offer => {
                Ok(sdp(self.id, &slot.track_kinds))
            }
            _ => Err(anyhow!("no remote offer to answer")),
        })?;
        self.stats.lock().unwrap().answers_created += 1;
        Ok(Descriptor::answer(sdp))
    }

    async fn set_local_description(&self, desc: Descriptor) -> Result<()> {
        let events = self.with_slot(|slot| {
            slot.local = Some(desc);
            slot.gathered = true;
            slot.events.clone()
        });
        if let Some(events) = events {
            let _ = events.send(EngineEvent::Candidate("127.0.0.1".to_owned()));
            let _ = events.send(EngineEvent::GatheringComplete);
        }
        self.switchboard.connect_pairs();
        Ok(())
    }

    async fn set_remote_description(&self, desc: Descriptor) -> Result<()> {
        self.with_slot(|slot| match (desc.kind, &slot.local) {
            (DescriptorKind::Answer, Some(local)) if local.kind == DescriptorKind::Offer => Ok(()),
            (DescriptorKind::Answer, _) => Err(anyhow!("answer without a local offer")),
            (DescriptorKind::Offer, None) => Ok(()),
            (DescriptorKind::Offer, Some(_)) => Err(anyhow!("offer after local description")),
        })?;
        self.stats
            .lock()
            .unwrap()
            .remote_descriptions
            .push(desc.clone());
        self.with_slot(|slot| slot.remote = Some(desc));
        self.switchboard.connect_pairs();
        Ok(())
    }

    async fn local_description(&self) -> Option<Descriptor> {
        self.with_slot(|slot| {
            let mut desc = slot.local.clone()?;
            if slot.gathered {
                desc.sdp += "a=candidate:1 1 udp 2130706431 127.0.0.1 9 typ host\r\n";
            }
            Some(desc)
        })
    }

    fn detach_handlers(&self) {
        self.stats.lock().unwrap().detaches += 1;
        self.with_slot(|slot| slot.events = None);
    }

    async fn close(&self) -> Result<()> {
        self.stats.lock().unwrap().closes += 1;
        self.with_slot(|slot| slot.closed = true);
        Ok(())
    }
}
