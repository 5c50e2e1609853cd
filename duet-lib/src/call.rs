//! Runs the orchestrator on a single task. Commands, engine events, media
//! readiness and the connection timeout are all handled in one loop, so
//! session updates never interleave.

use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::{
    select, spawn,
    sync::{mpsc, oneshot, watch},
};
use tracing::{debug, info, trace};

use crate::{
    auto_answer::AutoAnswer,
    error::SessionError,
    orchestrator::Orchestrator,
    session::{ConnectionState, Session},
    timeout_monitor::TimeoutMonitor,
    transport::extract_token,
};

type Reply = oneshot::Sender<Result<(), SessionError>>;

enum Command {
    CreateOffer(Reply),
    CreateAnswer(Reply),
    /// Pasted text: a token, a plain descriptor, or a link carrying either.
    SetRemoteDescriptor(String, Reply),
    ApplyRemoteDescriptor(String, Reply),
    Hangup(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

struct Call {
    orchestrator: Orchestrator,
    auto_answer: AutoAnswer,
    timeout: TimeoutMonitor,
    media_ready_rx: watch::Receiver<bool>,
    command_rx: mpsc::Receiver<Command>,
    session_tx: watch::Sender<Session>,
}

impl Call {
    async fn run(mut self) {
        let incoming = self
            .orchestrator
            .address_bar_mut()
            .read_incoming_token()
            .into_token();
        if let Some(token) = incoming {
            info!("descriptor received with the page address");
            let _ = self.orchestrator.set_remote_descriptor(&token).await;
        }
        self.observe().await;

        let shutdown_tx = loop {
            select! {
                command = self.command_rx.recv() => {
                    let Some(command) = command else {
                        break None;
                    };
                    if let Some(done_tx) = self.handle_command(command).await {
                        break Some(done_tx);
                    }
                }
                Some(event) = self.orchestrator.next_event() => {
                    trace!("engine event {:?}", event);
                    self.orchestrator.handle_event(event).await;
                }
                _ = self.timeout.expired() => {
                    let state = self.orchestrator.session().connection_state;
                    if state == ConnectionState::Connecting {
                        self.orchestrator.fail_with_timeout(self.timeout.duration()).await;
                    } else {
                        self.timeout.observe(state);
                    }
                }
                Ok(()) = self.media_ready_rx.changed() => {
                    debug!("media readiness changed");
                }
            }
            self.observe().await;
        };

        self.orchestrator.hangup().await;
        self.publish();
        info!("call ended");
        if let Some(done_tx) = shutdown_tx {
            let _ = done_tx.send(());
        }
    }

    /// Replies only after the resulting session has been published.
    /// Returns the acknowledgement of a shutdown request.
    async fn handle_command(&mut self, command: Command) -> Option<oneshot::Sender<()>> {
        let (result, reply) = match command {
            Command::CreateOffer(reply) => (self.orchestrator.create_offer().await, reply),
            Command::CreateAnswer(reply) => (self.orchestrator.create_answer().await, reply),
            Command::SetRemoteDescriptor(text, reply) => {
                let token = extract_token(&text);
                (self.orchestrator.set_remote_descriptor(&token).await, reply)
            }
            Command::ApplyRemoteDescriptor(raw, reply) => {
                (self.orchestrator.apply_remote_descriptor(&raw).await, reply)
            }
            Command::Hangup(done_tx) => {
                self.orchestrator.hangup().await;
                self.observe().await;
                let _ = done_tx.send(());
                return None;
            }
            Command::Shutdown(done_tx) => return Some(done_tx),
        };
        self.observe().await;
        let _ = reply.send(result);
        None
    }

    /// Runs after every update: auto-answer first, then the timeout sees the
    /// resulting state, then observers get a snapshot.
    async fn observe(&mut self) {
        let media_ready = self.orchestrator.media_ready();
        if self
            .auto_answer
            .observe(self.orchestrator.session(), media_ready)
        {
            info!("answering received offer");
            let _ = self.orchestrator.create_answer().await;
        }
        self.timeout
            .observe(self.orchestrator.session().connection_state);
        self.publish();
    }

    fn publish(&self) {
        let session = self.orchestrator.session();
        self.session_tx.send_if_modified(|current| {
            if current == session {
                return false;
            }
            *current = session.clone();
            true
        });
    }
}

/// The UI side of a running call. Cheap to clone; the call ends when every
/// handle is dropped or [`CallHandle::shutdown`] is awaited.
#[derive(Clone)]
pub struct CallHandle {
    command_tx: mpsc::Sender<Command>,
    session_rx: watch::Receiver<Session>,
}

impl CallHandle {
    pub fn start(orchestrator: Orchestrator, connection_timeout: Duration) -> Self {
        let (command_tx, command_rx) = mpsc::channel(16);
        let (session_tx, session_rx) = watch::channel(orchestrator.session().clone());
        let call = Call {
            media_ready_rx: orchestrator.watch_media_ready(),
            orchestrator,
            auto_answer: AutoAnswer::default(),
            timeout: TimeoutMonitor::new(connection_timeout),
            command_rx,
            session_tx,
        };
        spawn(call.run());
        Self {
            command_tx,
            session_rx,
        }
    }

    pub fn session(&self) -> Session {
        self.session_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.session_rx.clone()
    }

    pub async fn create_offer(&self) -> Result<()> {
        self.request(Command::CreateOffer).await
    }

    pub async fn create_answer(&self) -> Result<()> {
        self.request(Command::CreateAnswer).await
    }

    pub async fn set_remote_descriptor(&self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        self.request(|reply| Command::SetRemoteDescriptor(text, reply))
            .await
    }

    pub async fn apply_remote_descriptor(&self, raw: impl Into<String>) -> Result<()> {
        let raw = raw.into();
        self.request(|reply| Command::ApplyRemoteDescriptor(raw, reply))
            .await
    }

    pub async fn hangup(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.send(Command::Hangup(done_tx)).await?;
        Ok(done_rx.await?)
    }

    /// Releases the connection and stops the call task.
    pub async fn shutdown(self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.send(Command::Shutdown(done_tx)).await?;
        Ok(done_rx.await?)
    }

    async fn request(&self, command: impl FnOnce(Reply) -> Command) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(command(reply_tx)).await?;
        Ok(reply_rx.await??)
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| anyhow!("call has ended"))
    }
}
