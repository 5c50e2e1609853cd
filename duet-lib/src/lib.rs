pub mod auto_answer;
pub mod call;
pub mod codec;
pub mod config;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod media;
pub mod notifier;
pub mod orchestrator;
pub mod session;
pub mod timeout_monitor;
pub mod transport;

pub use crate::{
    call::CallHandle,
    config::Config,
    error::SessionError,
    orchestrator::Orchestrator,
    session::{ConnectionState, Role, Session},
};
