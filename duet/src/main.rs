mod cui;
mod tracing_helper;

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use duet_lib::{
    engine::WebrtcEngine,
    media::{LocalStream, MediaSource},
    notifier::Notifier,
    transport::AddressBar,
    CallHandle, Config, Orchestrator, SessionError,
};
use tokio::spawn;
use tracing::{error, info};

use crate::{
    cui::{main_menu, print_changes, TerminalNotifier},
    tracing_helper::init_tracing,
};

/// Serverless peer-to-peer calls: exchange a link, get connected.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    #[arg(long, env = "DUET_CONFIG", default_value = "duet.toml")]
    config: PathBuf,
    /// Page address to start from. A link received from a peer goes here.
    #[arg(long)]
    url: Option<String>,
    /// Create an offer right away.
    #[arg(long)]
    offer: bool,
}

async fn run(args: Args, config: Config) -> Result<()> {
    let location = args.url.as_deref().unwrap_or(&config.page_url);
    let address_bar =
        AddressBar::parse(location).with_context(|| format!("Invalid url: {}", location))?;

    let notifier = Arc::new(TerminalNotifier);
    let media = Arc::new(LocalStream::with_placeholder_tracks(
        config.audio,
        config.video,
    ));
    if !media.is_ready() {
        let err = SessionError::MediaUnavailable("audio and video are both disabled".to_owned());
        notifier.report(&err.to_string());
    }
    let orchestrator = Orchestrator::new(
        Arc::new(WebrtcEngine::new(&config)),
        media,
        notifier,
        address_bar,
    );
    let call = CallHandle::start(orchestrator, config.connection_timeout());
    spawn(print_changes(call.subscribe()));

    if args.offer {
        let _ = call.create_offer().await;
    }
    main_menu(&call).await?;
    call.shutdown().await
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let config = match Config::load(&args.config).await {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{:#}", err);
            return ExitCode::FAILURE;
        }
    };
    let log_dir = config.log_dir.clone().unwrap_or_else(|| ".".to_owned());
    if let Err(err) = init_tracing(&log_dir, concat!(env!("CARGO_PKG_NAME"), ".log"), true) {
        eprintln!("{:#}", err);
        return ExitCode::FAILURE;
    }
    info!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    if let Err(err) = run(args, config).await {
        error!("{:#}", err);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
