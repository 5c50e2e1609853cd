use std::io::{self, Write};

use anyhow::Result;
use duet_lib::{notifier::Notifier, CallHandle, ConnectionState, Session};
use tokio::{
    io::{stdin, AsyncBufReadExt, BufReader},
    sync::watch,
};
use tracing::info;

pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn report(&self, message: &str) {
        info!("{}", message);
        println!("* {}", message);
    }
}

enum Input {
    Offer,
    Answer,
    Hangup,
    Status,
    Help,
    Quit,
    Remote(String),
}

fn parse_input(line: &str) -> Option<Input> {
    let line = line.trim();
    Some(match line {
        "" => return None,
        "offer" => Input::Offer,
        "answer" => Input::Answer,
        "hangup" => Input::Hangup,
        "status" => Input::Status,
        "help" | "?" => Input::Help,
        "quit" | "exit" => Input::Quit,
        _ => Input::Remote(line.to_owned()),
    })
}

fn print_help() {
    println!("offer   create an offer and print its link");
    println!("answer  wait for an offer as the answering side");
    println!("hangup  end the call and start over");
    println!("status  show the current session");
    println!("quit    leave");
    println!("Anything else is taken as a pasted link or token.");
}

fn print_status(session: &Session) {
    println!(
        "role: {:?}, connection: {}, ice: {:?}, remote tracks: {}",
        session.role,
        session.connection_state,
        session.ice_state,
        session.remote_tracks.len()
    );
    if session.has_local_token() {
        println!("link: {}", session.share_url);
    }
}

fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

pub async fn main_menu(call: &CallHandle) -> Result<()> {
    println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    println!("Type `help` for commands.");
    let mut lines = BufReader::new(stdin()).lines();
    loop {
        prompt();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let Some(input) = parse_input(&line) else {
            continue;
        };
        // Failures have already been reported through the notifier.
        let _ = match input {
            Input::Offer => call.create_offer().await,
            Input::Answer => call.create_answer().await,
            Input::Hangup => call.hangup().await,
            Input::Status => {
                print_status(&call.session());
                Ok(())
            }
            Input::Help => {
                print_help();
                Ok(())
            }
            Input::Quit => break,
            Input::Remote(text) => call.set_remote_descriptor(text).await,
        };
    }
    Ok(())
}

/// Prints what changed between snapshots until the call ends.
pub async fn print_changes(mut session_rx: watch::Receiver<Session>) {
    let mut last = session_rx.borrow_and_update().clone();
    while session_rx.changed().await.is_ok() {
        let session = session_rx.borrow_and_update().clone();
        if session.connection_state != last.connection_state {
            println!("connection: {}", session.connection_state);
            if session.connection_state == ConnectionState::Failed {
                println!("Type `hangup` to start over.");
            }
        }
        if session.has_local_token() && session.local_token != last.local_token {
            println!();
            println!("Send this link to your peer:");
            println!("{}", session.share_url);
            println!();
            println!("or just the token:");
            println!("{}", session.local_token);
            println!();
        }
        if session.remote_tracks.len() > last.remote_tracks.len() {
            for track in &session.remote_tracks[last.remote_tracks.len()..] {
                println!("receiving {} from peer", track.kind);
            }
        }
        last = session;
        prompt();
    }
}
