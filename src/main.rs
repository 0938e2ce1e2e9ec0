mod config;
mod countdown;
mod error;
mod game;
mod session;
mod transport;
mod types;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::broadcast::error::RecvError;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::game::{SessionCommand, SessionEnd, SessionEvent};
use crate::session::Session;
use crate::transport::Channel;
use crate::types::{AnswerStatus, Severity};

type Input = Lines<BufReader<Stdin>>;

#[derive(Debug, Parser)]
#[command(name = "quizrush-client")]
#[command(about = "Terminal client for the quizrush trivia game")]
struct Args {
    /// Username to log in with; asked for interactively when omitted
    username: Option<String>,

    /// Origin of the game server
    #[arg(long, env = "QUIZ_ORIGIN", default_value = config::DEFAULT_ORIGIN)]
    origin: String,

    /// Path of the play socket on the server
    #[arg(long, env = "QUIZ_PLAY_PATH", default_value = config::DEFAULT_PLAY_PATH)]
    play_path: String,
}

// ─── Rendering ────────────────────────────────────────────────────

fn describe_rejection(reason: &str) -> &str {
    match reason {
        "usernameNotAvailable" => "That username is already taken",
        "maxSocketsReached" => "The game is full, try again later",
        other => other,
    }
}

fn render(session: &Session) {
    println!();
    match &session.question {
        Some(question) => println!("Q: {}", question),
        None => println!("Waiting for the next question..."),
    }

    for (i, option) in session.answers.iter().enumerate() {
        let mark = match option.status {
            AnswerStatus::None => " ",
            AnswerStatus::Loading => "…",
            AnswerStatus::Success => "✔",
            AnswerStatus::Failure => "✘",
        };
        println!("  {} {}. {}", mark, i + 1, option.text);
    }

    if session.answers.is_empty() && session.question.is_some() && !session.challenging {
        println!("  (type c to challenge)");
    }

    let players: Vec<String> = session
        .players
        .iter()
        .map(|p| match session.status_of(&p.username) {
            Some(status) => format!("{} [{}]", p.username, status),
            None => p.username.clone(),
        })
        .collect();
    println!("Players: {}", players.join(", "));
}

// ─── Input ────────────────────────────────────────────────────────

/// Map a typed line to a command. Answers are 1-based on screen.
fn parse_command(line: &str) -> Option<SessionCommand> {
    match line.trim() {
        "c" | "challenge" => Some(SessionCommand::Challenge),
        "q" | "quit" | "leave" => Some(SessionCommand::Leave),
        other => match other.parse::<usize>() {
            Ok(n) if n >= 1 => Some(SessionCommand::Answer(n - 1)),
            _ => None,
        },
    }
}

async fn prompt_username(input: &mut Input) -> Option<String> {
    loop {
        println!("Username:");
        match input.next_line().await {
            Ok(Some(line)) if !line.trim().is_empty() => return Some(line.trim().to_string()),
            Ok(Some(_)) => continue,
            Ok(None) => return None,
            Err(e) => {
                tracing::error!("Failed to read input: {}", e);
                return None;
            }
        }
    }
}

// ─── Session loop ─────────────────────────────────────────────────

/// Drive one session until it ends. Returns `false` once input is exhausted.
async fn play(channel: Channel, input: &mut Input) -> bool {
    let (handle, mut task) = game::spawn_session(channel);
    let mut snapshots = handle.snapshots.clone();
    let mut events = handle.subscribe();
    let mut input_open = true;
    let mut snapshots_open = true;
    let mut events_open = true;

    render(&handle.snapshot());

    loop {
        tokio::select! {
            end = &mut task => {
                match end {
                    Ok(SessionEnd::Disconnected) => tracing::info!("Disconnected from the server"),
                    Ok(SessionEnd::Left) => println!("Bye {}", handle.username),
                    Err(e) => tracing::error!("Session task failed: {}", e),
                }
                return input_open;
            }

            changed = snapshots.changed(), if snapshots_open => {
                if changed.is_err() {
                    snapshots_open = false;
                    continue;
                }
                let session = std::sync::Arc::clone(&snapshots.borrow_and_update());
                render(&session);
            }

            event = events.recv(), if events_open => match event {
                Ok(SessionEvent::Notify(notification)) => {
                    let prefix = match notification.severity() {
                        Severity::Success => "*",
                        Severity::Info => "-",
                        Severity::Warning => "!",
                    };
                    println!("{} {}", prefix, notification);
                }
                Ok(SessionEvent::Countdown(tick)) => {
                    println!("  {}s left ({:.0}%)", tick.current, tick.fraction() * 100.0);
                }
                Ok(SessionEvent::Refused(e)) => println!("! {}", e),
                Err(RecvError::Lagged(n)) => tracing::warn!("Skipped {} session events", n),
                Err(RecvError::Closed) => events_open = false,
            },

            line = input.next_line(), if input_open => {
                let command = match line {
                    Ok(Some(line)) => parse_command(&line),
                    _ => {
                        input_open = false;
                        Some(SessionCommand::Leave)
                    }
                };
                match command {
                    Some(command) => {
                        if handle.cmd_tx.send(command).await.is_err() {
                            tracing::debug!("Session task already gone");
                        }
                    }
                    None => println!("? c = challenge, 1..n = answer, q = leave"),
                }
            }
        }
    }
}

// ─── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let config = match ClientConfig::new(&args.origin) {
        Ok(config) => config.with_play_path(args.play_path),
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut preset = args.username;

    loop {
        let username = match preset.take() {
            Some(username) => username,
            None => match prompt_username(&mut input).await {
                Some(username) => username,
                None => break,
            },
        };

        let channel = match transport::open(&config, &username).await {
            Ok(channel) => channel,
            Err(ClientError::UsernameRejected(reason)) => {
                println!("! {}", describe_rejection(&reason));
                continue;
            }
            Err(e) => {
                println!("! {}", e);
                continue;
            }
        };

        if !play(channel, &mut input).await {
            break;
        }
    }

    tracing::info!("Client exiting");
}
