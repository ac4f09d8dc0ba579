use std::io::Write;
use std::sync::Arc;

use color_eyre::eyre::{bail, eyre, WrapErr};
use color_eyre::Result;
use tracing_subscriber::EnvFilter;

use kbchat::adapters::{LogNotifier, ReqwestHttpClient};
use kbchat::api::ApiClient;
use kbchat::config::ClientConfig;
use kbchat::directory::Directory;
use kbchat::session::{ChatSession, SessionSnapshot, StreamStatus};

const VERSION: &str = env!("CARGO_PKG_VERSION");

const USAGE: &str = "Usage: kbchat [--conversation <id>] <message...>";

#[derive(Debug, PartialEq)]
struct Args {
    conversation: Option<String>,
    message: String,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut conversation = None;
    let mut words = Vec::new();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--conversation" | "-c" => {
                let id = args
                    .next()
                    .ok_or_else(|| eyre!("--conversation needs an id\n{}", USAGE))?;
                conversation = Some(id);
            }
            _ => words.push(arg),
        }
    }

    let message = words.join(" ");
    if message.trim().is_empty() {
        bail!("No message given\n{}", USAGE);
    }
    Ok(Args {
        conversation,
        message,
    })
}

/// Prints what a turn appended since the last call: reasoning to stderr,
/// answer text to stdout.
#[derive(Default)]
struct DeltaPrinter {
    reasoning: usize,
    answer: usize,
    images: usize,
}

impl DeltaPrinter {
    fn print(&mut self, snapshot: &SessionSnapshot) {
        let Some(message) = snapshot.last_assistant() else {
            return;
        };

        if let Some(delta) = message.reasoning_content.get(self.reasoning..) {
            if !delta.is_empty() {
                eprint!("{}", delta);
                self.reasoning = message.reasoning_content.len();
            }
        }
        if let Some(delta) = message.content.get(self.answer..) {
            if !delta.is_empty() {
                print!("{}", delta);
                let _ = std::io::stdout().flush();
                self.answer = message.content.len();
            }
        }
        for url in message.image_urls.iter().skip(self.images) {
            println!("\n[image] {}", url);
        }
        self.images = message.image_urls.len();
    }

    fn finish(&self, snapshot: &SessionSnapshot) {
        println!();
        if let Some(message) = snapshot.last_assistant() {
            for reference in &message.references {
                println!(
                    "[ref] {} #{} ({:.2})",
                    reference.document_name, reference.chunk_index, reference.score
                );
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::args().any(|arg| arg == "--version") {
        println!("kbchat {}", VERSION);
        return Ok(());
    }

    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    let config = ClientConfig::load()
        .map_err(|e| {
            tracing::error!(category = %e.category(), "{}", e);
            e
        })
        .wrap_err("Failed to load configuration")?;
    tracing::debug!("Using API at {}", config.base_url);

    let api = ApiClient::new(Arc::new(ReqwestHttpClient::new()), config);
    let directory = Arc::new(Directory::new(api.clone()));
    let session = ChatSession::new(api, directory, Arc::new(LogNotifier::new().with_stderr()));

    if let Some(id) = &args.conversation {
        session
            .open_conversation(id)
            .await
            .wrap_err_with(|| format!("Failed to open conversation {}", id))?;
    }

    let mut changes = session.subscribe();
    let Some(mut turn) = session.send_message(args.message, Vec::new(), None) else {
        bail!("Conversation is archived");
    };

    let mut printer = DeltaPrinter::default();
    loop {
        tokio::select! {
            joined = &mut turn => {
                joined.wrap_err("Turn task failed")?;
                break;
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                printer.print(&session.snapshot());
            }
            _ = tokio::signal::ctrl_c() => {
                if session.stop_streaming() {
                    eprintln!("\n[stopped]");
                }
            }
        }
    }

    let snapshot = session.snapshot();
    printer.print(&snapshot);
    printer.finish(&snapshot);

    if let Some(id) = &snapshot.conversation_id {
        eprintln!("conversation: {}", id);
    }
    if snapshot.stream_status == StreamStatus::Error {
        bail!("Turn failed");
    }
    Ok(())
}
