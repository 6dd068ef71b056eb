//! page-reader: terminal playback client for the readaloud-rs endpoint.
//!
//! Drives the full client pipeline once: fetch a transcript, pick a voice,
//! and run the playback session with a console speech engine. Useful for
//! poking a running service without a page in front of it.

use std::path::PathBuf;

use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use readaloud_rs::client::{FetchedTranscript, TranscriptFetcher};
use readaloud_rs::config::LabelConfig;
use readaloud_rs::error::SpeakbackError;
use readaloud_rs::extract::{extract_page_text, Document};
use readaloud_rs::session::{
    Effect, SessionController, SessionEvent, SpeechEngine, TriggerId, TriggerSurface,
};
use readaloud_rs::voice::{page_language, Voice};

#[derive(Parser, Debug)]
#[command(name = "page-reader", about = "Terminal playback client for readaloud-rs")]
struct Args {
    /// Endpoint base URL
    #[arg(long, default_value = "http://127.0.0.1:8950")]
    endpoint: String,

    /// Security token issued for this page render
    #[arg(long)]
    token: String,

    /// Item to play back
    #[arg(long)]
    item: u64,

    /// Page language tag (e.g. "en-US")
    #[arg(long)]
    lang: Option<String>,

    /// Plain-text stand-in for the rendered page, used when the server
    /// asks the client to extract locally
    #[arg(long)]
    page_text: Option<PathBuf>,
}

/// Console engine: one built-in voice, prints instead of synthesizing.
struct ConsoleEngine {
    speaking: bool,
}

impl SpeechEngine for ConsoleEngine {
    fn available(&self) -> bool {
        true
    }
    fn voices(&self) -> Vec<Voice> {
        vec![Voice::new("Console", "en-US").with_default()]
    }
    fn speak(&mut self, text: &str, voice: Option<&Voice>) {
        let voice = voice.map(|v| v.name.as_str()).unwrap_or("default");
        println!("[{voice}] {text}");
        self.speaking = true;
    }
    fn pause(&mut self) {
        println!("[paused]");
    }
    fn resume(&mut self) {
        println!("[resumed]");
    }
    fn cancel(&mut self) {
        self.speaking = false;
    }
    fn speaking(&self) -> bool {
        self.speaking
    }
}

/// Console surface: label changes and errors go to stderr.
struct ConsoleSurface;

impl TriggerSurface for ConsoleSurface {
    fn set_label(&mut self, trigger: TriggerId, label: &str) {
        eprintln!("trigger {trigger}: {label}");
    }
    fn restore_label(&mut self, trigger: TriggerId) {
        eprintln!("trigger {trigger}: reset");
    }
    fn surface_error(&mut self, error: &SpeakbackError) {
        eprintln!("error: {error}");
    }
}

/// Stand-in page: no selectable containers, just a body.
struct TextFilePage {
    body: String,
}

impl Document for TextFilePage {
    fn select_text(&self, _selector: &str) -> Option<String> {
        None
    }
    fn body_text(&self) -> String {
        self.body.clone()
    }
}

const TRIGGER: TriggerId = 1;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("warn"))
        .init();

    let language = page_language(args.lang.as_deref(), None, "en");
    let fetcher = TranscriptFetcher::new(&args.endpoint, &args.token);
    let mut controller = SessionController::new(
        ConsoleEngine { speaking: false },
        ConsoleSurface,
        LabelConfig::default(),
        language,
    );

    let effects = controller.handle(SessionEvent::Activate(TRIGGER));
    if !effects.contains(&Effect::BeginFetch(TRIGGER)) {
        return;
    }

    let event = match fetcher.fetch(args.item).await {
        Ok(FetchedTranscript::Resolved(transcript)) => SessionEvent::FetchSucceeded {
            trigger: TRIGGER,
            transcript,
        },
        Ok(FetchedTranscript::NeedsExtraction) => match local_extraction(&args) {
            Some(transcript) => SessionEvent::FetchSucceeded {
                trigger: TRIGGER,
                transcript,
            },
            None => SessionEvent::FetchFailed {
                trigger: TRIGGER,
                error: SpeakbackError::EmptyContent,
            },
        },
        Err(error) => SessionEvent::FetchFailed {
            trigger: TRIGGER,
            error,
        },
    };

    controller.handle(event);

    // The console engine "finishes" as soon as it has printed.
    if controller.active_trigger() == Some(TRIGGER) {
        controller.handle(SessionEvent::PlaybackEnded);
    }
}

fn local_extraction(args: &Args) -> Option<String> {
    let path = args.page_text.as_ref()?;
    let body = match std::fs::read_to_string(path) {
        Ok(b) => b,
        Err(e) => {
            warn!("Failed to read {}: {e}", path.display());
            return None;
        }
    };
    extract_page_text(&TextFilePage { body }, None, 40)
}
