//! Voice input
//!
//! The speech recognizer is an event source: once started it produces
//! interim results, finalized utterances, errors and an end marker on a
//! channel. A [`VoiceSession`] subscribes to that channel and yields only
//! finalized transcripts. Stopping drops the subscription and whatever
//! interim text was pending.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::CommandError;

/// Buffered events per recognition session
const EVENT_BUFFER: usize = 32;

/// Events emitted by a speech recognizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SpeechEvent {
    /// Partial hypothesis, may still change
    Interim(String),
    /// One finished utterance
    Final(String),
    /// Recognizer error code, e.g. `no-speech`
    Error(String),
    /// Recognizer stopped on its own
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VoiceState {
    #[default]
    Idle,
    Listening,
}

/// Start/stop control over a speech engine
pub trait SpeechRecognizer: Send {
    /// Begin a recognition session and return its event stream
    fn start(&mut self) -> Result<mpsc::Receiver<SpeechEvent>, CommandError>;

    /// End the current session
    fn stop(&mut self);
}

type SharedSender = Arc<Mutex<Option<mpsc::Sender<SpeechEvent>>>>;

/// Recognizer driven through a [`SpeechFeed`] (CLI stdin, tests, a UI bridge)
#[derive(Debug, Default)]
pub struct ChannelRecognizer {
    tx: SharedSender,
}

/// Producer side of a [`ChannelRecognizer`]
#[derive(Debug, Clone)]
pub struct SpeechFeed {
    tx: SharedSender,
}

impl ChannelRecognizer {
    pub fn new() -> (Self, SpeechFeed) {
        let tx: SharedSender = Arc::default();
        (Self { tx: tx.clone() }, SpeechFeed { tx })
    }

    fn slot(&self) -> MutexGuard<'_, Option<mpsc::Sender<SpeechEvent>>> {
        self.tx.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SpeechFeed {
    /// Deliver an event to the running session; false when nobody is listening
    pub async fn send(&self, event: SpeechEvent) -> bool {
        let tx = self
            .tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        match tx {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }
}

impl SpeechRecognizer for ChannelRecognizer {
    fn start(&mut self) -> Result<mpsc::Receiver<SpeechEvent>, CommandError> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        *self.slot() = Some(tx);
        Ok(rx)
    }

    fn stop(&mut self) {
        *self.slot() = None;
    }
}

/// User-facing text for common recognizer error codes
pub fn describe_error(code: &str) -> String {
    match code {
        "not-allowed" | "service-not-allowed" => "microphone access was denied".to_string(),
        "no-speech" => "no speech was detected".to_string(),
        "audio-capture" => "no microphone was found".to_string(),
        "network" => "a network error interrupted recognition".to_string(),
        "aborted" => "recognition was aborted".to_string(),
        other => other.to_string(),
    }
}

/// One page's voice input; at most one recognition session at a time
pub struct VoiceSession {
    recognizer: Box<dyn SpeechRecognizer>,
    events: Option<mpsc::Receiver<SpeechEvent>>,
    interim: Option<String>,
}

impl VoiceSession {
    pub fn new(recognizer: Box<dyn SpeechRecognizer>) -> Self {
        Self {
            recognizer,
            events: None,
            interim: None,
        }
    }

    pub fn state(&self) -> VoiceState {
        if self.events.is_some() {
            VoiceState::Listening
        } else {
            VoiceState::Idle
        }
    }

    pub fn is_listening(&self) -> bool {
        self.state() == VoiceState::Listening
    }

    /// Latest partial result, for live display only
    pub fn interim(&self) -> Option<&str> {
        self.interim.as_deref()
    }

    /// Start listening; refused while a session is already active
    pub fn start(&mut self) -> Result<(), CommandError> {
        if self.is_listening() {
            return Err(CommandError::SpeechRecognitionFailed(
                "voice input is already active".to_string(),
            ));
        }
        self.events = Some(self.recognizer.start()?);
        self.interim = None;
        debug!("voice session started");
        Ok(())
    }

    /// Unsubscribe and stop the recognizer, discarding interim text
    pub fn stop(&mut self) {
        self.events = None;
        self.interim = None;
        self.recognizer.stop();
        debug!("voice session stopped");
    }

    /// Next finalized transcript, lower-cased and trimmed
    ///
    /// Returns `None` once the session is idle or the recognizer ends.
    pub async fn next_transcript(&mut self) -> Option<Result<String, CommandError>> {
        loop {
            let event = match self.events.as_mut() {
                Some(events) => events.recv().await,
                None => return None,
            };
            match event {
                Some(SpeechEvent::Interim(text)) => self.interim = Some(text),
                Some(SpeechEvent::Final(text)) => {
                    self.interim = None;
                    let transcript = text.trim().to_lowercase();
                    if !transcript.is_empty() {
                        return Some(Ok(transcript));
                    }
                }
                Some(SpeechEvent::Error(code)) => {
                    warn!(code = %code, "speech recognition error");
                    return Some(Err(CommandError::SpeechRecognitionFailed(describe_error(&code))));
                }
                Some(SpeechEvent::End) | None => {
                    self.stop();
                    return None;
                }
            }
        }
    }
}
