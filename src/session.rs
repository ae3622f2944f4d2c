//! The session controller: sole owner of the conversation and the pending flag.
//!
//! Every mutation goes through [`SessionController`]. The state lock is never
//! held across a model call; instead the pending flag is set under the lock and
//! any send that observes it is dropped, so at most one request is in flight.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::classifier::{classify, expects_severity_scale, RenderMode};
use crate::constants::{
    self, SeverityOption, FEELING_OPTIONS, GREETING, PLACEHOLDER_PROMPT, SEVERITY_OPTIONS,
};
use crate::conversation::{Conversation, Sender, Turn};
use crate::llm_interaction::{ChatClient, GatewayConfig};
use crate::speech::{SpeechCapabilities, SpeechError};
use crate::summary::{parse_summary, strip_fences, SummaryView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// A request is already outstanding.
    Pending,
    /// No client has been established yet.
    NotConnected,
    Blank,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    Ignored(IgnoreReason),
    Failed(String),
}

/// Snapshot of everything a front end needs to draw the current turn.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub version: u64,
    pub turns: Vec<Turn>,
    pub pending: bool,
    pub error: Option<String>,
    pub show_key_input: bool,
    pub notice: Option<String>,
    pub prompt: String,
    pub mode: RenderMode,
    pub summary: Option<SummaryView>,
    pub shows_text_input: bool,
    pub severity_options: Vec<SeverityOption>,
    pub feeling_options: Vec<&'static str>,
    pub can_listen: bool,
    pub can_speak: bool,
}

#[derive(Default)]
struct SessionState {
    conversation: Conversation,
    client: Option<ChatClient>,
    api_key: String,
    pending: bool,
    error: Option<String>,
    show_key_input: bool,
    notice: Option<String>,
    version: u64,
}

impl SessionState {
    fn view(&self, speech: &SpeechCapabilities) -> SessionView {
        let latest = self.conversation.latest_assistant();
        let prompt = latest.map_or(PLACEHOLDER_PROMPT, |turn| turn.text.as_str());

        // Only a trailing assistant turn can force the severity grid.
        let expect_scale = self
            .conversation
            .last()
            .is_some_and(|turn| turn.sender == Sender::Assistant && expects_severity_scale(&turn.text));

        let mode = match latest {
            Some(turn) => classify(&turn.text, expect_scale),
            None => RenderMode::FreeText,
        };
        let summary = (mode == RenderMode::StructuredSummary).then(|| parse_summary(prompt));

        SessionView {
            version: self.version,
            turns: self.conversation.turns().to_vec(),
            pending: self.pending,
            error: self.error.clone(),
            show_key_input: self.show_key_input,
            notice: self.notice.clone(),
            prompt: prompt.to_string(),
            mode,
            summary,
            shows_text_input: mode.shows_text_input(),
            severity_options: SEVERITY_OPTIONS.to_vec(),
            feeling_options: FEELING_OPTIONS.to_vec(),
            can_listen: speech.can_listen(),
            can_speak: speech.can_speak(),
        }
    }
}

#[derive(Clone)]
pub struct SessionController {
    state: Arc<Mutex<SessionState>>,
    config: GatewayConfig,
    speech: SpeechCapabilities,
    events: broadcast::Sender<SessionView>,
}

impl SessionController {
    pub fn new(config: GatewayConfig, speech: SpeechCapabilities) -> Self {
        let (events, _) = broadcast::channel(64);
        let state = SessionState { api_key: config.api_key.clone(), ..Default::default() };
        Self { state: Arc::new(Mutex::new(state)), config, speech, events }
    }

    /// Receives a fresh view after every mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionView> {
        self.events.subscribe()
    }

    pub async fn view(&self) -> SessionView {
        self.state.lock().await.view(&self.speech)
    }

    pub async fn is_pending(&self) -> bool {
        self.state.lock().await.pending
    }

    fn publish(&self, state: &mut SessionState) {
        state.version += 1;
        // No subscribers is fine.
        let _ = self.events.send(state.view(&self.speech));
    }

    /// Opens the session with the configured key.
    pub async fn start(&self) -> SendOutcome {
        let api_key = self.state.lock().await.api_key.clone();
        self.connect(api_key).await
    }

    /// Replaces the key and performs the opening handshake again.
    pub async fn retry_with_key(&self, api_key: &str) -> SendOutcome {
        self.connect(api_key.trim().to_string()).await
    }

    async fn connect(&self, api_key: String) -> SendOutcome {
        {
            let mut state = self.state.lock().await;
            if state.pending {
                debug!("Handshake ignored, a request is already pending");
                return SendOutcome::Ignored(IgnoreReason::Pending);
            }
            state.pending = true;
            state.error = None;
            state.show_key_input = false;
            state.api_key = api_key.clone();
            self.publish(&mut state);
        }

        info!(model = %self.config.model, "Opening intake session");
        let (client, result) = match ChatClient::new(self.config.with_api_key(api_key)) {
            Ok(client) => {
                let reply = client.send(&[], GREETING).await;
                (Some(client), reply)
            }
            Err(e) => (None, Err(e)),
        };

        let mut state = self.state.lock().await;
        state.pending = false;
        if client.is_some() {
            state.client = client;
        }
        let outcome = match result {
            Ok(reply) => {
                let mut conversation = Conversation::new();
                conversation.push(Turn::assistant(reply));
                state.conversation = conversation;
                info!("Intake session started");
                SendOutcome::Delivered
            }
            Err(e) => {
                error!("Failed to start chat: {}", e);
                let message = format!("Failed to connect: {e}");
                state.error = Some(message.clone());
                state.show_key_input = true;
                SendOutcome::Failed(message)
            }
        };
        self.publish(&mut state);
        outcome
    }

    /// Appends the user's text and asks the model for the next turn.
    pub async fn send_text(&self, text: &str) -> SendOutcome {
        let (client, history) = {
            let mut state = self.state.lock().await;
            if state.pending {
                debug!("Send ignored, a request is already pending");
                return SendOutcome::Ignored(IgnoreReason::Pending);
            }
            let Some(client) = state.client.clone() else {
                debug!("Send ignored, no client yet");
                return SendOutcome::Ignored(IgnoreReason::NotConnected);
            };
            if text.trim().is_empty() {
                return SendOutcome::Ignored(IgnoreReason::Blank);
            }

            let history = state.conversation.history();
            state.conversation.push(Turn::user(text));
            state.pending = true;
            self.publish(&mut state);
            (client, history)
        };

        let result = client.send(&history, text).await;

        let mut state = self.state.lock().await;
        state.pending = false;
        let outcome = match result {
            Ok(reply) => {
                let turn = Turn::assistant(reply);
                if turn.is_structured_summary {
                    info!("Assistant produced a care-plan summary");
                }
                state.conversation.push(turn);
                SendOutcome::Delivered
            }
            Err(e) => {
                error!("Error sending message: {}", e);
                let message = format!("Error: {e}");
                state.error = Some(message.clone());
                SendOutcome::Failed(message)
            }
        };
        self.publish(&mut state);
        outcome
    }

    /// Hides the error banner, the key form and any speech notice.
    pub async fn dismiss_error(&self) {
        let mut state = self.state.lock().await;
        state.error = None;
        state.show_key_input = false;
        state.notice = None;
        self.publish(&mut state);
    }

    async fn set_notice(&self, notice: String) {
        let mut state = self.state.lock().await;
        state.notice = Some(notice);
        self.publish(&mut state);
    }

    /// Starts voice capture; each transcript is sent as if typed.
    pub async fn start_voice_input(&self) -> Result<(), SpeechError> {
        let Some(recognizer) = self.speech.recognizer.clone() else {
            self.set_notice(constants::VOICE_INPUT_UNSUPPORTED.to_string()).await;
            return Err(SpeechError::Unsupported(constants::VOICE_INPUT_UNSUPPORTED));
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        if let Err(e) = recognizer.start_listening(tx) {
            warn!("Voice input failed to start: {}", e);
            self.set_notice(e.to_string()).await;
            return Err(e);
        }

        let controller = self.clone();
        tokio::spawn(async move {
            while let Some(transcript) = rx.recv().await {
                debug!("Voice transcript received");
                if let SendOutcome::Ignored(reason) = controller.send_text(&transcript).await {
                    debug!(?reason, "Voice transcript dropped");
                }
            }
        });
        Ok(())
    }

    pub fn stop_voice_input(&self) {
        if let Some(recognizer) = &self.speech.recognizer {
            recognizer.stop_listening();
        }
    }

    /// Reads the current assistant question aloud.
    pub async fn speak_latest(&self) -> Result<(), SpeechError> {
        let Some(synthesizer) = self.speech.synthesizer.clone() else {
            self.set_notice(constants::SPEECH_OUTPUT_UNSUPPORTED.to_string()).await;
            return Err(SpeechError::Unsupported(constants::SPEECH_OUTPUT_UNSUPPORTED));
        };

        let text = strip_fences(&self.view().await.prompt);
        if let Err(e) = synthesizer.speak(&text) {
            warn!("Speech output failed: {}", e);
            self.set_notice(e.to_string()).await;
            return Err(e);
        }
        Ok(())
    }

    pub fn stop_speaking(&self) {
        if let Some(synthesizer) = &self.speech.synthesizer {
            synthesizer.stop_speaking();
        }
    }
}
