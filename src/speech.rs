//! Optional speech collaborators.
//!
//! Recognition and synthesis are both optional. Callers check
//! [`SpeechCapabilities`] before invoking anything and show a notice when a
//! capability is missing. The bundled implementations drive external programs
//! (for example `espeak` for output, or a local transcriber that prints one
//! utterance per line for input).

use std::process::Stdio;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("{0}")]
    Unsupported(&'static str),

    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

pub trait SpeechRecognizer: Send + Sync {
    /// Starts a listening session, stopping any session already running.
    /// Each recognised utterance is sent on `transcripts`.
    fn start_listening(&self, transcripts: mpsc::UnboundedSender<String>) -> Result<(), SpeechError>;
    fn stop_listening(&self);
}

pub trait SpeechSynthesizer: Send + Sync {
    /// Speaks `text`, cutting off anything still being spoken.
    fn speak(&self, text: &str) -> Result<(), SpeechError>;
    fn stop_speaking(&self);
}

#[derive(Clone, Default)]
pub struct SpeechCapabilities {
    pub recognizer: Option<Arc<dyn SpeechRecognizer>>,
    pub synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
}

impl SpeechCapabilities {
    pub fn none() -> Self {
        Self::default()
    }

    /// Builds command-backed collaborators for whichever commands are configured.
    pub fn from_commands(stt_command: Option<&str>, tts_command: Option<&str>) -> Self {
        let recognizer = stt_command
            .and_then(CommandSpec::parse)
            .map(|spec| Arc::new(CommandRecognizer::new(spec)) as Arc<dyn SpeechRecognizer>);
        let synthesizer = tts_command
            .and_then(CommandSpec::parse)
            .map(|spec| Arc::new(CommandSynthesizer::new(spec)) as Arc<dyn SpeechSynthesizer>);
        Self { recognizer, synthesizer }
    }

    pub fn can_listen(&self) -> bool {
        self.recognizer.is_some()
    }

    pub fn can_speak(&self) -> bool {
        self.synthesizer.is_some()
    }
}

impl std::fmt::Debug for SpeechCapabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechCapabilities")
            .field("recognizer", &self.can_listen())
            .field("synthesizer", &self.can_speak())
            .finish()
    }
}

/// A program plus its leading arguments, split on whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self { program, args: parts.collect() })
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).kill_on_drop(true);
        command
    }

    fn spawn_error(&self, source: std::io::Error) -> SpeechError {
        SpeechError::Spawn { program: self.program.clone(), source }
    }
}

fn kill_current(slot: &Mutex<Option<Child>>, what: &str) {
    let previous = match slot.lock() {
        Ok(mut guard) => guard.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    };
    if let Some(mut child) = previous {
        debug!("Stopping previous {} process", what);
        if let Err(e) = child.start_kill() {
            debug!("{} process already gone: {}", what, e);
        }
    }
}

fn store_current(slot: &Mutex<Option<Child>>, child: Child) {
    match slot.lock() {
        Ok(mut guard) => *guard = Some(child),
        Err(poisoned) => *poisoned.into_inner() = Some(child),
    }
}

/// Runs the configured program and treats each non-empty stdout line as an utterance.
pub struct CommandRecognizer {
    spec: CommandSpec,
    current: Mutex<Option<Child>>,
}

impl CommandRecognizer {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec, current: Mutex::new(None) }
    }
}

impl SpeechRecognizer for CommandRecognizer {
    fn start_listening(&self, transcripts: mpsc::UnboundedSender<String>) -> Result<(), SpeechError> {
        self.stop_listening();

        let mut child = self
            .spec
            .command()
            .stdout(Stdio::piped())
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| self.spec.spawn_error(e))?;
        info!(program = %self.spec.program, "Listening for voice input");

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => {
                            let transcript = line.trim();
                            if transcript.is_empty() {
                                continue;
                            }
                            if transcripts.send(transcript.to_string()).is_err() {
                                break;
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            warn!("Reading voice transcript failed: {}", e);
                            break;
                        }
                    }
                }
            });
        }

        store_current(&self.current, child);
        Ok(())
    }

    fn stop_listening(&self) {
        kill_current(&self.current, "recognizer");
    }
}

/// Runs the configured program with the text to speak as its final argument.
pub struct CommandSynthesizer {
    spec: CommandSpec,
    current: Mutex<Option<Child>>,
}

impl CommandSynthesizer {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec, current: Mutex::new(None) }
    }
}

impl SpeechSynthesizer for CommandSynthesizer {
    fn speak(&self, text: &str) -> Result<(), SpeechError> {
        self.stop_speaking();

        let child = self
            .spec
            .command()
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| self.spec.spawn_error(e))?;
        debug!(program = %self.spec.program, chars = text.len(), "Speaking");

        store_current(&self.current, child);
        Ok(())
    }

    fn stop_speaking(&self) {
        kill_current(&self.current, "synthesizer");
    }
}
