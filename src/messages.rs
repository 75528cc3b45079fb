//! WebSocket message types for the DashScope inference protocol.
//!
//! This module is the pure translation layer between internal types and the
//! wire JSON:
//!
//! - **Outgoing commands**: sent as text frames, all carrying the session's
//!   task id and `streaming: "duplex"`
//!   - [`RunTaskCommand`]: opens the synthesis task with the full parameter set
//!   - [`ContinueTaskCommand`]: submits the text to synthesize
//!   - [`FinishTaskCommand`]: marks the input as complete
//!
//! - **Incoming events**: text frames decoded by [`ServerEvent::parse`]
//!   (`task-started`, `result-generated`, `task-finished`, `task-failed`).
//!   Binary frames are audio and never reach this module.
//!
//! Unrecognized event names decode to [`ServerEvent::Unknown`] and malformed
//! frames decode to an error; the session driver drops both without failing
//! the session, so server-side protocol additions stay harmless.

use serde::{Deserialize, Serialize};

use crate::config::SynthesisRequest;

// =============================================================================
// Outgoing Commands (Client to Server)
// =============================================================================

/// Shared command header. Every command of a session carries the same
/// generated task id.
#[derive(Debug, Clone, Serialize)]
pub struct CommandHeader {
    /// Command name: `run-task`, `continue-task` or `finish-task`.
    pub action: &'static str,
    /// Session task identifier (UUID v4).
    pub task_id: String,
    /// Always `duplex` for bidirectional streaming.
    pub streaming: &'static str,
}

impl CommandHeader {
    fn new(action: &'static str, task_id: &str) -> Self {
        Self {
            action,
            task_id: task_id.to_string(),
            streaming: "duplex",
        }
    }
}

/// Serializes to the empty JSON object expected in `input` slots that
/// carry no data.
#[derive(Debug, Clone, Serialize)]
pub struct EmptyInput {}

/// Synthesis parameter block of the `run-task` payload.
///
/// Optional fields are omitted from the wire entirely when unset rather
/// than sent as null.
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisParameters {
    /// Always `PlainText`; SSML is flagged separately via `enable_ssml`.
    pub text_type: &'static str,
    pub voice: String,
    pub format: &'static str,
    pub sample_rate: u32,
    pub volume: u32,
    pub rate: f32,
    pub pitch: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_ssml: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_timestamp_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_hints: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<u32>,
}

impl SynthesisParameters {
    fn from_request(request: &SynthesisRequest) -> Self {
        Self {
            text_type: "PlainText",
            voice: request.voice.clone(),
            format: request.format.as_str(),
            sample_rate: request.sample_rate,
            volume: request.volume,
            rate: request.rate,
            pitch: request.pitch,
            enable_ssml: request.ssml.then_some(true),
            instruction: request.instruction.clone(),
            word_timestamp_enabled: request.word_timestamps.then_some(true),
            seed: request.seed,
            language_hints: request.language_hints.clone(),
            bit_rate: request.bit_rate,
        }
    }
}

/// `run-task` payload: task routing plus the synthesis parameters.
#[derive(Debug, Clone, Serialize)]
pub struct RunTaskPayload {
    pub task_group: &'static str,
    pub task: &'static str,
    pub function: &'static str,
    pub model: String,
    pub parameters: SynthesisParameters,
    pub input: EmptyInput,
}

/// Opens the synthesis task on a fresh connection.
#[derive(Debug, Clone, Serialize)]
pub struct RunTaskCommand {
    pub header: CommandHeader,
    pub payload: RunTaskPayload,
}

impl RunTaskCommand {
    /// Builds the opening command for `request` under `task_id`.
    pub fn new(task_id: &str, request: &SynthesisRequest) -> Self {
        Self {
            header: CommandHeader::new("run-task", task_id),
            payload: RunTaskPayload {
                task_group: "audio",
                task: "tts",
                function: "SpeechSynthesizer",
                model: request.model.clone(),
                parameters: SynthesisParameters::from_request(request),
                input: EmptyInput {},
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TextInput {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextInputPayload {
    pub input: TextInput,
}

/// Submits the text to synthesize, as a single chunk.
#[derive(Debug, Clone, Serialize)]
pub struct ContinueTaskCommand {
    pub header: CommandHeader,
    pub payload: TextInputPayload,
}

impl ContinueTaskCommand {
    pub fn new(task_id: &str, text: &str) -> Self {
        Self {
            header: CommandHeader::new("continue-task", task_id),
            payload: TextInputPayload {
                input: TextInput {
                    text: text.to_string(),
                },
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EmptyInputPayload {
    pub input: EmptyInput,
}

/// Marks the input as complete; the server finishes the task once all
/// audio has been delivered.
#[derive(Debug, Clone, Serialize)]
pub struct FinishTaskCommand {
    pub header: CommandHeader,
    pub payload: EmptyInputPayload,
}

impl FinishTaskCommand {
    pub fn new(task_id: &str) -> Self {
        Self {
            header: CommandHeader::new("finish-task", task_id),
            payload: EmptyInputPayload { input: EmptyInput {} },
        }
    }
}

/// Enum over all outgoing commands, in the order a session emits them.
#[derive(Debug, Clone)]
pub enum OutboundCommand {
    RunTask(RunTaskCommand),
    ContinueTask(ContinueTaskCommand),
    FinishTask(FinishTaskCommand),
}

impl OutboundCommand {
    /// The wire action name, for logging.
    #[inline]
    pub fn action(&self) -> &'static str {
        match self {
            Self::RunTask(cmd) => cmd.header.action,
            Self::ContinueTask(cmd) => cmd.header.action,
            Self::FinishTask(cmd) => cmd.header.action,
        }
    }

    /// Serializes the command to its wire JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::RunTask(cmd) => serde_json::to_string(cmd),
            Self::ContinueTask(cmd) => serde_json::to_string(cmd),
            Self::FinishTask(cmd) => serde_json::to_string(cmd),
        }
    }
}

// =============================================================================
// Incoming Events (Server to Client)
// =============================================================================

/// One word timing entry, delivered with `task-finished` when word
/// timestamps were requested.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WordTimestamp {
    /// The word text.
    pub text: String,
    /// Start offset in milliseconds.
    pub begin_time: u64,
    /// End offset in milliseconds.
    pub end_time: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct EventAttributes {
    #[serde(default)]
    request_uuid: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct EventHeader {
    event: String,
    #[serde(default)]
    task_id: String,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    attributes: Option<EventAttributes>,
}

#[derive(Debug, Clone, Deserialize)]
struct UsageInfo {
    #[serde(default)]
    characters: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct SentenceInfo {
    #[serde(default)]
    words: Option<Vec<WordTimestamp>>,
}

#[derive(Debug, Clone, Deserialize)]
struct OutputInfo {
    #[serde(default)]
    sentence: Option<SentenceInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct EventPayload {
    #[serde(default)]
    usage: Option<UsageInfo>,
    #[serde(default)]
    output: Option<OutputInfo>,
}

#[derive(Debug, Clone, Deserialize)]
struct EventFrame {
    header: EventHeader,
    #[serde(default)]
    payload: EventPayload,
}

/// Decoded control event from the server.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// The task is ready to receive text.
    TaskStarted { task_id: String },
    /// Intermediate progress: request id and running billed-character count.
    ResultGenerated {
        task_id: String,
        request_uuid: Option<String>,
        characters: Option<u64>,
    },
    /// All audio has been delivered.
    TaskFinished {
        task_id: String,
        characters: Option<u64>,
        words: Option<Vec<WordTimestamp>>,
    },
    /// The server failed the task.
    TaskFailed {
        task_id: String,
        error_code: Option<String>,
        error_message: Option<String>,
    },
    /// Well-formed frame with an event name this client does not know
    /// (forward compatibility).
    Unknown(String),
}

impl ServerEvent {
    /// Parse a control frame.
    ///
    /// # Arguments
    /// * `text` - Raw JSON text from a WebSocket text frame
    ///
    /// # Returns
    /// * `Result<Self, serde_json::Error>` - Parsed event or parse error
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let frame: EventFrame = serde_json::from_str(text)?;
        let task_id = frame.header.task_id;
        // A zero character count carries no billing information.
        let characters = frame
            .payload
            .usage
            .map(|usage| usage.characters)
            .filter(|&count| count > 0);

        Ok(match frame.header.event.as_str() {
            "task-started" => Self::TaskStarted { task_id },
            "result-generated" => Self::ResultGenerated {
                task_id,
                request_uuid: frame
                    .header
                    .attributes
                    .and_then(|attrs| attrs.request_uuid),
                characters,
            },
            "task-finished" => Self::TaskFinished {
                task_id,
                characters,
                words: frame
                    .payload
                    .output
                    .and_then(|output| output.sentence)
                    .and_then(|sentence| sentence.words),
            },
            "task-failed" => Self::TaskFailed {
                task_id,
                error_code: frame.header.error_code,
                error_message: frame.header.error_message,
            },
            _ => Self::Unknown(text.to_string()),
        })
    }

    /// The task id the event correlates to, if it names one.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::TaskStarted { task_id }
            | Self::ResultGenerated { task_id, .. }
            | Self::TaskFinished { task_id, .. }
            | Self::TaskFailed { task_id, .. } => Some(task_id),
            Self::Unknown(_) => None,
        }
    }
}
