//! Per-request session state machine.
//!
//! One [`Session`] drives exactly one synthesis request. Every socket-level
//! occurrence (open, frame, error, close, deadline) is delivered as a
//! [`SessionInput`] to [`Session::handle`], which transitions the machine
//! and returns the commands and settlement to perform:
//!
//! ```text
//! Starting --(Opened)--> Started: send run-task
//! Started --(task-started)--> AwaitingResult: send continue-task, finish-task
//! AwaitingResult --(binary frame)--> AwaitingResult: append audio
//! AwaitingResult --(result-generated)--> AwaitingResult: capture request id, characters
//! AwaitingResult --(task-finished)--> Closing: capture characters, words; close
//! any --(task-failed)--> Failed: close, settle with the server error
//! any --(socket error)--> Failed: settle with a transport error
//! any --(deadline)--> Failed: close, settle with a timeout error
//! any --(closed)--> Done or Failed: settle with audio or NoAudio
//! ```
//!
//! `Done` and `Failed` are terminal: once reached, `handle` returns no
//! further actions, so a session settles exactly once no matter how many
//! terminal triggers race in (a close on the heels of a failure, a timeout
//! against a late close).

use bytes::{Bytes, BytesMut};
use tracing::{debug, warn};

use crate::config::SynthesisRequest;
use crate::error::{TtsError, TtsResult};
use crate::messages::{
    ContinueTaskCommand, FinishTaskCommand, OutboundCommand, RunTaskCommand, ServerEvent,
    WordTimestamp,
};

// =============================================================================
// Result Type
// =============================================================================

/// The settled result of a successful synthesis session.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisResponse {
    /// All audio bytes, concatenated in arrival order.
    pub audio: Bytes,
    /// Server-assigned request identifier, when reported.
    pub request_id: Option<String>,
    /// Billed character count, when reported.
    pub characters: Option<u64>,
    /// Word-level timestamps, present only when requested and returned.
    pub words: Option<Vec<WordTimestamp>>,
}

// =============================================================================
// Inputs and Actions
// =============================================================================

/// Everything the socket driver can deliver to the machine.
#[derive(Debug)]
pub(crate) enum SessionInput {
    /// The connection is established.
    Opened,
    /// A decoded control frame.
    Event(ServerEvent),
    /// A binary audio frame.
    Audio(Bytes),
    /// The socket failed.
    SocketError(String),
    /// The connection closed.
    Closed,
    /// The session deadline elapsed.
    DeadlineExpired,
}

/// What the driver must do after a transition, in order.
#[derive(Debug)]
pub(crate) enum SessionAction {
    /// Send a command frame.
    Send(OutboundCommand),
    /// Close the socket.
    Close,
    /// Resolve the session. Emitted at most once per session.
    Settle(TtsResult<SynthesisResponse>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionPhase {
    Starting,
    Started,
    AwaitingResult,
    Closing,
    Done,
    Failed,
}

// =============================================================================
// Session
// =============================================================================

/// State for one synthesis request. Owned exclusively by the driver future
/// and discarded at settlement.
pub(crate) struct Session {
    phase: SessionPhase,
    task_id: String,
    request: SynthesisRequest,
    audio: Vec<Bytes>,
    request_id: Option<String>,
    characters: Option<u64>,
    words: Option<Vec<WordTimestamp>>,
}

impl Session {
    pub(crate) fn new(task_id: String, request: SynthesisRequest) -> Self {
        Self {
            phase: SessionPhase::Starting,
            task_id,
            request,
            audio: Vec::new(),
            request_id: None,
            characters: None,
            words: None,
        }
    }

    fn is_settled(&self) -> bool {
        matches!(self.phase, SessionPhase::Done | SessionPhase::Failed)
    }

    /// Applies one input and returns the actions to perform.
    ///
    /// In a terminal phase this is a no-op: late closes, stray frames and a
    /// racing deadline all land here and produce nothing.
    pub(crate) fn handle(&mut self, input: SessionInput) -> Vec<SessionAction> {
        if self.is_settled() {
            debug!(task_id = %self.task_id, ?input, "ignoring input after settlement");
            return Vec::new();
        }

        match input {
            SessionInput::Opened => self.on_opened(),
            SessionInput::Event(event) => self.on_event(event),
            SessionInput::Audio(chunk) => {
                debug!(task_id = %self.task_id, bytes = chunk.len(), "audio frame");
                self.audio.push(chunk);
                Vec::new()
            }
            SessionInput::SocketError(reason) => {
                self.phase = SessionPhase::Failed;
                vec![SessionAction::Settle(Err(TtsError::Transport(reason)))]
            }
            SessionInput::DeadlineExpired => {
                self.phase = SessionPhase::Failed;
                vec![
                    SessionAction::Close,
                    SessionAction::Settle(Err(TtsError::Timeout(self.request.timeout))),
                ]
            }
            SessionInput::Closed => self.on_closed(),
        }
    }

    fn on_opened(&mut self) -> Vec<SessionAction> {
        match self.phase {
            SessionPhase::Starting => {
                self.phase = SessionPhase::Started;
                vec![SessionAction::Send(OutboundCommand::RunTask(
                    RunTaskCommand::new(&self.task_id, &self.request),
                ))]
            }
            _ => {
                warn!(task_id = %self.task_id, "duplicate open notification");
                Vec::new()
            }
        }
    }

    fn on_event(&mut self, event: ServerEvent) -> Vec<SessionAction> {
        // The task id is correlation metadata, not a filter: mismatched
        // events are logged and still processed.
        if let Some(event_task_id) = event.task_id()
            && event_task_id != self.task_id
        {
            warn!(
                task_id = %self.task_id,
                event_task_id,
                "event correlates to a different task id"
            );
        }

        match event {
            ServerEvent::TaskStarted { .. } => {
                if self.phase != SessionPhase::Started {
                    debug!(task_id = %self.task_id, "ignoring redundant task-started");
                    return Vec::new();
                }
                self.phase = SessionPhase::AwaitingResult;
                vec![
                    SessionAction::Send(OutboundCommand::ContinueTask(ContinueTaskCommand::new(
                        &self.task_id,
                        &self.request.text,
                    ))),
                    SessionAction::Send(OutboundCommand::FinishTask(FinishTaskCommand::new(
                        &self.task_id,
                    ))),
                ]
            }
            ServerEvent::ResultGenerated {
                request_uuid,
                characters,
                ..
            } => {
                if let Some(uuid) = request_uuid {
                    self.request_id = Some(uuid);
                }
                if let Some(count) = characters {
                    self.characters = Some(count);
                }
                Vec::new()
            }
            ServerEvent::TaskFinished {
                characters, words, ..
            } => {
                if let Some(count) = characters {
                    self.characters = Some(count);
                }
                // Word timestamps come only from this final event.
                if let Some(word_list) = words {
                    self.words = Some(word_list);
                }
                self.phase = SessionPhase::Closing;
                vec![SessionAction::Close]
            }
            ServerEvent::TaskFailed {
                error_code,
                error_message,
                ..
            } => {
                // Buffered audio is discarded with the session.
                self.phase = SessionPhase::Failed;
                vec![
                    SessionAction::Close,
                    SessionAction::Settle(Err(TtsError::TaskFailed {
                        code: error_code.unwrap_or_else(|| "Unknown".to_string()),
                        message: error_message.unwrap_or_else(|| "Unknown error".to_string()),
                    })),
                ]
            }
            ServerEvent::Unknown(raw) => {
                debug!(task_id = %self.task_id, frame = %raw, "ignoring unrecognized event");
                Vec::new()
            }
        }
    }

    fn on_closed(&mut self) -> Vec<SessionAction> {
        if self.audio.is_empty() {
            self.phase = SessionPhase::Failed;
            return vec![SessionAction::Settle(Err(TtsError::NoAudio))];
        }

        self.phase = SessionPhase::Done;
        let total: usize = self.audio.iter().map(Bytes::len).sum();
        let mut buffer = BytesMut::with_capacity(total);
        for chunk in self.audio.drain(..) {
            buffer.extend_from_slice(&chunk);
        }
        vec![SessionAction::Settle(Ok(SynthesisResponse {
            audio: buffer.freeze(),
            request_id: self.request_id.take(),
            characters: self.characters.take(),
            words: self.words.take(),
        }))]
    }
}
