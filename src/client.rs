//! WebSocket session driver for CosyVoice speech synthesis.
//!
//! [`CosyVoiceTts`] owns the socket lifecycle for one request at a time:
//! it connects to the DashScope inference endpoint, feeds every socket
//! occurrence into the per-request session machine, performs the returned
//! actions, and resolves to exactly one [`SynthesisResponse`] or
//! [`TtsError`]. A single wall-clock deadline covers the whole session,
//! from the connection attempt through settlement.
//!
//! Each `synthesize` call is fully isolated: its own socket, its own task
//! id, its own state. Concurrent calls never share anything, so batching
//! and rate limiting stay with the caller.
//!
//! # Example
//!
//! ```rust,ignore
//! use cosyvoice_tts::{CosyVoiceTts, SynthesisRequest};
//!
//! let client = CosyVoiceTts::from_env()?;
//! let request = SynthesisRequest::new("你好", "cosyvoice-v3-flash", "longxiaochun");
//! let response = client.synthesize(&request).await?;
//! std::fs::write("hello.mp3", &response.audio)?;
//! ```

use std::collections::VecDeque;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SynthesisRequest;
use crate::error::{TtsError, TtsResult};
use crate::messages::ServerEvent;
use crate::session::{Session, SessionAction, SessionInput, SynthesisResponse};

/// DashScope duplex inference endpoint.
pub const DASHSCOPE_WS_URL: &str = "wss://dashscope.aliyuncs.com/api-ws/v1/inference";

/// Environment variable read by [`CosyVoiceTts::from_env`].
pub const API_KEY_ENV: &str = "DASHSCOPE_API_KEY";

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsError = tokio_tungstenite::tungstenite::Error;

// =============================================================================
// CosyVoiceTts Client
// =============================================================================

/// CosyVoice text-to-speech client.
///
/// Holds the API key and the service endpoint; cheap to construct and to
/// clone. Connections are opened per request and never reused.
#[derive(Clone)]
pub struct CosyVoiceTts {
    api_key: String,
    endpoint: String,
}

impl CosyVoiceTts {
    /// Creates a client for the production DashScope endpoint.
    ///
    /// # Errors
    /// Returns `TtsError::InvalidRequest` if the API key is empty.
    pub fn new(api_key: impl Into<String>) -> TtsResult<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(TtsError::InvalidRequest(
                "API key is required".to_string(),
            ));
        }
        Ok(Self {
            api_key,
            endpoint: DASHSCOPE_WS_URL.to_string(),
        })
    }

    /// Creates a client from the `DASHSCOPE_API_KEY` environment variable.
    pub fn from_env() -> TtsResult<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .map_err(|_| TtsError::InvalidRequest(format!("{API_KEY_ENV} is not set")))?;
        Self::new(api_key)
    }

    /// Overrides the service endpoint. Intended for regional endpoints and
    /// tests against a local server.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// The endpoint this client connects to.
    #[inline]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Runs one synthesis request to completion.
    ///
    /// Opens a dedicated connection, drives the duplex exchange and returns
    /// the fully assembled audio. Exactly one of `Ok(response)` or one
    /// typed error is produced per call; there are no partial results and
    /// no retries.
    pub async fn synthesize(&self, request: &SynthesisRequest) -> TtsResult<SynthesisResponse> {
        request.validate()?;

        let task_id = Uuid::new_v4().to_string();
        info!(
            task_id = %task_id,
            model = %request.model,
            voice = %request.voice,
            text_len = request.text.len(),
            "starting synthesis session"
        );

        let result = self.drive(task_id.clone(), request).await;
        match &result {
            Ok(response) => info!(
                task_id = %task_id,
                audio_bytes = response.audio.len(),
                request_id = response.request_id.as_deref().unwrap_or(""),
                characters = response.characters.unwrap_or(0),
                "synthesis session settled"
            ),
            Err(error) => warn!(task_id = %task_id, %error, "synthesis session failed"),
        }
        result
    }

    /// Builds the WebSocket upgrade request with the bearer token and the
    /// data inspection header.
    fn build_upgrade_request(
        &self,
    ) -> TtsResult<tokio_tungstenite::tungstenite::handshake::client::Request> {
        let mut upgrade = self.endpoint.as_str().into_client_request().map_err(|e| {
            TtsError::Transport(format!("invalid service endpoint {}: {e}", self.endpoint))
        })?;

        let authorization = HeaderValue::from_str(&format!("bearer {}", self.api_key))
            .map_err(|_| {
                TtsError::InvalidRequest("API key contains invalid header characters".to_string())
            })?;
        upgrade.headers_mut().insert("Authorization", authorization);
        upgrade
            .headers_mut()
            .insert("X-DashScope-DataInspection", HeaderValue::from_static("enable"));

        Ok(upgrade)
    }

    /// Connects and drives the session machine until it settles.
    async fn drive(
        &self,
        task_id: String,
        request: &SynthesisRequest,
    ) -> TtsResult<SynthesisResponse> {
        let upgrade = self.build_upgrade_request()?;
        let timeout = request.timeout;

        // One deadline covers the connection attempt and the whole frame
        // exchange.
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let (socket, _response) = tokio::select! {
            _ = &mut deadline => return Err(TtsError::Timeout(timeout)),
            connected = connect_async(upgrade) => connected.map_err(|e| {
                TtsError::Transport(format!("failed to connect to {}: {e}", self.endpoint))
            })?,
        };
        debug!(task_id = %task_id, endpoint = %self.endpoint, "connected");

        let (mut sink, mut source) = socket.split();
        let mut session = Session::new(task_id, request.clone());

        let mut pending = session.handle(SessionInput::Opened);
        loop {
            if let Some(settled) = apply_actions(&mut sink, &mut session, pending).await {
                return settled;
            }

            let input = loop {
                tokio::select! {
                    _ = &mut deadline => break SessionInput::DeadlineExpired,
                    frame = source.next() => {
                        if let Some(input) = classify_frame(frame) {
                            break input;
                        }
                    }
                }
            };
            pending = session.handle(input);
        }
    }
}

// =============================================================================
// Frame and Action Plumbing
// =============================================================================

/// Performs the actions returned by a transition, feeding send failures
/// back into the machine. Returns the settlement as soon as one is reached.
async fn apply_actions(
    sink: &mut WsSink,
    session: &mut Session,
    actions: Vec<SessionAction>,
) -> Option<TtsResult<SynthesisResponse>> {
    let mut queue: VecDeque<SessionAction> = actions.into();
    while let Some(action) = queue.pop_front() {
        match action {
            SessionAction::Settle(result) => return Some(result),
            SessionAction::Send(command) => {
                let action_name = command.action();
                let outcome = match command.to_json() {
                    Ok(json) => sink
                        .send(Message::Text(json.into()))
                        .await
                        .map_err(|e| format!("failed to send {action_name}: {e}")),
                    Err(e) => Err(format!("failed to encode {action_name}: {e}")),
                };
                match outcome {
                    Ok(()) => debug!(command = action_name, "sent command"),
                    Err(reason) => {
                        queue.extend(session.handle(SessionInput::SocketError(reason)));
                    }
                }
            }
            SessionAction::Close => {
                // Best effort; the peer may already be gone.
                let _ = sink.send(Message::Close(None)).await;
            }
        }
    }
    None
}

/// Maps a raw frame to a machine input. `None` means the frame carries
/// nothing for the session (ping, pong, noise) and is skipped.
fn classify_frame(frame: Option<Result<Message, WsError>>) -> Option<SessionInput> {
    match frame {
        None => Some(SessionInput::Closed),
        Some(Ok(Message::Binary(data))) => Some(SessionInput::Audio(data)),
        Some(Ok(Message::Text(text))) => match ServerEvent::parse(&text) {
            Ok(event) => Some(SessionInput::Event(event)),
            Err(e) => {
                debug!("ignoring unparseable control frame: {e}");
                None
            }
        },
        Some(Ok(Message::Close(close_frame))) => {
            debug!(?close_frame, "server closed the connection");
            Some(SessionInput::Closed)
        }
        Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => None,
        Some(Err(e)) => Some(SessionInput::SocketError(e.to_string())),
    }
}
