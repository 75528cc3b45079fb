//! Streaming WebSocket client for the Alibaba Cloud DashScope CosyVoice
//! text-to-speech service.
//!
//! One [`SynthesisRequest`] becomes one duplex WebSocket session: the
//! client opens the task, streams the text, collects the interleaved
//! control and binary frames, and settles into a single
//! [`SynthesisResponse`] carrying the complete audio plus billing and
//! timing metadata, or into exactly one typed [`TtsError`].
//!
//! # Architecture
//!
//! - [`config`]: the validated request structure and its defaults
//! - [`messages`]: pure translation between internal types and wire JSON
//! - [`client`]: the session driver owning the socket, the deadline and
//!   the settlement discipline
//!
//! # Example
//!
//! ```rust,ignore
//! use cosyvoice_tts::{AudioFormat, CosyVoiceTts, SynthesisRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = CosyVoiceTts::from_env()?;
//!     let request = SynthesisRequest::new("你好", "cosyvoice-v3-flash", "longxiaochun")
//!         .with_format(AudioFormat::Wav);
//!     let response = client.synthesize(&request).await?;
//!     std::fs::write("hello.wav", &response.audio)?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod messages;
mod session;

pub use client::{API_KEY_ENV, CosyVoiceTts, DASHSCOPE_WS_URL};
pub use config::{
    AudioFormat, DEFAULT_PITCH, DEFAULT_RATE, DEFAULT_SAMPLE_RATE, DEFAULT_TIMEOUT,
    DEFAULT_VOLUME, SynthesisRequest,
};
pub use error::{TtsError, TtsResult};
pub use messages::{OutboundCommand, ServerEvent, WordTimestamp};
pub use session::SynthesisResponse;
