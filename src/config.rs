//! Request configuration for CosyVoice speech synthesis.
//!
//! This module contains the validated request structure and its documented
//! defaults:
//! - [`AudioFormat`]: output container selection with MIME type mapping
//! - [`SynthesisRequest`]: one immutable synthesis request, built with
//!   `with_*` methods and checked once by [`SynthesisRequest::validate`]

use std::str::FromStr;
use std::time::Duration;

use crate::error::{TtsError, TtsResult};

// =============================================================================
// Defaults and Ranges
// =============================================================================

/// Default output sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 22050;

/// Default volume (0-100 scale).
pub const DEFAULT_VOLUME: u32 = 50;

/// Default speech rate multiplier.
pub const DEFAULT_RATE: f32 = 1.0;

/// Default pitch multiplier.
pub const DEFAULT_PITCH: f32 = 1.0;

/// Default wall-clock deadline for one session, connect to settlement.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(180);

/// Maximum volume value.
pub const MAX_VOLUME: u32 = 100;

/// Minimum speech rate multiplier.
pub const MIN_RATE: f32 = 0.5;

/// Maximum speech rate multiplier.
pub const MAX_RATE: f32 = 2.0;

/// Minimum pitch multiplier.
pub const MIN_PITCH: f32 = 0.5;

/// Maximum pitch multiplier.
pub const MAX_PITCH: f32 = 2.0;

// =============================================================================
// Audio Format
// =============================================================================

/// Output audio containers supported by the CosyVoice service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioFormat {
    /// MPEG layer 3 (default)
    #[default]
    Mp3,
    /// WAV container with PCM samples
    Wav,
    /// Raw PCM samples
    Pcm,
    /// Opus (supports an explicit bit rate)
    Opus,
}

impl AudioFormat {
    /// Convert to the wire parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Pcm => "pcm",
            Self::Opus => "opus",
        }
    }

    /// MIME type declared for produced audio, `audio/<format>`.
    #[inline]
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mp3",
            Self::Wav => "audio/wav",
            Self::Pcm => "audio/pcm",
            Self::Opus => "audio/opus",
        }
    }

    /// File extension for produced audio, without the leading dot.
    #[inline]
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

impl FromStr for AudioFormat {
    type Err = ();

    /// Parse from a format string (case-insensitive).
    /// Returns `Ok(Self::Mp3)` as default for unknown values.
    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "wav" => Self::Wav,
            "pcm" => Self::Pcm,
            "opus" => Self::Opus,
            _ => Self::Mp3,
        })
    }
}

// =============================================================================
// Synthesis Request
// =============================================================================

/// One text-to-speech request.
///
/// Immutable once constructed: build it with [`SynthesisRequest::new`] and
/// the consuming `with_*` methods, then hand it to
/// [`CosyVoiceTts::synthesize`](crate::CosyVoiceTts::synthesize). The
/// driver validates the documented ranges once before opening a connection.
///
/// Known model identifiers at the time of writing: `cosyvoice-v3-flash`,
/// `cosyvoice-v3-plus`, `cosyvoice-v2`, `cosyvoice-v1`. Whether a given
/// voice is valid for a model (or supports SSML) is not checked here; that
/// lookup belongs to the caller.
///
/// # Example
///
/// ```rust,ignore
/// use cosyvoice_tts::{AudioFormat, SynthesisRequest};
///
/// let request = SynthesisRequest::new("你好", "cosyvoice-v3-flash", "longxiaochun")
///     .with_format(AudioFormat::Wav)
///     .with_volume(70)
///     .with_word_timestamps(true);
/// ```
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    /// Text to synthesize. Must be non-empty; when `ssml` is set this is
    /// the full SSML document.
    pub text: String,

    /// Model identifier, e.g. `cosyvoice-v3-flash`.
    pub model: String,

    /// Voice identifier, e.g. `longxiaochun`.
    pub voice: String,

    /// Output audio container. Default: MP3.
    pub format: AudioFormat,

    /// Output sample rate in Hz. Default: 22050. The service accepts
    /// 8000, 16000, 22050, 24000, 44100 and 48000.
    pub sample_rate: u32,

    /// Volume, 0-100. Default: 50.
    pub volume: u32,

    /// Speech rate multiplier, 0.5-2.0. Default: 1.0.
    pub rate: f32,

    /// Pitch multiplier, 0.5-2.0. Default: 1.0.
    pub pitch: f32,

    /// Treat `text` as SSML markup.
    pub ssml: bool,

    /// Emotion or scene instruction for instruction-capable voices.
    pub instruction: Option<String>,

    /// Request word-level timestamps with the result.
    pub word_timestamps: bool,

    /// Random seed, 1-65535. `None` leaves seeding to the service.
    pub seed: Option<u16>,

    /// Language hints, e.g. `["zh", "en"]`.
    pub language_hints: Option<Vec<String>>,

    /// Bit rate for Opus output.
    pub bit_rate: Option<u32>,

    /// Wall-clock deadline for the whole session. Default: 180 seconds.
    /// Increase for long text.
    pub timeout: Duration,
}

impl SynthesisRequest {
    /// Creates a request with the documented defaults for everything
    /// beyond text, model and voice.
    pub fn new(
        text: impl Into<String>,
        model: impl Into<String>,
        voice: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            model: model.into(),
            voice: voice.into(),
            format: AudioFormat::default(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            volume: DEFAULT_VOLUME,
            rate: DEFAULT_RATE,
            pitch: DEFAULT_PITCH,
            ssml: false,
            instruction: None,
            word_timestamps: false,
            seed: None,
            language_hints: None,
            bit_rate: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the output audio format.
    pub fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the output sample rate in Hz.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Sets the volume (0-100).
    pub fn with_volume(mut self, volume: u32) -> Self {
        self.volume = volume;
        self
    }

    /// Sets the speech rate multiplier (0.5-2.0).
    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = rate;
        self
    }

    /// Sets the pitch multiplier (0.5-2.0).
    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch;
        self
    }

    /// Enables or disables SSML interpretation of the text.
    pub fn with_ssml(mut self, ssml: bool) -> Self {
        self.ssml = ssml;
        self
    }

    /// Sets an emotion or scene instruction.
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    /// Enables or disables word-level timestamps.
    pub fn with_word_timestamps(mut self, enabled: bool) -> Self {
        self.word_timestamps = enabled;
        self
    }

    /// Sets the random seed. Zero means unset and clears any prior value.
    pub fn with_seed(mut self, seed: u16) -> Self {
        self.seed = if seed == 0 { None } else { Some(seed) };
        self
    }

    /// Sets language hints.
    pub fn with_language_hints(mut self, hints: Vec<String>) -> Self {
        self.language_hints = Some(hints);
        self
    }

    /// Sets the Opus bit rate.
    pub fn with_bit_rate(mut self, bit_rate: u32) -> Self {
        self.bit_rate = Some(bit_rate);
        self
    }

    /// Sets the session deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Checks the documented constraints once, before any connection is
    /// attempted.
    pub fn validate(&self) -> TtsResult<()> {
        if self.text.is_empty() {
            return Err(TtsError::InvalidRequest("text must not be empty".to_string()));
        }
        if self.model.is_empty() {
            return Err(TtsError::InvalidRequest("model must not be empty".to_string()));
        }
        if self.voice.is_empty() {
            return Err(TtsError::InvalidRequest("voice must not be empty".to_string()));
        }
        if self.volume > MAX_VOLUME {
            return Err(TtsError::InvalidRequest(format!(
                "volume {} is outside the supported range 0-{MAX_VOLUME}",
                self.volume
            )));
        }
        if !(MIN_RATE..=MAX_RATE).contains(&self.rate) {
            return Err(TtsError::InvalidRequest(format!(
                "rate {} is outside the supported range {MIN_RATE}-{MAX_RATE}",
                self.rate
            )));
        }
        if !(MIN_PITCH..=MAX_PITCH).contains(&self.pitch) {
            return Err(TtsError::InvalidRequest(format!(
                "pitch {} is outside the supported range {MIN_PITCH}-{MAX_PITCH}",
                self.pitch
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_as_str() {
        assert_eq!(AudioFormat::Mp3.as_str(), "mp3");
        assert_eq!(AudioFormat::Wav.as_str(), "wav");
        assert_eq!(AudioFormat::Pcm.as_str(), "pcm");
        assert_eq!(AudioFormat::Opus.as_str(), "opus");
    }

    #[test]
    fn test_format_mime_type() {
        assert_eq!(AudioFormat::Mp3.mime_type(), "audio/mp3");
        assert_eq!(AudioFormat::Wav.mime_type(), "audio/wav");
        assert_eq!(AudioFormat::Opus.mime_type(), "audio/opus");
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("wav".parse::<AudioFormat>().unwrap(), AudioFormat::Wav);
        assert_eq!("OPUS".parse::<AudioFormat>().unwrap(), AudioFormat::Opus);
        assert_eq!("pcm".parse::<AudioFormat>().unwrap(), AudioFormat::Pcm);
        assert_eq!("unknown".parse::<AudioFormat>().unwrap(), AudioFormat::Mp3);
    }

    #[test]
    fn test_new_applies_defaults() {
        let request = SynthesisRequest::new("hello", "cosyvoice-v2", "longxiaochun");

        assert_eq!(request.format, AudioFormat::Mp3);
        assert_eq!(request.sample_rate, DEFAULT_SAMPLE_RATE);
        assert_eq!(request.volume, DEFAULT_VOLUME);
        assert_eq!(request.rate, DEFAULT_RATE);
        assert_eq!(request.pitch, DEFAULT_PITCH);
        assert!(!request.ssml);
        assert!(!request.word_timestamps);
        assert!(request.seed.is_none());
        assert!(request.instruction.is_none());
        assert_eq!(request.timeout, Duration::from_secs(180));
    }

    #[test]
    fn test_with_seed_zero_means_unset() {
        let request = SynthesisRequest::new("hi", "cosyvoice-v2", "longxiaochun").with_seed(0);
        assert!(request.seed.is_none());

        let request = request.with_seed(42);
        assert_eq!(request.seed, Some(42));

        let request = request.with_seed(0);
        assert!(request.seed.is_none());
    }

    #[test]
    fn test_validate_accepts_defaults() {
        let request = SynthesisRequest::new("hello", "cosyvoice-v2", "longxiaochun");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_text() {
        let request = SynthesisRequest::new("", "cosyvoice-v2", "longxiaochun");
        let err = request.validate().unwrap_err();
        assert!(matches!(err, TtsError::InvalidRequest(msg) if msg.contains("text")));
    }

    #[test]
    fn test_validate_rejects_empty_voice() {
        let request = SynthesisRequest::new("hello", "cosyvoice-v2", "");
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_volume() {
        let request =
            SynthesisRequest::new("hello", "cosyvoice-v2", "longxiaochun").with_volume(101);
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_rate_and_pitch() {
        let base = SynthesisRequest::new("hello", "cosyvoice-v2", "longxiaochun");

        assert!(base.clone().with_rate(0.4).validate().is_err());
        assert!(base.clone().with_rate(2.1).validate().is_err());
        assert!(base.clone().with_pitch(0.0).validate().is_err());
        assert!(base.clone().with_pitch(3.0).validate().is_err());
        assert!(base.clone().with_rate(0.5).validate().is_ok());
        assert!(base.with_pitch(2.0).validate().is_ok());
    }
}
