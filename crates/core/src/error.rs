/// Result alias that carries the custom [`VibeError`] type.
pub type Result<T> = std::result::Result<T, VibeError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum VibeError {
    /// Microphone acquisition or binding failed.
    #[error(transparent)]
    Device(#[from] DeviceError),
    /// A configuration value is outside the range the pipeline can work with.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Free-form error used by the application shell for window and surface
    /// failures that have no dedicated variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Configuration file could not be parsed.
    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),
    /// The FFT plan rejected its buffers.
    #[error("spectral analysis failed: {0}")]
    Fft(#[from] realfft::FftError),
}

impl VibeError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for VibeError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for VibeError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

/// Failures surfaced by the start-capture path. The per-tick pipeline never
/// produces these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// The platform refused access to the microphone.
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),
    /// No usable input device, or the device went away.
    #[error("audio input device unavailable: {0}")]
    Unavailable(String),
    /// The extractor already has a live stream bound.
    #[error("feature extractor is already bound to a capture stream")]
    AlreadyBound,
}
