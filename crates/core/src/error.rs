use std::fmt;

/// Result alias that carries the custom [`DevoxError`] type.
pub type Result<T> = std::result::Result<T, DevoxError>;

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Construction of the input frame or configuration parsing.
    Input,
    Combiner,
    SpectralEnhancer,
    DynamicsNormalizer,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Input => "input",
            Stage::Combiner => "stereo combiner",
            Stage::SpectralEnhancer => "spectral enhancer",
            Stage::DynamicsNormalizer => "dynamics normalizer",
        };
        f.write_str(name)
    }
}

/// Common error type for the separation engine.
///
/// Every validation variant is unrecoverable for the job that produced it:
/// the engine is deterministic, so retrying with the same input yields the
/// same error.
#[derive(Debug, thiserror::Error)]
pub enum DevoxError {
    /// Left and right channels disagree in length or sample rate.
    #[error("channel mismatch: {detail}")]
    ChannelMismatch { detail: String },
    /// The input does not carry exactly two channels.
    #[error("unsupported channel layout: expected 2 channels, got {channels}")]
    UnsupportedChannelLayout { channels: usize },
    /// The spectral enhancement settings are unusable.
    #[error("invalid band config: {reason}")]
    InvalidBandConfig { reason: String },
    /// The gate / gain / limiter settings are unusable.
    #[error("invalid dynamics config: {reason}")]
    InvalidDynamicsConfig { reason: String },
    /// Transform failure reported by the FFT backend.
    #[error("fft failure: {0}")]
    Fft(#[from] realfft::FftError),
    /// Malformed JSON configuration.
    #[error("config parse error: {0}")]
    Config(#[from] serde_json::Error),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl DevoxError {
    pub fn channel_mismatch<T: Into<String>>(detail: T) -> Self {
        Self::ChannelMismatch {
            detail: detail.into(),
        }
    }

    pub fn band<T: Into<String>>(reason: T) -> Self {
        Self::InvalidBandConfig {
            reason: reason.into(),
        }
    }

    pub fn dynamics<T: Into<String>>(reason: T) -> Self {
        Self::InvalidDynamicsConfig {
            reason: reason.into(),
        }
    }

    /// Returns the stage whose invariant was violated.
    pub fn stage(&self) -> Stage {
        match self {
            Self::ChannelMismatch { .. } | Self::UnsupportedChannelLayout { .. } => {
                Stage::Combiner
            }
            Self::InvalidBandConfig { .. } | Self::Fft(_) => Stage::SpectralEnhancer,
            Self::InvalidDynamicsConfig { .. } => Stage::DynamicsNormalizer,
            Self::Config(_) | Self::Io(_) => Stage::Input,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_variants_to_stages() {
        assert_eq!(
            DevoxError::channel_mismatch("3 vs 4").stage(),
            Stage::Combiner
        );
        assert_eq!(
            DevoxError::UnsupportedChannelLayout { channels: 6 }.stage(),
            Stage::Combiner
        );
        assert_eq!(DevoxError::band("x").stage(), Stage::SpectralEnhancer);
        assert_eq!(DevoxError::dynamics("x").stage(), Stage::DynamicsNormalizer);
    }

    #[test]
    fn messages_name_the_violation() {
        let err = DevoxError::UnsupportedChannelLayout { channels: 1 };
        assert!(format!("{err}").contains("got 1"));
        assert_eq!(Stage::SpectralEnhancer.to_string(), "spectral enhancer");
    }
}
