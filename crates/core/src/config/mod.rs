use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{DevoxError, Result};

const MIN_FFT_SIZE: usize = 256;
const MAX_FFT_SIZE: usize = 65_536;

/// Which stems a job should compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeparationMode {
    #[default]
    Both,
    VocalsOnly,
    InstrumentalOnly,
}

impl SeparationMode {
    pub fn wants_vocal(self) -> bool {
        matches!(self, Self::Both | Self::VocalsOnly)
    }

    pub fn wants_instrumental(self) -> bool {
        matches!(self, Self::Both | Self::InstrumentalOnly)
    }
}

/// Top-level configuration for a separation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparationConfig {
    pub mode: SeparationMode,
    pub spectral: SpectralEnhancementConfig,
    pub dynamics: DynamicsConfig,
    /// Run the instrumental and vocal post-processing concurrently.
    pub parallel: bool,
}

impl Default for SeparationConfig {
    fn default() -> Self {
        Self {
            mode: SeparationMode::Both,
            spectral: SpectralEnhancementConfig::default(),
            dynamics: DynamicsConfig::default(),
            parallel: true,
        }
    }
}

impl SeparationConfig {
    /// Parses a (possibly partial) JSON document. Missing fields take the
    /// built-in defaults; present but invalid values are rejected.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.spectral.validate()?;
        self.dynamics.validate()
    }
}

/// Settings for the spectral vocal enhancer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralEnhancementConfig {
    pub vocal_band_low_hz: f32,
    pub vocal_band_high_hz: f32,
    /// Boost applied inside the vocal band.
    pub band_gain_db: f32,
    /// Positive number of dB removed from bins outside the band.
    pub out_of_band_attenuation_db: f32,
    /// STFT frame length, a power of two.
    pub fft_size: usize,
    /// Width of the raised-cosine crossfade centred on each band edge.
    pub transition_hz: f32,
}

impl Default for SpectralEnhancementConfig {
    fn default() -> Self {
        Self {
            vocal_band_low_hz: 300.0,
            vocal_band_high_hz: 3_400.0,
            band_gain_db: 6.0,
            out_of_band_attenuation_db: 18.0,
            fft_size: 4_096,
            transition_hz: 150.0,
        }
    }
}

impl SpectralEnhancementConfig {
    /// Checks everything that does not depend on the sample rate.
    pub fn validate(&self) -> Result<()> {
        let low = self.vocal_band_low_hz;
        let high = self.vocal_band_high_hz;
        if !low.is_finite() || !high.is_finite() {
            return Err(DevoxError::band("band edges must be finite"));
        }
        if low >= high {
            return Err(DevoxError::band(format!(
                "vocal_band_low_hz ({low}) must be below vocal_band_high_hz ({high})"
            )));
        }
        if low < 0.0 {
            return Err(DevoxError::band(format!(
                "vocal_band_low_hz ({low}) must not be negative"
            )));
        }
        if !db_to_gain(self.band_gain_db).is_finite() {
            return Err(DevoxError::band(format!(
                "band_gain_db ({}) does not map to a finite gain",
                self.band_gain_db
            )));
        }
        if !self.out_of_band_attenuation_db.is_finite() || self.out_of_band_attenuation_db < 0.0 {
            return Err(DevoxError::band(format!(
                "out_of_band_attenuation_db ({}) must be a non-negative number of dB",
                self.out_of_band_attenuation_db
            )));
        }
        if !self.fft_size.is_power_of_two()
            || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&self.fft_size)
        {
            return Err(DevoxError::band(format!(
                "fft_size ({}) must be a power of two between {MIN_FFT_SIZE} and {MAX_FFT_SIZE}",
                self.fft_size
            )));
        }
        if !self.transition_hz.is_finite() || self.transition_hz <= 0.0 {
            return Err(DevoxError::band(format!(
                "transition_hz ({}) must be positive",
                self.transition_hz
            )));
        }
        Ok(())
    }

    /// Checks the band against the Nyquist frequency of `sample_rate`.
    pub fn validate_for_sample_rate(&self, sample_rate: u32) -> Result<()> {
        self.validate()?;
        let nyquist = sample_rate as f32 * 0.5;
        if self.vocal_band_high_hz > nyquist {
            return Err(DevoxError::band(format!(
                "vocal_band_high_hz ({}) exceeds the Nyquist frequency ({nyquist}) of {sample_rate} Hz audio",
                self.vocal_band_high_hz
            )));
        }
        Ok(())
    }
}

/// Limiting curve applied at the ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimiterMode {
    /// Clamp to the ceiling.
    #[default]
    Hard,
    /// `ceiling * tanh(x / ceiling)`.
    Soft,
}

/// Settings for the gate / makeup gain / limiter chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicsConfig {
    /// Gate threshold relative to the buffer peak, at most 0 dB.
    pub gate_threshold_db: f32,
    pub makeup_gain_db: f32,
    /// Maximum permitted absolute output sample.
    pub limiter_ceiling: f32,
    pub limiter_mode: LimiterMode,
    pub gate_window_ms: f32,
    /// Gain applied to gated windows, at most 0 dB.
    pub gate_floor_db: f32,
    pub gate_smoothing_ms: f32,
    /// RMS level the gated stream is steered towards before makeup gain.
    /// `None` disables loudness correction.
    pub target_rms: Option<f32>,
    /// Largest boost or cut the loudness correction may apply.
    pub max_rms_correction_db: f32,
}

impl Default for DynamicsConfig {
    fn default() -> Self {
        Self {
            gate_threshold_db: -40.0,
            makeup_gain_db: 3.0,
            limiter_ceiling: 0.95,
            limiter_mode: LimiterMode::Hard,
            gate_window_ms: 50.0,
            gate_floor_db: -26.0,
            gate_smoothing_ms: 5.0,
            target_rms: None,
            max_rms_correction_db: 6.0,
        }
    }
}

impl DynamicsConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.gate_threshold_db.is_finite() && self.gate_threshold_db != f32::NEG_INFINITY {
            return Err(DevoxError::dynamics("gate_threshold_db must be a number"));
        }
        if self.gate_threshold_db > 0.0 {
            return Err(DevoxError::dynamics(format!(
                "gate_threshold_db ({}) must not exceed 0 dB",
                self.gate_threshold_db
            )));
        }
        if !self.limiter_ceiling.is_finite() || self.limiter_ceiling <= 0.0 {
            return Err(DevoxError::dynamics(format!(
                "limiter_ceiling ({}) must be positive",
                self.limiter_ceiling
            )));
        }
        if !db_to_gain(self.makeup_gain_db).is_finite() {
            return Err(DevoxError::dynamics(format!(
                "makeup_gain_db ({}) does not map to a finite gain",
                self.makeup_gain_db
            )));
        }
        if let Some(target) = self.target_rms {
            if !target.is_finite() || target <= 0.0 {
                return Err(DevoxError::dynamics(format!(
                    "target_rms ({target}) must be positive"
                )));
            }
        }
        if !db_to_gain(self.max_rms_correction_db).is_finite() || self.max_rms_correction_db < 0.0
        {
            return Err(DevoxError::dynamics(format!(
                "max_rms_correction_db ({}) must be a non-negative finite gain",
                self.max_rms_correction_db
            )));
        }
        if !self.gate_window_ms.is_finite() || self.gate_window_ms <= 0.0 {
            return Err(DevoxError::dynamics(format!(
                "gate_window_ms ({}) must be positive",
                self.gate_window_ms
            )));
        }
        if self.gate_floor_db.is_nan() || self.gate_floor_db > 0.0 {
            return Err(DevoxError::dynamics(format!(
                "gate_floor_db ({}) must not exceed 0 dB",
                self.gate_floor_db
            )));
        }
        if !self.gate_smoothing_ms.is_finite() || self.gate_smoothing_ms < 0.0 {
            return Err(DevoxError::dynamics(format!(
                "gate_smoothing_ms ({}) must not be negative",
                self.gate_smoothing_ms
            )));
        }
        Ok(())
    }
}

/// Converts decibels to a linear amplitude factor.
pub fn db_to_gain(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}
