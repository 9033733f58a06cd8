use tracing::debug;

use crate::{config::db_to_gain, AudioBuffer, DynamicsConfig, LimiterMode, Result};

/// Gate, optional loudness correction, makeup gain and ceiling limiter,
/// applied in that order.
#[derive(Debug, Clone)]
pub struct DynamicsNormalizer {
    config: DynamicsConfig,
}

impl DynamicsNormalizer {
    pub fn new(config: DynamicsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DynamicsConfig {
        &self.config
    }

    /// Runs the full chain. The result has the input's length and its peak
    /// never exceeds `limiter_ceiling`.
    pub fn process(&self, input: &AudioBuffer) -> AudioBuffer {
        let sample_rate = input.sample_rate();
        let mut samples = input.samples().to_vec();

        let gated = self.gate(&mut samples, sample_rate);
        let correction = self.level(&mut samples);
        let makeup = db_to_gain(self.config.makeup_gain_db);
        for sample in &mut samples {
            *sample *= makeup;
        }
        let limited = self.limit(&mut samples);

        debug!(
            samples = samples.len(),
            gated,
            correction,
            limited,
            makeup_gain_db = self.config.makeup_gain_db,
            "normalised stream dynamics"
        );

        AudioBuffer::new(samples, sample_rate)
    }

    /// Attenuates short-time windows whose peak envelope falls below the
    /// threshold relative to the buffer peak. Returns the number of samples
    /// that received less than unity gain.
    fn gate(&self, samples: &mut [f32], sample_rate: u32) -> usize {
        let peak = samples
            .iter()
            .filter(|s| s.is_finite())
            .fold(0.0f32, |acc, s| acc.max(s.abs()));
        if peak <= 0.0 {
            return 0;
        }

        let threshold = peak * db_to_gain(self.config.gate_threshold_db);
        let floor = db_to_gain(self.config.gate_floor_db);
        let window = ms_to_samples(self.config.gate_window_ms, sample_rate).max(1);
        let hop = (window / 4).max(1);

        let mut gains = vec![1.0f32; samples.len()];
        for start in (0..samples.len()).step_by(hop) {
            let end = (start + window).min(samples.len());
            let envelope = samples[start..end]
                .iter()
                .fold(0.0f32, |acc, s| acc.max(s.abs()));
            if envelope < threshold {
                let stop = (start + hop).min(samples.len());
                gains[start..stop].fill(floor);
            }
        }

        let smoothing = ms_to_samples(self.config.gate_smoothing_ms, sample_rate);
        if smoothing > 1 {
            gains = moving_average(&gains, smoothing);
        }

        let mut attenuated = 0;
        for (sample, gain) in samples.iter_mut().zip(&gains) {
            if *gain < 1.0 {
                attenuated += 1;
            }
            *sample *= gain;
        }
        attenuated
    }

    /// Scales the stream towards `target_rms`, the factor clamped to
    /// `±max_rms_correction_db`. Returns the factor applied.
    fn level(&self, samples: &mut [f32]) -> f32 {
        let Some(target) = self.config.target_rms else {
            return 1.0;
        };
        let rms = finite_rms(samples);
        if rms <= 0.0 {
            return 1.0;
        }

        let limit = db_to_gain(self.config.max_rms_correction_db);
        let factor = (target / rms).clamp(1.0 / limit, limit);
        for sample in samples.iter_mut() {
            *sample *= factor;
        }
        factor
    }

    /// Keeps every sample within `±limiter_ceiling`. NaN becomes silence and
    /// infinities pin to the ceiling. Returns the number of samples that
    /// were altered.
    fn limit(&self, samples: &mut [f32]) -> usize {
        let ceiling = self.config.limiter_ceiling;
        let mut altered = 0;

        for sample in samples.iter_mut() {
            let original = *sample;
            *sample = if original.is_nan() {
                0.0
            } else if original.is_infinite() {
                original.signum() * ceiling
            } else {
                let shaped = match self.config.limiter_mode {
                    LimiterMode::Hard => original,
                    LimiterMode::Soft => ceiling * (original / ceiling).tanh(),
                };
                shaped.clamp(-ceiling, ceiling)
            };
            if *sample != original {
                altered += 1;
            }
        }
        altered
    }
}

impl Default for DynamicsNormalizer {
    fn default() -> Self {
        Self {
            config: DynamicsConfig::default(),
        }
    }
}

fn finite_rms(samples: &[f32]) -> f32 {
    let (sum, count) = samples
        .iter()
        .filter(|s| s.is_finite())
        .fold((0.0f64, 0usize), |(sum, count), s| {
            (sum + f64::from(*s) * f64::from(*s), count + 1)
        });
    if count == 0 {
        return 0.0;
    }
    (sum / count as f64).sqrt() as f32
}

fn ms_to_samples(ms: f32, sample_rate: u32) -> usize {
    (ms * sample_rate as f32 / 1_000.0).round() as usize
}

/// Centred moving average; edge samples average over the part of the window
/// that lies inside the buffer.
fn moving_average(values: &[f32], width: usize) -> Vec<f32> {
    let mut prefix = Vec::with_capacity(values.len() + 1);
    prefix.push(0.0f64);
    for value in values {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + f64::from(*value));
    }

    let before = width / 2;
    let after = width - before;
    (0..values.len())
        .map(|i| {
            let lo = i.saturating_sub(before);
            let hi = (i + after).min(values.len());
            ((prefix[hi] - prefix[lo]) / (hi - lo) as f64) as f32
        })
        .collect()
}
