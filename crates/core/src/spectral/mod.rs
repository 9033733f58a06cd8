//! Band-selective STFT filter that lifts the vocal formant range out of the
//! raw side signal.
//!
//! Frames of `fft_size` samples are taken every `fft_size / 2` samples,
//! windowed with a periodic Hann window on both analysis and synthesis and
//! recombined by weighted overlap-add. The input is padded by one hop on each
//! side so every original sample is covered by two frames, and the
//! accumulated squared window is divided out, which makes a unity gain curve
//! reconstruct the input exactly.
//!
//! The gain curve is defined in decibels: `+band_gain_db` inside the band,
//! `-out_of_band_attenuation_db` outside, with a raised-cosine crossfade of
//! `transition_hz` centred on each band edge.

use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, ComplexToReal, RealFftPlanner, RealToComplex};
use tracing::debug;

use crate::{config::db_to_gain, AudioBuffer, DevoxError, Result, SpectralEnhancementConfig};

/// Stateless vocal enhancer; every call plans its own transforms.
#[derive(Debug, Clone)]
pub struct SpectralEnhancer {
    config: SpectralEnhancementConfig,
}

impl SpectralEnhancer {
    pub fn new(config: SpectralEnhancementConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SpectralEnhancementConfig {
        &self.config
    }

    /// Linear gain for each of the `fft_size / 2 + 1` bins at `sample_rate`.
    pub fn gain_curve(&self, sample_rate: u32) -> Vec<f32> {
        let size = self.config.fft_size;
        let bin_hz = sample_rate as f32 / size as f32;
        (0..=size / 2)
            .map(|bin| db_to_gain(self.gain_db_at(bin as f32 * bin_hz)))
            .collect()
    }

    /// Gain in dB applied at `frequency_hz`.
    pub fn gain_db_at(&self, frequency_hz: f32) -> f32 {
        let cfg = &self.config;
        let half = cfg.transition_hz * 0.5;
        let rise = raised_cosine((frequency_hz - (cfg.vocal_band_low_hz - half)) / cfg.transition_hz);
        let fall =
            1.0 - raised_cosine((frequency_hz - (cfg.vocal_band_high_hz - half)) / cfg.transition_hz);
        let membership = rise * fall;

        let floor = -cfg.out_of_band_attenuation_db;
        floor + membership * (cfg.band_gain_db - floor)
    }

    /// Applies the band gain curve to `input`, returning a buffer of the same
    /// length and sample rate.
    pub fn enhance(&self, input: &AudioBuffer) -> Result<AudioBuffer> {
        let sample_rate = input.sample_rate();
        self.config.validate_for_sample_rate(sample_rate)?;

        let size = self.config.fft_size;
        let bin_hz = sample_rate as f32 / size as f32;
        let bandwidth = self.config.vocal_band_high_hz - self.config.vocal_band_low_hz;
        if bin_hz > bandwidth {
            return Err(DevoxError::band(format!(
                "fft_size {size} resolves {bin_hz:.1} Hz per bin, wider than the {bandwidth} Hz band"
            )));
        }

        if input.is_empty() {
            return Ok(AudioBuffer::silent(0, sample_rate));
        }

        let gains = self.gain_curve(sample_rate);
        let mut stft = StftResources::new(size);
        let output = stft.filter(input.samples(), &gains)?;

        debug!(
            samples = output.len(),
            fft_size = size,
            low_hz = self.config.vocal_band_low_hz,
            high_hz = self.config.vocal_band_high_hz,
            "enhanced vocal band"
        );

        Ok(AudioBuffer::new(output, sample_rate))
    }
}

impl Default for SpectralEnhancer {
    fn default() -> Self {
        Self {
            config: SpectralEnhancementConfig::default(),
        }
    }
}

struct StftResources {
    size: usize,
    hop: usize,
    window: Vec<f32>,
    forward: Arc<dyn RealToComplex<f32>>,
    inverse: Arc<dyn ComplexToReal<f32>>,
    frame: Vec<f32>,
    spectrum: Vec<Complex32>,
    forward_scratch: Vec<Complex32>,
    inverse_scratch: Vec<Complex32>,
}

impl StftResources {
    fn new(size: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);
        let window = (0..size).map(|index| hann_value(index, size)).collect();

        Self {
            size,
            hop: size / 2,
            window,
            frame: forward.make_input_vec(),
            spectrum: forward.make_output_vec(),
            forward_scratch: forward.make_scratch_vec(),
            inverse_scratch: inverse.make_scratch_vec(),
            forward,
            inverse,
        }
    }

    fn filter(&mut self, samples: &[f32], gains: &[f32]) -> Result<Vec<f32>> {
        let len = samples.len();
        let hop = self.hop;
        let frames = len.div_ceil(hop) + 1;
        let padded_len = (frames + 1) * hop;

        let mut padded = vec![0.0f32; padded_len];
        padded[hop..hop + len].copy_from_slice(samples);
        let mut accumulated = vec![0.0f32; padded_len];
        let mut norm = vec![0.0f32; padded_len];
        let scale = 1.0 / self.size as f32;

        for start in (0..frames).map(|k| k * hop) {
            let source = &padded[start..start + self.size];
            for ((slot, sample), w) in self.frame.iter_mut().zip(source).zip(&self.window) {
                *slot = sample * w;
            }

            self.forward.process_with_scratch(
                &mut self.frame,
                &mut self.spectrum,
                &mut self.forward_scratch,
            )?;

            for (bin, gain) in self.spectrum.iter_mut().zip(gains) {
                *bin *= *gain;
            }
            // DC and Nyquist must be purely real for the inverse transform.
            let last = self.spectrum.len() - 1;
            self.spectrum[0].im = 0.0;
            self.spectrum[last].im = 0.0;

            self.inverse.process_with_scratch(
                &mut self.spectrum,
                &mut self.frame,
                &mut self.inverse_scratch,
            )?;

            let out = &mut accumulated[start..start + self.size];
            let weight = &mut norm[start..start + self.size];
            for (i, w) in self.window.iter().enumerate() {
                out[i] += self.frame[i] * scale * w;
                weight[i] += w * w;
            }
        }

        Ok(accumulated[hop..hop + len]
            .iter()
            .zip(&norm[hop..hop + len])
            .map(|(value, weight)| {
                if *weight > f32::EPSILON {
                    value / weight
                } else {
                    0.0
                }
            })
            .collect())
    }
}

impl fmt::Debug for StftResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StftResources")
            .field("size", &self.size)
            .field("hop", &self.hop)
            .finish()
    }
}

/// Periodic Hann window, which overlaps cleanly at half-frame hops.
fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    0.5 - 0.5 * ((2.0 * PI * index as f32) / len as f32).cos()
}

/// Half-Hann step from 0 to 1 over `x` in `[0, 1]`.
fn raised_cosine(x: f32) -> f32 {
    let x = x.clamp(0.0, 1.0);
    0.5 - 0.5 * (PI * x).cos()
}
