use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span};

use crate::{
    combiner, AudioBuffer, DynamicsNormalizer, Result, SeparationConfig, SeparationMode,
    SeparationResult, SpectralEnhancer, StereoFrame,
};

/// Level measurements for one stem, before and after post-processing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StemLevels {
    pub raw_peak: f32,
    pub raw_rms: f32,
    pub peak: f32,
    pub rms: f32,
}

impl StemLevels {
    fn measure(raw: &AudioBuffer, processed: &AudioBuffer) -> Self {
        Self {
            raw_peak: raw.peak(),
            raw_rms: raw.rms(),
            peak: processed.peak(),
            rms: processed.rms(),
        }
    }
}

/// Summary of a finished job, suitable for logging or a JSON sidecar.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SeparationReport {
    pub sample_rate: u32,
    pub samples: usize,
    pub duration_seconds: f32,
    pub mode: SeparationMode,
    pub instrumental: Option<StemLevels>,
    pub vocal: Option<StemLevels>,
}

/// Combiner → enhancer → normaliser pipeline.
///
/// The engine only holds validated, read-only configuration, so a single
/// instance can serve any number of concurrent jobs.
#[derive(Debug, Clone)]
pub struct SeparationEngine {
    mode: SeparationMode,
    parallel: bool,
    enhancer: SpectralEnhancer,
    dynamics: DynamicsNormalizer,
}

impl SeparationEngine {
    pub fn new(config: SeparationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            mode: config.mode,
            parallel: config.parallel,
            enhancer: SpectralEnhancer::new(config.spectral)?,
            dynamics: DynamicsNormalizer::new(config.dynamics)?,
        })
    }

    pub fn mode(&self) -> SeparationMode {
        self.mode
    }

    pub fn separate(&self, frame: &StereoFrame) -> Result<SeparationResult> {
        self.separate_with_report(frame).map(|(result, _)| result)
    }

    /// Separates `frame` and reports levels of the computed stems. Either
    /// both stems are returned or an error; there are no partial results.
    pub fn separate_with_report(
        &self,
        frame: &StereoFrame,
    ) -> Result<(SeparationResult, SeparationReport)> {
        let span = info_span!("separate", samples = frame.len(), rate = frame.sample_rate());
        let _guard = span.enter();

        let sample_rate = frame.sample_rate();
        // Checked up front so an unusable band fails before any work.
        if self.mode.wants_vocal() {
            self.enhancer
                .config()
                .validate_for_sample_rate(sample_rate)?;
        }

        let raw = combiner::combine(frame);

        let (instrumental, vocal) = if self.parallel {
            rayon::join(
                || self.instrumental_path(&raw.instrumental),
                || self.vocal_path(&raw.vocal),
            )
        } else {
            (
                self.instrumental_path(&raw.instrumental),
                self.vocal_path(&raw.vocal),
            )
        };
        let (instrumental, instrumental_levels) = finish_stem(&raw.instrumental, instrumental?);
        let (vocal, vocal_levels) = finish_stem(&raw.vocal, vocal?);

        let report = SeparationReport {
            sample_rate,
            samples: frame.len(),
            duration_seconds: frame.left().duration_seconds(),
            mode: self.mode,
            instrumental: instrumental_levels,
            vocal: vocal_levels,
        };

        info!(
            mode = ?self.mode,
            duration_seconds = report.duration_seconds,
            "separation finished"
        );

        let result = SeparationResult { instrumental, vocal };
        Ok((result, report))
    }

    fn instrumental_path(&self, raw: &AudioBuffer) -> Result<Option<AudioBuffer>> {
        if !self.mode.wants_instrumental() {
            return Ok(None);
        }
        debug!("processing instrumental stream");
        Ok(Some(self.dynamics.process(raw)))
    }

    fn vocal_path(&self, raw: &AudioBuffer) -> Result<Option<AudioBuffer>> {
        if !self.mode.wants_vocal() {
            return Ok(None);
        }
        debug!("processing vocal stream");
        let enhanced = self.enhancer.enhance(raw)?;
        Ok(Some(self.dynamics.process(&enhanced)))
    }
}

/// Pairs a processed stem with its levels, or substitutes silence of the raw
/// stem's length when the stem was not requested.
fn finish_stem(
    raw: &AudioBuffer,
    processed: Option<AudioBuffer>,
) -> (AudioBuffer, Option<StemLevels>) {
    match processed {
        Some(out) => {
            let levels = StemLevels::measure(raw, &out);
            (out, Some(levels))
        }
        None => (AudioBuffer::silent(raw.len(), raw.sample_rate()), None),
    }
}

impl Default for SeparationEngine {
    fn default() -> Self {
        Self {
            mode: SeparationMode::Both,
            parallel: true,
            enhancer: SpectralEnhancer::default(),
            dynamics: DynamicsNormalizer::default(),
        }
    }
}

/// Runs one job with a throwaway engine.
pub fn separate(frame: &StereoFrame, config: &SeparationConfig) -> Result<SeparationResult> {
    SeparationEngine::new(config.clone())?.separate(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DevoxError, SpectralEnhancementConfig};

    fn frame(left: Vec<f32>, right: Vec<f32>, rate: u32) -> StereoFrame {
        StereoFrame::new(AudioBuffer::new(left, rate), AudioBuffer::new(right, rate)).unwrap()
    }

    fn noisy_frame(len: usize) -> StereoFrame {
        let left = (0..len).map(|i| ((i * 7919 % 613) as f32 / 306.5) - 1.0).collect();
        let right = (0..len).map(|i| ((i * 104_729 % 457) as f32 / 228.5) - 1.0).collect();
        frame(left, right, 44_100)
    }

    #[test]
    fn vocals_only_returns_silent_instrumental() {
        let engine = SeparationEngine::new(SeparationConfig {
            mode: SeparationMode::VocalsOnly,
            ..Default::default()
        })
        .unwrap();

        let (result, report) = engine.separate_with_report(&noisy_frame(5_000)).unwrap();
        assert_eq!(result.instrumental.len(), 5_000);
        assert!(result.instrumental.samples().iter().all(|s| *s == 0.0));
        assert!(report.instrumental.is_none());
        let levels = report.vocal.unwrap();
        assert_eq!(levels.peak, result.vocal.peak());
        assert_eq!(levels.rms, result.vocal.rms());
    }

    #[test]
    fn instrumental_only_skips_band_checks() {
        // The default band does not fit under a 2 kHz Nyquist, but the vocal
        // path never runs.
        let engine = SeparationEngine::new(SeparationConfig {
            mode: SeparationMode::InstrumentalOnly,
            ..Default::default()
        })
        .unwrap();
        let result = engine
            .separate(&frame(vec![0.5; 32], vec![0.25; 32], 4_000))
            .unwrap();
        assert!(result.vocal.samples().iter().all(|s| *s == 0.0));
        assert!(result.instrumental.peak() > 0.0);
    }

    #[test]
    fn parallel_and_sequential_agree() {
        let input = noisy_frame(9_000);
        let parallel = SeparationEngine::default().separate(&input).unwrap();
        let sequential = SeparationEngine::new(SeparationConfig {
            parallel: false,
            ..Default::default()
        })
        .unwrap()
        .separate(&input)
        .unwrap();
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn nyquist_violation_fails_whole_job() {
        let err = SeparationEngine::default()
            .separate(&frame(vec![0.1; 16], vec![0.0; 16], 4_000))
            .unwrap_err();
        assert!(matches!(err, DevoxError::InvalidBandConfig { .. }));
    }

    #[test]
    fn free_function_validates_config() {
        let config = SeparationConfig {
            spectral: SpectralEnhancementConfig {
                vocal_band_low_hz: 500.0,
                vocal_band_high_hz: 200.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = separate(&noisy_frame(8), &config).unwrap_err();
        assert!(matches!(err, DevoxError::InvalidBandConfig { .. }));
    }

    #[test]
    fn report_tracks_levels() {
        let (_, report) = SeparationEngine::default()
            .separate_with_report(&noisy_frame(4_410))
            .unwrap();
        assert_eq!(report.samples, 4_410);
        assert!((report.duration_seconds - 0.1).abs() < 1e-4);
        let vocal = report.vocal.unwrap();
        assert!(vocal.raw_peak > 0.0);
        assert!(vocal.peak <= 0.95);
    }
}
