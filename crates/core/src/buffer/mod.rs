use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{DevoxError, Result};

/// Immutable block of mono samples at a fixed sample rate.
///
/// Samples are conventionally normalised to `[-1.0, 1.0]`. The storage is
/// shared, so cloning a buffer never copies sample data and no stage can
/// mutate a buffer another stage still holds.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    /// Creates a zero buffer of `len` samples.
    pub fn silent(len: usize, sample_rate: u32) -> Self {
        Self::new(vec![0.0; len], sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_seconds(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Largest absolute sample value, `0.0` for an empty buffer.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f32 = self.samples.iter().map(|sample| sample * sample).sum();
        (sum / self.samples.len() as f32).sqrt()
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples.to_vec()
    }
}

/// How decoder output that is not already stereo should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelPolicy {
    /// Only exactly two channels are accepted.
    #[default]
    Strict,
    /// A single channel is duplicated to both sides. The vocal stem of such
    /// a frame is silent.
    UpmixMono,
}

/// Left/right pair of equal length and sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct StereoFrame {
    left: AudioBuffer,
    right: AudioBuffer,
}

impl StereoFrame {
    pub fn new(left: AudioBuffer, right: AudioBuffer) -> Result<Self> {
        if left.len() != right.len() {
            return Err(DevoxError::channel_mismatch(format!(
                "left has {} samples, right has {}",
                left.len(),
                right.len()
            )));
        }
        if left.sample_rate() != right.sample_rate() {
            return Err(DevoxError::channel_mismatch(format!(
                "left is {} Hz, right is {} Hz",
                left.sample_rate(),
                right.sample_rate()
            )));
        }
        Ok(Self { left, right })
    }

    /// Builds a frame from planar channel data.
    pub fn from_channels(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        let [left, right]: [Vec<f32>; 2] =
            channels
                .try_into()
                .map_err(|rejected: Vec<Vec<f32>>| DevoxError::UnsupportedChannelLayout {
                    channels: rejected.len(),
                })?;
        Self::new(
            AudioBuffer::new(left, sample_rate),
            AudioBuffer::new(right, sample_rate),
        )
    }

    /// De-interleaves decoder output.
    pub fn from_interleaved(
        samples: &[f32],
        channels: usize,
        sample_rate: u32,
        policy: ChannelPolicy,
    ) -> Result<Self> {
        match (channels, policy) {
            (2, _) => {}
            (1, ChannelPolicy::UpmixMono) => {
                return Ok(Self::upmix_mono(AudioBuffer::new(
                    samples.to_vec(),
                    sample_rate,
                )));
            }
            (other, _) => return Err(DevoxError::UnsupportedChannelLayout { channels: other }),
        }

        if samples.len() % 2 != 0 {
            return Err(DevoxError::channel_mismatch(format!(
                "{} interleaved samples cannot be split into two channels",
                samples.len()
            )));
        }

        let frames = samples.len() / 2;
        let mut left = Vec::with_capacity(frames);
        let mut right = Vec::with_capacity(frames);
        for pair in samples.chunks_exact(2) {
            left.push(pair[0]);
            right.push(pair[1]);
        }
        Self::from_channels(vec![left, right], sample_rate)
    }

    /// Duplicates a mono buffer into both channels.
    pub fn upmix_mono(mono: AudioBuffer) -> Self {
        Self {
            left: mono.clone(),
            right: mono,
        }
    }

    pub fn left(&self) -> &AudioBuffer {
        &self.left
    }

    pub fn right(&self) -> &AudioBuffer {
        &self.right
    }

    pub fn sample_rate(&self) -> u32 {
        self.left.sample_rate()
    }

    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }
}

/// Output of a separation job. Both stems share the input's length and
/// sample rate and are owned by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct SeparationResult {
    pub instrumental: AudioBuffer,
    pub vocal: AudioBuffer,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measures_peak_and_rms() {
        let buffer = AudioBuffer::new(vec![0.5, -1.0, 0.5, 0.0], 4);
        assert_eq!(buffer.peak(), 1.0);
        assert!((buffer.rms() - (1.5f32 / 4.0).sqrt()).abs() < 1e-6);
        assert!((buffer.duration_seconds() - 1.0).abs() < f32::EPSILON);

        let empty = AudioBuffer::silent(0, 44_100);
        assert_eq!(empty.peak(), 0.0);
        assert_eq!(empty.rms(), 0.0);
    }

    #[test]
    fn rejects_mismatched_lengths() {
        let err = StereoFrame::new(
            AudioBuffer::new(vec![0.0; 3], 44_100),
            AudioBuffer::new(vec![0.0; 4], 44_100),
        )
        .unwrap_err();
        assert!(matches!(err, DevoxError::ChannelMismatch { .. }));
    }

    #[test]
    fn rejects_mismatched_sample_rates() {
        let err = StereoFrame::new(
            AudioBuffer::new(vec![0.0; 3], 44_100),
            AudioBuffer::new(vec![0.0; 3], 48_000),
        )
        .unwrap_err();
        assert!(matches!(err, DevoxError::ChannelMismatch { .. }));
    }

    #[test]
    fn rejects_non_stereo_channel_lists() {
        let err = StereoFrame::from_channels(vec![vec![0.0; 4]], 48_000).unwrap_err();
        assert!(matches!(
            err,
            DevoxError::UnsupportedChannelLayout { channels: 1 }
        ));

        let err = StereoFrame::from_channels(vec![vec![0.0; 4]; 6], 48_000).unwrap_err();
        assert!(matches!(
            err,
            DevoxError::UnsupportedChannelLayout { channels: 6 }
        ));

        let err = StereoFrame::from_channels(Vec::new(), 48_000).unwrap_err();
        assert!(matches!(
            err,
            DevoxError::UnsupportedChannelLayout { channels: 0 }
        ));
    }

    #[test]
    fn deinterleaves_stereo() {
        let frame = StereoFrame::from_interleaved(
            &[1.0, -1.0, 0.5, -0.5],
            2,
            8_000,
            ChannelPolicy::Strict,
        )
        .unwrap();
        assert_eq!(frame.left().samples(), &[1.0, 0.5]);
        assert_eq!(frame.right().samples(), &[-1.0, -0.5]);
        assert_eq!(frame.sample_rate(), 8_000);
    }

    #[test]
    fn mono_requires_explicit_upmix() {
        let mono = [0.25, 0.5, 0.75];
        let err =
            StereoFrame::from_interleaved(&mono, 1, 8_000, ChannelPolicy::Strict).unwrap_err();
        assert!(matches!(
            err,
            DevoxError::UnsupportedChannelLayout { channels: 1 }
        ));

        let frame =
            StereoFrame::from_interleaved(&mono, 1, 8_000, ChannelPolicy::UpmixMono).unwrap();
        assert_eq!(frame.left(), frame.right());
        assert_eq!(frame.len(), 3);
    }

    #[test]
    fn surround_is_rejected_even_with_upmix() {
        let err = StereoFrame::from_interleaved(&[0.0; 12], 6, 48_000, ChannelPolicy::UpmixMono)
            .unwrap_err();
        assert!(matches!(
            err,
            DevoxError::UnsupportedChannelLayout { channels: 6 }
        ));
    }

    #[test]
    fn odd_interleaved_length_is_a_mismatch() {
        let err = StereoFrame::from_interleaved(&[0.0; 3], 2, 48_000, ChannelPolicy::Strict)
            .unwrap_err();
        assert!(matches!(err, DevoxError::ChannelMismatch { .. }));
    }
}
