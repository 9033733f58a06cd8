use tracing::debug;

use crate::{AudioBuffer, StereoFrame};

/// Raw stem estimates produced by mid/side arithmetic, before any
/// enhancement or dynamics processing.
#[derive(Debug, Clone, PartialEq)]
pub struct RawStems {
    /// Mid signal, `(left + right) / 2`.
    pub instrumental: AudioBuffer,
    /// Side signal, `(left - right) / 2`. Centre-panned content cancels here.
    pub vocal: AudioBuffer,
}

/// Splits a stereo frame into mid (instrumental) and side (vocal) buffers.
///
/// A frame whose channels are identical produces an all-zero vocal buffer.
pub fn combine(frame: &StereoFrame) -> RawStems {
    let left = frame.left().samples();
    let right = frame.right().samples();
    let sample_rate = frame.sample_rate();

    let (instrumental, vocal): (Vec<f32>, Vec<f32>) = left
        .iter()
        .zip(right)
        .map(|(l, r)| ((l + r) * 0.5, (l - r) * 0.5))
        .unzip();

    debug!(samples = frame.len(), sample_rate, "combined stereo frame");

    RawStems {
        instrumental: AudioBuffer::new(instrumental, sample_rate),
        vocal: AudioBuffer::new(vocal, sample_rate),
    }
}

/// Inverts [`combine`]: `left = mid + side`, `right = mid - side`.
pub fn reconstruct(stems: &RawStems) -> (AudioBuffer, AudioBuffer) {
    let sample_rate = stems.instrumental.sample_rate();
    let (left, right): (Vec<f32>, Vec<f32>) = stems
        .instrumental
        .samples()
        .iter()
        .zip(stems.vocal.samples())
        .map(|(mid, side)| (mid + side, mid - side))
        .unzip();

    (
        AudioBuffer::new(left, sample_rate),
        AudioBuffer::new(right, sample_rate),
    )
}
