//! WAV decoding and encoding around the separation engine.

use std::path::{Path, PathBuf};

use devox_core::{AudioBuffer, ChannelPolicy, DevoxError, SeparationResult, StereoFrame};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

/// Errors raised by the command line front end.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Engine(#[from] DevoxError),
    #[error("wav error: {0}")]
    Wav(#[from] hound::Error),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

pub type AppResult<T> = std::result::Result<T, AppError>;

/// Output sample encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Pcm16,
    Float32,
}

/// Reads a WAV file into a stereo frame, normalising integer PCM to
/// `[-1.0, 1.0]`.
pub fn read_stereo(path: &Path, policy: ChannelPolicy) -> AppResult<StereoFrame> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 / max))
                .collect::<Result<_, _>>()?
        }
    };

    tracing::debug!(
        path = %path.display(),
        channels = spec.channels,
        sample_rate = spec.sample_rate,
        bits = spec.bits_per_sample,
        "decoded wav"
    );

    Ok(StereoFrame::from_interleaved(
        &samples,
        usize::from(spec.channels),
        spec.sample_rate,
        policy,
    )?)
}

/// Writes a mono stem.
pub fn write_mono(path: &Path, buffer: &AudioBuffer, encoding: Encoding) -> AppResult<()> {
    let (bits_per_sample, sample_format) = match encoding {
        Encoding::Pcm16 => (16, SampleFormat::Int),
        Encoding::Float32 => (32, SampleFormat::Float),
    };
    let spec = WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate(),
        bits_per_sample,
        sample_format,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for &sample in buffer.samples() {
        match encoding {
            Encoding::Pcm16 => {
                let clamped = sample.clamp(-1.0, 1.0);
                writer.write_sample((clamped * 32_767.0) as i16)?;
            }
            Encoding::Float32 => writer.write_sample(sample)?,
        }
    }
    writer.finalize()?;
    Ok(())
}

/// Paths of the stems written for one input.
#[derive(Debug, Clone, Default)]
pub struct StemPaths {
    pub instrumental: Option<PathBuf>,
    pub vocal: Option<PathBuf>,
}

/// Writes `<stem>_instrumental.wav` and `<stem>_vocals.wav` into `dir`,
/// skipping whichever stems are not requested.
pub fn write_stems(
    dir: &Path,
    base_name: &str,
    result: &SeparationResult,
    stems: (bool, bool),
    encoding: Encoding,
) -> AppResult<StemPaths> {
    std::fs::create_dir_all(dir)?;
    let (instrumental, vocal) = stems;
    let mut paths = StemPaths::default();

    if instrumental {
        let path = dir.join(format!("{base_name}_instrumental.wav"));
        write_mono(&path, &result.instrumental, encoding)?;
        paths.instrumental = Some(path);
    }
    if vocal {
        let path = dir.join(format!("{base_name}_vocals.wav"));
        write_mono(&path, &result.vocal, encoding)?;
        paths.vocal = Some(path);
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_stereo_pcm(path: &Path, frames: &[(i16, i16)], sample_rate: u32) {
        let spec = WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for (l, r) in frames {
            writer.write_sample(*l).unwrap();
            writer.write_sample(*r).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn reads_interleaved_pcm() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.wav");
        write_stereo_pcm(&path, &[(16_384, -16_384), (0, 8_192)], 22_050);

        let frame = read_stereo(&path, ChannelPolicy::Strict).unwrap();
        assert_eq!(frame.sample_rate(), 22_050);
        assert_eq!(frame.left().samples(), &[0.5, 0.0]);
        assert_eq!(frame.right().samples(), &[-0.5, 0.25]);
    }

    #[test]
    fn rejects_mono_without_upmix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0.25f32).unwrap();
        writer.finalize().unwrap();

        let err = read_stereo(&path, ChannelPolicy::Strict).unwrap_err();
        assert!(matches!(
            err,
            AppError::Engine(DevoxError::UnsupportedChannelLayout { channels: 1 })
        ));
        let frame = read_stereo(&path, ChannelPolicy::UpmixMono).unwrap();
        assert_eq!(frame.left(), frame.right());
    }

    #[test]
    fn writes_requested_stems_only() {
        let dir = tempfile::tempdir().unwrap();
        let result = SeparationResult {
            instrumental: AudioBuffer::new(vec![0.5, -0.5], 8_000),
            vocal: AudioBuffer::new(vec![0.0, 0.0], 8_000),
        };

        let paths = write_stems(dir.path(), "song", &result, (true, false), Encoding::Float32)
            .unwrap();
        assert!(paths.vocal.is_none());
        let written = paths.instrumental.unwrap();
        assert!(written.ends_with("song_instrumental.wav"));

        let reader = WavReader::open(&written).unwrap();
        assert_eq!(reader.spec().channels, 1);
        let samples: Vec<f32> = reader.into_samples::<f32>().map(Result::unwrap).collect();
        assert_eq!(samples, vec![0.5, -0.5]);
    }
}
