//! Model-free stereo stem separation.
//!
//! The engine turns a decoded [`StereoFrame`] into an instrumental and a vocal
//! [`AudioBuffer`] in three pure stages:
//!
//! 1. [`combiner`] derives mid (instrumental) and side (vocal) estimates.
//! 2. [`spectral`] lifts the vocal formant band of the side signal and
//!    attenuates everything around it.
//! 3. [`dynamics`] gates, applies makeup gain and limits both streams.
//!
//! Decoding and encoding belong to the caller. No state survives a job, so a
//! [`SeparationEngine`] can be shared freely across threads.

pub mod buffer;
pub mod combiner;
pub mod config;
pub mod dynamics;
pub mod engine;
pub mod error;
pub mod spectral;

pub use buffer::{AudioBuffer, ChannelPolicy, SeparationResult, StereoFrame};
pub use combiner::{combine, reconstruct, RawStems};
pub use config::{
    DynamicsConfig, LimiterMode, SeparationConfig, SeparationMode, SpectralEnhancementConfig,
};
pub use dynamics::DynamicsNormalizer;
pub use engine::{separate, SeparationEngine, SeparationReport, StemLevels};
pub use error::{DevoxError, Result, Stage};
pub use spectral::SpectralEnhancer;
