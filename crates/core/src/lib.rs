//! Core library for the Vibe Visualiser application.
//!
//! Everything between the microphone and the pixels lives here. Each module
//! owns one stage of the per-tick pipeline (capture lifecycle, spectral
//! analysis, the mood engine, the particle field and the style renderers)
//! and [`Visualizer`] drives them in order. The desktop shell in the app
//! crate only supplies a [`MicrophoneSource`] and a [`Surface`].

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod mood;
pub mod palette;
pub mod particles;
pub mod render;
pub mod timeline;
pub mod visualizer;

pub use analysis::{FeatureExtractor, FeatureFrame, SpectrumAnalyser, IDLE_LEVEL};
pub use audio::{
    CaptureController, CaptureEvent, CaptureState, CaptureStream, MicrophoneSource, SampleRing,
};
pub use config::{AppConfig, AudioConfig, BandBins, BandConfig, HzRange, VisualConfig, MAX_FFT_SIZE};
pub use error::{DeviceError, Result, VibeError};
pub use mood::{energy_of, MoodEngine, VisualState};
pub use palette::{ColorMode, Palette, PaletteColors, Rgba};
pub use particles::{Particle, ParticleField};
pub use render::{
    Affine, Blend, Brush, Compositor, Glow, Paint, PixmapSurface, Point, Scene, Shape, Size,
    Surface, VisualStyle,
};
pub use timeline::FrameClock;
pub use visualizer::Visualizer;
