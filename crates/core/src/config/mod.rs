use std::{ops::Range, path::Path};

use serde::{Deserialize, Serialize};

use crate::{ColorMode, Result, VibeError, VisualStyle};

/// Largest analysis window accepted by the spectrum analyser.
pub const MAX_FFT_SIZE: usize = 32_768;
const MIN_FFT_SIZE: usize = 32;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub bands: BandConfig,
    pub visual: VisualConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing sections fall back to their
    /// defaults; the result is validated before it is returned.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: AppConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.audio.validate()?;
        self.bands.validate(self.audio.sample_rate)?;
        self.visual.validate()
    }
}

/// Configuration specific to the audio subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Rate the capture device is asked for. The bound stream's actual rate
    /// wins when they differ.
    pub sample_rate: u32,
    pub fft_size: usize,
    /// Time smoothing applied to spectral magnitudes, in `[0, 1)`.
    pub smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            fft_size: 2048,
            smoothing: 0.85,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

impl AudioConfig {
    fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(invalid("audio.sample_rate must be positive"));
        }
        if !self.fft_size.is_power_of_two() || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&self.fft_size)
        {
            return Err(invalid(format!(
                "audio.fft_size must be a power of two in {MIN_FFT_SIZE}..={MAX_FFT_SIZE}, got {}",
                self.fft_size
            )));
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return Err(invalid("audio.smoothing must be in [0, 1)"));
        }
        if !(self.min_decibels < self.max_decibels) {
            return Err(invalid("audio.min_decibels must be below audio.max_decibels"));
        }
        Ok(())
    }
}

/// A frequency range in hertz, half-open at the top.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HzRange {
    pub start_hz: f32,
    pub end_hz: f32,
}

impl HzRange {
    pub const fn new(start_hz: f32, end_hz: f32) -> Self {
        Self { start_hz, end_hz }
    }

    /// Converts the range to spectral bin indices for the given analysis
    /// parameters: `bin ≈ hz / (sample_rate / fft_size)`. The result is
    /// clipped to the `fft_size / 2` available bins.
    pub fn to_bins(self, sample_rate: u32, fft_size: usize) -> Range<usize> {
        let bin_count = fft_size / 2;
        let bin_hz = sample_rate.max(1) as f32 / fft_size.max(1) as f32;
        let to_bin = |hz: f32| ((hz.max(0.0) / bin_hz).round() as usize).min(bin_count);
        let start = to_bin(self.start_hz);
        let end = to_bin(self.end_hz).max(start);
        start..end
    }
}

/// Frequency bands the scalar features and the orb ring are computed over.
/// Stored in hertz so they survive a change of sample rate or window size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandConfig {
    pub bass: HzRange,
    pub treble: HzRange,
    /// Portion of the spectrum spread over one half of the orb ring.
    pub orb: HzRange,
}

impl Default for BandConfig {
    fn default() -> Self {
        // 44.1 kHz / 2048 gives ~21.53 Hz per bin: bass 0..12, treble 100..200,
        // orb 0..100.
        Self {
            bass: HzRange::new(0.0, 258.4),
            treble: HzRange::new(2153.3, 4306.6),
            orb: HzRange::new(0.0, 2153.3),
        }
    }
}

impl BandConfig {
    fn validate(&self, sample_rate: u32) -> Result<()> {
        let nyquist = sample_rate as f32 / 2.0;
        for (name, range) in [("bass", self.bass), ("treble", self.treble), ("orb", self.orb)] {
            if !(range.start_hz >= 0.0 && range.start_hz < range.end_hz) {
                return Err(invalid(format!("bands.{name} must be a non-empty range")));
            }
            if range.end_hz > nyquist {
                return Err(invalid(format!(
                    "bands.{name} ends at {} Hz, above the {nyquist} Hz Nyquist limit",
                    range.end_hz
                )));
            }
        }
        Ok(())
    }

    /// Resolves the bands to bin ranges for a concrete stream.
    pub fn resolve(&self, sample_rate: u32, fft_size: usize) -> BandBins {
        BandBins {
            bass: self.bass.to_bins(sample_rate, fft_size),
            treble: self.treble.to_bins(sample_rate, fft_size),
            orb_span: self.orb.to_bins(sample_rate, fft_size).len(),
        }
    }
}

/// Band ranges expressed as spectral bin indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandBins {
    pub bass: Range<usize>,
    pub treble: Range<usize>,
    pub orb_span: usize,
}

/// Startup values for the configuration surface and the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualConfig {
    pub style: VisualStyle,
    pub color_mode: ColorMode,
    pub particle_capacity: usize,
    pub width: u32,
    pub height: u32,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            style: VisualStyle::Orb,
            color_mode: ColorMode::Auto,
            particle_capacity: 80,
            width: 1280,
            height: 720,
        }
    }
}

impl VisualConfig {
    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(invalid("visual.width and visual.height must be positive"));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> VibeError {
    VibeError::InvalidConfig(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Palette;

    #[test]
    fn default_bands_match_reference_bins() {
        let bins = BandConfig::default().resolve(44_100, 2048);
        assert_eq!(bins.bass, 0..12);
        assert_eq!(bins.treble, 100..200);
        assert_eq!(bins.orb_span, 100);
    }

    #[test]
    fn bands_are_rederived_for_other_rates() {
        let bins = BandConfig::default().resolve(48_000, 2048);
        // 48 kHz / 2048 = 23.4375 Hz per bin.
        assert_eq!(bins.bass, 0..11);
        assert_eq!(bins.treble, 92..184);

        let wide = BandConfig::default().resolve(44_100, 4096);
        assert_eq!(wide.bass, 0..24);
        assert_eq!(wide.treble, 200..400);
    }

    #[test]
    fn bins_are_clipped_to_available_spectrum() {
        let range = HzRange::new(10_000.0, 30_000.0).to_bins(44_100, 64);
        assert_eq!(range.end, 32);
        assert!(range.start <= range.end);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config = AppConfig::from_json(
            r#"{ "visual": { "style": "spiral", "color_mode": "fire" } }"#,
        )
        .unwrap();
        assert_eq!(config.visual.style, VisualStyle::Spiral);
        assert_eq!(config.visual.color_mode, ColorMode::Fixed(Palette::Fire));
        assert_eq!(config.audio, AudioConfig::default());
        assert_eq!(config.visual.particle_capacity, 80);
    }

    #[test]
    fn rejects_non_power_of_two_window() {
        let err = AppConfig::from_json(r#"{ "audio": { "fft_size": 1000 } }"#).unwrap_err();
        assert!(matches!(err, VibeError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_band_above_nyquist() {
        let mut config = AppConfig::default();
        config.audio.sample_rate = 8_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = AppConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, VibeError::Json(_)));
    }
}
