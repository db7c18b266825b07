use std::{f32::consts::PI, fmt, ops::Range, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};

use crate::{AudioConfig, BandBins, BandConfig, CaptureStream, DeviceError, Result};

/// Scalar level the idle frame reports for volume and bass, giving a resting
/// energy of 0.1.
pub const IDLE_LEVEL: f32 = 25.5;

/// Features for a single render tick. Recreated every tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureFrame {
    /// Byte-quantised dB magnitudes in ascending frequency order.
    pub magnitudes: Vec<u8>,
    /// Time-domain samples, 128 is silence.
    pub waveform: Vec<u8>,
    /// Mean of all magnitudes, `[0, 255]`.
    pub volume: f32,
    /// Mean of the bass band, `[0, 255]`.
    pub bass: f32,
    /// Mean of the treble band, `[0, 255]`.
    pub treble: f32,
}

impl FeatureFrame {
    /// Reduces raw analyser output to the scalar features.
    pub fn from_spectrum(magnitudes: Vec<u8>, waveform: Vec<u8>, bands: &BandBins) -> Self {
        let volume = band_mean(&magnitudes, 0..magnitudes.len());
        let bass = band_mean(&magnitudes, bands.bass.clone());
        let treble = band_mean(&magnitudes, bands.treble.clone());
        Self {
            magnitudes,
            waveform,
            volume,
            bass,
            treble,
        }
    }

    /// Synthetic low-energy frame fed to the mood engine while nothing is
    /// being captured.
    pub fn idle(bin_count: usize) -> Self {
        Self {
            magnitudes: vec![0; bin_count],
            waveform: vec![128; bin_count],
            volume: IDLE_LEVEL,
            bass: IDLE_LEVEL,
            treble: 0.0,
        }
    }
}

fn band_mean(values: &[u8], range: Range<usize>) -> f32 {
    let end = range.end.min(values.len());
    let start = range.start.min(end);
    let band = &values[start..end];
    if band.is_empty() {
        return 0.0;
    }
    let sum: u32 = band.iter().map(|&v| v as u32).sum();
    sum as f32 / band.len() as f32
}

/// Analyser-node style spectrum reduction: Blackman window, real FFT,
/// exponential smoothing across calls, dB conversion and byte quantisation.
pub struct SpectrumAnalyser {
    fft_size: usize,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    fft: FftResources,
}

impl SpectrumAnalyser {
    pub fn new(config: &AudioConfig) -> Self {
        let fft_size = config.fft_size;
        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(fft_size);
        Self {
            fft_size,
            smoothing: config.smoothing,
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels,
            window: (0..fft_size).map(|i| blackman_value(i, fft_size)).collect(),
            smoothed: vec![0.0; fft_size / 2],
            fft: FftResources {
                scratch: plan.make_scratch_vec(),
                spectrum: plan.make_output_vec(),
                input: plan.make_input_vec(),
                plan,
            },
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of frequency bins produced per call.
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Forgets the smoothing history.
    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|value| *value = 0.0);
    }

    /// Analyses the latest `fft_size` samples and returns byte magnitudes and
    /// byte waveform, both `bin_count` long.
    pub fn process(&mut self, samples: &[f32]) -> Result<(Vec<u8>, Vec<u8>)> {
        let n = self.fft_size;
        let offset = samples.len().saturating_sub(n);
        let recent = &samples[offset..];

        // Left-pad with silence when fewer samples are available.
        let pad = n - recent.len();
        for (index, slot) in self.fft.input.iter_mut().enumerate() {
            let sample = if index < pad { 0.0 } else { sanitize(recent[index - pad]) };
            *slot = sample * self.window[index];
        }

        self.fft.plan.process_with_scratch(
            &mut self.fft.input,
            &mut self.fft.spectrum,
            &mut self.fft.scratch,
        )?;

        let range = self.max_decibels - self.min_decibels;
        let magnitudes = self
            .smoothed
            .iter_mut()
            .zip(self.fft.spectrum.iter())
            .map(|(smoothed, bin)| {
                let magnitude = bin.norm() / n as f32;
                *smoothed = self.smoothing * *smoothed + (1.0 - self.smoothing) * magnitude;
                let db = 20.0 * smoothed.max(f32::MIN_POSITIVE).log10();
                quantize(255.0 * (db - self.min_decibels) / range)
            })
            .collect();

        let bins = self.bin_count();
        let waveform = (0..bins)
            .map(|index| {
                let position = index + n - bins;
                let sample = if position < pad {
                    0.0
                } else {
                    sanitize(recent[position - pad])
                };
                quantize(128.0 * (1.0 + sample))
            })
            .collect();

        Ok((magnitudes, waveform))
    }
}

impl fmt::Debug for SpectrumAnalyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumAnalyser")
            .field("fft_size", &self.fft_size)
            .field("smoothing", &self.smoothing)
            .field("min_decibels", &self.min_decibels)
            .field("max_decibels", &self.max_decibels)
            .finish()
    }
}

struct FftResources {
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

fn sanitize(sample: f32) -> f32 {
    if sample.is_finite() {
        sample.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

fn quantize(value: f32) -> u8 {
    if value.is_nan() {
        0
    } else {
        value.floor().clamp(0.0, 255.0) as u8
    }
}

fn blackman_value(index: usize, len: usize) -> f32 {
    const ALPHA: f32 = 0.16;
    let a0 = 0.5 * (1.0 - ALPHA);
    let a1 = 0.5;
    let a2 = 0.5 * ALPHA;
    let x = index as f32 / len as f32;
    a0 - a1 * (2.0 * PI * x).cos() + a2 * (4.0 * PI * x).cos()
}

/// Binds to a live capture stream and turns its most recent samples into a
/// [`FeatureFrame`] once per tick.
pub struct FeatureExtractor {
    analyser: SpectrumAnalyser,
    bands: BandConfig,
    bins: BandBins,
    samples: Vec<f32>,
    binding: Option<Box<dyn CaptureStream>>,
    last_frame: Option<FeatureFrame>,
}

impl FeatureExtractor {
    pub fn new(audio: &AudioConfig, bands: BandConfig) -> Self {
        let analyser = SpectrumAnalyser::new(audio);
        let bins = bands.resolve(audio.sample_rate, audio.fft_size);
        Self {
            samples: vec![0.0; analyser.fft_size()],
            analyser,
            bands,
            bins,
            binding: None,
            last_frame: None,
        }
    }

    /// Binds the extractor to a live stream. Band ranges are re-derived for
    /// the stream's sample rate.
    pub fn start(&mut self, stream: Box<dyn CaptureStream>) -> Result<()> {
        if self.binding.is_some() {
            return Err(DeviceError::AlreadyBound.into());
        }
        let sample_rate = stream.sample_rate();
        self.bins = self.bands.resolve(sample_rate, self.analyser.fft_size());
        self.analyser.reset();
        self.last_frame = None;
        self.binding = Some(stream);
        tracing::info!(sample_rate, bins = ?self.bins, "feature extractor bound");
        Ok(())
    }

    /// Releases the bound stream, if any.
    pub fn stop(&mut self) {
        if self.binding.take().is_some() {
            tracing::info!("feature extractor released");
        }
        self.last_frame = None;
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// Whether the bound stream has died underneath us.
    pub fn stream_ended(&self) -> bool {
        self.binding
            .as_ref()
            .map(|stream| !stream.is_live())
            .unwrap_or(false)
    }

    pub fn bins(&self) -> &BandBins {
        &self.bins
    }

    pub fn bin_count(&self) -> usize {
        self.analyser.bin_count()
    }

    /// Produces the frame for this tick without waiting on the capture side.
    /// Returns `None` when nothing is bound. When the capture buffer is busy
    /// the previous frame is repeated.
    pub fn analyze(&mut self) -> Option<FeatureFrame> {
        let stream = self.binding.as_ref()?;
        if !stream.read_latest(&mut self.samples) {
            return Some(
                self.last_frame
                    .clone()
                    .unwrap_or_else(|| FeatureFrame::idle(self.analyser.bin_count())),
            );
        }

        match self.analyser.process(&self.samples) {
            Ok((magnitudes, waveform)) => {
                let frame = FeatureFrame::from_spectrum(magnitudes, waveform, &self.bins);
                self.last_frame = Some(frame.clone());
                Some(frame)
            }
            Err(err) => {
                tracing::warn!(%err, "spectral analysis skipped");
                self.last_frame.clone()
            }
        }
    }
}

impl fmt::Debug for FeatureExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureExtractor")
            .field("analyser", &self.analyser)
            .field("bins", &self.bins)
            .field("bound", &self.binding.is_some())
            .finish()
    }
}
