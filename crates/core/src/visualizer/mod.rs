use std::{sync::Arc, time::Duration};

use crate::{
    AppConfig, CaptureController, CaptureState, ColorMode, Compositor, FeatureExtractor,
    FeatureFrame, FrameClock, MicrophoneSource, MoodEngine, ParticleField, Surface, VisualState,
    VisualStyle,
};

/// Loop driver: owns every per-tick stage and runs them in order.
///
/// ```text
/// capture poll -> FeatureExtractor -> MoodEngine -> Compositor -> surface
/// ```
///
/// Style and colour mode changes are picked up on the next tick.
#[derive(Debug)]
pub struct Visualizer {
    capture: CaptureController,
    extractor: FeatureExtractor,
    mood: MoodEngine,
    compositor: Compositor,
    clock: FrameClock,
    style: VisualStyle,
    color_mode: ColorMode,
}

impl Visualizer {
    pub fn new(config: &AppConfig, source: Arc<dyn MicrophoneSource>) -> Self {
        Self::with_particles(config, source, ParticleField::new())
    }

    pub fn with_particles(
        config: &AppConfig,
        source: Arc<dyn MicrophoneSource>,
        particles: ParticleField,
    ) -> Self {
        Self {
            capture: CaptureController::new(source),
            extractor: FeatureExtractor::new(&config.audio, config.bands),
            mood: MoodEngine::new(),
            compositor: Compositor::with_particles(particles, config.visual.particle_capacity),
            clock: FrameClock::new(),
            style: config.visual.style,
            color_mode: config.visual.color_mode,
        }
    }

    /// Runs one frame and returns the mood it was painted with.
    pub fn tick<S: Surface + ?Sized>(&mut self, surface: &mut S, delta: Duration) -> VisualState {
        let now = self.clock.advance(delta);
        self.capture.poll(&mut self.extractor);

        let frame = self.extractor.analyze();
        let state = match &frame {
            Some(frame) => self.mood.update(frame, self.color_mode, now),
            None => {
                let idle = FeatureFrame::idle(self.extractor.bin_count());
                self.mood.update(&idle, self.color_mode, now)
            }
        };

        self.compositor.render(
            surface,
            frame.as_ref(),
            &state,
            self.style,
            self.extractor.bins().orb_span,
            now,
        );
        state
    }

    pub fn request_start(&mut self) {
        self.capture.request_start();
    }

    pub fn request_stop(&mut self) {
        self.capture.request_stop(&mut self.extractor);
    }

    /// Starts capture when idle or failed, stops it otherwise.
    pub fn toggle_capture(&mut self) {
        match self.capture.state() {
            CaptureState::Idle | CaptureState::Error(_) => self.request_start(),
            _ => self.request_stop(),
        }
    }

    pub fn capture_state(&self) -> &CaptureState {
        self.capture.state()
    }

    pub fn style(&self) -> VisualStyle {
        self.style
    }

    pub fn set_style(&mut self, style: VisualStyle) {
        if style != self.style {
            tracing::info!(from = %self.style, to = %style, "style changed");
            self.style = style;
        }
    }

    pub fn color_mode(&self) -> ColorMode {
        self.color_mode
    }

    pub fn set_color_mode(&mut self, mode: ColorMode) {
        if mode != self.color_mode {
            tracing::info!(from = %self.color_mode, to = %mode, "colour mode changed");
            self.color_mode = mode;
        }
    }

    pub fn state(&self) -> &VisualState {
        self.mood.state()
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }
}
