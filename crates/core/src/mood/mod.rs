use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ColorMode, FeatureFrame, Palette};

const VOLUME_WEIGHT: f32 = 0.3;
const BASS_WEIGHT: f32 = 0.7;
const HIGH_ENERGY_THRESHOLD: f32 = 0.6;
/// The run counter must exceed this many ticks for the high-energy flag.
const HIGH_ENERGY_RUN: u32 = 10;
/// Counter value while high. Entering the high state jumps here and leaving it
/// resets to zero, so each flip takes as many ticks as the opposite one.
const RUN_CEILING: u32 = 2 * HIGH_ENERGY_RUN + 1;
const KICK_THRESHOLD: f32 = 190.0;
const FLASH_DECAY: f32 = 0.85;
const FLASH_FLOOR: f32 = 0.01;
const ROTATION_BASE_DEG: f32 = 0.2;
const ROTATION_ENERGY_DEG: f32 = 2.0;
const CALM_ENERGY: f32 = 0.3;
const DROP_COOLDOWN: Duration = Duration::from_millis(3000);
const CALM_COOLDOWN: Duration = Duration::from_millis(6000);

/// Mood of the current tick, consumed read-only by the renderers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisualState {
    pub palette: Palette,
    pub energy_level: f32,
    pub is_high_energy: bool,
    pub flash_intensity: f32,
    pub background_rotation_deg: f32,
}

impl Default for VisualState {
    fn default() -> Self {
        Self {
            palette: Palette::Neon,
            energy_level: 0.1,
            is_high_energy: false,
            flash_intensity: 0.0,
            background_rotation_deg: 0.0,
        }
    }
}

/// Turns raw features into a stable, hysteretic mood.
///
/// All state carried between ticks lives here. Time is supplied by the
/// caller so the palette cooldowns can be driven deterministically.
#[derive(Debug, Clone, Default)]
pub struct MoodEngine {
    run_counter: u32,
    flash: f32,
    rotation_deg: f32,
    cycle_index: usize,
    last_change: Option<Duration>,
    state: VisualState,
}

impl MoodEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing state, e.g. when resuming a session.
    pub fn with_state(state: VisualState) -> Self {
        let run_counter = if state.is_high_energy {
            RUN_CEILING
        } else {
            0
        };
        Self {
            run_counter,
            flash: sanitize_unit(state.flash_intensity),
            rotation_deg: state.background_rotation_deg.rem_euclid(360.0),
            cycle_index: state.palette.index(),
            state,
            ..Self::default()
        }
    }

    pub fn state(&self) -> &VisualState {
        &self.state
    }

    pub fn run_counter(&self) -> u32 {
        self.run_counter
    }

    /// Advances the mood by one tick. `now` is the elapsed time of the frame
    /// clock and must be non-decreasing across calls.
    pub fn update(&mut self, frame: &FeatureFrame, mode: ColorMode, now: Duration) -> VisualState {
        let energy = energy_of(frame);

        let was_high = self.state.is_high_energy;
        if energy > HIGH_ENERGY_THRESHOLD {
            self.run_counter = (self.run_counter + 1).min(RUN_CEILING);
        } else {
            self.run_counter = self.run_counter.saturating_sub(1);
        }
        let is_high_energy = self.run_counter > HIGH_ENERGY_RUN;
        if is_high_energy && !was_high {
            self.run_counter = RUN_CEILING;
        } else if was_high && !is_high_energy {
            self.run_counter = 0;
        }

        if sanitize_level(frame.bass) > KICK_THRESHOLD {
            self.flash = 1.0;
        } else {
            self.flash *= FLASH_DECAY;
            if self.flash < FLASH_FLOOR {
                self.flash = 0.0;
            }
        }

        self.rotation_deg =
            (self.rotation_deg + ROTATION_BASE_DEG + energy * ROTATION_ENERGY_DEG).rem_euclid(360.0);

        let palette = match mode {
            ColorMode::Auto => self.select_palette(energy, is_high_energy, now),
            ColorMode::Fixed(palette) => palette,
        };

        self.state = VisualState {
            palette,
            energy_level: energy,
            is_high_energy,
            flash_intensity: self.flash,
            background_rotation_deg: self.rotation_deg,
        };
        self.state
    }

    fn select_palette(&mut self, energy: f32, is_high_energy: bool, now: Duration) -> Palette {
        let current = self.state.palette;
        let since_change = self
            .last_change
            .map(|last| now.saturating_sub(last))
            .unwrap_or(Duration::MAX);

        if is_high_energy {
            if since_change > DROP_COOLDOWN {
                self.cycle_index = (self.cycle_index + 1) % Palette::ALL.len();
                self.last_change = Some(now);
                let next = Palette::from_index(self.cycle_index);
                tracing::debug!(from = %current, to = %next, energy, "drop palette change");
                return next;
            }
        } else if energy < CALM_ENERGY && since_change > CALM_COOLDOWN && !current.is_calm() {
            self.last_change = Some(now);
            tracing::debug!(from = %current, energy, "cooling down to neon");
            return Palette::Neon;
        }
        current
    }
}

/// Normalised blend of loudness and bass. Malformed frames give 0.
pub fn energy_of(frame: &FeatureFrame) -> f32 {
    let blended =
        (sanitize_level(frame.volume) * VOLUME_WEIGHT + sanitize_level(frame.bass) * BASS_WEIGHT)
            / 255.0;
    sanitize_unit(blended)
}

fn sanitize_level(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 255.0)
    } else {
        0.0
    }
}

fn sanitize_unit(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(16);

    fn frame(volume: f32, bass: f32) -> FeatureFrame {
        FeatureFrame {
            magnitudes: vec![0; 1024],
            waveform: vec![128; 1024],
            volume,
            bass,
            treble: 0.0,
        }
    }

    /// Frame with the requested energy and no kick.
    fn energy_frame(energy: f32) -> FeatureFrame {
        let level = energy * 255.0;
        frame(level, level)
    }

    #[test]
    fn energy_blends_volume_and_bass() {
        let energy = energy_of(&frame(150.0, 200.0));
        assert!((energy - (150.0 * 0.3 + 200.0 * 0.7) / 255.0).abs() < 1e-6);
        assert_eq!(energy_of(&frame(f32::NAN, f32::INFINITY)), 0.0);
        assert_eq!(energy_of(&frame(-20.0, -1.0)), 0.0);
        assert_eq!(energy_of(&frame(9_999.0, 9_999.0)), 1.0);
    }

    #[test]
    fn high_energy_needs_eleven_consecutive_ticks() {
        let mut engine = MoodEngine::new();
        let loud = energy_frame(0.7);
        let mut now = Duration::ZERO;

        for tick in 1..=10 {
            now += TICK;
            let state = engine.update(&loud, ColorMode::Auto, now);
            assert!(!state.is_high_energy, "flipped early on tick {tick}");
        }
        now += TICK;
        assert!(engine.update(&loud, ColorMode::Auto, now).is_high_energy);
    }

    #[test]
    fn single_spike_does_not_flip_state() {
        let mut engine = MoodEngine::new();
        let mut now = Duration::ZERO;
        for i in 0..100 {
            now += TICK;
            let energy = if i % 2 == 0 { 0.9 } else { 0.1 };
            let state = engine.update(&energy_frame(energy), ColorMode::Auto, now);
            assert!(!state.is_high_energy);
        }
    }

    #[test]
    fn saturated_high_state_needs_eleven_quiet_ticks() {
        let mut engine = MoodEngine::new();
        let mut now = Duration::ZERO;
        for _ in 0..100 {
            now += TICK;
            engine.update(&energy_frame(0.9), ColorMode::Auto, now);
        }
        assert_eq!(engine.run_counter(), RUN_CEILING);

        let quiet = energy_frame(0.5);
        for tick in 1..=10 {
            now += TICK;
            let state = engine.update(&quiet, ColorMode::Auto, now);
            assert!(state.is_high_energy, "dropped early on tick {tick}");
        }
        now += TICK;
        assert!(!engine.update(&quiet, ColorMode::Auto, now).is_high_energy);
    }

    #[test]
    fn short_burst_still_needs_eleven_quiet_ticks() {
        let mut engine = MoodEngine::new();
        let loud = frame(180.0, 180.0);
        let mut now = Duration::ZERO;
        for _ in 0..12 {
            now += TICK;
            engine.update(&loud, ColorMode::Auto, now);
        }
        assert!(engine.state().is_high_energy);

        let quiet = energy_frame(0.5);
        for tick in 1..=10 {
            now += TICK;
            let state = engine.update(&quiet, ColorMode::Auto, now);
            assert!(state.is_high_energy, "dropped early on tick {tick}");
        }
        now += TICK;
        assert!(!engine.update(&quiet, ColorMode::Auto, now).is_high_energy);
        assert_eq!(engine.run_counter(), 0);
    }

    #[test]
    fn reentry_after_drop_needs_eleven_loud_ticks() {
        let mut engine = MoodEngine::new();
        let loud = energy_frame(0.9);
        let quiet = energy_frame(0.5);
        let mut now = Duration::ZERO;
        for _ in 0..100 {
            now += TICK;
            engine.update(&loud, ColorMode::Auto, now);
        }
        while engine.state().is_high_energy {
            now += TICK;
            engine.update(&quiet, ColorMode::Auto, now);
        }

        for tick in 1..=10 {
            now += TICK;
            let state = engine.update(&loud, ColorMode::Auto, now);
            assert!(!state.is_high_energy, "re-entered early on tick {tick}");
        }
        now += TICK;
        assert!(engine.update(&loud, ColorMode::Auto, now).is_high_energy);
    }

    #[test]
    fn flash_triggers_on_kick_and_decays_geometrically() {
        let mut engine = MoodEngine::new();
        let mut now = Duration::ZERO;
        now += TICK;
        assert_eq!(engine.update(&frame(0.0, 191.0), ColorMode::Auto, now).flash_intensity, 1.0);

        let quiet = frame(0.0, 0.0);
        let mut previous = 1.0_f32;
        let mut reached_zero = None;
        for n in 1..=40 {
            now += TICK;
            let flash = engine.update(&quiet, ColorMode::Auto, now).flash_intensity;
            assert!((0.0..=1.0).contains(&flash));
            assert!(flash <= previous);
            if flash > 0.0 {
                assert!((flash - 0.85_f32.powi(n)).abs() < 1e-4);
            } else if reached_zero.is_none() {
                reached_zero = Some(n);
            }
            previous = flash;
        }
        // 0.85^29 ≈ 0.0090 is the first value below the floor.
        assert_eq!(reached_zero, Some(29));
    }

    #[test]
    fn bass_at_threshold_is_not_a_kick() {
        let mut engine = MoodEngine::new();
        let state = engine.update(&frame(0.0, 190.0), ColorMode::Auto, TICK);
        assert_eq!(state.flash_intensity, 0.0);
    }

    #[test]
    fn rotation_advances_and_wraps() {
        let mut engine = MoodEngine::new();
        let mut now = Duration::ZERO;
        let mut previous = 0.0;
        for _ in 0..1_000 {
            now += TICK;
            let state = engine.update(&energy_frame(1.0), ColorMode::Auto, now);
            assert!((0.0..360.0).contains(&state.background_rotation_deg));
            previous = state.background_rotation_deg;
        }
        // 1000 ticks at 2.2 degrees each.
        assert!((previous - (2200.0_f32).rem_euclid(360.0)).abs() < 0.2);
    }

    #[test]
    fn explicit_mode_pins_palette_every_tick() {
        let mut engine = MoodEngine::new();
        let mut now = Duration::ZERO;
        for i in 0..500 {
            now += TICK;
            let energy = if (i / 50) % 2 == 0 { 0.95 } else { 0.0 };
            let state = engine.update(
                &energy_frame(energy),
                ColorMode::Fixed(Palette::Sunset),
                now,
            );
            assert_eq!(state.palette, Palette::Sunset);
        }
    }

    #[test]
    fn explicit_mode_does_not_consume_cooldown() {
        let mut engine = MoodEngine::new();
        let loud = frame(150.0, 200.0);
        let mut now = Duration::ZERO;
        for _ in 0..20 {
            now += TICK;
            engine.update(&loud, ColorMode::Fixed(Palette::Fire), now);
        }
        // Switching back to auto changes palette straight away: no cooldown
        // was started while pinned.
        now += TICK;
        let state = engine.update(&loud, ColorMode::Auto, now);
        assert_eq!(state.palette, Palette::Cyber);
    }

    #[test]
    fn drop_scenario_changes_palette_once_per_cooldown() {
        let mut engine = MoodEngine::new();
        let loud = frame(150.0, 200.0);
        let mut now = Duration::ZERO;
        let mut changes = Vec::new();
        let mut palette = engine.state().palette;

        for tick in 1..=12 {
            now += TICK;
            let state = engine.update(&loud, ColorMode::Auto, now);
            assert_eq!(state.flash_intensity, 1.0);
            assert_eq!(state.is_high_energy, tick >= 11);
            if state.palette != palette {
                changes.push((tick, state.palette));
                palette = state.palette;
            }
        }
        assert_eq!(changes, vec![(11, Palette::Cyber)]);

        // Keep the drop going: the next change waits out the 3 s cooldown.
        let first_change = Duration::from_millis(16 * 11);
        let mut change_times = Vec::new();
        while now < Duration::from_secs(10) {
            now += TICK;
            let state = engine.update(&loud, ColorMode::Auto, now);
            if state.palette != palette {
                change_times.push(now);
                palette = state.palette;
            }
        }
        let mut last = first_change;
        for at in &change_times {
            assert!(*at - last > DROP_COOLDOWN);
            last = *at;
        }
        assert_eq!(change_times.len(), 3);
    }

    #[test]
    fn quiet_scenario_cools_down_to_neon() {
        let mut engine = MoodEngine::new();
        let loud = frame(150.0, 200.0);
        let mut now = Duration::ZERO;
        // Sustained drops walk the cycle up to fire.
        while engine.state().palette != Palette::Fire {
            now += TICK;
            engine.update(&loud, ColorMode::Auto, now);
        }
        let changed_at = now;
        assert!(engine.state().is_high_energy);

        let silent = frame(0.0, 0.0);
        let mut neon_at = None;
        for tick in 1..=600 {
            now += TICK;
            let state = engine.update(&silent, ColorMode::Auto, now);
            if tick >= 11 {
                assert!(!state.is_high_energy, "still high on tick {tick}");
            }
            if tick >= 30 {
                assert_eq!(state.flash_intensity, 0.0);
            }
            if state.palette == Palette::Neon && neon_at.is_none() {
                neon_at = Some(now);
            }
        }

        let neon_at = neon_at.expect("quiet passage should return to neon");
        assert!(neon_at - changed_at > CALM_COOLDOWN);
        assert!(neon_at - changed_at <= CALM_COOLDOWN + TICK);
        assert_eq!(engine.state().palette, Palette::Neon);
    }

    #[test]
    fn calm_palettes_are_left_alone() {
        let mut engine = MoodEngine::with_state(VisualState {
            palette: Palette::Ocean,
            ..VisualState::default()
        });
        let mut now = Duration::ZERO;
        for _ in 0..1_000 {
            now += TICK;
            let state = engine.update(&frame(0.0, 0.0), ColorMode::Auto, now);
            assert_eq!(state.palette, Palette::Ocean);
        }
    }

    #[test]
    fn idle_frame_rests_energy_low() {
        let mut engine = MoodEngine::new();
        let idle = FeatureFrame::idle(1024);
        let mut now = Duration::ZERO;
        let mut state = VisualState::default();
        for _ in 0..50 {
            now += TICK;
            state = engine.update(&idle, ColorMode::Auto, now);
        }
        assert!((state.energy_level - 0.1).abs() < 1e-6);
        assert!(!state.is_high_energy);
        assert_eq!(state.flash_intensity, 0.0);
    }
}
