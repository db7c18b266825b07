use std::f32::consts::TAU;

use super::{Affine, Brush, Paint, Point, Scene, Shape, Surface};
use crate::Rgba;

const ORB_BASE_RADIUS: f32 = 0.22;
const ORB_BASS_PULSE: f32 = 80.0;
const ORB_BARS: usize = 120;
const ORB_BAR_WIDTH: f32 = 5.0;
const ORB_BAR_CORNER: f32 = 3.0;
const ORB_BAR_GAP: f32 = 8.0;
const ORB_BAR_REACH: f32 = 0.35;
const ORB_DROP_BOOST: f32 = 1.8;
const ORB_SPIN: f32 = 0.15;
const ORB_WHITE_ABOVE: u8 = 230;
const ORB_GLOW_ABOVE: u8 = 150;

const EQ_BARS: usize = 64;
const EQ_SPACER: f32 = 4.0;
const EQ_HEIGHT: f32 = 0.8;
const EQ_GLOW_ABOVE: f32 = 0.7;

const WAVE_STEP: usize = 5;
const WAVE_AMPLITUDE: f32 = 100.0;
const WAVE_MIRROR_ALPHA: f32 = 0.3;

const SPIRAL_RINGS: usize = 18;
const SPIRAL_SPEED: f32 = 3.0;
const SPIRAL_REACH: f32 = 0.9;
const SPIRAL_DISTORTION: f32 = 0.5;

fn magnitude(scene: &Scene<'_>, bin: usize) -> u8 {
    scene.frame.magnitudes.get(bin).copied().unwrap_or(0)
}

fn unit(level: f32) -> f32 {
    if level.is_finite() {
        (level / 255.0).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Spectrum bin read by orb bar `index`. The second half of the ring mirrors
/// the first so the orb is symmetric.
pub(super) fn orb_bin(index: usize, span: usize) -> usize {
    let half = ORB_BARS / 2;
    let folded = if index < half {
        index
    } else {
        ORB_BARS - index
    };
    folded * span / half
}

pub(super) fn draw_orb<S: Surface + ?Sized>(surface: &mut S, scene: &Scene<'_>) {
    let Scene {
        state,
        colors,
        size,
        ..
    } = *scene;
    let center = size.center();
    let reach = size.min_side() * ORB_BAR_REACH;
    let radius = size.min_side() * ORB_BASE_RADIUS + unit(scene.frame.bass) * ORB_BASS_PULSE;

    surface.draw(
        &Shape::Circle { center, radius },
        &Brush::fill(Paint::Radial {
            center,
            radius,
            stops: vec![
                (0.0, colors.glow),
                (0.7, colors.core),
                (1.0, Rgba::TRANSPARENT),
            ],
        })
        .with_alpha(0.8 + state.energy_level * 0.2),
    );

    let spin = scene.phase * ORB_SPIN;
    let placement = Affine::translate(center.x, center.y);
    for index in 0..ORB_BARS {
        let value = magnitude(scene, orb_bin(index, scene.orb_span));
        let mut length = value as f32 / 255.0 * reach;
        if state.is_high_energy {
            length *= ORB_DROP_BOOST;
        }
        if length <= 0.0 {
            continue;
        }

        let color = if value > ORB_WHITE_ABOVE {
            Rgba::WHITE
        } else if index % 2 == 0 {
            colors.glow
        } else {
            colors.bars
        };
        let mut brush = Brush::fill(Paint::Solid(color));
        if value > ORB_GLOW_ABOVE {
            brush = brush.with_glow(20.0, color);
        }

        let angle = spin + index as f32 * TAU / ORB_BARS as f32;
        surface.draw(
            &Shape::RoundRect {
                origin: Point::new(radius + ORB_BAR_GAP, -ORB_BAR_WIDTH / 2.0),
                width: length,
                height: ORB_BAR_WIDTH,
                radius: ORB_BAR_CORNER,
                transform: Affine::rotate(angle).then(placement),
            },
            &brush,
        );
    }

    if state.is_high_energy {
        surface.draw(
            &Shape::Circle {
                center,
                radius: radius + reach + state.energy_level * 30.0,
            },
            &Brush::stroke(Paint::Solid(colors.glow), 2.0).with_alpha(0.6),
        );
    }
}

pub(super) fn draw_bars<S: Surface + ?Sized>(surface: &mut S, scene: &Scene<'_>) {
    let Scene { colors, size, .. } = *scene;
    let slot = size.width / EQ_BARS as f32;
    let width = (slot - EQ_SPACER * 2.0).max(1.0);

    for index in 0..EQ_BARS {
        let level = magnitude(scene, index * 2) as f32 / 255.0;
        let height = level * size.height * EQ_HEIGHT;
        if height <= 0.0 {
            continue;
        }
        let x = index as f32 * slot;
        let y = (size.height - height) / 2.0;

        let mut brush = Brush::fill(Paint::Linear {
            start: Point::new(x, y),
            end: Point::new(x, y + height),
            stops: vec![(0.0, colors.bars), (0.5, colors.glow), (1.0, colors.bars)],
        });
        if level > EQ_GLOW_ABOVE {
            brush = brush.with_glow(25.0, colors.glow);
        }
        surface.draw(
            &Shape::Rect {
                origin: Point::new(x + EQ_SPACER, y),
                width,
                height,
            },
            &brush,
        );
    }
}

pub(super) fn draw_wave<S: Surface + ?Sized>(surface: &mut S, scene: &Scene<'_>) {
    let Scene {
        state,
        colors,
        size,
        phase,
        ..
    } = *scene;
    let samples = &scene.frame.waveform;
    if samples.is_empty() {
        return;
    }

    let slice = size.width / samples.len() as f32;
    let amplitude = WAVE_AMPLITUDE * (1.0 + state.energy_level * 2.0);
    let points: Vec<Point> = samples
        .iter()
        .enumerate()
        .step_by(WAVE_STEP)
        .map(|(index, &sample)| {
            let v = sample as f32 / 128.0;
            let y = v * size.height / 2.0 + (index as f32 * 0.02 + phase).sin() * amplitude;
            Point::new(index as f32 * slice, y)
        })
        .collect();
    if points.len() < 2 {
        return;
    }

    let width = if state.is_high_energy { 8.0 } else { 4.0 };
    let brush = Brush::stroke(Paint::Solid(colors.glow), width).with_glow(20.0, colors.glow);
    let mirrored: Vec<Point> = points
        .iter()
        .map(|point| Point::new(point.x, size.height - point.y))
        .collect();

    surface.draw(&Shape::Polyline(points), &brush);
    surface.draw(
        &Shape::Polyline(mirrored),
        &brush.with_alpha(WAVE_MIRROR_ALPHA),
    );
}

pub(super) fn draw_spiral<S: Surface + ?Sized>(surface: &mut S, scene: &Scene<'_>) {
    let Scene {
        colors,
        size,
        phase,
        ..
    } = *scene;
    let center = size.center();
    let rings = SPIRAL_RINGS as f32;
    let bass = unit(scene.frame.bass);

    for index in 0..SPIRAL_RINGS {
        let z = (phase * SPIRAL_SPEED + index as f32).rem_euclid(rings);
        let depth = z / rings;
        // Cubic ease makes far rings bunch up near the centre.
        let scale = depth.powi(3) * size.max_side() * SPIRAL_REACH;
        if scale <= 0.0 {
            continue;
        }

        let distortion = if index % 3 == 0 {
            1.0 + bass * SPIRAL_DISTORTION
        } else {
            1.0
        };
        let (color, direction) = if index % 2 == 0 {
            (colors.glow, 1.0)
        } else {
            (colors.bars, -1.0)
        };

        surface.draw(
            &Shape::Ellipse {
                center,
                radius_x: scale * distortion,
                radius_y: scale,
                rotation: phase * direction,
            },
            &Brush::stroke(Paint::Solid(color), 3.0 + depth * 6.0).with_alpha(depth),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::super::recording::RecordingSurface;
    use super::super::{Size, VisualStyle};
    use super::*;
    use crate::{FeatureFrame, Palette, VisualState};

    fn frame_with(magnitudes: Vec<u8>, bass: f32) -> FeatureFrame {
        FeatureFrame {
            magnitudes,
            waveform: vec![128; 1024],
            volume: 100.0,
            bass,
            treble: 0.0,
        }
    }

    fn render(style: VisualStyle, frame: &FeatureFrame, state: &VisualState) -> RecordingSurface {
        let mut surface = RecordingSurface::new(1000.0, 800.0);
        let scene = Scene {
            frame,
            state,
            colors: state.palette.colors(),
            size: Size::new(1000.0, 800.0),
            phase: 0.0,
            orb_span: 100,
        };
        style.render(&mut surface, &scene);
        surface
    }

    #[test]
    fn orb_bins_mirror_around_the_ring() {
        assert_eq!(orb_bin(0, 100), 0);
        assert_eq!(orb_bin(30, 100), 50);
        assert_eq!(orb_bin(59, 100), 98);
        assert_eq!(orb_bin(60, 100), 100);
        for index in 1..60 {
            assert_eq!(orb_bin(index, 100), orb_bin(ORB_BARS - index, 100));
        }
    }

    #[test]
    fn orb_draws_core_bars_and_ring_when_high() {
        let frame = frame_with(vec![240; 1024], 255.0);
        let state = VisualState {
            is_high_energy: true,
            energy_level: 1.0,
            ..VisualState::default()
        };
        let draws = render(VisualStyle::Orb, &frame, &state).draws();

        // Core, 120 bars, outer ring.
        assert_eq!(draws.len(), 1 + ORB_BARS + 1);
        match &draws[0].0 {
            Shape::Circle { radius, .. } => assert!((radius - (800.0 * 0.22 + 80.0)).abs() < 1e-3),
            other => panic!("unexpected core {other:?}"),
        }
        // Loud bars turn white and glow.
        assert_eq!(draws[1].1.paint, Paint::Solid(Rgba::WHITE));
        assert!(draws[1].1.glow.is_some());
        assert!(draws.last().unwrap().1.stroke.is_some());
    }

    #[test]
    fn orb_skips_ring_when_calm_and_silent_bars() {
        let frame = frame_with(vec![0; 1024], 0.0);
        let draws = render(VisualStyle::Orb, &frame, &VisualState::default()).draws();
        assert_eq!(draws.len(), 1);
    }

    #[test]
    fn orb_bar_colours_alternate_below_white_threshold() {
        let frame = frame_with(vec![100; 1024], 0.0);
        let state = VisualState::default();
        let draws = render(VisualStyle::Orb, &frame, &state).draws();
        let colors = Palette::Neon.colors();
        assert_eq!(draws[1].1.paint, Paint::Solid(colors.glow));
        assert_eq!(draws[2].1.paint, Paint::Solid(colors.bars));
        assert!(draws[1].1.glow.is_none());
    }

    #[test]
    fn bars_sample_every_second_bin() {
        let mut magnitudes = vec![0u8; 1024];
        magnitudes[0] = 255;
        magnitudes[1] = 255;
        magnitudes[4] = 51;
        let frame = frame_with(magnitudes, 0.0);
        let draws = render(VisualStyle::Bars, &frame, &VisualState::default()).draws();

        assert_eq!(draws.len(), 2);
        match &draws[0].0 {
            Shape::Rect { height, origin, .. } => {
                assert!((height - 640.0).abs() < 1e-3);
                assert!((origin.y - 80.0).abs() < 1e-3);
            }
            other => panic!("unexpected shape {other:?}"),
        }
        assert!(draws[0].1.glow.is_some());
        assert!(draws[1].1.glow.is_none());
    }

    #[test]
    fn wave_mirror_is_dimmer_and_flipped() {
        let frame = frame_with(vec![0; 1024], 0.0);
        let draws = render(VisualStyle::Wave, &frame, &VisualState::default()).draws();
        assert_eq!(draws.len(), 2);

        let (Shape::Polyline(line), Shape::Polyline(mirror)) = (&draws[0].0, &draws[1].0) else {
            panic!("wave should draw polylines");
        };
        assert_eq!(line.len(), 1024 / WAVE_STEP + 1);
        assert!((line[3].y + mirror[3].y - 800.0).abs() < 1e-3);
        assert_eq!(draws[1].1.alpha, WAVE_MIRROR_ALPHA);
        assert_eq!(draws[0].1.stroke, Some(4.0));
    }

    #[test]
    fn spiral_distorts_every_third_ring_with_bass() {
        let frame = frame_with(vec![0; 1024], 255.0);
        let mut surface = RecordingSurface::new(1000.0, 800.0);
        let state = VisualState::default();
        let scene = Scene {
            frame: &frame,
            state: &state,
            colors: state.palette.colors(),
            size: Size::new(1000.0, 800.0),
            phase: 0.1,
            orb_span: 100,
        };
        draw_spiral(&mut surface, &scene);
        let draws = surface.draws();
        assert_eq!(draws.len(), SPIRAL_RINGS);

        for (index, (shape, brush, _)) in draws.iter().enumerate() {
            let Shape::Ellipse {
                radius_x, radius_y, ..
            } = shape
            else {
                panic!("spiral should draw ellipses");
            };
            if index % 3 == 0 {
                assert!((radius_x / radius_y - 1.5).abs() < 1e-3);
            } else {
                assert!((radius_x - radius_y).abs() < 1e-3);
            }
            assert!(brush.alpha > 0.0 && brush.alpha <= 1.0);
        }
    }

    #[test]
    fn empty_arrays_do_not_panic() {
        let frame = FeatureFrame::default();
        for style in VisualStyle::ALL {
            let draws = render(style, &frame, &VisualState::default()).draws();
            assert!(draws.len() <= 1, "{style} drew {} shapes", draws.len());
        }
    }
}
