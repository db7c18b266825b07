mod geometry;
mod skia;
mod styles;

#[cfg(test)]
pub(crate) mod recording;

use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{FeatureFrame, PaletteColors, ParticleField, Rgba, VisualState};

pub use geometry::{Affine, Point, Size};
pub use skia::PixmapSurface;

/// Primitive understood by every [`Surface`]. Coordinates are absolute
/// surface pixels unless the variant carries its own transform.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Circle {
        center: Point,
        radius: f32,
    },
    Rect {
        origin: Point,
        width: f32,
        height: f32,
    },
    /// Rounded rectangle defined in local space and placed by `transform`.
    RoundRect {
        origin: Point,
        width: f32,
        height: f32,
        radius: f32,
        transform: Affine,
    },
    Ellipse {
        center: Point,
        radius_x: f32,
        radius_y: f32,
        /// Rotation about `center`, radians.
        rotation: f32,
    },
    Polyline(Vec<Point>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Solid(Rgba),
    Linear {
        start: Point,
        end: Point,
        stops: Vec<(f32, Rgba)>,
    },
    Radial {
        center: Point,
        radius: f32,
        stops: Vec<(f32, Rgba)>,
    },
}

/// Shadow-style halo drawn beneath a primitive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glow {
    pub blur: f32,
    pub color: Rgba,
}

/// How a shape is painted: fill or stroke, global alpha and optional glow.
#[derive(Debug, Clone, PartialEq)]
pub struct Brush {
    pub paint: Paint,
    /// Stroke width; `None` fills the shape.
    pub stroke: Option<f32>,
    pub alpha: f32,
    pub glow: Option<Glow>,
}

impl Brush {
    pub fn fill(paint: Paint) -> Self {
        Self {
            paint,
            stroke: None,
            alpha: 1.0,
            glow: None,
        }
    }

    pub fn stroke(paint: Paint, width: f32) -> Self {
        Self {
            stroke: Some(width),
            ..Self::fill(paint)
        }
    }

    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha.clamp(0.0, 1.0);
        self
    }

    pub fn with_glow(mut self, blur: f32, color: Rgba) -> Self {
        self.glow = Some(Glow { blur, color });
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Blend {
    #[default]
    Normal,
    /// Additive-style blending: overlapping colour brightens.
    Screen,
}

/// Resizable 2D drawing target.
pub trait Surface {
    fn size(&self) -> Size;

    fn clear(&mut self, color: Rgba);

    /// Compositing mode for subsequent draw calls.
    fn set_blend(&mut self, blend: Blend);

    fn draw(&mut self, shape: &Shape, brush: &Brush);
}

/// The four procedural drawing algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualStyle {
    #[default]
    Orb,
    Bars,
    Wave,
    Spiral,
}

impl VisualStyle {
    pub const ALL: [VisualStyle; 4] = [
        VisualStyle::Orb,
        VisualStyle::Bars,
        VisualStyle::Wave,
        VisualStyle::Spiral,
    ];

    pub fn name(self) -> &'static str {
        match self {
            VisualStyle::Orb => "orb",
            VisualStyle::Bars => "bars",
            VisualStyle::Wave => "wave",
            VisualStyle::Spiral => "spiral",
        }
    }

    pub fn next(self) -> Self {
        Self::ALL[(self as usize + 1) % Self::ALL.len()]
    }

    /// Paints one frame of this style.
    pub fn render<S: Surface + ?Sized>(self, surface: &mut S, scene: &Scene<'_>) {
        match self {
            VisualStyle::Orb => styles::draw_orb(surface, scene),
            VisualStyle::Bars => styles::draw_bars(surface, scene),
            VisualStyle::Wave => styles::draw_wave(surface, scene),
            VisualStyle::Spiral => styles::draw_spiral(surface, scene),
        }
    }
}

impl fmt::Display for VisualStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VisualStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VisualStyle::ALL
            .into_iter()
            .find(|style| style.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown style `{s}`"))
    }
}

/// Everything a style needs for one tick.
#[derive(Debug, Clone, Copy)]
pub struct Scene<'a> {
    pub frame: &'a FeatureFrame,
    pub state: &'a VisualState,
    pub colors: &'static PaletteColors,
    pub size: Size,
    /// Accumulated animation phase.
    pub phase: f32,
    /// Number of bins spread over half of the orb ring.
    pub orb_span: usize,
}

const PHASE_CALM: f32 = 0.02;
const PHASE_HIGH: f32 = 0.08;
const PHASE_ENERGY: f32 = 0.03;
const SWAP_PERIOD_MS: u128 = 500;
const VIGNETTE_BASE: f32 = 200.0;
const VIGNETTE_FLASH: f32 = 300.0;

/// Layers background, particles and the active style into one frame.
#[derive(Debug)]
pub struct Compositor {
    particles: ParticleField,
    particle_capacity: usize,
    phase: f32,
}

impl Compositor {
    pub fn new(particle_capacity: usize) -> Self {
        Self::with_particles(ParticleField::new(), particle_capacity)
    }

    /// Uses a caller-supplied field, e.g. a seeded one in tests.
    pub fn with_particles(particles: ParticleField, particle_capacity: usize) -> Self {
        Self {
            particles,
            particle_capacity,
            phase: 0.0,
        }
    }

    pub fn particles(&self) -> &ParticleField {
        &self.particles
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Paints one frame. Without a feature frame only the background and the
    /// particle field are drawn.
    pub fn render<S: Surface + ?Sized>(
        &mut self,
        surface: &mut S,
        frame: Option<&FeatureFrame>,
        state: &VisualState,
        style: VisualStyle,
        orb_span: usize,
        elapsed: Duration,
    ) {
        let size = surface.size();
        let colors = state.palette.colors();

        surface.set_blend(Blend::Normal);
        paint_background(surface, size, colors, state, elapsed);
        if size.is_empty() {
            return;
        }

        let step = if state.is_high_energy {
            PHASE_HIGH
        } else {
            PHASE_CALM
        };
        self.phase += step + state.energy_level * PHASE_ENERGY;

        surface.set_blend(Blend::Screen);

        let primaries = colors.primaries();
        self.particles
            .ensure(self.particle_capacity, size, &primaries);
        self.particles.maybe_recolor(&primaries);
        self.particles
            .tick(size, state.energy_level, state.is_high_energy);
        self.particles.draw(surface);

        if let Some(frame) = frame {
            let scene = Scene {
                frame,
                state,
                colors,
                size,
                phase: self.phase,
                orb_span,
            };
            style.render(surface, &scene);
        }

        surface.set_blend(Blend::Normal);
    }
}

/// Rotating gradient with strobe brightening and an edge vignette.
fn paint_background<S: Surface + ?Sized>(
    surface: &mut S,
    size: Size,
    colors: &PaletteColors,
    state: &VisualState,
    elapsed: Duration,
) {
    surface.clear(Rgba::BLACK);
    if size.is_empty() {
        return;
    }

    let swap = state.is_high_energy && (elapsed.as_millis() / SWAP_PERIOD_MS) % 2 == 0;
    let (first, second) = if swap {
        (colors.bg_end, colors.bg_start)
    } else {
        (colors.bg_start, colors.bg_end)
    };
    let boost = 1.0 + state.flash_intensity * 0.5;

    let (start, end) = gradient_line(size, state.background_rotation_deg);
    surface.draw(
        &Shape::Rect {
            origin: Point::default(),
            width: size.width,
            height: size.height,
        },
        &Brush::fill(Paint::Linear {
            start,
            end,
            stops: vec![(0.0, first.brighten(boost)), (1.0, second.brighten(boost))],
        }),
    );

    let center = size.center();
    let radius = (size.width.hypot(size.height) / 2.0).max(1.0);
    let spread = VIGNETTE_BASE + state.flash_intensity * VIGNETTE_FLASH;
    let clear_until = (1.0 - spread / radius).clamp(0.0, 0.99);
    surface.draw(
        &Shape::Rect {
            origin: Point::default(),
            width: size.width,
            height: size.height,
        },
        &Brush::fill(Paint::Radial {
            center,
            radius,
            stops: vec![
                (clear_until, Rgba::TRANSPARENT),
                (1.0, Rgba::BLACK.with_opacity(0.8)),
            ],
        }),
    );
}

/// End points of a CSS-style angled gradient: 0° runs bottom to top and the
/// angle turns clockwise; the line is long enough to reach every corner.
fn gradient_line(size: Size, angle_deg: f32) -> (Point, Point) {
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let half = (size.width * sin.abs() + size.height * cos.abs()) / 2.0;
    let center = size.center();
    let (dx, dy) = (sin * half, -cos * half);
    (
        Point::new(center.x - dx, center.y - dy),
        Point::new(center.x + dx, center.y + dy),
    )
}
