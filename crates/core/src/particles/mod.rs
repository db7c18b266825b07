//! Ambient particle field drawn beneath every style.

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::render::{Brush, Paint, Point, Shape, Size, Surface};
use crate::Rgba;

const CALM_SPEED: f32 = 2.0;
const ENERGY_SPEED: f32 = 5.0;
const HIGH_SPEED: f32 = 12.0;
const ENERGY_GROWTH: f32 = 5.0;
/// Per-frame chance that the field picks up the current palette.
const RECOLOR_CHANCE: f32 = 0.1;
/// Share of particles repainted when it does.
const RECOLOR_SHARE: f32 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub position: Point,
    pub base_size: f32,
    pub size: f32,
    pub velocity: Point,
    pub color: Rgba,
    pub opacity: f32,
}

impl Particle {
    fn spawn(rng: &mut StdRng, bounds: Size, palette: &[Rgba; 3]) -> Self {
        let base_size = rng.random::<f32>() * 2.0 + 1.0;
        Self {
            position: Point::new(
                rng.random::<f32>() * bounds.width,
                rng.random::<f32>() * bounds.height,
            ),
            base_size,
            size: base_size,
            velocity: Point::new(
                (rng.random::<f32>() - 0.5) * 0.4,
                (rng.random::<f32>() - 0.5) * 0.4,
            ),
            color: palette[rng.random_range(0..palette.len())],
            opacity: rng.random::<f32>() * 0.5 + 0.2,
        }
    }
}

/// Bounded pool of drifting particles. The pool grows by one particle per
/// frame until it reaches capacity and wraps toroidally inside the surface.
#[derive(Debug)]
pub struct ParticleField {
    particles: Vec<Particle>,
    rng: StdRng,
}

impl Default for ParticleField {
    fn default() -> Self {
        Self::new()
    }
}

impl ParticleField {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Deterministic field for reproducible output.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            particles: Vec::new(),
            rng,
        }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Adds at most one particle if the pool is below `capacity`; shrinks the
    /// pool if capacity was lowered.
    pub fn ensure(&mut self, capacity: usize, bounds: Size, palette: &[Rgba; 3]) {
        if self.particles.len() > capacity {
            self.particles.truncate(capacity);
            return;
        }
        if self.particles.len() < capacity && !bounds.is_empty() {
            let particle = Particle::spawn(&mut self.rng, bounds, palette);
            self.particles.push(particle);
        }
    }

    /// With a small per-frame probability, repaints a random subset so the
    /// field drifts toward a newly selected palette.
    pub fn maybe_recolor(&mut self, palette: &[Rgba; 3]) -> bool {
        if self.rng.random::<f32>() >= RECOLOR_CHANCE {
            return false;
        }
        self.recolor(palette, RECOLOR_SHARE);
        true
    }

    /// Gives each particle a `share` chance of taking a random palette colour.
    pub fn recolor(&mut self, palette: &[Rgba; 3], share: f32) {
        for particle in &mut self.particles {
            if self.rng.random::<f32>() < share {
                particle.color = palette[self.rng.random_range(0..palette.len())];
            }
        }
    }

    pub fn tick(&mut self, bounds: Size, energy: f32, high_energy: bool) {
        let energy = if energy.is_finite() {
            energy.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let speed = if high_energy {
            HIGH_SPEED
        } else {
            CALM_SPEED + energy * ENERGY_SPEED
        };

        for particle in &mut self.particles {
            particle.position.x = wrap(
                particle.position.x + particle.velocity.x * speed,
                bounds.width,
            );
            particle.position.y = wrap(
                particle.position.y + particle.velocity.y * speed,
                bounds.height,
            );
            particle.size = particle.base_size + energy * ENERGY_GROWTH;
        }
    }

    pub fn draw<S: Surface + ?Sized>(&self, surface: &mut S) {
        for particle in &self.particles {
            surface.draw(
                &Shape::Circle {
                    center: particle.position,
                    radius: particle.size,
                },
                &Brush::fill(Paint::Solid(particle.color)).with_alpha(particle.opacity),
            );
        }
    }
}

/// Wraps `value` into `[0, extent)`.
fn wrap(value: f32, extent: f32) -> f32 {
    if extent.is_nan() || extent <= 0.0 || !value.is_finite() {
        return 0.0;
    }
    let wrapped = value.rem_euclid(extent);
    // rem_euclid can round up to `extent` for tiny negative inputs.
    if wrapped >= extent {
        0.0
    } else {
        wrapped
    }
}
