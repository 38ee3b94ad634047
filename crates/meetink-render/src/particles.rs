//! Short-lived particle bursts shown when the eraser removes an item.

use kurbo::{Point, Vec2};
use meetink_core::items::SerializableColor as Rgba;
use meetink_core::scene::{NodeKind, SceneNode};

const BURST_COUNT: usize = 14;
const LIFETIME_MS: f64 = 600.0;
const MAX_SPEED: f64 = 0.25;
const DRAG: f64 = 0.995;
const RADIUS: f64 = 3.0;
const COLOR: Rgba = Rgba::new(120, 120, 120, 255);

/// Seeded random number generator (xorshift32).
#[derive(Debug, Clone)]
struct SimpleRng {
    state: u32,
}

impl SimpleRng {
    fn new(seed: u32) -> Self {
        Self { state: seed.max(1) }
    }

    fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Random float in range [0, 1]
    fn next_unit(&mut self) -> f64 {
        self.next_u32() as f64 / u32::MAX as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Particle {
    position: Point,
    /// World units per millisecond.
    velocity: Vec2,
    age_ms: f64,
    radius: f64,
}

impl Particle {
    fn life(&self) -> f64 {
        (1.0 - self.age_ms / LIFETIME_MS).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone)]
pub struct ParticleSystem {
    particles: Vec<Particle>,
    rng: SimpleRng,
}

impl Default for ParticleSystem {
    fn default() -> Self {
        Self::new(0x9e37_79b9)
    }
}

impl ParticleSystem {
    pub fn new(seed: u32) -> Self {
        Self {
            particles: Vec::new(),
            rng: SimpleRng::new(seed),
        }
    }

    /// Emit a ring of particles from `center`.
    pub fn burst(&mut self, center: Point) {
        for i in 0..BURST_COUNT {
            let base = i as f64 / BURST_COUNT as f64 * std::f64::consts::TAU;
            let angle = base + (self.rng.next_unit() - 0.5) * 0.6;
            let speed = MAX_SPEED * (0.4 + 0.6 * self.rng.next_unit());
            self.particles.push(Particle {
                position: center,
                velocity: Vec2::from_angle(angle) * speed,
                age_ms: 0.0,
                radius: RADIUS * (0.5 + 0.5 * self.rng.next_unit()),
            });
        }
    }

    /// Step the simulation. Returns `true` while anything is left to draw.
    pub fn advance(&mut self, dt_ms: f64) -> bool {
        let dt = dt_ms.max(0.0);
        let drag = DRAG.powf(dt);
        for p in &mut self.particles {
            p.position += p.velocity * dt;
            p.velocity *= drag;
            p.age_ms += dt;
        }
        self.particles.retain(|p| p.age_ms < LIFETIME_MS);
        !self.particles.is_empty()
    }

    pub fn nodes(&self) -> Vec<SceneNode> {
        self.particles
            .iter()
            .map(|p| {
                SceneNode::new(NodeKind::Circle {
                    center: p.position,
                    radius: p.radius,
                    fill: Some(COLOR),
                    stroke: None,
                })
                .with_opacity(p.life())
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }
}
