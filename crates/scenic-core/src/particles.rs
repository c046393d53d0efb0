//! # Particle simulator
//!
//! Bounded, ephemeral particle state owned by a `Particles` holder node for
//! the lifetime of one simulation session. Particles are regenerable from
//! emitter descriptors plus elapsed time and are never serialized into the
//! document.
//!
//! Entropy is a caller-supplied [`rand::Rng`] so deterministic replay can
//! inject a seeded generator without changing the algorithm.

use rand::Rng;
use scenic_schema::{EmitterDef, Range};

/// Overall per-holder cap when no emitter specifies one.
pub const DEFAULT_MAX_PARTICLES: usize = 200;

/// One live particle, in the holder node's local space.
#[derive(Debug, Clone)]
pub struct Particle {
    pub x: f64,
    pub y: f64,
    /// Velocity, units per second.
    pub vx: f64,
    pub vy: f64,
    /// Milliseconds lived so far.
    pub age: f64,
    /// Milliseconds to live.
    pub lifetime: f64,
    pub size: f64,
    pub color: String,
}

/// Advances one holder's particle set by `dt_ms`.
///
/// Ages and advects every existing particle, applies the first emitter's
/// scalar gravity to vertical velocity, culls the expired, spawns
/// `floor(rate * dt / 1000)` per emitter, then enforces the cap by evicting
/// the oldest surplus particles (FIFO, oldest-first).
pub fn step<R: Rng + ?Sized>(
    particles: &mut Vec<Particle>,
    emitters: &[EmitterDef],
    dt_ms: f64,
    rng: &mut R,
) {
    let dt_s = dt_ms / 1000.0;
    let gravity = emitters.first().map_or(0.0, |e| e.gravity);

    for p in particles.iter_mut() {
        p.age += dt_ms;
        p.x += p.vx * dt_s;
        p.y += p.vy * dt_s;
        p.vy += gravity * dt_s;
    }
    particles.retain(|p| p.age < p.lifetime);

    for emitter in emitters {
        let spawn_count = (emitter.rate * dt_ms / 1000.0).floor() as usize;
        for _ in 0..spawn_count {
            particles.push(spawn_one(emitter, rng));
        }
    }

    let cap = emitters
        .first()
        .and_then(|e| e.max_particles)
        .unwrap_or(DEFAULT_MAX_PARTICLES);
    if particles.len() > cap {
        let surplus = particles.len() - cap;
        particles.drain(0..surplus);
    }
}

fn spawn_one<R: Rng + ?Sized>(emitter: &EmitterDef, rng: &mut R) -> Particle {
    // Speed and direction are drawn per particle, not shared per tick.
    let speed = sample(rng, emitter.speed);
    let direction = sample(rng, emitter.direction).to_radians();
    Particle {
        x: emitter.x as f64,
        y: emitter.y as f64,
        vx: speed * direction.cos(),
        vy: speed * direction.sin(),
        age: 0.0,
        lifetime: sample(rng, emitter.lifetime_ms),
        size: sample(rng, emitter.size),
        color: emitter.color.clone().unwrap_or_else(|| "#ffffff".to_string()),
    }
}

fn sample<R: Rng + ?Sized>(rng: &mut R, range: Range) -> f64 {
    if range.max <= range.min {
        return range.min;
    }
    rng.gen_range(range.min..=range.max)
}
