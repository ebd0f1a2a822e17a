//! Fixed-capacity dust particle pool
//!
//! Slots are allocated once; a free-index stack hands them out and takes
//! them back in O(1). A per-frame emission budget bounds the work any single
//! frame can queue up.

use glam::Vec2;
use rand::Rng;
use std::f32::consts::{PI, TAU};

use crate::consts::PARTICLE_EMIT_BUDGET;
use crate::from_angle;
use crate::renderer::{Color, DrawList, colors};

/// Particles never shrink below this radius
const MIN_PARTICLE_RADIUS: f32 = 0.8;
/// Velocity kept per second is roughly `1 - DRAG`
const DRAG: f32 = 2.2;
/// Random start offset along the launch direction (px)
const MAX_START_OFFSET: f32 = 6.0;

/// Shape of a dust burst
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurstParams {
    /// Launch speed (px/s), varied by +/-15%
    pub base_speed: f32,
    /// Total angular spread around a random base angle
    pub spread: f32,
    pub min_radius: f32,
    pub max_radius: f32,
    /// Lifetime (s), varied by -15%/+5%
    pub life: f32,
    pub color: Color,
}

impl Default for BurstParams {
    fn default() -> Self {
        Self {
            base_speed: 110.0,
            spread: PI,
            min_radius: 2.0,
            max_radius: 4.0,
            life: 0.26,
            color: colors::DUST,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
    pub base_radius: f32,
    pub age: f32,
    pub life: f32,
    pub alpha: f32,
    pub color: Color,
    pub alive: bool,
}

impl Particle {
    fn dead() -> Self {
        Self {
            pos: Vec2::ZERO,
            vel: Vec2::ZERO,
            radius: 0.0,
            base_radius: 0.0,
            age: 0.0,
            life: 0.0,
            alpha: 0.0,
            color: colors::DUST,
            alive: false,
        }
    }

    pub fn remaining(&self) -> f32 {
        self.life - self.age
    }
}

#[derive(Debug, Clone)]
pub struct ParticlePool {
    slots: Vec<Particle>,
    free: Vec<usize>,
    budget: usize,
}

impl ParticlePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![Particle::dead(); capacity],
            // Lowest index handed out first
            free: (0..capacity).rev().collect(),
            budget: PARTICLE_EMIT_BUDGET,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn alive_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn iter_alive(&self) -> impl Iterator<Item = &Particle> {
        self.slots.iter().filter(|p| p.alive)
    }

    /// Refill the per-frame emission budget
    pub fn begin_frame(&mut self) {
        self.budget = PARTICLE_EMIT_BUDGET;
    }

    /// Release every slot
    pub fn clear_all(&mut self) {
        for p in &mut self.slots {
            p.alive = false;
        }
        self.free = (0..self.slots.len()).rev().collect();
    }

    /// Live slot closest to expiry
    fn reclaim(&self) -> Option<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, p)| p.alive)
            .min_by(|(_, a), (_, b)| a.remaining().total_cmp(&b.remaining()))
            .map(|(i, _)| i)
    }

    /// Emit up to `count` particles around `origin`.
    ///
    /// The first particle is always granted, reclaiming a live slot when the
    /// pool is full; the rest stop once the frame budget runs out. Returns
    /// how many were emitted.
    pub fn emit_burst(
        &mut self,
        origin: Vec2,
        count: usize,
        params: &BurstParams,
        rng: &mut impl Rng,
    ) -> usize {
        let base_angle = rng.random_range(0.0..TAU);
        let mut emitted = 0;
        for i in 0..count {
            if i > 0 && self.budget == 0 {
                break;
            }
            let Some(idx) = self.free.pop().or_else(|| self.reclaim()) else {
                break; // zero capacity
            };

            let angle = base_angle + (rng.random::<f32>() - 0.5) * params.spread;
            let speed = params.base_speed * rng.random_range(0.85..1.15);
            let offset = rng.random_range(0.0..MAX_START_OFFSET);
            let radius = if params.max_radius > params.min_radius {
                rng.random_range(params.min_radius..params.max_radius)
            } else {
                params.min_radius
            };
            self.slots[idx] = Particle {
                pos: origin + from_angle(angle, offset),
                vel: from_angle(angle, speed),
                radius,
                base_radius: radius,
                age: 0.0,
                life: params.life * rng.random_range(0.85..1.05),
                alpha: 1.0,
                color: params.color,
                alive: true,
            };
            self.budget = self.budget.saturating_sub(1);
            emitted += 1;
        }
        emitted
    }

    /// Move, slow, fade and shrink; expired slots go back on the free stack
    pub fn update(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        let drag = (1.0 - DRAG * dt).max(0.0);
        for (i, p) in self.slots.iter_mut().enumerate() {
            if !p.alive {
                continue;
            }
            p.age += dt;
            if p.age >= p.life {
                p.alive = false;
                self.free.push(i);
                continue;
            }
            p.pos += p.vel * dt;
            p.vel *= drag;
            let t = p.age / p.life;
            p.alpha = 1.0 - t;
            p.radius = (p.base_radius * (1.0 - t)).max(MIN_PARTICLE_RADIUS);
        }
    }

    pub fn draw(&self, list: &mut DrawList) {
        for p in self.iter_alive() {
            list.circle(p.pos, p.radius, colors::with_alpha(p.color, p.alpha));
        }
    }
}
