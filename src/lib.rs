//! Twin Tether - two-finger arena survival game core
//!
//! Core modules:
//! - `sim`: Frame-driven simulation (formations, waves, collisions, particles)
//! - `stage`: Stage pack loading, schema validation and monster catalog
//! - `renderer`: Backend-agnostic draw list consumed by a host renderer
//! - `settings`: Session settings and quality presets

pub mod renderer;
pub mod settings;
pub mod sim;
pub mod stage;

pub use settings::{QualityPreset, Settings};

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    /// Largest time step a single frame may advance (prevents tunneling after stalls)
    pub const MAX_FRAME_DT: f32 = 0.033;

    /// Logical arena size (9:16 portrait)
    pub const ARENA_WIDTH: f32 = 540.0;
    pub const ARENA_HEIGHT: f32 = 960.0;

    /// Player markers: 8% of the short side
    pub const PLAYER_DIAMETER: f32 = 43.0;
    pub const PLAYER_RADIUS: f32 = PLAYER_DIAMETER / 2.0;
    /// Brief invulnerability after a player takes a hit
    pub const PLAYER_INVULNERABILITY: f32 = 0.5;
    pub const HIT_SHAKE_DURATION: f32 = 0.25;
    pub const HIT_SHAKE_MAGNITUDE: f32 = 6.0;

    pub const HEARTS_MAX: u32 = 5;
    pub const POWER_MAX: u32 = 3;

    /// Distance between parallel attack links (px)
    pub const LINK_SPACING: f32 = 10.0;

    /// Enemies: two thirds of the player radius
    pub const ENEMY_RADIUS: f32 = 14.0;
    /// Crosses the short side in ~3s
    pub const ENEMY_SPEED: f32 = 180.0;
    /// One damage application per contact: repeat damage is suppressed this long
    pub const ENEMY_INVULNERABILITY: f32 = 2.0;
    pub const HIT_FLASH_DURATION: f32 = 0.15;
    /// Attack telegraph window
    pub const PREPARE_DURATION: f32 = 1.0;
    pub const ATTACK_DURATION: f32 = 0.35;
    /// Shrink/fade animation before a defeated enemy is removed
    pub const DEATH_DURATION: f32 = 0.5;
    pub const BOSS_SPEED_FACTOR: f32 = 0.9;
    pub const MAX_AFTERIMAGES: usize = 4;

    /// Formation geometry, as multiples of the group's largest member radius
    pub const FORMATION_SPACING_FACTOR: f32 = 2.3;
    pub const FORMATION_SIDE_OFFSET_FACTOR: f32 = 2.2;
    /// Extra trail kept beyond the last slot
    pub const TRAIL_MARGIN: f32 = 200.0;
    /// Random heading perturbation on wall bounce (radians, +/-)
    pub const BOUNCE_JITTER: f32 = 0.5;

    /// Projectiles
    pub const MISSILE_SPEED: f32 = 360.0;
    pub const MISSILE_RADIUS: f32 = 5.0;
    pub const MISSILE_BOUNDS_MARGIN: f32 = 40.0;

    /// Pickups drift slowly, changing direction now and then
    pub const ITEM_RADIUS: f32 = 10.0;
    pub const ITEM_MIN_SPEED: f32 = 20.0;
    pub const ITEM_MAX_SPEED: f32 = 50.0;
    pub const ITEM_TURN_MIN: f32 = 0.5;
    pub const ITEM_TURN_MAX: f32 = 2.0;
    pub const ITEM_TURN_JITTER: f32 = 0.6;

    /// Wave scheduling
    pub const COUNTDOWN_DURATION: f32 = 5.0;
    pub const INTER_WAVE_DURATION: f32 = 1.5;
    pub const SPAWN_TELEGRAPH_DURATION: f32 = 2.0;
    pub const SPAWN_EDGE_OFFSET: f32 = 20.0;
    pub const BANNER_DURATION: f32 = 1.5;

    /// Kill score decays toward this fraction of its base value
    pub const SCORE_DECAY_FLOOR: f32 = 0.25;
    /// Time constant of the kill score decay (seconds)
    pub const SCORE_DECAY_SECONDS: f32 = 90.0;

    /// Particles
    pub const PARTICLE_EMIT_BUDGET: usize = 40;
    pub const DUST_BURST_COUNT: usize = 5;
}

/// Normalized angle to [-π, π)
#[inline]
pub fn wrap_angle(mut angle: f32) -> f32 {
    use std::f32::consts::PI;
    while angle >= PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Vector of the given length pointing along `angle`
#[inline]
pub fn from_angle(angle: f32, len: f32) -> Vec2 {
    Vec2::new(angle.cos() * len, angle.sin() * len)
}

/// Heading of a vector (radians)
#[inline]
pub fn angle_of(v: Vec2) -> f32 {
    v.y.atan2(v.x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_wrap_angle() {
        assert!((wrap_angle(2.5 * PI) - PI / 2.0).abs() < 1e-5);
        assert!((wrap_angle(-3.0 * PI / 2.0) - PI / 2.0).abs() < 1e-5);
        assert!((wrap_angle(0.25) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_from_angle_round_trip() {
        let v = from_angle(PI / 3.0, 10.0);
        assert!((v.length() - 10.0).abs() < 1e-4);
        assert!((angle_of(v) - PI / 3.0).abs() < 1e-5);
    }
}
