//! Collision detection and damage resolution
//!
//! Runs once per frame after everything has moved:
//!
//! 1. players vs missiles, mines, area pulses and live enemy bodies
//! 2. the attack link vs enemies
//! 3. players vs pickups (direct overlap only; the link never collects)
//!
//! The link between the two players carries up to three parallel strands.
//! How many are active depends on the power level and on the edge-to-edge
//! gap between the players, measured in player diameters:
//!
//! ```text
//! gap <= 4D  -> 3
//! gap <= 6D  -> 2
//! gap <= 8D  -> 1
//! gap >  8D  -> 0 (link disabled, drawn dashed)
//! ```

use glam::Vec2;

use super::SimError;
use super::enemy::DamageOutcome;
use super::geom::{circles_overlap, segment_point_distance};
use super::state::{GameState, SessionPhase};
use crate::consts::*;

/// Link count allowed by the gap between two player centres
pub fn distance_allowed_links(a: Vec2, b: Vec2) -> u32 {
    let gap = (a.distance(b) - PLAYER_DIAMETER).max(0.0) / PLAYER_DIAMETER;
    if gap <= 4.0 {
        3
    } else if gap <= 6.0 {
        2
    } else if gap <= 8.0 {
        1
    } else {
        0
    }
}

/// Strands that actually deal damage
pub fn effective_links(power: u32, a: Vec2, b: Vec2) -> u32 {
    power.min(distance_allowed_links(a, b))
}

/// Perpendicular offsets of the drawn strands
pub fn link_offsets(a: Vec2, b: Vec2, links: u32) -> Vec<Vec2> {
    let dir = b - a;
    if dir.length() < 1e-3 {
        return Vec::new();
    }
    let n = dir.normalize().perp();
    match links {
        0 => Vec::new(),
        1 => vec![Vec2::ZERO],
        2 => vec![n * (-LINK_SPACING / 2.0), n * (LINK_SPACING / 2.0)],
        _ => vec![n * -LINK_SPACING, Vec2::ZERO, n * LINK_SPACING],
    }
}

/// The link touches a circle when the circle's centre is within its radius
/// of the centre strand
#[inline]
pub fn link_touches(a: Vec2, b: Vec2, center: Vec2, radius: f32) -> bool {
    segment_point_distance(a, b, center) <= radius
}

/// Resolve this frame's contacts
pub fn resolve(state: &mut GameState) -> Result<(), SimError> {
    let now = state.time;
    let shake = state.settings.hit_shake_magnitude();
    let (a, b) = (state.players[0].pos, state.players[1].pos);
    if !a.is_finite() || !b.is_finite() {
        return Err(SimError::NonFinite {
            what: "link endpoint",
        });
    }

    // Players vs hazards
    let mut landed = 0;
    for player in &mut state.players {
        let (pos, radius) = (player.pos, player.radius);
        let mut touched = state
            .missiles
            .iter()
            .any(|m| circles_overlap(pos, radius, m.pos, m.radius));

        // A touched mine detonates whether or not the hit lands
        let mines = state.mines.len();
        state
            .mines
            .retain(|m| !circles_overlap(pos, radius, m.pos, m.radius));
        touched |= state.mines.len() != mines;

        touched |= state
            .hazards
            .iter()
            .any(|h| circles_overlap(pos, radius, h.pos, h.radius(now)));
        touched |= state
            .groups
            .iter()
            .flat_map(|g| g.members.iter())
            .chain(state.enemies.iter())
            .any(|e| e.is_alive() && circles_overlap(pos, radius, e.pos, e.radius));

        if touched && player.hit(now, shake) {
            landed += 1;
        }
    }
    state.damage_player(landed);
    if state.phase != SessionPhase::Playing {
        return Ok(());
    }

    // Link vs enemies
    let links = state.effective_links();
    if links > 0 {
        let mut struck = Vec::new();
        let mut kills = Vec::new();
        let enemies = state
            .groups
            .iter_mut()
            .flat_map(|g| g.members.iter_mut())
            .chain(state.enemies.iter_mut());
        for enemy in enemies {
            if !enemy.is_alive()
                || enemy.is_invulnerable(now)
                || !link_touches(a, b, enemy.pos, enemy.radius)
            {
                continue;
            }
            match enemy.damage(links, now, &mut state.rng, &mut state.commands) {
                DamageOutcome::Hit => struck.push(enemy.pos),
                DamageOutcome::Killed => {
                    struck.push(enemy.pos);
                    kills.push(enemy.score_class);
                }
                DamageOutcome::Ignored => {}
            }
        }
        for pos in struck {
            state.emit_dust(pos);
        }
        for class in kills {
            state.award_kill(class);
        }
        state.apply_commands();
    }

    // Pickups
    let players = state.players;
    let mut picked = Vec::new();
    state.items.retain(|item| {
        let touched = players
            .iter()
            .any(|p| circles_overlap(p.pos, p.radius, item.pos, ITEM_RADIUS));
        if touched {
            picked.push(item.kind);
        }
        !touched
    });
    for kind in picked {
        state.apply_item(kind);
    }

    Ok(())
}
