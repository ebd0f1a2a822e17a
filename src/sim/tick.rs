//! Per-frame simulation step
//!
//! One call advances the whole world: update, resolve, schedule, clean up.
//! A failing phase halts the session instead of limping on.

use glam::Vec2;

use super::SimError;
use super::collision;
use super::state::{GameState, SessionPhase};
use crate::consts::MAX_FRAME_DT;

/// Input for a single frame
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Desired position of the first player marker (arena units)
    pub pointer_a: Option<Vec2>,
    /// Desired position of the second player marker
    pub pointer_b: Option<Vec2>,
    /// Pause toggle
    pub pause: bool,
}

/// Advance the game by `dt` seconds (clamped to [`MAX_FRAME_DT`])
pub fn tick(state: &mut GameState, input: &TickInput, dt: f32) {
    if state.is_halted() {
        return;
    }
    if input.pause {
        state.toggle_pause();
    }
    if state.phase != SessionPhase::Playing {
        return;
    }

    // NaN and non-positive steps are skipped
    if !(dt > 0.0) {
        return;
    }
    let dt = dt.min(MAX_FRAME_DT);

    if let Err((phase, err)) = run_phases(state, input, dt) {
        state.halt(phase, err);
    }
}

fn run_phases(
    state: &mut GameState,
    input: &TickInput,
    dt: f32,
) -> Result<(), (&'static str, SimError)> {
    state
        .update_world([input.pointer_a, input.pointer_b], dt)
        .map_err(|e| ("update", e))?;
    collision::resolve(state).map_err(|e| ("collision", e))?;
    if state.phase != SessionPhase::Playing {
        return Ok(());
    }
    state.advance_waves(dt).map_err(|e| ("waves", e))?;
    state.cleanup().map_err(|e| ("cleanup", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::*;
    use crate::settings::Settings;
    use crate::sim::state::GameEvent;
    use crate::sim::waves::WavePhase;
    use crate::stage::StagePack;

    fn state() -> GameState {
        let settings = Settings {
            seed: Some(8),
            ..Settings::default()
        };
        GameState::new(StagePack::embedded().unwrap(), settings).unwrap()
    }

    #[test]
    fn test_dt_is_clamped() {
        let mut state = state();
        tick(&mut state, &TickInput::default(), 1.0);
        assert!((state.time - MAX_FRAME_DT).abs() < 1e-6);
        tick(&mut state, &TickInput::default(), f32::NAN);
        tick(&mut state, &TickInput::default(), -1.0);
        assert!((state.time - MAX_FRAME_DT).abs() < 1e-6);
    }

    #[test]
    fn test_pause_freezes_clock_and_scheduler() {
        let mut state = state();
        tick(&mut state, &TickInput::default(), 0.016);
        let pause = TickInput {
            pause: true,
            ..Default::default()
        };
        tick(&mut state, &pause, 0.016);
        assert_eq!(state.phase, SessionPhase::Paused);
        let (time, stage_time) = (state.time, state.waves.stage_time);
        for _ in 0..600 {
            tick(&mut state, &TickInput::default(), 0.016);
        }
        assert_eq!(state.time, time);
        assert_eq!(state.waves.stage_time, stage_time);
        tick(&mut state, &pause, 0.016);
        assert_eq!(state.phase, SessionPhase::Playing);
        assert!(state.time > time);
    }

    #[test]
    fn test_pointers_are_clamped() {
        let mut state = state();
        let input = TickInput {
            pointer_a: Some(Vec2::new(-50.0, -50.0)),
            pointer_b: Some(Vec2::new(1e6, 300.0)),
            pause: false,
        };
        tick(&mut state, &input, 0.016);
        assert_eq!(state.players[0].pos, Vec2::new(PLAYER_RADIUS, PLAYER_RADIUS));
        assert_eq!(state.players[1].pos, Vec2::new(ARENA_WIDTH - PLAYER_RADIUS, 300.0));
    }

    #[test]
    fn test_first_wave_spawns_after_countdown_and_telegraph() {
        let mut state = state();
        let mut frames = 0;
        while state.groups.is_empty() && frames < 1000 {
            tick(&mut state, &TickInput::default(), 1.0 / 60.0);
            frames += 1;
        }
        assert_eq!(state.waves.phase, WavePhase::ActiveWave);
        let elapsed = frames as f32 / 60.0;
        assert!((elapsed - (COUNTDOWN_DURATION + SPAWN_TELEGRAPH_DURATION)).abs() < 0.1);
        assert_eq!(state.groups[0].members.len(), 10);
    }

    #[test]
    fn test_internal_error_halts() {
        let mut state = state();
        state.players[0].pos = Vec2::new(f32::NAN, 0.0);
        // Pointer input would clamp the NaN away; leave the marker alone
        tick(&mut state, &TickInput::default(), 0.016);
        assert!(state.is_halted());
        let events = state.drain_events();
        assert!(events.iter().any(|e| matches!(e, GameEvent::Halted { phase: "update", .. })));

        let time = state.time;
        tick(&mut state, &TickInput::default(), 0.016);
        assert_eq!(state.time, time);
    }
}
