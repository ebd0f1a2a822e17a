//! Twin Tether headless driver
//!
//! Loads a stage pack, then runs the frame loop with a scripted pair of
//! pointers that chase the nearest enemy, logging the outcome.
//!
//! ```text
//! twin-tether [STAGE_PACK.json] [--settings FILE] [--seconds N]
//! ```

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use glam::Vec2;

use twin_tether::Settings;
use twin_tether::consts::*;
use twin_tether::renderer::{DrawList, SpriteRegistry};
use twin_tether::sim::{GameEvent, GameState, SessionPhase, TickInput, tick};
use twin_tether::stage::StagePack;

const FRAME_DT: f32 = 1.0 / 60.0;
const DEFAULT_SECONDS: f32 = 180.0;
/// Scripted pointer speed (px/s)
const POINTER_SPEED: f32 = 600.0;
/// Half the distance the scripted pointers keep across their target
const PINCER_HALF_WIDTH: f32 = 60.0;

/// Run a headless Twin Tether session with scripted input
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Stage pack JSON; the embedded pack when omitted
    pack: Option<PathBuf>,
    /// Settings JSON file
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Simulated seconds before the run stops
    #[arg(long, default_value_t = DEFAULT_SECONDS)]
    seconds: f32,
}

fn load_pack(path: Option<&Path>) -> Result<StagePack, String> {
    match path {
        None => StagePack::embedded().map_err(|e| e.to_string()),
        Some(path) => {
            let text =
                std::fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
            StagePack::from_json_str(&text).map_err(|e| e.to_string())
        }
    }
}

/// Move `from` toward `to` by at most `max_step`
fn approach(from: Vec2, to: Vec2, max_step: f32) -> Vec2 {
    let delta = to - from;
    if delta.length() <= max_step {
        to
    } else {
        from + delta.normalize() * max_step
    }
}

/// Pointer targets: straddle the nearest live enemy so the link cuts across it
fn scripted_input(state: &GameState) -> TickInput {
    let [a, b] = state.players;
    let mid = (a.pos + b.pos) * 0.5;
    let target = state
        .all_enemies()
        .filter(|e| e.is_alive() && state.bounds.contains(e.pos))
        .min_by(|x, y| x.pos.distance_squared(mid).total_cmp(&y.pos.distance_squared(mid)));

    let (to_a, to_b) = match target {
        Some(enemy) => {
            let across =
                Vec2::from_angle(enemy.heading + std::f32::consts::FRAC_PI_2) * PINCER_HALF_WIDTH;
            (enemy.pos + across, enemy.pos - across)
        }
        None => {
            let y = state.bounds.height() * 0.75;
            (
                Vec2::new(state.bounds.width() * 0.35, y),
                Vec2::new(state.bounds.width() * 0.65, y),
            )
        }
    };
    let step = POINTER_SPEED * FRAME_DT;
    TickInput {
        pointer_a: Some(approach(a.pos, to_a, step)),
        pointer_b: Some(approach(b.pos, to_b, step)),
        pause: false,
    }
}

fn log_event(event: &GameEvent) {
    match event {
        GameEvent::HeartsChanged(hearts) => log::info!("Hearts: {hearts}/{HEARTS_MAX}"),
        GameEvent::PowerChanged(power) => log::info!("Power: {power}/{POWER_MAX}"),
        GameEvent::ScoreChanged(score) => log::debug!("Score: {score}"),
        GameEvent::Countdown(label) => log::info!("Get ready: {label}"),
        GameEvent::WaveStarted(label) => log::info!("{label} incoming"),
        GameEvent::WaveCleared(label) => log::info!("{label} cleared"),
        GameEvent::StageStarted(number) => log::info!("Stage {number}"),
        GameEvent::StageCleared(number) => log::info!("Stage {number} cleared"),
        GameEvent::Victory { score } => log::info!("Victory! Final score {score}"),
        GameEvent::GameOver { score } => log::info!("Game over. Final score {score}"),
        GameEvent::Halted { phase, message } => log::error!("Halted in {phase}: {message}"),
    }
}

fn run(args: Args) -> Result<SessionPhase, String> {
    let pack = load_pack(args.pack.as_deref())?;
    let settings = match &args.settings {
        Some(path) => Settings::load(path).map_err(|e| format!("{}: {e}", path.display()))?,
        None => Settings::default(),
    };

    let asset_root = args
        .pack
        .as_deref()
        .and_then(Path::parent)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let sprites = SpriteRegistry::for_pack(&pack, |key| asset_root.join(key).exists());

    let mut state = GameState::new(pack, settings).map_err(|e| e.to_string())?;
    let mut list = DrawList::default();
    let frames = (args.seconds / FRAME_DT).ceil() as u64;
    log::info!("Running {frames} frames ({:.0}s)", args.seconds);

    for _ in 0..frames {
        if state.is_halted() {
            break;
        }
        let input = scripted_input(&state);
        if catch_unwind(AssertUnwindSafe(|| tick(&mut state, &input, FRAME_DT))).is_err() {
            log::error!("Simulation panicked, stopping the frame loop");
            return Ok(SessionPhase::Halted);
        }

        list.clear();
        state.draw(&mut list, &sprites);

        for event in state.drain_events() {
            log_event(&event);
        }
        if matches!(state.phase, SessionPhase::Victory | SessionPhase::GameOver) {
            break;
        }
    }

    log::info!(
        "Finished at {:.1}s: {:?}, score {}, hearts {}, {} draw commands in the last frame",
        state.time,
        state.phase,
        state.score,
        state.hearts,
        list.len()
    );
    Ok(state.phase)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Twin Tether (headless) starting...");

    let args = Args::parse();
    match run(args) {
        Ok(SessionPhase::Halted) => ExitCode::FAILURE,
        Ok(_) => ExitCode::SUCCESS,
        Err(message) => {
            log::error!("{message}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let args = Args::try_parse_from(["twin-tether"]).unwrap();
        assert!(args.pack.is_none());
        assert!(args.settings.is_none());
        assert_eq!(args.seconds, DEFAULT_SECONDS);
    }

    #[test]
    fn test_cli_pack_and_flags() {
        let args = Args::try_parse_from([
            "twin-tether",
            "packs/custom.json",
            "--settings",
            "settings.json",
            "--seconds",
            "12.5",
        ])
        .unwrap();
        assert_eq!(args.pack, Some(PathBuf::from("packs/custom.json")));
        assert_eq!(args.settings, Some(PathBuf::from("settings.json")));
        assert_eq!(args.seconds, 12.5);
    }

    #[test]
    fn test_cli_rejects_bad_seconds() {
        assert!(Args::try_parse_from(["twin-tether", "--seconds", "soon"]).is_err());
    }
}
