//! End-to-end session scenarios driven through `tick`

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use twin_tether::Settings;
use twin_tether::consts::*;
use twin_tether::renderer::{DrawCmd, DrawList, SpriteRegistry};
use twin_tether::sim::{AttackState, GameEvent, GameState, SessionPhase, TickInput, WavePhase, tick};
use twin_tether::stage::StagePack;

const FRAME: f32 = 1.0 / 60.0;

/// One stage, two waves, each a single-column line of ten hp-3 enemies
const LINE_PACK: &str = r#"{
    "score": { "normal": 10, "attacker": 30, "stageClear": 500, "item": 20, "itemBonus": 50 },
    "monsters": [ { "id": "chick", "hp": 3 } ],
    "groups": [
        { "id": "line10", "monsterIds": ["chick", "chick", "chick", "chick", "chick",
                                         "chick", "chick", "chick", "chick", "chick"] }
    ],
    "waves": [
        { "id": "first", "label": "First",
          "spawns": [ { "delay": 0, "groupId": "line10", "moveSpeed": 1 } ] },
        { "id": "second", "label": "Second",
          "spawns": [ { "delay": 0, "groupId": "line10", "moveSpeed": 1 } ] }
    ],
    "stages": [ { "stageNo": 1, "waveIds": ["first", "second"] } ]
}"#;

fn session(pack: StagePack) -> GameState {
    let settings = Settings {
        seed: Some(2024),
        ..Settings::default()
    };
    GameState::new(pack, settings).unwrap()
}

fn run_until(
    state: &mut GameState,
    max_frames: usize,
    mut done: impl FnMut(&GameState) -> bool,
) -> usize {
    for frame in 0..max_frames {
        if done(state) {
            return frame;
        }
        tick(state, &TickInput::default(), FRAME);
    }
    panic!("condition not reached in {max_frames} frames");
}

fn place_players(state: &mut GameState, gap_in_diameters: f32) {
    let a = Vec2::new(50.0, 500.0);
    let b = a + Vec2::new(PLAYER_DIAMETER * (1.0 + gap_in_diameters), 0.0);
    let input = TickInput {
        pointer_a: Some(a),
        pointer_b: Some(b),
        pause: false,
    };
    tick(state, &input, FRAME);
}

#[test]
fn line_group_dies_to_one_triple_link_hit_and_wave_clears() {
    let mut state = session(StagePack::from_json_str(LINE_PACK).unwrap());
    state.power = 3;
    run_until(&mut state, 1000, |s| !s.groups.is_empty());
    state.drain_events();
    assert_eq!(state.effective_links(), 3);

    let now = state.time;
    let links = state.effective_links();
    let mut rng = Pcg32::seed_from_u64(1);
    let mut commands = Vec::new();
    for member in &mut state.groups[0].members {
        member.damage(links, now, &mut rng, &mut commands);
    }
    assert!(commands.is_empty());
    for member in &state.groups[0].members {
        assert_eq!(member.hp, 0);
        assert!(matches!(member.state, AttackState::Dying { .. }));
    }

    // Still animating: the wave holds
    for _ in 0..29 {
        tick(&mut state, &TickInput::default(), FRAME);
    }
    assert_eq!(state.waves.phase, WavePhase::ActiveWave);
    assert_eq!(state.renderable_enemy_count(), 10);

    for _ in 0..3 {
        tick(&mut state, &TickInput::default(), FRAME);
    }
    assert!(state.groups.is_empty());
    assert_eq!(state.waves.phase, WavePhase::InterWaveClear);
    let events = state.drain_events();
    assert!(events.contains(&GameEvent::WaveCleared("First".into())));
}

#[test]
fn link_count_follows_player_gap() {
    let mut state = session(StagePack::from_json_str(LINE_PACK).unwrap());
    state.power = 3;

    place_players(&mut state, 5.0);
    assert_eq!(state.effective_links(), 2);

    place_players(&mut state, 9.0);
    assert_eq!(state.distance_allowed_links(), 0);
    assert_eq!(state.effective_links(), 0);

    // A disabled link is drawn dashed
    let mut list = DrawList::default();
    state.draw(&mut list, &SpriteRegistry::default());
    assert!(
        list.commands()
            .iter()
            .any(|c| matches!(c, DrawCmd::Line { dashed: true, .. }))
    );
}

#[test]
fn wave_waits_for_its_spawn_before_clearing() {
    let mut state = session(StagePack::from_json_str(LINE_PACK).unwrap());
    run_until(&mut state, 1000, |s| s.waves.phase == WavePhase::ActiveWave);

    // The world is empty during the telegraph, yet the wave must hold
    let mut frames = 0;
    while state.groups.is_empty() {
        assert_eq!(state.waves.phase, WavePhase::ActiveWave);
        assert!(!state.waves.spawn_completed());
        tick(&mut state, &TickInput::default(), FRAME);
        frames += 1;
        assert!(frames < 1000);
    }
    assert!(state.waves.spawn_completed());
    assert_eq!(state.waves.phase, WavePhase::ActiveWave);
}

#[test]
fn restart_drops_pending_spawns() {
    let mut state = session(StagePack::from_json_str(LINE_PACK).unwrap());
    run_until(&mut state, 1000, |s| !s.waves.telegraphs().is_empty());
    let generation = state.waves.generation();

    state.restart().unwrap();
    assert!(state.waves.generation() > generation);
    assert_eq!(state.waves.pending_count(), 0);

    // Longer than the old telegraph, shorter than the new countdown
    for _ in 0..(3.0 / FRAME) as usize {
        tick(&mut state, &TickInput::default(), FRAME);
    }
    assert!(state.groups.is_empty());
    assert_eq!(state.waves.phase, WavePhase::Countdown);
}

#[test]
fn running_out_of_hearts_ends_the_session() {
    let mut state = session(StagePack::embedded().unwrap());
    state.drain_events();
    state.damage_player(HEARTS_MAX);
    assert_eq!(state.phase, SessionPhase::GameOver);
    let time = state.time;
    tick(&mut state, &TickInput::default(), FRAME);
    assert_eq!(state.time, time);
    assert!(
        state
            .drain_events()
            .iter()
            .any(|e| matches!(e, GameEvent::GameOver { score: 0 }))
    );
}

#[test]
fn clearing_the_last_stage_is_a_victory() {
    let mut state = session(StagePack::from_json_str(LINE_PACK).unwrap());
    state.drain_events();
    state.on_stage_clear().unwrap();
    assert_eq!(state.phase, SessionPhase::Victory);
    assert_eq!(state.score, 500);
    let events = state.drain_events();
    assert!(events.contains(&GameEvent::StageCleared(1)));
    assert!(events.contains(&GameEvent::Victory { score: 500 }));
}
