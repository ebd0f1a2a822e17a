//! Wave scheduler
//!
//! A stage becomes a queue of steps:
//!
//! ```text
//! Countdown(5s, label) ─▶ SpawnWave(id) ─▶ InterWaveClear(1.5s) ─▶ ... ─▶ Finished
//! ```
//!
//! `SpawnWave` turns each spawn event into a deferred task on the stage
//! clock. A due task shows a telegraph at a random arena edge, then asks the
//! orchestrator to build the group once the telegraph delay has passed. Every
//! task carries the generation it was scheduled under; `reset`/`start` bump
//! the generation so nothing scheduled for an old session can fire.

use std::collections::VecDeque;
use std::f32::consts::{FRAC_PI_2, PI};

use glam::Vec2;
use rand::Rng;

use super::SimError;
use super::geom::Bounds;
use crate::consts::*;
use crate::from_angle;
use crate::renderer::{DrawList, colors};
use crate::stage::{SpawnSpec, StagePack, StageSpec, WaveSpec};

/// Telegraph ring radius (px)
const TELEGRAPH_RADIUS: f32 = 18.0;
const TELEGRAPH_ARROW: f32 = 30.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Countdown { duration: f32, label: String },
    SpawnWave(WaveSpec),
    InterWaveClear(f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WavePhase {
    Idle,
    Countdown,
    ActiveWave,
    InterWaveClear,
    Finished,
}

/// Spawn warning shown at an arena edge
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Telegraph {
    pub pos: Vec2,
    pub heading: f32,
    pub expires_at: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PendingStage {
    /// Waiting for the spawn event's delay
    Scheduled,
    /// Telegraph shown; the group appears at `fire_at`
    Telegraphed { origin: Vec2, heading: f32 },
}

#[derive(Debug, Clone)]
struct PendingSpawn {
    generation: u64,
    fire_at: f32,
    spawn: SpawnSpec,
    stage: PendingStage,
}

/// Requests for the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub enum WaveSignal {
    CountdownStarted { label: String },
    WaveStarted { label: String },
    SpawnGroup {
        group_id: String,
        origin: Vec2,
        heading: f32,
        speed: f32,
    },
    WaveCleared { label: String },
    StageCleared,
}

#[derive(Debug, Clone)]
struct Banner {
    text: String,
    until: f32,
}

#[derive(Debug, Clone)]
pub struct WaveManager {
    /// Seconds since `start`; frozen while the session is paused
    pub stage_time: f32,
    pub phase: WavePhase,
    steps: VecDeque<Step>,
    phase_ends_at: f32,
    spawn_completed: bool,
    current: Option<WaveSpec>,
    pending: Vec<PendingSpawn>,
    generation: u64,
    telegraphs: Vec<Telegraph>,
    banner: Option<Banner>,
    stage_cleared: bool,
    bounds: Bounds,
}

impl WaveManager {
    pub fn new(bounds: Bounds) -> Self {
        Self {
            stage_time: 0.0,
            phase: WavePhase::Idle,
            steps: VecDeque::new(),
            phase_ends_at: 0.0,
            spawn_completed: false,
            current: None,
            pending: Vec::new(),
            generation: 0,
            telegraphs: Vec::new(),
            banner: None,
            stage_cleared: false,
            bounds,
        }
    }

    /// Drop all queued steps and cancel every deferred spawn
    pub fn reset(&mut self) {
        self.generation += 1;
        self.stage_time = 0.0;
        self.phase = WavePhase::Idle;
        self.steps.clear();
        self.phase_ends_at = 0.0;
        self.spawn_completed = false;
        self.current = None;
        self.pending.clear();
        self.telegraphs.clear();
        self.banner = None;
        self.stage_cleared = false;
    }

    /// Build the step queue for `stage` and enter its first step
    pub fn start(
        &mut self,
        stage: &StageSpec,
        pack: &StagePack,
        out: &mut Vec<WaveSignal>,
    ) -> Result<(), SimError> {
        self.reset();
        for wave_id in &stage.wave_ids {
            let wave = pack
                .waves
                .get(wave_id)
                .ok_or_else(|| SimError::UnknownWave(wave_id.clone()))?;
            self.steps.push_back(Step::Countdown {
                duration: COUNTDOWN_DURATION,
                label: wave.label.clone(),
            });
            self.steps.push_back(Step::SpawnWave(wave.clone()));
            self.steps.push_back(Step::InterWaveClear(INTER_WAVE_DURATION));
        }
        log::info!("Stage {} started with {} waves", stage.number, stage.wave_ids.len());
        self.advance(out);
        Ok(())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn telegraphs(&self) -> &[Telegraph] {
        &self.telegraphs
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn spawn_completed(&self) -> bool {
        self.spawn_completed
    }

    /// Current wave label, while a wave is counting down or active
    pub fn current_label(&self) -> Option<&str> {
        self.current.as_ref().map(|w| w.label.as_str())
    }

    /// Seconds left in a countdown
    pub fn countdown_remaining(&self) -> Option<f32> {
        (self.phase == WavePhase::Countdown)
            .then(|| (self.phase_ends_at - self.stage_time).max(0.0))
    }

    fn cleared(&self, renderable_enemies: usize) -> bool {
        renderable_enemies == 0 && self.pending.is_empty()
    }

    /// Pop the next step, or finish when the queue is empty
    fn advance(&mut self, out: &mut Vec<WaveSignal>) {
        let now = self.stage_time;
        match self.steps.pop_front() {
            Some(Step::Countdown { duration, label }) => {
                self.phase = WavePhase::Countdown;
                self.phase_ends_at = now + duration;
                self.banner = Some(Banner {
                    text: label.clone(),
                    until: now + BANNER_DURATION,
                });
                out.push(WaveSignal::CountdownStarted { label });
            }
            Some(Step::SpawnWave(wave)) => {
                self.phase = WavePhase::ActiveWave;
                self.spawn_completed = false;
                for spawn in &wave.spawns {
                    self.pending.push(PendingSpawn {
                        generation: self.generation,
                        fire_at: now + spawn.delay,
                        spawn: spawn.clone(),
                        stage: PendingStage::Scheduled,
                    });
                }
                log::info!("Wave '{}' active with {} spawns", wave.label, wave.spawns.len());
                out.push(WaveSignal::WaveStarted {
                    label: wave.label.clone(),
                });
                self.current = Some(wave);
            }
            Some(Step::InterWaveClear(duration)) => {
                self.phase = WavePhase::InterWaveClear;
                self.phase_ends_at = now + duration;
                if let Some(wave) = self.current.take() {
                    self.banner = Some(Banner {
                        text: format!("{} clear!", wave.label),
                        until: now + BANNER_DURATION,
                    });
                    out.push(WaveSignal::WaveCleared { label: wave.label });
                }
            }
            None => {
                self.phase = WavePhase::Finished;
            }
        }
    }

    /// Advance by `dt`. `renderable_enemies` is the world-wide count of
    /// enemies that are alive or still animating their death.
    pub fn update(
        &mut self,
        dt: f32,
        renderable_enemies: usize,
        rng: &mut impl Rng,
        out: &mut Vec<WaveSignal>,
    ) {
        self.stage_time += dt;
        let now = self.stage_time;
        self.telegraphs.retain(|t| t.expires_at > now);
        if self.banner.as_ref().is_some_and(|b| b.until <= now) {
            self.banner = None;
        }

        // Clearance is judged on last frame's world, before new spawns land
        match self.phase {
            WavePhase::Idle => {}
            WavePhase::Countdown | WavePhase::InterWaveClear => {
                if now >= self.phase_ends_at {
                    self.advance(out);
                }
            }
            WavePhase::ActiveWave => {
                if self.spawn_completed && self.cleared(renderable_enemies) {
                    self.advance(out);
                }
            }
            WavePhase::Finished => {
                if !self.stage_cleared && self.cleared(renderable_enemies) {
                    self.stage_cleared = true;
                    log::info!("Stage cleared at {:.1}s", now);
                    out.push(WaveSignal::StageCleared);
                }
            }
        }

        self.process_pending(rng, out);
    }

    fn process_pending(&mut self, rng: &mut impl Rng, out: &mut Vec<WaveSignal>) {
        let now = self.stage_time;
        let generation = self.generation;
        let had_pending = !self.pending.is_empty();
        self.pending.retain(|p| p.generation == generation);

        let mut remaining = Vec::with_capacity(self.pending.len());
        for mut task in std::mem::take(&mut self.pending) {
            if now < task.fire_at {
                remaining.push(task);
                continue;
            }
            match task.stage {
                PendingStage::Scheduled => {
                    let (origin, heading) = edge_origin(&self.bounds, rng);
                    self.telegraphs.push(Telegraph {
                        pos: origin,
                        heading,
                        expires_at: now + SPAWN_TELEGRAPH_DURATION,
                    });
                    task.stage = PendingStage::Telegraphed { origin, heading };
                    task.fire_at = now + SPAWN_TELEGRAPH_DURATION;
                    remaining.push(task);
                }
                PendingStage::Telegraphed { origin, heading } => {
                    log::debug!("Spawning group '{}' at {:?}", task.spawn.group_id, origin);
                    out.push(WaveSignal::SpawnGroup {
                        group_id: task.spawn.group_id,
                        origin,
                        heading,
                        speed: task.spawn.speed,
                    });
                }
            }
        }
        self.pending = remaining;

        if had_pending && self.pending.is_empty() && self.phase == WavePhase::ActiveWave {
            self.spawn_completed = true;
        }
    }

    pub fn draw(&self, list: &mut DrawList) {
        for t in &self.telegraphs {
            list.dashed_ring(t.pos, TELEGRAPH_RADIUS, 2.0, colors::TELEGRAPH);
            let tip = t.pos + from_angle(t.heading, TELEGRAPH_ARROW);
            list.line(t.pos, tip, 2.0, colors::TELEGRAPH);
        }
        let center = self.bounds.center();
        if let Some(banner) = &self.banner {
            list.text(center - Vec2::new(0.0, 10.0), 44.0, banner.text.clone(), colors::BANNER);
        }
        if let Some(remaining) = self.countdown_remaining() {
            let label = format!("{}", remaining.ceil() as u32);
            list.text(center + Vec2::new(0.0, 40.0), 32.0, label, colors::BANNER);
        }
    }
}

/// Random point just outside one edge, heading straight in
fn edge_origin(bounds: &Bounds, rng: &mut impl Rng) -> (Vec2, f32) {
    let (w, h) = (bounds.width(), bounds.height());
    let along_x = bounds.min.x + rng.random_range(w * 0.2..w * 0.8);
    let along_y = bounds.min.y + rng.random_range(h * 0.2..h * 0.8);
    match rng.random_range(0..4) {
        0 => (Vec2::new(along_x, bounds.min.y - SPAWN_EDGE_OFFSET), FRAC_PI_2),
        1 => (Vec2::new(bounds.max.x + SPAWN_EDGE_OFFSET, along_y), PI),
        2 => (Vec2::new(along_x, bounds.max.y + SPAWN_EDGE_OFFSET), -FRAC_PI_2),
        _ => (Vec2::new(bounds.min.x - SPAWN_EDGE_OFFSET, along_y), 0.0),
    }
}
