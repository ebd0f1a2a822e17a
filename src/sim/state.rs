//! Game state and world entities
//!
//! [`GameState`] owns every world collection. Components never reach into
//! each other's collections; enemy side effects arrive as commands and wave
//! progress as signals, and both are applied here through the public API.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use std::f32::consts::TAU;

use super::SimError;
use super::collision;
use super::enemy::{Command, Enemy, ScoreClass};
use super::formation::EnemyGroup;
use super::geom::Bounds;
use super::particles::{BurstParams, ParticlePool};
use super::waves::{WaveManager, WaveSignal};
use crate::consts::*;
use crate::renderer::{DrawList, SpriteRegistry, colors};
use crate::settings::Settings;
use crate::stage::StagePack;
use crate::{angle_of, from_angle};

/// Pickup types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    /// +1 heart
    Restorative,
    /// +1 power level (more parallel links)
    PowerUp,
}

/// Current phase of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Playing,
    Paused,
    /// Every stage cleared
    Victory,
    /// Out of hearts
    GameOver,
    /// An internal error stopped the simulation; the driver must not tick again
    Halted,
}

/// Notifications for HUD collaborators
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    HeartsChanged(u32),
    PowerChanged(u32),
    ScoreChanged(u64),
    Countdown(String),
    WaveStarted(String),
    WaveCleared(String),
    StageStarted(u32),
    StageCleared(u32),
    Victory { score: u64 },
    GameOver { score: u64 },
    Halted { phase: &'static str, message: String },
}

/// One of the two player-controlled circles
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerMarker {
    pub pos: Vec2,
    pub radius: f32,
    pub invulnerable_until: f32,
    pub shake_until: f32,
    pub shake_magnitude: f32,
}

impl PlayerMarker {
    pub fn new(pos: Vec2) -> Self {
        Self {
            pos,
            radius: PLAYER_RADIUS,
            invulnerable_until: 0.0,
            shake_until: 0.0,
            shake_magnitude: 0.0,
        }
    }

    pub fn is_invulnerable(&self, now: f32) -> bool {
        now < self.invulnerable_until
    }

    /// Register a hit. Returns false (and changes nothing) inside the
    /// invulnerability window.
    pub fn hit(&mut self, now: f32, shake: f32) -> bool {
        if self.is_invulnerable(now) {
            return false;
        }
        self.invulnerable_until = now + PLAYER_INVULNERABILITY;
        self.shake_until = now + HIT_SHAKE_DURATION;
        self.shake_magnitude = shake;
        true
    }

    /// Follow the pointer, staying fully inside the arena
    pub fn move_to(&mut self, target: Vec2, bounds: &Bounds) {
        self.pos = bounds.inset(self.radius).clamp(target);
    }

    /// Draw-time jitter while shaking
    pub fn shake_offset(&self, now: f32) -> Vec2 {
        if now >= self.shake_until || self.shake_magnitude <= 0.0 {
            return Vec2::ZERO;
        }
        Vec2::new((now * 97.0).sin(), (now * 131.0).cos()) * self.shake_magnitude
    }

    pub fn draw(&self, list: &mut DrawList, now: f32) {
        let pos = self.pos + self.shake_offset(now);
        let alpha = if self.is_invulnerable(now) { 0.6 } else { 1.0 };
        list.circle(pos, self.radius, colors::with_alpha(colors::PLAYER, alpha));
    }
}

/// Straight-flying projectile; leaves when it exits the padded arena
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Missile {
    pub pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
}

impl Missile {
    pub fn new(pos: Vec2, vel: Vec2) -> Self {
        Self {
            pos,
            vel,
            radius: MISSILE_RADIUS,
        }
    }

    pub fn update(&mut self, dt: f32) {
        self.pos += self.vel * dt;
    }

    pub fn is_out_of_bounds(&self, bounds: &Bounds) -> bool {
        !bounds.inset(-MISSILE_BOUNDS_MARGIN).contains(self.pos)
    }

    pub fn draw(&self, list: &mut DrawList) {
        list.circle(self.pos, self.radius, colors::MISSILE);
    }
}

/// Stationary hazard; detonates on player contact
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mine {
    pub pos: Vec2,
    pub radius: f32,
    pub expires_at: f32,
}

impl Mine {
    pub fn is_expired(&self, now: f32) -> bool {
        now >= self.expires_at
    }

    pub fn draw(&self, list: &mut DrawList, now: f32) {
        // Blink faster near expiry
        let left = (self.expires_at - now).max(0.0);
        let blink = if left < 1.0 { 0.5 + 0.5 * (now * 24.0).sin() } else { 1.0 };
        list.circle(self.pos, self.radius, colors::with_alpha(colors::MINE, blink));
        list.ring(self.pos, self.radius + 3.0, 1.5, colors::MINE);
    }
}

/// Expanding area pulse
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AreaHazard {
    pub pos: Vec2,
    pub max_radius: f32,
    pub born_at: f32,
    pub duration: f32,
}

impl AreaHazard {
    /// Grows linearly from 0 to `max_radius` over the lifetime
    pub fn radius(&self, now: f32) -> f32 {
        if self.duration <= 0.0 {
            return self.max_radius;
        }
        self.max_radius * ((now - self.born_at) / self.duration).clamp(0.0, 1.0)
    }

    pub fn is_expired(&self, now: f32) -> bool {
        now - self.born_at >= self.duration
    }

    pub fn draw(&self, list: &mut DrawList, now: f32) {
        let r = self.radius(now);
        list.circle(self.pos, r, colors::AOE);
        list.ring(self.pos, r, 2.0, colors::MINE);
    }
}

/// Drifting pickup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Item {
    pub kind: ItemKind,
    pub pos: Vec2,
    pub vel: Vec2,
    /// Next random direction change
    pub turn_at: f32,
}

impl Item {
    pub fn new(kind: ItemKind, pos: Vec2, now: f32, rng: &mut impl Rng) -> Self {
        Self {
            kind,
            pos,
            vel: from_angle(
                rng.random_range(0.0..TAU),
                rng.random_range(ITEM_MIN_SPEED..ITEM_MAX_SPEED),
            ),
            turn_at: now + rng.random_range(ITEM_TURN_MIN..ITEM_TURN_MAX),
        }
    }

    pub fn update(&mut self, now: f32, dt: f32, bounds: &Bounds, rng: &mut impl Rng) {
        if now >= self.turn_at {
            let angle = angle_of(self.vel) + rng.random_range(-ITEM_TURN_JITTER..ITEM_TURN_JITTER);
            self.vel = from_angle(angle, self.vel.length());
            self.turn_at = now + rng.random_range(ITEM_TURN_MIN..ITEM_TURN_MAX);
        }
        self.pos += self.vel * dt;
        bounds.inset(ITEM_RADIUS).bounce_velocity(&mut self.pos, &mut self.vel);
    }

    pub fn draw(&self, list: &mut DrawList) {
        let (color, label) = match self.kind {
            ItemKind::Restorative => (colors::ITEM_HEART, "♥"),
            ItemKind::PowerUp => (colors::ITEM_POWER, "P"),
        };
        list.circle(self.pos, ITEM_RADIUS, color);
        list.text(self.pos, 12.0, label.to_string(), colors::ENEMY_LABEL);
    }
}

/// Complete session state
#[derive(Debug, Clone)]
pub struct GameState {
    pub settings: Settings,
    pub pack: StagePack,
    pub bounds: Bounds,
    /// Session clock (s); advances only while playing
    pub time: f32,
    pub phase: SessionPhase,
    pub players: [PlayerMarker; 2],
    pub hearts: u32,
    pub power: u32,
    pub score: u64,
    /// Index into `pack.stages`
    pub stage_index: usize,
    pub groups: Vec<EnemyGroup>,
    /// Free-roaming enemies outside any formation
    pub enemies: Vec<Enemy>,
    pub missiles: Vec<Missile>,
    pub mines: Vec<Mine>,
    pub hazards: Vec<AreaHazard>,
    pub items: Vec<Item>,
    pub waves: WaveManager,
    pub particles: ParticlePool,
    /// Seed this session's RNG was built from
    pub seed: u64,
    pub(crate) rng: Pcg32,
    pub(crate) commands: Vec<Command>,
    signals: Vec<WaveSignal>,
    events: Vec<GameEvent>,
}

impl GameState {
    /// Create a session and start its first stage
    pub fn new(pack: StagePack, settings: Settings) -> Result<Self, SimError> {
        let seed = settings.seed.unwrap_or_else(rand::random);
        log::info!("New session (seed {seed}, {} stages)", pack.stages.len());
        let bounds = Bounds::new(ARENA_WIDTH, ARENA_HEIGHT);
        let mut state = Self {
            particles: ParticlePool::new(settings.max_particles()),
            settings,
            pack,
            bounds,
            time: 0.0,
            phase: SessionPhase::Playing,
            players: Self::start_positions(&bounds),
            hearts: HEARTS_MAX,
            power: 1,
            score: 0,
            stage_index: 0,
            groups: Vec::new(),
            enemies: Vec::new(),
            missiles: Vec::new(),
            mines: Vec::new(),
            hazards: Vec::new(),
            items: Vec::new(),
            waves: WaveManager::new(bounds),
            seed,
            rng: Pcg32::seed_from_u64(seed),
            commands: Vec::new(),
            signals: Vec::new(),
            events: Vec::new(),
        };
        state.restart()?;
        Ok(state)
    }

    fn start_positions(bounds: &Bounds) -> [PlayerMarker; 2] {
        let y = bounds.height() * 0.75;
        [
            PlayerMarker::new(Vec2::new(bounds.width() * 0.35, y)),
            PlayerMarker::new(Vec2::new(bounds.width() * 0.65, y)),
        ]
    }

    /// Reset hearts, power and score and replay from the first stage
    pub fn restart(&mut self) -> Result<(), SimError> {
        self.hearts = HEARTS_MAX;
        self.power = 1;
        self.score = 0;
        self.phase = SessionPhase::Playing;
        self.players = Self::start_positions(&self.bounds);
        self.events.push(GameEvent::HeartsChanged(self.hearts));
        self.events.push(GameEvent::PowerChanged(self.power));
        self.events.push(GameEvent::ScoreChanged(self.score));
        self.start_stage(0)
    }

    fn clear_world(&mut self) {
        self.groups.clear();
        self.enemies.clear();
        self.missiles.clear();
        self.mines.clear();
        self.hazards.clear();
        self.items.clear();
        self.commands.clear();
        self.particles.clear_all();
    }

    fn start_stage(&mut self, index: usize) -> Result<(), SimError> {
        let stage = self
            .pack
            .stage(index)
            .cloned()
            .ok_or(SimError::UnknownStage(index))?;
        self.clear_world();
        self.stage_index = index;
        self.waves.start(&stage, &self.pack, &mut self.signals)?;
        self.events.push(GameEvent::StageStarted(stage.number));
        self.handle_signals()
    }

    pub fn is_halted(&self) -> bool {
        self.phase == SessionPhase::Halted
    }

    /// Stop the simulation for good after an internal error
    pub fn halt(&mut self, phase: &'static str, err: SimError) {
        log::error!("Simulation halted in {phase}: {err}");
        self.phase = SessionPhase::Halted;
        self.events.push(GameEvent::Halted {
            phase,
            message: err.to_string(),
        });
    }

    pub fn toggle_pause(&mut self) {
        self.phase = match self.phase {
            SessionPhase::Playing => SessionPhase::Paused,
            SessionPhase::Paused => SessionPhase::Playing,
            other => other,
        };
    }

    /// Take every event queued since the last call
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    // === Mutation API used by enemies, the resolver and the scheduler ===

    pub fn spawn_missile(&mut self, pos: Vec2, vel: Vec2) {
        self.missiles.push(Missile::new(pos, vel));
    }

    pub fn spawn_mine(&mut self, pos: Vec2, radius: f32, ttl: f32) {
        self.mines.push(Mine {
            pos,
            radius,
            expires_at: self.time + ttl,
        });
    }

    pub fn spawn_aoe(&mut self, pos: Vec2, radius: f32, duration: f32) {
        self.hazards.push(AreaHazard {
            pos,
            max_radius: radius,
            born_at: self.time,
            duration,
        });
    }

    pub fn drop_item(&mut self, kind: ItemKind, pos: Vec2) {
        log::debug!("Dropped {kind:?} at {pos:?}");
        let item = Item::new(kind, pos, self.time, &mut self.rng);
        self.items.push(item);
    }

    /// Remove hearts; reaching zero ends the session
    pub fn damage_player(&mut self, n: u32) {
        if n == 0 {
            return;
        }
        self.hearts = self.hearts.saturating_sub(n);
        self.events.push(GameEvent::HeartsChanged(self.hearts));
        if self.hearts == 0 && self.phase == SessionPhase::Playing {
            log::info!("Game over with score {}", self.score);
            self.phase = SessionPhase::GameOver;
            self.events.push(GameEvent::GameOver { score: self.score });
        }
    }

    pub fn add_score(&mut self, amount: u64) {
        if amount == 0 {
            return;
        }
        self.score += amount;
        self.events.push(GameEvent::ScoreChanged(self.score));
    }

    /// Award the stage bonus and move on, or end the session in victory
    pub fn on_stage_clear(&mut self) -> Result<(), SimError> {
        let number = self.pack.stage(self.stage_index).map_or(0, |s| s.number);
        self.add_score(self.pack.score.stage_clear.round() as u64);
        self.events.push(GameEvent::StageCleared(number));
        let next = self.stage_index + 1;
        if next < self.pack.stages.len() {
            self.start_stage(next)
        } else {
            log::info!("All stages cleared, final score {}", self.score);
            self.phase = SessionPhase::Victory;
            self.events.push(GameEvent::Victory { score: self.score });
            Ok(())
        }
    }

    /// Links the current gap allows, ignoring power
    pub fn distance_allowed_links(&self) -> u32 {
        collision::distance_allowed_links(self.players[0].pos, self.players[1].pos)
    }

    pub fn effective_links(&self) -> u32 {
        collision::effective_links(self.power, self.players[0].pos, self.players[1].pos)
    }

    /// Kill score multiplier: decays from 1.0 toward the floor as the stage drags on
    pub fn score_multiplier(&self) -> f32 {
        let decay = (-self.waves.stage_time / SCORE_DECAY_SECONDS).exp();
        SCORE_DECAY_FLOOR + (1.0 - SCORE_DECAY_FLOOR) * decay
    }

    pub(crate) fn award_kill(&mut self, class: ScoreClass) {
        let base = match class {
            ScoreClass::Normal => self.pack.score.normal,
            ScoreClass::Attacker => self.pack.score.attacker,
        };
        self.add_score((base * self.score_multiplier()).round() as u64);
    }

    /// Apply a pickup; an effect that is already capped scores a bonus instead
    pub fn apply_item(&mut self, kind: ItemKind) {
        let capped = match kind {
            ItemKind::Restorative => {
                let capped = self.hearts >= HEARTS_MAX;
                if !capped {
                    self.hearts += 1;
                    self.events.push(GameEvent::HeartsChanged(self.hearts));
                }
                capped
            }
            ItemKind::PowerUp => {
                let capped = self.power >= POWER_MAX;
                if !capped {
                    self.power += 1;
                    self.events.push(GameEvent::PowerChanged(self.power));
                }
                capped
            }
        };
        log::debug!("Picked up {kind:?} (capped: {capped})");
        let mut amount = self.pack.score.item;
        if capped {
            amount += self.pack.score.item_bonus;
        }
        self.add_score(amount.round() as u64);
    }

    /// Enemies alive or still animating their death, formations included
    pub fn renderable_enemy_count(&self) -> usize {
        let now = self.time;
        self.groups.iter().map(|g| g.renderable_count(now)).sum::<usize>()
            + self.enemies.iter().filter(|e| e.is_renderable(now)).count()
    }

    pub fn all_enemies(&self) -> impl Iterator<Item = &Enemy> {
        self.groups.iter().flat_map(|g| g.members.iter()).chain(self.enemies.iter())
    }

    pub(crate) fn emit_dust(&mut self, pos: Vec2) {
        self.particles
            .emit_burst(pos, DUST_BURST_COUNT, &BurstParams::default(), &mut self.rng);
    }

    /// Build a catalog group at `origin`; a lone boss roams free
    pub fn spawn_group(
        &mut self,
        group_id: &str,
        origin: Vec2,
        heading: f32,
        speed: f32,
    ) -> Result<(), SimError> {
        let spec = self
            .pack
            .groups
            .get(group_id)
            .ok_or_else(|| SimError::UnknownGroup(group_id.to_string()))?;
        let now = self.time;
        let roaming = spec.is_single_boss(&self.pack);
        let mut members = Vec::with_capacity(spec.monster_ids.len());
        for id in &spec.monster_ids {
            let monster = self
                .pack
                .monsters
                .get(id)
                .ok_or_else(|| SimError::UnknownMonster(id.clone()))?;
            members.push(monster.instantiate(origin, heading, speed, now, roaming));
        }
        if roaming {
            self.enemies.extend(members);
        } else {
            self.groups
                .push(EnemyGroup::new(group_id, members, spec.columns, origin, heading, speed));
        }
        Ok(())
    }

    /// Apply queued enemy side effects
    pub(crate) fn apply_commands(&mut self) {
        let mut commands = std::mem::take(&mut self.commands);
        for command in commands.drain(..) {
            match command {
                Command::SpawnMissile { pos, vel } => self.spawn_missile(pos, vel),
                Command::SpawnMine { pos, radius, ttl } => self.spawn_mine(pos, radius, ttl),
                Command::SpawnAoe {
                    pos,
                    radius,
                    duration,
                } => self.spawn_aoe(pos, radius, duration),
                Command::DropItem { kind, pos } => self.drop_item(kind, pos),
            }
        }
        // Keep the allocation
        self.commands = commands;
    }

    fn handle_signals(&mut self) -> Result<(), SimError> {
        while !self.signals.is_empty() {
            let batch = std::mem::take(&mut self.signals);
            for signal in batch {
                match signal {
                    WaveSignal::CountdownStarted { label } => {
                        self.events.push(GameEvent::Countdown(label))
                    }
                    WaveSignal::WaveStarted { label } => {
                        self.events.push(GameEvent::WaveStarted(label))
                    }
                    WaveSignal::WaveCleared { label } => {
                        self.events.push(GameEvent::WaveCleared(label))
                    }
                    WaveSignal::SpawnGroup {
                        group_id,
                        origin,
                        heading,
                        speed,
                    } => self.spawn_group(&group_id, origin, heading, speed)?,
                    WaveSignal::StageCleared => self.on_stage_clear()?,
                }
            }
        }
        Ok(())
    }

    // === Frame phases, driven by `tick` ===

    /// Move everything one step
    pub(crate) fn update_world(
        &mut self,
        pointers: [Option<Vec2>; 2],
        dt: f32,
    ) -> Result<(), SimError> {
        self.time += dt;
        let now = self.time;
        self.particles.begin_frame();

        for (player, target) in self.players.iter_mut().zip(pointers) {
            if let Some(target) = target {
                player.move_to(target, &self.bounds);
            }
        }
        for group in &mut self.groups {
            group.update(now, dt, &self.bounds, &mut self.rng, &mut self.commands);
        }
        for enemy in &mut self.enemies {
            enemy.update(now, dt, &self.bounds, &mut self.rng, &mut self.commands);
        }
        for missile in &mut self.missiles {
            missile.update(dt);
        }
        for item in &mut self.items {
            item.update(now, dt, &self.bounds, &mut self.rng);
        }
        self.particles.update(dt);
        self.apply_commands();
        self.check_finite()
    }

    /// Let the scheduler judge clearance and act on what it signals
    pub(crate) fn advance_waves(&mut self, dt: f32) -> Result<(), SimError> {
        let renderable = self.renderable_enemy_count();
        self.waves
            .update(dt, renderable, &mut self.rng, &mut self.signals);
        self.handle_signals()
    }

    /// Remove expired entities
    pub(crate) fn cleanup(&mut self) -> Result<(), SimError> {
        let now = self.time;
        let bounds = self.bounds;
        self.groups.retain(|g| !g.is_finished(now));
        self.enemies.retain(|e| e.is_renderable(now));
        self.missiles.retain(|m| !m.is_out_of_bounds(&bounds));
        self.mines.retain(|m| !m.is_expired(now));
        self.hazards.retain(|h| !h.is_expired(now));
        Ok(())
    }

    fn check_finite(&self) -> Result<(), SimError> {
        if self.players.iter().any(|p| !p.pos.is_finite()) {
            return Err(SimError::NonFinite { what: "player position" });
        }
        if self.all_enemies().any(|e| !e.pos.is_finite()) {
            return Err(SimError::NonFinite { what: "enemy position" });
        }
        if self.missiles.iter().any(|m| !m.pos.is_finite() || !m.vel.is_finite()) {
            return Err(SimError::NonFinite { what: "missile" });
        }
        Ok(())
    }

    /// Append this frame's primitives, back to front
    pub fn draw(&self, list: &mut DrawList, sprites: &SpriteRegistry) {
        let now = self.time;

        // Subtle background grid
        let mut x = 0.0;
        while x <= self.bounds.width() {
            list.line(Vec2::new(x, 0.0), Vec2::new(x, self.bounds.height()), 1.0, colors::GRID);
            x += 40.0;
        }
        let mut y = 0.0;
        while y <= self.bounds.height() {
            list.line(Vec2::new(0.0, y), Vec2::new(self.bounds.width(), y), 1.0, colors::GRID);
            y += 40.0;
        }

        for item in &self.items {
            item.draw(list);
        }

        let (a, b) = (self.players[0].pos, self.players[1].pos);
        if self.distance_allowed_links() == 0 {
            list.dashed_line(a, b, 3.0, colors::LINK_DISABLED);
        } else {
            for offset in collision::link_offsets(a, b, self.effective_links()) {
                list.line(a + offset, b + offset, 3.0, colors::LINK);
            }
        }
        for player in &self.players {
            player.draw(list, now);
        }

        for group in &self.groups {
            group.draw(list, sprites, now);
        }
        for enemy in &self.enemies {
            enemy.draw(list, sprites, now);
        }
        for hazard in &self.hazards {
            hazard.draw(list, now);
        }
        for mine in &self.mines {
            mine.draw(list, now);
        }
        for missile in &self.missiles {
            missile.draw(list);
        }
        self.particles.draw(list);
        self.waves.draw(list);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> GameState {
        let settings = Settings {
            seed: Some(1),
            ..Settings::default()
        };
        GameState::new(StagePack::embedded().unwrap(), settings).unwrap()
    }

    #[test]
    fn test_new_session_starts_first_stage() {
        let mut state = state();
        assert_eq!(state.phase, SessionPhase::Playing);
        assert_eq!(state.hearts, HEARTS_MAX);
        assert_eq!(state.power, 1);
        let events = state.drain_events();
        assert!(events.contains(&GameEvent::StageStarted(1)));
        assert!(events.iter().any(|e| matches!(e, GameEvent::Countdown(_))));
        assert!(state.drain_events().is_empty());
    }

    #[test]
    fn test_player_hit_window() {
        let mut player = PlayerMarker::new(Vec2::ZERO);
        assert!(player.hit(1.0, 6.0));
        assert!(!player.hit(1.2, 6.0));
        assert!(player.shake_offset(1.1).length() <= 6.0 * std::f32::consts::SQRT_2);
        assert_eq!(player.shake_offset(1.0 + HIT_SHAKE_DURATION), Vec2::ZERO);
        assert!(player.hit(1.0 + PLAYER_INVULNERABILITY, 0.0));
    }

    #[test]
    fn test_player_clamped_inside_arena() {
        let mut player = PlayerMarker::new(Vec2::ZERO);
        player.move_to(Vec2::new(-100.0, 5000.0), &Bounds::new(ARENA_WIDTH, ARENA_HEIGHT));
        assert_eq!(player.pos, Vec2::new(PLAYER_RADIUS, ARENA_HEIGHT - PLAYER_RADIUS));
    }

    #[test]
    fn test_damage_player_to_zero_is_game_over() {
        let mut state = state();
        state.damage_player(HEARTS_MAX + 2);
        assert_eq!(state.hearts, 0);
        assert_eq!(state.phase, SessionPhase::GameOver);
    }

    #[test]
    fn test_capped_pickup_scores_bonus() {
        let mut state = state();
        state.apply_item(ItemKind::PowerUp);
        assert_eq!(state.power, 2);
        assert_eq!(state.score, 20);
        // Hearts start full
        state.apply_item(ItemKind::Restorative);
        assert_eq!(state.hearts, HEARTS_MAX);
        assert_eq!(state.score, 20 + 20 + 50);
    }

    #[test]
    fn test_score_multiplier_decays_to_floor() {
        let mut state = state();
        assert!((state.score_multiplier() - 1.0).abs() < 1e-6);
        state.waves.stage_time = 90.0;
        let expected = SCORE_DECAY_FLOOR + (1.0 - SCORE_DECAY_FLOOR) * (-1.0f32).exp();
        assert!((state.score_multiplier() - expected).abs() < 1e-5);
        state.waves.stage_time = 10_000.0;
        assert!((state.score_multiplier() - SCORE_DECAY_FLOOR).abs() < 1e-4);
    }

    #[test]
    fn test_commands_route_through_api() {
        let mut state = state();
        state.commands.push(Command::SpawnMissile {
            pos: Vec2::ZERO,
            vel: Vec2::X,
        });
        state.commands.push(Command::SpawnMine {
            pos: Vec2::ZERO,
            radius: 10.0,
            ttl: 2.0,
        });
        state.commands.push(Command::SpawnAoe {
            pos: Vec2::ZERO,
            radius: 50.0,
            duration: 1.0,
        });
        state.commands.push(Command::DropItem {
            kind: ItemKind::PowerUp,
            pos: Vec2::ZERO,
        });
        state.apply_commands();
        assert_eq!(state.missiles.len(), 1);
        assert_eq!(state.mines.len(), 1);
        assert_eq!(state.hazards.len(), 1);
        assert_eq!(state.items.len(), 1);
        assert!(state.commands.is_empty());
    }

    #[test]
    fn test_area_hazard_grows() {
        let hazard = AreaHazard {
            pos: Vec2::ZERO,
            max_radius: 60.0,
            born_at: 1.0,
            duration: 2.0,
        };
        assert_eq!(hazard.radius(1.0), 0.0);
        assert!((hazard.radius(2.0) - 30.0).abs() < 1e-4);
        assert_eq!(hazard.radius(5.0), 60.0);
        assert!(hazard.is_expired(3.0));
    }

    #[test]
    fn test_item_stays_in_arena() {
        let bounds = Bounds::new(ARENA_WIDTH, ARENA_HEIGHT);
        let mut rng = Pcg32::seed_from_u64(2);
        let mut item = Item::new(ItemKind::Restorative, Vec2::new(12.0, 12.0), 0.0, &mut rng);
        for frame in 0..2000 {
            item.update(frame as f32 / 60.0, 1.0 / 60.0, &bounds, &mut rng);
            assert!(bounds.inset(ITEM_RADIUS - 1.0).contains(item.pos));
        }
    }

    #[test]
    fn test_spawn_unknown_group_fails() {
        let mut state = state();
        let err = state.spawn_group("nope", Vec2::ZERO, 0.0, 100.0).unwrap_err();
        assert!(matches!(err, SimError::UnknownGroup(_)));
    }

    #[test]
    fn test_boss_group_spawns_free_roaming() {
        let mut state = state();
        state.spawn_group("bear", Vec2::new(-20.0, 400.0), 0.0, ENEMY_SPEED).unwrap();
        assert_eq!(state.enemies.len(), 1);
        assert!(state.enemies[0].kind.is_boss());
        state.spawn_group("chicks10", Vec2::new(-20.0, 400.0), 0.0, ENEMY_SPEED).unwrap();
        assert_eq!(state.groups.len(), 1);
        assert_eq!(state.renderable_enemy_count(), 11);
    }

    #[test]
    fn test_boss_inside_formation_follows_its_slot() {
        let pack = StagePack::from_json_str(
            r#"{
                "score": {"normal": 10, "attacker": 30, "stageClear": 500,
                          "item": 20, "itemBonus": 50},
                "monsters": [
                    {"id": "chick", "hp": 3},
                    {"id": "bear", "hp": 20, "size": 2, "boss": true, "attackKind": "ring"}
                ],
                "attackDetails": [
                    {"id": "ring", "dir_angles": [0, 180], "dir_speed": 1,
                     "mine_lifesec": 0, "mine_radius": 0, "aoe_radius": 0, "aoe_duration": 0}
                ],
                "groups": [{"id": "escort", "monsterIds": ["chick", "bear"]}],
                "waves": [{"id": "w", "spawns": [{"groupId": "escort", "moveSpeed": 1}]}],
                "stages": [{"stageNo": 1, "waveIds": ["w"]}]
            }"#,
        )
        .unwrap();
        let settings = Settings {
            seed: Some(5),
            ..Settings::default()
        };
        let mut state = GameState::new(pack, settings).unwrap();
        state
            .spawn_group("escort", Vec2::new(270.0, 480.0), 0.0, ENEMY_SPEED)
            .unwrap();
        assert!(state.enemies.is_empty());
        assert!(!state.groups[0].members[1].kind.is_boss());

        let dt = 1.0 / 60.0;
        let mut out = Vec::new();
        for frame in 0..120 {
            let group = &mut state.groups[0];
            group.update(frame as f32 * dt, dt, &state.bounds, &mut state.rng, &mut out);
            for member in &group.members {
                let trail = &group.columns[member.column].trail;
                let slot = trail.sample((member.slot + 1) as f32 * group.spacing);
                assert!(member.pos.distance(slot) < 1e-3, "frame {frame}");
            }
        }
    }
}
