//! Enemy entity and its attack/animation state machine
//!
//! ```text
//! Moving ──period──▶ Preparing ──1.0s──▶ Attacking ──0.35s──▶ Moving
//!    ╲________________ hp <= 0 (from any state) ________________▶ Dying
//! ```
//!
//! Side effects (projectiles, hazards, drops) are pushed as [`Command`]s into
//! an outbox the orchestrator drains through its own API.

use std::f32::consts::PI;

use glam::Vec2;
use rand::Rng;

use super::geom::Bounds;
use super::state::ItemKind;
use crate::consts::*;
use crate::from_angle;
use crate::renderer::{DrawList, SpriteRegistry, colors};

/// What an attack does once the telegraph ends
#[derive(Debug, Clone, PartialEq)]
pub enum AttackPattern {
    /// One projectile per angle (radians, relative to heading)
    Burst { angles: Vec<f32>, speed_multiplier: f32 },
    /// Stationary hazard left at the attacker's position
    Mine { radius: f32, lifetime: f32 },
    /// Expanding area pulse centred on the attacker
    Pulse { radius: f32, duration: f32 },
}

/// When an attack-capable enemy starts its telegraph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackTrigger {
    /// Every `period` seconds spent moving
    Periodic,
    /// Immediately after taking non-lethal damage
    OnDamage,
    /// One final attack on death
    OnDeath,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttackSpec {
    pub pattern: AttackPattern,
    pub trigger: AttackTrigger,
    pub period: f32,
}

/// Probabilistic on-death drop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropSpec {
    pub kind: ItemKind,
    pub chance: f32,
}

/// Which base value of the score table a kill awards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreClass {
    Normal,
    Attacker,
}

/// Behavioural variant; carries only what that behaviour needs
#[derive(Debug, Clone, PartialEq)]
pub enum EnemyKind {
    /// Formation filler, contact damage only
    Ordinary,
    /// Formation member with an attack
    Ranged(AttackSpec),
    /// Roams on its own heading, stops to telegraph and attack
    Boss {
        attack: Option<AttackSpec>,
        speed: f32,
    },
}

impl EnemyKind {
    pub fn attack(&self) -> Option<&AttackSpec> {
        match self {
            EnemyKind::Ordinary => None,
            EnemyKind::Ranged(attack) => Some(attack),
            EnemyKind::Boss { attack, .. } => attack.as_ref(),
        }
    }

    pub fn is_boss(&self) -> bool {
        matches!(self, EnemyKind::Boss { .. })
    }
}

/// Animation/attack state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttackState {
    Moving,
    /// Attack telegraph (blinking)
    Preparing,
    Attacking,
    /// hp <= 0; shrinking and fading since `since`
    Dying { since: f32 },
}

/// Side effect requested by an enemy
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SpawnMissile { pos: Vec2, vel: Vec2 },
    SpawnMine { pos: Vec2, radius: f32, ttl: f32 },
    SpawnAoe { pos: Vec2, radius: f32, duration: f32 },
    DropItem { kind: ItemKind, pos: Vec2 },
}

/// Result of a `damage` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    /// Dying already, or inside the invulnerability window
    Ignored,
    Hit,
    Killed,
}

#[derive(Debug, Clone)]
pub struct Enemy {
    /// Catalog id this enemy was built from
    pub monster_id: String,
    pub pos: Vec2,
    pub radius: f32,
    pub hp: i32,
    pub max_hp: i32,
    pub kind: EnemyKind,
    pub state: AttackState,
    pub state_entered_at: f32,
    /// Facing (radians); bursts fire relative to it
    pub heading: f32,
    pub drop: Option<DropSpec>,
    pub score_class: ScoreClass,
    /// Repeat damage is ignored until this time
    pub invulnerable_until: f32,
    pub hit_flash_until: f32,
    /// Formation column (0 or 1); only the formation controller reads these
    pub column: usize,
    /// Position in the column behind the lead point
    pub slot: usize,
    /// Sprite key; falls back to a filled circle when unresolved
    pub sprite: Option<String>,
    /// Positions recorded while attacking
    pub afterimages: Vec<Vec2>,
}

impl Enemy {
    pub fn new(
        monster_id: impl Into<String>,
        pos: Vec2,
        radius: f32,
        hp: i32,
        kind: EnemyKind,
        now: f32,
    ) -> Self {
        let score_class = if matches!(kind, EnemyKind::Ordinary) {
            ScoreClass::Normal
        } else {
            ScoreClass::Attacker
        };
        Self {
            monster_id: monster_id.into(),
            pos,
            radius,
            hp,
            max_hp: hp,
            kind,
            state: AttackState::Moving,
            state_entered_at: now,
            heading: 0.0,
            drop: None,
            score_class,
            invulnerable_until: 0.0,
            hit_flash_until: 0.0,
            column: 0,
            slot: 0,
            sprite: None,
            afterimages: Vec::new(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    pub fn is_dying(&self) -> bool {
        matches!(self.state, AttackState::Dying { .. })
    }

    /// Death animation finished; eligible for removal
    pub fn is_expired(&self, now: f32) -> bool {
        match self.state {
            AttackState::Dying { since } => now - since >= DEATH_DURATION,
            _ => false,
        }
    }

    /// Alive, or defeated but still mid death animation
    pub fn is_renderable(&self, now: f32) -> bool {
        self.is_alive() || !self.is_expired(now)
    }

    pub fn is_invulnerable(&self, now: f32) -> bool {
        now < self.invulnerable_until
    }

    /// 0 at death, 1 when the animation is done
    pub fn death_progress(&self, now: f32) -> f32 {
        match self.state {
            AttackState::Dying { since } => ((now - since) / DEATH_DURATION).clamp(0.0, 1.0),
            _ => 0.0,
        }
    }

    fn enter(&mut self, state: AttackState, now: f32) {
        if self.state == AttackState::Attacking {
            self.afterimages.clear();
        }
        self.state = state;
        self.state_entered_at = now;
    }

    /// Advance the state machine (and boss roaming) by one frame
    pub fn update(
        &mut self,
        now: f32,
        dt: f32,
        bounds: &Bounds,
        rng: &mut impl Rng,
        out: &mut Vec<Command>,
    ) {
        let in_state = now - self.state_entered_at;
        match self.state {
            AttackState::Dying { .. } => {}
            AttackState::Moving => {
                if let EnemyKind::Boss { speed, .. } = self.kind {
                    self.pos += from_angle(self.heading, speed * dt);
                    let inner = bounds.inset(self.radius);
                    if inner.bounce_heading(&mut self.pos, &mut self.heading).any() {
                        self.heading = crate::wrap_angle(
                            self.heading + rng.random_range(-BOUNCE_JITTER..BOUNCE_JITTER),
                        );
                    }
                }
                let periodic = self
                    .kind
                    .attack()
                    .filter(|a| a.trigger == AttackTrigger::Periodic)
                    .map(|a| a.period);
                if let Some(period) = periodic
                    && in_state >= period
                {
                    self.enter(AttackState::Preparing, now);
                }
            }
            AttackState::Preparing => {
                if in_state >= PREPARE_DURATION {
                    self.enter(AttackState::Attacking, now);
                    self.perform_attack(out);
                }
            }
            AttackState::Attacking => {
                if self.afterimages.len() < MAX_AFTERIMAGES {
                    self.afterimages.push(self.pos);
                }
                if in_state >= ATTACK_DURATION {
                    self.enter(AttackState::Moving, now);
                    if self.kind.is_boss() {
                        self.heading = rng.random_range(-PI..PI);
                    }
                }
            }
        }
    }

    /// Emit this enemy's attack pattern, if it has one
    pub fn perform_attack(&self, out: &mut Vec<Command>) {
        let Some(attack) = self.kind.attack() else {
            return;
        };
        match &attack.pattern {
            AttackPattern::Burst {
                angles,
                speed_multiplier,
            } => {
                let speed = MISSILE_SPEED * speed_multiplier;
                for angle in angles {
                    out.push(Command::SpawnMissile {
                        pos: self.pos,
                        vel: from_angle(self.heading + angle, speed),
                    });
                }
            }
            AttackPattern::Mine { radius, lifetime } => out.push(Command::SpawnMine {
                pos: self.pos,
                radius: *radius,
                ttl: *lifetime,
            }),
            AttackPattern::Pulse { radius, duration } => out.push(Command::SpawnAoe {
                pos: self.pos,
                radius: *radius,
                duration: *duration,
            }),
        }
    }

    /// Apply `amount` damage.
    ///
    /// Ignored while dying or invulnerable. A successful hit opens a 2s
    /// invulnerability window, so a sustained contact damages exactly once.
    pub fn damage(
        &mut self,
        amount: u32,
        now: f32,
        rng: &mut impl Rng,
        out: &mut Vec<Command>,
    ) -> DamageOutcome {
        if self.is_dying() || self.is_invulnerable(now) {
            return DamageOutcome::Ignored;
        }
        self.hp -= amount as i32;
        self.hit_flash_until = now + HIT_FLASH_DURATION;
        self.invulnerable_until = now + ENEMY_INVULNERABILITY;

        if self.hp <= 0 {
            self.enter(AttackState::Dying { since: now }, now);
            if let Some(drop) = self.drop
                && rng.random::<f32>() < drop.chance
            {
                out.push(Command::DropItem {
                    kind: drop.kind,
                    pos: self.pos,
                });
            }
            if self
                .kind
                .attack()
                .is_some_and(|a| a.trigger == AttackTrigger::OnDeath)
            {
                self.perform_attack(out);
            }
            return DamageOutcome::Killed;
        }

        if self.state == AttackState::Moving
            && self
                .kind
                .attack()
                .is_some_and(|a| a.trigger == AttackTrigger::OnDamage)
        {
            self.enter(AttackState::Preparing, now);
        }
        DamageOutcome::Hit
    }

    fn base_color(&self) -> [f32; 4] {
        match self.kind {
            EnemyKind::Ordinary => colors::ENEMY_NORMAL,
            EnemyKind::Ranged(_) => colors::ENEMY_RANGED,
            EnemyKind::Boss { .. } => colors::BOSS,
        }
    }

    pub fn draw(&self, list: &mut DrawList, sprites: &SpriteRegistry, now: f32) {
        if !self.is_renderable(now) {
            return;
        }

        // Death: squash and fade
        let t = self.death_progress(now);
        let radius = self.radius * (1.0 - 0.6 * t);
        let mut alpha = 1.0 - t;

        for (i, p) in self.afterimages.iter().enumerate() {
            let fade = 0.35 * (i + 1) as f32 / (MAX_AFTERIMAGES + 1) as f32;
            list.circle(*p, radius, colors::with_alpha(self.base_color(), fade));
        }

        let flashing = now < self.hit_flash_until;
        if self.state == AttackState::Preparing && !flashing {
            alpha *= 0.5 + 0.5 * (0.5 + 0.5 * (now * 20.0).sin());
        }

        match self.sprite.as_deref().and_then(|key| sprites.get(key)) {
            Some(sprite) if !flashing => list.sprite(sprite, self.pos, radius, alpha),
            _ => {
                let color = if flashing {
                    colors::HIT_FLASH
                } else {
                    self.base_color()
                };
                list.circle(self.pos, radius, colors::with_alpha(color, alpha));
            }
        }

        if self.is_alive() {
            let size = (self.radius * 0.9).floor();
            list.text(self.pos, size, self.hp.to_string(), colors::ENEMY_LABEL);
        }
    }
}
