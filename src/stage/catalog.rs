//! Resolved stage pack: every id reference checked, every value in range

use std::collections::{HashMap, HashSet};

use glam::Vec2;

use super::StageError;
use super::schema::{RawAttack, RawMonster, RawStagePack};
use crate::consts::{BOSS_SPEED_FACTOR, ENEMY_RADIUS, ENEMY_SPEED};
use crate::sim::enemy::{
    AttackPattern, AttackSpec, AttackTrigger, DropSpec, Enemy, EnemyKind, ScoreClass,
};
use crate::sim::state::ItemKind;

/// Fire period used when a periodic attacker omits one
const DEFAULT_ATTACK_PERIOD: f32 = 3.0;

/// Base score values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreTable {
    pub normal: f32,
    pub attacker: f32,
    pub stage_clear: f32,
    pub item: f32,
    /// Extra award for a pickup whose effect is already capped
    pub item_bonus: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonsterSpec {
    pub id: String,
    pub hp: i32,
    pub radius: f32,
    pub sprite: Option<String>,
    pub attack: Option<AttackSpec>,
    pub boss: bool,
    pub drop: Option<DropSpec>,
}

impl MonsterSpec {
    /// Build a live enemy. `speed` is the spawn's formation speed.
    ///
    /// Only a `roaming` boss steers itself, at a fraction of that speed. A
    /// boss placed in a formation follows its trail slot like any member and
    /// keeps its attack and score class.
    pub fn instantiate(
        &self,
        pos: Vec2,
        heading: f32,
        speed: f32,
        now: f32,
        roaming: bool,
    ) -> Enemy {
        let kind = match (&self.attack, self.boss && roaming) {
            (attack, true) => EnemyKind::Boss {
                attack: attack.clone(),
                speed: speed * BOSS_SPEED_FACTOR,
            },
            (Some(attack), false) => EnemyKind::Ranged(attack.clone()),
            (None, false) => EnemyKind::Ordinary,
        };
        let mut enemy = Enemy::new(self.id.clone(), pos, self.radius, self.hp, kind, now);
        if self.boss {
            enemy.score_class = ScoreClass::Attacker;
        }
        enemy.heading = heading;
        enemy.drop = self.drop;
        enemy.sprite = self.sprite.clone();
        enemy
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupSpec {
    pub id: String,
    pub monster_ids: Vec<String>,
    /// 1 or 2
    pub columns: usize,
}

impl GroupSpec {
    /// A group made of a single boss spawns free-roaming, not in formation
    pub fn is_single_boss(&self, pack: &StagePack) -> bool {
        self.monster_ids.len() == 1
            && pack
                .monsters
                .get(&self.monster_ids[0])
                .is_some_and(|m| m.boss)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpawnSpec {
    /// Seconds after wave activation
    pub delay: f32,
    pub group_id: String,
    /// Formation speed (px/s)
    pub speed: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaveSpec {
    pub id: String,
    pub label: String,
    pub spawns: Vec<SpawnSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageSpec {
    pub number: u32,
    pub background: Option<String>,
    pub wave_ids: Vec<String>,
}

/// Read-only catalog the wave scheduler and orchestrator draw from
#[derive(Debug, Clone, PartialEq)]
pub struct StagePack {
    pub score: ScoreTable,
    pub monsters: HashMap<String, MonsterSpec>,
    pub groups: HashMap<String, GroupSpec>,
    pub waves: HashMap<String, WaveSpec>,
    /// Ordered by stage number
    pub stages: Vec<StageSpec>,
    attacks: usize,
}

impl StagePack {
    pub fn attack_count(&self) -> usize {
        self.attacks
    }

    pub fn stage(&self, index: usize) -> Option<&StageSpec> {
        self.stages.get(index)
    }
}

fn invalid(path: String, reason: impl Into<String>) -> StageError {
    StageError::InvalidValue {
        path,
        reason: reason.into(),
    }
}

fn parse_item(name: &str, path: String) -> Result<ItemKind, StageError> {
    match name {
        "heart" => Ok(ItemKind::Restorative),
        "power" => Ok(ItemKind::PowerUp),
        other => Err(invalid(path, format!("unknown item kind '{other}'"))),
    }
}

fn parse_trigger(name: &str, path: String) -> Result<AttackTrigger, StageError> {
    match name {
        "period" => Ok(AttackTrigger::Periodic),
        "damage" => Ok(AttackTrigger::OnDamage),
        "death" => Ok(AttackTrigger::OnDeath),
        other => Err(invalid(path, format!("unknown attack timing '{other}'"))),
    }
}

/// Pick the one populated pattern out of an attack parameter set
fn resolve_pattern(raw: &RawAttack, path: &str) -> Result<AttackPattern, StageError> {
    let mut patterns = Vec::new();
    if !raw.dir_angles.is_empty() {
        if raw.dir_speed <= 0.0 {
            return Err(invalid(format!("{path}.dir_speed"), "must be positive"));
        }
        patterns.push(AttackPattern::Burst {
            angles: raw
                .dir_angles
                .iter()
                .map(|deg| (*deg as f32).to_radians())
                .collect(),
            speed_multiplier: raw.dir_speed as f32,
        });
    }
    if raw.mine_radius > 0.0 && raw.mine_lifesec > 0.0 {
        patterns.push(AttackPattern::Mine {
            radius: raw.mine_radius as f32,
            lifetime: raw.mine_lifesec as f32,
        });
    }
    if raw.aoe_radius > 0.0 && raw.aoe_duration > 0.0 {
        patterns.push(AttackPattern::Pulse {
            radius: raw.aoe_radius as f32,
            duration: raw.aoe_duration as f32,
        });
    }
    match patterns.len() {
        1 => Ok(patterns.remove(0)),
        0 => Err(invalid(path.to_string(), "no attack pattern populated")),
        n => Err(invalid(
            path.to_string(),
            format!("{n} attack patterns populated, expected exactly one"),
        )),
    }
}

fn resolve_monster(
    raw: &RawMonster,
    path: &str,
    patterns: &HashMap<String, AttackPattern>,
) -> Result<MonsterSpec, StageError> {
    if raw.hp < 1.0 || raw.hp.fract() != 0.0 {
        return Err(invalid(format!("{path}.hp"), "must be a whole number of at least 1"));
    }
    let size = raw.size.unwrap_or(1.0);
    if size <= 0.0 {
        return Err(invalid(format!("{path}.size"), "must be positive"));
    }

    let attack = match &raw.attack_kind {
        None => None,
        Some(kind) => {
            let pattern = patterns
                .get(kind)
                .ok_or_else(|| StageError::UnknownReference {
                    path: format!("{path}.attackKind"),
                    kind: "attack",
                    id: kind.clone(),
                })?;
            let trigger = match &raw.attack_timing {
                Some(t) => parse_trigger(t, format!("{path}.attackTiming"))?,
                None => AttackTrigger::Periodic,
            };
            let period = raw.period.map_or(DEFAULT_ATTACK_PERIOD, |p| p as f32);
            if trigger == AttackTrigger::Periodic && period <= 0.0 {
                return Err(invalid(format!("{path}.period"), "must be positive"));
            }
            Some(AttackSpec {
                pattern: pattern.clone(),
                trigger,
                period,
            })
        }
    };

    let drop = match &raw.drop_item {
        None => None,
        Some(item) => {
            let kind = parse_item(item, format!("{path}.dropItem"))?;
            let chance = raw.drop_ratio.unwrap_or(1.0);
            if !(0.0..=1.0).contains(&chance) {
                return Err(invalid(format!("{path}.dropRatio"), "must be within [0, 1]"));
            }
            Some(DropSpec {
                kind,
                chance: chance as f32,
            })
        }
    };

    Ok(MonsterSpec {
        id: raw.id.clone(),
        hp: raw.hp as i32,
        radius: ENEMY_RADIUS * size as f32,
        sprite: raw.image.clone(),
        attack,
        boss: raw.boss,
        drop,
    })
}

/// Track ids seen under one collection, rejecting repeats
fn unique(seen: &mut HashSet<String>, id: &str, path: String) -> Result<(), StageError> {
    if !seen.insert(id.to_string()) {
        return Err(StageError::DuplicateId {
            path,
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Resolve a type-checked raw pack into the catalog
pub fn resolve(raw: RawStagePack) -> Result<StagePack, StageError> {
    let score = ScoreTable {
        normal: raw.score.normal as f32,
        attacker: raw.score.attacker as f32,
        stage_clear: raw.score.stage_clear as f32,
        item: raw.score.item as f32,
        item_bonus: raw.score.item_bonus as f32,
    };

    let mut seen = HashSet::new();
    let mut patterns = HashMap::new();
    for (i, attack) in raw.attack_details.iter().enumerate() {
        let path = format!("$.attackDetails[{i}]");
        unique(&mut seen, &attack.id, format!("{path}.id"))?;
        patterns.insert(attack.id.clone(), resolve_pattern(attack, &path)?);
    }

    let mut seen = HashSet::new();
    let mut monsters = HashMap::new();
    for (i, monster) in raw.monsters.iter().enumerate() {
        let path = format!("$.monsters[{i}]");
        unique(&mut seen, &monster.id, format!("{path}.id"))?;
        monsters.insert(monster.id.clone(), resolve_monster(monster, &path, &patterns)?);
    }

    let mut seen = HashSet::new();
    let mut groups = HashMap::new();
    for (i, group) in raw.groups.iter().enumerate() {
        let path = format!("$.groups[{i}]");
        unique(&mut seen, &group.id, format!("{path}.id"))?;
        if group.monster_ids.is_empty() {
            return Err(StageError::Empty {
                path: format!("{path}.monsterIds"),
            });
        }
        for (k, id) in group.monster_ids.iter().enumerate() {
            if !monsters.contains_key(id) {
                return Err(StageError::UnknownReference {
                    path: format!("{path}.monsterIds[{k}]"),
                    kind: "monster",
                    id: id.clone(),
                });
            }
        }
        let columns = match group.columns {
            None => 1,
            Some(c) if c == 1.0 || c == 2.0 => c as usize,
            Some(c) => {
                let reason = format!("must be 1 or 2, got {c}");
                return Err(invalid(format!("{path}.columns"), reason));
            }
        };
        groups.insert(
            group.id.clone(),
            GroupSpec {
                id: group.id.clone(),
                monster_ids: group.monster_ids.clone(),
                columns,
            },
        );
    }

    let mut seen = HashSet::new();
    let mut waves = HashMap::new();
    for (i, wave) in raw.waves.iter().enumerate() {
        let path = format!("$.waves[{i}]");
        unique(&mut seen, &wave.id, format!("{path}.id"))?;
        if wave.spawns.is_empty() {
            return Err(StageError::Empty {
                path: format!("{path}.spawns"),
            });
        }
        let mut spawns = Vec::with_capacity(wave.spawns.len());
        for (k, spawn) in wave.spawns.iter().enumerate() {
            let spath = format!("{path}.spawns[{k}]");
            if !groups.contains_key(&spawn.group_id) {
                return Err(StageError::UnknownReference {
                    path: format!("{spath}.groupId"),
                    kind: "group",
                    id: spawn.group_id.clone(),
                });
            }
            let delay = spawn.delay.unwrap_or(0.0);
            if delay < 0.0 {
                return Err(invalid(format!("{spath}.delay"), "must not be negative"));
            }
            if spawn.move_speed <= 0.0 {
                return Err(invalid(format!("{spath}.moveSpeed"), "must be positive"));
            }
            spawns.push(SpawnSpec {
                delay: delay as f32,
                group_id: spawn.group_id.clone(),
                speed: ENEMY_SPEED * spawn.move_speed as f32,
            });
        }
        waves.insert(
            wave.id.clone(),
            WaveSpec {
                id: wave.id.clone(),
                label: wave.label.clone().unwrap_or_else(|| wave.id.clone()),
                spawns,
            },
        );
    }

    if raw.stages.is_empty() {
        return Err(StageError::Empty {
            path: "$.stages".into(),
        });
    }
    let mut numbers = HashSet::new();
    let mut stages = Vec::with_capacity(raw.stages.len());
    for (i, stage) in raw.stages.iter().enumerate() {
        let path = format!("$.stages[{i}]");
        if stage.stage_no < 1.0 || stage.stage_no.fract() != 0.0 {
            return Err(invalid(format!("{path}.stageNo"), "must be a positive integer"));
        }
        let number = stage.stage_no as u32;
        unique(&mut numbers, &number.to_string(), format!("{path}.stageNo"))?;
        if stage.wave_ids.is_empty() {
            return Err(StageError::Empty {
                path: format!("{path}.waveIds"),
            });
        }
        for (k, id) in stage.wave_ids.iter().enumerate() {
            if !waves.contains_key(id) {
                return Err(StageError::UnknownReference {
                    path: format!("{path}.waveIds[{k}]"),
                    kind: "wave",
                    id: id.clone(),
                });
            }
        }
        stages.push(StageSpec {
            number,
            background: stage.bg.clone(),
            wave_ids: stage.wave_ids.clone(),
        });
    }
    stages.sort_by_key(|s| s.number);

    Ok(StagePack {
        score,
        monsters,
        groups,
        waves,
        stages,
        attacks: patterns.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn base() -> Value {
        json!({
            "score": {"normal": 10, "attacker": 30, "stageClear": 500, "item": 20, "itemBonus": 50},
            "monsters": [
                {"id": "chick", "hp": 3},
                {"id": "shooter", "hp": 5, "attackKind": "fan",
                 "attackTiming": "period", "period": 2.5,
                 "dropItem": "power", "dropRatio": 0.5},
                {"id": "bear", "hp": 20, "size": 2.0, "boss": true, "attackKind": "fan"}
            ],
            "attackDetails": [
                {"id": "fan", "dir_angles": [0, 90], "dir_speed": 1.0,
                 "mine_lifesec": 0, "mine_radius": 0, "aoe_radius": 0, "aoe_duration": 0}
            ],
            "groups": [
                {"id": "g1", "monsterIds": ["chick", "shooter"], "columns": 2},
                {"id": "boss", "monsterIds": ["bear"]}
            ],
            "waves": [
                {"id": "w1", "spawns": [
                    {"groupId": "g1", "moveSpeed": 1.0},
                    {"delay": 3, "groupId": "g1", "moveSpeed": 0.5}
                ]}
            ],
            "stages": [
                {"stageNo": 2, "waveIds": ["w1"]},
                {"stageNo": 1, "bg": "bg1.png", "waveIds": ["w1", "w1"]}
            ]
        })
    }

    fn load(value: Value) -> Result<StagePack, StageError> {
        StagePack::from_json_str(&value.to_string())
    }

    #[test]
    fn test_resolves_references_and_units() {
        let pack = load(base()).unwrap();
        assert_eq!(pack.attack_count(), 1);

        let shooter = &pack.monsters["shooter"];
        let attack = shooter.attack.as_ref().unwrap();
        assert_eq!(attack.period, 2.5);
        match &attack.pattern {
            AttackPattern::Burst { angles, .. } => {
                assert!((angles[1] - std::f32::consts::FRAC_PI_2).abs() < 1e-5)
            }
            other => panic!("unexpected pattern {other:?}"),
        }
        assert_eq!(shooter.drop.unwrap().kind, ItemKind::PowerUp);

        assert_eq!(pack.monsters["bear"].radius, ENEMY_RADIUS * 2.0);
        assert_eq!(pack.groups["g1"].columns, 2);
        assert_eq!(pack.groups["boss"].columns, 1);
        assert_eq!(pack.waves["w1"].spawns[1].speed, ENEMY_SPEED * 0.5);
        assert_eq!(pack.waves["w1"].label, "w1");
        // Sorted by number
        assert_eq!(pack.stages[0].number, 1);
        assert_eq!(pack.stages[0].background.as_deref(), Some("bg1.png"));
    }

    #[test]
    fn test_instantiate_picks_variant() {
        let pack = load(base()).unwrap();
        let now = 4.0;
        let chick = pack.monsters["chick"].instantiate(Vec2::ZERO, 0.0, 100.0, now, false);
        assert_eq!(chick.kind, EnemyKind::Ordinary);
        assert_eq!(chick.state_entered_at, now);

        let shooter = pack.monsters["shooter"].instantiate(Vec2::ZERO, 0.0, 100.0, now, false);
        assert!(matches!(shooter.kind, EnemyKind::Ranged(_)));

        let bear = pack.monsters["bear"].instantiate(Vec2::ZERO, 0.0, 100.0, now, true);
        match bear.kind {
            EnemyKind::Boss { speed, ref attack } => {
                assert!((speed - 90.0).abs() < 1e-4);
                assert!(attack.is_some());
            }
            ref other => panic!("unexpected kind {other:?}"),
        }
        assert!(pack.groups["boss"].is_single_boss(&pack));
        assert!(!pack.groups["g1"].is_single_boss(&pack));
    }

    #[test]
    fn test_boss_in_formation_does_not_roam() {
        let pack = load(base()).unwrap();
        let bear = pack.monsters["bear"].instantiate(Vec2::ZERO, 0.0, 100.0, 0.0, false);
        assert!(matches!(bear.kind, EnemyKind::Ranged(_)));
        assert_eq!(bear.score_class, ScoreClass::Attacker);
    }

    #[test]
    fn test_unknown_monster_in_group_is_fatal() {
        let mut pack = base();
        pack["groups"][0]["monsterIds"] = json!(["chick", "ghost"]);
        let err = load(pack).unwrap_err();
        assert!(matches!(
            &err,
            StageError::UnknownReference { path, id, .. }
                if path == "$.groups[0].monsterIds[1]" && id == "ghost"
        ));
    }

    #[test]
    fn test_unknown_wave_and_group_are_fatal() {
        let mut pack = base();
        pack["stages"][0]["waveIds"] = json!(["w9"]);
        let err = load(pack).unwrap_err();
        assert!(matches!(err, StageError::UnknownReference { kind: "wave", .. }));

        let mut pack = base();
        pack["waves"][0]["spawns"][0]["groupId"] = json!("nope");
        let err = load(pack).unwrap_err();
        assert!(matches!(err, StageError::UnknownReference { kind: "group", .. }));
    }

    #[test]
    fn test_duplicate_ids_are_fatal() {
        let mut pack = base();
        pack["monsters"][1]["id"] = json!("chick");
        let err = load(pack).unwrap_err();
        assert!(matches!(&err, StageError::DuplicateId { path, .. } if path == "$.monsters[1].id"));
    }

    #[test]
    fn test_attack_needs_exactly_one_pattern() {
        let mut pack = base();
        pack["attackDetails"][0]["mine_radius"] = json!(12);
        pack["attackDetails"][0]["mine_lifesec"] = json!(3);
        assert!(matches!(load(pack).unwrap_err(), StageError::InvalidValue { .. }));

        let mut pack = base();
        pack["attackDetails"][0]["dir_angles"] = json!([]);
        assert!(matches!(load(pack).unwrap_err(), StageError::InvalidValue { .. }));
    }

    #[test]
    fn test_out_of_range_values() {
        let mut pack = base();
        pack["monsters"][1]["dropRatio"] = json!(1.5);
        assert!(load(pack).is_err());

        let mut pack = base();
        pack["groups"][0]["columns"] = json!(3);
        assert!(load(pack).is_err());

        let mut pack = base();
        pack["monsters"][0]["hp"] = json!(0);
        assert!(load(pack).is_err());

        let mut pack = base();
        pack["monsters"][1]["attackTiming"] = json!("sometimes");
        assert!(load(pack).is_err());
    }

    #[test]
    fn test_fractional_hp_is_rejected() {
        let mut pack = base();
        pack["monsters"][0]["hp"] = json!(2.5);
        let err = load(pack).unwrap_err();
        assert!(
            matches!(&err, StageError::InvalidValue { path, .. } if path == "$.monsters[0].hp")
        );
    }

    #[test]
    fn test_no_stages_is_fatal() {
        let mut pack = base();
        pack["stages"] = json!([]);
        let err = load(pack).unwrap_err();
        assert_eq!(err.to_string(), "[DATA SCHEMA] $.stages: must not be empty");
    }
}
