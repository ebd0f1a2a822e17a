//! Raw stage pack layout and path-annotated type checking

use serde::Deserialize;
use serde_json::{Map, Value};

use super::StageError;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawScore {
    pub normal: f64,
    pub attacker: f64,
    pub stage_clear: f64,
    pub item: f64,
    pub item_bonus: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMonster {
    pub id: String,
    pub hp: f64,
    #[serde(default)]
    pub image: Option<String>,
    /// Radius multiplier relative to the base enemy radius
    #[serde(default)]
    pub size: Option<f64>,
    #[serde(default)]
    pub attack_kind: Option<String>,
    /// "period" | "damage" | "death"
    #[serde(default)]
    pub attack_timing: Option<String>,
    #[serde(default)]
    pub period: Option<f64>,
    #[serde(default)]
    pub drop_item: Option<String>,
    #[serde(default)]
    pub drop_ratio: Option<f64>,
    #[serde(default)]
    pub boss: bool,
}

/// Attack parameter set. Exactly one of the three patterns is populated.
#[derive(Debug, Clone, Deserialize)]
pub struct RawAttack {
    pub id: String,
    /// Degrees, relative to the attacker's heading
    pub dir_angles: Vec<f64>,
    /// Projectile speed multiplier
    pub dir_speed: f64,
    pub mine_lifesec: f64,
    pub mine_radius: f64,
    pub aoe_radius: f64,
    pub aoe_duration: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGroup {
    pub id: String,
    pub monster_ids: Vec<String>,
    #[serde(default)]
    pub columns: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSpawn {
    #[serde(default)]
    pub delay: Option<f64>,
    pub group_id: String,
    /// Formation speed multiplier
    pub move_speed: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawWave {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    pub spawns: Vec<RawSpawn>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStage {
    pub stage_no: f64,
    #[serde(default)]
    pub bg: Option<String>,
    pub wave_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStagePack {
    pub score: RawScore,
    #[serde(default)]
    pub monsters: Vec<RawMonster>,
    #[serde(default)]
    pub attack_details: Vec<RawAttack>,
    #[serde(default)]
    pub groups: Vec<RawGroup>,
    #[serde(default)]
    pub waves: Vec<RawWave>,
    #[serde(default)]
    pub stages: Vec<RawStage>,
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn mismatch(path: &str, expected: &'static str, got: &Value) -> StageError {
    StageError::Schema {
        path: path.to_string(),
        expected,
        got: type_name(got).to_string(),
    }
}

fn object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, StageError> {
    value.as_object().ok_or_else(|| mismatch(path, "object", value))
}

fn array<'a>(value: &'a Value, path: &str) -> Result<&'a Vec<Value>, StageError> {
    value.as_array().ok_or_else(|| mismatch(path, "array", value))
}

fn number(value: &Value, path: &str) -> Result<(), StageError> {
    match value.as_f64() {
        Some(n) if n.is_finite() => Ok(()),
        _ => Err(mismatch(path, "number", value)),
    }
}

fn string(value: &Value, path: &str) -> Result<(), StageError> {
    value
        .as_str()
        .map(|_| ())
        .ok_or_else(|| mismatch(path, "string", value))
}

fn boolean(value: &Value, path: &str) -> Result<(), StageError> {
    value
        .as_bool()
        .map(|_| ())
        .ok_or_else(|| mismatch(path, "boolean", value))
}

/// Required field: a missing key is reported as `null`
fn field<'a>(obj: &'a Map<String, Value>, key: &str) -> &'a Value {
    obj.get(key).unwrap_or(&Value::Null)
}

/// Optional field: absent keys are fine, present ones must type-check
fn optional(
    obj: &Map<String, Value>,
    key: &str,
    path: &str,
    check: fn(&Value, &str) -> Result<(), StageError>,
) -> Result<(), StageError> {
    match obj.get(key) {
        Some(value) => check(value, &format!("{path}.{key}")),
        None => Ok(()),
    }
}

/// Optional top-level list: absent means empty
fn list<'a>(root: &'a Map<String, Value>, key: &str) -> Result<&'a [Value], StageError> {
    match root.get(key) {
        Some(value) => Ok(array(value, &format!("$.{key}"))?.as_slice()),
        None => Ok(&[]),
    }
}

/// Check the shape of a stage pack, reporting the first offending path
pub fn validate(root: &Value) -> Result<(), StageError> {
    let root = object(root, "$")?;

    let score = object(field(root, "score"), "$.score")?;
    for key in ["normal", "attacker", "stageClear", "item", "itemBonus"] {
        number(field(score, key), &format!("$.score.{key}"))?;
    }

    for (i, monster) in list(root, "monsters")?.iter().enumerate() {
        let path = format!("$.monsters[{i}]");
        let m = object(monster, &path)?;
        string(field(m, "id"), &format!("{path}.id"))?;
        number(field(m, "hp"), &format!("{path}.hp"))?;
        optional(m, "image", &path, string)?;
        optional(m, "size", &path, number)?;
        optional(m, "attackKind", &path, string)?;
        optional(m, "attackTiming", &path, string)?;
        optional(m, "period", &path, number)?;
        optional(m, "dropItem", &path, string)?;
        optional(m, "dropRatio", &path, number)?;
        optional(m, "boss", &path, boolean)?;
    }

    for (i, attack) in list(root, "attackDetails")?.iter().enumerate() {
        let path = format!("$.attackDetails[{i}]");
        let a = object(attack, &path)?;
        string(field(a, "id"), &format!("{path}.id"))?;
        let angles = array(field(a, "dir_angles"), &format!("{path}.dir_angles"))?;
        for (k, angle) in angles.iter().enumerate() {
            number(angle, &format!("{path}.dir_angles[{k}]"))?;
        }
        for key in [
            "dir_speed",
            "mine_lifesec",
            "mine_radius",
            "aoe_radius",
            "aoe_duration",
        ] {
            number(field(a, key), &format!("{path}.{key}"))?;
        }
    }

    for (i, group) in list(root, "groups")?.iter().enumerate() {
        let path = format!("$.groups[{i}]");
        let g = object(group, &path)?;
        string(field(g, "id"), &format!("{path}.id"))?;
        let ids = array(field(g, "monsterIds"), &format!("{path}.monsterIds"))?;
        for (k, id) in ids.iter().enumerate() {
            string(id, &format!("{path}.monsterIds[{k}]"))?;
        }
        optional(g, "columns", &path, number)?;
    }

    for (i, wave) in list(root, "waves")?.iter().enumerate() {
        let path = format!("$.waves[{i}]");
        let w = object(wave, &path)?;
        string(field(w, "id"), &format!("{path}.id"))?;
        optional(w, "label", &path, string)?;
        let spawns = array(field(w, "spawns"), &format!("{path}.spawns"))?;
        for (k, spawn) in spawns.iter().enumerate() {
            let spath = format!("{path}.spawns[{k}]");
            let s = object(spawn, &spath)?;
            optional(s, "delay", &spath, number)?;
            string(field(s, "groupId"), &format!("{spath}.groupId"))?;
            number(field(s, "moveSpeed"), &format!("{spath}.moveSpeed"))?;
        }
    }

    for (i, stage) in list(root, "stages")?.iter().enumerate() {
        let path = format!("$.stages[{i}]");
        let s = object(stage, &path)?;
        number(field(s, "stageNo"), &format!("{path}.stageNo"))?;
        optional(s, "bg", &path, string)?;
        optional(s, "waveCount", &path, number)?;
        let ids = array(field(s, "waveIds"), &format!("{path}.waveIds"))?;
        for (k, id) in ids.iter().enumerate() {
            string(id, &format!("{path}.waveIds[{k}]"))?;
        }
    }

    Ok(())
}
