//! Stage pack: externally authored monster/attack/group/wave/stage data
//!
//! Loading is two-pass: the raw JSON is walked first so that type errors
//! carry a `$.path` to the offending value, then it is deserialized and
//! resolved into a [`StagePack`] whose cross references are all known to be
//! valid. Every failure is fatal.

pub mod catalog;
pub mod schema;

pub use catalog::{GroupSpec, MonsterSpec, ScoreTable, SpawnSpec, StagePack, StageSpec, WaveSpec};

use thiserror::Error;

/// Embedded default stage pack
pub const DEFAULT_STAGE_PACK: &str = include_str!("../../assets/stage_pack.json");

/// Stage data could not be loaded
#[derive(Debug, Error)]
pub enum StageError {
    #[error("stage pack is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("[DATA SCHEMA] {path}: expected {expected}, got {got}")]
    Schema {
        path: String,
        expected: &'static str,
        got: String,
    },
    #[error("[DATA SCHEMA] {path}: unknown {kind} id '{id}'")]
    UnknownReference {
        path: String,
        kind: &'static str,
        id: String,
    },
    #[error("[DATA SCHEMA] {path}: duplicate id '{id}'")]
    DuplicateId { path: String, id: String },
    #[error("[DATA SCHEMA] {path}: {reason}")]
    InvalidValue { path: String, reason: String },
    #[error("[DATA SCHEMA] {path}: must not be empty")]
    Empty { path: String },
}

impl StagePack {
    /// Parse, validate and resolve a stage pack from JSON text
    pub fn from_json_str(text: &str) -> Result<Self, StageError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        schema::validate(&value)?;
        let raw: schema::RawStagePack = serde_json::from_value(value)?;
        let pack = catalog::resolve(raw)?;
        log::info!(
            "[DATA] monsters={} attacks={} groups={} waves={} stages={}",
            pack.monsters.len(),
            pack.attack_count(),
            pack.groups.len(),
            pack.waves.len(),
            pack.stages.len()
        );
        Ok(pack)
    }

    /// The pack compiled into the binary
    pub fn embedded() -> Result<Self, StageError> {
        Self::from_json_str(DEFAULT_STAGE_PACK)
    }
}
