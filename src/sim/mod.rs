//! Simulation module
//!
//! All gameplay logic lives here:
//! - Frame-driven; time only advances through `tick`
//! - Single-threaded, one owner (`GameState`) for every world collection
//! - No rendering or platform dependencies beyond the draw list

pub mod collision;
pub mod enemy;
pub mod formation;
pub mod geom;
pub mod particles;
pub mod state;
pub mod tick;
pub mod waves;

use thiserror::Error;

pub use collision::{distance_allowed_links, effective_links};
pub use enemy::{
    AttackPattern, AttackSpec, AttackState, AttackTrigger, Command, DropSpec, Enemy, EnemyKind,
};
pub use formation::{EnemyGroup, Trail};
pub use geom::Bounds;
pub use particles::{BurstParams, ParticlePool};
pub use state::{
    AreaHazard, GameEvent, GameState, Item, ItemKind, Mine, Missile, PlayerMarker, SessionPhase,
};
pub use tick::{TickInput, tick};
pub use waves::{WaveManager, WavePhase, WaveSignal};

/// Runtime invariant failure; halts the session
#[derive(Debug, Error)]
pub enum SimError {
    #[error("no stage at index {0}")]
    UnknownStage(usize),
    #[error("unknown wave '{0}'")]
    UnknownWave(String),
    #[error("unknown group '{0}'")]
    UnknownGroup(String),
    #[error("unknown monster '{0}'")]
    UnknownMonster(String),
    #[error("non-finite {what}")]
    NonFinite { what: &'static str },
}
