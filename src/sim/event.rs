/// Events emitted during a simulation step.
/// The presentation layer consumes these for HUD, sound and messages.

use crate::domain::entity::{ActorId, AmmoKind};
use super::objective::Rank;

/// Once-per-tick snapshot of the numbers the HUD shows.
#[derive(Clone, Debug, PartialEq)]
pub struct Status {
    pub hp: i32,
    pub max_hp: i32,
    pub ammo: u32,
    pub max_ammo: u32,
    pub mode: AmmoKind,
    pub score: u32,
    pub elapsed: f32,
    pub wave: u32,
    pub waves: u32,
    pub enemies: usize,
    pub kills: u32,
    pub kill_target: u32,
    pub time_left: f32,
}

#[derive(Clone, Debug, PartialEq)]
#[allow(dead_code)]
pub enum GameEvent {
    BulletFired { mode: AmmoKind },
    Reloaded,
    ModeChanged(AmmoKind),
    EnemyHit { id: ActorId },
    BulletDeflected { id: ActorId },
    BulletBlocked,
    EnemyKilled { id: ActorId, bonus: u32 },
    ActorsRemoved(Vec<ActorId>),
    EnemyAttacked { id: ActorId },
    PlayerHurt { hp: i32 },
    PlayerKilled,
    WaveStarted { wave: u32, size: usize },
    ObjectiveComplete { rank: Rank, bonus: u32 },
    ObjectiveFailed,
    Victory,
    Status(Status),
}
