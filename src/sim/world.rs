/// WorldState: the complete snapshot of a running game.
///
/// ## Ownership
///
/// The world owns every actor, bullet and timer. Nothing else holds a
/// reference into it between ticks; the AI and kinematics only ever see
/// the one actor they are working on, for the duration of a call.
///
/// ## Lifecycle lists
///
///   - `actors`   live bodies, the player included (`player_id`)
///   - `pending`  actors created during a tick; appended at the tick's end
///
/// Removals are collected during a tick and applied at one fixed point
/// in `step`, so no actor is referenced after it leaves the world.

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use crate::config::GameConfig;
use crate::domain::entity::{Actor, ActorId, AmmoKind, Bullet};
use crate::domain::physics;
use crate::domain::tile::TileMap;
use super::event::Status;
use super::objective::TimeObjective;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Title,
    Playing,
    GameOver,
    Victory,
}

pub const PLAYER_ID: ActorId = 0;

pub struct WorldState {
    pub map: TileMap,
    pub actors: Vec<Actor>,
    pub player_id: ActorId,
    pub bullets: Vec<Bullet>,
    pub pending: Vec<Actor>,
    next_id: ActorId,

    // ── Progress ──
    pub score: u32,
    pub elapsed: f32,
    pub tick: u64,
    pub wave: u32,
    pub waves_total: u32,
    pub objective: TimeObjective,

    // ── Meta ──
    pub phase: Phase,
    pub paused: bool,
    pub config: GameConfig,
    pub rng: Pcg32,

    // ── UI ──
    pub message: String,
    /// Seconds left on the message.
    pub message_timer: f32,
    pub status: Option<Status>,
}

impl WorldState {
    /// Fresh world on `map`. The player is placed but no wave is queued;
    /// see `level::start_level`.
    pub fn new(map: TileMap, config: GameConfig, seed: u64) -> Self {
        let mut rng = Pcg32::seed_from_u64(seed);
        let max_kills = config.enemy.waves * config.enemy.wave_size;
        let objective = TimeObjective::roll(&mut rng, max_kills);

        let tuning = config.player.tuning();
        let start_x = map.tile_w() * 1.5;
        let start_y = map.find_floor_row(map.column_at(start_x))
            .map_or(map.y_offset(), |row| map.row_top(row));
        let mut player = Actor::player(
            PLAYER_ID,
            Vec2::new(start_x, start_y),
            &tuning,
            map.tile_h(),
            config.player.ammo,
        );
        physics::settle(&mut player, &map);

        let mut world = WorldState {
            map,
            actors: vec![player],
            player_id: PLAYER_ID,
            bullets: Vec::new(),
            pending: Vec::new(),
            next_id: PLAYER_ID + 1,
            score: 0,
            elapsed: 0.0,
            tick: 0,
            wave: 0,
            waves_total: config.enemy.waves,
            objective,
            phase: Phase::Title,
            paused: false,
            config,
            rng,
            message: String::new(),
            message_timer: 0.0,
            status: None,
        };
        let view = world.config.view.width_px;
        let x = world.actors[0].pos.x;
        world.map.recenter(x, view);
        world
    }

    pub fn alloc_id(&mut self) -> ActorId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn player_index(&self) -> Option<usize> {
        self.actors.iter().position(|a| a.id == self.player_id)
    }

    pub fn player(&self) -> Option<&Actor> {
        self.actors.iter().find(|a| a.id == self.player_id)
    }

    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.actors.iter().find(|a| a.id == id)
    }

    pub fn enemy_count(&self) -> usize {
        self.actors.iter().filter(|a| !a.is_player()).count()
    }

    pub fn set_message(&mut self, msg: &str, secs: f32) {
        self.message = msg.to_string();
        self.message_timer = secs;
    }

    pub fn tick_message(&mut self, dt: f32) {
        if self.message_timer > 0.0 {
            self.message_timer -= dt;
            if self.message_timer <= 0.0 {
                self.message_timer = 0.0;
                self.message.clear();
            }
        }
    }

    /// Move every pending actor into the live list.
    pub fn apply_pending(&mut self) {
        for mut a in self.pending.drain(..) {
            physics::settle(&mut a, &self.map);
            self.actors.push(a);
        }
    }

    pub fn status(&self) -> Status {
        let (hp, max_hp, ammo, max_ammo, mode) = match self.player() {
            Some(p) => {
                let ps = p.player_state();
                (
                    p.hp,
                    p.max_hp,
                    ps.map_or(0, |s| s.ammo),
                    ps.map_or(0, |s| s.max_ammo),
                    ps.map_or(AmmoKind::Copper, |s| s.mode),
                )
            }
            None => (0, 0, 0, 0, AmmoKind::Copper),
        };
        Status {
            hp,
            max_hp,
            ammo,
            max_ammo,
            mode,
            score: self.score,
            elapsed: self.elapsed,
            wave: self.wave,
            waves: self.waves_total,
            enemies: self.enemy_count(),
            kills: self.objective.kills,
            kill_target: self.objective.kill_target,
            time_left: self.objective.time_left(),
        }
    }
}
