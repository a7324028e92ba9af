/// Entities: the actor record shared by player and enemies, plus bullets.
///
/// One flat `Actor` struct carries everything kinematics needs. What
/// differs between the player and an enemy lives in `Role`, so the
/// simulation loop can treat every body the same way and dispatch on
/// the role only where behavior actually differs.

use std::collections::BTreeMap;

use glam::Vec2;

use super::ai::EnemyAi;

pub type ActorId = u32;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Facing {
    Left,
    Right,
}

impl Facing {
    /// Unit x direction: -1 for left, +1 for right.
    pub fn sign(self) -> f32 {
        match self {
            Facing::Left => -1.0,
            Facing::Right => 1.0,
        }
    }

    pub fn toward(dx: f32) -> Facing {
        if dx < 0.0 { Facing::Left } else { Facing::Right }
    }
}

/// Horizontal movement state.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Movement {
    Still,
    Left,
    Right,
}

/// Vertical movement state.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Vertical {
    Grounded,
    Rising,
    Falling,
}

/// Bullet type. Each enemy kind is only hurt by one of these.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AmmoKind {
    Copper,
    Silver,
    Gold,
}

impl AmmoKind {
    pub const ALL: [AmmoKind; 3] = [AmmoKind::Copper, AmmoKind::Silver, AmmoKind::Gold];

    pub fn next(self) -> AmmoKind {
        match self {
            AmmoKind::Copper => AmmoKind::Silver,
            AmmoKind::Silver => AmmoKind::Gold,
            AmmoKind::Gold => AmmoKind::Copper,
        }
    }

    pub fn prev(self) -> AmmoKind {
        match self {
            AmmoKind::Copper => AmmoKind::Gold,
            AmmoKind::Silver => AmmoKind::Copper,
            AmmoKind::Gold => AmmoKind::Silver,
        }
    }

    /// 0-based selection index (keys 1..3).
    pub fn from_index(i: usize) -> Option<AmmoKind> {
        Self::ALL.get(i).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            AmmoKind::Copper => "Copper",
            AmmoKind::Silver => "Silver",
            AmmoKind::Gold => "Gold",
        }
    }
}

/// Collision box around the bottom-center anchor.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Body {
    pub half_width: f32,
    pub height: f32,
}

/// Per-kind movement/size tuning used when an actor is created.
#[derive(Clone, Copy, Debug)]
pub struct ActorTuning {
    /// Horizontal speed, px/s.
    pub move_rate: f32,
    /// Maximum jump height, px.
    pub max_jump: f32,
    pub width: f32,
    pub height: f32,
    pub hp: i32,
}

// ── Player-only state ──

#[derive(Clone, Debug)]
pub struct PlayerState {
    pub ammo: u32,
    pub max_ammo: u32,
    pub mode: AmmoKind,
    /// Aim vector relative to the body center, already scaled to reach.
    pub aim: Vec2,
    /// World point being aimed at, if the pointer has been used.
    pub aim_target: Option<Vec2>,
    /// Seconds left in the firing pose.
    pub attack_timer: f32,
}

impl PlayerState {
    pub fn new(max_ammo: u32) -> Self {
        PlayerState {
            ammo: max_ammo,
            max_ammo,
            mode: AmmoKind::Copper,
            aim: Vec2::new(1.0, 0.0),
            aim_target: None,
            attack_timer: 0.0,
        }
    }

    pub fn is_attacking(&self) -> bool {
        self.attack_timer > 0.0
    }
}

#[derive(Clone, Debug)]
pub enum Role {
    Player(PlayerState),
    Enemy(EnemyAi),
}

#[derive(Clone, Debug)]
pub struct Actor {
    pub id: ActorId,
    /// Bottom-center anchor, world pixels.
    pub pos: Vec2,
    /// Anchor to top-left corner of the collision/visual box.
    pub offset: Vec2,
    /// px/s. Horizontal is the move rate while walking, vertical mirrors
    /// the last vertical displacement.
    pub velocity: Vec2,
    pub movement: Movement,
    pub facing: Facing,
    pub vertical: Vertical,
    pub vert_travel: f32,
    pub max_vert_travel: f32,
    pub move_rate: f32,
    pub body: Body,
    /// Rows the body spans when its feet sit on a row top.
    pub height_tiles: i32,
    pub hp: i32,
    pub max_hp: i32,
    /// Seconds of hit flash / invulnerability left.
    pub hit_timer: f32,
    /// Current animation name; the presentation layer resolves it.
    pub animation: &'static str,
    /// Last known visibility of every other tracked actor.
    pub visibility: BTreeMap<ActorId, bool>,
    pub role: Role,
}

impl Actor {
    fn base(id: ActorId, pos: Vec2, tuning: &ActorTuning, tile_h: f32, role: Role) -> Self {
        let half_width = tuning.width / 2.0;
        Actor {
            id,
            pos,
            offset: Vec2::new(-half_width, -tuning.height),
            velocity: Vec2::ZERO,
            movement: Movement::Still,
            facing: Facing::Right,
            vertical: Vertical::Falling,
            vert_travel: 0.0,
            max_vert_travel: tuning.max_jump,
            move_rate: tuning.move_rate,
            body: Body { half_width, height: tuning.height },
            height_tiles: (tuning.height / tile_h.max(1.0)).ceil() as i32,
            hp: tuning.hp,
            max_hp: tuning.hp,
            hit_timer: 0.0,
            animation: "idle",
            visibility: BTreeMap::new(),
            role,
        }
    }

    pub fn player(id: ActorId, pos: Vec2, tuning: &ActorTuning, tile_h: f32, ammo: u32) -> Self {
        Actor::base(id, pos, tuning, tile_h, Role::Player(PlayerState::new(ammo)))
    }

    pub fn enemy(id: ActorId, pos: Vec2, tuning: &ActorTuning, tile_h: f32, ai: EnemyAi) -> Self {
        let mut a = Actor::base(id, pos, tuning, tile_h, Role::Enemy(ai));
        a.facing = Facing::Left;
        a
    }

    pub fn is_player(&self) -> bool {
        matches!(self.role, Role::Player(_))
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    pub fn ai(&self) -> Option<&EnemyAi> {
        match &self.role {
            Role::Enemy(ai) => Some(ai),
            Role::Player(_) => None,
        }
    }

    pub fn ai_mut(&mut self) -> Option<&mut EnemyAi> {
        match &mut self.role {
            Role::Enemy(ai) => Some(ai),
            Role::Player(_) => None,
        }
    }

    pub fn player_state(&self) -> Option<&PlayerState> {
        match &self.role {
            Role::Player(p) => Some(p),
            Role::Enemy(_) => None,
        }
    }

    pub fn player_state_mut(&mut self) -> Option<&mut PlayerState> {
        match &mut self.role {
            Role::Player(p) => Some(p),
            Role::Enemy(_) => None,
        }
    }

    pub fn top_left(&self) -> Vec2 {
        self.pos + self.offset
    }

    pub fn head_y(&self) -> f32 {
        self.pos.y - self.body.height
    }

    /// Middle of the collision box.
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.pos.x, self.pos.y - self.body.height / 2.0)
    }
}

#[derive(Clone, Debug)]
pub struct Bullet {
    pub pos: Vec2,
    /// px/s.
    pub vel: Vec2,
    pub kind: AmmoKind,
}

/// Ammo selection request from the input layer.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ModeChange {
    Next,
    Prev,
    Set(AmmoKind),
}

/// One tick of player intent. Movement is level-triggered (held key),
/// everything else is edge-triggered.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameInput {
    pub movement: Option<Facing>,
    pub jump: bool,
    pub fire: bool,
    pub reload: bool,
    pub mode: Option<ModeChange>,
    /// World point under the pointer, when it moved this frame.
    pub aim: Option<Vec2>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ammo_cycles_both_ways() {
        let mut k = AmmoKind::Copper;
        for _ in 0..3 { k = k.next(); }
        assert_eq!(k, AmmoKind::Copper);
        assert_eq!(AmmoKind::Copper.prev(), AmmoKind::Gold);
        assert_eq!(AmmoKind::Gold.next(), AmmoKind::Copper);
        assert_eq!(AmmoKind::from_index(1), Some(AmmoKind::Silver));
        assert_eq!(AmmoKind::from_index(3), None);
    }

    #[test]
    fn offset_points_to_top_left() {
        let t = ActorTuning { move_rate: 10.0, max_jump: 20.0, width: 12.0, height: 36.0, hp: 3 };
        let a = Actor::player(1, Vec2::new(50.0, 100.0), &t, 8.0, 6);
        assert_eq!(a.top_left(), Vec2::new(44.0, 64.0));
        assert_eq!(a.head_y(), 64.0);
        assert_eq!(a.height_tiles, 5);
        assert!(a.is_player());
        assert_eq!(a.player_state().map(|p| p.ammo), Some(6));
    }
}
