/// Enemy AI: a per-enemy aggression state machine.
///
/// ## Model
///
/// Each enemy keeps a set of **aggressors**, the hostile actors it is
/// currently fighting. The set is fed by visibility transitions that the
/// simulation loop computes:
///
///   - `on_enter_view`   hostile actor appears; adopted when already
///                       aggressive or close enough to provoke
///   - `on_visible_tick` every tick while visible; adopts, chases, attacks
///   - `on_exit_view`    actor leaves; an emptied set starts the decay timer
///
/// An enemy is aggressive while its set is non-empty or the decay timer
/// is still running. Being hit refreshes the timer. Allies that see each
/// other share aggressor sets, one hop per tick. A shared aggressor the
/// enemy cannot see itself is held only while some visible ally keeps
/// offering it, and each hop adds one to its relay count so a ring of
/// allies cannot keep it alive on its own.
///
/// The AI never moves its actor directly. It returns `AiCommand`s that the
/// simulation loop applies through the kinematics intents.
///
/// All four kinds share this one implementation; they differ only by the
/// numbers in their `AiProfile`.

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec2;
use rand::Rng;

use super::entity::{ActorId, AmmoKind, Facing};

/// Seconds an enemy stays aggressive after losing every aggressor.
pub const AGGRO_DECAY_SECS: f32 = 3.0;

/// Aggressors are not relayed further than this many allies.
pub const MAX_RELAY_HOPS: u8 = 8;

/// A target this far above (px) makes a chasing enemy jump.
const JUMP_TRIGGER_HEIGHT: f32 = 12.0;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AiKind {
    Inert,
    Passive,
    Active,
    Aggressive,
}

impl AiKind {
    /// Kinds produced by the wave factory.
    pub const SPAWNABLE: [AiKind; 3] = [AiKind::Passive, AiKind::Active, AiKind::Aggressive];

    pub fn profile(self) -> AiProfile {
        match self {
            AiKind::Inert => AiProfile {
                view_range: 0.0,
                aggress_range: -1.0,
                attack_range: 0.0,
                attack_cooldown: f32::INFINITY,
                damage: 0,
                walk_chance: 0.0,
                walk_time: 0.0,
                idle_time: 1.0,
            },
            AiKind::Passive => AiProfile {
                view_range: 96.0,
                aggress_range: -1.0,
                attack_range: 20.0,
                attack_cooldown: 1.5,
                damage: 1,
                walk_chance: 0.3,
                walk_time: 1.0,
                idle_time: 0.5,
            },
            AiKind::Active => AiProfile {
                view_range: 160.0,
                aggress_range: 96.0,
                attack_range: 24.0,
                attack_cooldown: 1.0,
                damage: 1,
                walk_chance: 0.6,
                walk_time: 1.0,
                idle_time: 0.5,
            },
            AiKind::Aggressive => AiProfile {
                view_range: 224.0,
                aggress_range: 224.0,
                attack_range: 28.0,
                attack_cooldown: 0.75,
                damage: 1,
                walk_chance: 0.9,
                walk_time: 1.0,
                idle_time: 0.5,
            },
        }
    }

    /// The only bullet type that hurts this kind.
    pub fn weakness(self) -> AmmoKind {
        match self {
            AiKind::Inert | AiKind::Passive => AmmoKind::Copper,
            AiKind::Active => AmmoKind::Silver,
            AiKind::Aggressive => AmmoKind::Gold,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AiKind::Inert => "inert",
            AiKind::Passive => "passive",
            AiKind::Active => "active",
            AiKind::Aggressive => "aggressive",
        }
    }
}

/// Ranges in px, times in seconds. A negative aggress range never triggers.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct AiProfile {
    pub view_range: f32,
    pub aggress_range: f32,
    pub attack_range: f32,
    pub attack_cooldown: f32,
    pub damage: i32,
    /// Probability that an idle decision starts a walk.
    pub walk_chance: f64,
    pub walk_time: f32,
    pub idle_time: f32,
}

/// Intent for the enemy's own actor.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum AiCommand {
    MoveLeft,
    MoveRight,
    Stop,
    Jump,
    Face(Facing),
    Attack { target: ActorId, damage: i32 },
}

/// What the simulation loop tells the AI about one visible actor.
#[derive(Clone, Copy, Debug)]
pub struct Sighting {
    pub id: ActorId,
    /// From this enemy's body center to the other actor's (x wrapped).
    pub delta: Vec2,
    pub distance: f32,
    /// Only hostile actors can become aggressors; others are allies.
    pub hostile: bool,
    pub grounded: bool,
}

#[derive(Clone, Debug)]
pub struct EnemyAi {
    kind: AiKind,
    profile: AiProfile,
    aggressors: BTreeSet<ActorId>,
    /// Aggressors held only through allies, with their relay count.
    relayed: BTreeMap<ActorId, u8>,
    /// Offers collected this tick, promoted by `retain_visible`.
    incoming: BTreeMap<ActorId, u8>,
    decay_secs: f32,
    aggro_decay: f32,
    attack_timer: f32,
    walk_timer: f32,
}

impl EnemyAi {
    pub fn new(kind: AiKind) -> Self {
        EnemyAi::with_profile(kind, kind.profile())
    }

    pub fn with_profile(kind: AiKind, profile: AiProfile) -> Self {
        EnemyAi {
            kind,
            profile,
            aggressors: BTreeSet::new(),
            relayed: BTreeMap::new(),
            incoming: BTreeMap::new(),
            decay_secs: AGGRO_DECAY_SECS,
            aggro_decay: 0.0,
            attack_timer: 0.0,
            walk_timer: 0.0,
        }
    }

    pub fn with_decay(mut self, secs: f32) -> Self {
        self.decay_secs = secs;
        self
    }

    pub fn kind(&self) -> AiKind { self.kind }
    pub fn view_range(&self) -> f32 { self.profile.view_range }
    pub fn aggress_range(&self) -> f32 { self.profile.aggress_range }
    pub fn attack_range(&self) -> f32 { self.profile.attack_range }
    pub fn attack_cooldown(&self) -> f32 { self.profile.attack_cooldown }
    pub fn aggressors(&self) -> &BTreeSet<ActorId> { &self.aggressors }

    pub fn is_aggressive(&self) -> bool {
        !self.aggressors.is_empty() || self.aggro_decay > 0.0
    }

    // ── Visibility callbacks ──

    pub fn on_enter_view(&mut self, s: &Sighting) {
        if !s.hostile { return; }
        if self.is_aggressive() || self.provoked_by(s.distance) {
            self.adopt(s.id);
        }
    }

    pub fn on_exit_view(&mut self, id: ActorId) {
        self.drop_aggressor(id);
    }

    /// Called every tick an actor stays visible. Returns the intents for
    /// this enemy's own actor.
    pub fn on_visible_tick(&mut self, s: &Sighting, self_grounded: bool) -> Vec<AiCommand> {
        if !s.hostile { return Vec::new(); }

        if !self.aggressors.contains(&s.id) {
            if !(self.is_aggressive() || self.provoked_by(s.distance)) {
                return Vec::new();
            }
            self.adopt(s.id);
        }

        let facing = Facing::toward(s.delta.x);
        let mut out = vec![AiCommand::Face(facing)];

        if s.distance <= self.profile.attack_range {
            out.push(AiCommand::Stop);
            if let Some(attack) = self.attempt_attack(s.id) {
                out.push(attack);
            }
        } else if s.distance <= self.chase_range() {
            out.push(match facing {
                Facing::Left => AiCommand::MoveLeft,
                Facing::Right => AiCommand::MoveRight,
            });
            let above = -s.delta.y > JUMP_TRIGGER_HEIGHT;
            if above && self_grounded && s.delta.x.abs() <= self.profile.attack_range * 2.0 {
                out.push(AiCommand::Jump);
            }
        } else {
            out.push(AiCommand::Stop);
        }
        out
    }

    /// Attack if the cooldown has elapsed.
    pub fn attempt_attack(&mut self, target: ActorId) -> Option<AiCommand> {
        if self.attack_timer > 0.0 { return None; }
        self.attack_timer = self.profile.attack_cooldown;
        Some(AiCommand::Attack { target, damage: self.profile.damage })
    }

    /// Idle wandering. Only decides when the walk timer has run out and
    /// the enemy is calm; never starts a walk in mid-air.
    pub fn decide_idle_movement<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        grounded: bool,
    ) -> Option<AiCommand> {
        if self.is_aggressive() || self.walk_timer > 0.0 || !grounded {
            return None;
        }
        if self.profile.walk_chance > 0.0 && rng.random_bool(self.profile.walk_chance) {
            self.walk_timer = self.profile.walk_time;
            if rng.random_bool(0.5) {
                Some(AiCommand::MoveLeft)
            } else {
                Some(AiCommand::MoveRight)
            }
        } else {
            self.walk_timer = self.profile.idle_time;
            Some(AiCommand::Stop)
        }
    }

    // ── Other inputs ──

    /// Taking damage always restarts the decay clock.
    pub fn on_hit(&mut self) {
        self.aggro_decay = self.decay_secs;
    }

    /// What this enemy passes on to allies that see it: every aggressor
    /// with its relay count, zero for the ones it found itself.
    pub fn relay_offer(&self) -> BTreeMap<ActorId, u8> {
        self.aggressors.iter()
            .map(|&id| (id, self.relayed.get(&id).copied().unwrap_or(0)))
            .collect()
    }

    /// Adopt an ally's offer. Entries already at the hop limit are ignored.
    pub fn import_aggressors(&mut self, offer: &BTreeMap<ActorId, u8>) {
        for (&id, &hops) in offer {
            if hops >= MAX_RELAY_HOPS { continue; }
            let hops = hops + 1;
            self.incoming.entry(id)
                .and_modify(|h| *h = (*h).min(hops))
                .or_insert(hops);
            if self.aggressors.insert(id) {
                self.aggro_decay = 0.0;
            }
        }
    }

    /// End of a reaction: keep aggressors this enemy can see or that an
    /// ally offered this tick, drop the rest. An emptied set starts decay.
    pub fn retain_visible<F: Fn(ActorId) -> bool>(&mut self, visible: F) {
        let incoming = std::mem::take(&mut self.incoming);
        let stale: Vec<ActorId> = self.aggressors.iter().copied()
            .filter(|&id| !visible(id) && !incoming.contains_key(&id))
            .collect();
        for id in stale {
            self.drop_aggressor(id);
        }
        self.relayed = incoming.into_iter().filter(|&(id, _)| !visible(id)).collect();
    }

    /// Purge a removed actor.
    pub fn forget(&mut self, id: ActorId) {
        self.drop_aggressor(id);
    }

    pub fn tick_timers(&mut self, dt: f32) {
        if self.attack_timer > 0.0 {
            self.attack_timer = (self.attack_timer - dt).max(0.0);
        }
        if self.walk_timer > 0.0 {
            self.walk_timer = (self.walk_timer - dt).max(0.0);
        }
        if self.aggressors.is_empty() && self.aggro_decay > 0.0 {
            self.aggro_decay = (self.aggro_decay - dt).max(0.0);
        }
    }

    // ── Internal ──

    fn provoked_by(&self, distance: f32) -> bool {
        self.profile.aggress_range >= 0.0 && distance <= self.profile.aggress_range
    }

    /// Aggressors beyond this are watched, not chased.
    fn chase_range(&self) -> f32 {
        self.profile.aggress_range.max(self.profile.attack_range)
    }

    fn adopt(&mut self, id: ActorId) {
        self.aggressors.insert(id);
        self.aggro_decay = 0.0;
    }

    fn drop_aggressor(&mut self, id: ActorId) {
        self.relayed.remove(&id);
        self.incoming.remove(&id);
        if self.aggressors.remove(&id) && self.aggressors.is_empty() {
            self.aggro_decay = self.decay_secs;
        }
    }
}
