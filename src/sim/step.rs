/// The step function: advances the world by one tick.
///
/// Processing order:
///   0. Player intents (aim, move, jump, ammo mode, reload, fire)
///   1. Actor resolution: dead actors are collected, the rest run their
///      timers, idle AI and kinematics
///   2. Removal batch applied and broadcast (visibility + aggressor purge)
///   3. Visibility transitions and AI reactions, attacks on the player
///   4. Bullets: move, hit enemies, hit tiles, leave the view
///   5. Visible window recentered on the player
///   6. Objective clock, waves, pending adds, elapsed time and status
///
/// A removed actor is never looked up after step 2. Visibility reads a
/// snapshot of every enemy's aggressor set taken before any AI mutates,
/// so ally propagation travels one hop per tick regardless of list order.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::ai::{AiCommand, Sighting};
use crate::domain::entity::{Actor, ActorId, Facing, FrameInput, ModeChange, Vertical};
use crate::domain::physics;
use crate::domain::rules;
use super::event::GameEvent;
use super::level;
use super::objective::ObjectiveState;
use super::world::{Phase, WorldState};

/// Seconds an enemy flashes after a damaging hit.
const ENEMY_HIT_FLASH_SECS: f32 = 0.2;

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

pub fn step(world: &mut WorldState, input: FrameInput, dt: f32) -> Vec<GameEvent> {
    if world.phase != Phase::Playing || world.paused { return vec![]; }

    let mut events: Vec<GameEvent> = Vec::new();
    world.tick += 1;
    world.tick_message(dt);

    resolve_player_input(world, input, dt, &mut events);
    let removed = resolve_actors(world, dt, &mut events);
    remove_actors(world, &removed, &mut events);
    if world.phase == Phase::GameOver {
        publish_status(world, &mut events);
        return events;
    }
    resolve_visibility(world, &mut events);
    resolve_bullets(world, dt, &mut events);
    resolve_window(world);
    resolve_objective(world, dt, &mut events);
    resolve_waves(world, &mut events);
    world.apply_pending();

    world.elapsed += dt;
    publish_status(world, &mut events);

    events
}

fn publish_status(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    let status = world.status();
    world.status = Some(status.clone());
    events.push(GameEvent::Status(status));
}

// ══════════════════════════════════════════════════════════════
// Player
// ══════════════════════════════════════════════════════════════

fn resolve_player_input(world: &mut WorldState, input: FrameInput, dt: f32, events: &mut Vec<GameEvent>) {
    let Some(idx) = world.player_index() else { return };
    let world_w = world.map.pixel_width();
    let reach = world.config.player.aim_reach;
    let recovery = world.config.player.fire_recovery_ms as f32 / 1000.0;
    let bullet_speed = world.config.player.bullet_speed;
    let p = &mut world.actors[idx];

    // ── Aim ──
    if let Some(target) = input.aim {
        let dx = physics::wrapped_dx(p.pos.x, target.x, world_w);
        if dx != 0.0 { physics::face(p, Facing::toward(dx)); }
        if let Some(ps) = p.player_state_mut() { ps.aim_target = Some(target); }
    }
    let (center, facing) = (p.center(), p.facing);
    let attacking = match p.player_state_mut() {
        Some(ps) => {
            ps.aim = match ps.aim_target {
                Some(t) => rules::aim_vector(center, t, facing, reach, world_w),
                None => glam::Vec2::new(facing.sign() * reach, 0.0),
            };
            if ps.attack_timer > 0.0 {
                ps.attack_timer = (ps.attack_timer - dt).max(0.0);
            }
            ps.is_attacking()
        }
        None => return,
    };

    // ── Movement (the firing pose holds the player still) ──
    if attacking {
        physics::stop(p);
    } else {
        match input.movement {
            Some(Facing::Left) => physics::move_left(p),
            Some(Facing::Right) => physics::move_right(p),
            None => physics::stop(p),
        }
        if input.jump { physics::jump(p); }
    }

    let Some(ps) = p.player_state_mut() else { return };

    // ── Ammo mode ──
    if let Some(change) = input.mode {
        let mode = match change {
            ModeChange::Next => ps.mode.next(),
            ModeChange::Prev => ps.mode.prev(),
            ModeChange::Set(kind) => kind,
        };
        if mode != ps.mode {
            ps.mode = mode;
            events.push(GameEvent::ModeChanged(mode));
        }
    }

    // ── Reload / fire ──
    if input.reload && ps.ammo < ps.max_ammo && !attacking {
        ps.ammo = ps.max_ammo;
        events.push(GameEvent::Reloaded);
    }
    if input.fire && !attacking {
        if ps.ammo == 0 {
            ps.ammo = ps.max_ammo;
            events.push(GameEvent::Reloaded);
        } else {
            ps.ammo -= 1;
            ps.attack_timer = recovery;
            let (aim, mode) = (ps.aim, ps.mode);
            physics::stop(p);
            p.animation = "attack";
            world.bullets.push(rules::spawn_bullet(p, aim, mode, bullet_speed));
            events.push(GameEvent::BulletFired { mode });
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Step 1: actors
// ══════════════════════════════════════════════════════════════

/// Collect dead actors and advance the living. Dead enemies are scored
/// and returned for removal; a dead player sets `GameOver` once they are,
/// and nothing advances that tick.
fn resolve_actors(world: &mut WorldState, dt: f32, events: &mut Vec<GameEvent>) -> Vec<ActorId> {
    let kill_bonus = world.config.enemy.kill_bonus;
    let mut removed = Vec::new();
    let mut player_down = false;

    let dead: Vec<(ActorId, bool)> = world.actors.iter()
        .filter(|a| !a.is_alive())
        .map(|a| (a.id, a.is_player()))
        .collect();
    for (id, is_player) in dead {
        if is_player {
            player_down = true;
            continue;
        }
        world.score += kill_bonus;
        world.objective.on_kill();
        removed.push(id);
        events.push(GameEvent::EnemyKilled { id, bonus: kill_bonus });
    }
    if player_down {
        log::info!("player down at tick {} (score {})", world.tick, world.score);
        world.phase = Phase::GameOver;
        world.set_message("GAME OVER", 0.0);
        events.push(GameEvent::PlayerKilled);
        return removed;
    }

    let map = &world.map;
    let rng = &mut world.rng;
    for a in world.actors.iter_mut().filter(|a| a.is_alive()) {
        if a.hit_timer > 0.0 {
            a.hit_timer = (a.hit_timer - dt).max(0.0);
        }
        let grounded = a.vertical == Vertical::Grounded;
        let idle = match a.ai_mut() {
            Some(ai) => {
                ai.tick_timers(dt);
                ai.decide_idle_movement(&mut *rng, grounded)
            }
            None => None,
        };
        if let Some(cmd) = idle {
            apply_command(a, cmd, &mut Vec::new());
        }
        physics::update(a, map, dt);
    }

    removed
}

// ══════════════════════════════════════════════════════════════
// Step 2: removal
// ══════════════════════════════════════════════════════════════

fn remove_actors(world: &mut WorldState, removed: &[ActorId], events: &mut Vec<GameEvent>) {
    if removed.is_empty() { return; }
    world.actors.retain(|a| !removed.contains(&a.id));
    for a in world.actors.iter_mut() {
        for id in removed {
            a.visibility.remove(id);
            if let Some(ai) = a.ai_mut() { ai.forget(*id); }
        }
    }
    log::debug!("removed actors {:?}", removed);
    events.push(GameEvent::ActorsRemoved(removed.to_vec()));
}

// ══════════════════════════════════════════════════════════════
// Step 3: visibility and AI
// ══════════════════════════════════════════════════════════════

/// What one enemy sees this tick, computed before anything mutates.
struct Observation {
    idx: usize,
    /// Every other actor, with a sighting when it is in view.
    others: Vec<(ActorId, Option<Sighting>)>,
}

/// An attack queued by an enemy against another actor.
struct Strike {
    attacker: ActorId,
    target: ActorId,
    damage: i32,
}

fn resolve_visibility(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    let world_w = world.map.pixel_width();

    // ── Observation pass ──
    let mut observations = Vec::new();
    let mut allies: BTreeMap<ActorId, BTreeMap<ActorId, u8>> = BTreeMap::new();
    for (idx, observer) in world.actors.iter().enumerate() {
        let Some(ai) = observer.ai() else { continue };
        if ai.is_aggressive() {
            allies.insert(observer.id, ai.relay_offer());
        }
        let others = world.actors.iter()
            .filter(|t| t.id != observer.id)
            .map(|t| {
                let sighting = rules::can_see(observer, ai.view_range(), t, world_w)
                    .map(|line| Sighting {
                        id: t.id,
                        delta: line.delta,
                        distance: line.distance,
                        hostile: t.is_player(),
                        grounded: t.vertical == Vertical::Grounded,
                    });
                (t.id, sighting)
            })
            .collect();
        observations.push(Observation { idx, others });
    }

    // ── Reaction pass ──
    let mut strikes = Vec::new();
    for obs in observations {
        let a = &mut world.actors[obs.idx];
        let grounded = a.vertical == Vertical::Grounded;
        let mut commands = Vec::new();
        let mut in_view = BTreeSet::new();

        for (id, sighting) in &obs.others {
            let was = a.visibility.get(id).copied().unwrap_or(false);
            a.visibility.insert(*id, sighting.is_some());
            let Some(ai) = a.ai_mut() else { continue };
            match (was, sighting) {
                (false, Some(s)) => ai.on_enter_view(s),
                (true, None) => ai.on_exit_view(*id),
                _ => {}
            }
            if let Some(s) = sighting {
                in_view.insert(*id);
                if !s.hostile {
                    if let Some(theirs) = allies.get(id) {
                        ai.import_aggressors(theirs);
                    }
                }
            }
        }

        let Some(ai) = a.ai_mut() else { continue };
        for s in obs.others.iter().filter_map(|(_, s)| s.as_ref()).filter(|s| s.hostile) {
            commands.extend(ai.on_visible_tick(s, grounded));
        }
        ai.retain_visible(|id| in_view.contains(&id));

        for cmd in commands {
            apply_command(a, cmd, &mut strikes);
        }
    }

    resolve_strikes(world, strikes, events);
}

fn apply_command(a: &mut Actor, cmd: AiCommand, strikes: &mut Vec<Strike>) {
    match cmd {
        AiCommand::MoveLeft => physics::move_left(a),
        AiCommand::MoveRight => physics::move_right(a),
        AiCommand::Stop => physics::stop(a),
        AiCommand::Jump => { physics::jump(a); }
        AiCommand::Face(facing) => physics::face(a, facing),
        AiCommand::Attack { target, damage } => {
            a.animation = "attack";
            strikes.push(Strike { attacker: a.id, target, damage });
        }
    }
}

/// Land queued attacks. A target still flashing from a previous hit
/// ignores them.
fn resolve_strikes(world: &mut WorldState, strikes: Vec<Strike>, events: &mut Vec<GameEvent>) {
    let invulnerable = world.config.player.hit_invulnerable_ms as f32 / 1000.0;
    for s in strikes {
        let Some(target) = world.actors.iter_mut().find(|a| a.id == s.target) else { continue };
        if !target.is_alive() || target.hit_timer > 0.0 { continue; }
        target.hp -= s.damage;
        target.hit_timer = invulnerable;
        events.push(GameEvent::EnemyAttacked { id: s.attacker });
        if target.is_player() {
            log::debug!("player hit by {} (hp {})", s.attacker, target.hp);
            events.push(GameEvent::PlayerHurt { hp: target.hp });
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Step 4: bullets
// ══════════════════════════════════════════════════════════════

fn resolve_bullets(world: &mut WorldState, dt: f32, events: &mut Vec<GameEvent>) {
    let world_w = world.map.pixel_width();
    let bottom = world.map.real_height();
    let window = world.map.window();
    let hit_bonus = world.config.enemy.hit_bonus;

    let mut kept = Vec::with_capacity(world.bullets.len());
    for mut b in std::mem::take(&mut world.bullets) {
        b.pos += b.vel * dt;
        if world_w > 0.0 { b.pos.x = b.pos.x.rem_euclid(world_w); }

        let target = world.actors.iter_mut()
            .find(|a| !a.is_player() && a.is_alive() && rules::bullet_touches(&b, a, world_w));
        if let Some(enemy) = target {
            let damage = enemy.ai().map_or(0, |ai| rules::bullet_damage(b.kind, ai.kind()));
            if damage > 0 {
                enemy.hp -= damage;
                enemy.hit_timer = ENEMY_HIT_FLASH_SECS;
                if let Some(ai) = enemy.ai_mut() { ai.on_hit(); }
                world.score += hit_bonus;
                events.push(GameEvent::EnemyHit { id: enemy.id });
            } else {
                events.push(GameEvent::BulletDeflected { id: enemy.id });
            }
            continue;
        }

        if world.map.solid_at(b.pos.x, b.pos.y) {
            events.push(GameEvent::BulletBlocked);
            continue;
        }
        if !window.contains_x(b.pos.x, world_w) || b.pos.y < 0.0 || b.pos.y > bottom {
            continue;
        }
        kept.push(b);
    }
    world.bullets = kept;
}

// ══════════════════════════════════════════════════════════════
// Steps 5-6: window, objective, waves
// ══════════════════════════════════════════════════════════════

fn resolve_window(world: &mut WorldState) {
    let Some(x) = world.player().map(|p| p.pos.x) else { return };
    let view = world.config.view.width_px;
    world.map.recenter(x, view);
}

fn resolve_objective(world: &mut WorldState, dt: f32, events: &mut Vec<GameEvent>) {
    match world.objective.update(dt) {
        Some(ObjectiveState::Complete(rank)) => {
            let bonus = rank.bonus();
            world.score += bonus;
            log::info!("objective complete: rank {} (+{})", rank.letter(), bonus);
            world.set_message(&format!("Objective complete! Rank {} +{}", rank.letter(), bonus), 4.0);
            events.push(GameEvent::ObjectiveComplete { rank, bonus });
        }
        Some(ObjectiveState::Failed) => {
            log::info!("objective failed");
            world.set_message("Objective failed", 4.0);
            events.push(GameEvent::ObjectiveFailed);
        }
        _ => {}
    }
}

fn resolve_waves(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    if world.enemy_count() > 0 || !world.pending.is_empty() { return; }
    if world.wave < world.waves_total {
        level::queue_wave(world, events);
        let msg = format!("Wave {}/{}", world.wave, world.waves_total);
        world.set_message(&msg, 2.0);
    } else {
        log::info!("all waves cleared (score {})", world.score);
        world.phase = Phase::Victory;
        world.set_message("VICTORY", 0.0);
        events.push(GameEvent::Victory);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use crate::config::GameConfig;
    use crate::domain::ai::{AiKind, EnemyAi};
    use crate::domain::entity::{AmmoKind, Bullet};
    use crate::domain::tile::tests::map_from_sized;

    const DT: f32 = 1.0 / 60.0;

    /// 64 columns of 16x8 tiles: eight open rows over two floor rows,
    /// with an optional wall column.
    fn world_with(wall: Option<usize>) -> WorldState {
        let mut open = vec![b' '; 64];
        if let Some(c) = wall { open[c] = b'#'; }
        let open = String::from_utf8(open).unwrap();
        let floor = "#".repeat(64);
        let rows: Vec<&str> = (0..8).map(|_| open.as_str())
            .chain([floor.as_str(), floor.as_str()])
            .collect();
        let map = map_from_sized(&rows, 16, 8, 0.0);
        let mut w = WorldState::new(map, GameConfig::default(), 7);
        w.phase = Phase::Playing;
        w.wave = 1;
        w
    }

    fn add_enemy(w: &mut WorldState, x: f32, ai: EnemyAi) -> ActorId {
        let id = w.alloc_id();
        let tuning = w.config.enemy.tuning();
        let mut e = Actor::enemy(id, Vec2::new(x, 0.0), &tuning, w.map.tile_h(), ai);
        physics::settle(&mut e, &w.map);
        w.actors.push(e);
        id
    }

    fn player(w: &WorldState) -> &Actor {
        w.player().unwrap()
    }

    #[test]
    fn nothing_happens_outside_play() {
        let mut w = world_with(None);
        w.phase = Phase::Title;
        assert!(step(&mut w, FrameInput::default(), DT).is_empty());
        w.phase = Phase::Playing;
        w.paused = true;
        assert!(step(&mut w, FrameInput::default(), DT).is_empty());
        assert_eq!(w.tick, 0);
    }

    #[test]
    fn player_starts_on_the_floor() {
        let w = world_with(None);
        assert_eq!(player(&w).pos.y, 64.0);
        assert_eq!(player(&w).vertical, Vertical::Grounded);
    }

    #[test]
    fn status_is_published_last() {
        let mut w = world_with(None);
        add_enemy(&mut w, 800.0, EnemyAi::new(AiKind::Inert));
        let events = step(&mut w, FrameInput::default(), DT);
        match events.last() {
            Some(GameEvent::Status(s)) => {
                assert_eq!(s.hp, 10);
                assert_eq!(s.ammo, 6);
                assert!((s.elapsed - DT).abs() < 1e-6);
            }
            other => panic!("expected status, got {other:?}"),
        }
        assert!(w.status.is_some());
    }

    #[test]
    fn dead_enemy_is_removed_and_forgotten() {
        let mut w = world_with(None);
        let dead = add_enemy(&mut w, 300.0, EnemyAi::new(AiKind::Inert));
        let watcher = add_enemy(&mut w, 800.0, EnemyAi::new(AiKind::Passive));
        w.actors.iter_mut().find(|a| a.id == dead).unwrap().hp = 0;
        w.actors.iter_mut().find(|a| a.id == watcher).unwrap().visibility.insert(dead, true);

        let events = step(&mut w, FrameInput::default(), DT);
        assert!(events.contains(&GameEvent::EnemyKilled { id: dead, bonus: 100 }));
        assert!(events.contains(&GameEvent::ActorsRemoved(vec![dead])));
        assert!(w.actor(dead).is_none());
        assert!(!w.actor(watcher).unwrap().visibility.contains_key(&dead));
        assert_eq!(w.score, 100);
        assert_eq!(w.objective.kills, 1);
    }

    #[test]
    fn player_death_ends_the_game() {
        let mut w = world_with(None);
        add_enemy(&mut w, 800.0, EnemyAi::new(AiKind::Inert));
        w.actors[0].hp = 0;
        let events = step(&mut w, FrameInput::default(), DT);
        assert!(events.contains(&GameEvent::PlayerKilled));
        assert_eq!(w.phase, Phase::GameOver);
        assert!(step(&mut w, FrameInput::default(), DT).is_empty());
    }

    #[test]
    fn game_over_tick_still_scores_and_reports() {
        let mut w = world_with(None);
        add_enemy(&mut w, 800.0, EnemyAi::new(AiKind::Inert));
        let dead = add_enemy(&mut w, 300.0, EnemyAi::new(AiKind::Inert));
        w.actors[0].hp = 0;
        w.actors.iter_mut().find(|a| a.id == dead).unwrap().hp = 0;

        let events = step(&mut w, FrameInput::default(), DT);
        assert!(events.contains(&GameEvent::PlayerKilled));
        assert!(events.contains(&GameEvent::EnemyKilled { id: dead, bonus: 100 }));
        assert!(events.contains(&GameEvent::ActorsRemoved(vec![dead])));
        assert!(w.actor(dead).is_none());
        assert_eq!(w.score, 100);
        assert_eq!(w.phase, Phase::GameOver);
        match events.last() {
            Some(GameEvent::Status(s)) => assert_eq!(s.hp, 0),
            other => panic!("expected status, got {other:?}"),
        }
    }

    #[test]
    fn bullet_dies_on_the_tick_it_enters_a_wall() {
        let mut w = world_with(Some(10));
        add_enemy(&mut w, 800.0, EnemyAi::new(AiKind::Inert));
        // Wall column spans x 160..176; 6 px per tick at 360 px/s.
        w.bullets.push(Bullet { pos: Vec2::new(150.0, 40.0), vel: Vec2::new(360.0, 0.0), kind: AmmoKind::Copper });

        let events = step(&mut w, FrameInput::default(), DT);
        assert_eq!(w.bullets.len(), 1);
        assert!(!events.contains(&GameEvent::BulletBlocked));

        let events = step(&mut w, FrameInput::default(), DT);
        assert!(w.bullets.is_empty());
        assert!(events.contains(&GameEvent::BulletBlocked));
    }

    #[test]
    fn bullet_leaving_the_view_is_dropped() {
        let mut w = world_with(None);
        add_enemy(&mut w, 800.0, EnemyAi::new(AiKind::Inert));
        let right = w.map.window().right_px;
        w.bullets.push(Bullet { pos: Vec2::new(right - 1.0, 40.0), vel: Vec2::new(360.0, 0.0), kind: AmmoKind::Copper });
        step(&mut w, FrameInput::default(), DT);
        assert!(w.bullets.is_empty());
    }

    #[test]
    fn matching_bullet_damages_and_other_types_deflect() {
        let mut w = world_with(None);
        let id = add_enemy(&mut w, 400.0, EnemyAi::new(AiKind::Inert));
        let center = w.actor(id).unwrap().center();

        w.bullets.push(Bullet { pos: center, vel: Vec2::ZERO, kind: AmmoKind::Silver });
        let events = step(&mut w, FrameInput::default(), DT);
        assert!(events.contains(&GameEvent::BulletDeflected { id }));
        assert_eq!(w.actor(id).unwrap().hp, 3);
        assert!(w.bullets.is_empty());

        w.bullets.push(Bullet { pos: center, vel: Vec2::ZERO, kind: AmmoKind::Copper });
        let events = step(&mut w, FrameInput::default(), DT);
        assert!(events.contains(&GameEvent::EnemyHit { id }));
        let e = w.actor(id).unwrap();
        assert_eq!(e.hp, 2);
        assert!(e.ai().unwrap().is_aggressive());
        assert_eq!(w.score, 10);
    }

    #[test]
    fn invulnerability_blocks_repeat_strikes() {
        let mut w = world_with(None);
        let mut profile = AiKind::Aggressive.profile();
        profile.attack_cooldown = 0.0;
        profile.walk_chance = 0.0;
        let id = add_enemy(&mut w, 40.0, EnemyAi::with_profile(AiKind::Aggressive, profile));

        let events = step(&mut w, FrameInput::default(), DT);
        assert!(events.contains(&GameEvent::PlayerHurt { hp: 9 }));
        assert!(events.contains(&GameEvent::EnemyAttacked { id }));

        let mut hurt = 0;
        for _ in 0..9 {
            let events = step(&mut w, FrameInput::default(), DT);
            hurt += events.iter().filter(|e| matches!(e, GameEvent::PlayerHurt { .. })).count();
        }
        // 10 ticks stay inside the 200 ms invulnerability window.
        assert_eq!(hurt, 0);
        assert_eq!(player(&w).hp, 9);
        assert!(w.actor(id).unwrap().ai().unwrap().aggressors().contains(&w.player_id));
    }

    #[test]
    fn aggression_spreads_to_a_watching_ally() {
        let mut w = world_with(None);
        let mut near = AiKind::Aggressive.profile();
        near.walk_chance = 0.0;
        let first = add_enemy(&mut w, 60.0, EnemyAi::with_profile(AiKind::Aggressive, near));
        // Passive never aggresses on sight; it sees the first enemy but not the player.
        let mut calm = AiKind::Passive.profile();
        calm.view_range = 60.0;
        calm.walk_chance = 0.0;
        let second = add_enemy(&mut w, 110.0, EnemyAi::with_profile(AiKind::Passive, calm));

        step(&mut w, FrameInput::default(), DT);
        assert!(w.actor(first).unwrap().ai().unwrap().is_aggressive());
        step(&mut w, FrameInput::default(), DT);
        assert!(w.actor(second).unwrap().ai().unwrap().is_aggressive());
    }

    #[test]
    fn aggression_relays_along_a_chain_of_allies() {
        let mut w = world_with(None);
        let mut near = AiKind::Aggressive.profile();
        near.walk_chance = 0.0;
        add_enemy(&mut w, 60.0, EnemyAi::with_profile(AiKind::Aggressive, near));
        // Each passive link sees only its neighbours, never the player.
        let mut calm = AiKind::Passive.profile();
        calm.view_range = 60.0;
        calm.walk_chance = 0.0;
        let middle = add_enemy(&mut w, 110.0, EnemyAi::with_profile(AiKind::Passive, calm));
        let last = add_enemy(&mut w, 160.0, EnemyAi::with_profile(AiKind::Passive, calm));
        let pid = w.player_id;

        step(&mut w, FrameInput::default(), DT);
        step(&mut w, FrameInput::default(), DT);
        assert!(w.actor(middle).unwrap().ai().unwrap().aggressors().contains(&pid));
        step(&mut w, FrameInput::default(), DT);

        let middle_ai = w.actor(middle).unwrap().ai().unwrap();
        assert!(middle_ai.aggressors().contains(&pid));
        assert_eq!(middle_ai.relay_offer().get(&pid), Some(&1));
        let last_ai = w.actor(last).unwrap().ai().unwrap();
        assert!(last_ai.aggressors().contains(&pid));
        assert_eq!(last_ai.relay_offer().get(&pid), Some(&2));
    }

    #[test]
    fn firing_spends_ammo_and_holds_the_player() {
        let mut w = world_with(None);
        add_enemy(&mut w, 800.0, EnemyAi::new(AiKind::Inert));
        let fire = FrameInput { fire: true, ..FrameInput::default() };
        let events = step(&mut w, fire, DT);
        assert!(events.contains(&GameEvent::BulletFired { mode: AmmoKind::Copper }));
        assert_eq!(w.bullets.len(), 1);
        assert!(w.bullets[0].vel.x > 0.0);
        assert_eq!(player(&w).player_state().unwrap().ammo, 5);

        let x = player(&w).pos.x;
        let walk = FrameInput { movement: Some(Facing::Right), ..FrameInput::default() };
        step(&mut w, walk, DT);
        assert_eq!(player(&w).pos.x, x);
    }

    #[test]
    fn empty_magazine_reloads_instead_of_firing() {
        let mut w = world_with(None);
        add_enemy(&mut w, 800.0, EnemyAi::new(AiKind::Inert));
        w.actors[0].player_state_mut().unwrap().ammo = 0;
        let fire = FrameInput { fire: true, ..FrameInput::default() };
        let events = step(&mut w, fire, DT);
        assert!(events.contains(&GameEvent::Reloaded));
        assert!(w.bullets.is_empty());
        assert_eq!(player(&w).player_state().unwrap().ammo, 6);
    }

    #[test]
    fn mode_changes_emit_once() {
        let mut w = world_with(None);
        add_enemy(&mut w, 800.0, EnemyAi::new(AiKind::Inert));
        let next = FrameInput { mode: Some(ModeChange::Next), ..FrameInput::default() };
        let events = step(&mut w, next, DT);
        assert!(events.contains(&GameEvent::ModeChanged(AmmoKind::Silver)));
        let same = FrameInput { mode: Some(ModeChange::Set(AmmoKind::Silver)), ..FrameInput::default() };
        let events = step(&mut w, same, DT);
        assert!(!events.iter().any(|e| matches!(e, GameEvent::ModeChanged(_))));
    }

    #[test]
    fn aiming_behind_turns_the_player() {
        let mut w = world_with(None);
        add_enemy(&mut w, 800.0, EnemyAi::new(AiKind::Inert));
        let target = player(&w).center() - Vec2::new(50.0, 0.0);
        let aim = FrameInput { aim: Some(target), ..FrameInput::default() };
        step(&mut w, aim, DT);
        let p = player(&w);
        assert_eq!(p.facing, Facing::Left);
        let ps = p.player_state().unwrap();
        assert!((ps.aim.length() - 80.0).abs() < 1e-3);
        assert!(ps.aim.x < 0.0);
    }

    #[test]
    fn cleared_wave_queues_the_next_one() {
        let mut w = world_with(None);
        let events = step(&mut w, FrameInput::default(), DT);
        assert!(events.iter().any(|e| matches!(e, GameEvent::WaveStarted { wave: 2, size: 6 })));
        assert_eq!(w.enemy_count(), 6);
        assert!(w.pending.is_empty());
    }

    #[test]
    fn clearing_the_last_wave_wins() {
        let mut w = world_with(None);
        w.wave = w.waves_total;
        let events = step(&mut w, FrameInput::default(), DT);
        assert!(events.contains(&GameEvent::Victory));
        assert_eq!(w.phase, Phase::Victory);
    }

    #[test]
    fn window_follows_the_player() {
        let mut w = world_with(None);
        add_enemy(&mut w, 800.0, EnemyAi::new(AiKind::Inert));
        let walk = FrameInput { movement: Some(Facing::Right), ..FrameInput::default() };
        for _ in 0..30 { step(&mut w, walk, DT); }
        let x = player(&w).pos.x;
        let win = w.map.window();
        assert!(((win.left_px + win.right_px) / 2.0 - x).abs() < 1e-3);
    }
}
