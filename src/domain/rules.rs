/// Combat and perception rules.
///
/// Pure functions over positions and kinds, no world access. The step
/// function decides *when* these apply; this module decides *what* they say.
///
/// ## Sight
///
/// An observer sees a target when the target is within `view_range`
/// (wrapped horizontal distance) and either in front of the observer or
/// close behind it:
///
///   in front         distance <= view_range
///   behind           distance <= view_range * REAR_VIEW_FRACTION
///
/// ## Projectile contact
///
/// An enemy is a vertical segment from head to feet. A bullet touches it
/// when the distance from the bullet to that segment is below
/// `COLLISION_RADIUS`. Only the kind's weakness does damage.

use glam::Vec2;

use super::ai::AiKind;
use super::entity::{Actor, AmmoKind, Bullet, Facing};
use super::physics::wrapped_delta;

/// Fraction of the view range that still sees behind the observer.
pub const REAR_VIEW_FRACTION: f32 = 0.35;

/// Bullet-to-body contact radius, px.
pub const COLLISION_RADIUS: f32 = 10.0;

/// Center-to-center vector from observer to target (x wrapped).
#[derive(Clone, Copy, Debug)]
pub struct SightLine {
    pub delta: Vec2,
    pub distance: f32,
}

/// Sight test between two actors. `None` when not visible.
pub fn can_see(observer: &Actor, view_range: f32, target: &Actor, world_w: f32) -> Option<SightLine> {
    if view_range <= 0.0 { return None; }
    let delta = wrapped_delta(observer.center(), target.center(), world_w);
    let distance = delta.length();
    let in_front = delta.x == 0.0 || Facing::toward(delta.x) == observer.facing;
    let reach = if in_front { view_range } else { view_range * REAR_VIEW_FRACTION };
    (distance <= reach).then_some(SightLine { delta, distance })
}

/// Closest distance from a point to an actor's body axis.
pub fn distance_to_body(point: Vec2, actor: &Actor, world_w: f32) -> f32 {
    let d = wrapped_delta(actor.pos, point, world_w);
    // Axis runs from the feet (y = 0 here) up to -height.
    let along = d.y.clamp(-actor.body.height, 0.0);
    Vec2::new(d.x, d.y - along).length()
}

pub fn bullet_touches(bullet: &Bullet, actor: &Actor, world_w: f32) -> bool {
    distance_to_body(bullet.pos, actor, world_w) < COLLISION_RADIUS
}

/// Damage a bullet of `ammo` deals to an enemy of `kind`.
pub fn bullet_damage(ammo: AmmoKind, kind: AiKind) -> i32 {
    if kind.weakness() == ammo { 1 } else { 0 }
}

/// Aim vector from `from` toward `target`, scaled to `reach`. A target on
/// top of the shooter falls back to the facing direction.
pub fn aim_vector(from: Vec2, target: Vec2, facing: Facing, reach: f32, world_w: f32) -> Vec2 {
    let d = wrapped_delta(from, target, world_w);
    let dir = d.try_normalize().unwrap_or(Vec2::new(facing.sign(), 0.0));
    dir * reach
}

/// Bullet factory: leaves the shooter's body center along its aim.
pub fn spawn_bullet(shooter: &Actor, aim: Vec2, kind: AmmoKind, speed: f32) -> Bullet {
    let dir = aim.try_normalize().unwrap_or(Vec2::new(shooter.facing.sign(), 0.0));
    Bullet {
        pos: shooter.center(),
        vel: dir * speed,
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ai::EnemyAi;
    use crate::domain::entity::ActorTuning;

    const W: f32 = 1000.0;

    fn tuning() -> ActorTuning {
        ActorTuning { move_rate: 10.0, max_jump: 20.0, width: 10.0, height: 20.0, hp: 3 }
    }

    fn enemy_at(x: f32, facing: Facing) -> Actor {
        let mut a = Actor::enemy(1, Vec2::new(x, 100.0), &tuning(), 16.0, EnemyAi::new(AiKind::Active));
        a.facing = facing;
        a
    }

    fn player_at(x: f32) -> Actor {
        Actor::player(0, Vec2::new(x, 100.0), &tuning(), 16.0, 6)
    }

    #[test]
    fn sees_in_front_within_range() {
        let e = enemy_at(100.0, Facing::Right);
        let s = can_see(&e, 50.0, &player_at(140.0), W);
        assert!(s.is_some());
        assert_eq!(s.map(|s| s.distance), Some(40.0));
        assert!(can_see(&e, 50.0, &player_at(160.0), W).is_none());
    }

    #[test]
    fn rear_view_is_shorter() {
        let e = enemy_at(100.0, Facing::Right);
        assert!(can_see(&e, 50.0, &player_at(60.0), W).is_none());
        assert!(can_see(&e, 50.0, &player_at(90.0), W).is_some());
    }

    #[test]
    fn sight_wraps_around_world() {
        let e = enemy_at(990.0, Facing::Right);
        assert!(can_see(&e, 50.0, &player_at(20.0), W).is_some());
    }

    #[test]
    fn zero_view_range_is_blind() {
        let e = enemy_at(100.0, Facing::Right);
        assert!(can_see(&e, 0.0, &player_at(100.0), W).is_none());
    }

    #[test]
    fn bullet_contact_along_body() {
        let e = enemy_at(100.0, Facing::Left);
        let b = |x: f32, y: f32| Bullet { pos: Vec2::new(x, y), vel: Vec2::ZERO, kind: AmmoKind::Copper };
        assert!(bullet_touches(&b(105.0, 90.0), &e, W));
        assert!(bullet_touches(&b(100.0, 75.0), &e, W));
        assert!(!bullet_touches(&b(100.0, 60.0), &e, W));
        assert!(!bullet_touches(&b(115.0, 90.0), &e, W));
    }

    #[test]
    fn only_weakness_damages() {
        assert_eq!(bullet_damage(AmmoKind::Silver, AiKind::Active), 1);
        assert_eq!(bullet_damage(AmmoKind::Copper, AiKind::Active), 0);
        assert_eq!(bullet_damage(AmmoKind::Gold, AiKind::Aggressive), 1);
    }

    #[test]
    fn aim_scales_to_reach() {
        let v = aim_vector(Vec2::ZERO, Vec2::new(3.0, 4.0), Facing::Right, 80.0, W);
        assert!((v.length() - 80.0).abs() < 1e-3);
        let fallback = aim_vector(Vec2::ONE, Vec2::ONE, Facing::Left, 80.0, W);
        assert_eq!(fallback, Vec2::new(-80.0, 0.0));
    }

    #[test]
    fn bullet_leaves_from_center() {
        let p = player_at(50.0);
        let b = spawn_bullet(&p, Vec2::new(0.0, -2.0), AmmoKind::Gold, 300.0);
        assert_eq!(b.pos, Vec2::new(50.0, 90.0));
        assert_eq!(b.vel, Vec2::new(0.0, -300.0));
        assert_eq!(b.kind, AmmoKind::Gold);
    }
}
