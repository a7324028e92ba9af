/// Actor kinematics: turns movement intents into tile-safe motion.
///
/// ## State machines
///
///   Horizontal:  Still ⇄ Left ⇄ Right   (move_left / move_right / stop)
///   Vertical:    Grounded → Rising → Falling → Grounded
///
/// ## One tick (`update`)
///
///   1. Horizontal step. The body is tried at the new x. If any cell it
///      would cover is solid the actor either steps up one tile (grounded,
///      only the base row blocked, tile shorter than a quarter of the body)
///      or stops.
///   2. A grounded actor with nothing under any of its columns starts
///      falling.
///   3. Vertical step, bounded by `probe_ceiling` / `probe_floor` across
///      every column the body spans.
///
/// Every accepted position leaves the body clear of solid cells.

use std::ops::RangeInclusive;

use glam::Vec2;

use super::entity::{Actor, Facing, Movement, Vertical};
use super::tile::TileMap;

/// A blocking tile may be climbed only when it is shorter than this
/// fraction of the actor's height.
pub const STEP_UP_MAX_FRACTION: f32 = 0.25;

/// Keeps edges that exactly touch a tile boundary out of that tile.
const EDGE_EPS: f32 = 0.01;

/// Probe distance used to decide whether a grounded actor still has floor.
const GROUND_PROBE: f32 = 1.0;

/// What the horizontal half of a tick did.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Stride {
    Idle,
    Moved,
    SteppedUp,
    Blocked,
}

// ══════════════════════════════════════════════════════════════
// Intents
// ══════════════════════════════════════════════════════════════

pub fn move_left(a: &mut Actor) {
    if a.movement == Movement::Left { return; }
    a.movement = Movement::Left;
    a.facing = Facing::Left;
    a.velocity.x = -a.move_rate;
    set_ground_animation(a);
}

pub fn move_right(a: &mut Actor) {
    if a.movement == Movement::Right { return; }
    a.movement = Movement::Right;
    a.facing = Facing::Right;
    a.velocity.x = a.move_rate;
    set_ground_animation(a);
}

pub fn stop(a: &mut Actor) {
    if a.movement == Movement::Still { return; }
    a.movement = Movement::Still;
    a.velocity.x = 0.0;
    set_ground_animation(a);
}

pub fn face(a: &mut Actor, facing: Facing) {
    a.facing = facing;
}

/// Start a jump. Only a grounded actor can jump; returns whether it did.
pub fn jump(a: &mut Actor) -> bool {
    if a.vertical != Vertical::Grounded { return false; }
    a.vertical = Vertical::Rising;
    a.vert_travel = 0.0;
    a.velocity.y = -vert_rate(a);
    a.animation = "jump";
    true
}

pub fn fall(a: &mut Actor) {
    if a.vertical == Vertical::Falling { return; }
    a.vertical = Vertical::Falling;
    a.velocity.y = vert_rate(a);
    a.animation = "fall";
}

/// Vertical speed in px/s: a full jump takes half a second up.
fn vert_rate(a: &Actor) -> f32 {
    a.max_vert_travel * 2.0
}

fn set_ground_animation(a: &mut Actor) {
    if a.vertical != Vertical::Grounded { return; }
    a.animation = match a.movement {
        Movement::Still => "idle",
        Movement::Left | Movement::Right => "walk",
    };
}

fn land(a: &mut Actor) {
    a.vertical = Vertical::Grounded;
    a.velocity.y = 0.0;
    a.vert_travel = 0.0;
    set_ground_animation(a);
}

// ══════════════════════════════════════════════════════════════
// Per-tick update
// ══════════════════════════════════════════════════════════════

pub fn update(a: &mut Actor, map: &TileMap, dt: f32) -> Stride {
    let stride = step_horizontal(a, map, dt);

    if a.vertical == Vertical::Grounded && floor_distance(a, map, GROUND_PROBE) > 0.0 {
        fall(a);
    }

    let step = vert_rate(a) * dt;
    match a.vertical {
        Vertical::Grounded => {}
        Vertical::Rising => update_rising(a, map, step, dt),
        Vertical::Falling => update_falling(a, map, step, dt),
    }

    stride
}

fn step_horizontal(a: &mut Actor, map: &TileMap, dt: f32) -> Stride {
    if a.movement == Movement::Still { return Stride::Idle; }

    let dx = a.velocity.x * dt;
    let new_x = a.pos.x + dx;

    if body_clear(map, new_x, a.pos.y, a.body.height, a.body.half_width) {
        a.pos.x = wrap_x(new_x, map);
        return Stride::Moved;
    }

    if can_step_up(a, map, new_x) {
        a.pos.x = wrap_x(new_x, map);
        a.pos.y -= map.tile_h();
        return Stride::SteppedUp;
    }

    stop(a);
    Stride::Blocked
}

/// Blocked only by the base row, short enough, and the raised body fits.
fn can_step_up(a: &Actor, map: &TileMap, new_x: f32) -> bool {
    if a.vertical != Vertical::Grounded { return false; }
    if map.tile_h() >= STEP_UP_MAX_FRACTION * a.body.height { return false; }

    let raised_y = a.pos.y - map.tile_h();
    let base_row = map.row_at(a.pos.y - EDGE_EPS);
    let blocked_above_base = body_columns(map, new_x, a.body.half_width)
        .any(|col| (1..a.height_tiles).any(|up| map.is_solid_wrapped(col, base_row - up)));

    !blocked_above_base
        && body_clear(map, a.pos.x, raised_y, a.body.height, a.body.half_width)
        && body_clear(map, new_x, raised_y, a.body.height, a.body.half_width)
}

fn update_rising(a: &mut Actor, map: &TileMap, step: f32, dt: f32) {
    if a.vert_travel >= a.max_vert_travel {
        fall(a);
        return;
    }
    let budget = step.min(a.max_vert_travel - a.vert_travel);
    let allowed = ceiling_distance(a, map, budget);
    if allowed <= 0.0 {
        fall(a);
        return;
    }
    a.pos.y -= allowed;
    a.vert_travel += allowed;
    a.velocity.y = -allowed / dt.max(f32::EPSILON);
}

fn update_falling(a: &mut Actor, map: &TileMap, step: f32, dt: f32) {
    let allowed = floor_distance(a, map, step);
    if allowed < step {
        a.pos.y += allowed;
        land(a);
    } else {
        a.pos.y += step;
        a.velocity.y = step / dt.max(f32::EPSILON);
    }
}

// ══════════════════════════════════════════════════════════════
// Body queries
// ══════════════════════════════════════════════════════════════

/// Centers of the columns a body at `x` spans (unwrapped).
fn body_columns(map: &TileMap, x: f32, half_width: f32) -> RangeInclusive<i32> {
    let tw = map.tile_w();
    let first = ((x - half_width) / tw).floor() as i32;
    let last = ((x + half_width - EDGE_EPS) / tw).floor() as i32;
    first..=last
}

fn span_columns(map: &TileMap, x: f32, half_width: f32) -> impl Iterator<Item = f32> {
    let tw = map.tile_w();
    body_columns(map, x, half_width).map(move |c| (c as f32 + 0.5) * tw)
}

/// Every (column, row) the body covers; columns are unwrapped.
fn body_cells(
    map: &TileMap,
    x: f32,
    y: f32,
    height: f32,
    half_width: f32,
) -> impl Iterator<Item = (i32, i32)> {
    let top = map.row_at(y - height + EDGE_EPS);
    let bottom = map.row_at(y - EDGE_EPS);
    body_columns(map, x, half_width).flat_map(move |c| (top..=bottom).map(move |r| (c, r)))
}

pub fn body_clear(map: &TileMap, x: f32, y: f32, height: f32, half_width: f32) -> bool {
    !body_cells(map, x, y, height, half_width).any(|(c, r)| map.is_solid_wrapped(c, r))
}

fn ceiling_distance(a: &Actor, map: &TileMap, step: f32) -> f32 {
    let head = a.head_y();
    span_columns(map, a.pos.x, a.body.half_width)
        .map(|cx| map.probe_ceiling(cx, head, step))
        .fold(step, f32::min)
}

fn floor_distance(a: &Actor, map: &TileMap, step: f32) -> f32 {
    span_columns(map, a.pos.x, a.body.half_width)
        .map(|cx| map.probe_floor(cx, a.pos.y, step))
        .fold(step, f32::min)
}

fn wrap_x(x: f32, map: &TileMap) -> f32 {
    let w = map.pixel_width();
    if w <= 0.0 { return x; }
    x.rem_euclid(w)
}

/// Put an actor on the first floor below its current position, used
/// when it enters the world.
pub fn settle(a: &mut Actor, map: &TileMap) {
    let col = map.column_at(a.pos.x);
    let from = map.row_at(a.pos.y - EDGE_EPS).max(0);
    if let Some(row) = map.find_floor_below(col, from) {
        let top = map.row_top(row);
        if body_clear(map, a.pos.x, top, a.body.height, a.body.half_width) {
            a.pos.y = top;
            land(a);
        }
    }
}

/// Horizontal distance from `a` to `b`, taking the shorter way around
/// the wrapped world.
pub fn wrapped_dx(from: f32, to: f32, world_w: f32) -> f32 {
    if world_w <= 0.0 { return to - from; }
    let mut dx = (to - from).rem_euclid(world_w);
    if dx > world_w / 2.0 { dx -= world_w; }
    dx
}

/// Vector between two points with x wrapped the short way.
pub fn wrapped_delta(from: Vec2, to: Vec2, world_w: f32) -> Vec2 {
    Vec2::new(wrapped_dx(from.x, to.x, world_w), to.y - from.y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::ActorTuning;
    use crate::domain::tile::tests::{map_from, map_from_sized};
    use proptest::prelude::*;

    const DT: f32 = 1.0 / 60.0;

    fn tuning(width: f32, height: f32) -> ActorTuning {
        ActorTuning { move_rate: 60.0, max_jump: 40.0, width, height, hp: 5 }
    }

    /// Actor standing with its feet at `y`.
    fn standing(map: &TileMap, x: f32, y: f32, width: f32, height: f32) -> Actor {
        let mut a = Actor::player(1, Vec2::new(x, y), &tuning(width, height), map.tile_h(), 6);
        land(&mut a);
        a
    }

    fn tick_n(a: &mut Actor, map: &TileMap, n: usize) {
        for _ in 0..n { update(a, map, DT); }
    }

    fn overlaps_solid(a: &Actor, map: &TileMap) -> bool {
        !body_clear(map, a.pos.x, a.pos.y, a.body.height, a.body.half_width)
    }

    // ── Horizontal intents ──

    #[test]
    fn reentering_same_state_is_noop() {
        let map = map_from(&["    ", "####"]);
        let mut a = standing(&map, 24.0, 16.0, 8.0, 12.0);
        move_right(&mut a);
        a.animation = "custom";
        move_right(&mut a);
        assert_eq!(a.animation, "custom");
        assert_eq!(a.velocity.x, 60.0);
        move_left(&mut a);
        assert_eq!(a.facing, Facing::Left);
        assert_eq!(a.velocity.x, -60.0);
        assert_eq!(a.animation, "walk");
        stop(&mut a);
        assert_eq!(a.velocity.x, 0.0);
        assert_eq!(a.animation, "idle");
    }

    #[test]
    fn jump_only_from_ground() {
        let map = map_from(&["    ", "    ", "####"]);
        let mut a = standing(&map, 24.0, 32.0, 8.0, 12.0);
        assert!(jump(&mut a));
        assert_eq!(a.vertical, Vertical::Rising);
        assert_eq!(a.vert_travel, 0.0);
        assert!(a.velocity.y < 0.0);
        assert!(!jump(&mut a));
    }

    // ── Walking ──

    #[test]
    fn walks_on_flat_ground() {
        let map = map_from(&["        ", "########"]);
        let mut a = standing(&map, 24.0, 16.0, 8.0, 12.0);
        move_right(&mut a);
        tick_n(&mut a, &map, 30);
        assert!((a.pos.x - 54.0).abs() < 0.01);
        assert_eq!(a.vertical, Vertical::Grounded);
        assert_eq!(a.pos.y, 16.0);
    }

    #[test]
    fn wall_blocks_and_stops() {
        let map = map_from(&["   #    ", "   #    ", "########"]);
        let mut a = standing(&map, 24.0, 32.0, 8.0, 12.0);
        move_right(&mut a);
        tick_n(&mut a, &map, 60);
        assert_eq!(a.movement, Movement::Still);
        assert!(a.pos.x + a.body.half_width - EDGE_EPS < 48.0);
        assert!(!overlaps_solid(&a, &map));
    }

    #[test]
    fn steps_up_short_tile() {
        // 16×4 tiles: a 4 px ledge is under a quarter of a 20 px body.
        let map = map_from_sized(
            &[
                "      ",
                "      ",
                "      ",
                "      ",
                "      ",
                "      ",
                "   ###",
                "######",
            ],
            16, 4, 0.0,
        );
        let mut a = standing(&map, 24.0, 28.0, 8.0, 20.0);
        move_right(&mut a);
        let mut stepped = false;
        for _ in 0..40 {
            if update(&mut a, &map, DT) == Stride::SteppedUp { stepped = true; }
        }
        assert!(stepped);
        assert_eq!(a.pos.y, 24.0);
        assert!(a.pos.x > 48.0);
        assert_eq!(a.vertical, Vertical::Grounded);
    }

    #[test]
    fn ledge_under_an_overhang_is_not_stepped() {
        // Same ledge as above, with a tile in the body's top row past it.
        let map = map_from_sized(
            &[
                "      ",
                "      ",
                "   ###",
                "      ",
                "      ",
                "      ",
                "   ###",
                "######",
            ],
            16, 4, 0.0,
        );
        let mut a = standing(&map, 24.0, 28.0, 8.0, 20.0);
        assert_eq!(a.height_tiles, 5);
        move_right(&mut a);
        for _ in 0..40 {
            assert_ne!(update(&mut a, &map, DT), Stride::SteppedUp);
        }
        assert_eq!(a.pos.y, 28.0);
        assert_eq!(a.movement, Movement::Still);
        assert!(!overlaps_solid(&a, &map));
    }

    #[test]
    fn tall_tile_is_not_stepped() {
        let map = map_from(&["        ", "   #####", "########"]);
        let mut a = standing(&map, 24.0, 32.0, 8.0, 40.0);
        move_right(&mut a);
        tick_n(&mut a, &map, 60);
        assert_eq!(a.pos.y, 32.0);
        assert_eq!(a.movement, Movement::Still);
    }

    #[test]
    fn walking_off_ledge_falls_and_lands() {
        let map = map_from(&["        ", "###     ", "        ", "########"]);
        let mut a = standing(&map, 24.0, 16.0, 8.0, 12.0);
        move_right(&mut a);
        tick_n(&mut a, &map, 30);
        assert_ne!(a.vertical, Vertical::Grounded);
        stop(&mut a);
        tick_n(&mut a, &map, 60);
        assert_eq!(a.vertical, Vertical::Grounded);
        assert!((a.pos.y - 48.0).abs() < 0.01);
    }

    #[test]
    fn wraps_around_world_edge() {
        let map = map_from(&["    ", "####"]);
        let mut a = standing(&map, 62.0, 16.0, 2.0, 12.0);
        move_right(&mut a);
        tick_n(&mut a, &map, 10);
        assert!(a.pos.x >= 0.0 && a.pos.x < 64.0);
        assert!(a.pos.x < 20.0);
    }

    // ── Jumping ──

    #[test]
    fn full_jump_rises_max_travel_and_returns() {
        let map = map_from(&[
            "    ", "    ", "    ", "    ", "    ", "####",
        ]);
        let mut a = standing(&map, 24.0, 80.0, 8.0, 12.0);
        jump(&mut a);
        let mut peak = a.pos.y;
        for _ in 0..120 {
            update(&mut a, &map, DT);
            peak = peak.min(a.pos.y);
        }
        assert!((80.0 - peak - 40.0).abs() < 0.01);
        assert_eq!(a.vertical, Vertical::Grounded);
        assert!((a.pos.y - 80.0).abs() < 0.01);
    }

    #[test]
    fn ceiling_ends_rise_early() {
        // Low tile at (1, 1): underside at y = 32. Head starts at 40.
        let map = map_from(&[
            "    ",
            " #  ",
            "    ",
            "####",
        ]);
        let mut a = standing(&map, 24.0, 48.0, 8.0, 8.0);
        jump(&mut a);
        let mut fell_at = None;
        for i in 0..60 {
            update(&mut a, &map, DT);
            if a.vertical == Vertical::Falling && fell_at.is_none() {
                fell_at = Some((i, a.head_y(), a.vert_travel));
            }
        }
        let (_, head, travel) = fell_at.expect("never started falling");
        assert!((head - 32.0).abs() < 0.01);
        assert!(travel < a.max_vert_travel);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn random_inputs_never_embed(ops in prop::collection::vec(0u8..5, 1..200)) {
            let map = map_from(&[
                "                ",
                "      ###       ",
                "  ##        ##  ",
                "        #       ",
                "   #        ### ",
                "################",
            ]);
            let mut a = standing(&map, 8.0, 80.0, 10.0, 14.0);
            for op in ops {
                match op {
                    0 => move_left(&mut a),
                    1 => move_right(&mut a),
                    2 => stop(&mut a),
                    3 => { jump(&mut a); }
                    _ => {}
                }
                for _ in 0..3 {
                    update(&mut a, &map, DT);
                    prop_assert!(!overlaps_solid(&a, &map), "embedded at {:?}", a.pos);
                }
            }
        }
    }

    #[test]
    fn wrapped_dx_takes_short_way() {
        assert_eq!(wrapped_dx(10.0, 90.0, 100.0), -20.0);
        assert_eq!(wrapped_dx(90.0, 10.0, 100.0), 20.0);
        assert_eq!(wrapped_dx(10.0, 30.0, 100.0), 20.0);
    }

    #[test]
    fn settle_drops_to_floor() {
        let map = map_from(&["    ", "    ", "####"]);
        let mut a = Actor::player(1, Vec2::new(24.0, 5.0), &tuning(8.0, 12.0), 16.0, 6);
        settle(&mut a, &map);
        assert_eq!(a.pos.y, 32.0);
        assert_eq!(a.vertical, Vertical::Grounded);
    }
}
