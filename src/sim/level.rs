/// Level loading and enemy waves.
///
/// ## Map file (JSON, Tiled-style export)
///   ```
///   {
///     "tilewidth": 16, "tileheight": 8,
///     "layers": [
///       { "name": "collision", "width": W, "height": H, "data": [W*H ids] },
///       { "name": "spawns", "objects": [ { "x": 0, "y": 0,
///           "polyline": [ {"x": 40, "y": 64}, ... ] } ] }
///     ]
///   }
///   ```
///
/// The collision layer is the first layer carrying `data`; id `2` is solid,
/// anything else is empty. The spawn layer is the first layer whose
/// objects carry a polyline; each point (offset by its object's x/y) is
/// an enemy spawn point in world pixels.
///
/// A map whose bottom row has an empty column is rejected: nothing could
/// stop an actor from falling out of the world there.
///
/// ## Sources (priority order):
///   1. `[general] map` from config.toml
///   2. Built-in embedded map

use std::path::Path;

use glam::Vec2;
use rand::Rng;
use serde::Deserialize;

use crate::domain::ai::{AiKind, EnemyAi};
use crate::domain::entity::Actor;
use crate::domain::tile::TileMap;
use super::event::GameEvent;
use super::world::{Phase, WorldState};

const EMBEDDED_MAP: &str = include_str!("../../levels/level1.json");

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("cannot read map file: {0}")]
    Io(#[from] std::io::Error),
    #[error("map file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("map has no collision layer (a layer with `data`)")]
    MissingCollisionLayer,
    #[error("map has zero-sized tiles or grid")]
    ZeroDimension,
    #[error("collision layer holds {found} tiles, expected {expected}")]
    DataLength { expected: usize, found: usize },
    #[error("bottom row has a gap at column {col}")]
    GapInBottomRow { col: usize },
    #[error("map has no spawn layer (an object with a `polyline`)")]
    MissingSpawnLayer,
    #[error("spawn polyline has no points")]
    NoSpawnPoints,
}

// ── File schema ──

#[derive(Deserialize, Debug)]
struct MapFile {
    tilewidth: u32,
    tileheight: u32,
    layers: Vec<LayerFile>,
}

#[derive(Deserialize, Debug)]
struct LayerFile {
    #[serde(default)]
    width: usize,
    #[serde(default)]
    height: usize,
    #[serde(default)]
    data: Option<Vec<u32>>,
    #[serde(default)]
    objects: Vec<ObjectFile>,
}

#[derive(Deserialize, Debug)]
struct ObjectFile {
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    polyline: Option<Vec<PointFile>>,
}

#[derive(Deserialize, Debug)]
struct PointFile {
    x: f32,
    y: f32,
}

// ══════════════════════════════════════════════════════════════
// Loading
// ══════════════════════════════════════════════════════════════

/// Load the configured map, or the built-in one when no path is given.
pub fn load_map(path: Option<&Path>, y_offset: f32) -> Result<TileMap, LoadError> {
    match path {
        Some(p) => {
            log::info!("loading map {}", p.display());
            let text = std::fs::read_to_string(p)?;
            parse_map(&text, y_offset)
        }
        None => {
            log::info!("loading built-in map");
            parse_map(EMBEDDED_MAP, y_offset)
        }
    }
}

/// Parse and validate a map document.
pub fn parse_map(text: &str, y_offset: f32) -> Result<TileMap, LoadError> {
    let file: MapFile = serde_json::from_str(text)?;

    let collision = file.layers.iter()
        .find(|l| l.data.is_some())
        .ok_or(LoadError::MissingCollisionLayer)?;
    let data = collision.data.as_deref().unwrap_or_default();

    let (cols, rows) = (collision.width, collision.height);
    if cols == 0 || rows == 0 || file.tilewidth == 0 || file.tileheight == 0 {
        return Err(LoadError::ZeroDimension);
    }
    let expected = cols * rows;
    if data.len() != expected {
        return Err(LoadError::DataLength { expected, found: data.len() });
    }

    let spawn_object = file.layers.iter()
        .flat_map(|l| l.objects.iter())
        .find(|o| o.polyline.is_some())
        .ok_or(LoadError::MissingSpawnLayer)?;
    let spawns: Vec<Vec2> = spawn_object.polyline.iter()
        .flatten()
        .map(|p| Vec2::new(spawn_object.x + p.x, spawn_object.y + p.y))
        .collect();
    if spawns.is_empty() {
        return Err(LoadError::NoSpawnPoints);
    }

    let map = TileMap::new(
        file.tilewidth, file.tileheight, cols, rows, data.to_vec(), spawns, y_offset,
    );
    if let Some(col) = map.bottom_gap() {
        return Err(LoadError::GapInBottomRow { col });
    }

    log::info!(
        "map {}x{} tiles of {}x{} px, {} spawn points",
        cols, rows, file.tilewidth, file.tileheight, map.spawn_points().len(),
    );
    Ok(map)
}

// ══════════════════════════════════════════════════════════════
// Waves
// ══════════════════════════════════════════════════════════════

/// One enemy to create: where and what kind.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnOrder {
    pub pos: Vec2,
    pub kind: AiKind,
}

/// Enemy factory: `size` enemies at random spawn points with random kinds.
pub fn create_wave<R: Rng + ?Sized>(rng: &mut R, spawns: &[Vec2], size: usize) -> Vec<SpawnOrder> {
    if spawns.is_empty() { return Vec::new(); }
    (0..size)
        .map(|_| {
            let pos = spawns[rng.random_range(0..spawns.len())];
            let kind = AiKind::SPAWNABLE[rng.random_range(0..AiKind::SPAWNABLE.len())];
            SpawnOrder { pos, kind }
        })
        .collect()
}

/// Queue the next wave as pending actors. They join at the end of the tick.
pub fn queue_wave(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    let size = world.config.enemy.wave_size as usize;
    let orders = create_wave(&mut world.rng, world.map.spawn_points(), size);
    let tuning = world.config.enemy.tuning();
    let decay = world.config.enemy.aggro_decay_secs;
    let tile_h = world.map.tile_h();

    for order in &orders {
        let id = world.alloc_id();
        let ai = EnemyAi::new(order.kind).with_decay(decay);
        world.pending.push(Actor::enemy(id, order.pos, &tuning, tile_h, ai));
    }

    world.wave += 1;
    log::info!("wave {}/{}: {} enemies", world.wave, world.waves_total, orders.len());
    events.push(GameEvent::WaveStarted { wave: world.wave, size: orders.len() });
}

/// Put a freshly built world into play: first wave, objective prompt.
pub fn start_level(world: &mut WorldState) -> Vec<GameEvent> {
    let mut events = Vec::new();
    queue_wave(world, &mut events);
    world.apply_pending();
    let prompt = world.objective.message();
    world.set_message(&prompt, 4.0);
    world.phase = Phase::Playing;
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn doc(cols: usize, rows: usize, data: &[u32], points: &str) -> String {
        let data: Vec<String> = data.iter().map(|d| d.to_string()).collect();
        format!(
            r#"{{"tilewidth":16,"tileheight":8,"layers":[
                {{"name":"collision","width":{cols},"height":{rows},"data":[{}]}},
                {{"name":"spawns","objects":[{{"x":0,"y":0,"polyline":[{points}]}}]}}
            ]}}"#,
            data.join(","),
        )
    }

    #[test]
    fn parses_valid_map() {
        let text = doc(3, 2, &[0, 0, 0, 2, 2, 2], r#"{"x":8,"y":4},{"x":40,"y":4}"#);
        let map = parse_map(&text, 0.0).expect("valid map");
        assert_eq!((map.cols(), map.rows()), (3, 2));
        assert_eq!((map.tile_w(), map.tile_h()), (16.0, 8.0));
        assert!(map.is_solid(1, 1));
        assert!(!map.is_solid(1, 0));
        assert_eq!(map.spawn_points(), &[Vec2::new(8.0, 4.0), Vec2::new(40.0, 4.0)]);
    }

    #[test]
    fn only_id_two_is_solid() {
        let text = doc(3, 2, &[1, 3, 7, 2, 2, 2], r#"{"x":8,"y":4}"#);
        let map = parse_map(&text, 0.0).expect("valid map");
        assert!(!map.is_solid(0, 0));
        assert_eq!(map.tile_id(2, 0), 7);
    }

    #[test]
    fn object_offset_applies_to_points() {
        let text = r#"{"tilewidth":16,"tileheight":8,"layers":[
            {"width":1,"height":1,"data":[2]},
            {"objects":[{"x":10,"y":20,"polyline":[{"x":1,"y":2}]}]}]}"#;
        let map = parse_map(text, 0.0).expect("valid map");
        assert_eq!(map.spawn_points(), &[Vec2::new(11.0, 22.0)]);
    }

    #[test]
    fn gap_in_bottom_row_is_fatal() {
        let text = doc(3, 2, &[0, 0, 0, 2, 0, 2], r#"{"x":8,"y":4}"#);
        assert!(matches!(parse_map(&text, 0.0), Err(LoadError::GapInBottomRow { col: 1 })));
    }

    #[test]
    fn short_data_is_rejected() {
        let text = doc(3, 2, &[2, 2, 2], r#"{"x":8,"y":4}"#);
        assert!(matches!(
            parse_map(&text, 0.0),
            Err(LoadError::DataLength { expected: 6, found: 3 })
        ));
    }

    #[test]
    fn missing_layers_are_rejected() {
        let no_data = r#"{"tilewidth":16,"tileheight":8,"layers":[{"objects":[]}]}"#;
        assert!(matches!(parse_map(no_data, 0.0), Err(LoadError::MissingCollisionLayer)));

        let no_spawn = r#"{"tilewidth":16,"tileheight":8,"layers":[{"width":1,"height":1,"data":[2]}]}"#;
        assert!(matches!(parse_map(no_spawn, 0.0), Err(LoadError::MissingSpawnLayer)));

        let empty = doc(1, 1, &[2], "");
        assert!(matches!(parse_map(&empty, 0.0), Err(LoadError::NoSpawnPoints)));
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let text = r#"{"tilewidth":0,"tileheight":8,"layers":[
            {"width":1,"height":1,"data":[2]},
            {"objects":[{"polyline":[{"x":1,"y":2}]}]}]}"#;
        assert!(matches!(parse_map(text, 0.0), Err(LoadError::ZeroDimension)));
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(matches!(parse_map("{ not json", 0.0), Err(LoadError::Json(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let r = load_map(Some(Path::new("/nonexistent/revert-map.json")), 0.0);
        assert!(matches!(r, Err(LoadError::Io(_))));
    }

    #[test]
    fn embedded_map_is_valid() {
        let map = load_map(None, 0.0).expect("built-in map loads");
        assert!(map.cols() > 0);
        assert!(!map.spawn_points().is_empty());
        assert!(map.bottom_gap().is_none());
    }

    #[test]
    fn wave_uses_spawn_points_and_spawnable_kinds() {
        let mut rng = Pcg32::seed_from_u64(11);
        let spawns = [Vec2::new(10.0, 0.0), Vec2::new(90.0, 0.0)];
        let wave = create_wave(&mut rng, &spawns, 40);
        assert_eq!(wave.len(), 40);
        assert!(wave.iter().all(|o| spawns.contains(&o.pos)));
        assert!(wave.iter().all(|o| o.kind != AiKind::Inert));
        assert!(create_wave(&mut rng, &[], 5).is_empty());
    }
}
