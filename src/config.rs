/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// Falls back to defaults if the file is missing, unreadable or partial.

use serde::Deserialize;
use std::path::PathBuf;

use crate::domain::entity::ActorTuning;

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub speed: SpeedConfig,
    pub player: PlayerConfig,
    pub enemy: EnemyConfig,
    pub view: ViewConfig,
    pub gamepad: GamepadConfig,
    /// Map file to load; `None` uses the built-in map.
    pub map_path: Option<PathBuf>,
    pub seed: Option<u64>,
    /// World pixels above the tile grid.
    pub y_offset: f32,
}

#[derive(Clone, Debug)]
pub struct SpeedConfig {
    pub tick_rate_ms: u64,
}

#[derive(Clone, Debug)]
pub struct PlayerConfig {
    pub move_rate: f32,
    pub max_jump: f32,
    pub width: f32,
    pub height: f32,
    pub hp: i32,
    pub ammo: u32,
    pub fire_recovery_ms: u64,
    pub hit_invulnerable_ms: u64,
    pub bullet_speed: f32,
    pub aim_reach: f32,
}

#[derive(Clone, Debug)]
pub struct EnemyConfig {
    pub move_rate: f32,
    pub max_jump: f32,
    pub width: f32,
    pub height: f32,
    pub hp: i32,
    pub aggro_decay_secs: f32,
    pub waves: u32,
    pub wave_size: u32,
    pub kill_bonus: u32,
    pub hit_bonus: u32,
}

#[derive(Clone, Debug)]
pub struct ViewConfig {
    pub width_px: f32,
}

#[derive(Clone, Debug)]
pub struct GamepadConfig {
    pub jump: Vec<String>,
    pub fire: Vec<String>,
    pub next_mode: Vec<String>,
    pub prev_mode: Vec<String>,
    pub confirm: Vec<String>,
    pub cancel: Vec<String>,
}

impl PlayerConfig {
    pub fn tuning(&self) -> ActorTuning {
        ActorTuning {
            move_rate: self.move_rate,
            max_jump: self.max_jump,
            width: self.width,
            height: self.height,
            hp: self.hp,
        }
    }
}

impl EnemyConfig {
    pub fn tuning(&self) -> ActorTuning {
        ActorTuning {
            move_rate: self.move_rate,
            max_jump: self.max_jump,
            width: self.width,
            height: self.height,
            hp: self.hp,
        }
    }
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    speed: TomlSpeed,
    #[serde(default)]
    player: TomlPlayer,
    #[serde(default)]
    enemy: TomlEnemy,
    #[serde(default)]
    view: TomlView,
    #[serde(default)]
    gamepad: TomlGamepad,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlSpeed {
    #[serde(default = "default_tick_rate")]
    tick_rate_ms: u64,
}

#[derive(Deserialize, Debug)]
struct TomlPlayer {
    #[serde(default = "default_player_move")]
    move_rate: f32,
    #[serde(default = "default_player_jump")]
    max_jump: f32,
    #[serde(default = "default_player_width")]
    width: f32,
    #[serde(default = "default_player_height")]
    height: f32,
    #[serde(default = "default_player_hp")]
    hp: i32,
    #[serde(default = "default_ammo")]
    ammo: u32,
    #[serde(default = "default_fire_recovery")]
    fire_recovery_ms: u64,
    #[serde(default = "default_hit_invulnerable")]
    hit_invulnerable_ms: u64,
    #[serde(default = "default_bullet_speed")]
    bullet_speed: f32,
    #[serde(default = "default_aim_reach")]
    aim_reach: f32,
}

#[derive(Deserialize, Debug)]
struct TomlEnemy {
    #[serde(default = "default_enemy_move")]
    move_rate: f32,
    #[serde(default = "default_enemy_jump")]
    max_jump: f32,
    #[serde(default = "default_enemy_width")]
    width: f32,
    #[serde(default = "default_enemy_height")]
    height: f32,
    #[serde(default = "default_enemy_hp")]
    hp: i32,
    #[serde(default = "default_aggro_decay")]
    aggro_decay_secs: f32,
    #[serde(default = "default_waves")]
    waves: u32,
    #[serde(default = "default_wave_size")]
    wave_size: u32,
    #[serde(default = "default_kill_bonus")]
    kill_bonus: u32,
    #[serde(default = "default_hit_bonus")]
    hit_bonus: u32,
}

#[derive(Deserialize, Debug)]
struct TomlView {
    #[serde(default = "default_view_width")]
    width_px: f32,
}

#[derive(Deserialize, Debug)]
struct TomlGamepad {
    #[serde(default = "default_pad_jump")]
    jump: Vec<String>,
    #[serde(default = "default_pad_fire")]
    fire: Vec<String>,
    #[serde(default = "default_pad_next")]
    next_mode: Vec<String>,
    #[serde(default = "default_pad_prev")]
    prev_mode: Vec<String>,
    #[serde(default = "default_confirm")]
    confirm: Vec<String>,
    #[serde(default = "default_cancel")]
    cancel: Vec<String>,
}

#[derive(Deserialize, Debug, Default)]
struct TomlGeneral {
    #[serde(default)]
    map: Option<String>,
    #[serde(default)]
    seed: Option<u64>,
    #[serde(default = "default_y_offset")]
    y_offset: f32,
}

// ── Defaults ──

fn default_tick_rate() -> u64 { 16 }          // ~60 Hz
fn default_player_move() -> f32 { 96.0 }      // 6 tiles/s
fn default_player_jump() -> f32 { 40.0 }
fn default_player_width() -> f32 { 12.0 }
fn default_player_height() -> f32 { 36.0 }    // a quarter is 9 px: climbs 8 px ledges
fn default_player_hp() -> i32 { 10 }
fn default_ammo() -> u32 { 6 }
fn default_fire_recovery() -> u64 { 250 }
fn default_hit_invulnerable() -> u64 { 200 }
fn default_bullet_speed() -> f32 { 360.0 }
fn default_aim_reach() -> f32 { 80.0 }

fn default_enemy_move() -> f32 { 48.0 }
fn default_enemy_jump() -> f32 { 24.0 }
fn default_enemy_width() -> f32 { 12.0 }
fn default_enemy_height() -> f32 { 24.0 }
fn default_enemy_hp() -> i32 { 3 }
fn default_aggro_decay() -> f32 { 3.0 }
fn default_waves() -> u32 { 5 }
fn default_wave_size() -> u32 { 6 }
fn default_kill_bonus() -> u32 { 100 }
fn default_hit_bonus() -> u32 { 10 }

fn default_view_width() -> f32 { 640.0 }
fn default_y_offset() -> f32 { 0.0 }

fn default_pad_jump() -> Vec<String> { vec!["A".into()] }
fn default_pad_fire() -> Vec<String> { vec!["X".into(), "R2".into()] }
fn default_pad_next() -> Vec<String> { vec!["R1".into()] }
fn default_pad_prev() -> Vec<String> { vec!["L1".into()] }
fn default_confirm() -> Vec<String> { vec!["Start".into()] }
fn default_cancel() -> Vec<String> { vec!["Select".into()] }

impl Default for TomlSpeed {
    fn default() -> Self {
        TomlSpeed { tick_rate_ms: default_tick_rate() }
    }
}

impl Default for TomlPlayer {
    fn default() -> Self {
        TomlPlayer {
            move_rate: default_player_move(),
            max_jump: default_player_jump(),
            width: default_player_width(),
            height: default_player_height(),
            hp: default_player_hp(),
            ammo: default_ammo(),
            fire_recovery_ms: default_fire_recovery(),
            hit_invulnerable_ms: default_hit_invulnerable(),
            bullet_speed: default_bullet_speed(),
            aim_reach: default_aim_reach(),
        }
    }
}

impl Default for TomlEnemy {
    fn default() -> Self {
        TomlEnemy {
            move_rate: default_enemy_move(),
            max_jump: default_enemy_jump(),
            width: default_enemy_width(),
            height: default_enemy_height(),
            hp: default_enemy_hp(),
            aggro_decay_secs: default_aggro_decay(),
            waves: default_waves(),
            wave_size: default_wave_size(),
            kill_bonus: default_kill_bonus(),
            hit_bonus: default_hit_bonus(),
        }
    }
}

impl Default for TomlView {
    fn default() -> Self {
        TomlView { width_px: default_view_width() }
    }
}

impl Default for TomlGamepad {
    fn default() -> Self {
        TomlGamepad {
            jump: default_pad_jump(),
            fire: default_pad_fire(),
            next_mode: default_pad_next(),
            prev_mode: default_pad_prev(),
            confirm: default_confirm(),
            cancel: default_cancel(),
        }
    }
}

// ── Loading ──

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig::from_toml(TomlConfig::default(), &[])
    }
}

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let toml_cfg = load_toml(&search_dirs);
        GameConfig::from_toml(toml_cfg, &search_dirs)
    }

    /// Parse a config document. Used by `load` and tests.
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        let cfg = toml::from_str::<TomlConfig>(text)?;
        Ok(GameConfig::from_toml(cfg, &[]))
    }

    fn from_toml(t: TomlConfig, search_dirs: &[PathBuf]) -> Self {
        // Relative map paths resolve against the first search dir holding them.
        let map_path = t.general.map.as_ref().map(|m| {
            let p = PathBuf::from(m);
            if p.is_absolute() {
                p
            } else {
                search_dirs.iter()
                    .map(|d| d.join(m))
                    .find(|p| p.is_file())
                    .unwrap_or(p)
            }
        });

        GameConfig {
            speed: SpeedConfig { tick_rate_ms: t.speed.tick_rate_ms.max(1) },
            player: PlayerConfig {
                move_rate: t.player.move_rate,
                max_jump: t.player.max_jump,
                width: t.player.width,
                height: t.player.height,
                hp: t.player.hp,
                ammo: t.player.ammo,
                fire_recovery_ms: t.player.fire_recovery_ms,
                hit_invulnerable_ms: t.player.hit_invulnerable_ms,
                bullet_speed: t.player.bullet_speed,
                aim_reach: t.player.aim_reach,
            },
            enemy: EnemyConfig {
                move_rate: t.enemy.move_rate,
                max_jump: t.enemy.max_jump,
                width: t.enemy.width,
                height: t.enemy.height,
                hp: t.enemy.hp,
                aggro_decay_secs: t.enemy.aggro_decay_secs,
                waves: t.enemy.waves,
                wave_size: t.enemy.wave_size,
                kill_bonus: t.enemy.kill_bonus,
                hit_bonus: t.enemy.hit_bonus,
            },
            view: ViewConfig { width_px: t.view.width_px },
            gamepad: GamepadConfig {
                jump: t.gamepad.jump,
                fire: t.gamepad.fire,
                next_mode: t.gamepad.next_mode,
                prev_mode: t.gamepad.prev_mode,
                confirm: t.gamepad.confirm,
                cancel: t.gamepad.cancel,
            },
            map_path,
            seed: t.general.seed,
            y_offset: t.general.y_offset,
        }
    }
}

/// Candidate directories to search: exe dir + CWD (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    if let Ok(exe) = std::env::current_exe() {
        // Follow symlinks so an installed link still finds data next to the binary.
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if !path.exists() { continue; }
        match std::fs::read_to_string(&path) {
            Ok(text) => match toml::from_str::<TomlConfig>(&text) {
                Ok(cfg) => {
                    log::info!("loaded config from {}", path.display());
                    return cfg;
                }
                Err(e) => {
                    log::warn!("config.toml parse error, using defaults: {e}");
                    return TomlConfig::default();
                }
            },
            Err(e) => {
                log::warn!("could not read {}: {e}", path.display());
            }
        }
    }
    log::info!("no config.toml found, using defaults");
    TomlConfig::default()
}
