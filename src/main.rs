/// Entry point and game loop.

mod config;
mod domain;
mod sim;
mod ui;

use std::fs::File;
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crossterm::event::KeyCode;
use rand::Rng;

use config::GameConfig;
use domain::entity::{AmmoKind, Facing, FrameInput, ModeChange};
use domain::tile::TileMap;
use sim::clock::FrameClock;
use sim::level;
use sim::step;
use sim::world::{Phase, WorldState};
use ui::gamepad::{GamepadState, PadAction};
use ui::input::InputState;
use ui::renderer::Renderer;
use ui::sound::SoundEngine;

const FRAME_SLEEP: Duration = Duration::from_millis(5);

/// Log file, overridable with REVERT_LOG_FILE. The terminal belongs to
/// the renderer, so nothing is ever logged to stderr while playing.
const DEFAULT_LOG_FILE: &str = "revert.log";

fn main() {
    init_logging();

    let config = GameConfig::load();

    let map = match level::load_map(config.map_path.as_deref(), config.y_offset) {
        Ok(map) => map,
        Err(e) => {
            log::error!("map load failed: {e}");
            eprintln!("Could not load map: {e}");
            std::process::exit(1);
        }
    };

    let seed = config.seed.unwrap_or_else(clock_seed);
    log::info!("seed {seed}");
    let mut world = WorldState::new(map.clone(), config.clone(), seed);

    let mut renderer = Renderer::new();

    if let Err(e) = renderer.init() {
        eprintln!("Terminal init failed: {e}");
        return;
    }

    let sound = SoundEngine::new();

    let result = game_loop(&mut world, &map, &mut renderer, sound.as_ref(), &config);

    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }

    if let Err(e) = result {
        log::error!("game loop failed: {e}");
        eprintln!("Game error: {e}");
    }

    println!();
    println!("Final Score: {}", world.score);
}

fn init_logging() {
    let path = std::env::var_os("REVERT_LOG_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    );
    match File::create(&path) {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        Err(e) => {
            eprintln!("could not open log file {}: {e}", path.display());
            builder.filter_level(log::LevelFilter::Off);
        }
    }
    builder.init();
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

fn game_loop(
    world: &mut WorldState,
    map: &TileMap,
    renderer: &mut Renderer,
    sound: Option<&SoundEngine>,
    config: &GameConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut kb = InputState::new();
    let mut gp = GamepadState::new();
    gp.load_button_config(&config.gamepad);
    if gp.connected {
        log::info!("gamepad detected");
    }
    let clock = FrameClock::from_millis(config.speed.tick_rate_ms);
    let dt = clock.delta_seconds();
    log::info!("tick period {} ms", clock.period_ms());
    let mut last_tick = Instant::now();

    // Edge inputs seen between ticks, consumed by the next step.
    let mut pending = FrameInput::default();

    loop {
        kb.drain_events();
        gp.update();

        if kb.ctrl_c_pressed() {
            break;
        }
        if handle_meta(world, map, &kb, &gp, config) {
            break;
        }

        let playing = world.phase == Phase::Playing && !world.paused;
        if playing {
            latch_edges(&mut pending, &kb, &gp, renderer);
        }

        if last_tick.elapsed() >= clock.period() {
            if playing {
                let mut input = std::mem::take(&mut pending);
                input.movement = detect_movement(&kb, &gp);
                let events = step::step(world, input, dt);
                if let Some(sfx) = sound {
                    sfx.play_events(&events);
                }
            } else {
                pending = FrameInput::default();
            }
            last_tick = Instant::now();
        }

        renderer.render(world)?;
        std::thread::sleep(FRAME_SLEEP);
    }

    Ok(())
}

// ── Key Constants ──

const KEYS_LEFT: &[KeyCode] = &[KeyCode::Left, KeyCode::Char('a'), KeyCode::Char('A')];
const KEYS_RIGHT: &[KeyCode] = &[KeyCode::Right, KeyCode::Char('d'), KeyCode::Char('D')];
const KEYS_JUMP: &[KeyCode] = &[KeyCode::Up, KeyCode::Char('w'), KeyCode::Char('W'), KeyCode::Char(' ')];
const KEYS_FIRE: &[KeyCode] = &[KeyCode::Char('z'), KeyCode::Char('Z'), KeyCode::Char('x'), KeyCode::Char('X')];
const KEYS_RELOAD: &[KeyCode] = &[KeyCode::Char('r'), KeyCode::Char('R')];
const KEYS_NEXT_MODE: &[KeyCode] = &[KeyCode::Char('e'), KeyCode::Char('E'), KeyCode::Tab];
const KEYS_PREV_MODE: &[KeyCode] = &[KeyCode::Char('q'), KeyCode::Char('Q'), KeyCode::BackTab];
const KEYS_CONFIRM: &[KeyCode] = &[KeyCode::Enter];

fn detect_movement(kb: &InputState, gp: &GamepadState) -> Option<Facing> {
    if kb.any_held(KEYS_LEFT) || kb.any_pressed(KEYS_LEFT) {
        Some(Facing::Left)
    } else if kb.any_held(KEYS_RIGHT) || kb.any_pressed(KEYS_RIGHT) {
        Some(Facing::Right)
    } else {
        gp.walk()
    }
}

fn detect_mode(kb: &InputState, gp: &GamepadState) -> Option<ModeChange> {
    for (i, c) in ['1', '2', '3'].into_iter().enumerate() {
        if kb.was_pressed(KeyCode::Char(c)) {
            return AmmoKind::from_index(i).map(ModeChange::Set);
        }
    }
    if kb.any_pressed(KEYS_NEXT_MODE) || gp.pressed(PadAction::NextMode) {
        Some(ModeChange::Next)
    } else if kb.any_pressed(KEYS_PREV_MODE) || gp.pressed(PadAction::PrevMode) {
        Some(ModeChange::Prev)
    } else {
        None
    }
}

/// Fold this frame's one-shot presses into the input for the next tick.
fn latch_edges(pending: &mut FrameInput, kb: &InputState, gp: &GamepadState, renderer: &Renderer) {
    pending.jump |= kb.any_pressed(KEYS_JUMP) || gp.pressed(PadAction::Jump);
    pending.fire |= kb.any_pressed(KEYS_FIRE) || kb.clicked() || gp.pressed(PadAction::Fire);
    pending.reload |= kb.any_pressed(KEYS_RELOAD);
    if let Some(mode) = detect_mode(kb, gp) {
        pending.mode = Some(mode);
    }
    if let Some((col, row)) = kb.pointer_moved() {
        if let Some(aim) = renderer.pointer_to_world(col, row) {
            pending.aim = Some(aim);
        }
    }
}

/// Fresh world on the same map, back at the title screen.
fn return_to_title(world: &mut WorldState, map: &TileMap, seed: u64) {
    let config = world.config.clone();
    *world = WorldState::new(map.clone(), config, seed);
}

fn start_game(world: &mut WorldState) {
    level::start_level(world);
    log::info!("game started, objective: {}", world.objective.message());
}

/// Phase transitions and pause. Returns true to quit.
fn handle_meta(
    world: &mut WorldState,
    map: &TileMap,
    kb: &InputState,
    gp: &GamepadState,
    config: &GameConfig,
) -> bool {
    let confirm = kb.any_pressed(KEYS_CONFIRM) || gp.pressed(PadAction::Confirm);
    let esc = kb.any_pressed(&[KeyCode::Esc]) || gp.pressed(PadAction::Cancel);

    match world.phase {
        Phase::Title => {
            if esc {
                return true;
            }
            if confirm {
                start_game(world);
            }
        }
        Phase::Playing => {
            if world.paused && esc {
                let seed = next_seed(world, config);
                return_to_title(world, map, seed);
                log::info!("game abandoned");
            } else if kb.any_pressed(&[KeyCode::F(1)]) || esc || gp.pressed(PadAction::Confirm)
                || (world.paused && confirm)
            {
                world.paused = !world.paused;
                log::debug!("paused: {}", world.paused);
            }
        }
        Phase::GameOver | Phase::Victory => {
            if confirm {
                let seed = next_seed(world, config);
                return_to_title(world, map, seed);
                start_game(world);
            } else if esc {
                let seed = next_seed(world, config);
                return_to_title(world, map, seed);
            }
        }
    }
    false
}

/// A fixed seed in the config replays the same game every time.
fn next_seed(world: &mut WorldState, config: &GameConfig) -> u64 {
    config.seed.unwrap_or_else(|| world.rng.random::<u64>())
}
