/// Terminal renderer.
///
/// Each frame is composed into `front`, diffed cell by cell against
/// `back` (what the terminal already shows), and only changed cells are
/// queued and flushed. The buffers then swap.
///
/// ## Projection
///
/// One tile is `CELL_W` terminal columns by one terminal row, so a
/// terminal cell covers `tile_w / CELL_W` by `tile_h` world pixels. The
/// horizontal extent is the map's visible window, narrowed to the
/// terminal width and kept centered.

use std::collections::{HashMap, HashSet};
use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    event::{DisableMouseCapture, EnableMouseCapture},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};
use glam::Vec2;

use crate::domain::ai::AiKind;
use crate::domain::entity::{Actor, AmmoKind};
use crate::sim::world::{Phase, WorldState};

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Cell {
    /// Explicit dark background for every "empty" terminal cell, so the
    /// gap pixels between rows match the cells on VTE terminals.
    const BASE_BG: Color = Color::Rgb { r: 22, g: 22, b: 35 };

    const BLANK: Cell = Cell { ch: ' ', fg: Color::White, bg: Cell::BASE_BG };

    /// Sentinel used to invalidate the back buffer.
    const INVALID: Cell = Cell { ch: '?', fg: Color::Magenta, bg: Color::Magenta };

    fn new(ch: char, fg: Color, bg: Color) -> Self {
        let bg = match bg {
            Color::Reset => Self::BASE_BG,
            other => other,
        };
        Cell { ch, fg, bg }
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![Cell::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            if x + i >= self.width { break; }
            self.set(x + i, y, Cell::new(ch, fg, bg));
        }
    }

    fn fill_row(&mut self, y: usize, bg: Color) {
        for x in 0..self.width {
            self.set(x, y, Cell::new(' ', Color::White, bg));
        }
    }
}

// ── Viewport: world pixels ⇄ terminal cells ──

/// Terminal columns per tile.
const CELL_W: usize = 2;

const HUD_ROW: usize = 0;
const MAP_ROW: usize = 2;

#[derive(Clone, Copy, PartialEq, Debug)]
struct Viewport {
    /// World x of the left edge of terminal column 0.
    left_px: f32,
    /// First visible map column (unwrapped).
    left_col: i32,
    px_per_col: f32,
    px_per_row: f32,
    y_offset: f32,
    world_w: f32,
    cols: usize,
    rows: usize,
}

impl Viewport {
    /// Fit the map's visible window into `term_cols` x `term_rows` cells.
    fn fit(w: &WorldState, term_cols: usize, term_rows: usize) -> Self {
        let map = &w.map;
        let win = map.window();
        let wanted = (win.right - win.left).max(1) as usize;
        let fits = (term_cols / CELL_W).max(1);
        let tiles = wanted.min(fits);
        let left_col = win.left + ((wanted - tiles) / 2) as i32;
        Viewport {
            left_px: left_col as f32 * map.tile_w(),
            left_col,
            px_per_col: map.tile_w() / CELL_W as f32,
            px_per_row: map.tile_h(),
            y_offset: map.y_offset(),
            world_w: map.pixel_width(),
            cols: tiles * CELL_W,
            rows: map.rows().min(term_rows),
        }
    }

    /// Terminal cell for a world point, if it is on screen.
    fn to_screen(&self, p: Vec2) -> Option<(usize, usize)> {
        if self.world_w <= 0.0 { return None; }
        let rel_x = (p.x - self.left_px).rem_euclid(self.world_w);
        let col = (rel_x / self.px_per_col).floor();
        let row = ((p.y - self.y_offset) / self.px_per_row).floor();
        if col < 0.0 || row < 0.0 { return None; }
        let (col, row) = (col as usize, row as usize);
        (col < self.cols && row < self.rows).then_some((col, MAP_ROW + row))
    }

    /// World point at the middle of a terminal cell.
    fn to_world(&self, col: usize, row: usize) -> Option<Vec2> {
        if col >= self.cols || row < MAP_ROW || row - MAP_ROW >= self.rows { return None; }
        let x = self.left_px + (col as f32 + 0.5) * self.px_per_col;
        let y = self.y_offset + ((row - MAP_ROW) as f32 + 0.5) * self.px_per_row;
        Some(Vec2::new(x.rem_euclid(self.world_w.max(1.0)), y))
    }
}

// ── Animations ──

/// Glyph lookup for actor animation names. Unknown names draw a
/// placeholder and are logged once.
struct Animations {
    frames: HashMap<&'static str, char>,
    warned: HashSet<String>,
}

const PLACEHOLDER: char = '?';

impl Animations {
    fn new() -> Self {
        let frames = HashMap::from([
            ("idle", 'o'),
            ("walk", 'w'),
            ("jump", '^'),
            ("fall", 'v'),
            ("attack", '*'),
        ]);
        Animations { frames, warned: HashSet::new() }
    }

    fn glyph(&mut self, name: &str) -> char {
        match self.frames.get(name) {
            Some(&g) => g,
            None => {
                if self.warned.insert(name.to_string()) {
                    log::warn!("no animation named '{name}', using placeholder");
                }
                PLACEHOLDER
            }
        }
    }
}

// ── Palette ──

const HUD_BG: Color = Color::Rgb { r: 20, g: 20, b: 60 };
const MSG_BG: Color = Color::Rgb { r: 200, g: 180, b: 50 };
const TILE_FG: Color = Color::Rgb { r: 90, g: 100, b: 130 };
const TILE_BG: Color = Color::Rgb { r: 50, g: 56, b: 80 };

/// Solid tile types cycle through a few shades.
fn tile_glyph(id: u32) -> char {
    match id % 3 {
        1 => '▓',
        2 => '▒',
        _ => '█',
    }
}
const PLAYER_FG: Color = Color::Rgb { r: 80, g: 255, b: 160 };
const FLASH_FG: Color = Color::White;

fn ammo_color(kind: AmmoKind) -> Color {
    match kind {
        AmmoKind::Copper => Color::Rgb { r: 205, g: 120, b: 60 },
        AmmoKind::Silver => Color::Rgb { r: 200, g: 200, b: 215 },
        AmmoKind::Gold => Color::Rgb { r: 255, g: 210, b: 40 },
    }
}

fn actor_color(a: &Actor) -> Color {
    if a.hit_timer > 0.0 { return FLASH_FG; }
    match a.ai() {
        None => PLAYER_FG,
        Some(ai) if ai.kind() == AiKind::Inert => Color::DarkGrey,
        Some(ai) => ammo_color(ai.kind().weakness()),
    }
}

// ── Renderer ──

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_phase: Option<Phase>,
    viewport: Option<Viewport>,
    animations: Animations,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_phase: None,
            viewport: None,
            animations: Animations::new(),
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            EnableMouseCapture,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.term_w = tw as usize;
        self.term_h = th as usize;
        self.front.resize(self.term_w, self.term_h);
        self.back.resize(self.term_w, self.term_h);
        self.back.cells.fill(Cell::INVALID);
        log::info!("terminal {}x{}", self.term_w, self.term_h);

        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(
            self.writer,
            ResetColor,
            DisableMouseCapture,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    /// World point under a terminal cell, using the last drawn frame.
    pub fn pointer_to_world(&self, col: u16, row: u16) -> Option<Vec2> {
        self.viewport?.to_world(col as usize, row as usize)
    }

    pub fn render(&mut self, world: &WorldState) -> io::Result<()> {
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
        }

        if self.last_phase != Some(world.phase) {
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
            self.last_phase = Some(world.phase);
        }

        let reserved_rows = MAP_ROW + 4; // HUD + gap + message + help
        let viewport = Viewport::fit(world, self.term_w, self.term_h.saturating_sub(reserved_rows));
        self.viewport = Some(viewport);

        self.front.clear();
        match world.phase {
            Phase::Title => self.compose_title(world),
            Phase::Playing => self.compose_game(world, &viewport),
            Phase::GameOver => self.compose_end(world, false),
            Phase::Victory => self.compose_end(world, true),
        }
        if world.paused && world.phase == Phase::Playing {
            self.compose_pause_overlay(&viewport);
        }

        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut cursor_at: Option<(usize, usize)> = None;

        queue!(self.writer,
            SetForegroundColor(Color::White),
            SetBackgroundColor(Cell::BASE_BG),
        )?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) { continue; }

                if cursor_at != Some((x, y)) {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }
                queue!(self.writer, Print(cell.ch))?;
                cursor_at = Some((x + 1, y));
            }
        }

        self.writer.flush()
    }

    // ── Compose: build front buffer content ──

    fn compose_game(&mut self, w: &WorldState, vp: &Viewport) {
        self.compose_hud(w);
        self.compose_tiles(w, vp);

        for a in &w.actors {
            self.compose_actor(a, vp);
        }
        for b in &w.bullets {
            if let Some((x, y)) = vp.to_screen(b.pos) {
                self.front.set(x, y, Cell::new('•', ammo_color(b.kind), Color::Reset));
            }
        }
        if let Some(p) = w.player() {
            if let Some(ps) = p.player_state() {
                if let Some((x, y)) = vp.to_screen(p.center() + ps.aim) {
                    self.front.set(x, y, Cell::new('+', ammo_color(ps.mode), Color::Reset));
                }
            }
        }

        let msg_row = MAP_ROW + vp.rows + 1;
        if !w.message.is_empty() && msg_row < self.front.height {
            self.front.fill_row(msg_row, MSG_BG);
            self.front.put_str(1, msg_row, &w.message, Color::Black, MSG_BG);
        }

        let help_row = MAP_ROW + vp.rows + 3;
        if help_row < self.front.height {
            let help = " ←/→ A/D:Move  ↑/W/Space:Jump  Z/Click:Fire  R:Reload  1-3/Q/E:Ammo  F1:Pause";
            self.front.put_str(0, help_row, help, Color::DarkGrey, Color::Reset);
        }
    }

    fn compose_hud(&mut self, w: &WorldState) {
        self.front.fill_row(HUD_ROW, HUD_BG);
        let Some(s) = &w.status else {
            self.front.put_str(1, HUD_ROW, "REVERT", Color::White, HUD_BG);
            return;
        };
        let hud = format!(
            " HP {}/{}  Ammo {}/{} [{}]  Score {:<7} Wave {}/{}  Enemies {}  Kills {}/{}  Left {:>3.0}s  Time {:.1}s",
            s.hp.max(0), s.max_hp, s.ammo, s.max_ammo, s.mode.name(), s.score,
            s.wave, s.waves, s.enemies, s.kills, s.kill_target, s.time_left, s.elapsed,
        );
        self.front.put_str(0, HUD_ROW, &hud, Color::White, HUD_BG);
        // Mode tag in its own color.
        if let Some(i) = hud.find('[') {
            let tag = format!("[{}]", s.mode.name());
            self.front.put_str(hud[..i].chars().count(), HUD_ROW, &tag, ammo_color(s.mode), HUD_BG);
        }
    }

    fn compose_tiles(&mut self, w: &WorldState, vp: &Viewport) {
        let map = &w.map;
        for row in 0..vp.rows {
            for t in 0..vp.cols / CELL_W {
                let col = map.wrap_col(vp.left_col + t as i32);
                if !map.is_solid(col, row as i32) { continue; }
                let ch = tile_glyph(map.tile_id(col, row as i32));
                for k in 0..CELL_W {
                    self.front.set(t * CELL_W + k, MAP_ROW + row, Cell::new(ch, TILE_FG, TILE_BG));
                }
            }
        }
    }

    /// Body cells in the actor's color, animation glyph on the head cell.
    fn compose_actor(&mut self, a: &Actor, vp: &Viewport) {
        let fg = actor_color(a);
        let glyph = self.animations.glyph(a.animation);
        let top_left = a.top_left();
        let width = a.body.half_width * 2.0;
        let cols = (width / vp.px_per_col).ceil().max(1.0) as usize;
        let rows = (a.body.height / vp.px_per_row).ceil().max(1.0) as usize;
        for r in 0..rows {
            for c in 0..cols {
                let p = top_left + Vec2::new(
                    (c as f32 + 0.5) * vp.px_per_col,
                    (r as f32 + 0.5) * vp.px_per_row,
                );
                let Some((x, y)) = vp.to_screen(p) else { continue };
                let ch = if r == 0 { glyph } else { '█' };
                self.front.set(x, y, Cell::new(ch, fg, Color::Reset));
            }
        }
    }

    fn compose_title(&mut self, w: &WorldState) {
        let hdr = Color::Rgb { r: 255, g: 220, b: 50 };
        let art = [
            "╔══════════════════════════════╗",
            "║           REVERT             ║",
            "╚══════════════════════════════╝",
        ];
        for (i, l) in art.iter().enumerate() {
            self.front.put_str(6, 3 + i, l, hdr, Color::Reset);
        }
        self.front.put_str(8, 8, &w.objective.message(), Color::White, Color::Reset);
        let rows = [
            ("Copper", "hurts passive enemies", AmmoKind::Copper),
            ("Silver", "hurts active enemies", AmmoKind::Silver),
            ("Gold", "hurts aggressive enemies", AmmoKind::Gold),
        ];
        for (i, (name, desc, kind)) in rows.iter().enumerate() {
            self.front.put_str(8, 10 + i, &format!("{name:<7}{desc}"), ammo_color(*kind), Color::Reset);
        }
        self.front.put_str(8, 14, "ENTER: Start   ESC: Quit", PLAYER_FG, Color::Reset);
    }

    fn compose_end(&mut self, w: &WorldState, won: bool) {
        let (title, color) = if won {
            ("║        ALL WAVES CLEARED     ║", Color::Rgb { r: 255, g: 220, b: 50 })
        } else {
            ("║           GAME  OVER         ║", Color::Rgb { r: 255, g: 60, b: 60 })
        };
        self.front.put_str(6, 4, "╔══════════════════════════════╗", color, Color::Reset);
        self.front.put_str(6, 5, title, color, Color::Reset);
        self.front.put_str(6, 6, "╚══════════════════════════════╝", color, Color::Reset);
        self.front.put_str(8, 9, &format!("Final Score: {}", w.score), Color::White, Color::Reset);
        self.front.put_str(8, 10, &format!("Time: {:.1}s  Waves: {}/{}", w.elapsed, w.wave, w.waves_total), Color::White, Color::Reset);
        self.front.put_str(8, 12, "ENTER: Play again   ESC: Quit", PLAYER_FG, Color::Reset);
    }

    fn compose_pause_overlay(&mut self, vp: &Viewport) {
        let dim = Color::Rgb { r: 40, g: 40, b: 40 };
        let box_w = 30_usize;
        let box_h = 6_usize;
        let box_x = vp.cols.saturating_sub(box_w) / 2;
        let box_y = MAP_ROW + vp.rows.saturating_sub(box_h) / 2;
        for y in box_y..box_y + box_h {
            for x in box_x..box_x + box_w {
                self.front.set(x, y, Cell::new(' ', Color::Reset, dim));
            }
        }
        let hdr = Color::Rgb { r: 255, g: 220, b: 50 };
        let key = Color::Rgb { r: 100, g: 200, b: 255 };
        self.front.put_str(box_x + 11, box_y + 1, "PAUSED", hdr, dim);
        self.front.put_str(box_x + 2, box_y + 3, "F1  Resume", key, dim);
        self.front.put_str(box_x + 2, box_y + 4, "ESC Back to Title", key, dim);
    }
}
