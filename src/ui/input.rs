/// Keyboard and mouse state tracker.
///
/// Keys:
///   - Held keys drive continuous movement
///   - Fresh presses drive one-shot actions (jump, fire, reload, mode)
///
/// Mouse:
///   - The last pointer cell is the aim point (converted to world space
///     by the renderer)
///   - A left click is a fire press
///
/// Most terminals never report key releases, so a key counts as held
/// until `HOLD_TIMEOUT` passes without a press or auto-repeat.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton,
    MouseEventKind,
};

/// Longer than the usual terminal auto-repeat interval.
const HOLD_TIMEOUT: Duration = Duration::from_millis(160);

pub struct InputState {
    /// Last press or repeat seen for each key.
    last_active: HashMap<KeyCode, Instant>,

    /// Keys that went from "not held" to "held" during the most recent
    /// drain_events() call.
    fresh_presses: Vec<KeyCode>,

    /// Every key event from the last drain, modifiers included.
    pub raw_events: Vec<KeyEvent>,

    /// Drop keys on Release events. Off unless the terminal is known to
    /// send them.
    pub honor_release: bool,

    /// Terminal cell under the mouse, when it moved this frame.
    pointer_moved: Option<(u16, u16)>,
    clicked: bool,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            last_active: HashMap::with_capacity(16),
            fresh_presses: Vec::with_capacity(8),
            raw_events: Vec::with_capacity(8),
            honor_release: false,
            pointer_moved: None,
            clicked: false,
        }
    }

    /// Drain all pending terminal events and update key/mouse state.
    /// Call this once per frame, before the simulation tick.
    pub fn drain_events(&mut self) {
        self.fresh_presses.clear();
        self.raw_events.clear();
        self.pointer_moved = None;
        self.clicked = false;

        while poll(Duration::ZERO).unwrap_or(false) {
            match event::read() {
                Ok(Event::Key(key)) => {
                    self.raw_events.push(key);
                    match key.kind {
                        KeyEventKind::Release if self.honor_release => {
                            self.last_active.remove(&key.code);
                        }
                        KeyEventKind::Release => {}
                        _ => self.record_press(key.code, Instant::now()),
                    }
                }
                Ok(Event::Mouse(m)) => match m.kind {
                    MouseEventKind::Moved | MouseEventKind::Drag(_) => {
                        self.pointer_moved = Some((m.column, m.row));
                    }
                    MouseEventKind::Down(MouseButton::Left) => {
                        self.pointer_moved = Some((m.column, m.row));
                        self.clicked = true;
                    }
                    _ => {}
                },
                Ok(_) => {}
                Err(e) => {
                    log::warn!("input read failed: {e}");
                    break;
                }
            }
        }

        self.expire(Instant::now());
    }

    pub fn is_held(&self, code: KeyCode) -> bool {
        self.last_active.get(&code).is_some_and(|t| t.elapsed() < HOLD_TIMEOUT)
    }

    pub fn any_held(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.is_held(*c))
    }

    /// Pressed during the last drain after not being held.
    pub fn was_pressed(&self, code: KeyCode) -> bool {
        self.fresh_presses.contains(&code)
    }

    pub fn any_pressed(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.was_pressed(*c))
    }

    pub fn pointer_moved(&self) -> Option<(u16, u16)> {
        self.pointer_moved
    }

    pub fn clicked(&self) -> bool {
        self.clicked
    }

    pub fn ctrl_c_pressed(&self) -> bool {
        self.raw_events.iter().any(|k| {
            k.modifiers.contains(KeyModifiers::CONTROL)
                && matches!(k.code, KeyCode::Char('c' | 'C'))
        })
    }

    // ── Internal ──

    fn record_press(&mut self, code: KeyCode, at: Instant) {
        let was_held = self.last_active.get(&code)
            .map(|t| at.duration_since(*t) < HOLD_TIMEOUT)
            .unwrap_or(false);
        self.last_active.insert(code, at);
        if !was_held {
            self.fresh_presses.push(code);
        }
    }

    /// Drop keys whose last press is older than the hold timeout.
    fn expire(&mut self, now: Instant) {
        self.last_active.retain(|_, t| now.duration_since(*t) < HOLD_TIMEOUT);
    }
}
