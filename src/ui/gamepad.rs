/// Gamepad input tracker using gilrs.
///
/// Actions are bound to buttons through the `[gamepad]` config section.
/// Default bindings:
///   D-pad / Left Stick    →  Walk left / right
///   A                     →  Jump
///   X / R2                →  Fire
///   R1 / L1               →  Next / previous ammo mode
///   Start                 →  Confirm / Pause
///   Select                →  Back / Quit

#[cfg(feature = "gamepad")]
use gilrs::{Axis, Button, EventType, Gilrs};

use crate::config::GamepadConfig;
use crate::domain::entity::Facing;

const STICK_DEADZONE: f32 = 0.25;

/// Face and shoulder buttons that can carry an action.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Btn {
    A,
    B,
    X,
    Y,
    L1,
    R1,
    L2,
    R2,
    Start,
    Select,
}

const BTN_COUNT: usize = 10;

/// Config names, upper-case. Several aliases per button.
const BTN_NAMES: &[(&str, Btn)] = &[
    ("A", Btn::A), ("SOUTH", Btn::A),
    ("B", Btn::B), ("EAST", Btn::B),
    ("X", Btn::X), ("WEST", Btn::X),
    ("Y", Btn::Y), ("NORTH", Btn::Y),
    ("L1", Btn::L1), ("LB", Btn::L1),
    ("R1", Btn::R1), ("RB", Btn::R1),
    ("L2", Btn::L2), ("LT", Btn::L2),
    ("R2", Btn::R2), ("RT", Btn::R2),
    ("START", Btn::Start),
    ("SELECT", Btn::Select), ("BACK", Btn::Select),
];

impl Btn {
    fn from_name(name: &str) -> Option<Btn> {
        let upper = name.trim().to_uppercase();
        BTN_NAMES.iter().find(|(n, _)| *n == upper).map(|&(_, b)| b)
    }

    #[cfg(feature = "gamepad")]
    fn from_gilrs(btn: Button) -> Option<Btn> {
        Some(match btn {
            Button::South => Btn::A,
            Button::East => Btn::B,
            Button::West => Btn::X,
            Button::North => Btn::Y,
            Button::LeftTrigger => Btn::L1,
            Button::RightTrigger => Btn::R1,
            Button::LeftTrigger2 => Btn::L2,
            Button::RightTrigger2 => Btn::R2,
            Button::Start => Btn::Start,
            Button::Select => Btn::Select,
            _ => return None,
        })
    }
}

/// Everything a button can be bound to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PadAction {
    Jump,
    Fire,
    NextMode,
    PrevMode,
    Confirm,
    Cancel,
}

/// Buttons bound to each action, indexed by `PadAction as usize`.
#[derive(Debug, PartialEq)]
struct Bindings([Vec<Btn>; 6]);

impl Default for Bindings {
    fn default() -> Self {
        Bindings([
            vec![Btn::A],
            vec![Btn::X, Btn::R2],
            vec![Btn::R1],
            vec![Btn::L1],
            vec![Btn::Start],
            vec![Btn::Select],
        ])
    }
}

impl Bindings {
    /// Config lists replace the defaults; an empty or all-unknown list
    /// keeps the default binding.
    fn from_config(cfg: &GamepadConfig) -> Self {
        let lists = [&cfg.jump, &cfg.fire, &cfg.next_mode, &cfg.prev_mode, &cfg.confirm, &cfg.cancel];
        let mut bindings = Bindings::default();
        for (slot, names) in bindings.0.iter_mut().zip(lists) {
            let parsed: Vec<Btn> = names.iter()
                .filter_map(|name| {
                    let btn = Btn::from_name(name);
                    if btn.is_none() { log::warn!("unknown gamepad button '{name}'"); }
                    btn
                })
                .collect();
            if !parsed.is_empty() { *slot = parsed; }
        }
        bindings
    }

    fn get(&self, action: PadAction) -> &[Btn] {
        &self.0[action as usize]
    }
}

#[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
pub struct GamepadState {
    #[cfg(feature = "gamepad")]
    gilrs: Option<Gilrs>,

    held: [bool; BTN_COUNT],
    pressed: [bool; BTN_COUNT],
    dpad_left: bool,
    dpad_right: bool,
    stick_x: f32,

    bindings: Bindings,
    pub connected: bool,
}

impl GamepadState {
    pub fn new() -> Self {
        #[cfg(feature = "gamepad")]
        let (gilrs, connected) = match Gilrs::new() {
            Ok(g) => {
                let any = g.gamepads().next().is_some();
                (Some(g), any)
            }
            Err(e) => {
                log::warn!("gamepad support unavailable: {e}");
                (None, false)
            }
        };
        #[cfg(not(feature = "gamepad"))]
        let connected = false;

        GamepadState {
            #[cfg(feature = "gamepad")]
            gilrs,
            held: [false; BTN_COUNT],
            pressed: [false; BTN_COUNT],
            dpad_left: false,
            dpad_right: false,
            stick_x: 0.0,
            bindings: Bindings::default(),
            connected,
        }
    }

    pub fn load_button_config(&mut self, cfg: &GamepadConfig) {
        self.bindings = Bindings::from_config(cfg);
    }

    /// Poll pending gilrs events. Edge state only lasts one call.
    pub fn update(&mut self) {
        self.pressed = [false; BTN_COUNT];

        #[cfg(feature = "gamepad")]
        self.poll_gilrs();
    }

    #[cfg(feature = "gamepad")]
    fn poll_gilrs(&mut self) {
        let Some(gilrs) = self.gilrs.as_mut() else { return };
        let events: Vec<EventType> = std::iter::from_fn(|| gilrs.next_event())
            .map(|e| e.event)
            .collect();

        for event in events {
            match event {
                EventType::ButtonPressed(btn, _) => self.set_button(btn, true),
                EventType::ButtonReleased(btn, _) => self.set_button(btn, false),
                EventType::AxisChanged(Axis::LeftStickX, value, _) => {
                    self.connected = true;
                    self.stick_x = value;
                }
                EventType::Connected => {
                    log::info!("gamepad connected");
                    self.connected = true;
                }
                EventType::Disconnected => {
                    log::info!("gamepad disconnected");
                    self.connected = false;
                    self.release_all();
                }
                _ => {}
            }
        }
    }

    #[cfg(feature = "gamepad")]
    fn set_button(&mut self, btn: Button, down: bool) {
        self.connected = true;
        match btn {
            Button::DPadLeft => self.dpad_left = down,
            Button::DPadRight => self.dpad_right = down,
            other => {
                if let Some(b) = Btn::from_gilrs(other) {
                    let i = b as usize;
                    if down && !self.held[i] { self.pressed[i] = true; }
                    self.held[i] = down;
                }
            }
        }
    }

    #[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
    fn release_all(&mut self) {
        self.held = [false; BTN_COUNT];
        self.dpad_left = false;
        self.dpad_right = false;
        self.stick_x = 0.0;
    }

    /// Was any button bound to `action` pressed since the last update?
    pub fn pressed(&self, action: PadAction) -> bool {
        self.bindings.get(action).iter().any(|&b| self.pressed[b as usize])
    }

    pub fn walk(&self) -> Option<Facing> {
        walk_direction(self.dpad_left, self.dpad_right, self.stick_x)
    }
}

/// Walking direction from the d-pad, or the stick past its dead zone.
fn walk_direction(dpad_left: bool, dpad_right: bool, stick_x: f32) -> Option<Facing> {
    if dpad_left || stick_x < -STICK_DEADZONE {
        Some(Facing::Left)
    } else if dpad_right || stick_x > STICK_DEADZONE {
        Some(Facing::Right)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn button_names_are_case_insensitive() {
        assert_eq!(Btn::from_name("south"), Some(Btn::A));
        assert_eq!(Btn::from_name("Rb"), Some(Btn::R1));
        assert_eq!(Btn::from_name(" back "), Some(Btn::Select));
        assert_eq!(Btn::from_name("turbo"), None);
    }

    #[test]
    fn config_overrides_only_usable_lists() {
        let cfg = GamepadConfig {
            jump: names(&["B"]),
            fire: names(&["nonsense"]),
            next_mode: Vec::new(),
            prev_mode: names(&["L2", "L1"]),
            confirm: Vec::new(),
            cancel: Vec::new(),
        };
        let map = Bindings::from_config(&cfg);
        let d = Bindings::default();
        assert_eq!(map.get(PadAction::Jump), &[Btn::B]);
        assert_eq!(map.get(PadAction::Fire), d.get(PadAction::Fire));
        assert_eq!(map.get(PadAction::NextMode), d.get(PadAction::NextMode));
        assert_eq!(map.get(PadAction::PrevMode), &[Btn::L2, Btn::L1]);
    }

    #[test]
    fn stick_needs_to_pass_the_dead_zone() {
        assert_eq!(walk_direction(false, false, -0.1), None);
        assert_eq!(walk_direction(false, false, 0.8), Some(Facing::Right));
        assert_eq!(walk_direction(true, false, 0.8), Some(Facing::Left));
    }
}
