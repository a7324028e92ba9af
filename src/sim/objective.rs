/// Level objective: defeat a number of enemies before the clock runs out.
///
/// Both numbers are rolled when the level starts. Finishing early ranks
/// higher; the rank decides the score bonus.

use rand::Rng;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Rank {
    S,
    A,
    B,
    C,
    D,
    F,
}

impl Rank {
    /// Rank from the fraction of the time limit that was used.
    pub fn from_time_used(fraction: f32) -> Rank {
        match fraction {
            f if f <= 0.25 => Rank::S,
            f if f <= 0.40 => Rank::A,
            f if f <= 0.55 => Rank::B,
            f if f <= 0.70 => Rank::C,
            f if f <= 0.85 => Rank::D,
            _ => Rank::F,
        }
    }

    pub fn bonus(self) -> u32 {
        match self {
            Rank::S => 5000,
            Rank::A => 3000,
            Rank::B => 2000,
            Rank::C => 1000,
            Rank::D => 500,
            Rank::F => 0,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Rank::S => 'S',
            Rank::A => 'A',
            Rank::B => 'B',
            Rank::C => 'C',
            Rank::D => 'D',
            Rank::F => 'F',
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ObjectiveState {
    Running,
    Complete(Rank),
    Failed,
}

#[derive(Clone, Debug)]
pub struct TimeObjective {
    pub time_limit: f32,
    pub kill_target: u32,
    pub kills: u32,
    pub elapsed: f32,
    pub state: ObjectiveState,
}

impl TimeObjective {
    pub fn new(time_limit: f32, kill_target: u32) -> Self {
        TimeObjective {
            time_limit,
            kill_target: kill_target.max(1),
            kills: 0,
            elapsed: 0.0,
            state: ObjectiveState::Running,
        }
    }

    /// 30–150 s for 10–40 kills, capped at what the waves can supply.
    pub fn roll<R: Rng + ?Sized>(rng: &mut R, max_kills: u32) -> Self {
        let time = rng.random_range(30.0..150.0);
        let kills = rng.random_range(10..=40).min(max_kills.max(1));
        TimeObjective::new(time, kills)
    }

    pub fn time_left(&self) -> f32 {
        (self.time_limit - self.elapsed).max(0.0)
    }

    pub fn message(&self) -> String {
        format!("Defeat {} enemies within {:.0} s", self.kill_target, self.time_limit)
    }

    pub fn on_kill(&mut self) {
        if self.state == ObjectiveState::Running {
            self.kills += 1;
        }
    }

    /// Advance the clock. Returns the new state the tick it changes.
    pub fn update(&mut self, dt: f32) -> Option<ObjectiveState> {
        if self.state != ObjectiveState::Running { return None; }
        self.elapsed += dt;
        if self.kills >= self.kill_target {
            let rank = Rank::from_time_used(self.elapsed / self.time_limit);
            self.state = ObjectiveState::Complete(rank);
            return Some(self.state);
        }
        if self.elapsed >= self.time_limit {
            self.state = ObjectiveState::Failed;
            return Some(self.state);
        }
        None
    }
}
