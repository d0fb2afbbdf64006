//! A side-scroller: square players run and jump on a platform under gravity.
//!
//! `y` points up and gravity pulls one unit per tick per tick. Grounded players change
//! direction instantly; airborne players only nudge their horizontal velocity. Ground
//! contact is derived from geometry after every step and after every
//! [`set_state`](Simulation::set_state), so a snapshot's `on_ground` flag never
//! needs to be trusted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{CompoundAction, Config, PlayerId, Simulation, StateAlgebra, Structural, SyncError};

/// Downward acceleration per tick.
pub const GRAVITY: f64 = 1.0;

/// Horizontal speed of a grounded runner.
pub const RUN_SPEED: f64 = 5.0;

/// Upward velocity given by a jump.
pub const JUMP_VELOCITY: f64 = 8.0;

/// Share of the requested velocity an airborne player picks up per tick.
pub const AIR_CONTROL: f64 = 0.1;

/// Horizontal velocity kept per tick by a grounded player with no move input.
pub const GROUND_FRICTION: f64 = 0.8;

/// Below this horizontal speed a grounded player without input stops dead.
pub const REST_SPEED: f64 = 0.1;

/// Edge length of every player.
pub const PLAYER_SIZE: f64 = 50.0;

/// Contact tolerance for ground detection.
const GROUND_EPSILON: f64 = 1.0;

/// Marker type binding [`SideScrollerAction`] and [`SideScrollerState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SideScrollerConfig;

impl Config for SideScrollerConfig {
    type Action = SideScrollerAction;
    type State = SideScrollerState;
}

/// Horizontal run direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Heading {
    /// Negative `x`.
    Left,
    /// Positive `x`.
    Right,
}

impl Heading {
    const fn speed(self) -> f64 {
        match self {
            Self::Left => -RUN_SPEED,
            Self::Right => RUN_SPEED,
        }
    }
}

/// A player's input for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SideScrollerAction {
    /// Run direction, if any.
    pub movement: Option<Heading>,
    /// Jump if standing on something.
    pub jump: bool,
}

impl SideScrollerAction {
    /// Runs in `heading`.
    #[must_use]
    pub const fn running(heading: Heading) -> Self {
        Self {
            movement: Some(heading),
            jump: false,
        }
    }

    /// Jumps in place.
    #[must_use]
    pub const fn jumping() -> Self {
        Self {
            movement: None,
            jump: true,
        }
    }
}

/// An axis-aligned player box, positioned by its center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Runner {
    /// Center.
    pub x: f64,
    /// Center.
    pub y: f64,
    /// Horizontal velocity per tick.
    pub vx: f64,
    /// Vertical velocity per tick.
    pub vy: f64,
    /// Box width.
    pub width: Structural<f64>,
    /// Box height.
    pub height: Structural<f64>,
    /// Standing on a platform. Recomputed from geometry, never summed.
    pub on_ground: Structural<bool>,
}

impl Runner {
    fn spawned() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            vx: 0.0,
            vy: 0.0,
            width: Structural(PLAYER_SIZE),
            height: Structural(PLAYER_SIZE),
            on_ground: Structural(false),
        }
    }

    fn bottom(&self) -> f64 {
        self.y - *self.height / 2.0
    }
}

impl StateAlgebra for Runner {
    fn add(&self, other: &Self) -> Self {
        Self {
            x: self.x.add(&other.x),
            y: self.y.add(&other.y),
            vx: self.vx.add(&other.vx),
            vy: self.vy.add(&other.vy),
            width: self.width.add(&other.width),
            height: self.height.add(&other.height),
            on_ground: self.on_ground.add(&other.on_ground),
        }
    }

    fn negate(&self) -> Self {
        Self {
            x: self.x.negate(),
            y: self.y.negate(),
            vx: self.vx.negate(),
            vy: self.vy.negate(),
            width: self.width.negate(),
            height: self.height.negate(),
            on_ground: self.on_ground.negate(),
        }
    }
}

/// A static platform, positioned by its center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    /// Center.
    pub x: f64,
    /// Center.
    pub y: f64,
    /// Extent along `x`.
    pub width: f64,
    /// Extent along `y`.
    pub height: f64,
}

impl Platform {
    fn top(&self) -> f64 {
        self.y + self.height / 2.0
    }

    fn overlaps_horizontally(&self, runner: &Runner) -> bool {
        (runner.x - self.x).abs() < (*runner.width + self.width) / 2.0
    }
}

/// Snapshot of the level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideScrollerState {
    /// Every spawned player.
    pub players: BTreeMap<PlayerId, Runner>,
    /// Level geometry, carried verbatim through deltas.
    pub platforms: Structural<BTreeMap<String, Platform>>,
}

impl SideScrollerState {
    /// An empty level with one platform below the spawn point.
    #[must_use]
    pub fn new() -> Self {
        let mut platforms = BTreeMap::new();
        platforms.insert(
            "platform-1".to_owned(),
            Platform {
                x: 0.0,
                y: -100.0,
                width: 500.0,
                height: 50.0,
            },
        );
        Self {
            players: BTreeMap::new(),
            platforms: Structural(platforms),
        }
    }
}

impl Default for SideScrollerState {
    fn default() -> Self {
        Self::new()
    }
}

impl StateAlgebra for SideScrollerState {
    fn add(&self, other: &Self) -> Self {
        Self {
            players: self.players.add(&other.players),
            platforms: self.platforms.add(&other.platforms),
        }
    }

    fn negate(&self) -> Self {
        Self {
            players: self.players.negate(),
            platforms: self.platforms.negate(),
        }
    }
}

/// The side-scroller simulation.
///
/// [`predict`](Simulation::predict) always freezes players that have no action in the
/// compound: a client cannot guess when a remote player jumps.
#[derive(Debug, Clone, Default)]
pub struct SideScroller {
    state: SideScrollerState,
}

impl SideScroller {
    /// An empty level.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn apply_actions(&mut self, actions: &CompoundAction<SideScrollerAction>) {
        for (id, action) in actions.iter() {
            let Some(runner) = self.state.players.get_mut(id) else {
                continue;
            };
            let grounded = *runner.on_ground;
            match action.movement {
                Some(heading) if grounded => runner.vx = heading.speed(),
                Some(heading) => {
                    runner.vx = runner.vx * (1.0 - AIR_CONTROL) + heading.speed() * AIR_CONTROL;
                },
                None if grounded => {
                    runner.vx *= GROUND_FRICTION;
                    if runner.vx.abs() < REST_SPEED {
                        runner.vx = 0.0;
                    }
                },
                None => {},
            }
            if action.jump && grounded {
                runner.vy = JUMP_VELOCITY;
                runner.on_ground = Structural(false);
            }
        }
    }

    fn step(&mut self, moving: impl Fn(&PlayerId) -> bool) {
        let platforms = &self.state.platforms;
        for (id, runner) in &mut self.state.players {
            if !moving(id) {
                continue;
            }
            runner.vy -= GRAVITY;
            runner.x += runner.vx;
            runner.y += runner.vy;
            for platform in platforms.values() {
                resolve_platform(runner, platform);
            }
        }
        self.refresh_ground_contact();
    }

    fn refresh_ground_contact(&mut self) {
        let platforms = &self.state.platforms;
        for runner in self.state.players.values_mut() {
            let grounded = platforms.values().any(|platform| {
                let gap = runner.bottom() - platform.top();
                (0.0..=GROUND_EPSILON).contains(&gap) && platform.overlaps_horizontally(runner)
            });
            runner.on_ground = Structural(grounded);
        }
    }
}

/// Separates two overlapping boxes along the axis of least penetration and stops
/// motion into the platform.
fn resolve_platform(runner: &mut Runner, platform: &Platform) {
    let overlap_x = (*runner.width + platform.width) / 2.0 - (runner.x - platform.x).abs();
    let overlap_y = (*runner.height + platform.height) / 2.0 - (runner.y - platform.y).abs();
    if overlap_x <= 0.0 || overlap_y <= 0.0 {
        return;
    }

    if overlap_y <= overlap_x {
        if runner.y >= platform.y {
            runner.y += overlap_y;
            runner.vy = runner.vy.max(0.0);
        } else {
            runner.y -= overlap_y;
            runner.vy = runner.vy.min(0.0);
        }
    } else if runner.x >= platform.x {
        runner.x += overlap_x;
        runner.vx = runner.vx.max(0.0);
    } else {
        runner.x -= overlap_x;
        runner.vx = runner.vx.min(0.0);
    }
}

impl Simulation<SideScrollerConfig> for SideScroller {
    fn state(&self) -> SideScrollerState {
        self.state.clone()
    }

    fn set_state(&mut self, state: SideScrollerState) {
        self.state = state;
        self.refresh_ground_contact();
    }

    fn predict(&mut self, actions: &CompoundAction<SideScrollerAction>) {
        self.apply_actions(actions);
        self.step(|id| actions.contains(id));
    }

    fn update(&mut self, actions: &CompoundAction<SideScrollerAction>) {
        self.apply_actions(actions);
        self.step(|_| true);
    }

    fn spawn_player(&mut self, id: &PlayerId) -> Result<(), SyncError> {
        if self.state.players.contains_key(id) {
            return Err(SyncError::PlayerAlreadyExists { player: id.clone() });
        }
        self.state.players.insert(id.clone(), Runner::spawned());
        Ok(())
    }
}
