//! A top-down arena: circular players steer in four directions inside four walls.
//!
//! There is no gravity. A move action sets the player's velocity outright and an idle
//! action stops it; players that send nothing keep moving. Players collide with the
//! walls but pass through each other.
//!
//! ```
//! use predictive_sync::games::top_down::{Direction, TopDown, TopDownAction};
//! use predictive_sync::{CompoundAction, PlayerId, Simulation};
//!
//! let mut game = TopDown::new();
//! game.spawn_player(&PlayerId::from("A"))?;
//!
//! let actions = CompoundAction::single(PlayerId::from("A"), TopDownAction::moving(Direction::Up));
//! game.update(&actions);
//! assert_eq!(game.state().players[&PlayerId::from("A")].y, 5.0);
//! # Ok::<(), predictive_sync::SyncError>(())
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{CompoundAction, Config, PlayerId, Simulation, StateAlgebra, Structural, SyncError};

/// Distance a moving player covers per tick.
pub const PLAYER_SPEED: f64 = 5.0;

/// Radius of every player.
pub const PLAYER_RADIUS: f64 = 25.0;

/// Marker type binding [`TopDownAction`] and [`TopDownState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopDownConfig;

impl Config for TopDownConfig {
    type Action = TopDownAction;
    type State = TopDownState;
}

/// One of the four steering directions. `Up` is positive `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Positive `y`.
    Up,
    /// Negative `y`.
    Down,
    /// Negative `x`.
    Left,
    /// Positive `x`.
    Right,
}

impl Direction {
    fn velocity(self) -> (f64, f64) {
        match self {
            Self::Up => (0.0, PLAYER_SPEED),
            Self::Down => (0.0, -PLAYER_SPEED),
            Self::Left => (-PLAYER_SPEED, 0.0),
            Self::Right => (PLAYER_SPEED, 0.0),
        }
    }
}

/// A player's input for one tick. The default stands still.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TopDownAction {
    /// Where to move, if anywhere.
    pub movement: Option<Direction>,
}

impl TopDownAction {
    /// Moves in `direction` at [`PLAYER_SPEED`].
    #[must_use]
    pub const fn moving(direction: Direction) -> Self {
        Self {
            movement: Some(direction),
        }
    }

    /// Stops the player.
    #[must_use]
    pub const fn idle() -> Self {
        Self { movement: None }
    }
}

/// A circular player body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Center.
    pub x: f64,
    /// Center.
    pub y: f64,
    /// Horizontal velocity per tick.
    pub vx: f64,
    /// Vertical velocity per tick.
    pub vy: f64,
    /// Collision radius.
    pub radius: Structural<f64>,
}

impl Player {
    fn spawned() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            vx: 0.0,
            vy: 0.0,
            radius: Structural(PLAYER_RADIUS),
        }
    }
}

impl StateAlgebra for Player {
    fn add(&self, other: &Self) -> Self {
        Self {
            x: self.x.add(&other.x),
            y: self.y.add(&other.y),
            vx: self.vx.add(&other.vx),
            vy: self.vy.add(&other.vy),
            radius: self.radius.add(&other.radius),
        }
    }

    fn negate(&self) -> Self {
        Self {
            x: self.x.negate(),
            y: self.y.negate(),
            vx: self.vx.negate(),
            vy: self.vy.negate(),
            radius: self.radius.negate(),
        }
    }
}

/// A static axis-aligned wall, positioned by its center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wall {
    /// Center.
    pub x: f64,
    /// Center.
    pub y: f64,
    /// Extent along `x`.
    pub width: f64,
    /// Extent along `y`.
    pub height: f64,
}

/// Snapshot of the arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopDownState {
    /// Every spawned player.
    pub players: BTreeMap<PlayerId, Player>,
    /// Arena geometry, carried verbatim through deltas.
    pub walls: Structural<BTreeMap<String, Wall>>,
}

impl TopDownState {
    /// An empty arena enclosed by four walls.
    #[must_use]
    pub fn new() -> Self {
        let wall = |x, y, width, height| Wall {
            x,
            y,
            width,
            height,
        };
        let walls = [
            ("wall-1", wall(0.0, -300.0, 550.0, 50.0)),
            ("wall-2", wall(0.0, 300.0, 550.0, 50.0)),
            ("wall-3", wall(-250.0, 0.0, 50.0, 600.0)),
            ("wall-4", wall(250.0, 0.0, 50.0, 600.0)),
        ]
        .into_iter()
        .map(|(id, wall)| (id.to_owned(), wall))
        .collect();

        Self {
            players: BTreeMap::new(),
            walls: Structural(walls),
        }
    }
}

impl Default for TopDownState {
    fn default() -> Self {
        Self::new()
    }
}

impl StateAlgebra for TopDownState {
    fn add(&self, other: &Self) -> Self {
        Self {
            players: self.players.add(&other.players),
            walls: self.walls.add(&other.walls),
        }
    }

    fn negate(&self) -> Self {
        Self {
            players: self.players.negate(),
            walls: self.walls.negate(),
        }
    }
}

/// The top-down simulation.
///
/// With [`with_static_entities_in_prediction`](TopDown::with_static_entities_in_prediction)
/// enabled, [`predict`](Simulation::predict) only moves players that have an action in
/// the compound; everyone else is frozen where the last snapshot put them.
#[derive(Debug, Clone, Default)]
pub struct TopDown {
    state: TopDownState,
    static_entities_in_prediction: bool,
}

impl TopDown {
    /// An empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Freezes players without an action during prediction.
    #[must_use]
    pub fn with_static_entities_in_prediction(mut self, enabled: bool) -> Self {
        self.static_entities_in_prediction = enabled;
        self
    }

    fn apply_actions(&mut self, actions: &CompoundAction<TopDownAction>) {
        for (id, action) in actions.iter() {
            let Some(player) = self.state.players.get_mut(id) else {
                continue;
            };
            let (vx, vy) = action.movement.map_or((0.0, 0.0), Direction::velocity);
            player.vx = vx;
            player.vy = vy;
        }
    }

    fn step(&mut self, moving: impl Fn(&PlayerId) -> bool) {
        let walls = &self.state.walls;
        for (id, player) in &mut self.state.players {
            if !moving(id) {
                continue;
            }
            player.x += player.vx;
            player.y += player.vy;
            for wall in walls.values() {
                resolve_wall(player, wall);
            }
        }
    }
}

/// Pushes a circle out of a rectangle along the contact normal and removes the
/// velocity component pointing into the wall.
fn resolve_wall(player: &mut Player, wall: &Wall) {
    let radius = *player.radius;
    let (half_w, half_h) = (wall.width / 2.0, wall.height / 2.0);
    let closest_x = player.x.clamp(wall.x - half_w, wall.x + half_w);
    let closest_y = player.y.clamp(wall.y - half_h, wall.y + half_h);
    let (dx, dy) = (player.x - closest_x, player.y - closest_y);
    let distance_sq = dx * dx + dy * dy;
    if distance_sq >= radius * radius {
        return;
    }

    let (nx, ny, depth) = if distance_sq > 0.0 {
        let distance = distance_sq.sqrt();
        (dx / distance, dy / distance, radius - distance)
    } else {
        // center inside the wall: leave through the nearest face
        let overlap_x = half_w - (player.x - wall.x).abs() + radius;
        let overlap_y = half_h - (player.y - wall.y).abs() + radius;
        if overlap_x < overlap_y {
            ((player.x - wall.x).signum(), 0.0, overlap_x)
        } else {
            (0.0, (player.y - wall.y).signum(), overlap_y)
        }
    };

    player.x += nx * depth;
    player.y += ny * depth;
    let into_wall = player.vx * nx + player.vy * ny;
    if into_wall < 0.0 {
        player.vx -= into_wall * nx;
        player.vy -= into_wall * ny;
    }
}

impl Simulation<TopDownConfig> for TopDown {
    fn state(&self) -> TopDownState {
        self.state.clone()
    }

    fn set_state(&mut self, state: TopDownState) {
        self.state = state;
    }

    fn predict(&mut self, actions: &CompoundAction<TopDownAction>) {
        self.apply_actions(actions);
        if self.static_entities_in_prediction {
            self.step(|id| actions.contains(id));
        } else {
            self.step(|_| true);
        }
    }

    fn update(&mut self, actions: &CompoundAction<TopDownAction>) {
        self.apply_actions(actions);
        self.step(|_| true);
    }

    fn spawn_player(&mut self, id: &PlayerId) -> Result<(), SyncError> {
        if self.state.players.contains_key(id) {
            return Err(SyncError::PlayerAlreadyExists { player: id.clone() });
        }
        self.state.players.insert(id.clone(), Player::spawned());
        Ok(())
    }
}
