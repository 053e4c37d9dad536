//! Grid world for a single reaching trial.
//!
//! The model is I/O free: it holds the map received from the peer (blocks and
//! goals), the authoritative player cell and the per-goal belief coloring.
//! Every mutation is a plain method call; the runtime decides when to redraw.

use core::fmt;

use hashbrown::HashSet;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Grid side length used when the session config does not override it.
pub const DEFAULT_GRID_NUMBER: u32 = 10;

/// Number of belief slots carried by a posterior update (`G1`..`G3`).
pub const POSTERIOR_SLOTS: usize = 3;

/// Goal color before the first belief update arrives.
pub const DEFAULT_GOAL_COLOR: Rgb = Rgb::new(50, 10, 0);

/// A grid location.
///
/// Components are signed so a candidate one step past the edge (e.g. `(-1, 0)`)
/// can be expressed and then rejected by [`GridWorld::apply_move`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }

    pub fn to_array(self) -> [i32; 2] {
        [self.x, self.y]
    }
}

impl From<[i32; 2]> for Cell {
    fn from(v: [i32; 2]) -> Self {
        Self::new(v[0], v[1])
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// 8-bit RGB color. Displays in CSS `rgb(r, g, b)` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const BLUE: Rgb = Rgb::new(0, 0, 255);
    pub const BROWN: Rgb = Rgb::new(165, 42, 42);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Red intensity for a posterior weight: `rgb(floor(w * 255), 0, 0)`.
    ///
    /// Weights are not range-checked. The float-to-byte cast saturates, so
    /// `w > 1` renders as full red and negative (or NaN) weights as black,
    /// the same result a browser gets from an out-of-range CSS channel.
    pub fn from_belief(weight: f64) -> Self {
        let red = (weight * 255.0).floor() as u8;
        Self::new(red, 0, 0)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({}, {}, {})", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Goal {
    pub cell: Cell,
    /// Last posterior mass pushed for this goal; `None` until the first update.
    pub weight: Option<f64>,
    pub color: Rgb,
}

impl Goal {
    pub fn new(cell: Cell) -> Self {
        Self {
            cell,
            weight: None,
            color: DEFAULT_GOAL_COLOR,
        }
    }
}

/// Map received from the peer at trial start. Immutable once received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameMap {
    pub start: Cell,
    /// Order is significant: goal `i` receives posterior slot `i`.
    pub goals: Vec<Cell>,
    pub blocks: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    #[error("start cell {start} lies outside the {grid_number}x{grid_number} grid")]
    StartOutOfBounds { start: Cell, grid_number: u32 },
    #[error("start cell {start} is a block")]
    StartBlocked { start: Cell },
    #[error("map has {found} goals but posterior updates address {required}")]
    TooFewGoals { found: usize, required: usize },
}

impl GameMap {
    /// Check the map against a grid before it replaces the current one.
    ///
    /// Goals and blocks are expected to be disjoint; that is the peer's
    /// responsibility and is not checked here.
    pub fn validate(&self, grid_number: u32) -> Result<(), MapError> {
        if !in_bounds(self.start, grid_number) {
            return Err(MapError::StartOutOfBounds {
                start: self.start,
                grid_number,
            });
        }
        if self.blocks.contains(&self.start) {
            return Err(MapError::StartBlocked { start: self.start });
        }
        if self.goals.len() < POSTERIOR_SLOTS {
            return Err(MapError::TooFewGoals {
                found: self.goals.len(),
                required: POSTERIOR_SLOTS,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BeliefError {
    #[error("belief update addresses goal index {index} but only {goals} goals are live")]
    GoalIndex { index: usize, goals: usize },
}

fn in_bounds(cell: Cell, grid_number: u32) -> bool {
    let n = grid_number as i64;
    (0..n).contains(&(cell.x as i64)) && (0..n).contains(&(cell.y as i64))
}

#[derive(Debug, Clone)]
pub struct GridWorld {
    grid_number: u32,
    player: Cell,
    goals: Vec<Goal>,
    blocks: HashSet<Cell>,
}

impl GridWorld {
    pub fn new(grid_number: u32) -> Self {
        Self {
            grid_number: grid_number.max(1),
            player: Cell::default(),
            goals: Vec::new(),
            blocks: HashSet::new(),
        }
    }

    pub fn grid_number(&self) -> u32 {
        self.grid_number
    }

    pub fn player(&self) -> Cell {
        self.player
    }

    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    pub fn blocks(&self) -> impl Iterator<Item = Cell> + '_ {
        self.blocks.iter().copied()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn in_bounds(&self, cell: Cell) -> bool {
        in_bounds(cell, self.grid_number)
    }

    pub fn is_blocked(&self, cell: Cell) -> bool {
        self.blocks.contains(&cell)
    }

    /// Replace blocks and goals, move the player to the map start and drop
    /// any belief coloring left from the previous map.
    pub fn reset_from_map(&mut self, map: &GameMap) {
        self.blocks = map.blocks.iter().copied().collect();
        self.goals = map.goals.iter().copied().map(Goal::new).collect();
        self.player = map.start;
    }

    /// Where a move to `candidate` would land: the candidate itself when it is
    /// in bounds and free, the current cell otherwise.
    pub fn resolve_move(&self, candidate: Cell) -> Cell {
        if self.in_bounds(candidate) && !self.is_blocked(candidate) {
            candidate
        } else {
            self.player
        }
    }

    /// Commit a move. Rejected candidates leave the player in place.
    pub fn apply_move(&mut self, candidate: Cell) -> Cell {
        self.player = self.resolve_move(candidate);
        self.player
    }

    pub fn is_goal_reached(&self, pos: Cell) -> bool {
        self.goals.iter().any(|g| g.cell == pos)
    }

    /// Recolor goals from posterior weights, slot `i` to goal `i`.
    ///
    /// Every index is checked before anything is written, so a malformed update
    /// leaves all goal colors untouched.
    pub fn update_beliefs(&mut self, weights: &[f64]) -> Result<(), BeliefError> {
        if weights.len() > self.goals.len() {
            return Err(BeliefError::GoalIndex {
                index: self.goals.len(),
                goals: self.goals.len(),
            });
        }
        for (goal, &w) in self.goals.iter_mut().zip(weights) {
            goal.weight = Some(w);
            goal.color = Rgb::from_belief(w);
        }
        Ok(())
    }
}

impl Default for GridWorld {
    fn default() -> Self {
        Self::new(DEFAULT_GRID_NUMBER)
    }
}
