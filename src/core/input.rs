//! Directional input and the movement fold.
//!
//! Key presses are reduced to a unit displacement and folded over the
//! authoritative player cell held by [`GridWorld`]. There is no shadow
//! position: each step reads the current cell, resolves the candidate and
//! commits it before the next key is looked at.

use crate::grid::{Cell, GridWorld};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Right,
        Direction::Down,
        Direction::Left,
    ];

    /// Map a DOM `KeyboardEvent.code`. Anything but the four arrows is ignored.
    pub fn from_key_code(code: &str) -> Option<Self> {
        match code {
            "ArrowUp" => Some(Direction::Up),
            "ArrowRight" => Some(Direction::Right),
            "ArrowDown" => Some(Direction::Down),
            "ArrowLeft" => Some(Direction::Left),
            _ => None,
        }
    }

    pub fn key_code(self) -> &'static str {
        match self {
            Direction::Up => "ArrowUp",
            Direction::Right => "ArrowRight",
            Direction::Down => "ArrowDown",
            Direction::Left => "ArrowLeft",
        }
    }

    /// Unit displacement. The grid's y axis points up.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, 1),
            Direction::Right => (1, 0),
            Direction::Down => (0, -1),
            Direction::Left => (-1, 0),
        }
    }

    pub fn as_action(self) -> [i32; 2] {
        let (dx, dy) = self.delta();
        [dx, dy]
    }
}

/// Result of folding one key press into the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveStep {
    pub direction: Direction,
    pub from: Cell,
    pub to: Cell,
}

impl MoveStep {
    /// False when the candidate bounced off an edge or a block.
    pub fn accepted(&self) -> bool {
        self.from != self.to
    }
}

#[derive(Debug, Clone, Default)]
pub struct MovePipeline {
    accepted: u32,
    rejected: u32,
}

impl MovePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.accepted = 0;
        self.rejected = 0;
    }

    pub fn accepted(&self) -> u32 {
        self.accepted
    }

    pub fn rejected(&self) -> u32 {
        self.rejected
    }

    pub fn fold(&mut self, world: &mut GridWorld, direction: Direction) -> MoveStep {
        let from = world.player();
        let (dx, dy) = direction.delta();
        let to = world.apply_move(from.offset(dx, dy));

        let step = MoveStep {
            direction,
            from,
            to,
        };
        if step.accepted() {
            self.accepted = self.accepted.saturating_add(1);
        } else {
            self.rejected = self.rejected.saturating_add(1);
        }
        step
    }

    /// Fold a raw key code; non-directional keys yield `None` and change nothing.
    pub fn fold_key(&mut self, world: &mut GridWorld, code: &str) -> Option<MoveStep> {
        Direction::from_key_code(code).map(|d| self.fold(world, d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GameMap;

    fn world(n: u32, start: Cell, blocks: Vec<Cell>) -> GridWorld {
        let mut w = GridWorld::new(n);
        w.reset_from_map(&GameMap {
            start,
            goals: vec![],
            blocks,
        });
        w
    }

    #[test]
    fn only_arrow_codes_move() {
        let mut w = world(10, Cell::new(5, 5), vec![]);
        let mut p = MovePipeline::new();
        for code in ["KeyA", "Space", "Enter", "arrowup", ""] {
            assert_eq!(p.fold_key(&mut w, code), None);
        }
        assert_eq!(w.player(), Cell::new(5, 5));
        assert_eq!(p.accepted() + p.rejected(), 0);
    }

    #[test]
    fn repeated_edge_input_stays_clamped() {
        for n in 1..=5u32 {
            for dir in Direction::ALL {
                let mut w = world(n, Cell::new(0, 0), vec![]);
                let mut p = MovePipeline::new();
                for _ in 0..(2 * n + 3) {
                    p.fold(&mut w, dir);
                    let c = w.player();
                    assert!(w.in_bounds(c), "n={n} dir={dir:?} left grid at {c}");
                }
                assert!(p.rejected() >= n + 3);
            }
        }
    }

    #[test]
    fn blocked_move_counts_as_rejected() {
        let mut w = world(10, Cell::new(0, 0), vec![Cell::new(1, 0)]);
        let mut p = MovePipeline::new();

        let step = p.fold(&mut w, Direction::Right);
        assert!(!step.accepted());
        assert_eq!(step.to, Cell::new(0, 0));

        let step = p.fold(&mut w, Direction::Up);
        assert!(step.accepted());
        assert_eq!(step.to, Cell::new(0, 1));
        assert_eq!((p.accepted(), p.rejected()), (1, 1));
    }

    #[test]
    fn fold_reads_current_position_after_external_reset() {
        let mut w = world(10, Cell::new(0, 0), vec![]);
        let mut p = MovePipeline::new();
        p.fold(&mut w, Direction::Right);

        w.reset_from_map(&GameMap {
            start: Cell::new(7, 7),
            goals: vec![],
            blocks: vec![],
        });
        let step = p.fold(&mut w, Direction::Left);
        assert_eq!(step.from, Cell::new(7, 7));
        assert_eq!(step.to, Cell::new(6, 7));
    }
}
