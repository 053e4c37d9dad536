//! # reachgrid
//!
//! Model of a reaching experiment: a participant steers a token across a small
//! grid toward one of several goals while a remote planner streams back its
//! belief about which goal is the target.
//!
//! This crate is the I/O-free half. It holds the grid world, the movement
//! fold, frame rendering, the wire protocol types and the trial phase rules.
//! The async runtime (`reachd`) drives it from a socket, an HTTP service and
//! the keyboard.
//!
//! ## Quick Start
//!
//! ```
//! use reachgrid::prelude::*;
//!
//! let mut world = GridWorld::new(10);
//! world.reset_from_map(&GameMap {
//!     start: Cell::new(0, 0),
//!     goals: vec![Cell::new(2, 0), Cell::new(9, 9), Cell::new(0, 9)],
//!     blocks: vec![Cell::new(1, 0)],
//! });
//!
//! let mut moves = MovePipeline::new();
//! let step = moves.fold(&mut world, Direction::Right);
//! assert!(!step.accepted()); // bounced off the block
//!
//! let mut frame = TextSurface::new(world.grid_number());
//! render(&world, &mut frame);
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` (default): serialization and the [`protocol`] module
//!
//! ## Modules
//!
//! - [`grid`]: cells, goals, blocks and the mutable world
//! - [`input`]: key codes and the movement fold
//! - [`render`]: drawing onto a [`render::Surface`]
//! - [`phase`]: Fixation → Reaching → Feedback sequencing
//! - [`stats`]: per-trial completion records

#[path = "core/grid.rs"]
pub mod grid;

#[path = "core/input.rs"]
pub mod input;

#[path = "core/render.rs"]
pub mod render;

#[path = "core/phase.rs"]
pub mod phase;

#[path = "core/stats.rs"]
pub mod stats;

#[cfg(feature = "serde")]
#[path = "core/protocol.rs"]
pub mod protocol;

/// Prelude module for convenient imports.
///
/// ```
/// use reachgrid::prelude::*;
/// ```
pub mod prelude {
    pub use crate::grid::{
        BeliefError, Cell, GameMap, Goal, GridWorld, MapError, Rgb, DEFAULT_GRID_NUMBER,
        POSTERIOR_SLOTS,
    };
    pub use crate::input::{Direction, MovePipeline, MoveStep};
    pub use crate::phase::{Phase, PhaseCommand, PhaseError, PhaseTimings, TrialSequencer};
    pub use crate::render::{render, DrawList, DrawOp, Palette, Surface, TextSurface};
    pub use crate::stats::{RecordError, SessionSummary, TrialRecord, TrialRecords};
}
