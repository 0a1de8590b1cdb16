//! Workspace grid layout: how workspace indices are arranged in rows and
//! columns for pagers and directional switching.

pub mod desktop_layout;
pub mod grid;
mod orientation;

pub use desktop_layout::LayoutHintOutcome;
pub use grid::{Cell, LayoutParams, WorkspaceLayout};
pub use orientation::{Corner, Direction, Orientation};
