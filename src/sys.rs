//! Utilities for interfacing with the display server.

pub mod event_loop;
#[cfg(test)]
pub mod fake;
pub mod geometry;
pub mod window_system;
pub mod x11;
