//! Integer desktop geometry.
//!
//! Everything here is in root-window pixels with the origin at the top left of
//! the desktop, which is how the windowing system reports monitors and pointer
//! positions.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self { Self { x, y } }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// A rectangle anchored at the origin, used for the total desktop extent.
    pub const fn from_size(width: i32, height: i32) -> Self { Self::new(0, 0, width, height) }

    pub fn max_x(&self) -> i32 { self.x + self.width }

    pub fn max_y(&self) -> i32 { self.y + self.height }

    pub fn area(&self) -> i64 { i64::from(self.width.max(0)) * i64::from(self.height.max(0)) }

    pub fn is_empty(&self) -> bool { self.width <= 0 || self.height <= 0 }

    /// The overlapping part of two rectangles, or `None` when they only touch
    /// or are disjoint.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let max_x = self.max_x().min(other.max_x());
        let max_y = self.max_y().min(other.max_y());
        if max_x <= x || max_y <= y {
            return None;
        }
        Some(Rect::new(x, y, max_x - x, max_y - y))
    }

    pub fn contains_point(&self, p: Point) -> bool {
        p.x >= self.x && p.x < self.max_x() && p.y >= self.y && p.y < self.max_y()
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.max_x() <= self.max_x()
            && other.max_y() <= self.max_y()
    }

    /// True when the vertical spans share at least one row of pixels.
    pub fn vert_overlap(&self, other: &Rect) -> bool {
        self.y < other.max_y() && other.y < self.max_y()
    }

    /// True when the horizontal spans share at least one column of pixels.
    pub fn horiz_overlap(&self, other: &Rect) -> bool {
        self.x < other.max_x() && other.x < self.max_x()
    }
}
