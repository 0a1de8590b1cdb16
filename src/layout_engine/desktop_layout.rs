//! `_NET_DESKTOP_LAYOUT` encoding.
//!
//! The property is `orientation, columns, rows[, starting_corner]`, written by
//! pagers. Values are CARDINALs but rows and columns are read as signed, with
//! zero or negative meaning "derive from the other dimension".

use tracing::warn;

use crate::layout_engine::grid::{LayoutParams, MAX_DIMENSION, dimension};
use crate::layout_engine::orientation::{Corner, Orientation};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutHintOutcome {
    /// The hint was read. Individual fields that made no sense kept their
    /// previous values.
    Applied(LayoutParams),
    /// No hint is set.
    Absent,
    /// The hint had the wrong number of items and was ignored entirely.
    Rejected,
}

pub fn decode(items: Option<&[u32]>, current: LayoutParams) -> LayoutHintOutcome {
    let Some(items) = items else {
        return LayoutHintOutcome::Absent;
    };
    if items.len() != 3 && items.len() != 4 {
        warn!(
            items = items.len(),
            "invalid _NET_DESKTOP_LAYOUT property, should have 3 or 4 items"
        );
        return LayoutHintOutcome::Rejected;
    }

    let mut params = current;
    match Orientation::try_from(items[0]) {
        Ok(orientation) => params.orientation = orientation,
        Err(_) => warn!(value = items[0], "unknown orientation in _NET_DESKTOP_LAYOUT"),
    }

    let cols = i64::from(items[1] as i32);
    let rows = i64::from(items[2] as i32);
    let limit = MAX_DIMENSION as i64;
    if rows <= 0 && cols <= 0 {
        warn!(cols, rows, "_NET_DESKTOP_LAYOUT rows and columns are both unset");
    } else if rows > limit || cols > limit {
        warn!(cols, rows, limit, "_NET_DESKTOP_LAYOUT rows or columns too large");
    } else {
        params.rows = dimension(rows);
        params.cols = dimension(cols);
    }

    params.corner = match items.get(3) {
        Some(&raw) => match Corner::try_from(raw) {
            Ok(corner) => corner,
            Err(_) => {
                warn!(value = raw, "unknown starting corner in _NET_DESKTOP_LAYOUT");
                params.corner
            }
        },
        None => Corner::TopLeft,
    };

    LayoutHintOutcome::Applied(params)
}

pub fn encode(params: &LayoutParams) -> Vec<u32> {
    vec![
        params.orientation.into(),
        clamp_to_u32(params.raw_cols()),
        clamp_to_u32(params.raw_rows()),
        params.corner.into(),
    ]
}

fn clamp_to_u32(value: usize) -> u32 { u32::try_from(value).unwrap_or(u32::MAX) }
