//! Physical monitor layout and the geometric questions asked of it.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::layout_engine::Direction;
use crate::sys::geometry::{Point, Rect};

/// Whether the last reload used the server's monitors or made one up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    Reported(usize),
    Synthesized(usize),
}

/// Top-left positions of the four hot-corner squares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotCorners {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_left: Point,
    pub bottom_right: Point,
}

#[derive(Debug, Clone)]
pub struct MonitorTopology {
    screen: Rect,
    regions: Vec<Rect>,
    current: Option<usize>,
    split_synthetic: bool,
}

impl MonitorTopology {
    pub fn new(screen: Rect) -> Self {
        Self {
            screen,
            regions: vec![screen],
            current: None,
            split_synthetic: false,
        }
    }

    /// When no monitors are reported, pretend the screen is two side by side
    /// monitors instead of one. Only honoured in debug builds.
    pub fn set_split_synthetic(&mut self, split: bool) {
        self.split_synthetic = split && cfg!(debug_assertions);
    }

    /// Replaces the region set. Never leaves it empty.
    pub fn reload(&mut self, screen: Rect, reported: Vec<Rect>) -> ReloadOutcome {
        self.screen = screen;
        self.current = None;

        let reported: Vec<Rect> = reported.into_iter().filter(|r| !r.is_empty()).collect();
        if !reported.is_empty() {
            info!(count = reported.len(), "monitors reloaded");
            self.regions = reported;
            return ReloadOutcome::Reported(self.regions.len());
        }

        self.regions = if self.split_synthetic {
            debug!("pretending a single monitor is two");
            let half = screen.width / 2;
            vec![
                Rect { width: half, ..screen },
                Rect { x: screen.x + half, width: half, ..screen },
            ]
        } else {
            warn!("no monitors reported, using the whole screen");
            vec![screen]
        };
        ReloadOutcome::Synthesized(self.regions.len())
    }

    pub fn screen(&self) -> Rect { self.screen }

    pub fn regions(&self) -> &[Rect] { &self.regions }

    pub fn len(&self) -> usize { self.regions.len() }

    pub fn region(&self, index: usize) -> Option<Rect> { self.regions.get(index).copied() }

    /// The region sharing the most area with `rect`. Ties go to the lower
    /// index, and a rect touching no region maps to region 0.
    pub fn region_for_rect(&self, rect: &Rect) -> usize {
        if self.regions.len() == 1 {
            return 0;
        }
        let mut best = 0;
        let mut best_area = 0;
        for (i, region) in self.regions.iter().enumerate() {
            if let Some(overlap) = region.intersection(rect)
                && overlap.area() > best_area
            {
                best_area = overlap.area();
                best = i;
            }
        }
        best
    }

    pub fn region_for_point(&self, p: Point) -> usize {
        let pixel = Rect::new(p.x, p.y, 1, 1);
        self.regions.iter().position(|r| r.contains_rect(&pixel)).unwrap_or(0)
    }

    /// The region under the pointer. The pointer is only queried when the
    /// cached answer has been invalidated.
    pub fn current(&mut self, pointer: impl FnOnce() -> Option<Point>) -> usize {
        if self.regions.len() == 1 {
            return 0;
        }
        if let Some(index) = self.current {
            return index;
        }
        let index = pointer().map_or(0, |p| self.region_for_point(p));
        trace!(index, "rechecked current monitor");
        self.current = Some(index);
        index
    }

    pub fn invalidate_current(&mut self) { self.current = None; }

    /// The region directly adjacent to `index` in `direction`: edges touching
    /// exactly and spans overlapping on the other axis. With several
    /// candidates the lowest index wins.
    pub fn neighbor(&self, index: usize, direction: Direction) -> Option<usize> {
        let input = self.regions.get(index)?;
        self.regions.iter().position(|cur| match direction {
            Direction::Right => cur.x == input.max_x() && cur.vert_overlap(input),
            Direction::Left => input.x == cur.max_x() && cur.vert_overlap(input),
            Direction::Up => input.y == cur.max_y() && cur.horiz_overlap(input),
            Direction::Down => cur.y == input.max_y() && cur.horiz_overlap(input),
        })
    }

    /// Breadth-first walk from `start` preferring left, right, up, then down
    /// neighbours. Regions not reachable from `start` follow in index order.
    pub fn natural_ordering(&self, start: usize) -> Vec<usize> {
        let n = self.regions.len();
        let mut order = Vec::with_capacity(n);
        let mut visited = vec![false; n];
        let mut queue = VecDeque::new();

        let start = if start < n { start } else { 0 };
        visited[start] = true;
        queue.push_back(start);

        while let Some(index) = queue.pop_front() {
            order.push(index);
            for direction in [Direction::Left, Direction::Right, Direction::Up, Direction::Down] {
                if let Some(next) = self.neighbor(index, direction)
                    && !visited[next]
                {
                    visited[next] = true;
                    queue.push_back(next);
                }
            }
        }

        order.extend((0..n).filter(|&i| !visited[i]));
        order
    }

    /// Hot corners for squares of `size` pixels, placed on the outermost
    /// monitors touching the left and right edges of the screen.
    pub fn hot_corners(&self, size: i32) -> HotCorners {
        let width = self.screen.width;
        let height = self.screen.height;

        let (mut tl_y, mut bl_y) = (height, 0);
        let (mut tr_y, mut br_y) = (height, 0);
        for region in &self.regions {
            if region.x == 0 {
                tl_y = tl_y.min(region.y);
                bl_y = bl_y.max(region.max_y());
            }
            if region.max_x() == width {
                tr_y = tr_y.min(region.y);
                br_y = br_y.max(region.max_y());
            }
        }

        HotCorners {
            top_left: Point::new(0, tl_y),
            top_right: Point::new(width - size, tr_y),
            bottom_left: Point::new(0, bl_y - size),
            bottom_right: Point::new(width - size, br_y - size),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    fn topology(regions: Vec<Rect>) -> MonitorTopology {
        let mut t = MonitorTopology::new(Rect::from_size(3840, 2160));
        t.reload(Rect::from_size(3840, 2160), regions);
        t
    }

    fn grid_2x2() -> MonitorTopology {
        topology(vec![
            Rect::new(0, 0, 1920, 1080),
            Rect::new(1920, 0, 1920, 1080),
            Rect::new(0, 1080, 1920, 1080),
            Rect::new(1920, 1080, 1920, 1080),
        ])
    }

    #[test]
    fn zero_monitors_synthesize_the_whole_screen() {
        let mut t = MonitorTopology::new(Rect::from_size(100, 100));
        let screen = Rect::from_size(2560, 1440);
        assert_eq!(t.reload(screen, vec![]), ReloadOutcome::Synthesized(1));
        assert_eq!(t.regions(), &[screen]);
    }

    #[test]
    fn split_synthetic_monitor_in_debug_builds() {
        let mut t = MonitorTopology::new(Rect::from_size(100, 100));
        t.set_split_synthetic(true);
        let outcome = t.reload(Rect::from_size(2000, 1000), vec![]);
        if cfg!(debug_assertions) {
            assert_eq!(outcome, ReloadOutcome::Synthesized(2));
            assert_eq!(t.regions(), &[Rect::new(0, 0, 1000, 1000), Rect::new(1000, 0, 1000, 1000)]);
        } else {
            assert_eq!(outcome, ReloadOutcome::Synthesized(1));
        }
    }

    #[test]
    fn single_region_always_wins() {
        let t = topology(vec![Rect::new(0, 0, 1920, 1080)]);
        assert_eq!(t.region_for_rect(&Rect::new(5000, 5000, 10, 10)), 0);
        assert_eq!(t.region_for_rect(&Rect::new(-50, -50, 10, 10)), 0);
    }

    #[test]
    fn largest_overlap_wins_and_ties_keep_first() {
        let t = topology(vec![Rect::new(0, 0, 1920, 1080), Rect::new(1920, 0, 1920, 1080)]);
        assert_eq!(t.region_for_rect(&Rect::new(1800, 0, 400, 100)), 1);
        assert_eq!(t.region_for_rect(&Rect::new(1720, 0, 400, 100)), 0);
        assert_eq!(t.region_for_rect(&Rect::new(1820, 0, 200, 100)), 0);
        assert_eq!(t.region_for_rect(&Rect::new(9000, 0, 200, 100)), 0);
    }

    #[test]
    fn neighbors_in_a_grid() {
        let t = grid_2x2();
        assert_eq!(t.neighbor(0, Direction::Right), Some(1));
        assert_eq!(t.neighbor(0, Direction::Down), Some(2));
        assert_eq!(t.neighbor(0, Direction::Left), None);
        assert_eq!(t.neighbor(0, Direction::Up), None);
        assert_eq!(t.neighbor(3, Direction::Left), Some(2));
        assert_eq!(t.neighbor(3, Direction::Up), Some(1));
        assert_eq!(t.neighbor(9, Direction::Up), None);
    }

    #[test]
    fn neighbor_tie_break_prefers_lowest_index() {
        let t = topology(vec![
            Rect::new(0, 0, 1000, 1000),
            Rect::new(1000, 500, 1000, 500),
            Rect::new(1000, 0, 1000, 500),
        ]);
        assert_eq!(t.neighbor(0, Direction::Right), Some(1));
    }

    #[test]
    fn natural_ordering_walks_left_right_up_down() {
        let t = grid_2x2();
        assert_eq!(t.natural_ordering(0), vec![0, 1, 2, 3]);
        assert_eq!(t.natural_ordering(3), vec![3, 2, 1, 0]);
        assert_eq!(t.natural_ordering(1), vec![1, 0, 3, 2]);
    }

    #[test]
    fn natural_ordering_appends_disconnected_regions() {
        let t = topology(vec![
            Rect::new(5000, 0, 100, 100),
            Rect::new(0, 0, 1920, 1080),
            Rect::new(1920, 0, 1920, 1080),
            Rect::new(0, 3000, 100, 100),
        ]);
        let order = t.natural_ordering(2);
        assert_eq!(order, vec![2, 1, 0, 3]);
    }

    #[test]
    fn current_region_is_cached_until_invalidated() {
        let mut t = grid_2x2();
        assert_eq!(t.current(|| Some(Point::new(2000, 1500))), 3);
        assert_eq!(t.current(|| panic!("pointer should not be queried")), 3);
        t.invalidate_current();
        assert_eq!(t.current(|| Some(Point::new(10, 1500))), 2);
        t.invalidate_current();
        assert_eq!(t.current(|| Some(Point::new(-10, -10))), 0);
    }

    #[test]
    fn hot_corners_follow_edge_monitors() {
        let t = topology(vec![Rect::new(0, 200, 1920, 1080), Rect::new(1920, 0, 1920, 2160)]);
        assert_eq!(
            t.hot_corners(39),
            HotCorners {
                top_left: Point::new(0, 200),
                top_right: Point::new(3840 - 39, 0),
                bottom_left: Point::new(0, 1280 - 39),
                bottom_right: Point::new(3840 - 39, 2160 - 39),
            }
        );
    }
}
