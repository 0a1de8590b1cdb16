use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};
use thiserror::Error;
use tracing::{debug, trace};

use crate::common::collections::{HashMap, HashSet};
use crate::sys::geometry::Rect;
use crate::sys::window_system::WindowId;

new_key_type! {
    pub struct WorkspaceId;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkspaceError {
    #[error("no workspace at index {0}")]
    InvalidIndex(usize),
    #[error("the last workspace cannot be removed")]
    LastWorkspace,
}

/// Space reserved at the desktop edges by panels and docks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Struts {
    pub left: i32,
    pub right: i32,
    pub top: i32,
    pub bottom: i32,
}

#[derive(Debug, Clone, Default)]
pub struct Workspace {
    windows: HashSet<WindowId>,
    showing_desktop: bool,
    struts: Struts,
}

impl Workspace {
    pub fn contains_window(&self, window: WindowId) -> bool { self.windows.contains(&window) }

    pub fn windows(&self) -> impl Iterator<Item = WindowId> + '_ { self.windows.iter().copied() }

    pub fn window_count(&self) -> usize { self.windows.len() }

    pub fn showing_desktop(&self) -> bool { self.showing_desktop }

    pub fn set_showing_desktop(&mut self, showing: bool) { self.showing_desktop = showing; }

    pub fn struts(&self) -> Struts { self.struts }

    pub fn set_struts(&mut self, struts: Struts) { self.struts = struts; }

    /// The part of `screen` not covered by struts, never negative in size.
    pub fn work_area(&self, screen: Rect) -> Rect {
        let s = self.struts;
        Rect::new(
            screen.x + s.left,
            screen.y + s.top,
            (screen.width - s.left - s.right).max(0),
            (screen.height - s.top - s.bottom).max(0),
        )
    }
}

/// What `WorkspaceList::remove` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removal {
    /// Index, after removal, of the workspace that received the windows.
    pub neighbor: usize,
    pub was_active: bool,
}

/// Ordered workspaces with exactly one active. Never empty.
#[derive(Debug)]
pub struct WorkspaceList {
    workspaces: SlotMap<WorkspaceId, Workspace>,
    order: Vec<WorkspaceId>,
    active: WorkspaceId,
    window_to_workspace: HashMap<WindowId, WorkspaceId>,
}

impl WorkspaceList {
    /// Creates `count` workspaces, at least one, with the first active.
    pub fn new(count: usize) -> Self {
        let mut workspaces = SlotMap::with_key();
        let order: Vec<WorkspaceId> =
            (0..count.max(1)).map(|_| workspaces.insert(Workspace::default())).collect();
        let active = order[0];
        Self {
            workspaces,
            order,
            active,
            window_to_workspace: HashMap::default(),
        }
    }

    pub fn len(&self) -> usize { self.order.len() }

    pub fn get(&self, index: usize) -> Option<&Workspace> {
        self.order.get(index).and_then(|id| self.workspaces.get(*id))
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Workspace> {
        let id = *self.order.get(index)?;
        self.workspaces.get_mut(id)
    }

    pub fn id_at(&self, index: usize) -> Option<WorkspaceId> { self.order.get(index).copied() }

    pub fn index_of(&self, id: WorkspaceId) -> Option<usize> {
        self.order.iter().position(|&w| w == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Workspace> + '_ {
        self.order.iter().filter_map(|id| self.workspaces.get(*id))
    }

    pub fn active_id(&self) -> WorkspaceId { self.active }

    pub fn active_index(&self) -> usize { self.index_of(self.active).unwrap_or(0) }

    pub fn active(&self) -> &Workspace { &self.workspaces[self.active] }

    pub fn active_mut(&mut self) -> &mut Workspace { &mut self.workspaces[self.active] }

    /// Returns whether the active workspace changed.
    pub fn set_active(&mut self, index: usize) -> Result<bool, WorkspaceError> {
        let id = self.id_at(index).ok_or(WorkspaceError::InvalidIndex(index))?;
        let changed = id != self.active;
        self.active = id;
        Ok(changed)
    }

    /// Appends a workspace and returns its index.
    pub fn push(&mut self) -> usize {
        let id = self.workspaces.insert(Workspace::default());
        self.order.push(id);
        trace!(index = self.order.len() - 1, "workspace appended");
        self.order.len() - 1
    }

    /// Removes the workspace at `index`, handing its windows to the previous
    /// workspace (or the next one when removing the first).
    pub fn remove(&mut self, index: usize) -> Result<Removal, WorkspaceError> {
        let id = self.id_at(index).ok_or(WorkspaceError::InvalidIndex(index))?;
        if self.order.len() == 1 {
            return Err(WorkspaceError::LastWorkspace);
        }
        let neighbor_id = if index > 0 { self.order[index - 1] } else { self.order[index + 1] };

        self.relocate_windows(id, neighbor_id);
        let was_active = self.active == id;
        if was_active {
            self.active = neighbor_id;
        }
        self.order.remove(index);
        self.workspaces.remove(id);

        let neighbor = self.index_of(neighbor_id).unwrap_or(0);
        debug!(index, neighbor, was_active, "workspace removed");
        Ok(Removal { neighbor, was_active })
    }

    /// Shrinks to `count` workspaces (at least one). Windows on removed
    /// workspaces move to the last remaining one, which also becomes active if
    /// the active workspace was removed. Returns whether the active workspace
    /// changed.
    pub fn truncate(&mut self, count: usize) -> bool {
        let count = count.max(1);
        if count >= self.order.len() {
            return false;
        }
        let last_kept = self.order[count - 1];
        let extras: Vec<WorkspaceId> = self.order.drain(count..).collect();
        let mut active_changed = false;
        for id in extras {
            self.relocate_windows(id, last_kept);
            if self.active == id {
                self.active = last_kept;
                active_changed = true;
            }
            self.workspaces.remove(id);
        }
        active_changed
    }

    /// Moves the workspace at `from` to position `to`. Returns whether the
    /// active workspace's index changed.
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<bool, WorkspaceError> {
        if from >= self.order.len() {
            return Err(WorkspaceError::InvalidIndex(from));
        }
        if to >= self.order.len() {
            return Err(WorkspaceError::InvalidIndex(to));
        }
        let before = self.active_index();
        let id = self.order.remove(from);
        self.order.insert(to, id);
        Ok(self.active_index() != before)
    }

    /// Puts `window` on the workspace at `index`, taking it off any other.
    pub fn add_window(&mut self, index: usize, window: WindowId) -> Result<(), WorkspaceError> {
        let id = self.id_at(index).ok_or(WorkspaceError::InvalidIndex(index))?;
        self.remove_window(window);
        self.workspaces[id].windows.insert(window);
        self.window_to_workspace.insert(window, id);
        Ok(())
    }

    pub fn remove_window(&mut self, window: WindowId) -> bool {
        let Some(id) = self.window_to_workspace.remove(&window) else {
            return false;
        };
        if let Some(workspace) = self.workspaces.get_mut(id) {
            workspace.windows.remove(&window);
        }
        true
    }

    pub fn workspace_of_window(&self, window: WindowId) -> Option<usize> {
        let id = self.window_to_workspace.get(&window)?;
        self.index_of(*id)
    }

    fn relocate_windows(&mut self, from: WorkspaceId, to: WorkspaceId) {
        let moved: Vec<WindowId> = match self.workspaces.get_mut(from) {
            Some(workspace) => workspace.windows.drain().collect(),
            None => return,
        };
        if moved.is_empty() {
            return;
        }
        trace!(count = moved.len(), "relocating windows");
        for window in moved {
            self.workspaces[to].windows.insert(window);
            self.window_to_workspace.insert(window, to);
        }
    }
}
