//! One managed screen: the selection we hold, its monitors, its workspaces and
//! the launches in progress on it.
//!
//! Everything here runs on the control thread. Work that should happen "soon"
//! rather than immediately (publishing `_NET_WORKAREA`, expiring launches,
//! showing the tile preview) is queued on a [`MainLoop`] that the controller
//! drains with [`ScreenSession::dispatch_due`].

use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use crate::actor::broadcast::{BroadcastEvent, BroadcastSender};
use crate::actor::screen::display_topology::{HotCorners, MonitorTopology, ReloadOutcome};
use crate::actor::screen::error::ScreenError;
use crate::actor::screen::hints;
use crate::actor::screen::selection::{
    Acquired, ManagerSelection, PreviousOwner, SelectionProtocol, Sleeper, selection_name,
};
use crate::common::collections::HashMap;
use crate::common::config::{Config, MAX_WORKSPACES};
use crate::layout_engine::desktop_layout;
use crate::layout_engine::{Direction, LayoutHintOutcome, LayoutParams, WorkspaceLayout};
use crate::model::startup::message::{self, MessageAssembler, MessageKind, StartupMessage};
use crate::model::startup::{StartupSequence, StartupSequenceTracker, TimerChange};
use crate::model::workspace::{Struts, Workspace, WorkspaceError, WorkspaceList};
use crate::sys::event_loop::{MainLoop, SourceId};
use crate::sys::geometry::Rect;
use crate::sys::window_system::{
    CURRENT_TIME, Cursor, HintKey, PropertyValue, SysError, Timestamp, WindowHints, WindowId,
    WindowSystem, screen_name,
};

pub const TILE_PREVIEW_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferred {
    WorkAreaHint,
    StartupPoll,
    TilePreview,
}

/// Launch information remembered for a managed window. The initial workspace
/// and timestamp are each taken from a launch at most once.
#[derive(Debug, Default)]
struct WindowRecord {
    res_name: Option<String>,
    res_class: Option<String>,
    startup_id: Option<String>,
    initial_workspace: Option<u32>,
    initial_timestamp: Option<Timestamp>,
}

pub struct ScreenSession<S: WindowSystem> {
    sys: S,
    number: usize,
    name: String,
    rect: Rect,
    selection: ManagerSelection,
    previous_owner: PreviousOwner,
    root_events_selected: bool,
    topology: MonitorTopology,
    workspaces: WorkspaceList,
    layout_params: LayoutParams,
    config: Config,
    startup: StartupSequenceTracker,
    assembler: MessageAssembler,
    timers: MainLoop<Deferred>,
    work_area_idle: Option<SourceId>,
    startup_poll: Option<SourceId>,
    tile_preview: Option<SourceId>,
    cursor: Cursor,
    hot_corners: HotCorners,
    windows: HashMap<WindowId, WindowRecord>,
    broadcast: Option<BroadcastSender>,
    closing: bool,
}

impl<S: WindowSystem> ScreenSession<S> {
    /// Takes over the screen `sys` is connected to.
    ///
    /// The manager selection is acquired first; anything that fails after that
    /// point tears the half-built session down again, releasing the selection.
    pub fn new<Z: Sleeper>(
        sys: S,
        protocol: &SelectionProtocol<Z>,
        config: Config,
        broadcast: Option<BroadcastSender>,
    ) -> Result<Self, ScreenError> {
        let number = sys.screen_number();
        let name = screen_name(&sys.display_name(), number);
        let timestamp = sys.current_time()?;
        info!(screen = %name, "trying to acquire screen");

        let Acquired { selection, previous } =
            protocol.acquire(&sys, &selection_name(number), config.settings.replace, timestamp)?;

        let mut topology = MonitorTopology::new(Rect::default());
        topology.set_split_synthetic(config.debug.split_synthetic_monitor);

        let mut session = ScreenSession {
            number,
            name,
            rect: Rect::default(),
            selection,
            previous_owner: previous,
            root_events_selected: false,
            topology,
            workspaces: WorkspaceList::new(config.workspaces.count),
            layout_params: config.workspaces.layout.params(),
            startup: StartupSequenceTracker::new(config.startup.timeout()),
            assembler: MessageAssembler::new(),
            timers: MainLoop::new(),
            work_area_idle: None,
            startup_poll: None,
            tile_preview: None,
            cursor: Cursor::Default,
            hot_corners: HotCorners::default(),
            windows: HashMap::default(),
            broadcast,
            closing: false,
            config,
            sys,
        };
        session.init()?;
        Ok(session)
    }

    fn init(&mut self) -> Result<(), ScreenError> {
        if let Err(e) = self.sys.select_root_events() {
            return Err(match e {
                SysError::AccessDenied(_) => ScreenError::AlreadyManaged {
                    display: self.sys.display_name(),
                    screen: self.number,
                },
                other => ScreenError::System(other),
            });
        }
        self.root_events_selected = true;

        self.rect = self.sys.root_geometry()?;
        self.reload_monitors();

        self.publish(HintKey::SupportingWmCheck, PropertyValue::Window(self.selection.window()));
        self.publish(HintKey::Supported, hints::supported());
        self.publish(HintKey::IconSize, hints::icon_size());

        match self.sys.read_cardinals(HintKey::CurrentDesktop) {
            Ok(Some(values)) => {
                if let Some(&index) = values.first()
                    && (index as usize) < self.workspaces.len()
                {
                    debug!(index, "restoring current desktop");
                    _ = self.workspaces.set_active(index as usize);
                }
            }
            Ok(None) => {}
            Err(e) => warn!("cannot read _NET_CURRENT_DESKTOP: {e}"),
        }
        self.on_desktop_layout_changed();

        self.publish_number_of_spaces();
        self.publish(HintKey::DesktopGeometry, hints::desktop_geometry(self.rect));
        self.publish(HintKey::DesktopViewport, hints::desktop_viewport());
        self.publish_workspace_names();
        self.publish_current_desktop();
        self.publish_showing_desktop();
        self.update_hot_corners();
        self.queue_workarea_recalc();
        best_effort("flush", self.sys.flush());

        info!(
            screen = %self.name,
            selection = self.selection.name(),
            previous = ?self.previous_owner,
            workspaces = self.workspaces.len(),
            "managing screen"
        );
        Ok(())
    }

    pub fn number(&self) -> usize { self.number }

    pub fn name(&self) -> &str { &self.name }

    pub fn rect(&self) -> Rect { self.rect }

    pub fn config(&self) -> &Config { &self.config }

    pub fn previous_owner(&self) -> PreviousOwner { self.previous_owner }

    pub fn selection_window(&self) -> WindowId { self.selection.window() }

    pub fn topology(&self) -> &MonitorTopology { &self.topology }

    pub fn hot_corners(&self) -> HotCorners { self.hot_corners }

    pub fn workspace_count(&self) -> usize { self.workspaces.len() }

    /// The workspace at `index`, or `None` for anything out of range. Indices
    /// often come from hints written by other clients, so negative values are
    /// accepted and simply miss.
    pub fn workspace_at(&self, index: i64) -> Option<&Workspace> {
        usize::try_from(index).ok().and_then(|i| self.workspaces.get(i))
    }

    pub fn workspaces(&self) -> &WorkspaceList { &self.workspaces }

    pub fn active_workspace_index(&self) -> usize { self.workspaces.active_index() }

    pub fn workspace_name(&self, index: usize) -> String { self.config.workspaces.name(index) }

    pub fn workspace_of_window(&self, window: WindowId) -> Option<usize> {
        self.workspaces.workspace_of_window(window)
    }

    pub fn layout_params(&self) -> LayoutParams { self.layout_params }

    /// The workspace grid as it stands right now.
    pub fn layout(&self) -> WorkspaceLayout {
        WorkspaceLayout::compute(
            self.layout_params,
            self.workspaces.len(),
            self.workspaces.active_index(),
        )
    }

    /// The workspace next to the active one on the grid.
    pub fn workspace_neighbor(&self, direction: Direction) -> Option<usize> {
        self.layout().neighbor(direction)
    }

    pub fn set_workspace_layout_params(&mut self, params: LayoutParams) {
        debug!(?params, "workspace layout changed");
        self.layout_params = params;
        self.publish(
            HintKey::DesktopLayout,
            PropertyValue::Cardinals(desktop_layout::encode(&params)),
        );
    }

    /// Re-reads `_NET_DESKTOP_LAYOUT` after a pager changed it.
    pub fn on_desktop_layout_changed(&mut self) -> LayoutHintOutcome {
        let items = self.sys.read_cardinals(HintKey::DesktopLayout).unwrap_or_else(|e| {
            warn!("cannot read _NET_DESKTOP_LAYOUT: {e}");
            None
        });
        let outcome = desktop_layout::decode(items.as_deref(), self.layout_params);
        if let LayoutHintOutcome::Applied(params) = outcome {
            trace!(?params, "workspace layout from hint");
            self.layout_params = params;
        }
        outcome
    }

    /// The root window changed size or monitors came and went.
    pub fn on_topology_changed(&mut self, width: i32, height: i32) -> ReloadOutcome {
        info!(width, height, "screen resized");
        self.rect = Rect { width, height, ..self.rect };
        let outcome = self.reload_monitors();
        self.publish(HintKey::DesktopGeometry, hints::desktop_geometry(self.rect));
        self.update_hot_corners();
        self.queue_workarea_recalc();
        self.broadcast(BroadcastEvent::MonitorsChanged {
            monitors: self.topology.regions().to_vec(),
        });
        outcome
    }

    fn reload_monitors(&mut self) -> ReloadOutcome {
        let reported = self.sys.monitors().unwrap_or_else(|e| {
            warn!("cannot query monitors: {e}");
            Vec::new()
        });
        self.topology.reload(self.rect, reported)
    }

    pub fn region_for_rect(&self, rect: &Rect) -> usize { self.topology.region_for_rect(rect) }

    /// The monitor under the pointer, cached until the topology changes or
    /// [`Self::invalidate_current_monitor`] is called.
    pub fn current_monitor(&mut self) -> usize {
        let sys = &self.sys;
        self.topology.current(|| sys.pointer_position().ok())
    }

    pub fn invalidate_current_monitor(&mut self) { self.topology.invalidate_current(); }

    pub fn natural_monitor_ordering(&mut self) -> Vec<usize> {
        let start = self.current_monitor();
        self.topology.natural_ordering(start)
    }

    pub fn monitor_neighbor(&self, index: usize, direction: Direction) -> Option<usize> {
        self.topology.neighbor(index, direction)
    }

    fn update_hot_corners(&mut self) {
        self.hot_corners = self.topology.hot_corners(self.config.hot_corners.size());
        trace!(corners = ?self.hot_corners, "hot corners moved");
        self.broadcast(BroadcastEvent::HotCornersMoved { corners: self.hot_corners });
    }

    pub fn activate_workspace(
        &mut self,
        index: usize,
        time: Timestamp,
    ) -> Result<(), WorkspaceError> {
        if self.workspaces.set_active(index)? {
            debug!(index, time, "workspace activated");
            self.publish_current_desktop();
            self.publish_showing_desktop();
            self.broadcast(BroadcastEvent::WorkspaceActivated { index });
        }
        Ok(())
    }

    /// Appends a workspace and returns its index.
    pub fn new_workspace(&mut self) -> usize {
        let index = self.workspaces.push();
        self.config.workspaces.count = self.workspaces.len();
        self.publish_number_of_spaces();
        self.queue_workarea_recalc();
        self.broadcast(BroadcastEvent::WorkspaceAdded { index });
        index
    }

    /// Removes the workspace at `index`. Its windows go to the workspace before
    /// it (after it, for the first), which is activated if `index` was active.
    pub fn remove_workspace(&mut self, index: usize, time: Timestamp) -> Result<(), WorkspaceError> {
        let removal = self.workspaces.remove(index)?;
        self.config.workspaces.count = self.workspaces.len();
        self.edit_names(|names| {
            names.remove(index);
        });

        if removal.was_active {
            debug!(neighbor = removal.neighbor, time, "activating neighbour of removed workspace");
            self.broadcast(BroadcastEvent::WorkspaceActivated { index: removal.neighbor });
            self.publish_showing_desktop();
        }
        self.publish_current_desktop();
        self.publish_number_of_spaces();
        self.publish_workspace_names();
        self.queue_workarea_recalc();
        self.broadcast(BroadcastEvent::WorkspaceRemoved { index });
        Ok(())
    }

    pub fn reorder_workspace(&mut self, from: usize, to: usize) -> Result<(), WorkspaceError> {
        if from == to {
            return self.workspaces.get(from).map(|_| ()).ok_or(WorkspaceError::InvalidIndex(from));
        }
        let active_moved = self.workspaces.reorder(from, to)?;
        self.edit_names(|names| {
            let name = names.remove(from);
            names.insert(to, name);
        });

        if active_moved {
            self.publish_current_desktop();
        }
        self.publish_workspace_names();
        self.queue_workarea_recalc();
        self.broadcast(BroadcastEvent::WorkspaceReordered { from, to });
        Ok(())
    }

    /// Grows or shrinks to `count` workspaces. Windows on dropped workspaces
    /// move to the last one that remains.
    pub fn update_num_workspaces(&mut self, count: usize) {
        let requested = count;
        let count = count.clamp(1, MAX_WORKSPACES);
        if count != requested {
            warn!(requested, used = count, "number of workspaces out of range");
        }
        let old = self.workspaces.len();
        if count == old {
            return;
        }
        info!(old, new = count, "changing number of workspaces");

        if count < old {
            let active_changed = self.workspaces.truncate(count);
            for index in (count..old).rev() {
                self.broadcast(BroadcastEvent::WorkspaceRemoved { index });
            }
            if active_changed {
                self.publish_current_desktop();
                self.broadcast(BroadcastEvent::WorkspaceActivated {
                    index: self.workspaces.active_index(),
                });
            }
        } else {
            for _ in old..count {
                let index = self.workspaces.push();
                self.broadcast(BroadcastEvent::WorkspaceAdded { index });
            }
        }

        self.config.workspaces.count = count;
        self.publish_number_of_spaces();
        self.publish_workspace_names();
        self.queue_workarea_recalc();
    }

    pub fn set_workspace_names(&mut self, names: Vec<String>) {
        if names == self.config.workspaces.names {
            return;
        }
        self.config.workspaces.names = names;
        self.publish_workspace_names();
        self.broadcast_names();
    }

    /// Takes names another client wrote to `_NET_DESKTOP_NAMES` into the
    /// preferences. Returns whether any name changed.
    pub fn on_desktop_names_changed(&mut self) -> bool {
        let names = match self.sys.read_utf8_list(HintKey::DesktopNames) {
            Ok(Some(names)) => names,
            Ok(None) => return false,
            Err(e) => {
                warn!("cannot read _NET_DESKTOP_NAMES: {e}");
                return false;
            }
        };

        let mut changed = false;
        for (index, name) in names.into_iter().enumerate() {
            let stored = &mut self.config.workspaces.names;
            if stored.len() <= index {
                stored.resize(index + 1, String::new());
            }
            if stored[index] != name {
                stored[index] = name;
                changed = true;
            }
        }
        if changed {
            self.broadcast_names();
        }
        changed
    }

    fn edit_names(&mut self, edit: impl FnOnce(&mut Vec<String>)) {
        let count = self.workspaces.len() + 1;
        let mut names: Vec<String> = (0..count)
            .map(|i| self.config.workspaces.names.get(i).cloned().unwrap_or_default())
            .collect();
        edit(&mut names);
        while names.last().is_some_and(String::is_empty) {
            names.pop();
        }
        self.config.workspaces.names = names;
    }

    pub fn show_desktop(&mut self, time: Timestamp) {
        if self.workspaces.active().showing_desktop() {
            return;
        }
        debug!(time, "showing desktop");
        self.workspaces.active_mut().set_showing_desktop(true);
        self.publish_showing_desktop();
        self.broadcast(BroadcastEvent::ShowingDesktopChanged { showing: true });
    }

    pub fn unshow_desktop(&mut self) {
        if !self.workspaces.active().showing_desktop() {
            return;
        }
        debug!("no longer showing desktop");
        self.workspaces.active_mut().set_showing_desktop(false);
        self.publish_showing_desktop();
        self.broadcast(BroadcastEvent::ShowingDesktopChanged { showing: false });
    }

    pub fn set_struts(&mut self, index: usize, struts: Struts) -> Result<(), WorkspaceError> {
        let workspace = self.workspaces.get_mut(index).ok_or(WorkspaceError::InvalidIndex(index))?;
        if workspace.struts() != struts {
            workspace.set_struts(struts);
            self.queue_workarea_recalc();
        }
        Ok(())
    }

    /// Schedules `_NET_WORKAREA` to be republished once the loop is idle.
    /// Requests made before it runs are folded into one.
    pub fn queue_workarea_recalc(&mut self) {
        if self.closing {
            return;
        }
        if self.work_area_idle.is_some_and(|id| self.timers.is_pending(id)) {
            trace!("workarea recalc already queued");
            return;
        }
        self.work_area_idle = Some(self.timers.add_idle(Deferred::WorkAreaHint));
    }

    /// With `delay`, shows the tile preview after a short pause unless one is
    /// already on its way. Without, shows it now and drops any pending one.
    pub fn queue_tile_preview(&mut self, delay: bool, now: Instant) {
        if delay {
            if self.tile_preview.is_some_and(|id| self.timers.is_pending(id)) {
                return;
            }
            self.tile_preview =
                Some(self.timers.add_timeout(now, TILE_PREVIEW_DELAY, Deferred::TilePreview));
        } else {
            self.cancel_tile_preview();
            self.broadcast(BroadcastEvent::TilePreviewRequested);
        }
    }

    pub fn cancel_tile_preview(&mut self) {
        if let Some(id) = self.tile_preview.take() {
            self.timers.remove(id);
        }
    }

    /// Feeds one piece of a startup-notification message.
    pub fn on_startup_chunk(&mut self, source: WindowId, begin: bool, data: &[u8], now: Instant) {
        let Some(text) = self.assembler.push(source, begin, data) else { return };
        match message::parse(&text) {
            Ok(msg) => self.handle_startup_message(msg, now),
            Err(e) => debug!(?source, "ignoring startup message {text:?}: {e}"),
        }
    }

    pub fn handle_startup_message(&mut self, msg: StartupMessage, now: Instant) {
        if let Some(screen) = msg.fields.screen
            && screen != self.number
        {
            trace!(id = %msg.id, screen, "startup message for another screen");
            return;
        }

        match msg.kind {
            MessageKind::New => {
                let change = self.startup.on_initiated(StartupSequence::from_fields(
                    msg.id, msg.fields, now,
                ));
                self.apply_timer_change(change, now);
            }
            MessageKind::Change => {
                self.startup.on_changed(&msg.id, msg.fields, now);
            }
            MessageKind::Remove => {
                if let Some(completion) = self.startup.on_completed(&msg.id) {
                    self.apply_timer_change(completion.timer, now);
                }
            }
        }
        self.update_startup_feedback();
    }

    pub fn startup(&self) -> &StartupSequenceTracker { &self.startup }

    fn apply_timer_change(&mut self, change: Option<TimerChange>, now: Instant) {
        match change {
            Some(TimerChange::Start) => {
                let period = self.config.startup.poll_interval();
                trace!(?period, "starting startup poll");
                self.startup_poll =
                    Some(self.timers.add_interval(now, period, Deferred::StartupPoll));
            }
            Some(TimerChange::Stop) => {
                if let Some(id) = self.startup_poll.take() {
                    trace!("stopping startup poll");
                    self.timers.remove(id);
                }
            }
            None => {}
        }
    }

    /// Tells launchers that a sequence is over because we ended it ourselves.
    fn announce_completed(&self, sequence: &StartupSequence) {
        best_effort(
            "startup remove message",
            self.sys.send_startup_message(&message::format_remove(&sequence.id)),
        );
    }

    fn update_startup_feedback(&mut self) {
        let cursor = if self.startup.is_busy() { Cursor::Busy } else { Cursor::Default };
        if cursor == self.cursor {
            return;
        }
        debug!(?cursor, "startup feedback");
        self.cursor = cursor;
        best_effort("set cursor", self.sys.set_cursor(cursor));
        self.broadcast(BroadcastEvent::StartupFeedback {
            busy: cursor == Cursor::Busy,
            launching: self.startup.sequences().map(|s| s.id.clone()).collect(),
        });
    }

    /// Starts managing a freshly mapped window on the active workspace, then
    /// applies any launch hints meant for it. Returns whether a hint applied.
    pub fn add_window(&mut self, hints: WindowHints, now: Instant) -> bool {
        let WindowHints { window, res_name, res_class, startup_id } = hints;
        self.windows.insert(window, WindowRecord {
            res_name,
            res_class,
            startup_id,
            ..WindowRecord::default()
        });
        _ = self.workspaces.add_window(self.workspaces.active_index(), window);
        self.apply_startup_properties(window, now)
    }

    pub fn remove_window(&mut self, window: WindowId) {
        self.assembler.forget(window);
        self.windows.remove(&window);
        self.workspaces.remove_window(window);
    }

    /// Gives `window` the initial workspace and timestamp of the launch that
    /// created it. A window without a launch id is matched to a launch by its
    /// class, which ends that launch. Each hint is applied at most once.
    pub fn apply_startup_properties(&mut self, window: WindowId, now: Instant) -> bool {
        let Some(record) = self.windows.get(&window) else { return false };

        let sequence = match record.startup_id.clone() {
            Some(id) => match self.startup.find(&id) {
                Some(sequence) => sequence.clone(),
                None => {
                    trace!(?window, id, "no launch in progress for window");
                    return false;
                }
            },
            None => {
                let Some(completion) = self
                    .startup
                    .match_unlabeled_window(record.res_class.as_deref(), record.res_name.as_deref())
                else {
                    return false;
                };
                debug!(?window, id = %completion.sequence.id, "matched window to launch by class");
                self.apply_timer_change(completion.timer, now);
                self.announce_completed(&completion.sequence);
                self.update_startup_feedback();
                completion.sequence
            }
        };

        let Some(record) = self.windows.get_mut(&window) else { return false };
        record.startup_id = Some(sequence.id.clone());

        let mut changed = false;
        let mut target = None;
        if record.initial_workspace.is_none()
            && let Some(workspace) = sequence.workspace
        {
            record.initial_workspace = Some(workspace);
            target = Some(workspace as usize);
            changed = true;
        }
        if record.initial_timestamp.is_none() {
            record.initial_timestamp = Some(sequence.timestamp.unwrap_or(CURRENT_TIME));
            changed = true;
        }

        if let Some(index) = target {
            match self.workspaces.add_window(index, window) {
                Ok(()) => debug!(?window, index, "placed window on launch workspace"),
                Err(e) => warn!(?window, "ignoring launch workspace: {e}"),
            }
        }
        changed
    }

    /// The timestamp a window's launch asked for, if it has been applied.
    pub fn initial_timestamp(&self, window: WindowId) -> Option<Timestamp> {
        self.windows.get(&window).and_then(|r| r.initial_timestamp)
    }

    /// Runs every queued task that is due at `now`.
    pub fn dispatch_due(&mut self, now: Instant) {
        for (id, task) in self.timers.due(now) {
            match task {
                Deferred::WorkAreaHint => {
                    self.work_area_idle = None;
                    self.publish_workarea();
                }
                Deferred::StartupPoll => {
                    if self.startup_poll != Some(id) {
                        continue;
                    }
                    let outcome = self.startup.poll(now);
                    for sequence in &outcome.expired {
                        self.announce_completed(sequence);
                    }
                    self.apply_timer_change(outcome.timer, now);
                    self.update_startup_feedback();
                }
                Deferred::TilePreview => {
                    self.tile_preview = None;
                    self.broadcast(BroadcastEvent::TilePreviewRequested);
                }
            }
        }
        best_effort("flush", self.sys.flush());
    }

    pub fn next_wakeup(&self, now: Instant) -> Option<Instant> { self.timers.next_deadline(now) }

    /// Applies new preferences, touching only what changed.
    pub fn apply_config(&mut self, config: Config, now: Instant) {
        let old = std::mem::replace(&mut self.config, config);
        let new = self.config.clone();

        if old.workspaces.count != new.workspaces.count {
            self.update_num_workspaces(new.workspaces.count);
        }
        if old.workspaces.names != new.workspaces.names {
            self.publish_workspace_names();
            self.broadcast_names();
        }
        if old.workspaces.layout != new.workspaces.layout {
            self.set_workspace_layout_params(new.workspaces.layout.params());
        }
        if old.startup != new.startup {
            self.startup.set_timeout(new.startup.timeout());
            if let Some(id) = self.startup_poll.take() {
                self.timers.remove(id);
                self.apply_timer_change(Some(TimerChange::Start), now);
            }
        }
        if old.debug != new.debug {
            self.topology.set_split_synthetic(new.debug.split_synthetic_monitor);
            self.reload_monitors();
            self.update_hot_corners();
            self.queue_workarea_recalc();
        } else if old.hot_corners != new.hot_corners {
            self.update_hot_corners();
        }
        info!("preferences applied");
    }

    /// Stops managing the screen. Safe to call more than once; also run on
    /// drop. Failures along the way are logged and do not stop the teardown.
    pub fn close(&mut self) {
        if self.closing {
            return;
        }
        self.closing = true;
        info!(screen = %self.name, "unmanaging screen");

        let change = self.startup.clear();
        self.apply_timer_change(change, Instant::now());
        if let Some(id) = self.startup_poll.take() {
            self.timers.remove(id);
        }
        self.work_area_idle = None;
        self.tile_preview = None;
        self.timers.clear();

        if self.root_events_selected {
            self.root_events_selected = false;
            best_effort("release root window", self.sys.release_root_events());
        }
        best_effort(
            HintKey::SupportingWmCheck.atom_name(),
            self.sys.delete_property(HintKey::SupportingWmCheck),
        );
        best_effort("release selection", self.selection.release(&self.sys));
        best_effort("flush", self.sys.flush());
    }

    pub fn is_closed(&self) -> bool { self.closing }

    fn publish(&self, key: HintKey, value: PropertyValue) {
        if self.closing {
            return;
        }
        trace!(hint = key.atom_name(), ?value, "publishing");
        best_effort(key.atom_name(), self.sys.set_property(key, value));
    }

    fn publish_number_of_spaces(&self) {
        self.publish(HintKey::NumberOfDesktops, hints::cardinal(self.workspaces.len()));
    }

    fn publish_current_desktop(&self) {
        self.publish(HintKey::CurrentDesktop, hints::cardinal(self.workspaces.active_index()));
    }

    fn publish_showing_desktop(&self) {
        self.publish(
            HintKey::ShowingDesktop,
            hints::showing_desktop(self.workspaces.active().showing_desktop()),
        );
    }

    fn publish_workspace_names(&self) {
        let names = self.current_names();
        self.publish(HintKey::DesktopNames, PropertyValue::Utf8List(names));
    }

    fn publish_workarea(&self) {
        let areas: Vec<Rect> = self.workspaces.iter().map(|w| w.work_area(self.rect)).collect();
        debug!(workspaces = areas.len(), "publishing workarea");
        self.publish(HintKey::Workarea, hints::workarea(areas));
    }

    fn current_names(&self) -> Vec<String> {
        (0..self.workspaces.len()).map(|i| self.config.workspaces.name(i)).collect()
    }

    fn broadcast_names(&self) {
        self.broadcast(BroadcastEvent::WorkspaceNamesChanged { names: self.current_names() });
    }

    fn broadcast(&self, event: BroadcastEvent) {
        if let Some(tx) = &self.broadcast {
            tx.send(event);
        }
    }
}

impl<S: WindowSystem> Drop for ScreenSession<S> {
    fn drop(&mut self) { self.close(); }
}

fn best_effort(what: &str, result: Result<(), SysError>) {
    if let Err(e) = result {
        warn!("{what} failed: {e}");
    }
}
