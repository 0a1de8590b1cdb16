//! An in-memory display server for tests.
//!
//! Several [`FakeSystem`] clients can connect to one [`FakeServer`], which is
//! how the selection handshake is exercised against a competing manager.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::sys::geometry::{Point, Rect};
use crate::sys::window_system::{
    Cursor, HintKey, PropertyValue, SysError, Timestamp, WindowId, WindowSystem,
};

#[derive(Debug, Default)]
struct ServerState {
    next_window: u32,
    next_client: u32,
    time: Timestamp,
    live_windows: HashSet<WindowId>,
    owners: HashMap<String, WindowId>,
    redirect_holder: Option<u32>,
    properties: HashMap<HintKey, PropertyValue>,
    root: Rect,
    monitors: Vec<Rect>,
    pointer: Point,
    watched: HashSet<WindowId>,
    destroy_after_polls: HashMap<WindowId, u32>,
    fail_watch: bool,
    fail_writes: bool,
    fail_selection_assignment: bool,
    steal_selection_with: Option<WindowId>,
    announcements: Vec<(String, WindowId, Timestamp)>,
    startup_messages: Vec<String>,
    cursor_log: Vec<Cursor>,
}

#[derive(Debug, Clone)]
pub struct FakeServer(Rc<RefCell<ServerState>>);

impl FakeServer {
    pub fn new(width: i32, height: i32) -> Self {
        let state = ServerState {
            next_window: 0x200000,
            time: 1000,
            root: Rect::from_size(width, height),
            monitors: vec![Rect::from_size(width, height)],
            ..Default::default()
        };
        FakeServer(Rc::new(RefCell::new(state)))
    }

    pub fn set_monitors(&self, monitors: Vec<Rect>) { self.0.borrow_mut().monitors = monitors; }

    pub fn set_root_size(&self, width: i32, height: i32) {
        self.0.borrow_mut().root = Rect::from_size(width, height);
    }

    pub fn set_pointer(&self, x: i32, y: i32) { self.0.borrow_mut().pointer = Point::new(x, y); }

    /// A window owned by no fake client, e.g. a competing manager's token.
    pub fn create_foreign_window(&self) -> WindowId { self.0.borrow_mut().create_window() }

    pub fn set_owner(&self, selection: &str, owner: WindowId) {
        self.0.borrow_mut().owners.insert(selection.to_string(), owner);
    }

    pub fn owner(&self, selection: &str) -> Option<WindowId> {
        self.0.borrow().owners.get(selection).copied()
    }

    /// The watched `window` goes away after being polled `polls` times.
    pub fn destroy_after_polls(&self, window: WindowId, polls: u32) {
        self.0.borrow_mut().destroy_after_polls.insert(window, polls);
    }

    pub fn fail_destroy_watch(&self) { self.0.borrow_mut().fail_watch = true; }

    pub fn fail_property_writes(&self, fail: bool) { self.0.borrow_mut().fail_writes = fail; }

    pub fn fail_selection_assignment(&self) {
        self.0.borrow_mut().fail_selection_assignment = true;
    }

    /// The next selection assignment is won by `window` instead.
    pub fn steal_next_selection(&self, window: WindowId) {
        self.0.borrow_mut().steal_selection_with = Some(window);
    }

    pub fn is_live(&self, window: WindowId) -> bool {
        self.0.borrow().live_windows.contains(&window)
    }

    pub fn live_window_count(&self) -> usize { self.0.borrow().live_windows.len() }

    pub fn property(&self, key: HintKey) -> Option<PropertyValue> {
        self.0.borrow().properties.get(&key).cloned()
    }

    pub fn cardinals(&self, key: HintKey) -> Option<Vec<u32>> {
        match self.property(key) {
            Some(PropertyValue::Cardinals(values)) => Some(values),
            _ => None,
        }
    }

    /// Writes a property as another client would.
    pub fn set_foreign_property(&self, key: HintKey, value: PropertyValue) {
        self.0.borrow_mut().properties.insert(key, value);
    }

    pub fn announcements(&self) -> Vec<(String, WindowId, Timestamp)> {
        self.0.borrow().announcements.clone()
    }

    pub fn startup_messages(&self) -> Vec<String> { self.0.borrow().startup_messages.clone() }

    pub fn cursor_log(&self) -> Vec<Cursor> { self.0.borrow().cursor_log.clone() }

    pub fn redirect_holder_count(&self) -> usize {
        usize::from(self.0.borrow().redirect_holder.is_some())
    }
}

impl ServerState {
    fn create_window(&mut self) -> WindowId {
        self.next_window += 1;
        let id = WindowId(self.next_window);
        self.live_windows.insert(id);
        id
    }

    fn destroy_window(&mut self, window: WindowId) {
        self.live_windows.remove(&window);
        self.watched.remove(&window);
        self.owners.retain(|_, owner| *owner != window);
    }

    fn check_write(&self) -> Result<(), SysError> {
        if self.fail_writes {
            return Err(SysError::Request("property write rejected".into()));
        }
        Ok(())
    }
}

pub struct FakeSystem {
    server: FakeServer,
    client: u32,
}

impl FakeSystem {
    pub fn connect(server: &FakeServer) -> Self {
        let client = {
            let mut state = server.0.borrow_mut();
            state.next_client += 1;
            state.next_client
        };
        FakeSystem { server: server.clone(), client }
    }

    pub fn server(&self) -> &FakeServer { &self.server }

    fn state(&self) -> std::cell::RefMut<'_, ServerState> { self.server.0.borrow_mut() }
}

impl WindowSystem for FakeSystem {
    fn selection_owner(&self, selection: &str) -> Result<Option<WindowId>, SysError> {
        Ok(self.state().owners.get(selection).copied())
    }

    fn set_selection_owner(
        &self,
        selection: &str,
        owner: Option<WindowId>,
        _time: Timestamp,
    ) -> Result<(), SysError> {
        let mut state = self.state();
        if owner.is_some() && state.fail_selection_assignment {
            return Err(SysError::Request("selection assignment rejected".into()));
        }
        match (state.steal_selection_with.take(), owner) {
            (Some(thief), Some(_)) => {
                state.owners.insert(selection.to_string(), thief);
            }
            (_, Some(owner)) => {
                state.owners.insert(selection.to_string(), owner);
            }
            (_, None) => {
                state.owners.remove(selection);
            }
        }
        Ok(())
    }

    fn watch_for_destroy(&self, window: WindowId) -> Result<(), SysError> {
        let mut state = self.state();
        if state.fail_watch || !state.live_windows.contains(&window) {
            return Err(SysError::BadWindow(window));
        }
        state.watched.insert(window);
        Ok(())
    }

    fn poll_destroyed(&self, window: WindowId) -> Result<bool, SysError> {
        let mut state = self.state();
        if !state.live_windows.contains(&window) {
            return Ok(true);
        }
        let Some(remaining) = state.destroy_after_polls.get_mut(&window) else {
            return Ok(false);
        };
        if *remaining > 1 {
            *remaining -= 1;
            return Ok(false);
        }
        state.destroy_after_polls.remove(&window);
        state.destroy_window(window);
        Ok(true)
    }

    fn create_token_window(&self) -> Result<WindowId, SysError> {
        Ok(self.state().create_window())
    }

    fn destroy_window(&self, window: WindowId) -> Result<(), SysError> {
        let mut state = self.state();
        if !state.live_windows.contains(&window) {
            return Err(SysError::BadWindow(window));
        }
        state.destroy_window(window);
        Ok(())
    }

    fn announce_manager(
        &self,
        selection: &str,
        owner: WindowId,
        time: Timestamp,
    ) -> Result<(), SysError> {
        self.state().announcements.push((selection.to_string(), owner, time));
        Ok(())
    }

    fn select_root_events(&self) -> Result<(), SysError> {
        let mut state = self.state();
        match state.redirect_holder {
            Some(holder) if holder != self.client => {
                Err(SysError::AccessDenied("SubstructureRedirect already selected".into()))
            }
            _ => {
                state.redirect_holder = Some(self.client);
                Ok(())
            }
        }
    }

    fn release_root_events(&self) -> Result<(), SysError> {
        let mut state = self.state();
        if state.redirect_holder == Some(self.client) {
            state.redirect_holder = None;
        }
        Ok(())
    }

    fn root_geometry(&self) -> Result<Rect, SysError> { Ok(self.state().root) }

    fn monitors(&self) -> Result<Vec<Rect>, SysError> { Ok(self.state().monitors.clone()) }

    fn pointer_position(&self) -> Result<Point, SysError> { Ok(self.state().pointer) }

    fn set_property(&self, key: HintKey, value: PropertyValue) -> Result<(), SysError> {
        let mut state = self.state();
        state.check_write()?;
        state.properties.insert(key, value);
        Ok(())
    }

    fn delete_property(&self, key: HintKey) -> Result<(), SysError> {
        let mut state = self.state();
        state.check_write()?;
        state.properties.remove(&key);
        Ok(())
    }

    fn read_cardinals(&self, key: HintKey) -> Result<Option<Vec<u32>>, SysError> {
        Ok(self.server.cardinals(key))
    }

    fn read_utf8_list(&self, key: HintKey) -> Result<Option<Vec<String>>, SysError> {
        match self.server.property(key) {
            Some(PropertyValue::Utf8List(names)) => Ok(Some(names)),
            _ => Ok(None),
        }
    }

    fn set_cursor(&self, cursor: Cursor) -> Result<(), SysError> {
        self.state().cursor_log.push(cursor);
        Ok(())
    }

    fn current_time(&self) -> Result<Timestamp, SysError> {
        let mut state = self.state();
        state.time += 1;
        Ok(state.time)
    }

    fn send_startup_message(&self, message: &str) -> Result<(), SysError> {
        self.state().startup_messages.push(message.to_string());
        Ok(())
    }

    fn display_name(&self) -> String { ":0".to_string() }

    fn screen_number(&self) -> usize { 0 }

    fn flush(&self) -> Result<(), SysError> { Ok(()) }
}
