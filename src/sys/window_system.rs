//! The narrow interface between the screen session and the display server.
//!
//! Production code talks to X through [`crate::sys::x11::X11System`]; tests use
//! the in-memory server in `sys::fake`. Everything the session needs from the
//! outside world goes through [`WindowSystem`], and everything the outside
//! world tells the session arrives as a [`SystemEvent`].

use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoStaticStr};
use thiserror::Error;

use crate::sys::geometry::{Point, Rect};

/// Server time in milliseconds, as carried by X events.
pub type Timestamp = u32;

/// The "now" sentinel accepted by the server in place of a real timestamp.
pub const CURRENT_TIME: Timestamp = 0;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct WindowId(pub u32);

impl WindowId {
    pub fn get(self) -> u32 { self.0 }
}

/// Root window properties the session publishes or consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr, EnumIter)]
pub enum HintKey {
    #[strum(serialize = "_NET_SUPPORTED")]
    Supported,
    #[strum(serialize = "_NET_SUPPORTING_WM_CHECK")]
    SupportingWmCheck,
    #[strum(serialize = "_NET_NUMBER_OF_DESKTOPS")]
    NumberOfDesktops,
    #[strum(serialize = "_NET_DESKTOP_GEOMETRY")]
    DesktopGeometry,
    #[strum(serialize = "_NET_DESKTOP_VIEWPORT")]
    DesktopViewport,
    #[strum(serialize = "_NET_DESKTOP_LAYOUT")]
    DesktopLayout,
    #[strum(serialize = "_NET_DESKTOP_NAMES")]
    DesktopNames,
    #[strum(serialize = "_NET_WORKAREA")]
    Workarea,
    #[strum(serialize = "_NET_SHOWING_DESKTOP")]
    ShowingDesktop,
    #[strum(serialize = "_NET_CURRENT_DESKTOP")]
    CurrentDesktop,
    #[strum(serialize = "WM_ICON_SIZE")]
    IconSize,
}

impl HintKey {
    pub fn atom_name(self) -> &'static str { self.into() }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Cardinals(Vec<u32>),
    /// Atom names, interned by the backend.
    Atoms(Vec<String>),
    Window(WindowId),
    Utf8List(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cursor {
    #[default]
    Default,
    Busy,
}

/// What the display server knows about a freshly mapped client window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowHints {
    pub window: WindowId,
    pub res_name: Option<String>,
    pub res_class: Option<String>,
    pub startup_id: Option<String>,
}

/// Notifications read from the display server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemEvent {
    /// The root window changed size or monitors were added or removed.
    TopologyChanged { width: i32, height: i32 },
    /// Another client rewrote `_NET_DESKTOP_LAYOUT`.
    DesktopLayoutChanged,
    /// Another client rewrote `_NET_DESKTOP_NAMES`.
    DesktopNamesChanged,
    /// One 20 byte piece of a startup-notification message.
    StartupChunk { source: WindowId, begin: bool, data: Vec<u8> },
    /// Someone else took the manager selection.
    SelectionCleared,
    CurrentDesktopRequested { index: u32, time: Timestamp },
    NumberOfDesktopsRequested(u32),
    ShowingDesktopRequested { show: bool, time: Timestamp },
    WindowMapped(WindowHints),
    WindowGone(WindowId),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SysError {
    #[error("display connection failed: {0}")]
    Connection(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("window {0:?} does not exist")]
    BadWindow(WindowId),
}

/// Operations on one screen of a display.
///
/// Implementations are used from the control thread only.
pub trait WindowSystem {
    fn selection_owner(&self, selection: &str) -> Result<Option<WindowId>, SysError>;

    /// Sets (or with `None`, clears) the owner of `selection`. The server may
    /// silently ignore the request, so callers re-read the owner afterwards.
    fn set_selection_owner(
        &self,
        selection: &str,
        owner: Option<WindowId>,
        time: Timestamp,
    ) -> Result<(), SysError>;

    /// Asks to be told when `window` is destroyed.
    fn watch_for_destroy(&self, window: WindowId) -> Result<(), SysError>;

    /// Non-blocking check for the destruction of a watched window.
    fn poll_destroyed(&self, window: WindowId) -> Result<bool, SysError>;

    /// An unmapped, offscreen, override-redirect window used as the
    /// selection owner and `_NET_SUPPORTING_WM_CHECK` target.
    fn create_token_window(&self) -> Result<WindowId, SysError>;

    fn destroy_window(&self, window: WindowId) -> Result<(), SysError>;

    /// Sends the `MANAGER` client message to the root window.
    fn announce_manager(
        &self,
        selection: &str,
        owner: WindowId,
        time: Timestamp,
    ) -> Result<(), SysError>;

    /// Selects the substructure-redirect event mask on the root window. Fails
    /// with [`SysError::AccessDenied`] when another window manager holds it.
    fn select_root_events(&self) -> Result<(), SysError>;

    fn release_root_events(&self) -> Result<(), SysError>;

    fn root_geometry(&self) -> Result<Rect, SysError>;

    /// Physical monitors in server order. May be empty.
    fn monitors(&self) -> Result<Vec<Rect>, SysError>;

    fn pointer_position(&self) -> Result<Point, SysError>;

    fn set_property(&self, key: HintKey, value: PropertyValue) -> Result<(), SysError>;

    fn delete_property(&self, key: HintKey) -> Result<(), SysError>;

    /// Reads a CARDINAL list from the root window; `None` when unset.
    fn read_cardinals(&self, key: HintKey) -> Result<Option<Vec<u32>>, SysError>;

    fn read_utf8_list(&self, key: HintKey) -> Result<Option<Vec<String>>, SysError>;

    fn set_cursor(&self, cursor: Cursor) -> Result<(), SysError>;

    /// A server timestamp obtained with a round trip.
    fn current_time(&self) -> Result<Timestamp, SysError>;

    /// Broadcasts a complete startup-notification message.
    fn send_startup_message(&self, message: &str) -> Result<(), SysError>;

    /// The display string as given to the connection, e.g. `:0` or `host:1.0`.
    fn display_name(&self) -> String;

    fn screen_number(&self) -> usize;

    fn flush(&self) -> Result<(), SysError>;
}

/// `host:D.S` for screen `screen` of `display`, replacing any screen suffix
/// already present.
pub fn screen_name(display: &str, screen: usize) -> String {
    let base = match display.rfind(':') {
        Some(colon) => match display[colon..].find('.') {
            Some(dot) => &display[..colon + dot],
            None => display,
        },
        None => display,
    };
    format!("{base}.{screen}")
}
