//! [`WindowSystem`] over an X11 connection.
//!
//! Requests are made from the control thread. Events are read on a separate
//! thread by an [`EventReader`], which turns the ones the session cares about
//! into [`SystemEvent`]s. The connection is shared between the two.

use std::sync::Arc;
use std::thread;

use tracing::{debug, error, info, trace, warn};
use x11rb::connection::Connection;
use x11rb::errors::{ConnectionError, ReplyError, ReplyOrIdError};
use x11rb::protocol::randr::{self, ConnectionExt as _};
use x11rb::protocol::xproto::{
    Atom, AtomEnum, ChangeWindowAttributesAux, ClientMessageEvent, ConfigureWindowAux,
    ConnectionExt as _, CreateWindowAux, EventMask, PropMode, Window, WindowClass,
};
use x11rb::protocol::{ErrorKind, Event};
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;

use crate::model::startup::message::chunks;
use crate::sys::geometry::{Point, Rect};
use crate::sys::window_system::{
    CURRENT_TIME, Cursor, HintKey, PropertyValue, SysError, SystemEvent, Timestamp, WindowHints,
    WindowId, WindowSystem,
};

/// Glyphs in the standard `cursor` font.
const XC_LEFT_PTR: u16 = 68;
const XC_WATCH: u16 = 150;

/// Longest property read, in 32 bit units.
const MAX_PROPERTY_LEN: u32 = 4096;

x11rb::atom_manager! {
    pub Atoms: AtomsCookie {
        MANAGER,
        UTF8_STRING,
        _NET_SUPPORTED,
        _NET_SUPPORTING_WM_CHECK,
        _NET_NUMBER_OF_DESKTOPS,
        _NET_DESKTOP_GEOMETRY,
        _NET_DESKTOP_VIEWPORT,
        _NET_DESKTOP_LAYOUT,
        _NET_DESKTOP_NAMES,
        _NET_WORKAREA,
        _NET_SHOWING_DESKTOP,
        _NET_CURRENT_DESKTOP,
        _NET_STARTUP_ID,
        _NET_STARTUP_INFO_BEGIN,
        _NET_STARTUP_INFO,
        _MANTLE_TIMESTAMP,
    }
}

impl Atoms {
    fn hint(&self, key: HintKey) -> Atom {
        match key {
            HintKey::Supported => self._NET_SUPPORTED,
            HintKey::SupportingWmCheck => self._NET_SUPPORTING_WM_CHECK,
            HintKey::NumberOfDesktops => self._NET_NUMBER_OF_DESKTOPS,
            HintKey::DesktopGeometry => self._NET_DESKTOP_GEOMETRY,
            HintKey::DesktopViewport => self._NET_DESKTOP_VIEWPORT,
            HintKey::DesktopLayout => self._NET_DESKTOP_LAYOUT,
            HintKey::DesktopNames => self._NET_DESKTOP_NAMES,
            HintKey::Workarea => self._NET_WORKAREA,
            HintKey::ShowingDesktop => self._NET_SHOWING_DESKTOP,
            HintKey::CurrentDesktop => self._NET_CURRENT_DESKTOP,
            HintKey::IconSize => AtomEnum::WM_ICON_SIZE.into(),
        }
    }
}

impl From<ConnectionError> for SysError {
    fn from(e: ConnectionError) -> Self { SysError::Connection(e.to_string()) }
}

impl From<ReplyError> for SysError {
    fn from(e: ReplyError) -> Self {
        match e {
            ReplyError::ConnectionError(e) => e.into(),
            ReplyError::X11Error(err) => match err.error_kind {
                ErrorKind::Access => SysError::AccessDenied(format!(
                    "{} denied",
                    err.request_name.unwrap_or("request")
                )),
                ErrorKind::Window => SysError::BadWindow(WindowId(err.bad_value)),
                kind => SysError::Request(format!(
                    "{} failed: {kind:?}",
                    err.request_name.unwrap_or("request")
                )),
            },
        }
    }
}

impl From<ReplyOrIdError> for SysError {
    fn from(e: ReplyOrIdError) -> Self {
        match e {
            ReplyOrIdError::IdsExhausted => SysError::Request("out of resource ids".into()),
            ReplyOrIdError::ConnectionError(e) => e.into(),
            ReplyOrIdError::X11Error(err) => ReplyError::X11Error(err).into(),
        }
    }
}

/// An open display, before a screen has been picked.
pub struct X11Display {
    conn: Arc<RustConnection>,
    name: String,
    default_screen: usize,
}

impl X11Display {
    /// Connects to `display`, or to `$DISPLAY` when `None`.
    pub fn connect(display: Option<&str>) -> Result<Self, SysError> {
        let (conn, default_screen) =
            x11rb::connect(display).map_err(|e| SysError::Connection(e.to_string()))?;
        let name = display
            .map(str::to_string)
            .or_else(|| std::env::var("DISPLAY").ok())
            .unwrap_or_else(|| ":0".to_string());
        info!(display = %name, default_screen, "connected to X server");
        Ok(X11Display { conn: Arc::new(conn), name, default_screen })
    }

    pub fn default_screen(&self) -> usize { self.default_screen }

    pub fn screen_count(&self) -> usize { self.conn.setup().roots.len() }

    /// Prepares screen `number` for management. The caller checks that the
    /// screen exists.
    pub fn into_screen(self, number: usize) -> Result<X11System, SysError> {
        let screen = self
            .conn
            .setup()
            .roots
            .get(number)
            .ok_or_else(|| SysError::Request(format!("no screen {number}")))?;
        let root = screen.root;
        let atoms = Atoms::new(self.conn.as_ref())?.reply()?;

        let time_window = self.conn.generate_id()?;
        self.conn.create_window(
            x11rb::COPY_DEPTH_FROM_PARENT,
            time_window,
            root,
            -100,
            -100,
            1,
            1,
            0,
            WindowClass::INPUT_OUTPUT,
            x11rb::COPY_FROM_PARENT,
            &CreateWindowAux::new().override_redirect(1).event_mask(EventMask::PROPERTY_CHANGE),
        )?;

        let font = self.conn.generate_id()?;
        self.conn.open_font(font, b"cursor")?;
        let mut cursors = [0; 2];
        for (slot, glyph) in cursors.iter_mut().zip([XC_LEFT_PTR, XC_WATCH]) {
            *slot = self.conn.generate_id()?;
            self.conn.create_glyph_cursor(
                *slot,
                font,
                font,
                glyph,
                glyph + 1,
                0,
                0,
                0,
                0xffff,
                0xffff,
                0xffff,
            )?;
        }
        self.conn.close_font(font)?;
        self.conn.flush()?;

        Ok(X11System {
            conn: self.conn,
            display: self.name,
            number,
            root,
            atoms,
            time_window,
            cursors,
        })
    }
}

pub struct X11System {
    conn: Arc<RustConnection>,
    display: String,
    number: usize,
    root: Window,
    atoms: Atoms,
    /// Hidden window used to obtain server timestamps and to send startup
    /// messages from.
    time_window: Window,
    cursors: [u32; 2],
}

impl X11System {
    /// The reader for this screen's events. Start it only once the session
    /// exists: until then the control thread reads events itself.
    pub fn event_reader(&self) -> Result<EventReader, SysError> {
        let selection = self.intern(&format!("WM_S{}", self.number))?;
        Ok(EventReader {
            conn: Arc::clone(&self.conn),
            root: self.root,
            atoms: self.atoms,
            selection,
        })
    }

    fn intern(&self, name: &str) -> Result<Atom, SysError> {
        Ok(self.conn.intern_atom(false, name.as_bytes())?.reply()?.atom)
    }

    fn read_property(
        &self,
        key: HintKey,
        type_: impl Into<Atom>,
    ) -> Result<Option<x11rb::protocol::xproto::GetPropertyReply>, SysError> {
        let reply = self
            .conn
            .get_property(false, self.root, self.atoms.hint(key), type_, 0, MAX_PROPERTY_LEN)?
            .reply()?;
        if reply.type_ == u32::from(AtomEnum::NONE) {
            return Ok(None);
        }
        Ok(Some(reply))
    }
}

impl WindowSystem for X11System {
    fn selection_owner(&self, selection: &str) -> Result<Option<WindowId>, SysError> {
        let atom = self.intern(selection)?;
        let owner = self.conn.get_selection_owner(atom)?.reply()?.owner;
        Ok((owner != x11rb::NONE).then_some(WindowId(owner)))
    }

    fn set_selection_owner(
        &self,
        selection: &str,
        owner: Option<WindowId>,
        time: Timestamp,
    ) -> Result<(), SysError> {
        let atom = self.intern(selection)?;
        let owner = owner.map_or(x11rb::NONE, WindowId::get);
        self.conn.set_selection_owner(owner, atom, time)?.check()?;
        Ok(())
    }

    fn watch_for_destroy(&self, window: WindowId) -> Result<(), SysError> {
        let aux = ChangeWindowAttributesAux::new().event_mask(EventMask::STRUCTURE_NOTIFY);
        self.conn.change_window_attributes(window.get(), &aux)?.check()?;
        Ok(())
    }

    fn poll_destroyed(&self, window: WindowId) -> Result<bool, SysError> {
        match self.conn.get_window_attributes(window.get())?.reply() {
            Ok(_) => Ok(false),
            Err(ReplyError::X11Error(err)) if err.error_kind == ErrorKind::Window => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    fn create_token_window(&self) -> Result<WindowId, SysError> {
        let window = self.conn.generate_id()?;
        self.conn
            .create_window(
                x11rb::COPY_DEPTH_FROM_PARENT,
                window,
                self.root,
                -100,
                -100,
                1,
                1,
                0,
                WindowClass::INPUT_OUTPUT,
                x11rb::COPY_FROM_PARENT,
                &CreateWindowAux::new()
                    .override_redirect(1)
                    .event_mask(EventMask::PROPERTY_CHANGE),
            )?
            .check()?;
        self.conn.change_property8(
            PropMode::REPLACE,
            window,
            AtomEnum::WM_NAME,
            AtomEnum::STRING,
            b"mantle",
        )?;
        self.conn.change_property32(
            PropMode::REPLACE,
            window,
            self.atoms._NET_SUPPORTING_WM_CHECK,
            AtomEnum::WINDOW,
            &[window],
        )?;
        debug!(window, "created token window");
        Ok(WindowId(window))
    }

    fn destroy_window(&self, window: WindowId) -> Result<(), SysError> {
        self.conn.destroy_window(window.get())?.check()?;
        Ok(())
    }

    fn announce_manager(
        &self,
        selection: &str,
        owner: WindowId,
        time: Timestamp,
    ) -> Result<(), SysError> {
        let atom = self.intern(selection)?;
        let event = ClientMessageEvent::new(32, self.root, self.atoms.MANAGER, [
            time,
            atom,
            owner.get(),
            0,
            0,
        ]);
        self.conn.send_event(false, self.root, EventMask::STRUCTURE_NOTIFY, event)?;
        Ok(())
    }

    fn select_root_events(&self) -> Result<(), SysError> {
        let mask = EventMask::SUBSTRUCTURE_REDIRECT
            | EventMask::SUBSTRUCTURE_NOTIFY
            | EventMask::STRUCTURE_NOTIFY
            | EventMask::PROPERTY_CHANGE;
        let aux = ChangeWindowAttributesAux::new().event_mask(mask);
        self.conn.change_window_attributes(self.root, &aux)?.check()?;

        match self.conn.randr_query_version(1, 5)?.reply() {
            Ok(_) => {
                self.conn.randr_select_input(self.root, randr::NotifyMask::SCREEN_CHANGE)?;
            }
            Err(e) => warn!("RandR unavailable, monitor changes will be missed: {e}"),
        }
        Ok(())
    }

    fn release_root_events(&self) -> Result<(), SysError> {
        let aux = ChangeWindowAttributesAux::new().event_mask(EventMask::NO_EVENT);
        self.conn.change_window_attributes(self.root, &aux)?;
        Ok(())
    }

    fn root_geometry(&self) -> Result<Rect, SysError> {
        let geometry = self.conn.get_geometry(self.root)?.reply()?;
        Ok(Rect::from_size(i32::from(geometry.width), i32::from(geometry.height)))
    }

    fn monitors(&self) -> Result<Vec<Rect>, SysError> {
        let reply = self.conn.randr_get_monitors(self.root, true)?.reply()?;
        Ok(reply
            .monitors
            .iter()
            .map(|m| {
                Rect::new(
                    i32::from(m.x),
                    i32::from(m.y),
                    i32::from(m.width),
                    i32::from(m.height),
                )
            })
            .collect())
    }

    fn pointer_position(&self) -> Result<Point, SysError> {
        let reply = self.conn.query_pointer(self.root)?.reply()?;
        Ok(Point::new(i32::from(reply.root_x), i32::from(reply.root_y)))
    }

    fn set_property(&self, key: HintKey, value: PropertyValue) -> Result<(), SysError> {
        let atom = self.atoms.hint(key);
        match value {
            PropertyValue::Cardinals(values) => {
                let type_: Atom = match key {
                    HintKey::IconSize => AtomEnum::WM_ICON_SIZE.into(),
                    _ => AtomEnum::CARDINAL.into(),
                };
                self.conn.change_property32(PropMode::REPLACE, self.root, atom, type_, &values)?;
            }
            PropertyValue::Atoms(names) => {
                let atoms = names.iter().map(|n| self.intern(n)).collect::<Result<Vec<_>, _>>()?;
                self.conn.change_property32(
                    PropMode::REPLACE,
                    self.root,
                    atom,
                    AtomEnum::ATOM,
                    &atoms,
                )?;
            }
            PropertyValue::Window(window) => {
                self.conn.change_property32(
                    PropMode::REPLACE,
                    self.root,
                    atom,
                    AtomEnum::WINDOW,
                    &[window.get()],
                )?;
            }
            PropertyValue::Utf8List(items) => {
                let mut bytes = Vec::new();
                for item in &items {
                    bytes.extend_from_slice(item.as_bytes());
                    bytes.push(0);
                }
                self.conn.change_property8(
                    PropMode::REPLACE,
                    self.root,
                    atom,
                    self.atoms.UTF8_STRING,
                    &bytes,
                )?;
            }
        }
        Ok(())
    }

    fn delete_property(&self, key: HintKey) -> Result<(), SysError> {
        self.conn.delete_property(self.root, self.atoms.hint(key))?;
        Ok(())
    }

    fn read_cardinals(&self, key: HintKey) -> Result<Option<Vec<u32>>, SysError> {
        let Some(reply) = self.read_property(key, AtomEnum::CARDINAL)? else {
            return Ok(None);
        };
        Ok(reply.value32().map(Iterator::collect))
    }

    fn read_utf8_list(&self, key: HintKey) -> Result<Option<Vec<String>>, SysError> {
        let Some(reply) = self.read_property(key, self.atoms.UTF8_STRING)? else {
            return Ok(None);
        };
        if reply.format != 8 {
            return Ok(None);
        }
        let mut items: Vec<String> = reply
            .value
            .split(|b| *b == 0)
            .map(|s| String::from_utf8_lossy(s).into_owned())
            .collect();
        if reply.value.last() == Some(&0) {
            items.pop();
        }
        Ok(Some(items))
    }

    fn set_cursor(&self, cursor: Cursor) -> Result<(), SysError> {
        let glyph = match cursor {
            Cursor::Default => self.cursors[0],
            Cursor::Busy => self.cursors[1],
        };
        let aux = ChangeWindowAttributesAux::new().cursor(glyph);
        self.conn.change_window_attributes(self.root, &aux)?;
        self.conn.flush()?;
        Ok(())
    }

    /// Appends nothing to a property of a hidden window and waits for the
    /// resulting notification, whose timestamp is the server's clock. Other
    /// events read meanwhile are dropped, so this is only used before the
    /// event reader starts.
    fn current_time(&self) -> Result<Timestamp, SysError> {
        self.conn.change_property8(
            PropMode::APPEND,
            self.time_window,
            self.atoms._MANTLE_TIMESTAMP,
            AtomEnum::STRING,
            &[],
        )?;
        self.conn.flush()?;
        loop {
            match self.conn.wait_for_event()? {
                Event::PropertyNotify(e) if e.window == self.time_window => {
                    trace!(time = e.time, "server time");
                    return Ok(e.time);
                }
                other => trace!(?other, "dropping event while waiting for server time"),
            }
        }
    }

    fn send_startup_message(&self, message: &str) -> Result<(), SysError> {
        for (i, chunk) in chunks(message).into_iter().enumerate() {
            let type_ = if i == 0 {
                self.atoms._NET_STARTUP_INFO_BEGIN
            } else {
                self.atoms._NET_STARTUP_INFO
            };
            let event = ClientMessageEvent::new(8, self.time_window, type_, chunk);
            self.conn.send_event(false, self.root, EventMask::PROPERTY_CHANGE, event)?;
        }
        self.conn.flush()?;
        Ok(())
    }

    fn display_name(&self) -> String { self.display.clone() }

    fn screen_number(&self) -> usize { self.number }

    fn flush(&self) -> Result<(), SysError> {
        self.conn.flush()?;
        Ok(())
    }
}

/// Reads events for one screen and translates them.
pub struct EventReader {
    conn: Arc<RustConnection>,
    root: Window,
    atoms: Atoms,
    selection: Atom,
}

impl EventReader {
    /// Runs the reader on its own thread, handing each translated event to
    /// `sink`. The thread ends when the connection breaks.
    pub fn spawn(
        self,
        sink: impl Fn(SystemEvent) + Send + 'static,
    ) -> std::io::Result<thread::JoinHandle<()>> {
        thread::Builder::new().name("x11-events".to_string()).spawn(move || {
            loop {
                match self.conn.wait_for_event() {
                    Ok(event) => {
                        if let Some(event) = self.translate(event) {
                            sink(event);
                        }
                    }
                    Err(e) => {
                        error!("lost connection to X server: {e}");
                        break;
                    }
                }
            }
        })
    }

    fn translate(&self, event: Event) -> Option<SystemEvent> {
        match event {
            Event::ConfigureNotify(e) if e.window == self.root => {
                Some(SystemEvent::TopologyChanged {
                    width: i32::from(e.width),
                    height: i32::from(e.height),
                })
            }
            Event::RandrScreenChangeNotify(e) if e.root == self.root => {
                Some(SystemEvent::TopologyChanged {
                    width: i32::from(e.width),
                    height: i32::from(e.height),
                })
            }
            Event::PropertyNotify(e) if e.window == self.root => {
                if e.atom == self.atoms._NET_DESKTOP_LAYOUT {
                    Some(SystemEvent::DesktopLayoutChanged)
                } else if e.atom == self.atoms._NET_DESKTOP_NAMES {
                    Some(SystemEvent::DesktopNamesChanged)
                } else {
                    None
                }
            }
            Event::ClientMessage(e) => self.translate_client_message(&e),
            Event::SelectionClear(e) if e.selection == self.selection => {
                Some(SystemEvent::SelectionCleared)
            }
            Event::MapRequest(e) => {
                let hints = self.window_hints(e.window);
                if let Err(e) = self.map(e.window) {
                    warn!("failed to map window: {e}");
                }
                Some(SystemEvent::WindowMapped(hints))
            }
            Event::ConfigureRequest(e) => {
                let aux = ConfigureWindowAux::from_configure_request(&e);
                if let Err(err) = self.conn.configure_window(e.window, &aux) {
                    warn!(window = e.window, "failed to configure window: {err}");
                }
                _ = self.conn.flush();
                None
            }
            Event::DestroyNotify(e) if e.event == self.root => {
                Some(SystemEvent::WindowGone(WindowId(e.window)))
            }
            Event::Error(err) => {
                debug!(?err, "X error");
                None
            }
            _ => None,
        }
    }

    fn translate_client_message(&self, e: &ClientMessageEvent) -> Option<SystemEvent> {
        let atoms = &self.atoms;
        if e.format == 8
            && (e.type_ == atoms._NET_STARTUP_INFO_BEGIN || e.type_ == atoms._NET_STARTUP_INFO)
        {
            return Some(SystemEvent::StartupChunk {
                source: WindowId(e.window),
                begin: e.type_ == atoms._NET_STARTUP_INFO_BEGIN,
                data: e.data.as_data8().to_vec(),
            });
        }
        if e.format != 32 {
            return None;
        }
        let data = e.data.as_data32();
        if e.type_ == atoms._NET_CURRENT_DESKTOP {
            Some(SystemEvent::CurrentDesktopRequested { index: data[0], time: data[1] })
        } else if e.type_ == atoms._NET_NUMBER_OF_DESKTOPS {
            Some(SystemEvent::NumberOfDesktopsRequested(data[0]))
        } else if e.type_ == atoms._NET_SHOWING_DESKTOP {
            Some(SystemEvent::ShowingDesktopRequested {
                show: data[0] != 0,
                time: CURRENT_TIME,
            })
        } else {
            None
        }
    }

    fn window_hints(&self, window: Window) -> WindowHints {
        let (res_name, res_class) = self.wm_class(window).unwrap_or_else(|e| {
            debug!(window, "no WM_CLASS: {e}");
            (None, None)
        });
        let startup_id = self.startup_id(window).unwrap_or_else(|e| {
            debug!(window, "no _NET_STARTUP_ID: {e}");
            None
        });
        WindowHints {
            window: WindowId(window),
            res_name,
            res_class,
            startup_id,
        }
    }

    fn wm_class(&self, window: Window) -> Result<(Option<String>, Option<String>), SysError> {
        let reply = self
            .conn
            .get_property(false, window, AtomEnum::WM_CLASS, AtomEnum::STRING, 0, 256)?
            .reply()?;
        let mut parts = reply
            .value
            .split(|b| *b == 0)
            .filter(|s| !s.is_empty())
            .map(|s| String::from_utf8_lossy(s).into_owned());
        Ok((parts.next(), parts.next()))
    }

    fn startup_id(&self, window: Window) -> Result<Option<String>, SysError> {
        let reply = self
            .conn
            .get_property(
                false,
                window,
                self.atoms._NET_STARTUP_ID,
                self.atoms.UTF8_STRING,
                0,
                MAX_PROPERTY_LEN,
            )?
            .reply()?;
        if reply.value.is_empty() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&reply.value).into_owned()))
    }

    fn map(&self, window: Window) -> Result<(), SysError> {
        self.conn.map_window(window)?;
        self.conn.flush()?;
        Ok(())
    }
}
