//! The screen controller owns the [`ScreenSession`] for one screen and feeds
//! it everything that happens: display server events, preference changes and
//! commands from the shell. It also drives the session's timers.

use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::actor;
use crate::common::config::Config;
use crate::model::Struts;
use crate::sys::window_system::{CURRENT_TIME, SystemEvent, WindowSystem};
use crate::sys::x11::{X11Display, X11System};

pub mod display_topology;
pub mod error;
pub mod hints;
pub mod selection;
pub mod session;

pub use error::{ScreenError, SelectionError};
pub use session::ScreenSession;

/// How long to sleep when no timer is pending.
const IDLE_WAKEUP: Duration = Duration::from_secs(60);

/// Connects to `display` and picks screen `screen`, or the display's default.
pub fn open(display: Option<&str>, screen: Option<usize>) -> Result<X11System, ScreenError> {
    let display = X11Display::connect(display)?;
    let number = screen.unwrap_or(display.default_screen());
    if number >= display.screen_count() {
        return Err(ScreenError::InvalidScreen(number));
    }
    Ok(display.into_screen(number)?)
}

pub type Sender = actor::Sender<Event>;
pub type Receiver = actor::Receiver<Event>;

#[derive(Debug)]
pub enum Event {
    System(SystemEvent),
    ConfigUpdated(Config),
    Command(ScreenCommand),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScreenCommand {
    NewWorkspace,
    RemoveWorkspace(usize),
    ReorderWorkspace { from: usize, to: usize },
    ActivateWorkspace(usize),
    SetStruts { workspace: usize, struts: Struts },
    QueueTilePreview { delay: bool },
    CancelTilePreview,
    Quit,
}

pub struct ScreenController<S: WindowSystem> {
    session: ScreenSession<S>,
    receiver: Receiver,
}

impl<S: WindowSystem> ScreenController<S> {
    pub fn new(session: ScreenSession<S>) -> (Self, Sender) {
        let (sender, receiver) = actor::channel();
        (ScreenController { session, receiver }, sender)
    }

    pub fn with_receiver(session: ScreenSession<S>, receiver: Receiver) -> Self {
        ScreenController { session, receiver }
    }

    pub fn session(&self) -> &ScreenSession<S> { &self.session }

    pub async fn run(mut self) {
        loop {
            self.session.dispatch_due(Instant::now());
            let now = Instant::now();
            let deadline = self.session.next_wakeup(now).unwrap_or(now + IDLE_WAKEUP);

            tokio::select! {
                biased;
                msg = self.receiver.recv() => {
                    let Some((span, event)) = msg else {
                        debug!("all senders gone");
                        break;
                    };
                    let _guard = span.enter();
                    if self.handle_event(event, Instant::now()).is_break() {
                        break;
                    }
                }
                _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => {}
            }
        }
        self.session.close();
    }

    #[instrument(name = "screen::handle_event", skip(self, now))]
    pub fn handle_event(&mut self, event: Event, now: Instant) -> ControlFlow<()> {
        match event {
            Event::System(event) => return self.handle_system_event(event, now),
            Event::ConfigUpdated(config) => self.session.apply_config(config, now),
            Event::Command(command) => return self.handle_command(command, now),
        }
        ControlFlow::Continue(())
    }

    fn handle_system_event(&mut self, event: SystemEvent, now: Instant) -> ControlFlow<()> {
        let session = &mut self.session;
        match event {
            SystemEvent::TopologyChanged { width, height } => {
                session.on_topology_changed(width, height);
            }
            SystemEvent::DesktopLayoutChanged => {
                session.on_desktop_layout_changed();
            }
            SystemEvent::DesktopNamesChanged => {
                session.on_desktop_names_changed();
            }
            SystemEvent::StartupChunk { source, begin, data } => {
                session.on_startup_chunk(source, begin, &data, now);
            }
            SystemEvent::SelectionCleared => {
                info!("another window manager took over, exiting");
                return ControlFlow::Break(());
            }
            SystemEvent::CurrentDesktopRequested { index, time } => {
                if let Err(e) = session.activate_workspace(index as usize, time) {
                    warn!(index, "ignoring desktop switch request: {e}");
                }
            }
            SystemEvent::NumberOfDesktopsRequested(count) => {
                session.update_num_workspaces(count as usize);
            }
            SystemEvent::ShowingDesktopRequested { show, time } => {
                if show {
                    session.show_desktop(time);
                } else {
                    session.unshow_desktop();
                }
            }
            SystemEvent::WindowMapped(hints) => {
                session.add_window(hints, now);
            }
            SystemEvent::WindowGone(window) => session.remove_window(window),
        }
        ControlFlow::Continue(())
    }

    fn handle_command(&mut self, command: ScreenCommand, now: Instant) -> ControlFlow<()> {
        let session = &mut self.session;
        let result = match command {
            ScreenCommand::NewWorkspace => {
                session.new_workspace();
                Ok(())
            }
            ScreenCommand::RemoveWorkspace(index) => session.remove_workspace(index, CURRENT_TIME),
            ScreenCommand::ReorderWorkspace { from, to } => session.reorder_workspace(from, to),
            ScreenCommand::ActivateWorkspace(index) => {
                session.activate_workspace(index, CURRENT_TIME)
            }
            ScreenCommand::SetStruts { workspace, struts } => {
                session.set_struts(workspace, struts)
            }
            ScreenCommand::QueueTilePreview { delay } => {
                session.queue_tile_preview(delay, now);
                Ok(())
            }
            ScreenCommand::CancelTilePreview => {
                session.cancel_tile_preview();
                Ok(())
            }
            ScreenCommand::Quit => return ControlFlow::Break(()),
        };
        if let Err(e) = result {
            warn!("command failed: {e}");
        }
        ControlFlow::Continue(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;
    use crate::actor::screen::selection::tests::RecordingSleeper;
    use crate::actor::screen::selection::{SelectionProtocol, WaitPolicy};
    use crate::sys::fake::{FakeServer, FakeSystem};
    use crate::sys::window_system::{HintKey, PropertyValue, WindowHints, WindowId};

    fn controller(server: &FakeServer) -> ScreenController<FakeSystem> {
        let sleeper = RecordingSleeper::default();
        let protocol = SelectionProtocol::with_sleeper(&sleeper, WaitPolicy::default());
        let session =
            ScreenSession::new(FakeSystem::connect(server), &protocol, Config::default(), None)
                .unwrap();
        ScreenController::new(session).0
    }

    #[test]
    fn pager_requests_reach_the_session() {
        let server = FakeServer::new(1280, 800);
        let mut c = controller(&server);
        let now = Instant::now();

        let flow = c.handle_event(
            Event::System(SystemEvent::CurrentDesktopRequested { index: 2, time: 5 }),
            now,
        );
        assert_eq!(flow, ControlFlow::Continue(()));
        assert_eq!(c.session().active_workspace_index(), 2);

        c.handle_event(Event::System(SystemEvent::CurrentDesktopRequested { index: 40, time: 6 }), now);
        assert_eq!(c.session().active_workspace_index(), 2);

        c.handle_event(Event::System(SystemEvent::NumberOfDesktopsRequested(6)), now);
        assert_eq!(server.cardinals(HintKey::NumberOfDesktops), Some(vec![6]));

        c.handle_event(Event::System(SystemEvent::ShowingDesktopRequested { show: true, time: 7 }), now);
        assert_eq!(server.cardinals(HintKey::ShowingDesktop), Some(vec![1]));
    }

    #[test]
    fn desktop_count_requests_are_clamped() {
        let server = FakeServer::new(1280, 800);
        let mut c = controller(&server);
        c.handle_event(
            Event::System(SystemEvent::NumberOfDesktopsRequested(u32::MAX)),
            Instant::now(),
        );
        assert_eq!(c.session().workspace_count(), 32);
        assert_eq!(server.cardinals(HintKey::NumberOfDesktops), Some(vec![32]));
    }

    #[test]
    fn windows_and_commands() {
        let server = FakeServer::new(1280, 800);
        let mut c = controller(&server);
        let now = Instant::now();

        c.handle_event(
            Event::System(SystemEvent::WindowMapped(WindowHints {
                window: WindowId(3),
                ..WindowHints::default()
            })),
            now,
        );
        assert_eq!(c.session().workspace_of_window(WindowId(3)), Some(0));
        c.handle_event(Event::System(SystemEvent::WindowGone(WindowId(3))), now);
        assert_eq!(c.session().workspace_of_window(WindowId(3)), None);

        c.handle_event(Event::Command(ScreenCommand::NewWorkspace), now);
        c.handle_event(Event::Command(ScreenCommand::RemoveWorkspace(99)), now);
        assert_eq!(c.session().workspace_count(), 5);

        c.handle_event(
            Event::Command(ScreenCommand::SetStruts {
                workspace: 0,
                struts: Struts { bottom: 30, ..Struts::default() },
            }),
            now,
        );
        c.session.dispatch_due(now);
        let areas = server.cardinals(HintKey::Workarea).unwrap();
        assert_eq!(&areas[0..4], &[0, 0, 1280, 770]);
    }

    #[test]
    fn losing_the_selection_stops_the_controller() {
        let server = FakeServer::new(1280, 800);
        let mut c = controller(&server);
        let flow = c.handle_event(Event::System(SystemEvent::SelectionCleared), Instant::now());
        assert_eq!(flow, ControlFlow::Break(()));
        assert_eq!(
            c.handle_event(Event::Command(ScreenCommand::Quit), Instant::now()),
            ControlFlow::Break(())
        );
    }

    #[test]
    fn config_updates_are_applied() {
        let server = FakeServer::new(1280, 800);
        let mut c = controller(&server);
        let mut config = Config::default();
        config.workspaces.names = vec!["main".into()];
        c.handle_event(Event::ConfigUpdated(config), Instant::now());
        assert_eq!(
            server.property(HintKey::DesktopNames),
            Some(PropertyValue::Utf8List(vec![
                "main".into(),
                "Workspace 2".into(),
                "Workspace 3".into(),
                "Workspace 4".into(),
            ]))
        );
    }

    #[test]
    fn run_exits_and_tears_down_when_told_to_quit() {
        let server = FakeServer::new(1280, 800);
        let c = controller(&server);
        let token = c.session().selection_window();
        let (tx, rx) = actor::channel();
        let c = ScreenController::with_receiver(c.session, rx);
        tx.send(Event::Command(ScreenCommand::Quit));

        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap()
            .block_on(c.run());
        assert!(!server.is_live(token));
        assert_eq!(server.owner("WM_S0"), None);
    }

    #[test]
    fn commands_parse_from_json() {
        let cmd: ScreenCommand =
            serde_json::from_str(r#"{"reorder_workspace":{"from":1,"to":0}}"#).unwrap();
        assert_eq!(cmd, ScreenCommand::ReorderWorkspace { from: 1, to: 0 });
        let cmd: ScreenCommand = serde_json::from_str(r#""new_workspace""#).unwrap();
        assert_eq!(cmd, ScreenCommand::NewWorkspace);
    }
}
