//! The `WM_S<n>` manager selection handshake.
//!
//! Only one client may own the selection for a screen. Taking it over from a
//! running manager means announcing ourselves and then waiting for the old
//! owner's token window to disappear, so that it has let go of the root
//! window before we start managing it.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::actor::screen::error::SelectionError;
use crate::sys::window_system::{SysError, Timestamp, WindowId, WindowSystem};

/// Blocks the control thread. Tests substitute one that only records.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) { std::thread::sleep(duration) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub poll_interval: Duration,
    /// Extra delay once the old owner is gone, giving it time to finish
    /// releasing its resources.
    pub settle: Duration,
    /// `None` waits as long as the old owner takes.
    pub timeout: Option<Duration>,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            settle: Duration::from_secs(3),
            timeout: None,
        }
    }
}

/// What happened to the manager we replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviousOwner {
    None,
    Exited,
    /// Its lifetime could not be watched, so we did not wait.
    Untracked,
    /// The bounded wait ran out. We own the selection regardless.
    StillRunning,
}

pub fn selection_name(screen: usize) -> String { format!("WM_S{screen}") }

/// A held manager selection. Releasing it also destroys the token window.
#[derive(Debug)]
pub struct ManagerSelection {
    name: String,
    window: WindowId,
    timestamp: Timestamp,
    released: bool,
}

impl ManagerSelection {
    pub fn name(&self) -> &str { &self.name }

    pub fn window(&self) -> WindowId { self.window }

    pub fn timestamp(&self) -> Timestamp { self.timestamp }

    pub fn is_released(&self) -> bool { self.released }

    /// Gives up the selection if we still hold it. Calling this more than once
    /// is a no-op.
    pub fn release<S: WindowSystem>(&mut self, sys: &S) -> Result<(), SysError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        if sys.selection_owner(&self.name)? == Some(self.window) {
            sys.set_selection_owner(&self.name, None, self.timestamp)?;
        } else {
            debug!(selection = %self.name, "selection already taken by someone else");
        }
        sys.destroy_window(self.window)?;
        sys.flush()
    }
}

#[derive(Debug)]
pub struct Acquired {
    pub selection: ManagerSelection,
    pub previous: PreviousOwner,
}

pub struct SelectionProtocol<Z> {
    sleeper: Z,
    policy: WaitPolicy,
}

impl SelectionProtocol<ThreadSleeper> {
    pub fn new() -> Self { Self::with_sleeper(ThreadSleeper, WaitPolicy::default()) }
}

impl Default for SelectionProtocol<ThreadSleeper> {
    fn default() -> Self { Self::new() }
}

impl<Z: Sleeper> SelectionProtocol<Z> {
    pub fn with_sleeper(sleeper: Z, policy: WaitPolicy) -> Self { Self { sleeper, policy } }

    /// Takes ownership of `selection`. Not reentrant: only one acquisition
    /// may be in flight per display.
    pub fn acquire<S: WindowSystem>(
        &self,
        sys: &S,
        selection: &str,
        replace: bool,
        timestamp: Timestamp,
    ) -> Result<Acquired, SelectionError> {
        let mut old_owner = sys.selection_owner(selection)?;
        let mut previous = PreviousOwner::None;

        if let Some(owner) = old_owner {
            if !replace {
                return Err(SelectionError::AlreadyOwned { selection: selection.to_string() });
            }
            info!(selection, ?owner, "replacing current manager");
            if let Err(e) = sys.watch_for_destroy(owner) {
                warn!(?owner, "cannot watch old manager, not waiting for it: {e}");
                old_owner = None;
                previous = PreviousOwner::Untracked;
            }
        }

        let window = sys.create_token_window()?;
        if let Err(e) = claim(sys, selection, window, timestamp) {
            if let Err(destroy) = sys.destroy_window(window) {
                warn!(?window, "failed to destroy token window: {destroy}");
            }
            return Err(e);
        }

        sys.announce_manager(selection, window, timestamp)?;
        sys.flush()?;

        if let Some(owner) = old_owner {
            previous = self.wait_for_exit(sys, owner);
        }

        debug!(selection, ?window, ?previous, "acquired manager selection");
        Ok(Acquired {
            selection: ManagerSelection {
                name: selection.to_string(),
                window,
                timestamp,
                released: false,
            },
            previous,
        })
    }

    fn wait_for_exit<S: WindowSystem>(&self, sys: &S, owner: WindowId) -> PreviousOwner {
        info!(?owner, "waiting for old window manager to exit");
        let mut waited = Duration::ZERO;
        loop {
            match sys.poll_destroyed(owner) {
                Ok(true) => break,
                Ok(false) => {}
                Err(e) => {
                    warn!(?owner, "lost track of old window manager: {e}");
                    return PreviousOwner::Untracked;
                }
            }
            if let Some(timeout) = self.policy.timeout
                && waited >= timeout
            {
                warn!(?owner, ?waited, "old window manager did not exit in time");
                return PreviousOwner::StillRunning;
            }
            self.sleeper.sleep(self.policy.poll_interval);
            waited += self.policy.poll_interval;
        }
        self.sleeper.sleep(self.policy.settle);
        PreviousOwner::Exited
    }
}

/// Assigns `selection` to `window` and checks that nobody beat us to it.
fn claim<S: WindowSystem>(
    sys: &S,
    selection: &str,
    window: WindowId,
    timestamp: Timestamp,
) -> Result<(), SelectionError> {
    sys.set_selection_owner(selection, Some(window), timestamp)?;
    if sys.selection_owner(selection)? != Some(window) {
        return Err(SelectionError::RaceLost { selection: selection.to_string() });
    }
    Ok(())
}
