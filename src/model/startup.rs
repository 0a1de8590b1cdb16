//! Application launches in progress.
//!
//! A launcher announces a sequence when it starts a program and removes it
//! once the program has mapped a window. Launchers that never send the removal
//! are handled by timing sequences out.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};

use crate::sys::window_system::Timestamp;

pub mod message;

pub use message::{MessageFields, MessageKind, StartupMessage};

/// Sequences inactive for longer than this are completed on their behalf.
pub const STARTUP_TIMEOUT: Duration = Duration::from_millis(15000);

/// How often expired sequences are looked for.
pub const POLL_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartupSequence {
    pub id: String,
    pub name: Option<String>,
    pub wmclass: Option<String>,
    pub workspace: Option<u32>,
    pub timestamp: Option<Timestamp>,
    #[serde(skip)]
    pub last_active: Instant,
}

impl StartupSequence {
    pub fn new(id: impl Into<String>, now: Instant) -> Self {
        Self {
            id: id.into(),
            name: None,
            wmclass: None,
            workspace: None,
            timestamp: None,
            last_active: now,
        }
    }

    pub fn from_fields(id: impl Into<String>, fields: MessageFields, now: Instant) -> Self {
        let mut seq = Self::new(id, now);
        seq.update(fields, now);
        seq
    }

    fn update(&mut self, fields: MessageFields, now: Instant) {
        let MessageFields { name, wmclass, workspace, timestamp, screen: _ } = fields;
        if name.is_some() {
            self.name = name;
        }
        if wmclass.is_some() {
            self.wmclass = wmclass;
        }
        if workspace.is_some() {
            self.workspace = workspace;
        }
        if timestamp.is_some() {
            self.timestamp = timestamp;
        }
        self.last_active = now;
    }

    fn matches_class(&self, res_class: Option<&str>, res_name: Option<&str>) -> bool {
        let Some(wmclass) = self.wmclass.as_deref() else { return false };
        res_class == Some(wmclass) || res_name == Some(wmclass)
    }
}

/// What the owner of the poll timer should do after a tracker call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerChange {
    Start,
    Stop,
}

#[derive(Debug)]
pub struct Completion {
    pub sequence: StartupSequence,
    pub timer: Option<TimerChange>,
}

#[derive(Debug, Default)]
pub struct PollOutcome {
    pub expired: Vec<StartupSequence>,
    pub timer: Option<TimerChange>,
}

#[derive(Debug)]
pub struct StartupSequenceTracker {
    sequences: Vec<StartupSequence>,
    timeout: Duration,
    polling: bool,
}

impl Default for StartupSequenceTracker {
    fn default() -> Self { Self::new(STARTUP_TIMEOUT) }
}

impl StartupSequenceTracker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sequences: Vec::new(),
            timeout,
            polling: false,
        }
    }

    pub fn set_timeout(&mut self, timeout: Duration) { self.timeout = timeout; }

    pub fn len(&self) -> usize { self.sequences.len() }

    pub fn is_empty(&self) -> bool { self.sequences.is_empty() }

    /// Whether the busy indicator should be shown.
    pub fn is_busy(&self) -> bool { !self.sequences.is_empty() }

    pub fn is_polling(&self) -> bool { self.polling }

    pub fn sequences(&self) -> impl Iterator<Item = &StartupSequence> { self.sequences.iter() }

    pub fn find(&self, id: &str) -> Option<&StartupSequence> {
        self.sequences.iter().find(|s| s.id == id)
    }

    /// Starts tracking `seq`. A second `new:` for a known id updates it
    /// instead.
    pub fn on_initiated(&mut self, seq: StartupSequence) -> Option<TimerChange> {
        info!(id = %seq.id, wmclass = ?seq.wmclass, "startup initiated");
        if let Some(existing) = self.sequences.iter_mut().find(|s| s.id == seq.id) {
            *existing = seq;
            return None;
        }
        self.sequences.push(seq);
        self.start_polling()
    }

    pub fn on_changed(&mut self, id: &str, fields: MessageFields, now: Instant) -> bool {
        match self.sequences.iter_mut().find(|s| s.id == id) {
            Some(seq) => {
                debug!(id, "startup changed");
                seq.update(fields, now);
                true
            }
            None => false,
        }
    }

    pub fn on_completed(&mut self, id: &str) -> Option<Completion> {
        let pos = self.sequences.iter().position(|s| s.id == id)?;
        let sequence = self.sequences.remove(pos);
        info!(id, "startup completed");
        Some(Completion { sequence, timer: self.stop_polling_if_idle() })
    }

    pub fn on_canceled(&mut self, id: &str) -> Option<Completion> {
        debug!(id, "startup canceled");
        self.on_completed(id)
    }

    /// One tick of the poll timer: completes every sequence that has been
    /// inactive for longer than the timeout.
    pub fn poll(&mut self, now: Instant) -> PollOutcome {
        let timeout = self.timeout;
        let (expired, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.sequences).into_iter().partition(|seq| {
                let elapsed = now.saturating_duration_since(seq.last_active);
                debug!(id = %seq.id, ?elapsed, ?timeout, "startup sequence age");
                elapsed > timeout
            });
        self.sequences = kept;
        for seq in &expired {
            info!(id = %seq.id, "startup sequence timed out");
        }
        PollOutcome {
            expired,
            timer: self.stop_polling_if_idle(),
        }
    }

    /// Finds the newest sequence whose window class matches a window that
    /// was mapped without a launch id, and completes it.
    pub fn match_unlabeled_window(
        &mut self,
        res_class: Option<&str>,
        res_name: Option<&str>,
    ) -> Option<Completion> {
        let id = self
            .sequences
            .iter()
            .rev()
            .find(|s| s.matches_class(res_class, res_name))
            .map(|s| s.id.clone())?;
        debug!(id, "ending legacy sequence for matching window");
        self.on_completed(&id)
    }

    /// Drops every sequence.
    pub fn clear(&mut self) -> Option<TimerChange> {
        self.sequences.clear();
        self.stop_polling_if_idle()
    }

    fn start_polling(&mut self) -> Option<TimerChange> {
        if self.polling {
            return None;
        }
        self.polling = true;
        Some(TimerChange::Start)
    }

    fn stop_polling_if_idle(&mut self) -> Option<TimerChange> {
        if !self.sequences.is_empty() || !self.polling {
            return None;
        }
        self.polling = false;
        Some(TimerChange::Stop)
    }
}
