use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use notify::{Config as NotifyConfig, Event, EventKind, PollWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::actor::screen;
use crate::common::config::Config;

/// Re-reads the preference file whenever it changes and hands the result to
/// the screen controller. A file that fails to parse is reported and skipped,
/// leaving the running preferences in place.
pub struct ConfigWatcher {
    file: PathBuf,
    events_tx: screen::Sender,
}

impl ConfigWatcher {
    pub fn new(file: PathBuf, events_tx: screen::Sender) -> Self { ConfigWatcher { file, events_tx } }

    pub fn spawn(self) -> std::io::Result<thread::JoinHandle<()>> {
        thread::Builder::new().name("config-watcher".to_string()).spawn(move || {
            if let Err(e) = self.run() {
                warn!("config-watcher: error: {e:?}");
            }
        })
    }

    fn run(self) -> notify::Result<()> {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<notify::Result<Event>>();

        let mut watcher = PollWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            NotifyConfig::default()
                .with_poll_interval(Duration::from_secs(1))
                .with_compare_contents(true),
        )?;

        watcher.watch(&self.file, RecursiveMode::NonRecursive)?;

        info!("watching {:?}", self.file);

        loop {
            match rx.blocking_recv() {
                Some(Ok(event)) => {
                    if self.is_relevant(&event) {
                        debug!("change detected: {:?}", event.kind);
                        self.reload();
                    } else {
                        debug!("ignoring unrelated event: {:?}", event.kind);
                    }
                }
                Some(Err(e)) => {
                    warn!("watch error: {e:?}");
                }
                None => {
                    warn!("channel closed, exiting");
                    break;
                }
            }
        }

        Ok(())
    }

    fn is_relevant(&self, event: &Event) -> bool {
        match event.kind {
            EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_) => event
                .paths
                .iter()
                .any(|p| p == &self.file || p.file_name() == self.file.file_name()),
            _ => false,
        }
    }

    fn reload(&self) {
        match self.read() {
            Some(config) => {
                info!("preferences reloaded");
                self.events_tx.send(screen::Event::ConfigUpdated(config));
            }
            None => debug!("keeping current preferences"),
        }
    }

    /// The preferences as currently on disk, repaired where possible. A
    /// deleted file means defaults.
    fn read(&self) -> Option<Config> {
        let mut config = match Config::load(&self.file) {
            Ok(config) => config,
            Err(e) => {
                warn!("cannot reload {}: {e:#}", self.file.display());
                return None;
            }
        };
        for issue in config.validate() {
            warn!("config: {issue}");
        }
        let fixes = config.auto_fix_values();
        if fixes > 0 {
            warn!(fixes, "repaired invalid preference values");
        }
        Some(config)
    }
}
