use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use mantle_wm::actor::broadcast::BroadcastReceiver;
use mantle_wm::actor::config_watcher::ConfigWatcher;
use mantle_wm::actor::screen::selection::SelectionProtocol;
use mantle_wm::actor::screen::{self, ScreenController, ScreenSession};
use mantle_wm::common::config::{Config, config_file};
use mantle_wm::common::log;
use tokio::join;
use tracing::{info, warn};

#[derive(Parser)]
#[command(version, about = "Manages one screen of an X display")]
struct Cli {
    /// Take over from a window manager that is already running.
    #[arg(long)]
    replace: bool,

    /// X display to connect to. Defaults to $DISPLAY.
    #[arg(long)]
    display: Option<String>,

    /// Screen number to manage. Defaults to the display's default screen.
    #[arg(long)]
    screen: Option<usize>,

    /// Preference file to use instead of the one in the config directory.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print shell notifications to stdout as JSON lines.
    #[arg(long)]
    print_events: bool,

    /// Check the preference file and exit.
    #[arg(long)]
    check_config: bool,
}

fn main() -> anyhow::Result<()> {
    let opt: Cli = Parser::parse();

    if std::env::var_os("RUST_BACKTRACE").is_none() {
        // SAFETY: We are single threaded at this point.
        unsafe { std::env::set_var("RUST_BACKTRACE", "1") };
    }
    log::init_logging();
    install_panic_hook();

    let path = opt.config.clone().unwrap_or_else(config_file);
    let mut config =
        Config::load(&path).with_context(|| format!("reading {}", path.display()))?;

    let issues = config.validate();
    if opt.check_config {
        if issues.is_empty() {
            println!("{}: ok", path.display());
            return Ok(());
        }
        for issue in &issues {
            eprintln!("{}: {issue}", path.display());
        }
        bail!("{} problem(s) found", issues.len());
    }
    for issue in &issues {
        warn!("config: {issue}");
    }
    let fixes = config.auto_fix_values();
    if fixes > 0 {
        warn!(fixes, "repaired invalid preference values");
    }
    config.settings.replace |= opt.replace;

    let sys = screen::open(opt.display.as_deref(), opt.screen)
        .context("cannot open the display")?;
    let reader = sys.event_reader().context("cannot read display events")?;

    let (broadcast_tx, broadcast_rx) = mantle_wm::actor::channel();
    let broadcast = opt.print_events.then_some(broadcast_tx);
    let session = ScreenSession::new(sys, &SelectionProtocol::new(), config, broadcast)
        .context("cannot manage the screen")?;
    info!(screen = session.name(), "ready");

    let (controller, events_tx) = ScreenController::new(session);
    let system_tx = events_tx.clone();
    reader
        .spawn(move |event| system_tx.send(screen::Event::System(event)))
        .context("cannot start the event reader")?;
    ConfigWatcher::new(path, events_tx).spawn().context("cannot watch preferences")?;

    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("cannot start the runtime")?
        .block_on(async move {
            join!(controller.run(), print_events(broadcast_rx));
        });
    Ok(())
}

async fn print_events(mut rx: BroadcastReceiver) {
    while let Some((_span, event)) = rx.recv().await {
        match serde_json::to_string(&event) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!("cannot encode {event:?}: {e}"),
        }
    }
}

#[cfg(panic = "unwind")]
fn install_panic_hook() {
    // Abort on panic instead of propagating panics to the main thread.
    // See Cargo.toml for why we don't use panic=abort everywhere.
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        original_hook(info);
        std::process::abort();
    }));
}

#[cfg(not(panic = "unwind"))]
fn install_panic_hook() {}
