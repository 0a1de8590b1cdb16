use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_tree::HierarchicalLayer;

/// Environment variable holding the log filter, e.g. `MANTLE_LOG=mantle_wm=debug`.
pub const LOG_ENV: &str = "MANTLE_LOG";

pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(HierarchicalLayer::new(2).with_targets(true).with_bracketed_fields(true));
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("logging already initialised: {e}");
    }
}
