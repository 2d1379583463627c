use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};
use tracing_tree::HierarchicalLayer;

/// Installs the global subscriber.
///
/// The filter comes from `RUST_LOG` and falls back to `info`. Spans are
/// rendered as an indented tree so that everything logged while handling one
/// event is grouped under that event.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let tree = HierarchicalLayer::default()
        .with_indent_amount(2)
        .with_indent_lines(true)
        .with_targets(true)
        .with_deferred_spans(true);
    if let Err(err) = Registry::default().with(filter).with(tree).try_init() {
        eprintln!("logging already initialised: {err}");
    }
}
