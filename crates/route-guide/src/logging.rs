/*!
Logging and profiling setup for the route guide driver.

Two implementations share one API:

- real: compiled only when `feature = "profiling"` is set. Adds a tracing-chrome layer
  writing a trace file next to the working directory, flushed when the returned guard
  is dropped.
- stub: compiled in all other configurations. Logging only.

Top-level API (always available):
- `setup_logging() -> LoggingGuard`
*/

/// Default filter when `RUST_LOG` is not set
const DEFAULT_FILTER: &str = "info,route_guide_lib=info";

fn ensure_default_filter() {
    if std::env::var("RUST_LOG").is_err() {
        // Safety: single-threaded at startup
        unsafe {
            std::env::set_var("RUST_LOG", DEFAULT_FILTER);
        }
    }
}

#[cfg(feature = "profiling")]
mod inner {
    use tracing_chrome::{ChromeLayerBuilder, FlushGuard};
    use tracing_subscriber::prelude::*;

    /// Keeps the trace file open until dropped
    pub struct LoggingGuard {
        _flush: FlushGuard,
    }

    /// Initialize logging plus a chrome trace layer.
    pub fn setup_logging() -> LoggingGuard {
        use tracing_subscriber::EnvFilter;
        use tracing_subscriber::fmt;

        super::ensure_default_filter();

        let trace_file = std::env::current_dir()
            .unwrap_or_default()
            .join(format!("route-guide-trace-{}.json", std::process::id()));
        let (chrome_layer, flush) = ChromeLayerBuilder::new()
            .file(trace_file.clone())
            .include_args(true)
            .build();

        let fmt_layer = fmt::layer().with_filter(EnvFilter::from_default_env());
        tracing_subscriber::registry()
            .with(chrome_layer)
            .with(fmt_layer)
            .init();

        tracing::info!("Logging initialized, recording trace to {}", trace_file.display());
        LoggingGuard { _flush: flush }
    }
}

#[cfg(not(feature = "profiling"))]
mod inner {
    use tracing_subscriber::prelude::*;

    /// Nothing to flush without profiling
    pub struct LoggingGuard;

    /// Initialize logging with sensible defaults; profiling is a no-op here.
    pub fn setup_logging() -> LoggingGuard {
        use tracing_subscriber::EnvFilter;
        use tracing_subscriber::fmt;

        super::ensure_default_filter();

        let fmt_layer = fmt::layer().with_filter(EnvFilter::from_default_env());
        tracing_subscriber::registry().with(fmt_layer).init();

        tracing::info!("Logging initialized (profiling disabled in this build)");
        LoggingGuard
    }
}

// Re-export a stable API surface regardless of which `inner` module was compiled.
pub use inner::{LoggingGuard, setup_logging};
