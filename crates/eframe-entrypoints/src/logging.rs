//! Logging and optional trace capture
//!
//! Console output goes through `tracing-subscriber` with an [`EnvFilter`];
//! `RUST_LOG` overrides the defaults below. With the `profiling` feature,
//! setting `CHROME_TRACE=<path>` additionally records a Chrome trace
//! (open it in Perfetto) until the returned guard drops.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

const DEBUG_FILTER: &str = "debug,eframe::native=warn,egui::context=warn,walkers=info,hyper_util=info,reqwest::connect=info";
const RELEASE_FILTER: &str = "info,eframe::native=warn,egui::context=warn";

/// Keeps trace capture alive; flushes the trace file on drop
#[must_use = "dropping the guard stops trace capture"]
pub struct LoggingGuard {
    #[cfg(feature = "profiling")]
    _chrome: Option<tracing_chrome::FlushGuard>,
}

/// Filter used when `RUST_LOG` is unset
pub fn default_filter() -> &'static str {
    if cfg!(debug_assertions) {
        DEBUG_FILTER
    } else {
        RELEASE_FILTER
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter()))
}

/// Install the global subscriber. Calling it twice keeps the first one.
pub fn setup_logging() -> LoggingGuard {
    let fmt_layer = tracing_subscriber::fmt::layer().with_filter(env_filter());

    #[cfg(feature = "profiling")]
    {
        let (chrome_layer, chrome_guard) = match crate::cli::get_env::<String>("CHROME_TRACE") {
            Some(path) => {
                let (layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
                    .file(path)
                    .include_args(true)
                    .build();
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };
        let installed = tracing_subscriber::registry()
            .with(chrome_layer)
            .with(fmt_layer)
            .try_init()
            .is_ok();
        if installed && chrome_guard.is_some() {
            tracing::info!("Recording Chrome trace");
        }
        LoggingGuard {
            _chrome: chrome_guard,
        }
    }

    #[cfg(not(feature = "profiling"))]
    {
        if tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .is_err()
        {
            tracing::debug!("Global subscriber already installed");
        }
        LoggingGuard {}
    }
}
