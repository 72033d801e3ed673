//! Tracing initialization for the CLI and embedding applications.

use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

static INIT: OnceLock<()> = OnceLock::new();

/// Options for tracing initialization.
#[derive(Debug, Clone, Copy, Default)]
pub struct InitOptions {
    /// Whether verbose output was requested via CLI.
    pub verbose: bool,
    /// Emit logs as JSON lines instead of human-readable text.
    pub json: bool,
}

/// Initializes the global tracing subscriber.
///
/// Filter resolution: `RUST_LOG` when set, otherwise `debug` with `verbose`
/// and `warn` without. Logs go to stderr so CLI output on stdout stays
/// machine-readable. Safe to call more than once; only the first call
/// installs a subscriber.
pub fn init(options: InitOptions) {
    INIT.get_or_init(|| {
        let default_directive = if options.verbose { "debug" } else { "warn" };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive));

        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr);

        // try_init rather than init: a test harness may have installed a
        // subscriber already.
        if options.json {
            let _ = builder.json().try_init();
        } else {
            let _ = builder.try_init();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init(InitOptions::default());
        init(InitOptions {
            verbose: true,
            json: true,
        });
    }
}
