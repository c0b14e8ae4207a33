//! Log output setup.
//!
//! Logs go to stderr so stdout stays clean for reports and `--json` output.

use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber. `RUST_LOG` wins over `verbose`.
pub fn init(verbose: bool) {
    let default_directives = if verbose {
        "calwatch=debug,calwatch_core=debug"
    } else {
        "calwatch=info,calwatch_core=info"
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    // A second call (e.g. from tests) leaves the first subscriber in place
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
