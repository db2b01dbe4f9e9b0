//! Log setup. Logs go to stderr; stdout is the event channel.

use tabhost_config::schema::LoggingConfig;
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

const FALLBACK_DIRECTIVE: &str = "tabhost=info";

/// Used while the config file is still being read.
const BOOTSTRAP_DIRECTIVE: &str = "tabhost=warn";

/// `RUST_LOG` first, then the command line, then the config file.
pub fn filter(cli_level: Option<&str>, config: &LoggingConfig) -> EnvFilter {
    resolve(cli_level, config.level.directive())
}

/// Filter for [`bootstrap`]: like [`filter`], with warnings as the default.
pub fn bootstrap_filter(cli_level: Option<&str>) -> EnvFilter {
    resolve(cli_level, BOOTSTRAP_DIRECTIVE)
}

fn resolve(cli_level: Option<&str>, default: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let directive = cli_level.unwrap_or(default);
    EnvFilter::try_new(directive).unwrap_or_else(|e| {
        eprintln!("invalid log filter {directive:?}: {e}");
        EnvFilter::new(FALLBACK_DIRECTIVE)
    })
}

/// Subscriber to scope around config loading with
/// `tracing::subscriber::with_default`, so loader warnings are not lost.
pub fn bootstrap<W>(cli_level: Option<&str>, writer: W) -> impl Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(bootstrap_filter(cli_level))
        .with_writer(writer)
        .finish()
}

pub fn init(cli_level: Option<&str>, config: &LoggingConfig) {
    tracing_subscriber::fmt()
        .with_env_filter(filter(cli_level, config))
        .with_writer(std::io::stderr)
        .init();
}
