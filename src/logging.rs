use std::sync::OnceLock;
use tracing::Level;
use tracing_subscriber::fmt::SubscriberBuilder;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "RADON_LOG";

static INIT: OnceLock<()> = OnceLock::new();

/// Installs the stderr subscriber. `RADON_LOG` takes filter directives;
/// each `-v` raises the default level one step above `warn`.
pub fn init(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    INIT.get_or_init(|| {
        let filter = EnvFilter::builder()
            .with_default_directive(level.into())
            .with_env_var(LOG_ENV)
            .from_env_lossy();
        SubscriberBuilder::default()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .compact()
            .init();
    });
    tracing::debug!(?level, "tracing initialised");
}
