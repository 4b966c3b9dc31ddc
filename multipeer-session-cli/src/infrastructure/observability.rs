use crate::infrastructure::error::{CliError, Result};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const CRATES: [&str; 3] = [
    "multipeer_session_cli",
    "multipeer_session_p2p",
    "multipeer_session_core",
];

/// Logging configuration
///
/// Logs always go to stderr so the bridge can own stdout.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub default_level: tracing::Level,
    pub show_targets: bool,
    pub show_thread_ids: bool,
    pub show_logs: bool,
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: tracing::Level::INFO,
            show_targets: true,
            show_thread_ids: false,
            show_logs: true,
            ansi: true,
        }
    }
}

impl LogConfig {
    /// Development configuration (verbose, human-readable)
    pub fn dev() -> Self {
        Self {
            default_level: tracing::Level::DEBUG,
            show_thread_ids: true,
            ..Default::default()
        }
    }

    /// Only warnings and errors, no colors (for piping)
    pub fn quiet() -> Self {
        Self {
            default_level: tracing::Level::WARN,
            ansi: false,
            ..Default::default()
        }
    }

    /// Map a `-v` count onto a level: 0 = info, 1 = debug, 2+ = trace
    pub fn from_verbosity(verbose: u8) -> Self {
        match verbose {
            0 => Self::default(),
            1 => Self::dev(),
            _ => Self {
                default_level: tracing::Level::TRACE,
                ..Self::dev()
            },
        }
    }

    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.default_level = level;
        self
    }

    /// Hide logs entirely
    pub fn without_logs(mut self) -> Self {
        self.show_logs = false;
        self
    }

    /// Filter directives used when `RUST_LOG` is not set
    pub fn directives(&self) -> String {
        let level = self.default_level.to_string().to_lowercase();
        CRATES
            .iter()
            .map(|krate| format!("{krate}={level}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn init(self) -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.directives()));

        if self.show_logs {
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(self.ansi)
                .with_target(self.show_targets)
                .with_thread_ids(self.show_thread_ids);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()
                .map_err(|e| CliError::Logging(e.to_string()))
        } else {
            tracing_subscriber::registry()
                .with(env_filter)
                .try_init()
                .map_err(|e| CliError::Logging(e.to_string()))
        }
    }
}
