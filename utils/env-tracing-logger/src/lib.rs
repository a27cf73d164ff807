//! Tracing setup shared by the motion analysis binaries.
//!
//! Verbosity comes from `RUST_LOG`. When it is unset or cannot be parsed,
//! [`LogOptions::default_directive`] is used instead.
use std::path::PathBuf;

use time::{UtcOffset, format_description::well_known::Iso8601};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, time::OffsetTime},
    layer::SubscriberExt,
};

pub type Error = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Keeps logging alive. Hold it until the end of `main`.
#[must_use]
pub struct Guard {
    log_file: Option<PathBuf>,
}

impl Drop for Guard {
    fn drop(&mut self) {
        if let Some(path) = &self.log_file {
            tracing::trace!("closing log file {}", path.display());
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Also write log lines, without colors, to this file.
    pub log_file: Option<PathBuf>,
    pub disable_console: bool,
    pub default_directive: String,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            log_file: None,
            disable_console: false,
            default_directive: "info".into(),
        }
    }
}

impl LogOptions {
    pub fn with_log_file<P: Into<PathBuf>>(self, path: P) -> Self {
        Self {
            log_file: Some(path.into()),
            ..self
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_directive))
    }
}

/// Install the global subscriber for console and optional file output.
pub fn initiate_logging(opts: &LogOptions) -> Result<Guard, Error> {
    // Fixed offset from the local timezone at startup.
    let timer = OffsetTime::new(
        UtcOffset::from_whole_seconds(chrono::Local::now().offset().local_minus_utc())?,
        Iso8601::DEFAULT,
    );

    let file_layer = match &opts.log_file {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            Some(
                fmt::layer()
                    .with_timer(timer.clone())
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false)
                    .with_file(true)
                    .with_line_number(true),
            )
        }
        None => None,
    };

    let console_layer = (!opts.disable_console).then(|| {
        fmt::layer()
            .with_timer(timer)
            .with_writer(std::io::stderr)
            .with_ansi(!cfg!(windows))
            .with_target(false)
    });

    let collector = tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .with(opts.env_filter());
    tracing::subscriber::set_global_default(collector)?;

    if let Some(path) = &opts.log_file {
        tracing::debug!("logging to file \"{}\"", path.display());
    }

    Ok(Guard {
        log_file: opts.log_file.clone(),
    })
}
