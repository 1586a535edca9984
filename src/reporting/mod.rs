//! Experiment reporting
//!
//! A [`Reporter`] is created per experiment. It routes messages either through `tracing`
//! ([`ReportingType::Logging`]) or as plain stdout lines ([`ReportingType::Standard`]), and
//! mirrors them into the experiment's heartbeat file while it runs.
//!
//! ```text
//! Logging:  info!/debug!/warn!  ──> scoped Registry ──┬─> stdout fmt layer
//!                                                    └─> heartbeat fmt layer (tracing-appender)
//! Standard: println!  ───────────────────────────────────> heartbeat file
//! ```

mod format;
mod optimization;

pub use format::{
    add_time_to_content, format_evaluation_results, format_float, format_fold_run, now_time,
    parse_float_format, BlockFormat, BlockItem, FoldRunMode, DEFAULT_FLOAT_FORMAT,
};
pub use optimization::{HeaderKind, OptimizationReporter, ShowExperimentId};

use crate::error::from_io;
use crate::logging::console_filter;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs::File;
use std::io::Write;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, Registry};

/// Where reporter messages go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportingType {
    /// `tracing` events
    #[default]
    Logging,
    /// Plain stdout lines
    Standard,
}

impl FromStr for ReportingType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "logging" => Ok(Self::Logging),
            "standard" => Ok(Self::Standard),
            other => Err(Error::Validation(format!(
                "reporting_type must be in [\"logging\", \"standard\"]. Received: {other}"
            ))),
        }
    }
}

/// Reporter settings carried by the Environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportingParams {
    /// Message routing
    pub reporting_type: ReportingType,
    /// `"{}"` or `"{:.N}"`
    pub float_format: String,
    /// Prefix messages with the caller location
    pub add_frame: bool,
}

impl Default for ReportingParams {
    fn default() -> Self {
        Self {
            reporting_type: ReportingType::Logging,
            float_format: DEFAULT_FLOAT_FORMAT.to_string(),
            add_frame: false,
        }
    }
}

impl ReportingParams {
    /// Check `float_format`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for malformed formats.
    pub fn validate(&self) -> Result<()> {
        parse_float_format(&self.float_format).map(drop)
    }

    /// Precision parsed from `float_format` (`None` on `"{}"` or malformed input).
    #[must_use]
    pub fn precision(&self) -> Option<usize> {
        parse_float_format(&self.float_format).ok().flatten()
    }
}

enum Heartbeat {
    Subscriber { _guard: DefaultGuard },
    File(RefCell<File>),
}

/// Per-experiment message sink.
pub struct Reporter {
    reporting_type: ReportingType,
    add_frame: bool,
    verbose: bool,
    heartbeat_path: Option<PathBuf>,
    heartbeat: Option<Heartbeat>,
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("reporting_type", &self.reporting_type)
            .field("add_frame", &self.add_frame)
            .field("heartbeat_path", &self.heartbeat_path)
            .finish_non_exhaustive()
    }
}

impl Reporter {
    /// Reporter without a heartbeat file.
    #[must_use]
    pub fn console(params: &ReportingParams, verbose: bool) -> Self {
        Self {
            reporting_type: params.reporting_type,
            add_frame: params.add_frame,
            verbose,
            heartbeat_path: None,
            heartbeat: None,
        }
    }

    /// Reporter that also writes to `heartbeat_path` (truncated first).
    ///
    /// For [`ReportingType::Logging`] this installs a thread-local subscriber for the
    /// lifetime of the reporter, so every `tracing` event raised meanwhile reaches the file.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the path does not end in `.log`, and `NotFound` if
    /// its directory does not exist.
    pub fn with_heartbeat(
        params: &ReportingParams,
        verbose: bool,
        heartbeat_path: &Path,
    ) -> Result<Self> {
        let file_name = heartbeat_path
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| n.ends_with(".log"))
            .ok_or_else(|| {
                Error::Validation(format!(
                    "heartbeat_path must end with the extension \".log\". Received: {}",
                    heartbeat_path.display()
                ))
            })?;
        let dir = heartbeat_path.parent().unwrap_or_else(|| Path::new("."));
        if !dir.as_os_str().is_empty() && !dir.is_dir() {
            return Err(Error::not_found(dir));
        }

        let file = File::create(heartbeat_path).map_err(|e| from_io(e, heartbeat_path))?;
        let heartbeat = match params.reporting_type {
            ReportingType::Logging => {
                drop(file);
                let appender = tracing_appender::rolling::never(dir, file_name);
                let subscriber = Registry::default()
                    .with(
                        fmt::layer()
                            .with_target(false)
                            .with_writer(std::io::stdout)
                            .with_filter(console_filter(verbose)),
                    )
                    .with(
                        fmt::layer()
                            .with_ansi(false)
                            .with_target(false)
                            .with_writer(appender)
                            .with_filter(LevelFilter::DEBUG),
                    );
                Heartbeat::Subscriber {
                    _guard: tracing::subscriber::set_default(subscriber),
                }
            }
            ReportingType::Standard => Heartbeat::File(RefCell::new(file)),
        };

        let reporter = Self {
            reporting_type: params.reporting_type,
            add_frame: params.add_frame,
            verbose,
            heartbeat_path: Some(heartbeat_path.to_path_buf()),
            heartbeat: Some(heartbeat),
        };
        reporter.debug("Heartbeat initialized", false);
        Ok(reporter)
    }

    /// Heartbeat file, if one is attached.
    #[must_use]
    pub fn heartbeat_path(&self) -> Option<&Path> {
        self.heartbeat_path.as_deref()
    }

    /// Report at info level.
    #[track_caller]
    pub fn log(&self, content: &str, add_time: bool) {
        let content = self.decorate(content, add_time, Location::caller());
        match self.reporting_type {
            ReportingType::Logging if self.verbose => tracing::info!("{content}"),
            ReportingType::Logging => tracing::debug!("{content}"),
            ReportingType::Standard => self.standard("INFO", &content, self.verbose),
        }
    }

    /// Report at debug level.
    #[track_caller]
    pub fn debug(&self, content: &str, add_time: bool) {
        let content = self.decorate(content, add_time, Location::caller());
        match self.reporting_type {
            ReportingType::Logging => tracing::debug!("{content}"),
            ReportingType::Standard => self.standard("DEBUG", &content, false),
        }
    }

    /// Report a warning.
    #[track_caller]
    pub fn warn(&self, content: &str) {
        let content = self.decorate(content, false, Location::caller());
        match self.reporting_type {
            ReportingType::Logging => tracing::warn!("{content}"),
            ReportingType::Standard => self.standard("WARNING", &content, true),
        }
    }

    fn decorate(&self, content: &str, add_time: bool, location: &Location<'_>) -> String {
        let content = if self.add_frame {
            format!("{} - {content}", format_frame_source(location))
        } else {
            content.to_string()
        };
        let time = add_time.then(now_time);
        add_time_to_content(&content, time.as_deref())
    }

    fn standard(&self, level: &str, content: &str, echo: bool) {
        if echo {
            println!("{content}");
        }
        if let Some(Heartbeat::File(file)) = &self.heartbeat {
            let line = format!("<{}> {level:<8} - {content}", now_time());
            if let Err(e) = writeln!(file.borrow_mut(), "{line}") {
                tracing::warn!("Failed to write heartbeat: {e}");
            }
        }
    }
}

/// `"LINE - file_stem"` left-aligned, as used for `add_frame`.
#[must_use]
pub fn format_frame_source(location: &Location<'_>) -> String {
    let stem = Path::new(location.file())
        .file_stem()
        .map_or_else(|| location.file().to_string(), |s| s.to_string_lossy().into_owned());
    format!("{:<80}", format!("{:<4} - {stem}", location.line()))
}
