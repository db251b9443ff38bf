// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Logging setup shared by every syscall conformance binary.
//!
//! Probe executables report their verdict through the exit status only, so all
//! diagnostics go to stderr (or a log file) and stdout is left untouched for
//! whatever reporter runs the probe.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

// Re-export clap for binaries that flatten CliLoggingArgs
pub use clap;

pub use tracing::Level;

/// Output format for log messages
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable plaintext format
    #[default]
    Plaintext,
    /// Structured JSON format
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Plaintext => write!(f, "plaintext"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "plaintext" => Ok(LogFormat::Plaintext),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!(
                "Invalid log format: {}. Use 'plaintext' or 'json'",
                s
            )),
        }
    }
}

/// Log level accepted on the command line
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CliLogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for Level {
    fn from(level: CliLogLevel) -> Self {
        match level {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}

impl std::fmt::Display for CliLogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliLogLevel::Error => write!(f, "error"),
            CliLogLevel::Warn => write!(f, "warn"),
            CliLogLevel::Info => write!(f, "info"),
            CliLogLevel::Debug => write!(f, "debug"),
            CliLogLevel::Trace => write!(f, "trace"),
        }
    }
}

/// Logging flags for tools that take command-line arguments.
///
/// Use with `#[command(flatten)]`. Without `--log-file` or `--log-dir` the
/// output goes to stderr.
#[derive(Clone, Debug, Default, clap::Args, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CliLoggingArgs {
    /// Log verbosity level
    #[arg(long, value_enum, help = "Log verbosity level (default: info)")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<CliLogLevel>,

    /// Log output format
    #[arg(long, value_enum, help = "Log output format (default: plaintext)")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_format: Option<LogFormat>,

    /// Directory for log files
    #[arg(long, help = "Directory for log files")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,

    /// Log filename
    #[arg(long, help = "Log filename")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,
}

impl CliLoggingArgs {
    /// Initialize logging from the parsed flags.
    pub fn init(self, component: &str) -> anyhow::Result<()> {
        let level = self.log_level.unwrap_or_default().into();
        let format = self.log_format.unwrap_or_default();

        if self.writes_to_file() {
            let log_path = self.resolve_log_path(component);
            init_to_file(component, level, format, &log_path)
        } else {
            init(component, level, format)
        }
    }

    pub fn writes_to_file(&self) -> bool {
        self.log_file.is_some() || self.log_dir.is_some()
    }

    /// Resolve the log file path.
    ///
    /// An absolute `log_file` wins. A relative `log_file` is placed under
    /// `log_dir` when one is given. A bare `log_dir` gets `<component>.log`.
    /// With neither, the platform location from [`standard_log_path`] is used.
    pub fn resolve_log_path(&self, component: &str) -> PathBuf {
        match (&self.log_file, &self.log_dir) {
            (Some(file), _) if Path::new(file).is_absolute() => PathBuf::from(file),
            (Some(file), Some(dir)) => Path::new(dir).join(file),
            (Some(file), None) => PathBuf::from(file),
            (None, Some(dir)) => Path::new(dir).join(format!("{}.log", component)),
            (None, None) => standard_log_path(component),
        }
    }
}

/// Platform-specific log file location for a component
///
/// - macOS: ~/Library/Logs/syscall-conformance/<component>.log
/// - Linux: ~/.local/share/syscall-conformance/<component>.log
/// - Other: ~/syscall-conformance/<component>.log
pub fn standard_log_path(component: &str) -> PathBuf {
    let filename = format!("{}.log", component);

    #[cfg(target_os = "macos")]
    let base = {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
        path.push("Library");
        path.push("Logs");
        path
    };

    #[cfg(target_os = "linux")]
    let base = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from("/tmp")));

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    let base = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/tmp"));

    base.join("syscall-conformance").join(filename)
}

/// Initialize logging to stderr.
///
/// `RUST_LOG` takes precedence over `default_level` when it is set.
///
/// ```rust
/// use sc_logging::{init, Level, LogFormat};
///
/// fn main() -> anyhow::Result<()> {
///     init("stat-dev-ino", Level::INFO, LogFormat::Plaintext)?;
///     tracing::info!("probe started");
///     Ok(())
/// }
/// ```
pub fn init(component: &str, default_level: Level, format: LogFormat) -> anyhow::Result<()> {
    init_with_writer(component, default_level, format, io::stderr)
}

/// Initialize logging to a file, creating parent directories as needed.
pub fn init_to_file(
    component: &str,
    default_level: Level,
    format: LogFormat,
    log_path: &Path,
) -> anyhow::Result<()> {
    use std::fs;

    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let log_file = fs::OpenOptions::new().create(true).append(true).open(log_path)?;

    init_with_writer(component, default_level, format, log_file)
}

/// Initialize logging with a custom writer
pub fn init_with_writer<W>(
    component: &str,
    default_level: Level,
    format: LogFormat,
    writer: W,
) -> anyhow::Result<()>
where
    W: for<'writer> tracing_subscriber::fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(component, default_level)));

    match format {
        LogFormat::Json => {
            let layer = tracing_subscriber::fmt::layer().with_writer(writer).json();
            #[cfg(debug_assertions)]
            let layer = layer.with_file(true).with_line_number(true);

            tracing_subscriber::registry().with(filter).with(layer).try_init()?;
        }
        LogFormat::Plaintext => {
            let layer = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false);
            #[cfg(debug_assertions)]
            let layer = layer.with_file(true).with_line_number(true);

            tracing_subscriber::registry().with(filter).with(layer).try_init()?;
        }
    }

    Ok(())
}

/// Filter directive used when `RUST_LOG` is absent.
///
/// Crate targets use underscores, so a hyphenated component name is
/// normalised before it becomes a target directive.
fn default_directive(component: &str, level: Level) -> String {
    format!("{},{}={}", level, component.replace('-', "_"), level)
}

/// Test utilities for working with log output
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    /// Strip ANSI escape sequences from captured log output.
    ///
    /// ```rust
    /// use sc_logging::test_utils::strip_ansi_codes;
    ///
    /// assert_eq!(strip_ansi_codes("\x1b[32mINFO\x1b[0m probe"), "INFO probe");
    /// ```
    #[cfg(feature = "test-utils")]
    pub fn strip_ansi_codes(s: &str) -> String {
        let ansi_regex = regex::Regex::new(r"\x1b\[[0-9;]*[a-zA-Z]").unwrap();
        ansi_regex.replace_all(s, "").to_string()
    }

    /// Strip ANSI escape sequences without the regex crate.
    #[cfg(not(feature = "test-utils"))]
    pub fn strip_ansi_codes(s: &str) -> String {
        let mut result = String::with_capacity(s.len());
        let mut chars = s.chars().peekable();

        while let Some(ch) = chars.next() {
            if ch == '\x1b' && chars.peek() == Some(&'[') {
                chars.next();
                for ch in chars.by_ref() {
                    if ch.is_ascii_alphabetic() {
                        break;
                    }
                }
            } else {
                result.push(ch);
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_log_level_conversion() {
        assert_eq!(Level::from(CliLogLevel::Error), Level::ERROR);
        assert_eq!(Level::from(CliLogLevel::Warn), Level::WARN);
        assert_eq!(Level::from(CliLogLevel::Info), Level::INFO);
        assert_eq!(Level::from(CliLogLevel::Debug), Level::DEBUG);
        assert_eq!(Level::from(CliLogLevel::Trace), Level::TRACE);
    }

    #[test]
    fn test_cli_log_level_default() {
        assert_eq!(CliLogLevel::default(), CliLogLevel::Info);
        assert_eq!(format!("{}", CliLogLevel::default()), "info");
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("plaintext".parse::<LogFormat>(), Ok(LogFormat::Plaintext));
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_default_directive_normalises_component() {
        assert_eq!(
            default_directive("probe-manifest", Level::DEBUG),
            "DEBUG,probe_manifest=DEBUG"
        );
    }

    #[test]
    fn test_console_by_default() {
        let args = CliLoggingArgs::default();
        assert!(!args.writes_to_file());

        let args = CliLoggingArgs {
            log_dir: Some("/var/log/probes".to_string()),
            ..Default::default()
        };
        assert!(args.writes_to_file());
    }

    #[test]
    fn test_resolve_log_path() {
        let args = CliLoggingArgs {
            log_file: Some("/abs/probes.log".to_string()),
            log_dir: Some("/ignored".to_string()),
            ..Default::default()
        };
        assert_eq!(args.resolve_log_path("x"), PathBuf::from("/abs/probes.log"));

        let args = CliLoggingArgs {
            log_file: Some("run/probes.log".to_string()),
            log_dir: Some("/logs".to_string()),
            ..Default::default()
        };
        assert_eq!(args.resolve_log_path("x"), PathBuf::from("/logs/run/probes.log"));

        let args = CliLoggingArgs {
            log_dir: Some("/logs".to_string()),
            ..Default::default()
        };
        assert_eq!(
            args.resolve_log_path("probe-manifest"),
            PathBuf::from("/logs/probe-manifest.log")
        );
    }

    #[test]
    fn test_standard_log_path() {
        let path = standard_log_path("lseek");
        let path_str = path.to_string_lossy();
        assert!(path_str.ends_with("syscall-conformance/lseek.log"));

        #[cfg(target_os = "macos")]
        assert!(path_str.contains("Library/Logs"));
    }

    #[test]
    fn test_strip_ansi_codes() {
        let cleaned = test_utils::strip_ansi_codes("\x1b[31mERROR\x1b[0m violation");
        assert_eq!(cleaned, "ERROR violation");
    }
}
