//! Logging of solver statistics with a configurable prefix and closing line.

use std::fmt::Display;
use std::io::stdout;
use std::io::Write;
use std::sync::RwLock;

use convert_case::Case;
use convert_case::Casing;
use log::debug;
use once_cell::sync::OnceCell;

/// The options for statistic logging: the prefix printed before every line, the (optional)
/// line printed after a block of statistics, and the (optional) casing of statistic names.
pub struct StatisticOptions {
    statistic_prefix: &'static str,
    after_statistics: Option<&'static str>,
    statistics_casing: Option<Case>,
    statistics_writer: Box<dyn Write + Send + Sync>,
}

impl std::fmt::Debug for StatisticOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatisticOptions")
            .field("statistic_prefix", &self.statistic_prefix)
            .field("after_statistics", &self.after_statistics)
            .finish()
    }
}

static STATISTIC_OPTIONS: OnceCell<RwLock<StatisticOptions>> = OnceCell::new();

/// Configures the logging of statistics. Statistics are only printed after this has been
/// called; lines have the form `{prefix} {name}={value}`.
pub fn configure_statistic_logging(
    prefix: &'static str,
    after: Option<&'static str>,
    casing: Option<Case>,
    writer: Option<Box<dyn Write + Send + Sync>>,
) {
    let _ = STATISTIC_OPTIONS.get_or_init(|| {
        RwLock::from(StatisticOptions {
            statistic_prefix: prefix,
            after_statistics: after,
            statistics_casing: casing,
            statistics_writer: writer.unwrap_or(Box::new(stdout())),
        })
    });
}

/// Logs one statistic as `{prefix} {name}={value}`.
pub fn log_statistic(name: impl Display, value: impl Display) {
    if let Some(lock) = STATISTIC_OPTIONS.get() {
        if let Ok(mut options) = lock.write() {
            let name = if let Some(casing) = &options.statistics_casing {
                name.to_string().to_case(*casing)
            } else {
                name.to_string()
            };
            let prefix = options.statistic_prefix;
            if let Err(error) = writeln!(options.statistics_writer, "{prefix} {name}={value}") {
                debug!("could not write statistic: {error}");
            }
        }
    }
}

/// Logs the closing line of a statistics block, if one is configured.
pub fn log_statistic_postfix() {
    if let Some(lock) = STATISTIC_OPTIONS.get() {
        if let Ok(mut options) = lock.write() {
            if let Some(after) = options.after_statistics {
                if let Err(error) = writeln!(options.statistics_writer, "{after}") {
                    debug!("could not write statistic postfix: {error}");
                }
            }
        }
    }
}

/// Whether statistic logging has been configured.
pub fn should_log_statistics() -> bool {
    STATISTIC_OPTIONS.get().is_some()
}
