//! A library of routines shared by every phase of the tutorial run.

#[macro_use]
pub mod macros;

pub mod bento;
pub mod check;
pub mod env;
pub mod maven;
pub mod shell;

use std::path::Path;

use crate::common::shell::{LocalShell, ShellCmd};

/// The current time, in ms since the Epoch. Used as the run id and to tag
/// per-command log files.
pub fn now_ms() -> i64 {
    chrono::Local::now().timestamp_millis()
}

/// Parse a human truth value. Accepts `yes`, `no`, `true`, `false`, case
/// insensitively; anything else is an error.
pub fn truth(text: &str) -> Result<bool, failure::Error> {
    match text.to_lowercase().as_str() {
        "yes" | "true" => Ok(true),
        "no" | "false" => Ok(false),
        _ => Err(failure::format_err!("Invalid truth value: {:?}", text)),
    }
}

/// Parse a log level given either as a name (`info`, `DEBUG`, ...) or as the
/// numeric filter index (0 = off .. 5 = trace).
pub fn parse_log_level(level: &str) -> Result<log::LevelFilter, failure::Error> {
    if let Ok(level) = level.parse::<log::LevelFilter>() {
        return Ok(level);
    }
    match level.parse::<usize>() {
        Ok(0) => Ok(log::LevelFilter::Off),
        Ok(1) => Ok(log::LevelFilter::Error),
        Ok(2) => Ok(log::LevelFilter::Warn),
        Ok(3) => Ok(log::LevelFilter::Info),
        Ok(4) => Ok(log::LevelFilter::Debug),
        Ok(5) => Ok(log::LevelFilter::Trace),
        _ => Err(failure::format_err!("Invalid log level: {:?}", level)),
    }
}

/// Extract a tar archive into `work_dir`, stripping the given number of
/// leading path components. Both paths must already exist.
pub fn extract_archive(
    shell: &LocalShell,
    archive: &Path,
    work_dir: &Path,
    strip_components: usize,
) -> Result<(), failure::Error> {
    if !archive.exists() {
        return Err(failure::format_err!(
            "Archive {:?} does not exist",
            archive
        ));
    }
    if !work_dir.exists() {
        return Err(failure::format_err!(
            "Working directory {:?} does not exist",
            work_dir
        ));
    }

    let extract = shell.run(ShellCmd::args(vec![
        "/bin/tar".to_owned(),
        "xf".to_owned(),
        archive.display().to_string(),
        "--directory".to_owned(),
        work_dir.display().to_string(),
        format!("--strip-components={}", strip_components),
    ]))?;
    check::expect_zero(&extract)
}
