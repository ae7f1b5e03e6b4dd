//! Useful macros.

/// Build a `ShellCmd` that runs through `/bin/bash -c`, with `format!`-style
/// interpolation. Tutorial command strings rely on the shell to resolve
/// `${VAR}` references against the composed environment, so they have to go
/// through bash rather than an argument vector.
macro_rules! cmd {
    ($fmt:expr) => {
        $crate::common::shell::ShellCmd::bash(format!($fmt))
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::common::shell::ShellCmd::bash(format!($fmt, $($arg)*))
    };
}

/// Time the given operation and push the time to the given
/// `Vec<(String, Duration)>`.
macro_rules! time {
    ($timers:ident, $label:literal, $expr:expr) => {{
        let start = std::time::Instant::now();
        let result = $expr;
        let duration = std::time::Instant::now() - start;
        $timers.push(($label, duration));
        result
    }};
}
