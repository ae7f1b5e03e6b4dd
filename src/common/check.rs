//! Checks applied to command results. Every helper logs the mismatch at the
//! failure site and returns an error that aborts the rest of the run.

use failure_derive::Fail;
use log::error;
use regex::Regex;

use crate::common::shell::CmdResult;

/// A command result that failed an expected-value or pattern check.
#[derive(Debug, Fail)]
pub enum CheckError {
    #[fail(display = "Expected {}, got {}", expected, actual)]
    Mismatch { expected: String, actual: String },

    #[fail(display = "{:?} not found in {:?}", needle, text)]
    Missing { needle: String, text: String },

    #[fail(display = "{:?} does not match regex {:?}", actual, regex)]
    NoRegexMatch { regex: String, actual: String },

    #[fail(display = "{:?} does not start with {:?}", actual, prefix)]
    WrongPrefix { prefix: String, actual: String },
}

/// Require `actual` to equal `expected`.
pub fn expect_eq<T>(expected: T, actual: T) -> Result<(), failure::Error>
where
    T: PartialEq + std::fmt::Debug,
{
    if expected == actual {
        Ok(())
    } else {
        error!("Expected {:?}, got {:?}", expected, actual);
        Err(CheckError::Mismatch {
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        }
        .into())
    }
}

/// Require the command to have exited with status 0.
pub fn expect_zero(result: &CmdResult) -> Result<(), failure::Error> {
    expect_eq(0, result.status)
}

/// Require `text` to contain the literal `needle`.
pub fn expect_contains(text: &str, needle: &str) -> Result<(), failure::Error> {
    if text.contains(needle) {
        Ok(())
    } else {
        error!("{:?} not found in {:?}", needle, text);
        Err(CheckError::Missing {
            needle: needle.to_owned(),
            text: text.to_owned(),
        }
        .into())
    }
}

/// Require `actual` to match the regular expression `expect` (full-line
/// patterns anchor themselves with `^`/`$`).
pub fn expect_regex_match(expect: &str, actual: &str) -> Result<(), failure::Error> {
    let regex = Regex::new(expect)?;
    if regex.is_match(actual) {
        Ok(())
    } else {
        error!("{:?} does not match regex {:?}", actual, expect);
        Err(CheckError::NoRegexMatch {
            regex: expect.to_owned(),
            actual: actual.to_owned(),
        }
        .into())
    }
}

/// Require `actual` to start with the literal `prefix`.
pub fn expect_starts_with(prefix: &str, actual: &str) -> Result<(), failure::Error> {
    if actual.starts_with(prefix) {
        Ok(())
    } else {
        error!("{:?} does not start with {:?}", actual, prefix);
        Err(CheckError::WrongPrefix {
            prefix: prefix.to_owned(),
            actual: actual.to_owned(),
        }
        .into())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::common::shell::CmdResult;

    fn result_with_status(status: i32) -> CmdResult {
        CmdResult {
            status,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    #[test]
    fn expect_eq_passes_on_equal_values() {
        assert!(expect_eq(0, 0).is_ok());
        assert!(expect_eq("a", "a").is_ok());
    }

    #[test]
    fn expect_eq_fails_on_mismatch() {
        assert!(expect_eq(0, 3).is_err());
    }

    #[test]
    fn a_forced_nonzero_exit_fails_expect_zero() {
        assert!(expect_zero(&result_with_status(0)).is_ok());
        assert!(expect_zero(&result_with_status(1)).is_err());
    }

    #[test]
    fn expect_contains_finds_substrings() {
        assert!(expect_contains("table: songs\ntable: users\n", "songs").is_ok());
        assert!(expect_contains("table: songs\n", "users").is_err());
    }

    #[test]
    fn play_count_lines_match_the_expected_pattern() {
        for line in &["song-1\t10", "song-2\t20", "song-3\t30"] {
            assert!(expect_regex_match(r"^song-\d+\t\d+$", line).is_ok());
        }
    }

    #[test]
    fn a_colon_separated_line_fails_the_pattern() {
        assert!(expect_regex_match(r"^song-\d+\t\d+$", "song-1:10").is_err());
    }

    #[test]
    fn the_empty_pattern_only_matches_empty_lines() {
        assert!(expect_regex_match(r"^$", "").is_ok());
        assert!(expect_regex_match(r"^$", " ").is_err());
    }

    #[test]
    fn expect_starts_with_checks_the_prefix() {
        assert!(expect_starts_with("Scanning", "Scanning kiji table: kiji://x").is_ok());
        assert!(expect_starts_with("Scanning", "  Scanning").is_err());
    }
}
