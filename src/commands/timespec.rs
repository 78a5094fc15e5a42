//! Time specification parser.
//!
//! A poll-creation command may lead with a `time=<N><unit>` token giving the
//! voting window. Units are seconds (default), minutes, hours, or days; the
//! result is clamped to one week so a poll can never outlive the retention
//! window.

use std::sync::OnceLock;

use regex::Regex;

use crate::poll::WEEK_MS;

/// Errors from a malformed time token.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TimeSpecError {
    #[error("Wrong time syntax!")]
    BadNumber,

    #[error("Unknown time unit '{0}', use s, m, h or d")]
    BadUnit(char),
}

fn time_token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^time=(\d+)([a-z]?)$").expect("static regex"))
}

/// Consume a leading `time=...` token from `args`, if present, and return
/// the voting window in milliseconds (zero when no token is given).
///
/// The token is removed from the argument list only when it parses; a
/// malformed token aborts poll creation with a user-facing error.
pub fn parse_time(args: &mut Vec<String>) -> Result<i64, TimeSpecError> {
    let Some(first) = args.first() else {
        return Ok(0);
    };
    if !first.starts_with("time=") {
        return Ok(0);
    }

    let captures = time_token_regex()
        .captures(first)
        .ok_or(TimeSpecError::BadNumber)?;

    // The digits are regex-guaranteed, so a parse failure can only mean
    // overflow; saturate and let the week clamp below take over.
    let amount: i64 = captures[1].parse().unwrap_or(i64::MAX);
    let unit = captures[2].chars().next();

    let multiplier = match unit.map(|c| c.to_ascii_lowercase()) {
        None | Some('s') => 1_000,
        Some('m') => 60_000,
        Some('h') => 3_600_000,
        Some('d') => 86_400_000,
        Some(other) => return Err(TimeSpecError::BadUnit(other)),
    };

    args.remove(0);
    Ok(amount.saturating_mul(multiplier).min(WEEK_MS))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_token_means_untimed() {
        let mut a = args(&["Question?", "A", "B"]);
        assert_eq!(parse_time(&mut a), Ok(0));
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn empty_args_means_untimed() {
        let mut a = Vec::new();
        assert_eq!(parse_time(&mut a), Ok(0));
    }

    #[test]
    fn seconds_minutes_hours_days() {
        let mut a = args(&["time=90s", "Q?"]);
        assert_eq!(parse_time(&mut a), Ok(90_000));
        assert_eq!(a, vec!["Q?"]);

        assert_eq!(parse_time(&mut args(&["time=5m"])), Ok(300_000));
        assert_eq!(parse_time(&mut args(&["time=2h"])), Ok(7_200_000));
        assert_eq!(parse_time(&mut args(&["time=3d"])), Ok(259_200_000));
    }

    #[test]
    fn bare_digits_default_to_seconds() {
        assert_eq!(parse_time(&mut args(&["time=45"])), Ok(45_000));
    }

    #[test]
    fn units_are_case_insensitive() {
        assert_eq!(parse_time(&mut args(&["time=2H"])), Ok(7_200_000));
        assert_eq!(parse_time(&mut args(&["time=1D"])), Ok(86_400_000));
    }

    #[test]
    fn clamped_to_one_week() {
        assert_eq!(parse_time(&mut args(&["time=10d"])), Ok(WEEK_MS));
        assert_eq!(parse_time(&mut args(&["time=999999999h"])), Ok(WEEK_MS));
    }

    #[test]
    fn overflowing_digits_are_capped_not_rejected() {
        // Digit strings past i64 range still count as valid durations;
        // they saturate and hit the week ceiling like any large value.
        let mut a = args(&["time=99999999999999999999s", "Q?"]);
        assert_eq!(parse_time(&mut a), Ok(WEEK_MS));
        assert_eq!(a, vec!["Q?"]);

        assert_eq!(
            parse_time(&mut args(&["time=99999999999999999999d"])),
            Ok(WEEK_MS)
        );
    }

    #[test]
    fn missing_digits_is_an_error() {
        let mut a = args(&["time=abc", "Q?"]);
        assert_eq!(parse_time(&mut a), Err(TimeSpecError::BadNumber));
        // Token is left in place on error; creation aborts anyway.
        assert_eq!(a.len(), 2);

        assert_eq!(parse_time(&mut args(&["time="])), Err(TimeSpecError::BadNumber));
    }

    #[test]
    fn unknown_unit_is_an_error() {
        assert_eq!(parse_time(&mut args(&["time=5x"])), Err(TimeSpecError::BadUnit('x')));
        assert_eq!(parse_time(&mut args(&["time=5W"])), Err(TimeSpecError::BadUnit('w')));
    }
}
