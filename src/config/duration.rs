//! Duration strings used for command timeouts in the suite file.

use std::time::Duration;

use crate::error::ConfigError;

/// Parse a duration string.
///
/// Supported formats:
/// - `s` - seconds (e.g., "30s")
/// - `m` - minutes (e.g., "5m")
/// - `h` - hours (e.g., "2h")
/// - `d` - days (e.g., "1d")
/// - `w` - weeks (e.g., "1w")
/// - Combined formats (e.g., "1h30m", "2m30s")
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    let mut total_seconds: u64 = 0;
    let mut current_num = String::new();

    for ch in input.chars() {
        if ch.is_ascii_digit() {
            current_num.push(ch);
        } else if ch.is_ascii_alphabetic() {
            if current_num.is_empty() {
                return Err(invalid(input, "a unit must follow a number"));
            }

            let num: u64 = current_num
                .parse()
                .map_err(|_| invalid(input, "number is too large"))?;
            current_num.clear();

            let multiplier = match ch {
                's' => 1,
                'm' => 60,
                'h' => 3600,
                'd' => 86400,
                'w' => 604800,
                _ => return Err(invalid(input, &format!("unknown unit '{}', use s, m, h, d, w", ch))),
            };

            total_seconds = num
                .checked_mul(multiplier)
                .and_then(|secs| total_seconds.checked_add(secs))
                .ok_or_else(|| invalid(input, "duration overflows"))?;
        } else if !ch.is_whitespace() {
            return Err(invalid(input, &format!("invalid character '{}'", ch)));
        }
    }

    if !current_num.is_empty() {
        return Err(invalid(input, "duration must include a unit (s, m, h, d, w)"));
    }

    if total_seconds == 0 {
        return Err(invalid(input, "duration must be greater than 0"));
    }

    Ok(Duration::from_secs(total_seconds))
}

fn invalid(input: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid(format!("invalid duration '{}': {}", input, reason))
}
