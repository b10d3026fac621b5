//! Reminder offset parsing: "30 minutos antes", "1 hora antes", "2 dias".

use chrono::Duration;
use recado_core::text::fold_lower;

/// Parse a reminder offset anywhere in the input. Accepts
/// `<n> minuto(s)`, `<n> hora(s)`, `<n> dia(s)`, accent-insensitive.
pub fn parse_offset(input: &str) -> Option<Duration> {
    let s = fold_lower(input);
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        if !chars[i].is_ascii_digit() {
            i += 1;
            continue;
        }

        let start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        let value: i64 = match chars[start..i].iter().collect::<String>().parse() {
            Ok(v) => v,
            Err(_) => continue,
        };

        let mut j = i;
        while j < chars.len() && chars[j].is_whitespace() {
            j += 1;
        }
        let rest: String = chars[j..].iter().collect();

        // try_* instead of the panicking constructors: a user-typed number
        // past chrono's bounds is a validation failure, not a crash.
        if rest.starts_with("minuto") {
            return Duration::try_minutes(value);
        }
        if rest.starts_with("hora") {
            return Duration::try_hours(value);
        }
        if rest.starts_with("dia") {
            return Duration::try_days(value);
        }
    }
    None
}
