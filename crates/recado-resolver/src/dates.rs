//! Spanish natural-language date parsing with future bias.
//!
//! "mañana", "el viernes", "21 de junio", "21-06-2025" and friends, with an
//! optional time of day ("a las 15:30"). Without a time indicator the result
//! is date-only; reminder math later treats that as end of day.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use recado_core::task::DueDate;
use recado_core::text::fold_lower;

const MONTHS: &[(&str, u32)] = &[
    ("enero", 1),
    ("febrero", 2),
    ("marzo", 3),
    ("abril", 4),
    ("mayo", 5),
    ("junio", 6),
    ("julio", 7),
    ("agosto", 8),
    ("septiembre", 9),
    ("setiembre", 9),
    ("octubre", 10),
    ("noviembre", 11),
    ("diciembre", 12),
];

const WEEKDAYS: &[(&str, Weekday)] = &[
    ("lunes", Weekday::Mon),
    ("martes", Weekday::Tue),
    ("miercoles", Weekday::Wed),
    ("jueves", Weekday::Thu),
    ("viernes", Weekday::Fri),
    ("sabado", Weekday::Sat),
    ("domingo", Weekday::Sun),
];

/// Parse a user-supplied due date relative to `today` (the user's local
/// date). `None` means the input is not a date the assistant understands.
pub fn normalize_date(input: &str, today: NaiveDate) -> Option<DueDate> {
    let folded = fold_lower(input.trim());
    if folded.is_empty() {
        return None;
    }

    let (date_part, time) = split_time(&folded);
    let date = parse_date_part(date_part.trim(), today)?;

    match time {
        Some(t) => Some(DueDate::DateTime(date.and_time(t))),
        None => Some(DueDate::Date(date)),
    }
}

/// Split an optional time-of-day suffix off the input.
fn split_time(s: &str) -> (&str, Option<NaiveTime>) {
    if let Some(pos) = s.find(" a las ") {
        let rest = s[pos + 7..].trim();
        if let Some(t) = parse_time(rest) {
            return (&s[..pos], Some(t));
        }
    }
    // A trailing "HH:MM" token also counts as a time.
    if let Some((head, last)) = s.trim_end().rsplit_once(' ') {
        if last.contains(':') {
            if let Some(t) = parse_time(last) {
                return (head, Some(t));
            }
        }
    }
    (s, None)
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim().trim_end_matches(" hrs").trim_end_matches(" horas");
    if let Some((h, m)) = s.split_once(':') {
        let hour: u32 = h.trim().parse().ok()?;
        let minute: u32 = m.trim().parse().ok()?;
        NaiveTime::from_hms_opt(hour, minute, 0)
    } else {
        let hour: u32 = s.parse().ok()?;
        NaiveTime::from_hms_opt(hour, 0, 0)
    }
}

fn parse_date_part(s: &str, today: NaiveDate) -> Option<NaiveDate> {
    let s = strip_articles(s);

    match s {
        "hoy" => return Some(today),
        "manana" => return Some(today + Duration::days(1)),
        "pasado manana" => return Some(today + Duration::days(2)),
        _ => {}
    }

    for (name, weekday) in WEEKDAYS {
        if s == *name {
            return Some(next_weekday(today, *weekday));
        }
    }

    for fmt in ["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }

    if let Some(d) = parse_spanish_long(s, today) {
        return Some(d);
    }

    parse_day_month(s, today)
}

fn strip_articles(s: &str) -> &str {
    let mut s = s;
    for prefix in ["el ", "la ", "este ", "esta ", "proximo ", "proxima "] {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest.trim_start();
        }
    }
    s
}

/// Next occurrence of `weekday` strictly after `today` (future bias: "el
/// viernes" said on a Friday means next week).
fn next_weekday(today: NaiveDate, weekday: Weekday) -> NaiveDate {
    let delta = (weekday.num_days_from_monday() as i64
        - today.weekday().num_days_from_monday() as i64)
        .rem_euclid(7);
    let delta = if delta == 0 { 7 } else { delta };
    today + Duration::days(delta)
}

/// "21 de junio" or "21 de junio de 2025". Without a year, the nearest
/// future occurrence is chosen.
fn parse_spanish_long(s: &str, today: NaiveDate) -> Option<NaiveDate> {
    let tokens: Vec<&str> = s.split_whitespace().collect();
    match tokens.as_slice() {
        [day, "de", month] => {
            let day: u32 = day.parse().ok()?;
            let month = month_number(month)?;
            future_biased(day, month, today)
        }
        [day, "de", month, "de", year] => {
            let day: u32 = day.parse().ok()?;
            let month = month_number(month)?;
            let year: i32 = year.parse().ok()?;
            NaiveDate::from_ymd_opt(year, month, day)
        }
        _ => None,
    }
}

/// "21/06" or "21-06": day and month, nearest future occurrence.
fn parse_day_month(s: &str, today: NaiveDate) -> Option<NaiveDate> {
    let (day, month) = s.split_once(['/', '-'])?;
    let day: u32 = day.trim().parse().ok()?;
    let month: u32 = month.trim().parse().ok()?;
    future_biased(day, month, today)
}

fn future_biased(day: u32, month: u32, today: NaiveDate) -> Option<NaiveDate> {
    let this_year = NaiveDate::from_ymd_opt(today.year(), month, day)?;
    if this_year < today {
        NaiveDate::from_ymd_opt(today.year() + 1, month, day)
    } else {
        Some(this_year)
    }
}

fn month_number(name: &str) -> Option<u32> {
    MONTHS.iter().find(|(n, _)| *n == name).map(|(_, m)| *m)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        // A Wednesday.
        NaiveDate::from_ymd_opt(2025, 6, 18).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> DueDate {
        DueDate::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn relative_words() {
        assert_eq!(normalize_date("hoy", today()), Some(date(2025, 6, 18)));
        assert_eq!(normalize_date("mañana", today()), Some(date(2025, 6, 19)));
        assert_eq!(
            normalize_date("pasado mañana", today()),
            Some(date(2025, 6, 20))
        );
    }

    #[test]
    fn weekdays_are_future_biased() {
        assert_eq!(
            normalize_date("el viernes", today()),
            Some(date(2025, 6, 20))
        );
        assert_eq!(normalize_date("lunes", today()), Some(date(2025, 6, 23)));
        // Saying the current weekday means next week.
        assert_eq!(
            normalize_date("el miércoles", today()),
            Some(date(2025, 6, 25))
        );
    }

    #[test]
    fn numeric_formats() {
        assert_eq!(
            normalize_date("2025-06-21", today()),
            Some(date(2025, 6, 21))
        );
        assert_eq!(
            normalize_date("21-06-2025", today()),
            Some(date(2025, 6, 21))
        );
        assert_eq!(
            normalize_date("21/06/2025", today()),
            Some(date(2025, 6, 21))
        );
    }

    #[test]
    fn day_month_without_year_is_future_biased() {
        assert_eq!(normalize_date("21/06", today()), Some(date(2025, 6, 21)));
        // Already past this year: roll to the next.
        assert_eq!(normalize_date("01/02", today()), Some(date(2026, 2, 1)));
    }

    #[test]
    fn spanish_long_form() {
        assert_eq!(
            normalize_date("21 de junio", today()),
            Some(date(2025, 6, 21))
        );
        assert_eq!(
            normalize_date("el 21 de junio de 2025", today()),
            Some(date(2025, 6, 21))
        );
        assert_eq!(
            normalize_date("5 de enero", today()),
            Some(date(2026, 1, 5))
        );
    }

    #[test]
    fn time_of_day_yields_datetime() {
        let dt = normalize_date("mañana a las 15:30", today()).unwrap();
        assert_eq!(
            dt,
            DueDate::DateTime(
                NaiveDate::from_ymd_opt(2025, 6, 19)
                    .unwrap()
                    .and_hms_opt(15, 30, 0)
                    .unwrap()
            )
        );

        let dt = normalize_date("el viernes a las 9", today()).unwrap();
        assert_eq!(
            dt,
            DueDate::DateTime(
                NaiveDate::from_ymd_opt(2025, 6, 20)
                    .unwrap()
                    .and_hms_opt(9, 0, 0)
                    .unwrap()
            )
        );

        let dt = normalize_date("21-06-2025 18:00", today()).unwrap();
        assert!(matches!(dt, DueDate::DateTime(_)));
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(normalize_date("", today()), None);
        assert_eq!(normalize_date("cuando pueda", today()), None);
        assert_eq!(normalize_date("32 de junio", today()), None);
    }
}
