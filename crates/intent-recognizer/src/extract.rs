//! Numbers, durations and dates from free text.

use time::{Duration, OffsetDateTime, Time};

/// Pulls typed values out of recognized text for the `num`, `duration` and
/// `datetime` converters.
pub trait ValueExtractor: Send + Sync {
    fn extract_number(&self, text: &str) -> Option<f64>;
    fn extract_duration(&self, text: &str) -> Option<Duration>;
    fn extract_datetime(&self, text: &str) -> Option<OffsetDateTime>;
}

/// English number words, durations like "five minutes" and relative dates
/// like "tomorrow" or "in two hours".
///
/// Relative dates are computed against `anchor`, or the current UTC time
/// when none is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnglishExtractor {
    pub anchor: Option<OffsetDateTime>,
}

impl EnglishExtractor {
    pub fn with_anchor(anchor: OffsetDateTime) -> Self {
        Self {
            anchor: Some(anchor),
        }
    }

    fn now(&self) -> OffsetDateTime {
        self.anchor.unwrap_or_else(OffsetDateTime::now_utc)
    }
}

fn small_number(word: &str) -> Option<u64> {
    let n = match word {
        "zero" => 0,
        "one" | "a" | "an" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        "thirteen" => 13,
        "fourteen" => 14,
        "fifteen" => 15,
        "sixteen" => 16,
        "seventeen" => 17,
        "eighteen" => 18,
        "nineteen" => 19,
        "twenty" => 20,
        "thirty" => 30,
        "forty" => 40,
        "fifty" => 50,
        "sixty" => 60,
        "seventy" => 70,
        "eighty" => 80,
        "ninety" => 90,
        _ => return None,
    };
    Some(n)
}

fn scale(word: &str) -> Option<u64> {
    match word {
        "hundred" => Some(100),
        "thousand" => Some(1_000),
        "million" => Some(1_000_000),
        "billion" => Some(1_000_000_000),
        _ => None,
    }
}

fn words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric() && c != '.' && c != '-')
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

/// Reads one number starting at `words[i]`. Returns the value and the
/// number of words used, or `None` when no number starts there or the value
/// does not fit.
fn number_at(words: &[String], i: usize) -> Option<(f64, usize)> {
    let first = words.get(i)?;
    let numeric = first
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || c == '-' || c == '.');
    if numeric {
        if let Ok(n) = first.parse::<f64>() {
            return n.is_finite().then_some((n, 1));
        }
    }

    let (sign, mut j) = match first.as_str() {
        "minus" | "negative" => (-1.0, i + 1),
        _ => (1.0, i),
    };
    let mut total: u64 = 0;
    let mut current: u64 = 0;
    let mut any = false;
    while let Some(word) = words.get(j) {
        if let Some(n) = small_number(word) {
            // "a" and "an" only count at the start of a number
            if (word == "a" || word == "an") && any {
                break;
            }
            current = current.checked_add(n)?;
        } else if let Some(s) = scale(word) {
            if !any {
                break;
            }
            if s == 100 {
                current = current.max(1).checked_mul(100)?;
            } else {
                total = total.checked_add(current.max(1).checked_mul(s)?)?;
                current = 0;
            }
        } else if word == "and" && any {
            j += 1;
            continue;
        } else {
            break;
        }
        any = true;
        j += 1;
    }
    if !any {
        return None;
    }
    let mut value = total.checked_add(current)? as f64;
    if words.get(j).map(String::as_str) == Some("point") {
        let mut frac = String::new();
        let mut k = j + 1;
        while let Some(d) = words.get(k).and_then(|w| small_number(w)).filter(|d| *d < 10) {
            frac.push(char::from(b'0' + d as u8));
            k += 1;
        }
        if let Ok(f) = format!("0.{frac}").parse::<f64>() {
            if !frac.is_empty() {
                value += f;
                j = k;
            }
        }
    }
    Some((sign * value, j - i))
}

fn unit_seconds(word: &str) -> Option<f64> {
    let unit = word.strip_suffix('s').unwrap_or(word);
    match unit {
        "second" | "sec" => Some(1.0),
        "minute" | "min" => Some(60.0),
        "hour" | "hr" => Some(3_600.0),
        "day" => Some(86_400.0),
        "week" => Some(604_800.0),
        _ => None,
    }
}

/// Sums every `<number> <unit>` pair found from `start` on. Returns the
/// duration and the index after the last pair.
fn duration_from(words: &[String], start: usize) -> Option<(Duration, usize)> {
    let mut seconds = 0.0;
    let mut found = false;
    let mut end = start;
    let mut i = start;
    while i < words.len() {
        if words[i] == "half" {
            if let Some(unit) = words.get(i + 1).and_then(|w| unit_seconds(w)) {
                seconds += unit / 2.0;
                found = true;
                i += 2;
                end = i;
                continue;
            }
            if let Some(unit) = words.get(i + 2).and_then(|w| unit_seconds(w)) {
                // "half an hour"
                seconds += unit / 2.0;
                found = true;
                i += 3;
                end = i;
                continue;
            }
        }
        if let Some((n, used)) = number_at(words, i) {
            if let Some(unit) = words.get(i + used).and_then(|w| unit_seconds(w)) {
                seconds += n * unit;
                found = true;
                i += used + 1;
                end = i;
                continue;
            }
        }
        i += 1;
    }
    if !found {
        return None;
    }
    Duration::checked_seconds_f64(seconds).map(|d| (d, end))
}

/// Hour of day from "at seven", "at 7 pm", "at noon".
fn time_of_day(words: &[String]) -> Option<Time> {
    let at = words.iter().position(|w| w == "at")?;
    match words.get(at + 1).map(String::as_str) {
        Some("noon") => return Time::from_hms(12, 0, 0).ok(),
        Some("midnight") => return Time::from_hms(0, 0, 0).ok(),
        _ => {}
    }
    let (hour, used) = number_at(words, at + 1)?;
    if !(0.0..24.0).contains(&hour) {
        return None;
    }
    let mut hour = hour as u8;
    let mut rest = at + 1 + used;
    if words.get(rest).map(String::as_str) == Some("o'clock") {
        rest += 1;
    }
    match words.get(rest).map(String::as_str) {
        Some("pm" | "p.m.") if hour < 12 => hour += 12,
        Some("am" | "a.m.") if hour == 12 => hour = 0,
        _ => {}
    }
    Time::from_hms(hour, 0, 0).ok()
}

impl ValueExtractor for EnglishExtractor {
    fn extract_number(&self, text: &str) -> Option<f64> {
        let words = words(text);
        (0..words.len()).find_map(|i| number_at(&words, i).map(|(n, _)| n))
    }

    fn extract_duration(&self, text: &str) -> Option<Duration> {
        duration_from(&words(text), 0).map(|(d, _)| d)
    }

    fn extract_datetime(&self, text: &str) -> Option<OffsetDateTime> {
        let words = words(text);
        let anchor = self.now();
        let mut result = None;

        for (i, word) in words.iter().enumerate() {
            let day = match word.as_str() {
                "now" | "today" | "tonight" => Some(anchor),
                "tomorrow" => anchor.checked_add(Duration::days(1)),
                "yesterday" => anchor.checked_sub(Duration::days(1)),
                "in" => duration_from(&words, i + 1)
                    .filter(|(_, end)| *end > i + 1)
                    .and_then(|(d, _)| anchor.checked_add(d)),
                "ago" => duration_from(&words[..i], 0).and_then(|(d, _)| anchor.checked_sub(d)),
                _ => None,
            };
            if day.is_some() {
                result = day;
                break;
            }
        }

        match (result, time_of_day(&words)) {
            (Some(dt), Some(t)) => Some(dt.replace_time(t)),
            (None, Some(t)) => {
                let today = anchor.replace_time(t);
                if today < anchor {
                    today.checked_add(Duration::days(1))
                } else {
                    Some(today)
                }
            }
            (dt, None) => dt,
        }
    }
}
