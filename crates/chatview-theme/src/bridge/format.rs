//! Date formatting primitives behind `formatDate` and `strftime`.

use std::fmt::{self, Write};

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Datelike, Local, NaiveDateTime, TimeZone, Timelike};
use serde_json::Value;

#[derive(Debug, PartialEq)]
enum Token {
    Literal(String),
    Field(char, usize),
    AmPm { upper: bool },
}

/// Render `dt` with a Qt-style pattern (`yyyy-MM-dd hh:mm:ss`, `ddd`, `AP`,
/// quoted literals). Day and month names are English.
pub fn format_qt_datetime<Tz: TimeZone>(dt: &DateTime<Tz>, pattern: &str) -> String
where
    Tz::Offset: fmt::Display,
{
    let tokens = tokenize(pattern);
    let twelve_hour = tokens.iter().any(|t| matches!(t, Token::AmPm { .. }));
    let mut out = String::with_capacity(pattern.len() + 8);

    for token in &tokens {
        match token {
            Token::Literal(s) => out.push_str(s),
            Token::AmPm { upper } => {
                let (is_pm, _) = dt.hour12();
                out.push_str(match (is_pm, upper) {
                    (false, true) => "AM",
                    (true, true) => "PM",
                    (false, false) => "am",
                    (true, false) => "pm",
                });
            }
            Token::Field(c, n) => {
                let _ = write_field(&mut out, dt, *c, *n, twelve_hour);
            }
        }
    }
    out
}

fn write_field<Tz: TimeZone>(
    out: &mut String,
    dt: &DateTime<Tz>,
    c: char,
    n: usize,
    twelve_hour: bool,
) -> fmt::Result
where
    Tz::Offset: fmt::Display,
{
    let pad = n >= 2;
    match c {
        'd' => match n {
            1 | 2 => write_num(out, dt.day(), pad),
            3 => write!(out, "{}", dt.format("%a")),
            _ => write!(out, "{}", dt.format("%A")),
        },
        'M' => match n {
            1 | 2 => write_num(out, dt.month(), pad),
            3 => write!(out, "{}", dt.format("%b")),
            _ => write!(out, "{}", dt.format("%B")),
        },
        'y' => {
            if n == 2 {
                write!(out, "{:02}", dt.year().rem_euclid(100))
            } else {
                write!(out, "{:04}", dt.year())
            }
        }
        'h' => {
            let hour = if twelve_hour { dt.hour12().1 } else { dt.hour() };
            write_num(out, hour, pad)
        }
        'H' => write_num(out, dt.hour(), pad),
        'm' => write_num(out, dt.minute(), pad),
        's' => write_num(out, dt.second(), pad),
        'z' => {
            let millis = dt.timestamp_subsec_millis().min(999);
            if n == 3 {
                write!(out, "{millis:03}")
            } else {
                write!(out, "{millis}")
            }
        }
        't' => write!(out, "{}", dt.format("%Z")),
        _ => Ok(()),
    }
}

fn write_num(out: &mut String, value: u32, pad: bool) -> fmt::Result {
    if pad {
        write!(out, "{value:02}")
    } else {
        write!(out, "{value}")
    }
}

fn tokenize(pattern: &str) -> Vec<Token> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\'' {
            // '' is an escaped quote, inside or outside a quoted run.
            if chars.get(i + 1) == Some(&'\'') {
                tokens.push(Token::Literal("'".into()));
                i += 2;
                continue;
            }
            let mut literal = String::new();
            i += 1;
            while i < chars.len() {
                if chars[i] == '\'' {
                    if chars.get(i + 1) == Some(&'\'') {
                        literal.push('\'');
                        i += 2;
                        continue;
                    }
                    i += 1;
                    break;
                }
                literal.push(chars[i]);
                i += 1;
            }
            tokens.push(Token::Literal(literal));
            continue;
        }

        if c == 'A' || c == 'a' {
            let upper = c == 'A';
            i += 1;
            if matches!(chars.get(i), Some('P') | Some('p')) {
                i += 1;
            }
            tokens.push(Token::AmPm { upper });
            continue;
        }

        let max = match c {
            'd' | 'M' | 'y' => 4,
            'h' | 'H' | 'm' | 's' => 2,
            'z' => 3,
            't' => 1,
            _ => 0,
        };
        if max == 0 {
            tokens.push(Token::Literal(c.to_string()));
            i += 1;
            continue;
        }

        let run = chars[i..].iter().take_while(|&&x| x == c).count();
        let take = match c {
            'y' if run >= 4 => 4,
            'y' if run >= 2 => 2,
            'y' => 0,
            'z' if run >= 3 => 3,
            'z' => 1,
            _ => run.min(max),
        };
        if take == 0 {
            tokens.push(Token::Literal(c.to_string()));
            i += 1;
        } else {
            tokens.push(Token::Field(c, take));
            i += take;
        }
    }
    tokens
}

/// C `strftime` equivalent. An invalid format renders as an empty string.
pub fn strftime<Tz: TimeZone>(dt: &DateTime<Tz>, format: &str) -> String
where
    Tz::Offset: fmt::Display,
{
    let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return String::new();
    }
    let mut out = String::new();
    if write!(out, "{}", dt.format_with_items(items.iter())).is_err() {
        return String::new();
    }
    out
}

/// Interpret a date passed from script: epoch milliseconds, RFC 3339, or a
/// local `YYYY-MM-DDTHH:MM:SS` timestamp.
pub(crate) fn parse_script_datetime(value: &Value) -> Option<DateTime<Local>> {
    match value {
        Value::Number(n) => {
            let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            Local.timestamp_millis_opt(millis).single()
        }
        Value::String(s) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Local));
            }
            let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").ok()?;
            Local.from_local_datetime(&naive).single()
        }
        _ => None,
    }
}
