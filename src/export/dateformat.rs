//! Date patterns in the console's format-character language.
//!
//! Each specifier character is replaced by a component of the moment
//! (`d` day of month, `N` AP-style month, `P` 12-hour time with
//! `midnight`/`noon`, ...). A backslash emits the next character literally
//! and any other character is copied as is. Time specifiers on a date, or
//! date specifiers on a time, are formatting errors.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Offset, Timelike};
use chrono_tz::{OffsetComponents, Tz};

use crate::error::{AdminError, Result};

const SPECIFIERS: &str = "aAbcdDeEfFgGhHiIjlLmMnNoOPrsStTuUwWyYzZ";

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const MONTHS_AP: [&str; 12] = [
    "Jan.", "Feb.", "March", "April", "May", "June", "July", "Aug.", "Sept.", "Oct.", "Nov.",
    "Dec.",
];

struct Zone {
    offset_seconds: i32,
    abbreviation: String,
    name: String,
    dst: bool,
}

struct Moment {
    date: Option<NaiveDate>,
    time: Option<NaiveTime>,
    zone: Option<Zone>,
}

pub fn format_date(date: NaiveDate, pattern: &str) -> Result<String> {
    Moment {
        date: Some(date),
        time: None,
        zone: None,
    }
    .render(pattern)
}

pub fn format_time(time: NaiveTime, pattern: &str) -> Result<String> {
    Moment {
        date: None,
        time: Some(time),
        zone: None,
    }
    .render(pattern)
}

/// Format a datetime with no zone information. Zone specifiers render empty.
pub fn format_naive_datetime(datetime: NaiveDateTime, pattern: &str) -> Result<String> {
    Moment {
        date: Some(datetime.date()),
        time: Some(datetime.time()),
        zone: None,
    }
    .render(pattern)
}

/// Format a datetime in its own time zone.
pub fn format_datetime(datetime: &DateTime<Tz>, pattern: &str) -> Result<String> {
    let local = datetime.naive_local();
    let offset = datetime.offset();
    let zone = Zone {
        offset_seconds: offset.fix().local_minus_utc(),
        abbreviation: datetime.format("%Z").to_string(),
        name: datetime.timezone().name().to_string(),
        dst: offset.dst_offset().num_seconds() != 0,
    };
    Moment {
        date: Some(local.date()),
        time: Some(local.time()),
        zone: Some(zone),
    }
    .render(pattern)
}

fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

fn days_in_month(date: NaiveDate) -> u32 {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|next| next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(31)
}

fn twelve_hour(time: NaiveTime) -> u32 {
    match time.hour() % 12 {
        0 => 12,
        hour => hour,
    }
}

fn short_time(time: NaiveTime) -> String {
    if time.minute() == 0 {
        twelve_hour(time).to_string()
    } else {
        format!("{}:{:02}", twelve_hour(time), time.minute())
    }
}

fn meridiem(time: NaiveTime) -> &'static str {
    if time.hour() < 12 { "a.m." } else { "p.m." }
}

fn microseconds(time: NaiveTime) -> u32 {
    (time.nanosecond() / 1_000).min(999_999)
}

impl Moment {
    fn render(&self, pattern: &str) -> Result<String> {
        let mut out = String::with_capacity(pattern.len() * 2);
        let mut chars = pattern.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                out.push(chars.next().unwrap_or('\\'));
            } else if SPECIFIERS.contains(c) {
                out.push_str(&self.specifier(c)?);
            } else {
                out.push(c);
            }
        }
        Ok(out)
    }

    fn date(&self, c: char) -> Result<NaiveDate> {
        self.date.ok_or_else(|| {
            AdminError::Formatting(format!(
                "The format for time objects may not contain date-related format specifiers (found '{}')",
                c
            ))
        })
    }

    fn time(&self, c: char) -> Result<NaiveTime> {
        self.time.ok_or_else(|| {
            AdminError::Formatting(format!(
                "The format for date objects may not contain time-related format specifiers (found '{}')",
                c
            ))
        })
    }

    fn iso(&self) -> Result<String> {
        let date = self.date('c')?;
        let Some(time) = self.time else {
            return Ok(date.format("%Y-%m-%d").to_string());
        };
        let mut out = format!("{}T{}", date.format("%Y-%m-%d"), time.format("%H:%M:%S"));
        if microseconds(time) != 0 {
            out.push_str(&format!(".{:06}", microseconds(time)));
        }
        if let Some(zone) = &self.zone {
            let sign = if zone.offset_seconds < 0 { '-' } else { '+' };
            let seconds = zone.offset_seconds.abs();
            out.push_str(&format!("{}{:02}:{:02}", sign, seconds / 3600, (seconds / 60) % 60));
        }
        Ok(out)
    }

    fn specifier(&self, c: char) -> Result<String> {
        let out = match c {
            'a' => meridiem(self.time(c)?).to_string(),
            'A' => meridiem(self.time(c)?).replace('.', "").to_uppercase(),
            'b' => self.date(c)?.format("%b").to_string().to_lowercase(),
            'c' => self.iso()?,
            'd' => format!("{:02}", self.date(c)?.day()),
            'D' => self.date(c)?.format("%a").to_string(),
            'e' => {
                self.time(c)?;
                self.zone.as_ref().map(|z| z.name.clone()).unwrap_or_default()
            }
            'E' | 'F' => MONTHS[self.date(c)?.month0() as usize].to_string(),
            'f' => short_time(self.time(c)?),
            'g' => twelve_hour(self.time(c)?).to_string(),
            'G' => self.time(c)?.hour().to_string(),
            'h' => format!("{:02}", twelve_hour(self.time(c)?)),
            'H' => format!("{:02}", self.time(c)?.hour()),
            'i' => format!("{:02}", self.time(c)?.minute()),
            'I' => match &self.zone {
                Some(zone) => u8::from(zone.dst).to_string(),
                None => String::new(),
            },
            'j' => self.date(c)?.day().to_string(),
            'l' => self.date(c)?.format("%A").to_string(),
            'L' => {
                let leap = NaiveDate::from_ymd_opt(self.date(c)?.year(), 2, 29).is_some();
                String::from(if leap { "True" } else { "False" })
            }
            'm' => format!("{:02}", self.date(c)?.month()),
            'M' => self.date(c)?.format("%b").to_string(),
            'n' => self.date(c)?.month().to_string(),
            'N' => MONTHS_AP[self.date(c)?.month0() as usize].to_string(),
            'o' => self.date(c)?.iso_week().year().to_string(),
            'O' => {
                self.time(c)?;
                match &self.zone {
                    Some(zone) => {
                        let sign = if zone.offset_seconds < 0 { '-' } else { '+' };
                        let seconds = zone.offset_seconds.abs();
                        format!("{}{:02}{:02}", sign, seconds / 3600, (seconds / 60) % 60)
                    }
                    None => String::new(),
                }
            }
            'P' => {
                let time = self.time(c)?;
                match (time.hour(), time.minute()) {
                    (0, 0) => "midnight".to_string(),
                    (12, 0) => "noon".to_string(),
                    _ => format!("{} {}", short_time(time), meridiem(time)),
                }
            }
            'r' => self.render("D, j M Y H:i:s O")?,
            's' => format!("{:02}", self.time(c)?.second()),
            'S' => ordinal_suffix(self.date(c)?.day()).to_string(),
            't' => days_in_month(self.date(c)?).to_string(),
            'T' => {
                self.time(c)?;
                self.zone
                    .as_ref()
                    .map(|z| z.abbreviation.clone())
                    .unwrap_or_default()
            }
            'u' => format!("{:06}", microseconds(self.time(c)?)),
            'U' => {
                let date = self.date(c)?;
                let time = self.time.unwrap_or_default();
                let offset = self.zone.as_ref().map(|z| z.offset_seconds).unwrap_or(0);
                let epoch = NaiveDateTime::new(date, time).and_utc().timestamp() - i64::from(offset);
                epoch.to_string()
            }
            'w' => self.date(c)?.weekday().num_days_from_sunday().to_string(),
            'W' => self.date(c)?.iso_week().week().to_string(),
            'y' => format!("{:02}", self.date(c)?.year().rem_euclid(100)),
            'Y' => format!("{:04}", self.date(c)?.year()),
            'z' => self.date(c)?.ordinal().to_string(),
            'Z' => {
                self.time(c)?;
                self.zone
                    .as_ref()
                    .map(|z| z.offset_seconds.to_string())
                    .unwrap_or_default()
            }
            other => other.to_string(),
        };
        Ok(out)
    }
}
