use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const MIN_DURATION_MIN: u32 = 1;
pub const MAX_DURATION_MIN: u32 = 180;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Work,
    ShortBreak,
    LongBreak,
}

impl SessionKind {
    pub const ALL: [SessionKind; 3] = [
        SessionKind::Work,
        SessionKind::ShortBreak,
        SessionKind::LongBreak,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SessionKind::Work => "work",
            SessionKind::ShortBreak => "short_break",
            SessionKind::LongBreak => "long_break",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionKind::Work => "Focus Time",
            SessionKind::ShortBreak => "Short Break",
            SessionKind::LongBreak => "Long Break",
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "work" | "focus" => Ok(SessionKind::Work),
            "short_break" | "short" | "break" => Ok(SessionKind::ShortBreak),
            "long_break" | "long" => Ok(SessionKind::LongBreak),
            other => Err(format!("unknown session kind: {other}")),
        }
    }
}

/// Configured length of each session kind, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Durations {
    pub work_min: u32,
    pub short_break_min: u32,
    pub long_break_min: u32,
}

impl Durations {
    /// Build a validated set of durations. Out-of-range values are rejected,
    /// never clamped.
    pub fn new(work_min: u32, short_break_min: u32, long_break_min: u32) -> Result<Self, ConfigError> {
        let durations = Self {
            work_min,
            short_break_min,
            long_break_min,
        };
        durations.validate()?;
        Ok(durations)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("work", self.work_min)?;
        check_range("short_break", self.short_break_min)?;
        check_range("long_break", self.long_break_min)?;
        Ok(())
    }

    pub fn minutes_for(&self, kind: SessionKind) -> u32 {
        match kind {
            SessionKind::Work => self.work_min,
            SessionKind::ShortBreak => self.short_break_min,
            SessionKind::LongBreak => self.long_break_min,
        }
    }

    pub fn secs_for(&self, kind: SessionKind) -> u64 {
        u64::from(self.minutes_for(kind)) * 60
    }
}

impl Default for Durations {
    fn default() -> Self {
        Self {
            work_min: 25,
            short_break_min: 5,
            long_break_min: 15,
        }
    }
}

fn check_range(field: &'static str, value: u32) -> Result<(), ConfigError> {
    if (MIN_DURATION_MIN..=MAX_DURATION_MIN).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::DurationOutOfRange {
            field,
            value,
            min: MIN_DURATION_MIN,
            max: MAX_DURATION_MIN,
        })
    }
}

/// One timed interval.
///
/// Invariant: `remaining_secs <= duration_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub kind: SessionKind,
    pub duration_secs: u64,
    pub remaining_secs: u64,
}

impl Session {
    pub fn fresh(kind: SessionKind, durations: &Durations) -> Self {
        let duration_secs = durations.secs_for(kind);
        Self {
            kind,
            duration_secs,
            remaining_secs: duration_secs,
        }
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.duration_secs - self.remaining_secs
    }

    /// 0.0 .. 1.0 progress within the session.
    pub fn progress(&self) -> f64 {
        if self.duration_secs == 0 {
            return 0.0;
        }
        self.elapsed_secs() as f64 / self.duration_secs as f64
    }
}

/// `mm:ss` countdown text.
pub fn format_clock(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_durations() {
        let d = Durations::default();
        assert_eq!(d.secs_for(SessionKind::Work), 25 * 60);
        assert_eq!(d.secs_for(SessionKind::ShortBreak), 5 * 60);
        assert_eq!(d.secs_for(SessionKind::LongBreak), 15 * 60);
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(Durations::new(0, 5, 15).is_err());
        assert!(Durations::new(25, 181, 15).is_err());
        assert!(Durations::new(1, 180, 180).is_ok());
    }

    #[test]
    fn kind_parses_cli_spellings() {
        assert_eq!("work".parse::<SessionKind>().unwrap(), SessionKind::Work);
        assert_eq!("short-break".parse::<SessionKind>().unwrap(), SessionKind::ShortBreak);
        assert_eq!("LONG_BREAK".parse::<SessionKind>().unwrap(), SessionKind::LongBreak);
        assert!("nap".parse::<SessionKind>().is_err());
    }

    #[test]
    fn clock_format() {
        assert_eq!(format_clock(1500), "25:00");
        assert_eq!(format_clock(61), "01:01");
        assert_eq!(format_clock(0), "00:00");
    }

    #[test]
    fn progress_tracks_elapsed() {
        let mut s = Session::fresh(SessionKind::ShortBreak, &Durations::default());
        assert_eq!(s.progress(), 0.0);
        s.remaining_secs = 150;
        assert!((s.progress() - 0.5).abs() < f64::EPSILON);
    }
}
