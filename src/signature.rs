use anyhow::Context;
use chrono::{DateTime, FixedOffset, Local, TimeZone, Utc};
use std::fmt;
use std::str::FromStr;

/// An identity stamp: who did something, and when.
///
/// Serialized as `Name <email> <unix-seconds> <+HHMM|-HHMM>`, the form used
/// by the `tagger`, `author` and `committer` fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    name: String,
    email: String,
    when: DateTime<FixedOffset>,
}

impl Signature {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        when: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            when,
        }
    }

    /// a signature stamped with the current local time
    pub fn now(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self::new(name, email, Local::now().fixed_offset())
    }

    /// build a signature from seconds since the epoch and an offset in minutes
    pub fn from_timestamp(
        name: impl Into<String>,
        email: impl Into<String>,
        seconds: i64,
        offset_minutes: i32,
    ) -> anyhow::Result<Self> {
        let offset = FixedOffset::east_opt(offset_minutes * 60)
            .context(format!("invalid timezone offset: {} minutes", offset_minutes))?;
        let when = offset
            .timestamp_opt(seconds, 0)
            .single()
            .context(format!("invalid timestamp: {}", seconds))?;

        Ok(Self::new(name, email, when))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn when(&self) -> DateTime<FixedOffset> {
        self.when
    }

    /// offset from UTC formatted as `+HHMM` / `-HHMM`
    fn offset_str(&self) -> String {
        let offset = self.when.offset().local_minus_utc();
        let sign = if offset < 0 { '-' } else { '+' };
        let offset = offset.abs();

        let hours = offset / 3600;
        let minutes = (offset % 3600) / 60;

        format!("{}{:02}{:02}", sign, hours, minutes)
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self {
            name: String::new(),
            email: String::new(),
            when: DateTime::<Utc>::UNIX_EPOCH.fixed_offset(),
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <{}> {} {}",
            self.name,
            self.email,
            self.when.timestamp(),
            self.offset_str()
        )
    }
}

impl FromStr for Signature {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let (name, rest) = s
            .split_once('<')
            .context(format!("missing email in signature: {}", s))?;
        let (email, time) = rest
            .rsplit_once('>')
            .context(format!("unterminated email in signature: {}", s))?;

        let (seconds, tz) = time
            .trim()
            .split_once(' ')
            .context(format!("missing timezone in signature: {}", s))?;

        let seconds = seconds
            .parse::<i64>()
            .context(format!("invalid timestamp in signature: {}", s))?;

        anyhow::ensure!(
            tz.len() == 5 && tz.is_ascii() && (tz.starts_with('+') || tz.starts_with('-')),
            "invalid timezone in signature: {}",
            s
        );
        let hours = tz[1..3]
            .parse::<i32>()
            .context(format!("invalid timezone in signature: {}", s))?;
        let minutes = tz[3..5]
            .parse::<i32>()
            .context(format!("invalid timezone in signature: {}", s))?;

        let mut offset = hours * 60 + minutes;
        if tz.starts_with('-') {
            offset = -offset;
        }

        Self::from_timestamp(name.trim_end(), email, seconds, offset)
    }
}
