use std::{fmt, str::FromStr};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Local;
use rand::Rng;

const STATE_BYTES: usize = 16;
const PLACEHOLDER: &str = "{hours";
const MAX_PRECISION: usize = 6;

pub fn log_timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Random one-time token bound to a single authorization round-trip.
pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Converts a summed track length to fractional hours.
pub fn duration_hours(total_ms: u64) -> f64 {
    let minutes = total_ms as f64 / 60_000.0;
    minutes / 60.0
}

/// `m:ss` rendering of a single track length.
pub fn format_track_duration(duration_ms: u64) -> String {
    let secs = duration_ms / 1000;
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Display-name template with exactly one `{hours}` or `{hours:.N}` slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTemplate {
    prefix: String,
    suffix: String,
    precision: Option<usize>,
}

impl NameTemplate {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let Some(start) = raw.find(PLACEHOLDER) else {
            return Err(format!("'{raw}' has no {{hours}} placeholder"));
        };

        let after = &raw[start + PLACEHOLDER.len()..];
        let Some(close) = after.find('}') else {
            return Err(format!("'{raw}' has an unterminated placeholder"));
        };

        let spec = &after[..close];
        let precision = match spec {
            "" => None,
            _ => {
                let digits = spec
                    .strip_prefix(":.")
                    .ok_or_else(|| format!("unsupported format '{spec}', use {{hours:.N}}"))?;
                let n = digits
                    .parse::<usize>()
                    .map_err(|_| format!("precision '{digits}' is not a number"))?;
                if n > MAX_PRECISION {
                    return Err(format!("precision {n} exceeds {MAX_PRECISION}"));
                }
                Some(n)
            }
        };

        let suffix = &after[close + 1..];
        if suffix.contains(PLACEHOLDER) {
            return Err(format!("'{raw}' has more than one placeholder"));
        }

        Ok(Self {
            prefix: raw[..start].to_string(),
            suffix: suffix.to_string(),
            precision,
        })
    }

    pub fn render(&self, hours: f64) -> String {
        let value = match self.precision {
            Some(n) => format!("{:.*}", n, hours),
            None => format!("{}", (hours * 10.0).round() / 10.0),
        };
        format!("{}{}{}", self.prefix, value, self.suffix)
    }
}

impl FromStr for NameTemplate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for NameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.precision {
            Some(n) => write!(f, "{}{{hours:.{}}}{}", self.prefix, n, self.suffix),
            None => write!(f, "{}{{hours}}{}", self.prefix, self.suffix),
        }
    }
}
